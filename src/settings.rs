//! Environment-based configuration for all three services.
//!
//! Every recognized variable has a default except the credentials the
//! respective service cannot run without; validation failures are fatal
//! before a main loop starts.

use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;

use crate::error::ConfigError;

/// Seconds subtracted twice from the previous trigger when computing the
/// notification window, tolerating synchronizer/downloader lag.
pub const WINDOW_SHIFT_FACTOR: u64 = 2;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Base directory for metadata and news content.
    pub data_dir: PathBuf,
    /// SQLite database path or `sqlite:` URL shared by all services.
    pub database_url: String,
    /// IANA timezone of the news source.
    pub source_timezone: Tz,

    // Synchronizer
    pub first_day: Option<NaiveDate>,
    pub check_updates_interval: u64,
    pub days_chunk_size: u32,

    // Downloader
    pub download_interval: u64,
    pub downloads_chunk_size: u32,
    pub ignore_categories: HashSet<String>,
    pub request_timeout: u64,
    pub max_retries: u32,
    pub user_agent: String,

    pub llm: LlmSettings,
    pub notifier: NotifierSettings,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Engine identifier; only `gemini` is currently wired up.
    pub engine: String,
    pub api_key: String,
    pub basic_model: ModelSettings,
    pub light_model: ModelSettings,
    /// Model used to reparse free-text responses into the declared schema
    /// when a primary model lacks native structured output.
    pub supplementary_model: String,
    pub keep_raw_engine_responses: bool,
    pub raw_engine_responses_dir: PathBuf,
    /// Languages the English summary is translated into.
    pub translate_languages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: String,
    pub request_limit: u32,
    pub request_limit_period_seconds: u64,
    /// Set when the model cannot emit schema-constrained JSON itself.
    pub requires_supplementary: bool,
}

#[derive(Debug, Clone)]
pub struct NotifierSettings {
    /// Local times of day (source timezone) at which publication runs.
    pub trigger_times: Vec<NaiveTime>,
    /// Upper bound on one notifier sleep quantum, in seconds.
    pub max_inactivity_interval: u64,
    pub bot_token: String,
    pub channel_id: String,
    pub max_retries: u32,
    /// Pause between consecutive messages, in seconds.
    pub message_delay: u64,
    /// Language of the summary that gets published.
    pub summary_language: String,
    /// Messaging API base; overridden in tests.
    pub api_base: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            data_dir: PathBuf::from(var_or("CRHOY_DATA_DIR", "data/crhoy")),
            database_url: var_or("CRHOY_DATABASE_URL", "sqlite:data/crhoy/crhoy.db"),
            source_timezone: parse_var("CRHOY_SOURCE_TIMEZONE", "America/Costa_Rica", |v| {
                Tz::from_str(v).map_err(|e| e.to_string())
            })?,
            first_day: optional_var("CRHOY_FIRST_DAY", |v| {
                NaiveDate::parse_from_str(v, "%Y-%m-%d")
                    .map_err(|_| "expected YYYY-MM-DD".to_string())
            })?,
            check_updates_interval: parse_var("CRHOY_CHECK_UPDATES_INTERVAL", "300", parse_positive)?,
            days_chunk_size: parse_var("CRHOY_DAYS_CHUNK_SIZE", "5", parse_positive)?,
            download_interval: parse_var("CRHOY_DOWNLOAD_INTERVAL", "60", parse_positive)?,
            downloads_chunk_size: parse_var("CRHOY_DOWNLOADS_CHUNK_SIZE", "10", parse_positive)?,
            ignore_categories: parse_csv(&var_or("CRHOY_IGNORE_CATEGORIES", "")),
            request_timeout: parse_var("CRHOY_REQUEST_TIMEOUT", "30", parse_positive)?,
            max_retries: parse_var("CRHOY_MAX_RETRIES", "3", parse_number)?,
            user_agent: var_or("CRHOY_USER_AGENT", "CRHoy Pipeline/0.4"),
            llm: LlmSettings::from_env()?,
            notifier: NotifierSettings::from_env()?,
        })
    }
}

impl LlmSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            engine: var_or("AGENT_ENGINE", "gemini"),
            api_key: var_or("AGENT_ENGINE_API_KEY", ""),
            basic_model: ModelSettings::from_env("BASIC", "gemini-1.5-pro-002")?,
            light_model: ModelSettings::from_env("LIGHT", "gemini-1.5-flash-002")?,
            supplementary_model: var_or(
                "AGENT_ENGINE_SUPPLEMENTARY_MODEL",
                "gemini-1.5-flash-002",
            ),
            keep_raw_engine_responses: parse_var("KEEP_RAW_ENGINE_RESPONSES", "false", parse_bool)?,
            raw_engine_responses_dir: PathBuf::from(var_or(
                "RAW_ENGINE_RESPONSES_DIR",
                "data/responses",
            )),
            translate_languages: parse_csv(&var_or("AGENT_TRANSLATE_LANGUAGES", "ru"))
                .into_iter()
                .collect(),
        })
    }
}

impl ModelSettings {
    fn from_env(role: &str, default_model: &str) -> Result<Self, ConfigError> {
        let prefix = format!("AGENT_ENGINE_{role}_MODEL");
        Ok(Self {
            model: var_or(&prefix, default_model),
            request_limit: parse_var(&format!("{prefix}_REQUEST_LIMIT"), "10", parse_positive)?,
            request_limit_period_seconds: parse_var(
                &format!("{prefix}_REQUEST_LIMIT_PERIOD_SECONDS"),
                "60",
                parse_positive,
            )?,
            requires_supplementary: parse_var(
                &format!("{prefix}_REQUIRES_SUPPLEMENTARY"),
                "false",
                parse_bool,
            )?,
        })
    }
}

impl NotifierSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            trigger_times: parse_var(
                "NOTIFIER_TRIGGER_TIMES",
                r#"["06:00", "12:00", "16:30"]"#,
                parse_trigger_times,
            )?,
            max_inactivity_interval: parse_var("NOTIFIER_MAX_INACTIVITY_INTERVAL", "300", parse_positive)?,
            bot_token: var_or("NOTIFIER_BOT_TOKEN", ""),
            channel_id: var_or("NOTIFIER_CHANNEL_ID", ""),
            max_retries: parse_var("NOTIFIER_MAX_RETRIES", "3", parse_number)?,
            message_delay: parse_var("NOTIFIER_MESSAGE_DELAY", "3", parse_number)?,
            summary_language: var_or("NOTIFIER_SUMMARY_LANGUAGE", "ru"),
            api_base: var_or("NOTIFIER_API_BASE", "https://api.telegram.org"),
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(
    key: &str,
    default: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<T, ConfigError> {
    let raw = var_or(key, default);
    parse(raw.trim()).map_err(|reason| ConfigError::InvalidVar {
        key: key.to_string(),
        reason,
    })
}

fn optional_var<T>(
    key: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse(raw.trim())
            .map(Some)
            .map_err(|reason| ConfigError::InvalidVar {
                key: key.to_string(),
                reason,
            }),
        _ => Ok(None),
    }
}

fn parse_number<T: FromStr>(value: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("not a valid number: '{value}'"))
}

fn parse_positive<T: FromStr + PartialOrd + Default>(value: &str) -> Result<T, String> {
    let parsed: T = parse_number(value)?;
    if parsed <= T::default() {
        return Err(format!("must be positive, got '{value}'"));
    }
    Ok(parsed)
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(format!("not a boolean: '{other}'")),
    }
}

fn parse_csv(value: &str) -> HashSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses the trigger-times JSON array, e.g. `["06:00", "16:30"]`.
fn parse_trigger_times(value: &str) -> Result<Vec<NaiveTime>, String> {
    let raw: Vec<String> =
        serde_json::from_str(value).map_err(|e| format!("expected JSON array of HH:MM: {e}"))?;
    if raw.is_empty() {
        return Err("at least one trigger time is required".to_string());
    }
    let mut times = raw
        .iter()
        .map(|t| {
            NaiveTime::parse_from_str(t, "%H:%M").map_err(|_| format!("invalid time '{t}'"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    times.sort();
    times.dedup();
    Ok(times)
}
