//! Shared helpers for unit tests.

use std::collections::HashSet;
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveTime};
use chrono_tz::America::Costa_Rica;

use crate::api::index::{parse_index, DailyIndex};
use crate::settings::{LlmSettings, ModelSettings, NotifierSettings, Settings};

pub fn base_settings(data_dir: &Path) -> Settings {
    let model = ModelSettings {
        model: "stub-model".to_string(),
        request_limit: 1000,
        request_limit_period_seconds: 60,
        requires_supplementary: false,
    };
    Settings {
        data_dir: data_dir.to_path_buf(),
        database_url: "sqlite::memory:".to_string(),
        source_timezone: Costa_Rica,
        first_day: None,
        check_updates_interval: 300,
        days_chunk_size: 5,
        download_interval: 60,
        downloads_chunk_size: 10,
        ignore_categories: HashSet::new(),
        request_timeout: 30,
        max_retries: 3,
        user_agent: "test".to_string(),
        llm: LlmSettings {
            engine: "gemini".to_string(),
            api_key: String::new(),
            basic_model: model.clone(),
            light_model: model,
            supplementary_model: "stub-supplementary".to_string(),
            keep_raw_engine_responses: false,
            raw_engine_responses_dir: data_dir.join("responses"),
            translate_languages: vec!["ru".to_string()],
        },
        notifier: NotifierSettings {
            trigger_times: vec![
                NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(16, 30, 0).unwrap(),
            ],
            max_inactivity_interval: 300,
            bot_token: "test-token".to_string(),
            channel_id: "@test".to_string(),
            max_retries: 3,
            message_delay: 0,
            summary_language: "ru".to_string(),
            api_base: "http://localhost:1".to_string(),
        },
    }
}

fn spanish_month(month: u32) -> &'static str {
    [
        "Enero", "Febrero", "Marzo", "Abril", "Mayo", "Junio", "Julio", "Agosto", "Septiembre",
        "Octubre", "Noviembre", "Diciembre",
    ][(month - 1) as usize]
}

/// A one-article index document in the source's wire format.
pub fn index_with_article(id: i64, date: NaiveDate, hour: &str, category: &str) -> DailyIndex {
    let date_str = format!("{} {}, {}", spanish_month(date.month()), date.day(), date.year());
    let pairs: Vec<serde_json::Value> = category
        .split('/')
        .map(|slug| serde_json::json!([slug.to_uppercase(), slug]))
        .collect();
    let raw = serde_json::json!({
        "ultimas": [{
            "id": id,
            "url": format!("https://www.crhoy.com/nota-{id}"),
            "date": date_str,
            "hour": hour,
            "categories": pairs,
        }]
    });
    parse_index(raw, Costa_Rica).expect("test index document must parse")
}
