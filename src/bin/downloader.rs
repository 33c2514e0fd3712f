//! News downloader entry point.

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use crhoy_pipeline::api::SourceApiClient;
use crhoy_pipeline::db::Database;
use crhoy_pipeline::downloader::Downloader;
use crhoy_pipeline::llm;
use crhoy_pipeline::runtime::{self, Shutdown};
use crhoy_pipeline::settings::Settings;
use crhoy_pipeline::webparse::CrhoyParser;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    if settings.llm.api_key.is_empty() {
        error!("AGENT_ENGINE_API_KEY is required for the downloader");
        return ExitCode::FAILURE;
    }

    let db = match Database::open(&settings.database_url) {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to open database");
            return ExitCode::FAILURE;
        }
    };

    let client = match SourceApiClient::new(&settings) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to build API client");
            return ExitCode::FAILURE;
        }
    };

    let engine = match llm::build_engine(&settings.llm) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "Failed to build LLM engine");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    if let Err(e) = runtime::install_signal_handlers(&shutdown) {
        error!(error = %e, "Failed to install signal handlers");
        return ExitCode::FAILURE;
    }

    let parser = CrhoyParser::new();
    Downloader::new(&db, &client, &parser, engine.as_ref(), &settings, shutdown).run();
    ExitCode::SUCCESS
}
