//! Notifier entry point.

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use crhoy_pipeline::db::Database;
use crhoy_pipeline::notifier::sender::TelegramSender;
use crhoy_pipeline::notifier::Notifier;
use crhoy_pipeline::runtime::{self, Shutdown};
use crhoy_pipeline::settings::Settings;

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
    if settings.notifier.bot_token.is_empty() || settings.notifier.channel_id.is_empty() {
        error!("NOTIFIER_BOT_TOKEN and NOTIFIER_CHANNEL_ID are required for the notifier");
        return ExitCode::FAILURE;
    }

    let db = match Database::open(&settings.database_url) {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to open database");
            return ExitCode::FAILURE;
        }
    };

    let sender = match TelegramSender::new(&settings.notifier) {
        Ok(sender) => sender,
        Err(e) => {
            error!(error = %e, "Failed to build channel sender");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    if let Err(e) = runtime::install_signal_handlers(&shutdown) {
        error!(error = %e, "Failed to install signal handlers");
        return ExitCode::FAILURE;
    }

    Notifier::new(&db, &sender, &settings, shutdown).run();
    ExitCode::SUCCESS
}
