use std::process::ExitCode;

use finscribe::input::{HISTORY_FILE_NAME, InputLines};
use finscribe::settings::SettingsStore;
use finscribe::terminal::TerminalApp;
use finscribe_answer::{BackendClient, create_answer_service};
use finscribe_chat::SessionController;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "finscribe=info,finscribe_chat=info,finscribe_answer=info";

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so the transcript on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings_store = SettingsStore::load();
    let settings = settings_store.settings();
    let config = settings.to_service_config();

    let service = match create_answer_service(config.clone()) {
        Ok(service) => service,
        Err(error) => {
            tracing::error!(error = %error, "failed to build answer client");
            return ExitCode::FAILURE;
        }
    };
    let backend = match BackendClient::new(config) {
        Ok(backend) => backend,
        Err(error) => {
            tracing::error!(error = %error, "failed to build backend client");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        answer_endpoint = %settings.answer_endpoint,
        backend_endpoint = %settings.backend_endpoint,
        config_path = ?settings_store.config_path(),
        "starting finscribe"
    );

    let controller = SessionController::with_seed(service, settings.session_seed());
    let mut app = TerminalApp::new(controller, backend, settings_store, std::io::stdout());
    let history_path = SettingsStore::default_config_dir().join(HISTORY_FILE_NAME);
    let mut input = match InputLines::spawn(Some(history_path)) {
        Ok(input) => input,
        Err(error) => {
            tracing::error!(error = %error, "failed to start input reader");
            return ExitCode::FAILURE;
        }
    };

    match app.run(&mut input).await {
        Ok(()) => {
            input.close();
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(error = %error, "terminal i/o failed");
            ExitCode::FAILURE
        }
    }
}
