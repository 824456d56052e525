use lambda_http::{run, service_fn, tracing, Error};
use std::sync::Arc;

mod config;
mod error;
mod event_handler;
mod gemini;

use config::RelayConfig;
use event_handler::{function_handler, AppState};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = RelayConfig::from_env()?;

    let state = Arc::new(AppState::from_config(&config)?);

    tracing::info!(
        model = %config.model,
        timeout_secs = config.timeout.map(|t| t.as_secs()),
        "Prompt relay ready"
    );

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { function_handler(state, event).await }
    }))
    .await
}
