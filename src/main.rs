//! Deep Research - terminal client for a deep-research server
//!
//! Sends a query, streams the pipeline's progress (phases, retrievals,
//! assistant output, clarification questions) and prints the final report.

mod client;
mod config;
mod render;
mod runtime;
mod state_machine;

use client::HttpResearchApi;
use config::ClientConfig;
use render::TerminalSink;
use runtime::SessionRuntime;
use state_machine::Lifecycle;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; stdout belongs to the session output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deep_research=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(api_url = %config.api_url, "Using research server");

    let api = HttpResearchApi::new(&config)?;
    let runtime = SessionRuntime::new(api, TerminalSink::stdout());

    let (input_tx, input_rx) = mpsc::channel(16);

    if let Some(query) = std::env::args().nth(1) {
        input_tx.send(query).await?;
    } else {
        println!("Enter a research query:");
    }

    // Plain thread: a pending stdin read must not hold up shutdown
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if input_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read input");
                    break;
                }
            }
        }
    });

    let session = runtime.run(input_rx).await;

    match session.lifecycle {
        Lifecycle::Finished { session_id } => {
            tracing::info!(session_id = %session_id, "Research finished");
            Ok(())
        }
        Lifecycle::Failed { reason, .. } => Err(reason.into()),
        Lifecycle::New | Lifecycle::Starting | Lifecycle::Active { .. } => {
            tracing::info!("No research query submitted");
            Ok(())
        }
    }
}
