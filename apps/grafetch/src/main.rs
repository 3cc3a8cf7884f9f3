//! # Grafetch
//!
//! Command-line front end for the grafetch retrieval core.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/grafetch (THE BINARY)            │
//! │                                                      │
//! │   ┌─────────────┐          ┌──────────────────┐      │
//! │   │    CLI      │          │  Progress bars   │      │
//! │   │   (clap)    │          │   (indicatif)    │      │
//! │   └──────┬──────┘          └────────┬─────────┘      │
//! │          └──────────────┬───────────┘                │
//! │                         ▼                            │
//! │                ┌────────────────┐                    │
//! │                │ grafetch-core  │                    │
//! │                │  (THE LOGIC)   │                    │
//! │                └────────────────┘                    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! grafetch retrieve HomoSapiens --verbosity 2
//! grafetch list --filter escherichia
//! grafetch cache status HomoSapiens
//! ```

mod cli;
mod progress;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // GRAFETCH_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("GRAFETCH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "grafetch=info,grafetch_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
