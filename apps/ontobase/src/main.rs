//! # Ontobase
//!
//! The command-line binary over `ontobase-core`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            apps/ontobase (THE BINARY)        │
//! │                                              │
//! │  ┌─────────────┐        ┌────────────────┐   │
//! │  │   CLI       │        │    Config      │   │
//! │  │  (clap)     │        │ (toml + env)   │   │
//! │  └──────┬──────┘        └───────┬────────┘   │
//! │         └───────────┬───────────┘            │
//! │                     ▼                        │
//! │             ┌───────────────┐                │
//! │             │ ontobase-core │                │
//! │             │ (THE LIBRARY) │                │
//! │             └───────────────┘                │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! ontobase --source "redb://localhost/ontology?dir=data" init
//! ontobase term add --lid color --name Color
//! ontobase descriptor add --lid height --symbol height --type float --name Height
//! ontobase relate --predicate ":predicate:subclass-of" --from things/car --to things/vehicle
//! ```

use clap::Parser;
use ontobase::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // ONTOBASE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ONTOBASE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ontobase=info,ontobase_core=info".into());

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
