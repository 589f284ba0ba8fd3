#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use std::{path::PathBuf, process};
use tokio::io::{stdin, stdout, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{
    prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use ::docqa::{provider, Config, Loader, Session};

const DEFAULT_LOG_FILTER: &str = "docqa=info,cli=info";

/// Ask questions about local documents.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File or directory to load
    path: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenv().ok();
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tokio::select! {
        result = run(cli) => {
            if let Err(err) = result {
                error!("{err:#}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nExiting...");
            // a pending stdin read blocks runtime shutdown
            process::exit(0);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    info!(
        "Using {} ({} / {})",
        config.provider, config.embedding_model, config.generation_model
    );

    let (embedder, generator) = provider::from_config(&config);
    let mut session = Session::new(&config, embedder, generator);

    if let Err(err) = session.ingest(&cli.path, &Loader::default()).await {
        error!("{err}");
        if let Some(hint) = err.hint() {
            warn!("{hint}");
        }

        return Ok(());
    }

    session.run(BufReader::new(stdin()), stdout()).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_the_default_log_filter() {
        // When
        let filter = EnvFilter::try_new(DEFAULT_LOG_FILTER).unwrap();

        // Then
        let directives = filter.to_string();
        assert!(directives.contains("docqa=info"));
        assert!(directives.contains("cli=info"));
    }
}
