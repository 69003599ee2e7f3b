use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use source_clevertap::config::load_config;
use source_clevertap::{
    connection_specification, Message, RecordMessage, SourceCleverTap, SourceConfig,
};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "source-clevertap",
    version,
    about = "Export CleverTap events and profiles as JSON records"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the connection specification
    Spec,
    /// Validate config and credentials
    Check {
        /// Path to config.json (or .toml)
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the stream catalog
    Discover {
        /// Path to config.json (or .toml)
        #[arg(long)]
        config: PathBuf,
    },
    /// Read records and print them as RECORD messages
    Read {
        /// Path to config.json (or .toml)
        #[arg(long)]
        config: PathBuf,
        /// Only read these streams (repeatable). Default: all streams.
        #[arg(long = "stream")]
        streams: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries protocol messages only.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("source_clevertap={}", cli.log_level).into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let source = SourceCleverTap::new();
    match cli.command {
        Commands::Spec => emit(&Message::Spec {
            spec: serde_json::json!({ "connectionSpecification": connection_specification() }),
        }),
        Commands::Check { config } => {
            let config = read_config(&config)?;
            let status = source.check_connection(&config, today()).await;
            emit(&Message::ConnectionStatus {
                connection_status: status,
            })
        }
        Commands::Discover { config } => {
            let config = read_config(&config)?;
            source.session(&config, today())?;
            emit(&Message::Catalog {
                catalog: source.discover(),
            })
        }
        Commands::Read { config, streams } => {
            let config = read_config(&config)?;
            read(&source, &config, &streams).await
        }
    }
}

async fn read(source: &SourceCleverTap, config: &SourceConfig, selected: &[String]) -> Result<()> {
    let session = source.session(config, today())?;
    let streams = if selected.is_empty() {
        source.streams(&session)?
    } else {
        selected
            .iter()
            .map(|name| source.stream(&session, name))
            .collect::<Result<Vec<_>, _>>()?
    };

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for stream in &streams {
        info!(stream = stream.name(), "Starting stream read");
        let mut count: u64 = 0;
        let mut records = stream.read();
        while let Some(record) = records.next().await {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    error!(stream = stream.name(), kind = e.kind(), error = %e, "Stream read failed");
                    out.flush().context("Failed to flush stdout")?;
                    return Err(e).with_context(|| format!("Failed to read stream {}", stream.name()));
                }
            };
            let message = Message::Record {
                record: RecordMessage {
                    stream: stream.name().to_string(),
                    data: record,
                    emitted_at: Utc::now().timestamp_millis(),
                },
            };
            serde_json::to_writer(&mut out, &message).context("Failed to serialize record")?;
            out.write_all(b"\n").context("Failed to write record")?;
            count += 1;
        }
        out.flush().context("Failed to flush stdout")?;
        info!(stream = stream.name(), records = count, "Finished stream read");
    }

    Ok(())
}

fn read_config(path: &Path) -> Result<SourceConfig> {
    load_config(path).with_context(|| format!("Failed to load config from {}", path.display()))
}

fn emit(message: &Message) -> Result<()> {
    let line = serde_json::to_string(message).context("Failed to serialize message")?;
    println!("{}", line);
    Ok(())
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}
