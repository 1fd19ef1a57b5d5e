use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epg_mapper::{
    config::Config,
    errors::ParseError,
    matching::{NameNormalization, StrategyKind},
    session::{ExportFormat, MappingSession, export_mappings},
    utils::DecompressionService,
    xmltv::{
        ScanReport, build_programme_counts_from_reader, lookup_programmes_from_reader,
        parse_channels_from_reader,
    },
};

#[derive(Parser)]
#[command(name = "epg-mapper")]
#[command(version)]
#[command(about = "Match IPTV provider channels to XMLTV guide channels and inspect EPG files")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (created with defaults if missing)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides config file)
    #[arg(short = 'v', long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the channel directory of an XMLTV file as JSON
    Channels {
        /// XMLTV file, optionally gzip-compressed
        epg: PathBuf,
    },

    /// Print the number of programmes per channel id as JSON
    Counts {
        /// XMLTV file, optionally gzip-compressed
        epg: PathBuf,
    },

    /// Print the programmes of one channel as JSON
    Programmes {
        /// XMLTV file, optionally gzip-compressed
        epg: PathBuf,

        /// XMLTV channel id (case-insensitive)
        channel_id: String,

        /// Maximum number of programmes to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Match provider streams against an XMLTV file and export the associations
    Match {
        /// Provider stream list (JSON array, e.g. Xtream get_live_streams)
        #[arg(short, long)]
        streams: PathBuf,

        /// XMLTV file, optionally gzip-compressed
        #[arg(short, long)]
        epg: PathBuf,

        /// Minimum similarity; a pair must score strictly above it
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Assignment strategy (greedy, exclusive)
        #[arg(long)]
        strategy: Option<StrategyKind>,

        /// Name normalization (case-fold, strip-quality-tags)
        #[arg(long)]
        normalize: Option<NameNormalization>,

        /// Export format (json, csv, txt)
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Write the export to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };

    let log_level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("epg_mapper={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting EPG mapper v{}", env!("CARGO_PKG_VERSION"));

    let decompression = DecompressionService::new(config.indexer.compressed_suffixes.clone());

    match cli.command {
        Commands::Channels { epg } => {
            let reader = open_epg(&decompression, &epg)?;
            let channels = parse_channels_from_reader(reader)
                .with_context(|| format!("Failed to parse channels from {}", epg.display()))?;
            print_json(&channels)?;
        }
        Commands::Counts { epg } => {
            let reader = open_epg(&decompression, &epg)?;
            let (counts, report) = build_programme_counts_from_reader(reader);
            ensure_decodable(&report, &epg)?;
            info!(
                channels = counts.len(),
                elements = report.elements_released,
                complete = report.is_complete(),
                "Counted programmes"
            );
            print_json(&counts)?;
        }
        Commands::Programmes { epg, channel_id, limit } => {
            let reader = open_epg(&decompression, &epg)?;
            let limit = limit.unwrap_or(config.indexer.lookup_limit);
            let (lookup, report) = lookup_programmes_from_reader(reader, &channel_id, limit);
            ensure_decodable(&report, &epg)?;
            print_json(&lookup)?;
        }
        Commands::Match {
            streams,
            epg,
            threshold,
            strategy,
            normalize,
            format,
            output,
        } => {
            let mut options = config.match_options();
            if let Some(threshold) = threshold {
                options.threshold = threshold;
            }
            if let Some(strategy) = strategy {
                options.strategy = strategy;
            }
            if let Some(normalize) = normalize {
                options.normalization = normalize;
            }

            let mut session = MappingSession::new().with_decompression(decompression);
            let json = std::fs::read_to_string(&streams)
                .with_context(|| format!("Failed to read provider streams from {}", streams.display()))?;
            session
                .load_provider_json(&json)
                .with_context(|| format!("Failed to load provider streams from {}", streams.display()))?;
            session
                .load_epg_file(&epg)
                .with_context(|| format!("Failed to load EPG from {}", epg.display()))?;

            let matched = session.auto_match(&options)?;
            info!(
                matched,
                providers = session.provider_channels().len(),
                "Auto-match applied"
            );

            let rendered = export_mappings(&session, format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write export to {}", path.display()))?;
                    info!("Wrote {} export to {}", format, path.display());
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(rendered.as_bytes())?;
                    stdout.flush()?;
                }
            }
        }
    }

    Ok(())
}

fn open_epg(decompression: &DecompressionService, path: &Path) -> Result<Box<dyn std::io::BufRead>> {
    decompression
        .open_reader(path)
        .with_context(|| format!("Failed to open EPG file {}", path.display()))
}

/// Partial results are fine for a damaged document, not for one that is not text
fn ensure_decodable(report: &ScanReport, path: &Path) -> Result<()> {
    if let Some(ParseError::Decode(err)) = &report.error {
        return Err(err.clone())
            .with_context(|| format!("Failed to decode EPG file {}", path.display()));
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
