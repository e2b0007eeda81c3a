//! candle-loader: push MT4/MT5 CSV history exports into the market API.
//!
//! The symbol is taken from each file name (`EURUSD1.csv`, `XAUUSD_D1.csv`) unless
//! `--symbol` is given. Rows are sent to `/candles/upsert` in batches; rows already
//! stored are skipped by the server.
//!
//! Usage:
//!   cargo run -p candle-loader -- EURUSD1.csv GBPUSD1.csv
//!   cargo run -p candle-loader -- export.csv --symbol XAUUSD --header
//!   cargo run -p candle-loader -- *.csv --dry-run

mod mt_csv;
mod symbol;

use anyhow::{bail, Context};
use market_core::symbols;
use std::path::{Path, PathBuf};
use terminal_client::TerminalClient;

const DEFAULT_BATCH: usize = 5000;

#[derive(Debug, Clone, PartialEq)]
struct LoaderArgs {
    files: Vec<PathBuf>,
    symbol: Option<String>,
    has_header: bool,
    batch: usize,
    api_url: Option<String>,
    dry_run: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<LoaderArgs> {
    let mut parsed = LoaderArgs {
        files: Vec::new(),
        symbol: None,
        has_header: false,
        batch: DEFAULT_BATCH,
        api_url: None,
        dry_run: false,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--header" => parsed.has_header = true,
            "--dry-run" => parsed.dry_run = true,
            "--symbol" => {
                let value = iter.next().context("--symbol needs a value")?;
                parsed.symbol = Some(value.trim().to_uppercase());
            }
            "--batch" => {
                let value = iter.next().context("--batch needs a value")?;
                parsed.batch = value
                    .parse()
                    .with_context(|| format!("invalid --batch '{}'", value))?;
                if parsed.batch == 0 {
                    bail!("--batch must be greater than 0");
                }
            }
            "--api" => {
                let value = iter.next().context("--api needs a value")?;
                parsed.api_url = Some(value.clone());
            }
            flag if flag.starts_with("--") => bail!("unknown option {}", flag),
            file => parsed.files.push(PathBuf::from(file)),
        }
    }

    if parsed.files.is_empty() {
        bail!("no input files");
    }
    if parsed.symbol.is_some() && parsed.files.len() > 1 {
        bail!("--symbol can only be used with a single file");
    }

    Ok(parsed)
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  candle-loader FILE.csv [FILE.csv ...]    Symbol inferred from each file name");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --symbol S      Use S instead of the file name (single file only)");
    eprintln!("  --header        First row of each file is a header");
    eprintln!("  --batch N       Candles per upload request (default: {})", DEFAULT_BATCH);
    eprintln!("  --api URL       Market API base URL (default: $TERMINAL_API_URL or {})", terminal_client::DEFAULT_API_URL);
    eprintln!("  --dry-run       Parse and report without uploading");
}

fn symbol_for(path: &Path, explicit: Option<&str>) -> anyhow::Result<String> {
    if let Some(symbol) = explicit {
        return Ok(symbol.to_string());
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("cannot infer symbol from {}", path.display()))?;
    let symbol = symbol::normalize_symbol(stem);
    if symbol.is_empty() {
        bail!("cannot infer symbol from {}", path.display());
    }
    Ok(symbol)
}

/// Outcome of loading one file.
#[derive(Debug, Clone, Default, PartialEq)]
struct FileSummary {
    symbol: String,
    parsed: usize,
    received: usize,
    inserted: u64,
    batches: usize,
}

/// Totals over every file of a run.
#[derive(Debug, Clone, Default, PartialEq)]
struct RunSummary {
    files: usize,
    received: usize,
    inserted: u64,
    failed: usize,
}

async fn load_file(
    client: &TerminalClient,
    path: &Path,
    args: &LoaderArgs,
) -> anyhow::Result<FileSummary> {
    let symbol = symbol_for(path, args.symbol.as_deref())?;
    if !symbols::contains(&symbol) {
        tracing::warn!("{} is not in the symbol catalog; loading anyway", symbol);
    }

    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let candles = mt_csv::parse_candles(file, args.has_header)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let mut summary = FileSummary {
        symbol: symbol.clone(),
        parsed: candles.len(),
        ..FileSummary::default()
    };

    if candles.is_empty() {
        tracing::warn!("{}: no rows", path.display());
        return Ok(summary);
    }

    tracing::info!(
        "{}: {} candles for {} ({} .. {})",
        path.display(),
        candles.len(),
        symbol,
        candles[0].ts,
        candles[candles.len() - 1].ts
    );

    if args.dry_run {
        return Ok(summary);
    }

    for (i, chunk) in candles.chunks(args.batch).enumerate() {
        let batch = client
            .upsert_candles(&symbol, chunk)
            .await
            .with_context(|| format!("{}: batch {} failed", path.display(), i + 1))?;
        summary.received += batch.received;
        summary.inserted += batch.inserted;
        summary.batches += 1;
        tracing::debug!(
            "{}: batch {} received={} inserted={}",
            symbol,
            i + 1,
            batch.received,
            batch.inserted
        );
    }

    tracing::info!(
        "{}: received={} inserted={} skipped={}",
        symbol,
        summary.received,
        summary.inserted,
        summary.received as u64 - summary.inserted
    );
    Ok(summary)
}

/// Load every file in order; a failing file is logged and the rest still load.
async fn load_all(client: &TerminalClient, args: &LoaderArgs) -> RunSummary {
    let mut run = RunSummary {
        files: args.files.len(),
        ..RunSummary::default()
    };

    for path in &args.files {
        match load_file(client, path, args).await {
            Ok(file) => {
                run.received += file.received;
                run.inserted += file.inserted;
            }
            Err(e) => {
                run.failed += 1;
                tracing::error!("{:#}", e);
            }
        }
    }

    run
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "candle_loader=info,terminal_client=warn".into()),
        )
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    let client = match &args.api_url {
        Some(url) => TerminalClient::new(url.clone()),
        None => TerminalClient::from_env(),
    };

    if args.dry_run {
        tracing::info!("Dry run: nothing will be uploaded");
    } else {
        client
            .health()
            .await
            .with_context(|| format!("market API at {} is not reachable", client.base_url()))?;
    }

    let run = load_all(&client, &args).await;

    tracing::info!(
        "Done: {} files, {} candles, {} inserted, {} failed",
        run.files,
        run.received,
        run.inserted,
        run.failed
    );

    if run.failed > 0 {
        bail!("{} of {} files failed", run.failed, run.files);
    }
    Ok(())
}
