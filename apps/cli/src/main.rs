use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use mvsx::{ConvertConfig, IntoProgressCallback, MvsxConverter, TracingProgressReporter};
use tracing::{Level, info, warn};

#[derive(Parser, Debug)]
#[command(name = "mvsx", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Package an MVSJ document and its resources into an MVSX archive.
    Pack(PackArgs),
    /// Extract an MVSX archive.
    Unpack(UnpackArgs),
}

#[derive(Parser, Debug)]
struct PackArgs {
    /// Input MVSJ document.
    input: PathBuf,

    /// Output MVSX archive.
    output: PathBuf,

    /// Keep http/https/ftp references as-is instead of fetching them.
    #[arg(long)]
    no_fetch: bool,

    /// Base URL for external references written without a host (e.g. `https:1cbs.cif`).
    #[arg(long)]
    base_url: Option<String>,

    /// Deflate level 0-9.
    #[arg(long)]
    compression_level: Option<i64>,

    /// Maximum number of downloads in flight.
    #[arg(long)]
    max_concurrent: Option<usize>,
}

#[derive(Parser, Debug)]
struct UnpackArgs {
    /// Input MVSX archive.
    archive: PathBuf,

    /// Output directory (a fresh temporary directory when omitted).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.cmd {
        Command::Pack(args) => cmd_pack(args).await,
        Command::Unpack(args) => cmd_unpack(args).await,
    }
}

fn build_config(args: &PackArgs) -> anyhow::Result<ConvertConfig> {
    let mut config = ConvertConfig::from_env().context("read MVSX_* environment")?;
    if args.no_fetch {
        config = config.with_fetch_external(false);
    }
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url.as_str());
    }
    if let Some(level) = args.compression_level {
        config = config.with_compression_level(level);
    }
    if let Some(max) = args.max_concurrent {
        config = config.with_max_concurrent_fetches(max);
    }
    Ok(config)
}

async fn cmd_pack(args: PackArgs) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    let converter = MvsxConverter::new(config)?;

    let summary = converter
        .package_file(
            &args.input,
            &args.output,
            Some(TracingProgressReporter.into_callback()),
        )
        .await
        .with_context(|| format!("package '{}'", args.input.display()))?;

    for reference in &summary.unresolved {
        warn!("Left external reference unchanged: {}", reference);
    }
    info!(
        "Wrote {} ({} entries, {} references rewritten)",
        summary.archive.display(),
        summary.entries,
        summary.mapping.len()
    );
    Ok(())
}

async fn cmd_unpack(args: UnpackArgs) -> anyhow::Result<()> {
    let converter = MvsxConverter::new(ConvertConfig::default())?;
    let index = converter
        .unpackage(
            &args.archive,
            args.out.as_deref(),
            Some(TracingProgressReporter.into_callback()),
        )
        .await
        .with_context(|| format!("extract '{}'", args.archive.display()))?;

    println!("{}", index.display());
    Ok(())
}
