use clap::Parser;
use mbtiles_png::config::{self, DecodeErrorPolicy};
use mbtiles_png::convert::{self, ConvertError};
use mbtiles_png::output;
use mbtiles_png::schema::SchemaError;
use std::path::PathBuf;
use std::process::ExitCode;

/// Wrong number of arguments or unknown flags.
const EXIT_USAGE: u8 = 1;
/// Output archive lacks the map/images tables.
const EXIT_SCHEMA: u8 = 2;
/// Any other failure: config, storage, or a tile that would not transcode.
const EXIT_FAILURE: u8 = 3;

#[derive(Parser)]
#[command(name = "mbtiles-png")]
#[command(about = "Convert the JPEG tiles of an MBTiles archive to PNG")]
#[command(long_about = "\
Convert the JPEG tiles of an MBTiles archive to PNG

INPUT is copied to OUTPUT first and never modified. Every tile in OUTPUT
whose payload starts with a JPEG signature is re-encoded as PNG; all other
tiles stay byte-identical. The 'format' metadata entry is set to 'png'.

Only the normalized map/images layout is supported. Archives without both
tables are rejected with exit status 2.

Exit status:
  0  success
  1  invalid invocation (including --help and --version)
  2  archive does not use the map/images schema
  3  any other failure

Set RUST_LOG (e.g. RUST_LOG=debug) for diagnostic logging on stderr.")]
#[command(version)]
struct Cli {
    /// Source MBTiles archive (read-only)
    input: PathBuf,

    /// Output MBTiles archive (created or overwritten)
    output: PathBuf,

    /// TOML file overriding the stock conversion settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tiles per atomic window (overrides batch.size)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Leave undecodable JPEG tiles unchanged instead of aborting
    #[arg(long)]
    skip_corrupt: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too; they convert nothing, so
            // they are usage exits like any other invocation without two paths.
            let _ = e.print();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(RunError::Convert(ConvertError::Schema(e @ SchemaError::MissingTables { .. }))) => {
            eprintln!("ERROR: {e}");
            ExitCode::from(EXIT_SCHEMA)
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

fn run(cli: &Cli) -> Result<(), RunError> {
    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(size) = cli.batch_size {
        config.batch.size = size;
    }
    if cli.skip_corrupt {
        config.processing.on_decode_error = DecodeErrorPolicy::Skip;
    }
    config.validate()?;
    init_thread_pool(&config.processing);

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_convert_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = convert::convert(&cli.input, &cli.output, &config, Some(tx));
    // The sender is gone once `convert` returns, so the printer drains and exits.
    if printer.join().is_err() {
        tracing::warn!("progress printer panicked");
    }
    result?;
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
