use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::Rng;
use specwatch::config::{self, Colormap, Settings, SourceKind};
use specwatch::display::{ConsoleVisualizer, DisplayFormat};
use specwatch::source::encode_record;
use specwatch::state::Phase;
use specwatch::{Session, SessionConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "specwatch")]
#[command(about = "Sliding-window spectrogram acquisition with FITS/PNG snapshots")]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire samples, show the running average and save snapshots
    ///
    /// While running, type `p` + Enter to pause/resume, `s` to save now and
    /// `q` to stop. Ctrl-C also stops; a final snapshot is saved either way.
    Observe {
        /// Sampling frequency in Hz
        #[arg(long)]
        fs: String,

        /// Frequency bins per sample
        #[arg(long)]
        nfft: String,

        /// Sample source (synthetic or socket)
        #[arg(long)]
        source: Option<SourceKind>,

        /// TCP port for the socket source
        #[arg(long)]
        port: Option<String>,

        /// Directory for saved snapshots
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Raster colormap (spectral, viridis or gray)
        #[arg(long)]
        colormap: Option<Colormap>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Print a status line every N render ticks
        #[arg(long, default_value = "10")]
        every: u64,

        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration: Option<f64>,
    },

    /// Stream random records to a listening socket session
    Feed {
        /// Host to connect to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to connect to
        #[arg(long, default_value = "9999")]
        port: u16,

        /// Frequency bins per record
        #[arg(long)]
        nfft: usize,

        /// Seconds between records
        #[arg(long, default_value = "0.02")]
        interval: f64,

        /// Number of records to send (default: until interrupted)
        #[arg(long)]
        count: Option<u64>,
    },

    /// Show the settings file location and effective settings
    Config {
        /// Write the default settings file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormat {
    Text,
    Json,
}

impl From<OutputFormat> for DisplayFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => DisplayFormat::Text,
            OutputFormat::Json => DisplayFormat::Json,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

#[allow(clippy::too_many_arguments)]
async fn observe(
    fs: String,
    nfft: String,
    source: Option<SourceKind>,
    port: Option<String>,
    output_dir: Option<PathBuf>,
    colormap: Option<Colormap>,
    format: OutputFormat,
    every: u64,
    duration: Option<f64>,
) -> Result<()> {
    let duration = duration
        .map(Duration::try_from_secs_f64)
        .transpose()
        .context("Invalid --duration")?
        .filter(|d| !d.is_zero());

    let mut settings = Settings::load();
    if let Some(source) = source {
        settings.source = source;
    }
    if let Some(dir) = output_dir {
        settings.output_dir = dir;
    }
    if let Some(colormap) = colormap {
        settings.colormap = colormap;
    }

    let config = SessionConfig::parse(&settings, &fs, &nfft, port.as_deref())
        .context("Invalid session parameters")?;
    let visualizer = Arc::new(ConsoleVisualizer::new(format.into(), every));
    let session = Session::start(config, visualizer)
        .await
        .context("Failed to start session")?;

    if let Some(addr) = session.local_addr() {
        eprintln!("Listening on {}", addr);
    }

    let deadline = async {
        match duration {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }
            _ = &mut deadline => break,
            line = commands.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "p" | "pause" => {
                        let phase = session.toggle_pause();
                        if phase == Phase::Paused {
                            eprintln!("Paused (p to resume)");
                        }
                    }
                    "s" | "save" => match session.save_now().await {
                        Ok(Some(files)) => eprintln!("Saved {}", files.data.display()),
                        Ok(None) => eprintln!("Nothing to save yet"),
                        Err(e) => eprintln!("Save failed: {}", e),
                    },
                    "q" | "quit" | "stop" => break,
                    "" => {}
                    other => eprintln!("Unknown command: {} (p, s, q)", other),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    log::debug!("stdin closed: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    match session.stop().await {
        Ok(Some(files)) => eprintln!("Final snapshot: {}", files.data.display()),
        Ok(None) => eprintln!("Nothing captured, no final snapshot"),
        Err(e) => eprintln!("Final save failed: {}", e),
    }
    Ok(())
}

async fn feed(host: String, port: u16, nfft: usize, interval: f64, count: Option<u64>) -> Result<()> {
    anyhow::ensure!(nfft > 0, "nfft must be positive");
    let period = Duration::try_from_secs_f64(interval).context("Invalid --interval")?;
    anyhow::ensure!(!period.is_zero(), "interval must be positive");

    let mut stream = TcpStream::connect((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to connect to {}:{}", host, port))?;
    log::info!("Connected to {}:{}", host, port);

    let mut ticker = tokio::time::interval(period);
    let mut rng = rand::thread_rng();
    let mut sent = 0u64;

    loop {
        if count.is_some_and(|limit| sent >= limit) {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        let record: Vec<f32> = (0..nfft).map(|_| rng.gen_range(0.0..100.0)).collect();
        if let Err(e) = stream.write_all(&encode_record(&record)).await {
            log::warn!("Peer went away after {} records: {}", sent, e);
            return Ok(());
        }
        sent += 1;
    }

    stream.shutdown().await.ok();
    eprintln!("Sent {} records", sent);
    Ok(())
}

fn show_config(init: bool) -> Result<()> {
    let path = config::require_config_path()?;
    if init && !path.exists() {
        Settings::default()
            .save_to(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Wrote default settings");
    }

    let settings = Settings::load();
    println!("# {}", path.display());
    print!("{}", settings.to_toml()?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Observe {
            fs,
            nfft,
            source,
            port,
            output_dir,
            colormap,
            format,
            every,
            duration,
        } => {
            observe(
                fs, nfft, source, port, output_dir, colormap, format, every, duration,
            )
            .await
        }
        Commands::Feed {
            host,
            port,
            nfft,
            interval,
            count,
        } => feed(host, port, nfft, interval, count).await,
        Commands::Config { init } => show_config(init),
    }
}
