use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::net::UdpSocket;

use firemix_audio::config::{AppConfig, BucketMapSource, DEFAULT_PORT};
use firemix_audio::engine::backend::{
    list_input_devices, CpalBackend, FeederBackend, Pacing, SyntheticSource, SyntheticSpec,
    WavSource,
};
use firemix_audio::engine::{AudioBackend, Engine, ShutdownReason};
use firemix_audio::spectrum::LogSpacedLayout;
use firemix_audio::transport::decode;

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "firemix.json";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.execute().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("firemix_audio error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        tracing::Level::ERROR
    } else {
        match verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Parser, Debug)]
#[command(
    name = "firemix_audio",
    about = "Analyze live or recorded audio and stream onset, pitch and spectrum datagrams over UDP"
)]
struct Cli {
    /// JSON configuration file (defaults to ./firemix.json when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    async fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        match self.command {
            Command::Run(args) => run_command(config, args).await,
            Command::Replay(args) => replay_command(config, args).await,
            Command::Simulate(args) => simulate_command(config, args).await,
            Command::Buckets(args) => buckets_command(config, args),
            Command::Listen(args) => listen_command(args).await,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a live input device.
    Run(RunArgs),
    /// Analyze a WAV file as if it were arriving from a device.
    Replay(ReplayArgs),
    /// Analyze a generated tone with periodic clicks.
    Simulate(SimulateArgs),
    /// Print the bucket map the current settings would use, as JSON.
    Buckets(BucketsArgs),
    /// Receive datagrams and print them as JSON lines.
    Listen(ListenArgs),
}

#[derive(Args, Debug, Clone)]
struct DestinationArgs {
    /// Destination host (overrides network.host).
    #[arg(long)]
    host: Option<String>,
    /// Destination UDP port (overrides network.port).
    #[arg(long)]
    port: Option<u16>,
}

impl DestinationArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.network.host = host.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
    }
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[command(flatten)]
    destination: DestinationArgs,
    /// Input device name (overrides audio.device).
    #[arg(long)]
    device: Option<String>,
    /// List input devices and exit.
    #[arg(long)]
    list_devices: bool,
}

#[derive(Args, Debug, Clone)]
struct ReplayArgs {
    #[command(flatten)]
    destination: DestinationArgs,
    /// WAV file to analyze; only the first channel is used.
    input: PathBuf,
    /// Deliver blocks at the file's own sample rate instead of as fast as possible.
    #[arg(long)]
    realtime: bool,
    /// Samples per delivered block.
    #[arg(long, default_value_t = 512)]
    block_frames: usize,
}

#[derive(Args, Debug, Clone)]
struct SimulateArgs {
    #[command(flatten)]
    destination: DestinationArgs,
    /// Seconds of signal to generate; 0 runs until interrupted.
    #[arg(long, default_value_t = 10.0)]
    duration: f32,
    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,
    /// Frequency of the sustained tone.
    #[arg(long, default_value_t = 440.0)]
    tone_hz: f32,
    /// Milliseconds between clicks; 0 disables them.
    #[arg(long, default_value_t = 500.0)]
    click_interval_ms: f32,
    /// Peak amplitude of the uniform noise floor.
    #[arg(long, default_value_t = 0.01)]
    noise: f32,
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Generate as fast as possible instead of in real time.
    #[arg(long)]
    unpaced: bool,
    /// Samples per delivered block.
    #[arg(long, default_value_t = 512)]
    block_frames: usize,
}

#[derive(Args, Debug, Clone)]
struct BucketsArgs {
    /// Sample rate the layout is generated for.
    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,
    /// Window size (overrides analysis.window_size).
    #[arg(long)]
    window_size: Option<usize>,
    /// Number of buckets (generated layouts only).
    #[arg(long)]
    buckets: Option<usize>,
    /// Write the map here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct ListenArgs {
    /// Local address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Exit after this many datagrams.
    #[arg(long)]
    count: Option<usize>,
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Ok(AppConfig::load_or_default(DEFAULT_CONFIG_FILE))
        }
        None => Ok(AppConfig::default()),
    }
}

async fn run_command(mut config: AppConfig, args: RunArgs) -> Result<()> {
    if args.list_devices {
        for name in list_input_devices().context("failed to list input devices")? {
            println!("{name}");
        }
        return Ok(());
    }

    args.destination.apply(&mut config);
    if args.device.is_some() {
        config.audio.device = args.device;
    }

    let backend = CpalBackend::open(&config.audio).context("failed to open input device")?;
    run_engine(&config, Box::new(backend)).await
}

async fn replay_command(mut config: AppConfig, args: ReplayArgs) -> Result<()> {
    args.destination.apply(&mut config);
    let source = WavSource::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    if source.is_empty() {
        bail!("{} contains no samples", args.input.display());
    }
    let pacing = if args.realtime {
        Pacing::Realtime
    } else {
        Pacing::Unpaced
    };
    let backend = FeederBackend::new(Box::new(source), args.block_frames, pacing);
    run_engine(&config, Box::new(backend)).await
}

async fn simulate_command(mut config: AppConfig, args: SimulateArgs) -> Result<()> {
    args.destination.apply(&mut config);
    let spec = SyntheticSpec {
        sample_rate: args.sample_rate,
        duration_secs: (args.duration > 0.0).then_some(args.duration),
        tone_hz: args.tone_hz,
        click_interval_ms: args.click_interval_ms,
        noise_amplitude: args.noise,
        seed: args.seed,
        ..SyntheticSpec::default()
    };
    let pacing = if args.unpaced {
        Pacing::Unpaced
    } else {
        Pacing::Realtime
    };
    let backend = FeederBackend::new(Box::new(SyntheticSource::new(spec)), args.block_frames, pacing);
    run_engine(&config, Box::new(backend)).await
}

/// Run until the input ends, the device is lost or Ctrl-C arrives
async fn run_engine(config: &AppConfig, backend: Box<dyn AudioBackend>) -> Result<()> {
    let engine = Engine::start(config, backend)
        .await
        .context("failed to start engine")?;
    let shutdown = engine.shutdown_signal();

    tokio::select! {
        _ = shutdown.wait() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl-C")?;
            tracing::info!("interrupted");
            shutdown.trigger(ShutdownReason::Interrupted);
        }
    }

    let totals = engine
        .stop(ShutdownReason::Requested)
        .await
        .context("failed to stop input")?;
    tracing::info!(
        windows = totals.windows,
        spectra = totals.spectra,
        onsets = totals.onsets,
        pitches = totals.pitches,
        sent = totals.datagrams_sent,
        dropped = totals.events_dropped,
        "session totals"
    );

    match shutdown.reason() {
        Some(ShutdownReason::DeviceLost(reason)) => bail!("input device lost: {reason}"),
        _ => Ok(()),
    }
}

fn buckets_command(mut config: AppConfig, args: BucketsArgs) -> Result<()> {
    if let Some(window_size) = args.window_size {
        config.analysis.window_size = window_size;
    }
    if let Some(count) = args.buckets {
        config.spectrum.bucket_map = match config.spectrum.bucket_map {
            BucketMapSource::LogSpaced(layout) => BucketMapSource::LogSpaced(LogSpacedLayout {
                bucket_count: count,
                ..layout
            }),
            BucketMapSource::File { .. } => bail!("--buckets only applies to generated layouts"),
        };
    }

    let map = config
        .spectrum
        .bucket_map
        .load(config.analysis.window_size, args.sample_rate)
        .context("failed to build bucket map")?;
    let json = map.to_json_pretty().context("failed to serialize bucket map")?;

    match args.output {
        Some(path) => std::fs::write(&path, json + "\n")
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

async fn listen_command(args: ListenArgs) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", args.bind, args.port))?;
    let socket = UdpSocket::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening for datagrams on {}", addr);

    let mut buf = vec![0u8; 65_536];
    let mut received = 0usize;
    loop {
        if args.count.is_some_and(|limit| received >= limit) {
            return Ok(());
        }

        let len = tokio::select! {
            result = socket.recv(&mut buf) => result.context("receive failed")?,
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl-C")?;
                return Ok(());
            }
        };
        received += 1;

        match decode(&buf[..len]) {
            Ok(datagram) => println!("{}", serde_json::to_string(&datagram)?),
            Err(err) => tracing::warn!("{}", err),
        }
    }
}
