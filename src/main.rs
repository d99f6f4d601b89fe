//! Lipwave - Audio-driven avatar lip sync
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lipwave::{
    audio::AudioInput,
    config::Config,
    engine::LipSyncEngine,
    presets,
};

/// Lipwave - Audio-driven avatar lip sync engine
#[derive(Parser, Debug)]
#[command(name = "lipwave", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Audio input device (overrides config)
    #[arg(short, long)]
    device: Option<String>,

    /// Analyse a WAV file instead of a live device
    #[arg(short, long, conflicts_with = "device")]
    file: Option<PathBuf>,

    /// Built-in preset: high-quality, balanced, performance, mobile
    #[arg(short, long)]
    preset: Option<String>,

    /// List available audio input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Write a JSON state snapshot to this path on shutdown
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", lipwave::NAME, lipwave::VERSION);

    if args.list_devices {
        list_audio_devices();
        return Ok(());
    }

    let config = load_config(&args)?;
    config.validate()?;

    let input = if let Some(ref file) = args.file {
        AudioInput::File(file.clone())
    } else {
        AudioInput::Device(args.device.clone().unwrap_or_else(|| "default".to_string()))
    };

    info!(
        "Audio input: {:?}, tick {} ms, FFT {}",
        input, config.audio.update_interval_ms, config.audio.fft_size
    );

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        let mut engine = LipSyncEngine::new(config, input)?;
        engine.on_viseme_change(|from, to| {
            tracing::debug!("Viseme {} -> {}", from, to);
        });
        engine.on_error(|e| {
            tracing::warn!("Engine: {}", e);
        });
        engine.initialize()?;

        shutdown_signal().await;
        info!("Shutdown signal received");

        if let Some(ref path) = args.snapshot {
            let snapshot = engine.snapshot();
            snapshot.write_json(path)?;
            info!("State snapshot written to {}", path.display());
        }

        engine.teardown();
        Ok::<(), anyhow::Error>(())
    })?;

    info!("Lipwave stopped");
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    if let Some(ref path) = args.config {
        if args.preset.is_some() {
            anyhow::bail!("--config and --preset are mutually exclusive");
        }
        return Ok(Config::from_file(path)?);
    }
    if let Some(ref name) = args.preset {
        return Ok(presets::builtin(name)?.config);
    }
    // No explicit choice: recommend from what the host looks like
    let preset = presets::recommend(&presets::DeviceHints::detect());
    info!("Using auto-selected preset: {}", preset.name);
    Ok(preset.config)
}

fn list_audio_devices() {
    println!("Available audio input devices:\n");

    if let Some(name) = lipwave::audio::default_input_device_name() {
        println!("  * {} (default)", name);
    }

    for name in lipwave::audio::list_input_devices() {
        println!("    {}", name);
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
