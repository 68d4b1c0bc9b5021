//! Mirror Audio Player (mirror-ap) - Main entry point
//!
//! Plays a captured stream of length-prefixed compressed frames through the
//! mirroring audio renderer, one frame per render call, exactly as the
//! streaming layer would feed it.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use mirror_ap::audio::DecoderKind;
use mirror_ap::config::BootstrapConfig;
use mirror_ap::frames::FrameReader;
use mirror_ap::renderer::{AudioRenderer, ErrorPolicy, MirrorRenderer};

/// Command-line arguments for mirror-ap
#[derive(Parser, Debug)]
#[command(name = "mirror-ap")]
#[command(about = "Mirroring audio renderer: AAC-ELD decode to ALSA output")]
#[command(version)]
struct Args {
    /// Config file (overrides MIRROR_AP_CONFIG and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output device name
    #[arg(short, long, env = "MIRROR_AP_DEVICE")]
    device: Option<String>,

    /// Frame file to play (u16 big-endian length + payload per frame)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Sender volume to apply before playback (0.0 = full scale)
    #[arg(long, allow_hyphen_values = true)]
    volume: Option<f32>,

    /// Return the first runtime error instead of logging it
    #[arg(long)]
    strict: bool,

    /// Failed writes in a row before the device counts as lost
    #[arg(long)]
    max_failures: Option<u32>,

    /// Decoder backend (fdk, symphonia)
    #[arg(long)]
    decoder: Option<DecoderKind>,

    /// Append decoded audio to this WAV file
    #[arg(long, env = "MIRROR_AP_DUMP_PCM")]
    dump_pcm: Option<PathBuf>,

    /// List playback devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = BootstrapConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    mirror_common::logging::init_tracing(&config.logging)
        .context("Failed to initialize logging")?;

    if args.list_devices {
        return list_devices();
    }

    let renderer_config = &mut config.renderer;
    if let Some(device) = args.device {
        renderer_config.device = device;
    }
    if args.strict {
        renderer_config.error_policy = ErrorPolicy::Strict;
    }
    if let Some(limit) = args.max_failures {
        renderer_config.max_consecutive_failures = Some(limit);
    }
    if let Some(decoder) = args.decoder {
        renderer_config.decoder = decoder;
    }
    if let Some(path) = args.dump_pcm {
        renderer_config.dump_pcm = Some(path);
    }

    info!(
        "Starting mirror-ap on device '{}'",
        config.renderer.device_name()
    );

    let frame_length = config
        .renderer
        .audio_specific_config()
        .context("Invalid codec configuration")?
        .frame_length();
    let strict = config.renderer.error_policy.is_strict();

    let renderer = Arc::new(
        MirrorRenderer::create(&config.renderer, None).context("Failed to create audio renderer")?,
    );
    renderer.start();

    if let Some(volume) = args.volume {
        renderer
            .set_volume(volume)
            .with_context(|| format!("Failed to set volume {}", volume))?;
    }

    let Some(input) = args.input else {
        info!("No input file given; renderer initialized, exiting");
        renderer.destroy();
        return Ok(());
    };

    let stop = Arc::new(AtomicBool::new(false));
    let mut worker = tokio::task::spawn_blocking({
        let renderer = Arc::clone(&renderer);
        let stop = Arc::clone(&stop);
        move || play_file(renderer.as_ref(), &input, u64::from(frame_length), strict, &stop)
    });

    let finished = tokio::select! {
        res = &mut worker => Some(res),
        _ = shutdown_signal() => None,
    };
    let joined = match finished {
        Some(res) => res,
        None => {
            stop.store(true, Ordering::Relaxed);
            worker.await
        }
    };

    let played = joined.context("Render task panicked")?;
    renderer.destroy();
    let frames = played.context("Playback failed")?;

    let stats = renderer.stats();
    info!(
        "Played {} frames: {} written, {} decode errors, {} underruns, {} recoveries",
        frames, stats.frames_written, stats.decode_errors, stats.underruns, stats.recoveries
    );
    Ok(())
}

/// Feed every frame of `path` to `renderer`, pacing on the device.
///
/// # Returns
/// Number of frames read
fn play_file(
    renderer: &dyn AudioRenderer,
    path: &Path,
    frame_length: u64,
    strict: bool,
    stop: &AtomicBool,
) -> mirror_ap::Result<u64> {
    let file = File::open(path)?;
    let mut reader = FrameReader::new(BufReader::new(file));
    let mut pts = 0u64;

    while !stop.load(Ordering::Relaxed) {
        let Some(frame) = reader.next_frame()? else {
            break;
        };

        match renderer.render_buffer(None, &frame, pts) {
            Ok(_) => {}
            Err(mirror_ap::Error::FrameContract(reason)) if !strict => {
                warn!("Skipping frame {}: {}", reader.frames(), reason);
            }
            Err(e) => return Err(e),
        }
        pts = pts.wrapping_add(frame_length);
    }

    Ok(reader.frames())
}

#[cfg(target_os = "linux")]
fn list_devices() -> Result<()> {
    let devices = mirror_ap::audio::alsa_host::AlsaHost::list_devices()
        .context("Failed to enumerate playback devices")?;
    for device in devices {
        match device.description {
            Some(description) => println!("{}\n    {}", device.name, description.replace('\n', "\n    ")),
            None => println!("{}", device.name),
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn list_devices() -> Result<()> {
    anyhow::bail!("Device listing requires ALSA (Linux)")
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
