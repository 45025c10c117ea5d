use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info, warn};

use holdtotalk::control::{ControlServer, SOCKET_NAME};
use holdtotalk::input::{parse_key_name, InputHook, RdevHook};
use holdtotalk::output::EnigoInjector;
use holdtotalk::pipeline::Pipeline;
use holdtotalk::settings::Settings;
use holdtotalk::transcription::{Transcriber, WhisperProvider};

/// Push-to-talk speech-to-text daemon: capture, VAD, chunked Whisper
/// transcription, and output dispatch, driven by a global hotkey.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing `ggml-*.bin` Whisper models.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Path to the settings JSON file.
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let settings_path = match args.settings {
        Some(p) => p,
        None => Settings::default_settings_path()?,
    };
    let settings = Settings::load(&settings_path)?;

    let models_dir = args
        .models_dir
        .unwrap_or(Settings::default_config_dir()?.join("models"));

    let injector = Arc::new(EnigoInjector::new().context("failed to initialize text injector")?);
    let pipeline = Arc::new(Pipeline::new(injector, settings.clone()));

    match first_available_model(&models_dir) {
        Some(model_path) => load_model(&pipeline, &model_path, &settings),
        None => warn!(
            "no model found in {:?}; load one with `holdtotalkctl model <name>`",
            models_dir
        ),
    }

    let mut hook = RdevHook::new();
    let primary = parse_key_name(&settings.hotkeys.primary_key).unwrap_or(rdev::Key::F13);
    let send = parse_key_name(&settings.hotkeys.send_key).unwrap_or(rdev::Key::F14);
    hook.set_key_codes(primary, send);

    let pipeline_down = pipeline.clone();
    let pipeline_up = pipeline.clone();
    let release_delay_ms = settings.release_delay_ms;

    hook.set_callbacks(
        Box::new(move |_is_send| {
            if let Err(e) = pipeline_down.start_recording() {
                error!("failed to start recording: {}", e);
            }
        }),
        Box::new(move |is_send| {
            let pipeline = pipeline_up.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(release_delay_ms as u64));
                let _ = pipeline.stop_recording_and_transcribe(is_send);
            });
        }),
    );

    hook.start().context("failed to start hotkey listener")?;
    info!("hotkey listener started");

    let control_server = Arc::new(ControlServer::new(pipeline.clone(), models_dir, settings_path));
    let shutdown_flag = control_server.shutdown_requested();
    let server_handle = tokio::spawn(control_server.run(SOCKET_NAME));

    tokio::signal::ctrl_c().await.ok();
    info!("received ctrl-c, shutting down");
    shutdown_flag.store(true, Ordering::Relaxed);
    hook.stop();
    pipeline.shutdown();
    let _ = server_handle.await;

    Ok(())
}

fn load_model(pipeline: &Arc<Pipeline>, model_path: &std::path::Path, settings: &Settings) {
    match WhisperProvider::new(
        model_path,
        &settings.language,
        num_cpus_hint(),
        settings.use_gpu,
        settings.sampling,
    ) {
        Ok(provider) => {
            if let Err(e) = provider.warmup() {
                warn!("model warmup failed: {}", e);
            }
            pipeline.set_transcriber(Arc::new(provider));
            info!("loaded model {:?}", model_path);
        }
        Err(e) => error!("failed to load model {:?}: {}", model_path, e),
    }
}

fn first_available_model(models_dir: &std::path::Path) -> Option<PathBuf> {
    let mut entries: Vec<_> = std::fs::read_dir(models_dir).ok()?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());
    entries
        .into_iter()
        .map(|e| e.path())
        .find(|p| p.extension().map(|ext| ext == "bin").unwrap_or(false))
}

fn num_cpus_hint() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(4)
}
