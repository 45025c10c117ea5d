//! The daemon side of the control socket: accepts newline-delimited JSON
//! `Command`s and replies with a `Response`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use interprocess::local_socket::tokio::Stream;
use interprocess::local_socket::{GenericNamespaced, ListenerOptions, ToNsName};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::pipeline::Pipeline;
use crate::settings::{Settings, TranscriptionMode};
use crate::transcription::Transcriber as _;

use super::protocol::{Command, Response};

pub struct ControlServer {
    pipeline: Arc<Pipeline>,
    models_dir: PathBuf,
    settings_path: PathBuf,
    current_model: Mutex<Option<String>>,
    shutdown_requested: Arc<AtomicBool>,
}

impl ControlServer {
    pub fn new(pipeline: Arc<Pipeline>, models_dir: PathBuf, settings_path: PathBuf) -> Self {
        Self {
            pipeline,
            models_dir,
            settings_path,
            current_model: Mutex::new(None),
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown_requested(&self) -> Arc<AtomicBool> {
        self.shutdown_requested.clone()
    }

    pub async fn run(self: Arc<Self>, socket_name: &str) -> crate::error::Result<()> {
        let name = socket_name
            .to_ns_name::<GenericNamespaced>()
            .map_err(|e| crate::error::PipelineError::Stream(e.to_string()))?;

        let listener = ListenerOptions::new()
            .name(name)
            .create_tokio()
            .map_err(|e| crate::error::PipelineError::Stream(e.to_string()))?;

        info!("control socket listening on {}", socket_name);

        loop {
            if self.shutdown_requested.load(Ordering::Relaxed) {
                break;
            }

            match listener.accept().await {
                Ok(stream) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            warn!("control connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("control socket accept failed: {}", e);
                }
            }
        }

        Ok(())
    }

    async fn handle_connection(&self, stream: Stream) -> crate::error::Result<()> {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }

        let response = match serde_json::from_str::<Command>(line.trim()) {
            Ok(command) => self.dispatch(command),
            Err(e) => Response::error(format!("malformed command: {e}")),
        };

        let mut payload = serde_json::to_string(&response)?;
        payload.push('\n');
        writer.write_all(payload.as_bytes()).await?;
        Ok(())
    }

    fn dispatch(&self, command: Command) -> Response {
        debug!("dispatching control command: {:?}", command);
        match command {
            Command::Status => self.handle_status(),
            Command::Stop => {
                self.shutdown_requested.store(true, Ordering::Relaxed);
                self.pipeline.shutdown();
                Response::ok("stopping")
            }
            Command::Models => self.handle_models(),
            Command::Model { name } => self.handle_model(name),
            Command::Continuous { enabled } => self.handle_continuous(enabled),
            Command::MicWarm { enabled } => self.handle_mic_warm(enabled),
            Command::Reload => self.handle_reload(),
        }
    }

    fn handle_status(&self) -> Response {
        let state = self.pipeline.state();
        let current_model = self.current_model.lock().unwrap().clone().unwrap_or_else(|| "none".to_string());
        Response::ok(format!(
            "recording={} transcribing={} did_output={} model={}",
            state.is_recording(),
            state.is_transcribing(),
            state.did_output(),
            current_model,
        ))
    }

    fn handle_models(&self) -> Response {
        let entries = match std::fs::read_dir(&self.models_dir) {
            Ok(entries) => entries,
            Err(e) => return Response::error(format!("could not read models dir: {e}")),
        };

        let names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.ends_with(".bin"))
            .collect();

        Response::ok(names.join(", "))
    }

    fn handle_model(&self, name: String) -> Response {
        let path = self.models_dir.join(&name);
        if !path.exists() {
            return Response::error(format!("model not found: {name}"));
        }

        let settings = {
            let guard = self.settings_path.clone();
            Settings::load(&guard).unwrap_or_default()
        };

        match crate::transcription::WhisperProvider::new(
            &path,
            &settings.language,
            num_cpus_hint(),
            settings.use_gpu,
            settings.sampling,
        ) {
            Ok(provider) => {
                if let Err(e) = provider.warmup() {
                    return Response::error(format!("model warmup failed: {e}"));
                }
                self.pipeline.set_transcriber(Arc::new(provider));
                *self.current_model.lock().unwrap() = Some(name.clone());
                Response::ok(format!("loaded {name}"))
            }
            Err(e) => Response::error(e.to_string()),
        }
    }

    fn handle_continuous(&self, enabled: bool) -> Response {
        let mut settings = Settings::load(&self.settings_path).unwrap_or_default();
        settings.transcription_mode = if enabled {
            TranscriptionMode::Continuous
        } else {
            TranscriptionMode::Buffered
        };
        self.pipeline.apply_settings(settings.clone());
        if let Err(e) = settings.save(&self.settings_path) {
            warn!("failed to persist settings: {}", e);
        }
        Response::ok(format!("continuous mode set to {enabled}"))
    }

    fn handle_mic_warm(&self, enabled: bool) -> Response {
        let mut settings = Settings::load(&self.settings_path).unwrap_or_default();
        settings.keep_mic_warm = enabled;
        self.pipeline.apply_settings(settings.clone());
        if let Err(e) = settings.save(&self.settings_path) {
            warn!("failed to persist settings: {}", e);
        }
        Response::ok(format!("keep-mic-warm set to {enabled}"))
    }

    fn handle_reload(&self) -> Response {
        match Settings::load(&self.settings_path) {
            Ok(settings) => {
                self.pipeline.apply_settings(settings);
                Response::ok("settings reloaded")
            }
            Err(e) => Response::error(format!("failed to reload settings: {e}")),
        }
    }
}

fn num_cpus_hint() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(4)
}
