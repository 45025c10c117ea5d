//! The controller: owns capture, VAD config, the active Transcriber,
//! output mode, and both drive loops (buffered transcribe-on-release and
//! continuous pause-driven).

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::audio::AudioCapture;
use crate::chunker::{self, MAX_CHUNK_SAMPLES};
use crate::hallucination;
use crate::output::TextInjector;
use crate::settings::{Settings, TranscriptionMode};
use crate::transcription::{Transcriber, TranscriptionResult};

/// Minimum samples (16 kHz) a buffered-mode recording must contain before
/// a final transcription is attempted.
const MIN_SAMPLES: usize = 8_000;
/// Minimum samples (16 kHz) a continuous-mode tick must have drained
/// before it bothers scheduling a transcribe.
const CONTINUOUS_MIN_SAMPLES: usize = 24_000;
const MONITOR_TICK: Duration = Duration::from_millis(150);
const PAUSE_SILENCE_TICKS: u32 = 3;
const CONTINUOUS_BUFFER_FULL_SECONDS: f64 = 25.0;
const LAST_CONTEXT_MAX_CHARS: usize = 500;
const LAST_CONTEXT_TRUNCATE_KEEP: usize = 300;
const CONTEXT_PROMPT_CHARS: usize = 200;

/// Runtime state shared between the capture thread, the monitor thread,
/// and whichever thread calls `stop_recording_and_transcribe`.
#[derive(Default)]
pub struct PipelineState {
    recording: AtomicBool,
    transcribing: AtomicBool,
    did_output: AtomicBool,
    last_context_text: Mutex<String>,
    silence_frame_count: AtomicU32,
}

impl PipelineState {
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    pub fn is_transcribing(&self) -> bool {
        self.transcribing.load(Ordering::Relaxed)
    }

    pub fn did_output(&self) -> bool {
        self.did_output.load(Ordering::Relaxed)
    }

    fn push_context(&self, text: &str) {
        let mut context = self.last_context_text.lock().unwrap();
        context.push(' ');
        context.push_str(text);
        if context.chars().count() > LAST_CONTEXT_MAX_CHARS {
            *context = tail_chars(&context, LAST_CONTEXT_TRUNCATE_KEEP);
        }
    }

    fn context_prompt(&self) -> Option<String> {
        let context = self.last_context_text.lock().unwrap();
        if context.trim().is_empty() {
            None
        } else {
            Some(tail_chars(&context, CONTEXT_PROMPT_CHARS))
        }
    }

    fn context_snapshot(&self) -> String {
        self.last_context_text.lock().unwrap().clone()
    }
}

fn tail_chars(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        text.to_string()
    } else {
        text.chars().skip(count - max_chars).collect()
    }
}

pub struct Pipeline {
    capture: Mutex<AudioCapture>,
    transcriber: Mutex<Option<Arc<dyn Transcriber>>>,
    injector: Arc<dyn TextInjector>,
    settings: Mutex<Settings>,
    state: Arc<PipelineState>,
    monitor_handle: Mutex<Option<JoinHandle<()>>>,
    continuous_running: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(injector: Arc<dyn TextInjector>, settings: Settings) -> Self {
        let mut capture = AudioCapture::new();
        capture.set_vad_config(settings.vad.clone());
        Self {
            capture: Mutex::new(capture),
            transcriber: Mutex::new(None),
            injector,
            settings: Mutex::new(settings),
            state: Arc::new(PipelineState::default()),
            monitor_handle: Mutex::new(None),
            continuous_running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Re-derives the VAD config from a freshly pushed `Settings`.
    /// Idempotent: applying the same settings twice leaves VAD state
    /// equivalent (delegated to `VoiceActivityDetector::apply_config`).
    pub fn apply_settings(&self, settings: Settings) {
        self.capture.lock().unwrap().set_vad_config(settings.vad.clone());
        *self.settings.lock().unwrap() = settings;
    }

    pub fn set_transcriber(&self, transcriber: Arc<dyn Transcriber>) {
        *self.transcriber.lock().unwrap() = Some(transcriber);
    }

    pub fn has_transcriber(&self) -> bool {
        self.transcriber.lock().unwrap().is_some()
    }

    /// Resets `last_context_text`/`did_output`, starts capture, and, in
    /// continuous mode, spawns the monitor loop.
    pub fn start_recording(self: &Arc<Self>) -> crate::error::Result<()> {
        *self.state.last_context_text.lock().unwrap() = String::new();
        self.state.did_output.store(false, Ordering::Relaxed);
        self.state.silence_frame_count.store(0, Ordering::Relaxed);

        self.capture.lock().unwrap().start_recording()?;
        self.state.recording.store(true, Ordering::Relaxed);

        let mode = self.settings.lock().unwrap().transcription_mode;
        if mode == TranscriptionMode::Continuous {
            self.spawn_monitor();
        }
        Ok(())
    }

    fn spawn_monitor(self: &Arc<Self>) {
        self.continuous_running.store(true, Ordering::Relaxed);
        let pipeline = self.clone();
        let handle = std::thread::spawn(move || pipeline.monitor_loop());
        *self.monitor_handle.lock().unwrap() = Some(handle);
    }

    fn monitor_loop(self: Arc<Self>) {
        info!("continuous-mode monitor started");
        while self.continuous_running.load(Ordering::Relaxed) {
            std::thread::sleep(MONITOR_TICK);

            let is_speaking = self.capture.lock().unwrap().is_speaking();
            if is_speaking {
                self.state.silence_frame_count.store(0, Ordering::Relaxed);
            } else {
                self.state.silence_frame_count.fetch_add(1, Ordering::Relaxed);
            }

            let raw_duration = self.capture.lock().unwrap().buffered_raw_duration_seconds();
            let buffer_non_empty = raw_duration > 0.0;
            let pause_detected = buffer_non_empty
                && self.state.silence_frame_count.load(Ordering::Relaxed) >= PAUSE_SILENCE_TICKS;
            let buffer_full = raw_duration > CONTINUOUS_BUFFER_FULL_SECONDS;

            if (pause_detected || buffer_full) && !self.state.is_transcribing() {
                self.try_continuous_tick();
            }
        }
        info!("continuous-mode monitor stopped");
    }

    fn try_continuous_tick(&self) {
        let resampled = self.capture.lock().unwrap().drain_resampled();
        if resampled.len() < CONTINUOUS_MIN_SAMPLES {
            return;
        }

        self.state.transcribing.store(true, Ordering::Relaxed);
        self.state.silence_frame_count.store(0, Ordering::Relaxed);

        let result = self.transcribe_one(&resampled, self.state.context_prompt().as_deref());

        if let Some(result) = result {
            let text = result.confidence_filtered_text();
            let context_snapshot = self.state.context_snapshot();
            if hallucination::accept(&text, Some(&context_snapshot)) {
                self.state.push_context(&text);
                let settings = self.settings.lock().unwrap().clone();
                self.dispatch(&format!("{text} "), &settings);
                self.state.did_output.store(true, Ordering::Relaxed);
            } else {
                debug!("continuous tick: hallucination filter dropped text");
            }
        }

        self.state.transcribing.store(false, Ordering::Relaxed);
    }

    /// Stops the monitor, drains audio, transcribes the remainder, and
    /// dispatches the result. `is_send` is true when the key released was
    /// the "Talk + Send" key, which triggers the trailing Return keystroke.
    pub fn stop_recording_and_transcribe(&self, is_send: bool) -> Option<TranscriptionResult> {
        self.stop_monitor();

        let settings = self.settings.lock().unwrap().clone();
        let raw = self.capture.lock().unwrap().stop_recording();
        self.state.recording.store(false, Ordering::Relaxed);

        if !settings.keep_mic_warm {
            self.capture.lock().unwrap().release();
        }

        if raw.len() < MIN_SAMPLES {
            return None;
        }

        self.state.transcribing.store(true, Ordering::Relaxed);
        let result = if raw.len() > MAX_CHUNK_SAMPLES {
            self.transcribe_chunked(&raw)
        } else {
            self.transcribe_one(&raw, settings.initial_prompt.as_deref())
        };
        self.state.transcribing.store(false, Ordering::Relaxed);

        let result = result?;

        if let Some(text) = hallucination::filtered_buffered_text(&result.segments) {
            self.dispatch(&text, &settings);
            self.state.did_output.store(true, Ordering::Relaxed);

            if is_send && self.state.did_output() {
                let injector = self.injector.clone();
                let delay = settings.send_return_delay_ms;
                std::thread::sleep(Duration::from_millis(delay as u64));
                if let Err(e) = injector.press_return() {
                    warn!("failed to send trailing return: {}", e);
                }
            }
        }

        Some(result)
    }

    fn transcribe_one(&self, samples: &[f32], context_prompt: Option<&str>) -> Option<TranscriptionResult> {
        let transcriber = self.transcriber.lock().unwrap().clone()?;
        match transcriber.transcribe(samples, context_prompt) {
            Ok(result) => Some(result),
            Err(e) => {
                error!("transcription failed: {}", e);
                None
            }
        }
    }

    fn transcribe_chunked(&self, samples: &[f32]) -> Option<TranscriptionResult> {
        let transcriber = self.transcriber.lock().unwrap().clone()?;
        let model_name = transcriber.model_name().to_string();
        match chunker::transcribe_chunked(samples, &model_name, |chunk, prompt| {
            transcriber.transcribe(chunk, prompt)
        }) {
            Ok(result) => Some(result),
            Err(e) => {
                error!("chunked transcription failed: {}", e);
                None
            }
        }
    }

    fn dispatch(&self, text: &str, settings: &Settings) {
        if let Err(e) = self.injector.inject(text, settings.output_mode, settings.type_speed_ms) {
            warn!("text injection failed, swallowed: {}", e);
        }
    }

    fn stop_monitor(&self) {
        self.continuous_running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.monitor_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    /// Stops the monitor, releases the device, and drops the Transcriber.
    pub fn shutdown(&self) {
        self.stop_monitor();
        self.capture.lock().unwrap().release();
        *self.transcriber.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullInjector;
    impl TextInjector for NullInjector {
        fn inject(&self, _text: &str, _mode: crate::output::OutputMode, _type_speed_ms: u64) -> crate::error::Result<()> {
            Ok(())
        }
        fn press_return(&self) -> crate::error::Result<()> {
            Ok(())
        }
    }

    struct RecordingInjector {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingInjector {
        fn new() -> Self {
            Self { calls: Mutex::new(Vec::new()) }
        }
    }

    impl TextInjector for RecordingInjector {
        fn inject(&self, text: &str, _mode: crate::output::OutputMode, _type_speed_ms: u64) -> crate::error::Result<()> {
            self.calls.lock().unwrap().push(format!("inject:{text}"));
            Ok(())
        }
        fn press_return(&self) -> crate::error::Result<()> {
            self.calls.lock().unwrap().push("press_return".to_string());
            Ok(())
        }
    }

    struct StubTranscriber;
    impl Transcriber for StubTranscriber {
        fn warmup(&self) -> crate::error::Result<()> {
            Ok(())
        }
        fn transcribe(&self, samples: &[f32], _context_prompt: Option<&str>) -> crate::error::Result<TranscriptionResult> {
            Ok(TranscriptionResult {
                segments: vec![crate::transcription::TranscriptionSegment::new(
                    0,
                    (samples.len() / 16) as u64,
                    "the quick brown fox jumps over the lazy dog".to_string(),
                )],
                audio_duration_ms: (samples.len() / 16) as u64,
                wall_time_ms: 1,
                model_name: "stub".to_string(),
            })
        }
        fn model_name(&self) -> &str {
            "stub"
        }
    }

    /// Scenario 6: Talk+Send dispatches the transcription, then presses
    /// Return once after `send_return_delay_ms`, in that order.
    #[test]
    fn talk_and_send_dispatches_then_presses_return_once() {
        let mut settings = Settings::default();
        settings.send_return_delay_ms = 5;
        let injector = Arc::new(RecordingInjector::new());
        let pipeline = Pipeline::new(injector.clone(), settings);
        pipeline.set_transcriber(Arc::new(StubTranscriber));
        pipeline.capture.lock().unwrap().inject_for_test(&vec![0.1; MIN_SAMPLES]);

        let result = pipeline.stop_recording_and_transcribe(true);

        assert!(result.is_some());
        assert!(pipeline.state().did_output());
        let calls = injector.calls.lock().unwrap();
        assert_eq!(calls.len(), 2, "expected one inject and one press_return, got {calls:?}");
        assert!(calls[0].starts_with("inject:"));
        assert_eq!(calls[1], "press_return");
    }

    #[test]
    fn stop_recording_below_min_samples_returns_none_without_transcriber() {
        let pipeline = Pipeline::new(Arc::new(NullInjector), Settings::default());
        // No capture was ever started, so drain is empty: below MIN_SAMPLES.
        let result = pipeline.stop_recording_and_transcribe(false);
        assert!(result.is_none());
        assert!(!pipeline.state().did_output());
    }

    #[test]
    fn context_push_truncates_to_keep_length_when_over_cap() {
        let state = PipelineState::default();
        let long_text = "word ".repeat(200);
        state.push_context(&long_text);
        assert!(state.context_snapshot().chars().count() <= LAST_CONTEXT_MAX_CHARS);
    }

    #[test]
    fn context_prompt_is_none_when_empty() {
        let state = PipelineState::default();
        assert!(state.context_prompt().is_none());
        state.push_context("hello world");
        assert_eq!(state.context_prompt().as_deref(), Some("hello world"));
    }
}
