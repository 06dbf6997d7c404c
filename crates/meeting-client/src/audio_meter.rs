//! Local microphone level meter.
//!
//! A lightweight task ticks once per rendering frame and samples the capture
//! waveform on every other tick. The peak deviation from the midpoint is
//! mapped through a log scale to a 0-100 level published on a `watch`
//! channel. The task exits on the first tick after [`AudioLevelMeter::stop`]
//! (or drop) cancels its token.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Floor for the peak amplitude; keeps the log scale finite for silence.
pub const LOWEST_AMPLITUDE: f64 = 0.01;

/// Midpoint of unsigned 8-bit time-domain samples.
const MIDPOINT: f64 = 128.0;

/// Sample on one of every `SAMPLE_EVERY` frames.
const SAMPLE_EVERY: u8 = 2;

/// Time-domain sample source for the local audio input.
pub trait WaveformSource: Send {
    /// Number of samples per read.
    fn fft_size(&self) -> usize;

    /// Whether [`WaveformSource::time_domain_data`] is supported.
    fn supports_time_domain(&self) -> bool;

    /// Fill `buffer` with the most recent unsigned 8-bit samples.
    fn time_domain_data(&mut self, buffer: &mut [u8]);
}

/// Map a buffer of unsigned 8-bit samples to a 0-100 level.
#[must_use]
pub fn level_percent(samples: &[u8]) -> f64 {
    let peak = samples
        .iter()
        .map(|&s| (f64::from(s) - MIDPOINT).abs() / MIDPOINT)
        .fold(LOWEST_AMPLITUDE, f64::max);
    let floor = LOWEST_AMPLITUDE.ln();
    let normalized = (floor - peak.ln()) / floor;
    (normalized * 100.0).clamp(0.0, 100.0)
}

/// Frame-stepped sampler. Pure apart from reading the source.
pub struct MeterLoop {
    source: Box<dyn WaveformSource>,
    buffer: Vec<u8>,
    frame_index: u8,
}

impl MeterLoop {
    #[must_use]
    pub fn new(source: Box<dyn WaveformSource>) -> Self {
        let buffer = vec![0; source.fft_size()];
        Self {
            source,
            buffer,
            frame_index: 0,
        }
    }

    /// Advance one frame. Returns a level on sampling frames.
    pub fn step(&mut self) -> Option<f64> {
        let sample = self.frame_index == 0;
        self.frame_index = (self.frame_index + 1) % SAMPLE_EVERY;
        if !sample {
            return None;
        }
        self.source.time_domain_data(&mut self.buffer);
        Some(level_percent(&self.buffer))
    }
}

/// Meter state for the rendering shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterStatus {
    /// No analyser for the current input; level stays at zero.
    Unavailable,
    /// The analyser cannot sample waveforms; hide the meter.
    Hidden,
    Running,
    Stopped,
}

/// Handle to a running (or no-op) level meter.
pub struct AudioLevelMeter {
    level: watch::Receiver<f64>,
    status: watch::Receiver<MeterStatus>,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AudioLevelMeter {
    /// Start metering `source` once per `frame_interval` until `cancel_token`
    /// is cancelled or the meter is stopped.
    ///
    /// A missing source or one without waveform support yields a meter that
    /// never runs; the session is unaffected.
    #[must_use]
    pub fn start(
        source: Option<Box<dyn WaveformSource>>,
        frame_interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        let (level_tx, level) = watch::channel(0.0);

        let Some(source) = source else {
            debug!(target: "client.audio_meter", "No analyser for audio input");
            let (_, status) = watch::channel(MeterStatus::Unavailable);
            return Self::idle(level, status, cancel_token);
        };
        if !source.supports_time_domain() {
            warn!(target: "client.audio_meter", "Waveform sampling unsupported, hiding meter");
            let (_, status) = watch::channel(MeterStatus::Hidden);
            return Self::idle(level, status, cancel_token);
        }

        let (status_tx, status) = watch::channel(MeterStatus::Running);
        let token = cancel_token.clone();
        let mut meter = MeterLoop::new(source);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Some(percent) = meter.step() {
                            level_tx.send_replace(percent);
                        }
                    }
                }
            }
            level_tx.send_replace(0.0);
            status_tx.send_replace(MeterStatus::Stopped);
            debug!(target: "client.audio_meter", "Audio meter stopped");
        });

        info!(
            target: "client.audio_meter",
            frame_ms = u64::try_from(frame_interval.as_millis()).unwrap_or(u64::MAX),
            "Audio meter started"
        );

        Self {
            level,
            status,
            cancel_token,
            task: Some(task),
        }
    }

    fn idle(
        level: watch::Receiver<f64>,
        status: watch::Receiver<MeterStatus>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            level,
            status,
            cancel_token,
            task: None,
        }
    }

    /// Most recent level, 0-100.
    #[must_use]
    pub fn level(&self) -> f64 {
        *self.level.borrow()
    }

    /// Watch the level for rendering.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.level.clone()
    }

    #[must_use]
    pub fn status(&self) -> MeterStatus {
        *self.status.borrow()
    }

    /// Stop sampling and wait for the task to exit.
    pub async fn stop(&mut self) {
        self.cancel_token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(target: "client.audio_meter", error = %e, "Audio meter task failed");
            }
        }
    }
}

impl Drop for AudioLevelMeter {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
