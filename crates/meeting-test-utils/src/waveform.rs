//! Scripted waveform source for audio meter tests.

use meeting_client::audio_meter::WaveformSource;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Plays back scripted buffers; the last buffer repeats once the script runs
/// out.
#[derive(Debug, Clone)]
pub struct ScriptedWaveform {
    frames: VecDeque<Vec<u8>>,
    last: Vec<u8>,
    fft_size: usize,
    supports_time_domain: bool,
    reads: Arc<AtomicUsize>,
}

impl ScriptedWaveform {
    /// A source that always reads silence (midpoint samples).
    #[must_use]
    pub fn silent(fft_size: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            last: vec![128; fft_size],
            fft_size,
            supports_time_domain: true,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source that reads a full-scale peak every time.
    #[must_use]
    pub fn full_scale(fft_size: usize) -> Self {
        let mut source = Self::silent(fft_size);
        if let Some(first) = source.last.first_mut() {
            *first = 0;
        }
        source
    }

    /// A source whose reads return `frames` in order.
    #[must_use]
    pub fn scripted(fft_size: usize, frames: Vec<Vec<u8>>) -> Self {
        let mut source = Self::silent(fft_size);
        source.frames = frames.into();
        source
    }

    /// Report no time-domain support.
    #[must_use]
    pub fn without_time_domain(mut self) -> Self {
        self.supports_time_domain = false;
        self
    }

    /// Shared read counter, usable after the source is boxed.
    #[must_use]
    pub fn reads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

impl WaveformSource for ScriptedWaveform {
    fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn supports_time_domain(&self) -> bool {
        self.supports_time_domain
    }

    fn time_domain_data(&mut self, buffer: &mut [u8]) {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(frame) = self.frames.pop_front() {
            self.last = frame;
        }
        for (slot, sample) in buffer.iter_mut().zip(self.last.iter().chain(std::iter::repeat(&128))) {
            *slot = *sample;
        }
    }
}
