use anyhow::{Context, Result};
use std::io::Cursor;

use super::backend::AudioFrame;

/// Accumulates PCM frames and encodes them as a 16-bit WAV in memory
#[derive(Debug)]
pub struct WavEncoder {
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
    /// Timestamp span covered by the written frames
    start_ms: Option<u64>,
    end_ms: u64,
}

impl WavEncoder {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            samples: Vec::new(),
            start_ms: None,
            end_ms: 0,
        }
    }

    /// Append a frame. The first frame fixes the output format.
    pub fn write_frame(&mut self, frame: &AudioFrame) {
        if self.start_ms.is_none() {
            self.start_ms = Some(frame.timestamp_ms);
            self.sample_rate = frame.sample_rate;
            self.channels = frame.channels;
        }

        self.samples.extend_from_slice(&frame.samples);
        self.end_ms = frame.timestamp_ms + frame.duration_ms();
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Milliseconds covered by the frames written so far
    pub fn span_ms(&self) -> u64 {
        self.start_ms
            .map(|start| self.end_ms.saturating_sub(start))
            .unwrap_or(0)
    }

    /// Encode everything written so far as a WAV file
    pub fn finish(self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut bytes = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)
                .context("Failed to create WAV writer")?;

            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }

            writer.finalize().context("Failed to finalize WAV")?;
        }

        Ok(bytes)
    }
}
