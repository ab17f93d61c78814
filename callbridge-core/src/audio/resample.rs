//! Sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! Two places need it: the microphone usually runs at 44.1/48 kHz while the
//! session wants 16 kHz, and the speaker may not accept the 24 kHz the model
//! streams back. When both rates match the converter is a passthrough and no
//! rubato session is created.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::error;

use crate::error::{CallError, Result};

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when input rate == output rate.
    resampler: Option<FastFixedIn<f32>>,
    /// Holds partial input blocks between calls.
    input_buf: Vec<f32>,
    /// Input frames rubato expects per process call.
    chunk_size: usize,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
    ratio: f64,
}

impl RateConverter {
    /// # Errors
    /// `CallError::AudioStream` if rubato rejects the configuration.
    pub fn new(input_rate: u32, output_rate: u32, chunk_size: usize) -> Result<Self> {
        let ratio = output_rate as f64 / input_rate as f64;

        if input_rate == output_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
                ratio,
            });
        }

        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| CallError::AudioStream(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        let output_buf = vec![vec![0f32; max_out]; 1];

        tracing::debug!(input_rate, output_rate, chunk_size, max_out, "resampler created");

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            chunk_size,
            output_buf,
            ratio,
        })
    }

    /// Feed samples, returning whatever whole blocks could be converted.
    ///
    /// Input that does not fill a block is kept for the next call.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        if self.resampler.is_none() {
            return samples.to_vec();
        }
        self.input_buf.extend_from_slice(samples);

        let mut result = Vec::new();
        while self.input_buf.len() >= self.chunk_size {
            self.convert_block(&mut result);
            self.input_buf.drain(..self.chunk_size);
        }
        result
    }

    /// Zero-pad and convert the pending partial block.
    ///
    /// Output is trimmed to what the real (unpadded) input maps to.
    pub fn flush(&mut self) -> Vec<f32> {
        if self.resampler.is_none() || self.input_buf.is_empty() {
            return Vec::new();
        }
        let pending = self.input_buf.len();
        self.input_buf.resize(self.chunk_size, 0.0);

        let mut result = Vec::new();
        self.convert_block(&mut result);
        self.input_buf.clear();

        let expected = (pending as f64 * self.ratio).round() as usize;
        result.truncate(expected);
        result
    }

    /// Convert a complete, self-contained clip.
    pub fn process_all(&mut self, samples: &[f32]) -> Vec<f32> {
        let mut out = self.process(samples);
        out.extend(self.flush());
        out
    }

    fn convert_block(&mut self, result: &mut Vec<f32>) {
        let Some(resampler) = self.resampler.as_mut() else {
            return;
        };
        let input_slice = &self.input_buf[..self.chunk_size];
        match resampler.process_into_buffer(&[input_slice], &mut self.output_buf, None) {
            Ok((_consumed, produced)) => {
                result.extend_from_slice(&self.output_buf[0][..produced]);
            }
            Err(e) => {
                error!("resampler process error: {e}");
            }
        }
    }

    /// Drop pending input and clear the filter history.
    pub fn reset(&mut self) {
        self.input_buf.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }

    /// Output frames by which the converted signal lags its input.
    pub fn output_delay(&self) -> usize {
        self.resampler.as_ref().map_or(0, |r| r.output_delay())
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// `true` when no resampling occurs.
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}
