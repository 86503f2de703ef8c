//! Sample rate conversion with rubato
//!
//! Decoded tracks are converted once, whole-buffer, to the output rate before
//! they are handed to the renderer.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

/// Resample interleaved audio from `input_rate` to `output_rate`.
///
/// Returns a copy when the rates already match.
pub fn resample(
    input: &[f32],
    input_rate: u32,
    output_rate: u32,
    channels: usize,
) -> Result<Vec<f32>> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }
    if input_rate == 0 || output_rate == 0 || channels == 0 {
        return Err(Error::Decode(format!(
            "Invalid resample parameters: {}Hz -> {}Hz, {} channels",
            input_rate, output_rate, channels
        )));
    }

    let planar = deinterleave(input, channels);
    let frames = planar[0].len();

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        frames,
        channels,
    )
    .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

    let output = resampler
        .process(&planar, None)
        .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

    let interleaved = interleave(&output);
    debug!(
        "Resampled {} frames at {}Hz to {} frames at {}Hz",
        frames,
        input_rate,
        interleaved.len() / channels,
        output_rate
    );
    Ok(interleaved)
}

/// `[L, R, L, R]` -> `[[L, L], [R, R]]`
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    (0..channels)
        .map(|ch| samples.iter().skip(ch).step_by(channels).copied().collect())
        .collect()
}

/// `[[L, L], [R, R]]` -> `[L, R, L, R]`
fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.iter().map(Vec::len).min().unwrap_or(0);
    let mut out = Vec::with_capacity(frames * planar.len());
    for i in 0..frames {
        out.extend(planar.iter().map(|channel| channel[i]));
    }
    out
}
