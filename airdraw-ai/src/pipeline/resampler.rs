//! Fixed-length resampling by per-channel linear interpolation
//!
//! Converts a capture of any length L >= 2 into a (T, F) [`FixedSeries`].
//!
//! **Algorithm:**
//! 1. `old_index = linspace(0, L-1, L)` (the sample ordinals)
//! 2. `new_index = linspace(0, L-1, T)` (T evenly spaced points over the same range)
//! 3. For each channel independently: `out[:, j] = interp(new_index, old_index, capture[:, j])`
//!
//! All six channels share the same pair of index axes, so temporal alignment
//! across channels is preserved. Resampling is by ordinal position, not
//! elapsed time: captures with an uneven sampling interval are position
//! corrected only. Timestamps are ignored.

use crate::error::{Error, Result};
use crate::types::FixedSeries;
use airdraw_common::{Capture, Channel, CHANNEL_COUNT};
use ndarray::Array2;
use tracing::debug;

/// Minimum capture length interpolation can work with
pub const MIN_CAPTURE_LEN: usize = 2;

/// Ordinal-position resampler.
pub struct Resampler;

impl Resampler {
    /// Resample a capture to exactly `target_len` rows.
    ///
    /// Supports both upsampling and downsampling with the same logic.
    ///
    /// # Errors
    /// * `InsufficientData` if the capture has fewer than 2 samples
    /// * `ShapeMismatch` if `target_len` is 0
    pub fn resample(capture: &Capture, target_len: usize) -> Result<FixedSeries> {
        let old_len = capture.len();
        if old_len < MIN_CAPTURE_LEN {
            return Err(Error::InsufficientData { samples: old_len });
        }
        if target_len == 0 {
            return Err(Error::ShapeMismatch(
                "target sequence length must be at least 1".to_string(),
            ));
        }

        let span = (old_len - 1) as f64;
        let old_index = linspace(0.0, span, old_len);
        let new_index = linspace(0.0, span, target_len);

        debug!(
            input_len = old_len,
            target_len = target_len,
            "Resampling capture"
        );

        let mut data = Array2::<f64>::zeros((target_len, CHANNEL_COUNT));
        for channel in Channel::ALL {
            let values = capture.channel(channel);
            let column = interp(&new_index, &old_index, &values);
            for (dst, src) in data.column_mut(channel.index()).iter_mut().zip(column) {
                *dst = src;
            }
        }

        FixedSeries::from_array(data)
    }
}

/// `n` evenly spaced values over `[start, end]`, endpoint included.
///
/// The last value is exactly `end`; `n == 1` yields `[start]`.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
            out[n - 1] = end;
            out
        }
    }
}

/// Piecewise-linear interpolation of `(xp, fp)` evaluated at `x`.
///
/// `xp` must be increasing and the same length as `fp` (at least one point).
/// Points outside `[xp[0], xp[last]]` clamp to the boundary value; a point
/// landing exactly on a knot returns that knot's value unchanged.
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    debug_assert_eq!(xp.len(), fp.len());
    debug_assert!(!xp.is_empty());

    let last = xp.len() - 1;
    x.iter()
        .map(|&xi| {
            if xi <= xp[0] {
                return fp[0];
            }
            if xi >= xp[last] {
                return fp[last];
            }
            // First knot strictly greater than xi; xp[j] <= xi < xp[j + 1]
            let j = xp.partition_point(|&k| k <= xi) - 1;
            if xp[j] == xi {
                return fp[j];
            }
            let slope = (fp[j + 1] - fp[j]) / (xp[j + 1] - xp[j]);
            slope * (xi - xp[j]) + fp[j]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use airdraw_common::RawSample;
    use approx::assert_abs_diff_eq;

    fn capture_from(columns: [Vec<f64>; CHANNEL_COUNT]) -> Capture {
        let timestamps: Vec<f64> = (0..columns[0].len()).map(|i| i as f64 * 0.01).collect();
        Capture::from_columns(&timestamps, std::array::from_fn(|j| columns[j].as_slice()))
            .unwrap()
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn test_linspace_endpoints() {
        let v = linspace(0.0, 49.0, 200);
        assert_eq!(v.len(), 200);
        assert_eq!(v[0], 0.0);
        assert_eq!(v[199], 49.0);
        assert!(v.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(linspace(3.0, 9.0, 1), vec![3.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_interp_clamps_outside_range() {
        let xp = [0.0, 1.0, 2.0];
        let fp = [10.0, 20.0, 40.0];
        let out = interp(&[-1.0, 0.5, 1.5, 3.0], &xp, &fp);
        assert_eq!(out, vec![10.0, 15.0, 30.0, 40.0]);
    }

    #[test]
    fn test_interp_exact_knots() {
        let xp = [0.0, 1.0, 2.0, 3.0];
        let fp = [0.3, -1.7, 2.9, 5.5];
        assert_eq!(interp(&xp, &xp, &fp), fp.to_vec());
    }

    #[test]
    fn test_output_shape_for_any_length() {
        for len in [2, 3, 50, 199, 200, 201, 1000] {
            for target in [1, 2, 7, 200, 450] {
                let capture = capture_from(std::array::from_fn(|_| ramp(len)));
                let series = Resampler::resample(&capture, target).unwrap();
                assert_eq!(series.shape(), (target, CHANNEL_COUNT));
            }
        }
    }

    #[test]
    fn test_rejects_short_capture() {
        let capture = capture_from(std::array::from_fn(|_| vec![1.0]));
        let err = Resampler::resample(&capture, 200).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { samples: 1 }));

        let empty = Capture::default();
        assert!(matches!(
            Resampler::resample(&empty, 200),
            Err(Error::InsufficientData { samples: 0 })
        ));
    }

    #[test]
    fn test_rejects_zero_target() {
        let capture = capture_from(std::array::from_fn(|_| ramp(10)));
        assert!(matches!(
            Resampler::resample(&capture, 0),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_constant_channel_stays_constant() {
        let capture = capture_from(std::array::from_fn(|j| vec![j as f64 + 0.25; 37]));
        for target in [1, 10, 37, 200] {
            let series = Resampler::resample(&capture, target).unwrap();
            for ch in Channel::ALL {
                let expected = ch.index() as f64 + 0.25;
                assert!(series.column(ch).iter().all(|&v| v == expected));
            }
        }
    }

    #[test]
    fn test_identity_at_equal_length() {
        let values: Vec<f64> = (0..64).map(|i| (i as f64 * 0.37).sin() * 9.81).collect();
        let capture = capture_from(std::array::from_fn(|j| {
            values.iter().map(|v| v + j as f64).collect()
        }));

        let series = Resampler::resample(&capture, 64).unwrap();
        for ch in Channel::ALL {
            assert_eq!(series.column(ch).to_vec(), capture.channel(ch));
        }
    }

    #[test]
    fn test_reversed_channel_reverses_output() {
        let forward: Vec<f64> = (0..23).map(|i| (i * i) as f64 * 0.5).collect();
        let backward: Vec<f64> = forward.iter().rev().copied().collect();

        let a = Resampler::resample(&capture_from(std::array::from_fn(|_| forward.clone())), 200)
            .unwrap();
        let b = Resampler::resample(&capture_from(std::array::from_fn(|_| backward.clone())), 200)
            .unwrap();

        let col_a = a.column(Channel::Gy).to_vec();
        let mut col_b = b.column(Channel::Gy).to_vec();
        col_b.reverse();
        for (x, y) in col_a.iter().zip(col_b.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_channels_are_independent_and_aligned() {
        let capture = capture_from([
            ramp(10),
            vec![5.0; 10],
            ramp(10).into_iter().map(|v| -v).collect(),
            vec![0.0; 10],
            vec![1.0; 10],
            ramp(10).into_iter().map(|v| v * 2.0).collect(),
        ]);
        let series = Resampler::resample(&capture, 19).unwrap();

        // new_index = 0, 0.5, 1.0, ... 9.0
        assert_abs_diff_eq!(series.column(Channel::Ax)[1], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(series.column(Channel::Az)[1], -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(series.column(Channel::Gz)[1], 1.0, epsilon = 1e-12);
        assert_eq!(series.column(Channel::Ay)[7], 5.0);
        assert_eq!(series.column(Channel::Gz)[18], 18.0);
    }

    #[test]
    fn test_timestamps_are_ignored() {
        let values = ramp(5);
        let even = capture_from(std::array::from_fn(|_| values.clone()));

        let uneven_samples: Vec<RawSample> = even
            .samples()
            .iter()
            .enumerate()
            .map(|(i, s)| RawSample::new((i * i) as f64, s.values))
            .collect();
        let uneven = Capture::new(uneven_samples);

        assert_eq!(
            Resampler::resample(&even, 40).unwrap(),
            Resampler::resample(&uneven, 40).unwrap()
        );
    }
}
