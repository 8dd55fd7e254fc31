//! # Peak Extraction Module
//!
//! Finds the "key maxima" of a correlation curve: one candidate per
//! positive lobe, kept only when it reaches a fraction of the strongest
//! lobe.
//!
//! ## Steps
//! 1. Smooth with a centred 3-point moving average (missing neighbours count as 0).
//! 2. Split the curve into segments at upward zero crossings.
//! 3. Record every positive local maximum after the first crossing, refined
//!    by parabolic interpolation, and track the highest one.
//! 4. Keep the best maximum of each segment if it exceeds
//!    `highest * threshold_factor`.
//!
//! The first surviving peak is the fundamental-period estimate. Picking the
//! smallest lag that is about as strong as the best one, instead of the
//! global maximum, keeps the detector from jumping down an octave.

/// A correlation maximum at a sub-sample position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Interpolated lag, in samples.
    pub position: f32,
    /// Interpolated height.
    pub magnitude: f32,
}

/// Extracts key maxima from `data`, in ascending position order.
///
/// Returns an empty vector when no upward zero crossing exists, which
/// includes all-zero input.
pub fn find_peaks(data: &[f32], threshold_factor: f32) -> Vec<Peak> {
    let smoothed = moving_average(data);
    let len = smoothed.len();
    if len < 3 {
        return Vec::new();
    }

    let mut slope_starts: Vec<usize> = Vec::new();
    let mut maxima: Vec<Peak> = Vec::new();
    let mut max_value = 0.0f32;

    for i in 1..len - 1 {
        let (prev, value, next) = (smoothed[i - 1], smoothed[i], smoothed[i + 1]);

        if prev < 0.0 && value >= 0.0 {
            slope_starts.push(i);
        }

        if !slope_starts.is_empty() && value > 0.0 && prev <= value && next <= value {
            let peak = interpolate_max(&smoothed, i);
            if peak.magnitude > max_value {
                max_value = peak.magnitude;
            }
            maxima.push(peak);
        }
    }

    let threshold = max_value * threshold_factor;

    slope_starts
        .iter()
        .enumerate()
        .filter_map(|(segment, &start)| {
            let end = slope_starts.get(segment + 1).copied().unwrap_or(len);
            maxima
                .iter()
                .filter(|peak| peak.position >= start as f32 && peak.position < end as f32)
                .fold(None, |best: Option<Peak>, &peak| match best {
                    Some(b) if b.magnitude >= peak.magnitude => Some(b),
                    _ => Some(peak),
                })
        })
        .filter(|peak| peak.magnitude > threshold)
        .collect()
}

/// Centred 3-point moving average. Out-of-range neighbours count as 0.
fn moving_average(data: &[f32]) -> Vec<f32> {
    (0..data.len())
        .map(|i| {
            let prev = if i > 0 { data[i - 1] } else { 0.0 };
            let next = data.get(i + 1).copied().unwrap_or(0.0);
            (prev + data[i] + next) / 3.0
        })
        .collect()
}

/// Fits a parabola through `data[index - 1..=index + 1]` and returns its vertex.
///
/// A flat triple has no vertex; the sample itself is returned.
fn interpolate_max(data: &[f32], index: usize) -> Peak {
    let (y1, y2, y3) = (data[index - 1], data[index], data[index + 1]);

    let a = (y1 + y3 - 2.0 * y2) / 2.0;
    let b = (y3 - y1) / 2.0;
    if a == 0.0 {
        return Peak {
            position: index as f32,
            magnitude: y2,
        };
    }

    let offset = -b / (2.0 * a);
    Peak {
        position: index as f32 + offset,
        magnitude: y2 - offset * offset * a,
    }
}
