//! Replica sizing
//!
//! [`required`] turns a window of backlog samples into a replica count using
//! a coverage rule, [`bound`] clamps that count into the configured range.

/// Returned by [`required`] when the window cannot be sized
pub const UNSIZABLE: i64 = -1;

/// Smallest replica count whose capacity covers `coverage` of the samples.
///
/// With `req = floor(len * coverage)`, the result is the smallest `r >= 0`
/// for which fewer than `req` samples are `>= r * threshold + 1`. That is
/// the `req`-th largest sample divided by `threshold`, rounded up.
///
/// Returns [`UNSIZABLE`] when `req` is not in `1..=len` or when
/// `threshold <= 0`.
pub fn required(samples: &[i64], coverage: f64, threshold: i64) -> i64 {
    let len = samples.len();
    let req = (len as f64 * coverage).floor();
    if !(req >= 1.0 && req <= len as f64) || threshold <= 0 {
        return UNSIZABLE;
    }
    let req = req as usize;

    let mut sorted = samples.to_vec();
    let (_, pivot, _) = sorted.select_nth_unstable_by(req - 1, |a, b| b.cmp(a));
    let load = *pivot;

    if load <= 0 {
        0
    } else {
        load / threshold + i64::from(load % threshold != 0)
    }
}

/// Clamp `num` into `[min, max]`.
///
/// The floor is applied before the ceiling, so with `min > max` the result
/// is always `max`.
pub fn bound(num: i64, min: i64, max: i64) -> i64 {
    let mut num = num;
    if num < min {
        num = min;
    }
    if num > max {
        num = max;
    }
    num
}

/// Direction to scale a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDirection {
    /// Add replicas
    Up,
    /// Remove replicas
    Down,
    /// Keep current scale
    Maintain,
}

impl ScaleDirection {
    /// Which way to go to get from `current` to `target` replicas
    pub fn between(target: i64, current: i64) -> Self {
        use std::cmp::Ordering;

        match target.cmp(&current) {
            Ordering::Greater => Self::Up,
            Ordering::Less => Self::Down,
            Ordering::Equal => Self::Maintain,
        }
    }
}
