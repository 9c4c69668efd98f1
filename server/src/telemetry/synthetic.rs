//! Filler series for degraded mode.
//!
//! When no durable store is reachable, history is generated from the most
//! recent real snapshot: a short trailing window of jittered points ending
//! at that snapshot. This is demo filler for charts. It is randomized, has
//! no statistical contract, and is not reproducible between calls; every
//! generated point carries `synthetic: true`.

use chrono::Duration;
use rand::Rng;

use super::TelemetrySnapshot;

/// Points in a generated window, including the real seed.
pub const WINDOW: usize = 12;

/// Spacing between generated points.
const STEP_SECS: i64 = 5;

/// Oldest-first series of at most `limit` points ending at `seed`.
///
/// The seed itself is the last element and is returned unchanged.
pub fn trailing_series(seed: &TelemetrySnapshot, limit: usize) -> Vec<TelemetrySnapshot> {
    let points = limit.min(WINDOW);
    if points == 0 {
        return Vec::new();
    }

    let mut rng = rand::thread_rng();
    let mut series: Vec<TelemetrySnapshot> = (1..points)
        .rev()
        .map(|steps_back| {
            let steps = steps_back as i64;
            TelemetrySnapshot {
                captured_at: seed.captured_at - Duration::seconds(STEP_SECS * steps),
                battery_level_percent: seed.battery_level_percent.map(|level| {
                    // Charge was a little higher further back.
                    let drift = steps / 4 + rng.gen_range(-1..=1);
                    (i64::from(level) + drift).clamp(0, 100) as u8
                }),
                memory_used_mb: seed.memory_used_mb.map(|used| {
                    let jitter = rng.gen_range(-0.03..=0.03);
                    (used as f64 * (1.0 + jitter)).round().max(0.0) as u64
                }),
                session_id: seed.session_id.clone(),
                synthetic: true,
            }
        })
        .collect();

    series.push(seed.clone());
    series
}
