//! Playback time formatting.

/// Format a playback position as `m:ss`.
///
/// Non-finite input (an unknown duration) renders as `0:00`. Negative
/// positions clamp to zero; minutes are not wrapped into hours.
#[must_use]
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    // Finite and positive, so the floor fits after saturation
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
