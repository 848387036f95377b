pub const ZERO_LABEL: &str = "00:00";

/// Formats whole seconds as `MM:SS`, or `HH:MM:SS` once an hour is reached.
///
/// Zero and negative inputs render as `00:00`.
pub fn to_clock_string(total_seconds: i64) -> String {
    if total_seconds <= 0 {
        return ZERO_LABEL.to_string();
    }

    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{:0>2}:{:0>2}:{:0>2}", hours, minutes, seconds)
    } else {
        format!("{:0>2}:{:0>2}", minutes, seconds)
    }
}

/// Label for a playback instant, truncating fractional seconds.
pub fn playback_label(seconds: f64) -> String {
    if !seconds.is_finite() {
        return ZERO_LABEL.to_string();
    }
    to_clock_string(seconds.floor() as i64)
}
