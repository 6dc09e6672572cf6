// Axis math shared by the controller state and device backends

/// Largest raw magnitude a device axis accepts
pub const AXIS_RAW_MAX: i32 = 32767;

/// Clamp a value between min and max
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Scale a percentage (0..=100) into a normalized magnitude (0.0..=1.0)
pub fn percent_to_unit(percent: u8) -> f32 {
    clamp(percent as f32 / 100.0, 0.0, 1.0)
}

/// Convert a normalized axis value in [-1.0, 1.0] to the raw device range
pub fn axis_to_raw(value: f32) -> i32 {
    let clamped = clamp(value, -1.0, 1.0);
    (clamped * AXIS_RAW_MAX as f32).round() as i32
}

/// Check if two f32 values are approximately equal
pub fn approx_equal(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() < epsilon
}
