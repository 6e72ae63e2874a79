//! ID and filename generation.
//!
//! Record ids and capture filenames are derived from the current time so
//! they sort chronologically; capture names get a short random suffix to
//! stay collision-resistant when frames arrive within the same millisecond.

/// Fallback test id for records submitted without one.
pub fn generate_test_id() -> String {
    format!("test-{}", chrono::Utc::now().timestamp_millis())
}

/// Filename for a captured frame, e.g. `capture-1756300000000-x3fk2a.png`
pub fn generate_capture_name() -> String {
    format!(
        "capture-{}-{}.png",
        chrono::Utc::now().timestamp_millis(),
        nanoid::nanoid!(6, &nanoid::alphabet::SAFE)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_test_id_prefix() {
        let id = generate_test_id();
        assert!(id.starts_with("test-"));
        assert!(id["test-".len()..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_capture_names_are_unique() {
        let a = generate_capture_name();
        let b = generate_capture_name();
        assert!(a.starts_with("capture-"));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
    }
}
