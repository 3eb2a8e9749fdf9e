use chrono::Utc;

/// Milliseconds since the Unix epoch. Lease expiries are stored in this form,
/// so every comparison against a stored value goes through the same clock.
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_millis_is_monotonic_enough() {
        let a = epoch_millis();
        let b = epoch_millis();
        assert!(b >= a);
        // Sanity: we are past 2020 and before year ~5000.
        assert!(a > 1_577_836_800_000);
        assert!(a < 100_000_000_000_000);
    }
}
