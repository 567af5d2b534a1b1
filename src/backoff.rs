use tokio::time::Duration;

const BASE_SECONDS: u64 = 1;
const CAP_SECONDS: u64 = 60;

/// Exponential backoff: `min(base * 2^attempt, cap)` with base 1s, cap 60s.
/// Callers reset their attempt counter after a healthy streaming period.
pub fn delay(attempt: u32) -> Duration {
    let secs = BASE_SECONDS
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(CAP_SECONDS);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_the_cap() {
        assert_eq!(delay(0), Duration::from_secs(1));
        assert_eq!(delay(1), Duration::from_secs(2));
        assert_eq!(delay(5), Duration::from_secs(32));
        assert_eq!(delay(6), Duration::from_secs(60));
        assert_eq!(delay(30), Duration::from_secs(60));
        assert_eq!(delay(u32::MAX), Duration::from_secs(60));
    }
}
