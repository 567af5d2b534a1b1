use crate::errors::{AppError, AppResult};

const SECONDS_PER_UNIT: [(char, i64); 4] = [('s', 1), ('m', 60), ('h', 3600), ('d', 86400)];

/// Parses `<integer><unit>` into seconds, unit one of `s`, `m`, `h`, `d`.
/// Case-insensitive, surrounding whitespace ignored.
pub fn parse_duration(input: &str) -> AppResult<i64> {
    let s = input.trim().to_ascii_lowercase();

    let Some(unit) = s.chars().last() else {
        return Err(AppError::InvalidDuration(input.to_string()));
    };

    let Some(multiplier) = SECONDS_PER_UNIT
        .iter()
        .find(|(u, _)| *u == unit)
        .map(|(_, m)| *m)
    else {
        return Err(AppError::InvalidDuration(input.to_string()));
    };

    let digits = &s[..s.len() - 1];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::InvalidDuration(input.to_string()));
    }

    let value: i64 = digits
        .parse()
        .map_err(|_| AppError::InvalidDuration(input.to_string()))?;
    if value == 0 {
        return Err(AppError::InvalidDuration(input.to_string()));
    }

    Ok(value * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_units() {
        assert_eq!(parse_duration("10s").unwrap(), 10);
        assert_eq!(parse_duration("5m").unwrap(), 300);
        assert_eq!(parse_duration("1h").unwrap(), 3600);
        assert_eq!(parse_duration("2d").unwrap(), 172800);
    }

    #[test]
    fn is_case_insensitive_and_trims() {
        assert_eq!(parse_duration(" 10M ").unwrap(), 600);
        assert_eq!(parse_duration("1H").unwrap(), 3600);
    }

    #[test]
    fn rejects_other_shapes() {
        for bad in ["", "10", "s", "m5", "5 m", "1.5h", "10x", "-3s", "0s"] {
            assert!(
                matches!(parse_duration(bad), Err(AppError::InvalidDuration(_))),
                "expected InvalidDuration for {bad:?}"
            );
        }
    }
}
