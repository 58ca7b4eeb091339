use chrono::{DateTime, Utc};
use rand::Rng;

/// Maximum regenerate attempts when an insert trips the reference-number
/// UNIQUE constraint.
pub const MAX_REFERENCE_RETRIES: u32 = 5;

const PREFIX: &str = "GYM";
const SUFFIX_LEN: usize = 6;
const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Generate a user-presentable transaction reference: `GYM-YYMMDD-XXXXXX`.
/// The suffix alphabet skips easily confused glyphs (I/L/O/0/1).
/// Uniqueness is ultimately enforced by the database; callers retry on
/// collision with a fresh suffix.
pub fn generate_reference(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}-{}-{}", PREFIX, now.format("%y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_format() {
        let now = "2026-08-28T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let reference = generate_reference(now);
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "GYM");
        assert_eq!(parts[1], "260828");
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn references_vary() {
        let now = Utc::now();
        let distinct: std::collections::HashSet<String> =
            (0..20).map(|_| generate_reference(now)).collect();
        // Not a uniqueness proof; the DB constraint is. Just checks the
        // suffix actually draws from the RNG.
        assert!(distinct.len() > 1);
    }
}
