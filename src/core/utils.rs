use std::time::{SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of the random part of a submission id
const SUFFIX_LEN: usize = 8;

/// Maximum number of characters kept in an output preview
pub const OUTPUT_PREVIEW_CHARS: usize = 4096;

/// Generate a submission-scoped identifier: `<unix millis>_<random suffix>`.
///
/// Uniqueness across concurrent invocations relies on the suffix, not on
/// any lock.
pub fn submission_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}_{}", millis, suffix)
}

/// Truncate program output for inclusion in a result
pub fn output_preview(output: &str) -> String {
    output.chars().take(OUTPUT_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_submission_id_shape() {
        let id = submission_id();
        let (millis, suffix) = id.split_once('_').unwrap();
        assert!(millis.parse::<u128>().is_ok());
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_submission_ids_do_not_collide() {
        let ids: HashSet<String> = (0..1000).map(|_| submission_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_output_preview_truncates() {
        let long = "x".repeat(OUTPUT_PREVIEW_CHARS + 10);
        assert_eq!(output_preview(&long).len(), OUTPUT_PREVIEW_CHARS);
        assert_eq!(output_preview("short"), "short");
    }
}
