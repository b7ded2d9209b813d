//! Username uniqueness resolution.
//!
//! Candidate generation is pure; the caller probes each candidate
//! against the store. After `MAX_USERNAME_ATTEMPTS` numbered probes the
//! caller must switch to the deterministic [`fallback`] name. Every
//! generated name fits within [`MAX_USERNAME_LEN`].

use crate::MAX_USERNAME_LEN;

/// Maximum numbered candidates probed before falling back.
pub const MAX_USERNAME_ATTEMPTS: u32 = 100;

/// Normalize a desired username: anything outside `[a-zA-Z0-9_]`
/// becomes `_`, and the result is lowercased.
pub fn sanitize(desired: &str) -> String {
    desired
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}

/// Derive the base username from identity-provider profile fields,
/// first non-empty wins: preferred username, email local part, display
/// name with spaces collapsed, then a subject-derived default.
pub fn base_from_profile(
    preferred: Option<&str>,
    email: Option<&str>,
    fullname: &str,
    subject: &str,
) -> String {
    let base = preferred
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            email
                .and_then(|e| e.split('@').next())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .or_else(|| {
            let joined = fullname.split_whitespace().collect::<Vec<_>>().join("_");
            (!joined.is_empty()).then(|| joined.to_lowercase())
        })
        .unwrap_or_else(|| format!("user_{}", subject_prefix(subject)));
    let mut base = sanitize(&base);
    base.truncate(MAX_USERNAME_LEN);
    base
}

/// The nth candidate for a base name: the base itself for attempt 0,
/// then `base1`, `base2`, ... The base is shortened when a suffix
/// would push the name past [`MAX_USERNAME_LEN`].
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        let mut name = base.to_string();
        name.truncate(MAX_USERNAME_LEN);
        return name;
    }
    let suffix = attempt.to_string();
    let mut name = base.to_string();
    name.truncate(MAX_USERNAME_LEN.saturating_sub(suffix.len()));
    name.push_str(&suffix);
    name
}

/// Deterministic fallback name once all numbered candidates collide:
/// `user_<subject prefix>_<unix timestamp>`.
pub fn fallback(subject: &str, unix_timestamp: i64) -> String {
    format!("user_{}_{unix_timestamp}", sanitize(&subject_prefix(subject)))
}

fn subject_prefix(subject: &str) -> String {
    subject.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_and_lowercases() {
        assert_eq!(sanitize("Jane.Doe+42"), "jane_doe_42");
        assert_eq!(sanitize("already_ok"), "already_ok");
        assert_eq!(sanitize("émile"), "_mile");
    }

    #[test]
    fn test_base_prefers_provider_username() {
        let base = base_from_profile(Some("JDoe"), Some("jane@example.com"), "Jane Doe", "sub-1");
        assert_eq!(base, "jdoe");
    }

    #[test]
    fn test_base_falls_back_to_email_local_part() {
        let base = base_from_profile(None, Some("jane.doe@example.com"), "Jane Doe", "sub-1");
        assert_eq!(base, "jane_doe");
    }

    #[test]
    fn test_base_falls_back_to_fullname() {
        let base = base_from_profile(None, None, "Jane Q Doe", "sub-1");
        assert_eq!(base, "jane_q_doe");

        let base = base_from_profile(Some(""), Some(""), "Jane Doe", "sub-1");
        assert_eq!(base, "jane_doe");
    }

    #[test]
    fn test_base_falls_back_to_subject() {
        let base = base_from_profile(None, None, "  ", "user_2abcdefghij");
        assert_eq!(base, "user_user_2a");
    }

    #[test]
    fn test_candidate_sequence() {
        assert_eq!(candidate("jane", 0), "jane");
        assert_eq!(candidate("jane", 1), "jane1");
        assert_eq!(candidate("jane", 37), "jane37");
    }

    #[test]
    fn test_base_bounded_by_max_len() {
        let long = "x".repeat(MAX_USERNAME_LEN + 50);
        let base = base_from_profile(Some(&long), None, "", "sub-1");
        assert_eq!(base.len(), MAX_USERNAME_LEN);
    }

    #[test]
    fn test_candidate_bounded_by_max_len() {
        let base = "y".repeat(MAX_USERNAME_LEN);
        assert_eq!(candidate(&base, 0).len(), MAX_USERNAME_LEN);

        let with_suffix = candidate(&base, 37);
        assert_eq!(with_suffix.len(), MAX_USERNAME_LEN);
        assert!(with_suffix.ends_with("37"));
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let a = fallback("user_2abcdefghij", 1_700_000_000);
        let b = fallback("user_2abcdefghij", 1_700_000_000);
        assert_eq!(a, b);
        assert_eq!(a, "user_user_2a_1700000000");
    }
}
