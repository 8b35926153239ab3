//! Email address helpers.

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

/// Trim and lower-case. All comparisons and hashes use this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Single `@`, non-empty local part, dotted domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Display form for confirmation screens and logs, e.g. `jo**@example.com`.
///
/// Cosmetic only; never feed the result into a security decision.
pub fn mask_email(email: &str) -> String {
    let normalized = normalize_email(email);
    let Some((local, domain)) = normalized.split_once('@') else {
        return email.to_string();
    };
    if local.is_empty() || domain.is_empty() {
        return email.to_string();
    }

    let local_len = local.chars().count();
    let masked_local: String = if local_len <= 2 {
        local.chars().take(1).chain(std::iter::once('*')).collect()
    } else {
        local
            .chars()
            .take(2)
            .chain(std::iter::repeat('*').take(local_len - 2))
            .collect()
    };
    format!("{masked_local}@{domain}")
}
