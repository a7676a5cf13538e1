/// Format a whole amount with thousand separators.
/// e.g. `-1234567` → `"-1,234,567"`
pub(crate) fn format_amount(val: i64) -> String {
    let digits = val.unsigned_abs().to_string();
    let with_commas: String = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or(""))
        .collect::<Vec<_>>()
        .join(",");

    if val < 0 {
        format!("-{with_commas}")
    } else {
        with_commas
    }
}

/// Truncate a string to `max` visible characters, appending "…" if truncated.
/// Safe for multi-byte UTF-8 characters.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if s.chars().count() <= max {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max - 1).collect();
    format!("{truncated}…")
}

/// Share of `limit` used by `spent`, in whole percent. A zero limit is
/// fully used as soon as anything is spent.
pub(crate) fn percent_used(spent: i64, limit: i64) -> i64 {
    match limit {
        l if l > 0 => spent.saturating_mul(100) / l,
        _ if spent > 0 => 100,
        _ => 0,
    }
}

#[cfg(test)]
#[path = "util_tests.rs"]
mod tests;
