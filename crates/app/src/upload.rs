/// Reduces an uploaded file name to a safe, flat name.
///
/// Path components are dropped, whitespace becomes `_`, and anything other
/// than ASCII letters, digits, `.`, `-` and `_` is removed. Returns `None`
/// when nothing usable is left.
pub fn secure_filename(name: &str) -> Option<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'))
        .collect::<String>();

    let trimmed = cleaned.trim_start_matches(['.', '_']).trim_end_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::secure_filename;

    #[test]
    fn keeps_plain_names() {
        assert_eq!(secure_filename("manual.pdf").as_deref(), Some("manual.pdf"));
    }

    #[test]
    fn strips_directories_and_traversal() {
        assert_eq!(
            secure_filename("../../etc/passwd.pdf").as_deref(),
            Some("passwd.pdf")
        );
        assert_eq!(
            secure_filename(r"C:\Users\ops\Pump Manual.pdf").as_deref(),
            Some("Pump_Manual.pdf")
        );
    }

    #[test]
    fn drops_unsafe_characters() {
        assert_eq!(
            secure_filename("rev#2 (final)?.pdf").as_deref(),
            Some("rev2_final.pdf")
        );
        assert_eq!(secure_filename(".hidden.pdf").as_deref(), Some("hidden.pdf"));
    }

    #[test]
    fn empty_results_are_rejected() {
        assert_eq!(secure_filename(""), None);
        assert_eq!(secure_filename("../.."), None);
        assert_eq!(secure_filename("???"), None);
    }
}
