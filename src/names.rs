use std::collections::HashMap;

use tracing::debug;

fn is_mixed_case(s: &str) -> bool {
    s.to_uppercase() != s && s.to_lowercase() != s
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Recases ALL-CAPS or all-lowercase names; mixed case such as `McDonald`
/// is taken as intentional and kept.
pub fn cleanup_name(s: &str) -> String {
    let s = s.trim();
    if s.chars().count() < 2 || is_mixed_case(s) {
        return s.to_string();
    }

    let cleaned = capitalize(&s.to_lowercase());
    if cleaned != s {
        debug!(from = s, to = %cleaned, "cleaned up name");
    }
    cleaned
}

/// Short public names for one campus, keyed by `(first, last)`: the first
/// name when nobody else shares it, then first name plus last initial, then
/// the full name.
pub fn display_names<'a>(
    names: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> HashMap<(String, String), String> {
    let mut unique: Vec<(&str, &str)> = names.into_iter().collect();
    unique.sort_unstable();
    unique.dedup();

    let mut by_first: HashMap<&str, usize> = HashMap::new();
    let mut by_initial: HashMap<String, usize> = HashMap::new();
    for &(first, last) in &unique {
        *by_first.entry(first).or_default() += 1;
        *by_initial.entry(initialed(first, last)).or_default() += 1;
    }

    unique
        .into_iter()
        .map(|(first, last)| {
            let short = initialed(first, last);
            let display = if by_first[first] == 1 {
                first.to_string()
            } else if by_initial[&short] == 1 {
                short
            } else {
                crate::models::full_name(first, last)
            };
            ((first.to_string(), last.to_string()), display)
        })
        .collect()
}

fn initialed(first: &str, last: &str) -> String {
    match last.chars().next() {
        Some(initial) => format!("{first} {initial}."),
        None => first.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recases_single_case_names() {
        assert_eq!(cleanup_name("JANE"), "Jane");
        assert_eq!(cleanup_name("doe"), "Doe");
        assert_eq!(cleanup_name(" smith "), "Smith");
    }

    #[test]
    fn keeps_mixed_case_and_short_names() {
        assert_eq!(cleanup_name("McDonald"), "McDonald");
        assert_eq!(cleanup_name("de la Cruz"), "de la Cruz");
        assert_eq!(cleanup_name("j"), "j");
        assert_eq!(cleanup_name(""), "");
    }

    #[test]
    fn display_names_disambiguate_progressively() {
        let names = [
            ("Jane", "Doe"),
            ("Jane", "Smith"),
            ("Max", "Li"),
            ("Ava", "Lee"),
            ("Ava", "Lin"),
        ];
        let display = display_names(names);

        let get = |f: &str, l: &str| display[&(f.to_string(), l.to_string())].clone();
        assert_eq!(get("Max", "Li"), "Max");
        assert_eq!(get("Jane", "Doe"), "Jane D.");
        assert_eq!(get("Jane", "Smith"), "Jane S.");
        assert_eq!(get("Ava", "Lee"), "Ava Lee");
        assert_eq!(get("Ava", "Lin"), "Ava Lin");
    }

    #[test]
    fn repeated_names_count_once() {
        let display = display_names([("Jane", "Doe"), ("Jane", "Doe")]);
        assert_eq!(display[&("Jane".to_string(), "Doe".to_string())], "Jane");
    }
}
