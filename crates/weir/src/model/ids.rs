//! Descriptive id generation.
//!
//! Element ids are readable by construction: `UserTask_ReviewOrder` rather
//! than an opaque UUID. Named elements get `<Prefix>_<PascalCaseName>`;
//! unnamed ones fall back to `<Prefix>_<7 random lowercase alphanumerics>`;
//! a name collision inserts the random segment in the middle:
//! `<Prefix>_<rand7>_<Name>`.

use rand::Rng;

const SUFFIX_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const HEX_CHARS: &[u8] = b"0123456789abcdef";

/// Strips punctuation from a name and PascalCases the remaining words.
///
/// `"review the order!"` becomes `"ReviewTheOrder"`. Returns an empty
/// string when nothing alphanumeric survives.
pub fn pascal_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut start_of_word = true;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if start_of_word {
                result.extend(ch.to_uppercase());
                start_of_word = false;
            } else {
                result.push(ch);
            }
        } else {
            start_of_word = true;
        }
    }
    result
}

/// A random lowercase-alphanumeric suffix of the given length.
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| SUFFIX_CHARS[rng.random_range(0..SUFFIX_CHARS.len())] as char)
        .collect()
}

fn random_hex(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| HEX_CHARS[rng.random_range(0..HEX_CHARS.len())] as char)
        .collect()
}

/// A fresh diagram id: `diagram_<millis>_<12 hex chars>`.
pub fn diagram_id(now_ms: u64) -> String {
    format!("diagram_{}_{}", now_ms, random_hex(12))
}

/// Generates a descriptive element id that is unique per `exists`.
///
/// `exists` is consulted against the whole diagram (elements and edges).
pub fn descriptive_id(
    prefix: &str,
    name: Option<&str>,
    mut exists: impl FnMut(&str) -> bool,
) -> String {
    let pascal = name.map(pascal_case).filter(|p| !p.is_empty());
    if let Some(pascal) = pascal {
        let candidate = format!("{prefix}_{pascal}");
        if !exists(&candidate) {
            return candidate;
        }
        // Collision: keep the readable name, disambiguate in the middle.
        loop {
            let candidate = format!("{prefix}_{}_{pascal}", random_suffix(7));
            if !exists(&candidate) {
                return candidate;
            }
        }
    }
    loop {
        let candidate = format!("{prefix}_{}", random_suffix(7));
        if !exists(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("review order"), "ReviewOrder");
        assert_eq!(pascal_case("check: is it valid?"), "CheckIsItValid");
        assert_eq!(pascal_case("Already"), "Already");
        assert_eq!(pascal_case("!!!"), "");
        assert_eq!(pascal_case("multi-word name"), "MultiWordName");
    }

    #[test]
    fn test_descriptive_id_with_name() {
        let id = descriptive_id("UserTask", Some("Review Order"), |_| false);
        assert_eq!(id, "UserTask_ReviewOrder");
    }

    #[test]
    fn test_descriptive_id_without_name() {
        let id = descriptive_id("Task", None, |_| false);
        assert_eq!(id.len(), "Task_".len() + 7);
        assert!(id.starts_with("Task_"));
        let suffix = &id["Task_".len()..];
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_descriptive_id_collision_inserts_middle_segment() {
        let mut taken: HashSet<String> = HashSet::new();
        taken.insert("UserTask_Review".to_string());
        let id = descriptive_id("UserTask", Some("Review"), |candidate| {
            taken.contains(candidate)
        });
        assert!(id.starts_with("UserTask_"));
        assert!(id.ends_with("_Review"));
        let middle = &id["UserTask_".len()..id.len() - "_Review".len()];
        assert_eq!(middle.len(), 7);
    }

    #[test]
    fn test_diagram_id_shape() {
        let id = diagram_id(1700000000123);
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts[0], "diagram");
        assert_eq!(parts[1], "1700000000123");
        assert_eq!(parts[2].len(), 12);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }
}

#[cfg(test)]
mod proptest_tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn pascal_case_is_alphanumeric(name in ".{0,40}") {
            prop_assert!(pascal_case(&name).chars().all(char::is_alphanumeric));
        }

        #[test]
        fn pascal_case_is_idempotent(name in "[a-zA-Z0-9 ]{0,40}") {
            let once = pascal_case(&name);
            prop_assert_eq!(pascal_case(&once), once.clone());
        }

        #[test]
        fn descriptive_ids_avoid_taken_names(name in "[a-zA-Z ]{1,20}") {
            let taken = format!("Task_{}", pascal_case(&name));
            let id = descriptive_id("Task", Some(&name), |candidate| candidate == taken);
            prop_assert_ne!(id.clone(), taken);
            prop_assert!(id.starts_with("Task_"));
        }
    }
}
