//! Blob reference keys for uploaded attachments.

use std::collections::HashMap;

use crate::util::base_name;

/// Build the blob key `{user_id}-{timestamp_ms}-{base name}`.
///
/// ```
/// use chatify_core::reference::reference;
///
/// let key = reference("u1", 1_690_000_000_000, "file:///tmp/photo.jpg");
/// assert_eq!(key, "u1-1690000000000-photo.jpg");
/// ```
#[must_use]
pub fn reference(user_id: &str, timestamp_ms: i64, original_name: &str) -> String {
    format!("{user_id}-{timestamp_ms}-{}", base_name(original_name))
}

/// Per-client reference issuer that never repeats a key.
///
/// Two uploads of the same base name by the same user within one millisecond
/// would collide under [`reference`]; the later one is moved past the last
/// millisecond issued for that (user, base name) pair instead.
#[derive(Debug, Default)]
pub struct ReferenceGenerator {
    issued: HashMap<(String, String), i64>,
}

impl ReferenceGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, user_id: &str, timestamp_ms: i64, original_name: &str) -> String {
        let name = base_name(original_name).to_string();
        let last = self
            .issued
            .entry((user_id.to_string(), name.clone()))
            .or_insert(i64::MIN);
        *last = if timestamp_ms > *last {
            timestamp_ms
        } else {
            last.saturating_add(1)
        };
        reference(user_id, *last, &name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_uses_base_name() {
        assert_eq!(
            reference("u1", 1_690_000_000_000, "photo.jpg"),
            "u1-1690000000000-photo.jpg"
        );
        assert_eq!(
            reference("u1", 5, "file:///var/mobile/Recording/clip.m4a"),
            "u1-5-clip.m4a"
        );
    }

    #[test]
    fn generator_bumps_repeated_millisecond() {
        let mut generator = ReferenceGenerator::new();
        let first = generator.next("u1", 100, "photo.jpg");
        let second = generator.next("u1", 100, "/other/dir/photo.jpg");
        let third = generator.next("u1", 100, "photo.jpg");

        assert_eq!(first, "u1-100-photo.jpg");
        assert_eq!(second, "u1-101-photo.jpg");
        assert_eq!(third, "u1-102-photo.jpg");
    }

    #[test]
    fn generator_keeps_distinct_names_untouched() {
        let mut generator = ReferenceGenerator::new();
        assert_eq!(generator.next("u1", 100, "a.jpg"), "u1-100-a.jpg");
        assert_eq!(generator.next("u1", 100, "b.jpg"), "u1-100-b.jpg");
        assert_eq!(generator.next("u2", 100, "b.jpg"), "u2-100-b.jpg");
        assert_eq!(generator.next("u2", 250, "b.jpg"), "u2-250-b.jpg");
    }

    #[test]
    fn generator_remembers_every_name_not_just_the_last() {
        let mut generator = ReferenceGenerator::new();
        let first = generator.next("u1", 100, "a.jpg");
        let other = generator.next("u1", 100, "b.jpg");
        let again = generator.next("u1", 100, "a.jpg");
        let later = generator.next("u1", 101, "a.jpg");

        assert_eq!(first, "u1-100-a.jpg");
        assert_eq!(other, "u1-100-b.jpg");
        assert_eq!(again, "u1-101-a.jpg");
        assert_eq!(later, "u1-102-a.jpg");
    }
}
