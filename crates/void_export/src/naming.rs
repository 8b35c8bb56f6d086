//! Name reconciliation between incoming and local names
//!
//! The reconciler keeps one table per entity kind that maps a key to the
//! display name it owns in the destination. Names already owned by a key
//! are never handed to another key: a colliding request gets the smallest
//! unused `name.NNN` instead.

use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;

/// Identity a reconciled name is registered under
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NameKey<H> {
    /// Datablock present in the destination before the export, by its
    /// position in the namespace snapshot
    Preexisting(usize),
    /// Live destination handle
    Handle(H),
    /// Incoming source name of an entity that has no handle yet
    Incoming(String),
}

impl<H> NameKey<H> {
    pub fn is_preexisting(&self) -> bool {
        matches!(self, Self::Preexisting(_))
    }
}

impl<H: fmt::Display> fmt::Display for NameKey<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preexisting(index) => write!(f, "preexisting#{}", index),
            Self::Handle(handle) => write!(f, "{}", handle),
            Self::Incoming(name) => write!(f, "incoming \"{}\"", name),
        }
    }
}

/// Name cleaning hook: returns the cleaned name and whether a
/// disambiguation suffix was stripped
pub type CleanFn = fn(&str) -> (String, bool);

/// Strip a trailing `.NNN` (exactly three digits) disambiguation suffix
pub fn strip_numeric_suffix(name: &str) -> (String, bool) {
    if name.len() >= 4 && name.is_char_boundary(name.len() - 4) {
        let (stem, suffix) = name.split_at(name.len() - 4);
        let suffix = suffix.as_bytes();
        if suffix[0] == b'.' && suffix[1..].iter().all(u8::is_ascii_digit) {
            return (stem.to_string(), true);
        }
    }
    (name.to_string(), false)
}

/// Collision-free display names per key
#[derive(Clone, Debug)]
pub struct NameReconciler<H> {
    correspondence: IndexMap<NameKey<H>, String>,
    separator: String,
    name_max: Option<usize>,
}

impl<H: Clone + Eq + Hash> Default for NameReconciler<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Clone + Eq + Hash> NameReconciler<H> {
    pub fn new() -> Self {
        Self {
            correspondence: IndexMap::new(),
            separator: ".".to_string(),
            name_max: None,
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Limit names to `name_max` characters, suffix included
    pub fn with_name_max(mut self, name_max: usize) -> Self {
        self.name_max = Some(name_max);
        self
    }

    /// Return the name registered for `key`, or pick a collision-free one
    ///
    /// With `clean`, a stripped `.NNN` suffix forces renumbering from the
    /// cleaned stem. With `register`, the chosen name is stored under `key`
    /// so later calls return it again.
    pub fn unique_name(
        &mut self,
        key: NameKey<H>,
        name: &str,
        clean: Option<CleanFn>,
        register: bool,
    ) -> String {
        if let Some(existing) = self.correspondence.get(&key) {
            return existing.clone();
        }

        let (stem, has_number) = match clean {
            Some(clean) => clean(name),
            None => (name.to_string(), false),
        };
        let mut candidate = stem.clone();

        if has_number || self.contains_name(&candidate) {
            if let Some(max) = self.name_max {
                candidate = truncate(&candidate, max);
            }
            let mut count = 1u32;
            while self.contains_name(&candidate) {
                let number = format!("{:03}", count);
                let base = match self.name_max {
                    Some(max) => {
                        let room = max.saturating_sub(number.len() + self.separator.len());
                        truncate(&stem, room)
                    }
                    None => stem.clone(),
                };
                candidate = format!("{}{}{}", base, self.separator, number);
                count += 1;
            }
        }

        if register {
            self.correspondence.insert(key, candidate.clone());
        }
        candidate
    }

    /// Name registered under `key`
    pub fn get(&self, key: &NameKey<H>) -> Option<&str> {
        self.correspondence.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &NameKey<H>) -> bool {
        self.correspondence.contains_key(key)
    }

    /// Whether any key owns `name`
    pub fn contains_name(&self, name: &str) -> bool {
        self.correspondence.values().any(|n| n == name)
    }

    /// First key, other than a pre-existing one, that owns `name`
    pub fn live_key_for(&self, name: &str) -> Option<&NameKey<H>> {
        self.correspondence
            .iter()
            .find(|(k, n)| !k.is_preexisting() && n.as_str() == name)
            .map(|(k, _)| k)
    }

    /// Record `name` under `key` unless the key is already registered
    pub fn register(&mut self, key: NameKey<H>, name: impl Into<String>) {
        self.correspondence.entry(key).or_insert_with(|| name.into());
    }

    /// Overwrite (or insert) the name registered under `key`
    pub fn update(&mut self, key: NameKey<H>, name: impl Into<String>) {
        self.correspondence.insert(key, name.into());
    }

    /// Drop a key; its name becomes available again
    pub fn forget(&mut self, key: &NameKey<H>) -> Option<String> {
        self.correspondence.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NameKey<H>, &str)> {
        self.correspondence.iter().map(|(k, n)| (k, n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.correspondence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.correspondence.is_empty()
    }
}

fn truncate(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    type Reconciler = NameReconciler<u32>;

    #[test]
    fn test_same_key_is_idempotent() {
        let mut names = Reconciler::new();
        let a = names.unique_name(NameKey::Handle(1), "Cube", None, true);
        let b = names.unique_name(NameKey::Handle(1), "Cube", None, true);
        assert_eq!(a, "Cube");
        assert_eq!(a, b);

        // A later request under the same key ignores the new desired name
        let c = names.unique_name(NameKey::Handle(1), "Sphere", None, true);
        assert_eq!(c, "Cube");
    }

    #[test]
    fn test_different_keys_get_increasing_suffixes() {
        let mut names = Reconciler::new();
        assert_eq!(names.unique_name(NameKey::Handle(1), "Cube", None, true), "Cube");
        assert_eq!(names.unique_name(NameKey::Handle(2), "Cube", None, true), "Cube.001");
        assert_eq!(names.unique_name(NameKey::Handle(3), "Cube", None, true), "Cube.002");
    }

    #[test]
    fn test_smallest_unused_suffix() {
        let mut names = Reconciler::new();
        names.register(NameKey::Preexisting(0), "Cube");
        names.register(NameKey::Preexisting(1), "Cube.002");

        assert_eq!(names.unique_name(NameKey::Handle(7), "Cube", None, true), "Cube.001");
        assert_eq!(names.unique_name(NameKey::Handle(8), "Cube", None, true), "Cube.003");
    }

    #[test]
    fn test_clean_function() {
        assert_eq!(strip_numeric_suffix("Props.004"), ("Props".to_string(), true));
        assert_eq!(strip_numeric_suffix("Props.04"), ("Props.04".to_string(), false));
        assert_eq!(strip_numeric_suffix(".001"), (String::new(), true));

        let mut names = Reconciler::new();
        // Cleaned name is free: the suffix is simply dropped
        let free = names.unique_name(
            NameKey::Incoming("Props.004".into()),
            "Props.004",
            Some(strip_numeric_suffix),
            true,
        );
        assert_eq!(free, "Props");

        // Cleaned name is taken: numbering restarts from the stem
        let taken = names.unique_name(
            NameKey::Incoming("Props.009".into()),
            "Props.009",
            Some(strip_numeric_suffix),
            true,
        );
        assert_eq!(taken, "Props.001");
    }

    #[test]
    fn test_unregistered_request_is_not_stored() {
        let mut names = Reconciler::new();
        names.unique_name(NameKey::Handle(1), "Cube", None, false);
        assert!(names.is_empty());
        assert_eq!(names.unique_name(NameKey::Handle(2), "Cube", None, true), "Cube");
    }

    #[test]
    fn test_name_max_truncates_stem() {
        let mut names = Reconciler::new().with_name_max(8);
        names.register(NameKey::Preexisting(0), "LongName");

        let name = names.unique_name(NameKey::Handle(1), "LongName", None, true);
        assert_eq!(name, "Long.001");
        assert!(name.chars().count() <= 8);
    }

    #[test]
    fn test_custom_separator() {
        let mut names = Reconciler::new().with_separator("_");
        names.register(NameKey::Preexisting(0), "Rock");
        assert_eq!(names.unique_name(NameKey::Handle(1), "Rock", None, true), "Rock_001");
    }

    #[test]
    fn test_live_key_skips_preexisting() {
        let mut names = Reconciler::new();
        names.register(NameKey::Preexisting(0), "A");
        assert!(names.live_key_for("A").is_none());

        names.update(NameKey::Handle(4), "B");
        assert_eq!(names.live_key_for("B"), Some(&NameKey::Handle(4)));
        assert_eq!(names.forget(&NameKey::Handle(4)), Some("B".to_string()));
        assert!(!names.contains_name("B"));
    }
}
