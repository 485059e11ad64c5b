//! String-keyed parameter bags (`key=value;key2=value2`).

use std::fmt;

/// Key carrying the routing device bitmask.
pub const KEY_ROUTING: &str = "routing";

/// An ordered set of `key=value` pairs.
///
/// Keys without a value (`"routing"`) parse with an empty value, which is how
/// callers ask for a parameter in `get_parameters`.
///
/// # Example
///
/// ```
/// use asoc_audio_hal::ParamBag;
///
/// let mut bag = ParamBag::parse("routing=2;foo=bar");
/// assert_eq!(bag.get_int("routing"), Some(2));
/// bag.remove("routing");
/// assert_eq!(bag.to_string(), "foo=bar");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamBag {
    entries: Vec<(String, String)>,
}

impl ParamBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key=value` pairs separated by `;`.
    ///
    /// Empty segments are skipped; a repeated key keeps its last value.
    #[must_use]
    pub fn parse(pairs: &str) -> Self {
        let mut bag = Self::new();
        for segment in pairs.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
            bag.insert(key.trim(), value.trim());
        }
        bag
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the value for `key` parsed as an integer.
    ///
    /// Returns `None` when the key is missing or its value is not a number.
    #[must_use]
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key)?.parse().ok()
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Sets `key` to `value`, keeping its position if already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Removes `key` and returns its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Returns the number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the bag holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ParamBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let bag = ParamBag::parse("routing=4;screen_state=on");
        assert_eq!(bag.len(), 2);
        assert_eq!(bag.get_int(KEY_ROUTING), Some(4));
        assert_eq!(bag.get("screen_state"), Some("on"));
    }

    #[test]
    fn test_parse_bare_key() {
        let bag = ParamBag::parse("routing");
        assert!(bag.contains(KEY_ROUTING));
        assert_eq!(bag.get(KEY_ROUTING), Some(""));
        assert_eq!(bag.get_int(KEY_ROUTING), None);
    }

    #[test]
    fn test_parse_skips_empty_segments() {
        let bag = ParamBag::parse(";;routing=1;");
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut bag = ParamBag::parse("routing;foo");
        bag.insert(KEY_ROUTING, "2");
        assert_eq!(bag.to_string(), "routing=2;foo=");
    }

    #[test]
    fn test_non_numeric_value_is_not_an_int() {
        let bag = ParamBag::parse("routing=speaker");
        assert_eq!(bag.get_int(KEY_ROUTING), None);
    }
}
