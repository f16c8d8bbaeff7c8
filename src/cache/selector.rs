//! Invalidation selectors for `clear`.

use std::fmt;

use regex::Regex;

use crate::error::Result;

// == Selector ==
/// Which entries a `clear` removes.
#[derive(Debug, Clone, Default)]
pub enum Selector {
    /// Every entry
    #[default]
    All,
    /// The entry stored under exactly this key
    Key(String),
    /// Every entry whose key contains a match for the pattern
    Pattern(Regex),
}

impl Selector {
    /// Compiles `pattern` into a [`Selector::Pattern`].
    ///
    /// Matching is an unanchored search; use `^`/`$` to pin it to the whole key.
    pub fn pattern(pattern: &str) -> Result<Self> {
        Ok(Selector::Pattern(Regex::new(pattern)?))
    }

    /// Returns true if the entry stored at `key` is selected.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Selector::All => true,
            Selector::Key(k) => k == key,
            Selector::Pattern(re) => re.is_match(key),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("*"),
            Selector::Key(k) => f.write_str(k),
            Selector::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<&str> for Selector {
    fn from(key: &str) -> Self {
        Selector::Key(key.to_string())
    }
}

impl From<String> for Selector {
    fn from(key: String) -> Self {
        Selector::Key(key)
    }
}

impl From<Regex> for Selector {
    fn from(re: Regex) -> Self {
        Selector::Pattern(re)
    }
}

impl<S: Into<Selector>> From<Option<S>> for Selector {
    fn from(selector: Option<S>) -> Self {
        selector.map_or(Selector::All, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;

    #[test]
    fn test_key_matches_exactly() {
        let selector = Selector::from("user:1");
        assert!(selector.matches("user:1"));
        assert!(!selector.matches("user:10"));
    }

    #[test]
    fn test_pattern_is_unanchored() {
        let selector = Selector::pattern("user:").unwrap();
        assert!(selector.matches("user:1"));
        assert!(selector.matches("admin-user:2"));
        assert!(!selector.matches("session:1"));

        let anchored = Selector::pattern("^user:\\d+$").unwrap();
        assert!(!anchored.matches("admin-user:2"));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = Selector::pattern("[a-");
        assert!(matches!(result, Err(CacheError::InvalidPattern(_))));
    }

    #[test]
    fn test_option_conversion() {
        assert!(matches!(Selector::from(None::<&str>), Selector::All));
        assert!(matches!(Selector::from(Some("k")), Selector::Key(_)));
        assert_eq!(Selector::All.to_string(), "*");
        assert_eq!(Selector::pattern("a.b").unwrap().to_string(), "/a.b/");
    }
}
