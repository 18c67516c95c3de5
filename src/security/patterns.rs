use regex::RegexSet;
use thiserror::Error;

/// A built-in pattern failed to compile
///
/// The pattern lists are fixed by the program, so this is a startup-time
/// configuration fault rather than a rejected input.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct PatternError {
    #[from]
    source: regex::Error,
}

/// A set of regular expressions compiled once and reused for every match
#[derive(Debug, Clone)]
pub struct PatternSet {
    set: RegexSet,
}

impl PatternSet {
    /// Compile patterns that must match the entire input
    pub fn anchored(patterns: &[&str]) -> Result<Self, PatternError> {
        let set = RegexSet::new(patterns.iter().map(|p| format!("^(?:{})$", p)))?;
        Ok(Self { set })
    }

    /// Compile patterns that may match anywhere in the input
    pub fn unanchored(patterns: &[&str]) -> Result<Self, PatternError> {
        let set = RegexSet::new(patterns)?;
        Ok(Self { set })
    }

    /// Check whether any pattern matches
    pub fn is_match(&self, haystack: &str) -> bool {
        self.set.is_match(haystack)
    }

    /// Return the source of the first pattern (in declaration order) that matches
    pub fn first_match(&self, haystack: &str) -> Option<&str> {
        self.set
            .matches(haystack)
            .iter()
            .next()
            .map(|index| self.set.patterns()[index].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchored_requires_full_match() {
        let set = PatternSet::anchored(&["HOME", "GIT_[A-Z]+"]).unwrap();
        assert!(set.is_match("HOME"));
        assert!(set.is_match("GIT_TRACE"));
        assert!(!set.is_match("HOMEDIR"));
        assert!(!set.is_match("MY_HOME"));
        assert!(!set.is_match("GIT_"));
    }

    #[test]
    fn test_anchored_alternation_is_grouped() {
        // Without grouping "^A|B$" would match "Axx"
        let set = PatternSet::anchored(&["A|B"]).unwrap();
        assert!(set.is_match("A"));
        assert!(!set.is_match("Axx"));
        assert!(!set.is_match("xxB"));
    }

    #[test]
    fn test_unanchored_matches_anywhere() {
        let set = PatternSet::unanchored(&[r"[$;]"]).unwrap();
        assert!(set.is_match("repo;rm"));
        assert!(!set.is_match("repo"));
    }

    #[test]
    fn test_first_match_reports_declaration_order() {
        let set = PatternSet::unanchored(&["b", "a"]).unwrap();
        assert_eq!(set.first_match("ab"), Some("b"));
        assert_eq!(set.first_match("a"), Some("a"));
        assert_eq!(set.first_match("c"), None);
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(PatternSet::anchored(&["[unclosed"]).is_err());
        assert!(PatternSet::unanchored(&["(unclosed"]).is_err());
    }
}
