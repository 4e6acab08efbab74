//! Name filter applied to the stem of every candidate file.

use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};
use crate::utils::base_name;

/// Compiled, end-anchored name pattern.
#[derive(Debug, Clone)]
pub struct NameFilter {
    re: Regex,
}

impl NameFilter {
    /// Compile `pattern`, anchoring the whole of it at the end unless it already
    /// asserts end of string.
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::Pattern("pattern must not be empty".into()));
        }
        let anchored = if is_end_anchored(pattern) {
            pattern.to_string()
        } else {
            format!("(?:{pattern})$")
        };
        let re = Regex::new(&anchored)?;
        Ok(Self { re })
    }

    /// Does the base name (stem, without extension) match?
    pub fn matches(&self, base: &str) -> bool {
        !base.is_empty() && self.re.is_match(base)
    }

    /// Convenience wrapper: match the stem of `path`.
    pub fn matches_path(&self, path: &Path) -> bool {
        base_name(path).is_some_and(|b| self.matches(&b))
    }

    /// The pattern actually compiled, after anchoring.
    pub fn as_str(&self) -> &str {
        self.re.as_str()
    }
}

fn is_end_anchored(pattern: &str) -> bool {
    if pattern.ends_with(r"\z") {
        // `\\z` is a literal backslash followed by `z`
        let head = &pattern[..pattern.len() - 2];
        return trailing_backslashes(head) % 2 == 0;
    }
    match pattern.strip_suffix('$') {
        Some(head) => trailing_backslashes(head) % 2 == 0,
        None => false,
    }
}

fn trailing_backslashes(s: &str) -> usize {
    s.chars().rev().take_while(|c| *c == '\\').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn appends_end_anchor() {
        let f = NameFilter::new("_up").unwrap();
        assert_eq!(f.as_str(), "(?:_up)$");
        assert!(f.matches("report_up"));
        assert!(!f.matches("report_up_final"));
    }

    #[test]
    fn keeps_existing_anchor() {
        let f = NameFilter::new("_up$").unwrap();
        assert_eq!(f.as_str(), "_up$");
        assert!(f.matches("a_up"));

        let z = NameFilter::new(r"_up\z").unwrap();
        assert_eq!(z.as_str(), r"_up\z");
        assert!(z.matches("b_up"));
    }

    #[test]
    fn escaped_dollar_is_not_an_anchor() {
        let f = NameFilter::new(r"cost\$").unwrap();
        assert_eq!(f.as_str(), r"(?:cost\$)$");
        assert!(f.matches("total cost$"));
        assert!(!f.matches("cost$ total"));
    }

    #[test]
    fn every_alternative_is_anchored() {
        let f = NameFilter::new("_up|_sync").unwrap();
        assert!(f.matches("x_up"));
        assert!(f.matches("x_sync"));
        assert!(!f.matches("x_up_old"));
        assert!(!f.matches("x_sync_old"));
    }

    #[test]
    fn search_not_full_match() {
        let f = NameFilter::new(r"\(\d+\)").unwrap();
        assert!(f.matches("scan (3)"));
        assert!(!f.matches("scan (3) copy"));
    }

    #[test]
    fn empty_base_never_matches() {
        let f = NameFilter::new(".*").unwrap();
        assert!(!f.matches(""));
        assert!(f.matches("anything"));
    }

    #[test]
    fn unicode_names() {
        let f = NameFilter::new("_済").unwrap();
        assert!(f.matches("請求書_済"));
        assert!(!f.matches("請求書"));
    }

    #[test]
    fn matches_path_uses_stem() {
        let f = NameFilter::new("_up").unwrap();
        assert!(f.matches_path(&PathBuf::from("/tmp/a_up.pdf")));
        assert!(f.matches_path(&PathBuf::from("/tmp/a_up")));
        assert!(!f.matches_path(&PathBuf::from("/tmp/a_up.txt.bak")));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(matches!(NameFilter::new("(unclosed"), Err(Error::Pattern(_))));
        assert!(matches!(NameFilter::new(""), Err(Error::Pattern(_))));
    }
}
