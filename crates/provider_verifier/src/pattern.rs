//! Email naming templates
//!
//! A naming pattern describes how a company turns a person's name into the
//! local part of their address. Patterns serialize as their template string
//! (`{first}.{last}`, `{f}{last}`, ...) so cache files stay human-readable.

use crate::ParsedName;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A known local-part template over `{first}`, `{last}` and `{f}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NamingPattern {
    /// `{first}.{last}`
    FirstDotLast,
    /// `{f}{last}`
    InitialLast,
    /// `{first}{last}`
    FirstLast,
    /// `{first}_{last}`
    FirstUnderscoreLast,
    /// `{first}-{last}`
    FirstHyphenLast,
    /// `{first}`
    First,
}

/// Order in which templates are tried when matching a confirmed address.
pub const ALL_PATTERNS: [NamingPattern; 6] = [
    NamingPattern::FirstDotLast,
    NamingPattern::InitialLast,
    NamingPattern::FirstLast,
    NamingPattern::FirstUnderscoreLast,
    NamingPattern::FirstHyphenLast,
    NamingPattern::First,
];

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unrecognized naming pattern: {0}")]
pub struct UnknownPattern(pub String);

impl NamingPattern {
    pub fn template(&self) -> &'static str {
        match self {
            NamingPattern::FirstDotLast => "{first}.{last}",
            NamingPattern::InitialLast => "{f}{last}",
            NamingPattern::FirstLast => "{first}{last}",
            NamingPattern::FirstUnderscoreLast => "{first}_{last}",
            NamingPattern::FirstHyphenLast => "{first}-{last}",
            NamingPattern::First => "{first}",
        }
    }

    /// Render the local part for a name. Name parts are lowercased.
    pub fn render(&self, name: &ParsedName) -> String {
        let first = name.first_lower();
        let last = name.last_lower();
        match self {
            NamingPattern::FirstDotLast => format!("{first}.{last}"),
            NamingPattern::InitialLast => format!("{}{last}", name.initial_lower()),
            NamingPattern::FirstLast => format!("{first}{last}"),
            NamingPattern::FirstUnderscoreLast => format!("{first}_{last}"),
            NamingPattern::FirstHyphenLast => format!("{first}-{last}"),
            NamingPattern::First => first,
        }
    }

    /// Full address for a name, or `None` if the local part would be shorter
    /// than two characters.
    pub fn address(&self, name: &ParsedName, domain: &str) -> Option<String> {
        let local = self.render(name);
        if local.chars().count() < 2 {
            return None;
        }
        Some(format!("{}@{}", local, crate::normalize(domain)))
    }

    /// Find the template that produced `email` for this person.
    pub fn detect(email: &str, name: &ParsedName) -> Option<NamingPattern> {
        let (local, _) = email.trim().split_once('@')?;
        let local = local.to_lowercase();
        if local.is_empty() {
            return None;
        }
        ALL_PATTERNS
            .iter()
            .copied()
            .find(|pattern| pattern.render(name) == local)
    }
}

impl fmt::Display for NamingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template())
    }
}

impl FromStr for NamingPattern {
    type Err = UnknownPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_PATTERNS
            .iter()
            .copied()
            .find(|pattern| pattern.template() == s.trim())
            .ok_or_else(|| UnknownPattern(s.to_string()))
    }
}

impl TryFrom<String> for NamingPattern {
    type Error = UnknownPattern;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NamingPattern> for String {
    fn from(pattern: NamingPattern) -> Self {
        pattern.template().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jane() -> ParsedName {
        ParsedName::new("Jane", "Smith")
    }

    #[test]
    fn test_render_each_template() {
        let name = jane();
        assert_eq!(NamingPattern::FirstDotLast.render(&name), "jane.smith");
        assert_eq!(NamingPattern::InitialLast.render(&name), "jsmith");
        assert_eq!(NamingPattern::FirstLast.render(&name), "janesmith");
        assert_eq!(NamingPattern::FirstUnderscoreLast.render(&name), "jane_smith");
        assert_eq!(NamingPattern::FirstHyphenLast.render(&name), "jane-smith");
        assert_eq!(NamingPattern::First.render(&name), "jane");
    }

    #[test]
    fn test_address_rejects_short_local_parts() {
        let name = ParsedName::new("J", "");
        assert_eq!(NamingPattern::First.address(&name, "acme.com"), None);
        assert_eq!(
            NamingPattern::FirstDotLast.address(&jane(), " ACME.com "),
            Some("jane.smith@acme.com".to_string())
        );
    }

    #[test]
    fn test_detect_confirmed_address() {
        let name = jane();
        assert_eq!(
            NamingPattern::detect("JSmith@acme.com", &name),
            Some(NamingPattern::InitialLast)
        );
        assert_eq!(
            NamingPattern::detect("jane_smith@acme.com", &name),
            Some(NamingPattern::FirstUnderscoreLast)
        );
        assert_eq!(NamingPattern::detect("smith.j@acme.com", &name), None);
        assert_eq!(NamingPattern::detect("not-an-address", &name), None);
    }

    #[test]
    fn test_template_parsing() {
        assert_eq!("{first}.{last}".parse(), Ok(NamingPattern::FirstDotLast));
        assert_eq!("{f}{last}".parse(), Ok(NamingPattern::InitialLast));
        assert!("{last}.{first}".parse::<NamingPattern>().is_err());
    }

    #[test]
    fn test_serializes_as_template() {
        let json = serde_json::to_string(&NamingPattern::FirstHyphenLast).unwrap();
        assert_eq!(json, "\"{first}-{last}\"");
        let back: NamingPattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NamingPattern::FirstHyphenLast);
        assert!(serde_json::from_str::<NamingPattern>("\"{nope}\"").is_err());
    }
}
