//! Supported California jurisdictions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label used when no supported jurisdiction was selected.
pub const UNSPECIFIED_LABEL: &str = "Unspecified jurisdiction";

/// A county or city whose local code is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jurisdiction {
    AlamedaCounty,
    CalaverasCounty,
    SierraMadre,
}

impl Jurisdiction {
    pub const ALL: [Jurisdiction; 3] = [
        Jurisdiction::AlamedaCounty,
        Jurisdiction::CalaverasCounty,
        Jurisdiction::SierraMadre,
    ];

    /// Stable identifier used by the front end.
    pub fn key(self) -> &'static str {
        match self {
            Jurisdiction::AlamedaCounty => "alameda",
            Jurisdiction::CalaverasCounty => "calaveras",
            Jurisdiction::SierraMadre => "sierra_madre",
        }
    }

    /// Human-readable name, also the value stored in the documents' jurisdiction column.
    pub fn label(self) -> &'static str {
        match self {
            Jurisdiction::AlamedaCounty => "Alameda County",
            Jurisdiction::CalaverasCounty => "Calaveras County",
            Jurisdiction::SierraMadre => "Sierra Madre",
        }
    }

    /// Kind of government the code belongs to, shown in the prompt's list.
    pub fn kind(self) -> &'static str {
        match self {
            Jurisdiction::AlamedaCounty | Jurisdiction::CalaverasCounty => "County",
            Jurisdiction::SierraMadre => "City",
        }
    }

    /// Resolves a key or label, ignoring case and treating `_`, `-` and spaces alike.
    pub fn parse(input: &str) -> Option<Self> {
        let wanted = normalize(input);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|j| {
            let label = normalize(j.label());
            wanted == normalize(j.key())
                || wanted == label
                || label.strip_suffix(" county").is_some_and(|short| wanted == short)
        })
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Label for an optional identifier; unknown or missing ones get [`UNSPECIFIED_LABEL`].
pub fn label_for(id: Option<&str>) -> &'static str {
    id.and_then(Jurisdiction::parse)
        .map(Jurisdiction::label)
        .unwrap_or(UNSPECIFIED_LABEL)
}

fn normalize(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_jurisdiction_has_label() {
        for j in Jurisdiction::ALL {
            assert!(!j.label().is_empty());
            assert_eq!(label_for(Some(j.key())), j.label());
        }
    }

    #[test]
    fn test_parse_accepts_labels_and_keys() {
        assert_eq!(Jurisdiction::parse("Alameda County"), Some(Jurisdiction::AlamedaCounty));
        assert_eq!(Jurisdiction::parse("alameda"), Some(Jurisdiction::AlamedaCounty));
        assert_eq!(Jurisdiction::parse("Sierra_Madre"), Some(Jurisdiction::SierraMadre));
        assert_eq!(Jurisdiction::parse("  CALAVERAS-county "), Some(Jurisdiction::CalaverasCounty));
    }

    #[test]
    fn test_unknown_resolves_to_placeholder() {
        assert_eq!(label_for(Some("Orange County")), UNSPECIFIED_LABEL);
        assert_eq!(label_for(Some("")), UNSPECIFIED_LABEL);
        assert_eq!(label_for(None), UNSPECIFIED_LABEL);
    }
}
