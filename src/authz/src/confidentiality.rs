//! Confidentiality scale
//!
//! A fixed, totally ordered vocabulary of classification levels, from least to
//! most restrictive. Policies bound a resource's level from above.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification level of a case or document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfidentialityLevel {
    Public,
    LimitedPublic,
    Internal,
    CaseConfidential,
    Confidential,
    StrictlyConfidential,
    Secret,
    TopSecret,
}

impl ConfidentialityLevel {
    /// All levels in ascending order
    pub const ALL: [ConfidentialityLevel; 8] = [
        Self::Public,
        Self::LimitedPublic,
        Self::Internal,
        Self::CaseConfidential,
        Self::Confidential,
        Self::StrictlyConfidential,
        Self::Secret,
        Self::TopSecret,
    ];

    /// Position on the scale, 0 for `public`
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// True iff `self` is at most as restrictive as `other`
    pub fn leq(self, other: Self) -> bool {
        self.rank() <= other.rank()
    }

    /// Levels covered by an upper bound of `self`, ascending
    pub fn at_most(self) -> impl Iterator<Item = ConfidentialityLevel> {
        Self::ALL.into_iter().filter(move |level| level.leq(self))
    }

    /// Wire spelling
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::LimitedPublic => "limited-public",
            Self::Internal => "internal",
            Self::CaseConfidential => "case-confidential",
            Self::Confidential => "confidential",
            Self::StrictlyConfidential => "strictly-confidential",
            Self::Secret => "secret",
            Self::TopSecret => "top-secret",
        }
    }
}

impl fmt::Display for ConfidentialityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfidentialityLevel {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownConfidentialityLevel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scale_order() {
        assert_eq!(ConfidentialityLevel::Public.rank(), 0);
        assert_eq!(ConfidentialityLevel::TopSecret.rank(), 7);
        assert!(ConfidentialityLevel::Internal.leq(ConfidentialityLevel::Internal));
        assert!(ConfidentialityLevel::Public.leq(ConfidentialityLevel::Secret));
        assert!(!ConfidentialityLevel::Secret.leq(ConfidentialityLevel::Internal));
    }

    #[test]
    fn test_parse_wire_spelling() {
        for level in ConfidentialityLevel::ALL {
            assert_eq!(level.as_str().parse::<ConfidentialityLevel>().unwrap(), level);
        }
        let err = "classified".parse::<ConfidentialityLevel>().unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownConfidentialityLevel("classified".to_string())
        );
    }

    #[test]
    fn test_serde_matches_display() {
        let json = serde_json::to_string(&ConfidentialityLevel::CaseConfidential).unwrap();
        assert_eq!(json, "\"case-confidential\"");
        let level: ConfidentialityLevel = serde_json::from_str("\"strictly-confidential\"").unwrap();
        assert_eq!(level, ConfidentialityLevel::StrictlyConfidential);
        assert!(serde_json::from_str::<ConfidentialityLevel>("\"Secret\"").is_err());
    }

    #[test]
    fn test_at_most() {
        let levels: Vec<_> = ConfidentialityLevel::Internal.at_most().collect();
        assert_eq!(
            levels,
            vec![
                ConfidentialityLevel::Public,
                ConfidentialityLevel::LimitedPublic,
                ConfidentialityLevel::Internal,
            ]
        );
    }

    fn any_level() -> impl Strategy<Value = ConfidentialityLevel> {
        (0usize..8).prop_map(|i| ConfidentialityLevel::ALL[i])
    }

    proptest! {
        #[test]
        fn prop_leq_is_total_order(a in any_level(), b in any_level(), c in any_level()) {
            prop_assert!(a.leq(b) || b.leq(a));
            if a.leq(b) && b.leq(a) {
                prop_assert_eq!(a, b);
            }
            if a.leq(b) && b.leq(c) {
                prop_assert!(a.leq(c));
            }
            prop_assert_eq!(a.leq(b), a <= b);
        }
    }
}
