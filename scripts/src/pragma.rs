//! Parsing of Solidity version pragmas and selection of a matching compiler
//!
//! Solidity pragmas use npm-style version constraints, e.g. `^0.5.16` or
//! `>=0.4.22 <0.7.0`. Matching is done by [`semver`]; this module only
//! translates the pragma syntax into its comparator syntax.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use semver::{Version, VersionReq as SemverReq};

use crate::{constants::PRAGMA_SOLIDITY, errors::ScriptError};

/// A `major.minor.patch` compiler version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SolcVersion {
    /// The major version
    pub major: u64,
    /// The minor version
    pub minor: u64,
    /// The patch version
    pub patch: u64,
}

impl SolcVersion {
    /// Construct a version from its components
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl From<SolcVersion> for Version {
    fn from(v: SolcVersion) -> Self {
        Version::new(v.major, v.minor, v.patch)
    }
}

impl Display for SolcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SolcVersion {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let version = Version::parse(s.trim())
            .map_err(|e| ScriptError::VersionParsing(format!("`{s}`: {e}")))?;
        Ok(SolcVersion::new(version.major, version.minor, version.patch))
    }
}

/// A version constraint, as written in a `pragma solidity` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionReq {
    /// Alternatives separated by `||`
    alternatives: Vec<SemverReq>,
}

impl VersionReq {
    /// Whether the given version satisfies the constraint
    pub fn matches(&self, version: SolcVersion) -> bool {
        let version = Version::from(version);
        self.alternatives.iter().any(|req| req.matches(&version))
    }

    /// The highest of the given versions satisfying the constraint
    pub fn highest_match<I>(&self, candidates: I) -> Option<SolcVersion>
    where
        I: IntoIterator<Item = SolcVersion>,
    {
        candidates.into_iter().filter(|v| self.matches(*v)).max()
    }
}

impl FromStr for VersionReq {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ScriptError::VersionParsing(format!("malformed version constraint `{s}`"));

        let mut alternatives = Vec::new();
        for alternative in s.split("||") {
            // Comparators are whitespace separated and operators may stand
            // apart from their version, e.g. `>= 0.5.0`
            let mut comparators = Vec::new();
            let mut pending_op = String::new();
            for token in alternative.split_whitespace() {
                if token.chars().all(|c| "<>=^~".contains(c)) {
                    pending_op.push_str(token);
                    continue;
                }

                // A bare version is an exact match in Solidity, not a caret
                // range as in Cargo
                let op = match pending_op.as_str() {
                    "" if token.starts_with(|c: char| c.is_ascii_digit()) => "=",
                    op => op,
                };
                comparators.push(format!("{op}{token}"));
                pending_op.clear();
            }

            if !pending_op.is_empty() || comparators.is_empty() {
                return Err(malformed());
            }

            let req = SemverReq::parse(&comparators.join(", "))
                .map_err(|e| ScriptError::VersionParsing(format!("`{s}`: {e}")))?;
            alternatives.push(req);
        }

        Ok(VersionReq { alternatives })
    }
}

/// Extract the version constraint of the first `pragma solidity` directive
/// in a source file
pub fn extract_pragma(source: &str) -> Option<&str> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("//") && !line.starts_with('*'))
        .find_map(|line| line.strip_prefix(PRAGMA_SOLIDITY))
        .map(|rest| rest.split(';').next().unwrap_or(rest).trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SolcVersion {
        s.parse().unwrap()
    }

    fn req(s: &str) -> VersionReq {
        s.parse().unwrap()
    }

    #[test]
    fn test_caret_pins_minor_for_zero_major() {
        let r = req("^0.5.16");
        assert!(r.matches(v("0.5.16")));
        assert!(r.matches(v("0.5.17")));
        assert!(!r.matches(v("0.5.15")));
        assert!(!r.matches(v("0.6.0")));
    }

    #[test]
    fn test_tilde_range() {
        let r = req("~0.6.2");
        assert!(r.matches(v("0.6.12")));
        assert!(!r.matches(v("0.7.0")));
        assert!(!r.matches(v("0.6.1")));
    }

    #[test]
    fn test_bare_version_is_exact() {
        let r = req("0.4.11");
        assert!(r.matches(v("0.4.11")));
        assert!(!r.matches(v("0.4.12")));
    }

    #[test]
    fn test_conjunction_with_spaced_operators() {
        let r = req(">= 0.4.22 <0.6.0");
        assert!(r.matches(v("0.4.22")));
        assert!(r.matches(v("0.5.17")));
        assert!(!r.matches(v("0.6.12")));
        assert!(!r.matches(v("0.4.11")));
    }

    #[test]
    fn test_disjunction() {
        let r = req("0.4.11 || ^0.6.0");
        assert!(r.matches(v("0.4.11")));
        assert!(r.matches(v("0.6.12")));
        assert!(!r.matches(v("0.5.17")));
    }

    #[test]
    fn test_partial_exact_version_matches_any_patch() {
        let r = req("0.5");
        assert!(r.matches(v("0.5.0")));
        assert!(r.matches(v("0.5.17")));
        assert!(!r.matches(v("0.6.0")));
    }

    #[test]
    fn test_partial_upper_bounds_cover_the_whole_minor() {
        let r = req("<=0.6");
        assert!(r.matches(v("0.6.12")));
        assert!(!r.matches(v("0.7.0")));

        let r = req(">=0.5.0 <=0.6");
        assert_eq!(
            r.highest_match(["0.4.11", "0.5.17", "0.6.12"].map(v)),
            Some(v("0.6.12"))
        );
    }

    #[test]
    fn test_partial_strict_lower_bound_skips_the_whole_minor() {
        let r = req(">0.5");
        assert!(!r.matches(v("0.5.17")));
        assert!(r.matches(v("0.6.0")));
    }

    #[test]
    fn test_highest_match_picks_newest_satisfying() {
        let candidates = ["0.4.11", "0.5.17", "0.6.12"].map(v);
        assert_eq!(req("^0.5.16").highest_match(candidates), Some(v("0.5.17")));
        assert_eq!(req(">=0.4.0").highest_match(candidates), Some(v("0.6.12")));
        assert_eq!(req("^0.8.0").highest_match(candidates), None);
    }

    #[test]
    fn test_malformed_constraints_are_rejected() {
        assert!("".parse::<VersionReq>().is_err());
        assert!(">=".parse::<VersionReq>().is_err());
        assert!("^0.x.1".parse::<VersionReq>().is_err());
        assert!("0.5".parse::<SolcVersion>().is_err());
    }

    #[test]
    fn test_extract_pragma_skips_comments() {
        let source = "// SPDX-License-Identifier: MIT\n\
                      // pragma solidity ^0.4.0;\n\
                      pragma solidity ^0.5.16;\n\
                      contract A {}";
        assert_eq!(extract_pragma(source), Some("^0.5.16"));
        assert_eq!(extract_pragma("contract A {}"), None);
    }
}
