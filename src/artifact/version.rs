//! Module versions in `major.minor.micro.qualifier` form.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::ArtifactError;

/// Qualifier marking a mutable development build.
pub const SNAPSHOT_QUALIFIER: &str = "snapshot";

/// A parsed module version.
///
/// Missing numeric parts default to zero and the qualifier defaults to empty,
/// so `1.2` equals `1.2.0`. Qualifiers compare as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
    pub qualifier: String,
}

impl Version {
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    /// Whether the qualifier is `snapshot`, ignoring case.
    pub fn is_snapshot(&self) -> bool {
        self.qualifier.eq_ignore_ascii_case(SNAPSHOT_QUALIFIER)
    }

    /// Parse a version header value.
    ///
    /// Blank input yields `0.0.0`.
    pub fn parse(input: &str) -> Result<Self, ArtifactError> {
        let text = input.trim();
        if text.is_empty() {
            return Ok(Self::default());
        }

        let invalid = |reason: &str| ArtifactError::InvalidVersion {
            value: input.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = text.splitn(4, '.');
        let mut numbers = [0u32; 3];
        for (index, slot) in numbers.iter_mut().enumerate() {
            match parts.next() {
                Some(part) => {
                    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(invalid("numeric component expected"));
                    }
                    *slot = part
                        .parse()
                        .map_err(|_| invalid("numeric component out of range"))?;
                }
                None if index == 0 => return Err(invalid("missing major component")),
                None => break,
            }
        }

        let qualifier = parts.next().unwrap_or_default();
        if !qualifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(invalid("qualifier may only contain letters, digits, '_' and '-'"));
        }
        if text.ends_with('.') {
            return Err(invalid("trailing '.'"));
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            micro: numbers[2],
            qualifier: qualifier.to_string(),
        })
    }
}

impl FromStr for Version {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.micro, &self.qualifier).cmp(&(
            other.major,
            other.minor,
            other.micro,
            &other.qualifier,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_version() {
        let v = Version::parse("1.2.3.SNAPSHOT").unwrap();
        assert_eq!(v, Version::new(1, 2, 3).with_qualifier("SNAPSHOT"));
        assert!(v.is_snapshot());
        assert_eq!(v.to_string(), "1.2.3.SNAPSHOT");
    }

    #[test]
    fn test_parse_short_forms_pad_with_zero() {
        assert_eq!(Version::parse("1").unwrap(), Version::new(1, 0, 0));
        assert_eq!(Version::parse(" 1.2 ").unwrap(), Version::new(1, 2, 0));
        assert_eq!(Version::parse("").unwrap(), Version::default());
    }

    #[test]
    fn test_snapshot_must_be_the_whole_qualifier() {
        assert!(Version::parse("1.0.0.snapshot").unwrap().is_snapshot());
        assert!(!Version::parse("1.0.0.20240101-SNAPSHOT").unwrap().is_snapshot());
        assert!(!Version::parse("1.0.0").unwrap().is_snapshot());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["a.b.c", "1..2", "1.2.3.", "1.2.3.bad qualifier", "-1.0", "1.0.0.x.y!"] {
            assert!(Version::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_qualifier_allows_underscore_and_dash() {
        let v = Version::parse("1.0.0.v1_2-rc").unwrap();
        assert_eq!(v.qualifier, "v1_2-rc");
    }

    #[test]
    fn test_ordering() {
        assert!(Version::new(1, 0, 0) < Version::new(1, 0, 1));
        assert!(Version::new(1, 10, 0) > Version::new(1, 9, 9));
    }
}
