//! Engine version tags and version-range predicates.
//!
//! Nearly every decode decision compares the object's [`UnityVersion`]
//! against a [`VersionKey`] prefix such as `2017.3` or `5.4.1`. A prefix
//! comparison only looks at as many components as the key has, so
//! `2017.3.5f1` is "at least 2017.3" and also "2017.3 exactly".

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::{Error, Result};

/// A version prefix used by gates. Build from [`ver1`], [`ver`] or [`ver3`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionKey {
    parts: [u16; 3],
    depth: u8,
}

/// `major`
pub const fn ver1(major: u16) -> VersionKey {
    VersionKey { parts: [major, 0, 0], depth: 1 }
}

/// `major.minor`
pub const fn ver(major: u16, minor: u16) -> VersionKey {
    VersionKey { parts: [major, minor, 0], depth: 2 }
}

/// `major.minor.patch`
pub const fn ver3(major: u16, minor: u16, patch: u16) -> VersionKey {
    VersionKey { parts: [major, minor, patch], depth: 3 }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.parts[..self.depth as usize].iter().map(|p| p.to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

/// Engine version embedded in serialized files, e.g. `2019.4.31f1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UnityVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    /// Release kind letter (`a`, `b`, `f`, `p`, `x`, `c`). `None` means stripped.
    pub build_type: Option<char>,
    pub build: u16,
}

impl UnityVersion {
    pub const fn new(major: u16, minor: u16, patch: u16, build_type: char, build: u16) -> Self {
        Self { major, minor, patch, build_type: Some(build_type), build }
    }

    /// Build stripped of its release letter. Such files cannot be decoded
    /// without an explicit override.
    pub fn is_stripped(&self) -> bool {
        self.build_type.is_none()
    }

    /// Patch release (`p` build type).
    pub fn is_patch(&self) -> bool {
        self.build_type == Some('p')
    }

    fn cmp_key(&self, key: VersionKey) -> Ordering {
        let mine = [self.major, self.minor, self.patch];
        for i in 0..key.depth as usize {
            match mine[i].cmp(&key.parts[i]) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }

    /// `self >= key` on the key's prefix.
    #[inline]
    pub fn at_least(&self, key: VersionKey) -> bool {
        self.cmp_key(key) != Ordering::Less
    }

    /// `self < key` on the key's prefix.
    #[inline]
    pub fn below(&self, key: VersionKey) -> bool {
        self.cmp_key(key) == Ordering::Less
    }

    /// `self <= key` on the key's prefix.
    #[inline]
    pub fn at_most(&self, key: VersionKey) -> bool {
        self.cmp_key(key) != Ordering::Greater
    }

    /// Prefix equality, e.g. `2017.3.1f1` is `ver3(2017, 3, 1)`.
    #[inline]
    pub fn is(&self, key: VersionKey) -> bool {
        self.cmp_key(key) == Ordering::Equal
    }

    /// Parse a version that must be complete, as required for overrides.
    pub fn parse_override(s: &str) -> Result<Self> {
        let version: Self = s.parse()?;
        if version.is_stripped() {
            return Err(Error::InvalidVersion(format!(
                "\"{s}\" is missing its build type, expected something like 2017.4.39f1"
            )));
        }
        Ok(version)
    }
}

impl FromStr for UnityVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let mut numbers = [0u16; 3];
        let mut idx = 0;
        let mut chars = s.char_indices().peekable();
        let mut current: Option<u32> = None;
        let mut build_type = None;
        let mut build = 0u16;

        while let Some((_, c)) = chars.next() {
            if let Some(d) = c.to_digit(10) {
                let value = current.unwrap_or(0) * 10 + d;
                if value > u16::MAX as u32 {
                    return Err(Error::InvalidVersion(s.to_string()));
                }
                current = Some(value);
            } else if c == '.' {
                let value = current.take().ok_or_else(|| Error::InvalidVersion(s.to_string()))?;
                if idx >= 2 {
                    return Err(Error::InvalidVersion(s.to_string()));
                }
                numbers[idx] = value as u16;
                idx += 1;
            } else if c.is_ascii_alphabetic() {
                let value = current.take().ok_or_else(|| Error::InvalidVersion(s.to_string()))?;
                numbers[idx] = value as u16;
                build_type = Some(c);
                let digits: String = std::iter::from_fn(|| chars.next_if(|(_, c)| c.is_ascii_digit()).map(|(_, c)| c)).collect();
                build = digits.parse().unwrap_or(0);
                // trailing suffixes such as "c1" on regional builds are ignored
                break;
            } else {
                return Err(Error::InvalidVersion(s.to_string()));
            }
        }
        if let Some(value) = current {
            numbers[idx] = value as u16;
        } else if build_type.is_none() {
            return Err(Error::InvalidVersion(s.to_string()));
        }

        let [major, minor, patch] = numbers;
        // "0.0.0" carries no information, regardless of a suffix
        let build_type = if major == 0 && minor == 0 && patch == 0 { None } else { build_type };
        Ok(Self { major, minor, patch, build_type, build })
    }
}

impl fmt::Display for UnityVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(t) = self.build_type {
            write!(f, "{}{}", t, self.build)?;
        }
        Ok(())
    }
}

/// A version-range predicate attached to an optional field.
#[derive(Debug, Clone, Copy)]
pub enum VersionGate {
    Always,
    /// `version >= key`
    Since(VersionKey),
    /// `version < key`
    Before(VersionKey),
    /// `version <= key`
    UpTo(VersionKey),
    /// `from <= version < until`
    Between(VersionKey, VersionKey),
    /// Anything not expressible as a range
    Custom(fn(&UnityVersion) -> bool),
}

impl VersionGate {
    pub fn matches(&self, version: &UnityVersion) -> bool {
        match *self {
            Self::Always => true,
            Self::Since(k) => version.at_least(k),
            Self::Before(k) => version.below(k),
            Self::UpTo(k) => version.at_most(k),
            Self::Between(from, until) => version.at_least(from) && version.below(until),
            Self::Custom(f) => f(version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> UnityVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_full() {
        let version = v("2019.4.31f1");
        assert_eq!((version.major, version.minor, version.patch), (2019, 4, 31));
        assert_eq!(version.build_type, Some('f'));
        assert_eq!(version.build, 1);
        assert!(!version.is_stripped());
        assert_eq!(version.to_string(), "2019.4.31f1");

        let patch = v("2017.3.1p4");
        assert!(patch.is_patch());
        assert!(!v("2021.3.8f1c1").is_stripped());
    }

    #[test]
    fn test_parse_stripped() {
        assert!(v("2020.3.5").is_stripped());
        assert!(v("0.0.0").is_stripped());
        assert!(v("0.0.0f0").is_stripped());
        assert!(v("5.6").is_stripped());
        assert!("".parse::<UnityVersion>().is_err());
        assert!("abc".parse::<UnityVersion>().is_err());
    }

    #[test]
    fn test_override_requires_build_type() {
        assert!(UnityVersion::parse_override("2017.4.39f1").is_ok());
        let err = UnityVersion::parse_override("2017.4.39").unwrap_err();
        assert!(matches!(err, Error::InvalidVersion(_)));
    }

    #[test]
    fn test_prefix_comparisons() {
        let version = v("2017.3.1f1");
        assert!(version.at_least(ver(2017, 3)));
        assert!(version.is(ver(2017, 3)));
        assert!(version.is(ver3(2017, 3, 1)));
        assert!(!version.is(ver3(2017, 3, 0)));
        assert!(version.below(ver(2017, 4)));
        assert!(version.at_most(ver(2017, 3)));
        assert!(version.at_least(ver1(5)));
        assert!(v("4.2.2f1").below(ver(4, 3)));
        assert!(v("4.3.0f1").at_least(ver(4, 3)));
    }

    #[test]
    fn test_gates() {
        let old = v("4.2.2f1");
        let new = v("4.3.0f4");
        let gate = VersionGate::Since(ver(4, 3));
        assert!(!gate.matches(&old));
        assert!(gate.matches(&new));
        assert!(VersionGate::Between(ver(4, 0), ver(4, 3)).matches(&old));
        assert!(!VersionGate::Between(ver(4, 0), ver(4, 3)).matches(&new));
        assert!(VersionGate::UpTo(ver(4, 2)).matches(&old));
        assert!(VersionGate::Custom(|v| v.is_patch()).matches(&v("5.4.1p3")));
        assert_eq!(ver3(2023, 2, 8).to_string(), "2023.2.8");
    }
}
