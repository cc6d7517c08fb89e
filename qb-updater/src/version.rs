use crate::error::UpdaterError;
use semver::Version;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A `major.minor.build` version of the tracked application.
///
/// Ordering is numeric per segment, so `4.10.0` sorts after `4.9.0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductVersion(Version);

impl ProductVersion {
    pub fn new(major: u64, minor: u64, build: u64) -> Self {
        Self(Version::new(major, minor, build))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn build(&self) -> u64 {
        self.0.patch
    }
}

impl FromStr for ProductVersion {
    type Err = UpdaterError;

    /// Accepts one to four numeric components. A fourth (revision) component
    /// is dropped, missing ones default to zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let mut segments = [0u64; 3];
        let mut count = 0;

        for part in trimmed.split('.') {
            if count >= 4 || part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(UpdaterError::InvalidVersion(s.to_owned()));
            }

            let value = part
                .parse::<u64>()
                .map_err(|_| UpdaterError::InvalidVersion(s.to_owned()))?;

            if count < 3 {
                segments[count] = value;
            }
            count += 1;
        }

        Ok(Self::new(segments[0], segments[1], segments[2]))
    }
}

impl fmt::Display for ProductVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.build())
    }
}

/// Order two versions by their numeric `(major, minor, build)` triple.
pub fn compare(a: &ProductVersion, b: &ProductVersion) -> Ordering {
    a.cmp(b)
}
