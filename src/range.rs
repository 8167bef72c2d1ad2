//! Range keys selecting which FIRMS time window is proxied.
//!
//! Every range maps to exactly one upstream CSV URL and exactly one cache
//! slot.  The set is closed: anything outside `24h`, `48h` and `7d` is an
//! [`InvalidRange`].

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Range used when the request carries no `range` parameter.
pub const DEFAULT_RANGE: RangeKey = RangeKey::Last24h;

/// Time window of fire detections served by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RangeKey {
    #[serde(rename = "24h")]
    Last24h,
    #[serde(rename = "48h")]
    Last48h,
    #[serde(rename = "7d")]
    Last7d,
}

/// The requested range is not one of the supported windows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid range {0:?}")]
pub struct InvalidRange(pub String);

impl RangeKey {
    pub const ALL: [RangeKey; 3] = [RangeKey::Last24h, RangeKey::Last48h, RangeKey::Last7d];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Last24h => "24h",
            Self::Last48h => "48h",
            Self::Last7d => "7d",
        }
    }

    /// Resolve an optional query value into a range key.
    ///
    /// A missing or empty value resolves to [`DEFAULT_RANGE`] before
    /// validation; any other value must name one of the supported windows.
    pub fn resolve(requested: Option<&str>) -> Result<Self, InvalidRange> {
        match requested {
            None | Some("") => Ok(DEFAULT_RANGE),
            Some(raw) => raw.parse(),
        }
    }
}

impl FromStr for RangeKey {
    type Err = InvalidRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(Self::Last24h),
            "48h" => Ok(Self::Last48h),
            "7d" => Ok(Self::Last7d),
            other => Err(InvalidRange(other.to_string())),
        }
    }
}

impl fmt::Display for RangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
