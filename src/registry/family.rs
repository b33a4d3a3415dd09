//! Backend families and their URL path segments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the supported downstream product families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendFamily {
    Radarr,
    Sonarr,
    Lidarr,
    Readarr,
}

impl BackendFamily {
    pub const ALL: [BackendFamily; 4] = [
        BackendFamily::Radarr,
        BackendFamily::Sonarr,
        BackendFamily::Lidarr,
        BackendFamily::Readarr,
    ];

    /// The segment used in `/api/<family>/...`.
    pub const fn path_segment(self) -> &'static str {
        match self {
            BackendFamily::Radarr => "radarr",
            BackendFamily::Sonarr => "sonarr",
            BackendFamily::Lidarr => "lidarr",
            BackendFamily::Readarr => "readarr",
        }
    }

    /// Case-sensitive inverse of [`path_segment`](Self::path_segment).
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.path_segment() == segment)
    }

    /// Position in [`ALL`](Self::ALL); used to index per-family tables.
    pub(crate) const fn slot(self) -> usize {
        match self {
            BackendFamily::Radarr => 0,
            BackendFamily::Sonarr => 1,
            BackendFamily::Lidarr => 2,
            BackendFamily::Readarr => 3,
        }
    }
}

impl fmt::Display for BackendFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown backend family {0:?}")]
pub struct UnknownFamily(pub String);

impl FromStr for BackendFamily {
    type Err = UnknownFamily;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_path_segment(s).ok_or_else(|| UnknownFamily(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_round_trip() {
        for family in BackendFamily::ALL {
            assert_eq!(BackendFamily::from_path_segment(family.path_segment()), Some(family));
            assert_eq!(family.to_string().parse::<BackendFamily>(), Ok(family));
        }
    }

    #[test]
    fn segments_are_fixed() {
        assert_eq!(BackendFamily::Radarr.path_segment(), "radarr");
        assert_eq!(BackendFamily::Sonarr.path_segment(), "sonarr");
        assert_eq!(BackendFamily::Lidarr.path_segment(), "lidarr");
        assert_eq!(BackendFamily::Readarr.path_segment(), "readarr");
    }

    #[test]
    fn rejects_unknown_and_wrong_case() {
        assert_eq!(BackendFamily::from_path_segment("Radarr"), None);
        assert_eq!(BackendFamily::from_path_segment("prowlarr"), None);
        assert_eq!(BackendFamily::from_path_segment(""), None);
        assert!("whisparr".parse::<BackendFamily>().is_err());
    }

    #[test]
    fn slots_follow_all_order() {
        for (i, family) in BackendFamily::ALL.into_iter().enumerate() {
            assert_eq!(family.slot(), i);
        }
    }
}
