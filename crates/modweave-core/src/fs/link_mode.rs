use std::fmt;

use serde::{Deserialize, Serialize};

/// How a cached file is materialized into a game's mod directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMethod {
    #[default]
    Symlink,
    Hardlink,
    Copy,
}

impl LinkMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkMethod::Symlink => "symlink",
            LinkMethod::Hardlink => "hardlink",
            LinkMethod::Copy => "copy",
        }
    }
}

impl fmt::Display for LinkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LinkMethod {
    type Err = crate::error::ModError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "symlink" => Ok(LinkMethod::Symlink),
            "hardlink" => Ok(LinkMethod::Hardlink),
            "copy" => Ok(LinkMethod::Copy),
            other => Err(crate::error::ModError::InvalidConfig(format!(
                "unknown link method: {other}"
            ))),
        }
    }
}
