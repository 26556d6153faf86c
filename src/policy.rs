//! Access policies for a facade.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::Reason;

/// Which directions a facade permits. Fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Policy {
    /// Reads and writes.
    #[default]
    Open,
    /// One successful write, then reads only.
    Worm,
    /// Reads only.
    ReadOnly,
    /// Writes only.
    WriteOnly,
}

impl Policy {
    /// Gate a write. `locked` is set once a WORM facade has committed.
    pub fn check_write(self, locked: bool) -> Result<(), Reason> {
        match self {
            Self::Open | Self::WriteOnly => Ok(()),
            Self::Worm if locked => Err(Reason::Worm),
            Self::Worm => Ok(()),
            Self::ReadOnly => Err(Reason::ReadOnly),
        }
    }

    /// Gate a read.
    pub fn check_read(self) -> Result<(), Reason> {
        match self {
            Self::WriteOnly => Err(Reason::WriteOnly),
            Self::Open | Self::Worm | Self::ReadOnly => Ok(()),
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "OPEN",
            Self::Worm => "WORM",
            Self::ReadOnly => "READONLY",
            Self::WriteOnly => "WRITEONLY",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_table() {
        assert_eq!(Policy::Open.check_write(false), Ok(()));
        assert_eq!(Policy::Open.check_read(), Ok(()));

        assert_eq!(Policy::Worm.check_write(false), Ok(()));
        assert_eq!(Policy::Worm.check_write(true), Err(Reason::Worm));
        assert_eq!(Policy::Worm.check_read(), Ok(()));

        assert_eq!(Policy::ReadOnly.check_write(false), Err(Reason::ReadOnly));
        assert_eq!(Policy::ReadOnly.check_read(), Ok(()));

        assert_eq!(Policy::WriteOnly.check_write(true), Ok(()));
        assert_eq!(Policy::WriteOnly.check_read(), Err(Reason::WriteOnly));
    }
}
