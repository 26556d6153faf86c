//! The two-axis result protocol.
//!
//! Every public operation reports a `Status` qualified by a `Reason`. The two
//! axes stay independent: the same reason can pair with more than one status
//! (`BUSY` is both a rejection and a state report), so they are never merged
//! into one error enum.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SpdgError;
use crate::keys::Capability;

/// Whether a request was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Status {
    /// Rejection. An expected outcome, not a failure.
    No = 0,
    /// Accepted.
    Ok = 1,
    /// Something went wrong below the protocol (crypto or library failure).
    Err = 2,
}

/// The extra dimension that qualifies a `Status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Reason {
    /// A key was involved: produced, matched, or mismatched.
    Key = 0,
    /// Too busy for new workloads.
    Busy = 1,
    /// Write once, read many.
    Worm = 2,
    /// Can not write.
    ReadOnly = 3,
    /// Can not read.
    WriteOnly = 4,
}

impl Status {
    /// Stable numeric code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode a numeric code. Unknown codes yield `None`.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::No),
            1 => Some(Self::Ok),
            2 => Some(Self::Err),
            _ => None,
        }
    }
}

impl Reason {
    /// Stable numeric code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode a numeric code. Unknown codes yield `None`.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Key),
            1 => Some(Self::Busy),
            2 => Some(Self::Worm),
            3 => Some(Self::ReadOnly),
            4 => Some(Self::WriteOnly),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::No => "NO",
            Self::Ok => "OK",
            Self::Err => "ERR",
        })
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Key => "KEY",
            Self::Busy => "BUSY",
            Self::Worm => "WORM",
            Self::ReadOnly => "READONLY",
            Self::WriteOnly => "WRITEONLY",
        })
    }
}

/// A `(Status, Reason)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outcome {
    pub status: Status,
    pub reason: Reason,
}

impl Outcome {
    /// Pair a status with the reason qualifying it.
    pub const fn new(status: Status, reason: Reason) -> Self {
        Self { status, reason }
    }

    /// An accepted outcome.
    pub const fn ok(reason: Reason) -> Self {
        Self::new(Status::Ok, reason)
    }

    /// An expected rejection.
    pub const fn no(reason: Reason) -> Self {
        Self::new(Status::No, reason)
    }

    /// A failure below the protocol.
    pub const fn err(reason: Reason) -> Self {
        Self::new(Status::Err, reason)
    }

    /// Returns true if the request was accepted.
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Returns true if the request was rejected.
    pub fn is_no(&self) -> bool {
        self.status == Status::No
    }

    /// Returns true if something went wrong.
    pub fn is_err(&self) -> bool {
        self.status == Status::Err
    }

    /// Whether this pair is one the protocol defines.
    ///
    /// `OK` only pairs with `KEY`, `WORM` and `BUSY`; `NO` and `ERR` pair with
    /// any reason.
    pub fn is_recognized(&self) -> bool {
        match self.status {
            Status::Ok => matches!(self.reason, Reason::Key | Reason::Worm | Reason::Busy),
            Status::No | Status::Err => true,
        }
    }

    /// Decode raw codes received from an outside collaborator.
    ///
    /// Unknown codes and unrecognised combinations collapse to `ERR`, keeping
    /// whatever reason could be decoded (`KEY` otherwise).
    pub fn from_codes(status: u8, reason: u8) -> Self {
        let decoded_reason = Reason::from_code(reason);
        match (Status::from_code(status), decoded_reason) {
            (Some(status), Some(reason)) => {
                let outcome = Self::new(status, reason);
                if outcome.is_recognized() {
                    outcome
                } else {
                    Self::err(reason)
                }
            }
            _ => Self::err(decoded_reason.unwrap_or(Reason::Key)),
        }
    }

    /// Raw `(status, reason)` codes.
    pub const fn codes(&self) -> (u8, u8) {
        (self.status.code(), self.reason.code())
    }
}

impl From<Outcome> for (Status, Reason) {
    fn from(outcome: Outcome) -> Self {
        (outcome.status, outcome.reason)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.status, self.reason)
    }
}

/// Non-mutating state report shared by every tier.
///
/// `Layer`, `Onion` and `Facade` each answer with an `Outcome` describing
/// what the next keyed operation would meet.
pub trait State {
    /// Report the current state. Never blocks and never changes anything.
    fn state(&self) -> Outcome;
}

/// The result of a write: the capability (if one was produced), the outcome,
/// and the diagnostic detail for `ERR`.
#[must_use]
#[derive(Debug)]
pub struct Sealed {
    pub capability: Option<Capability>,
    pub outcome: Outcome,
    pub error: Option<SpdgError>,
}

impl Sealed {
    pub(crate) fn granted(capability: Capability) -> Self {
        Self {
            capability: Some(capability),
            outcome: Outcome::ok(Reason::Key),
            error: None,
        }
    }

    /// Written, but no capability exists to read it back.
    pub(crate) fn voided() -> Self {
        Self {
            capability: None,
            outcome: Outcome::ok(Reason::Worm),
            error: None,
        }
    }

    pub(crate) fn rejected(reason: Reason) -> Self {
        Self {
            capability: None,
            outcome: Outcome::no(reason),
            error: None,
        }
    }

    pub(crate) fn failed(error: SpdgError) -> Self {
        Self {
            capability: None,
            outcome: Outcome::err(Reason::Key),
            error: Some(error),
        }
    }

    /// Split into the protocol triple.
    pub fn into_parts(self) -> (Option<Capability>, Status, Reason) {
        (self.capability, self.outcome.status, self.outcome.reason)
    }
}

/// The result of a read: the plaintext (empty unless `OK`), the outcome,
/// and the diagnostic detail for `ERR`.
#[must_use]
#[derive(Clone, PartialEq, Eq)]
pub struct Peeled {
    pub plaintext: Vec<u8>,
    pub outcome: Outcome,
    pub error: Option<SpdgError>,
}

impl Peeled {
    pub(crate) fn opened(plaintext: Vec<u8>) -> Self {
        Self {
            plaintext,
            outcome: Outcome::ok(Reason::Key),
            error: None,
        }
    }

    pub(crate) fn rejected(reason: Reason) -> Self {
        Self {
            plaintext: Vec::new(),
            outcome: Outcome::no(reason),
            error: None,
        }
    }

    pub(crate) fn failed(error: SpdgError) -> Self {
        Self {
            plaintext: Vec::new(),
            outcome: Outcome::err(Reason::Key),
            error: Some(error),
        }
    }

    /// Split into the protocol triple.
    pub fn into_parts(self) -> (Vec<u8>, Status, Reason) {
        (self.plaintext, self.outcome.status, self.outcome.reason)
    }
}

impl fmt::Debug for Peeled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peeled")
            .field("plaintext_len", &self.plaintext.len())
            .field("outcome", &self.outcome)
            .field("error", &self.error)
            .finish()
    }
}
