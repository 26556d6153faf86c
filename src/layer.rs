//! The atomic encrypted envelope.
//!
//! A layer holds exactly one ciphertext and the public key that produced it.
//! The matching private key is handed to the sealer as a `Capability` and is
//! never stored here. A destructively sealed layer drops its capability on
//! the spot: it stays in place, counted, and can never be opened again.

use tracing::{debug, trace, warn};

use crate::crypto;
use crate::error::SpdgError;
use crate::keys::{Capability, LayerKey};
use crate::status::{Outcome, Peeled, Reason, Sealed, State};

/// One encrypted envelope around caller data.
#[derive(Debug, Default)]
pub struct Layer {
    ciphertext: Vec<u8>,
    public_key: Option<LayerKey>,
    sealed: bool,
    voided: bool,
    last_error: Option<SpdgError>,
}

impl Layer {
    /// Create an empty, unsealed layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypt `plaintext` under a fresh keypair and hand back the private half.
    ///
    /// Returns `OK/KEY` with the capability, `NO/WORM` if this layer is
    /// already sealed, or `ERR/KEY` with detail if key generation or
    /// encryption failed.
    pub fn seal(&mut self, plaintext: &[u8]) -> Sealed {
        match self.seal_with_fresh_key(plaintext) {
            Ok(Some(capability)) => Sealed::granted(capability),
            Ok(None) => Sealed::rejected(Reason::Worm),
            Err(e) => Sealed::failed(e),
        }
    }

    /// Like `seal`, but the capability is discarded before returning.
    ///
    /// Returns `OK/WORM`: written, and permanently unreadable.
    pub fn seal_destructive(&mut self, plaintext: &[u8]) -> Sealed {
        match self.seal_with_fresh_key(plaintext) {
            Ok(Some(capability)) => {
                drop(capability);
                self.voided = true;
                debug!(key = ?self.public_key, "layer voided");
                Sealed::voided()
            }
            Ok(None) => Sealed::rejected(Reason::Worm),
            Err(e) => Sealed::failed(e),
        }
    }

    /// Shared path for both seals. `Ok(None)` means the layer was already sealed.
    fn seal_with_fresh_key(&mut self, plaintext: &[u8]) -> Result<Option<Capability>, SpdgError> {
        if self.sealed {
            trace!("seal rejected: layer already sealed");
            return Ok(None);
        }

        let sealed = Capability::generate().and_then(|capability| {
            let public_key = capability.public_key();
            let ciphertext = crypto::seal_envelope(&public_key, plaintext)?;
            Ok((capability, public_key, ciphertext))
        });

        match sealed {
            Ok((capability, public_key, ciphertext)) => {
                self.ciphertext = ciphertext;
                self.public_key = Some(public_key);
                self.sealed = true;
                self.last_error = None;
                Ok(Some(capability))
            }
            Err(e) => {
                warn!(error = %e, "layer seal failed");
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Attempt to decrypt with `capability`.
    ///
    /// A capability for a different key is an expected negative result
    /// (`NO/KEY`), not an error. `ERR/KEY` only signals a matching key whose
    /// ciphertext failed to open. An unsealed layer has nothing to peel
    /// (`NO/READONLY`).
    pub fn peel(&mut self, capability: &Capability) -> Peeled {
        let Some(public_key) = self.public_key.filter(|_| self.sealed) else {
            return Peeled::rejected(Reason::ReadOnly);
        };

        if !capability.unlocks(&public_key) {
            trace!(key = ?public_key, "peel rejected: capability does not match");
            return Peeled::rejected(Reason::Key);
        }

        match crypto::open_envelope(capability, &self.ciphertext) {
            Ok(plaintext) => Peeled::opened(plaintext),
            Err(e) => {
                warn!(key = ?public_key, error = %e, "layer peel failed");
                self.last_error = Some(e.clone());
                Peeled::failed(e)
            }
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Whether this layer was destructively sealed.
    pub fn is_voided(&self) -> bool {
        self.voided
    }

    /// The public key the layer was sealed under, if sealed.
    pub fn public_key(&self) -> Option<&LayerKey> {
        self.public_key.as_ref()
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// The most recent failure, cleared by the next successful seal.
    pub fn last_error(&self) -> Option<&SpdgError> {
        self.last_error.as_ref()
    }

    /// Flip the final tag byte so the next peel with the right key fails.
    #[cfg(test)]
    pub(crate) fn corrupt(&mut self) {
        if let Some(last) = self.ciphertext.last_mut() {
            *last ^= 0xff;
        }
    }
}

impl State for Layer {
    /// `OK/KEY` when sealed and waiting for its capability, `OK/WORM` when
    /// voided, `NO/READONLY` when there is nothing to peel yet.
    fn state(&self) -> Outcome {
        match (self.sealed, self.voided) {
            (false, _) => Outcome::no(Reason::ReadOnly),
            (true, true) => Outcome::ok(Reason::Worm),
            (true, false) => Outcome::ok(Reason::Key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;

    #[test]
    fn test_seal_peel_roundtrip() {
        let mut layer = Layer::new();
        let sealed = layer.seal(b"secret message");
        assert_eq!(sealed.outcome, Outcome::ok(Reason::Key));
        assert!(layer.is_sealed());
        assert!(!layer.is_voided());
        assert_ne!(layer.ciphertext(), b"secret message");

        let capability = sealed.capability.unwrap();
        assert_eq!(layer.public_key(), Some(&capability.public_key()));

        let peeled = layer.peel(&capability);
        assert_eq!(peeled.outcome, Outcome::ok(Reason::Key));
        assert_eq!(peeled.plaintext, b"secret message");
    }

    #[test]
    fn test_peel_with_wrong_capability() {
        let mut layer = Layer::new();
        let _owner = layer.seal(b"secret").capability.unwrap();
        let stranger = Capability::generate().unwrap();

        let (plaintext, status, reason) = layer.peel(&stranger).into_parts();
        assert!(plaintext.is_empty());
        assert_eq!((status, reason), (Status::No, Reason::Key));
        assert!(layer.last_error().is_none());
    }

    #[test]
    fn test_reseal_is_rejected() {
        let mut layer = Layer::new();
        let capability = layer.seal(b"first").capability.unwrap();
        let before = layer.ciphertext().to_vec();

        let again = layer.seal(b"second");
        assert_eq!(again.outcome, Outcome::no(Reason::Worm));
        assert!(again.capability.is_none());
        assert_eq!(layer.ciphertext(), &before[..]);
        assert_eq!(layer.peel(&capability).plaintext, b"first");
    }

    #[test]
    fn test_destructive_seal_returns_no_capability() {
        let mut layer = Layer::new();
        let sealed = layer.seal_destructive(b"spent");
        assert_eq!(sealed.outcome, Outcome::ok(Reason::Worm));
        assert!(sealed.capability.is_none());
        assert!(layer.is_sealed());
        assert!(layer.is_voided());

        let attempt = Capability::generate().unwrap();
        assert_eq!(layer.peel(&attempt).outcome, Outcome::no(Reason::Key));
    }

    #[test]
    fn test_unsealed_layer_has_nothing_to_peel() {
        let mut layer = Layer::new();
        let capability = Capability::generate().unwrap();
        assert_eq!(layer.peel(&capability).outcome, Outcome::no(Reason::ReadOnly));
    }

    #[test]
    fn test_tampered_ciphertext_is_err() {
        let mut layer = Layer::new();
        let capability = layer.seal(b"secret").capability.unwrap();
        layer.corrupt();

        let peeled = layer.peel(&capability);
        assert_eq!(peeled.outcome, Outcome::err(Reason::Key));
        assert_eq!(peeled.error, Some(SpdgError::DecryptionFailure));
        assert_eq!(layer.last_error(), Some(&SpdgError::DecryptionFailure));
    }

    #[test]
    fn test_state_tracks_lifecycle() {
        let mut layer = Layer::new();
        assert_eq!(layer.state(), Outcome::no(Reason::ReadOnly));
        let _capability = layer.seal(b"x").capability.unwrap();
        assert_eq!(layer.state(), Outcome::ok(Reason::Key));

        let mut voided = Layer::new();
        assert!(voided.seal_destructive(b"y").outcome.is_ok());
        assert_eq!(voided.state(), Outcome::ok(Reason::Worm));
    }
}
