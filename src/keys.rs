//! Layer keys and capabilities.
//!
//! This module owns two responsibilities:
//! 1. Generating X25519 keypairs whose public half identifies a layer and
//!    whose private half is the `Capability` that reverses a seal.
//! 2. Deriving per-envelope content keys with HKDF-SHA512, held in types that
//!    are opaque, non-cloneable, and zeroised on drop.
//!
//! This is one of exactly two modules permitted to import `ring` directly
//! (the other is `crypto`).
//!
//! ## Derivation structure
//!
//! ```text
//! HKDF-SHA512(
//!     ikm  = X25519(secret, peer),
//!     salt = ephemeral_public || recipient_public,
//!     info = "spdg/layer/v1"
//! )
//! ```

use std::fmt;

use ring::hkdf;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{self, KEY_LEN};
use crate::error::{Result, SpdgError};

/// Size of an X25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Domain separation for content key expansion.
const CONTENT_KEY_INFO: &[u8] = b"spdg/layer/v1";

// ---------------------------------------------------------------------------
// Public half
// ---------------------------------------------------------------------------

/// The public key a layer was sealed under. Safe to store and display.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerKey([u8; PUBLIC_KEY_LEN]);

impl LayerKey {
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl fmt::Debug for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerKey(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

// ---------------------------------------------------------------------------
// Private half
// ---------------------------------------------------------------------------

/// The private half of a layer keypair: the sole means of reversing a seal.
///
/// - Not `Clone`. Returned exactly once, to the caller that sealed.
/// - Zeroised on drop (the inner `StaticSecret` wipes itself).
/// - Never stored anywhere in the object model.
pub struct Capability {
    secret: StaticSecret,
}

impl Capability {
    /// Generate a fresh keypair from the system CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut seed = Zeroizing::new([0u8; KEY_LEN]);
        crypto::fill_random(&mut *seed)?;
        Ok(Self {
            secret: StaticSecret::from(*seed),
        })
    }

    /// The public key this capability unlocks.
    pub fn public_key(&self) -> LayerKey {
        LayerKey(*PublicKey::from(&self.secret).as_bytes())
    }

    /// Whether this capability is the private half of `key`.
    pub fn unlocks(&self, key: &LayerKey) -> bool {
        self.public_key() == *key
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Content key
// ---------------------------------------------------------------------------

/// A symmetric key scoped to one envelope. Zeroised on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct ContentKey {
    bytes: [u8; KEY_LEN],
}

impl ContentKey {
    /// `pub(crate)`: raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

struct ContentKeyLen;

impl hkdf::KeyType for ContentKeyLen {
    fn len(&self) -> usize {
        KEY_LEN
    }
}

/// Derive the content key for one envelope.
///
/// Both sides reach the same key: the sealer agrees `(ephemeral, recipient)`,
/// the opener agrees `(capability, ephemeral)`. The salt binds both public
/// keys so a content key is never reused across envelopes.
pub(crate) fn derive_content_key(
    secret: &Capability,
    peer: &LayerKey,
    ephemeral: &LayerKey,
    recipient: &LayerKey,
) -> Result<ContentKey> {
    let shared = secret.secret.diffie_hellman(&peer.to_dalek());
    if !shared.was_contributory() {
        return Err(SpdgError::InvalidKey);
    }

    let mut salt_bytes = [0u8; 2 * PUBLIC_KEY_LEN];
    salt_bytes[..PUBLIC_KEY_LEN].copy_from_slice(ephemeral.as_bytes());
    salt_bytes[PUBLIC_KEY_LEN..].copy_from_slice(recipient.as_bytes());

    let salt = hkdf::Salt::new(hkdf::HKDF_SHA512, &salt_bytes);
    let prk = salt.extract(shared.as_bytes());

    let info = [CONTENT_KEY_INFO];
    let okm = prk
        .expand(&info, ContentKeyLen)
        .map_err(|_| SpdgError::KeyDerivationFailure)?;

    let mut key = ContentKey {
        bytes: [0u8; KEY_LEN],
    };
    okm.fill(&mut key.bytes)
        .map_err(|_| SpdgError::KeyDerivationFailure)?;

    Ok(key)
}
