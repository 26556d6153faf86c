//! Low-level cryptographic operations.
//!
//! This module is one of exactly two places in the crate that import `ring`
//! directly (the other is `keys`). Layers seal and open their envelopes
//! exclusively through the functions exposed here.
//!
//! Primitive choices:
//! - **Key agreement**: X25519 between a per-envelope ephemeral secret and the
//!   layer's public key (see `keys`)
//! - **Cipher**: AES-256-GCM (authenticated encryption)
//! - **Nonce**: 96-bit (12 bytes), generated fresh per operation via `SystemRandom`
//! - **Key size**: 256 bits (32 bytes)

use ring::aead::{self, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, SpdgError};
use crate::keys::{self, Capability, ContentKey, LayerKey, PUBLIC_KEY_LEN};

/// The AEAD algorithm used for every envelope.
const ALGORITHM: &aead::Algorithm = &AES_256_GCM;

/// Size of the nonce in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Size of a content key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Bytes preceding the AEAD body: ephemeral public key, then nonce.
pub const HEADER_LEN: usize = PUBLIC_KEY_LEN + NONCE_LEN;

/// Fill `buf` from the system CSPRNG.
///
/// `ring::rand::SystemRandom` is the only source of randomness in the crate.
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<()> {
    SystemRandom::new()
        .fill(buf)
        .map_err(|_| SpdgError::RandomnessFailure)
}

fn generate_nonce() -> Result<Nonce> {
    let mut buf = [0u8; NONCE_LEN];
    fill_random(&mut buf)?;
    Ok(Nonce::assume_unique_for_key(buf))
}

/// Encrypt `plaintext` with AES-256-GCM, binding `aad`.
///
/// # Layout of returned bytes
/// ```text
/// [ nonce (12 bytes) ][ ciphertext + GCM tag ]
/// ```
pub fn encrypt(key_bytes: &[u8; KEY_LEN], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let unbound = UnboundKey::new(ALGORITHM, key_bytes).map_err(|_| SpdgError::InvalidKey)?;
    let key = LessSafeKey::new(unbound);

    let nonce = generate_nonce()?;

    let mut output = Vec::with_capacity(NONCE_LEN + plaintext.len() + ALGORITHM.tag_len());
    output.extend_from_slice(nonce.as_ref());
    output.extend_from_slice(plaintext);

    // Encrypts `output[NONCE_LEN..]` in place; the GCM tag is appended after.
    let tag = key
        .seal_in_place_separate_tag(nonce, aead::Aad::from(aad), &mut output[NONCE_LEN..])
        .map_err(|_| SpdgError::EncryptionFailure)?;
    output.extend_from_slice(tag.as_ref());

    Ok(output)
}

/// Decrypt bytes produced by `encrypt`.
///
/// A wrong key, a different `aad` or any tampering fails the GCM tag check;
/// the caller receives no partial plaintext.
pub fn decrypt(key_bytes: &[u8; KEY_LEN], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < NONCE_LEN + ALGORITHM.tag_len() {
        return Err(SpdgError::MalformedCiphertext);
    }

    let nonce_bytes: [u8; NONCE_LEN] = ciphertext[..NONCE_LEN]
        .try_into()
        .map_err(|_| SpdgError::MalformedCiphertext)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let unbound = UnboundKey::new(ALGORITHM, key_bytes).map_err(|_| SpdgError::InvalidKey)?;
    let key = LessSafeKey::new(unbound);

    let mut payload = ciphertext[NONCE_LEN..].to_vec();
    let plaintext = key
        .open_in_place(nonce, aead::Aad::from(aad), &mut payload)
        .map_err(|_| SpdgError::DecryptionFailure)?;

    Ok(plaintext.to_vec())
}

/// Seal `plaintext` so that only the holder of `recipient`'s capability can
/// open it.
///
/// # Layout of returned bytes
/// ```text
/// [ ephemeral public (32 bytes) ][ nonce (12 bytes) ][ ciphertext + GCM tag ]
/// ```
pub(crate) fn seal_envelope(recipient: &LayerKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let ephemeral = Capability::generate()?;
    let ephemeral_public = ephemeral.public_key();

    let content_key: ContentKey =
        keys::derive_content_key(&ephemeral, recipient, &ephemeral_public, recipient)?;
    drop(ephemeral);

    let body = encrypt(content_key.as_bytes(), recipient.as_bytes(), plaintext)?;

    let mut output = Vec::with_capacity(PUBLIC_KEY_LEN + body.len());
    output.extend_from_slice(ephemeral_public.as_bytes());
    output.extend_from_slice(&body);
    Ok(output)
}

/// Open an envelope produced by `seal_envelope` with the recipient's
/// capability.
pub(crate) fn open_envelope(capability: &Capability, envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < HEADER_LEN {
        return Err(SpdgError::MalformedCiphertext);
    }

    let ephemeral_bytes: [u8; PUBLIC_KEY_LEN] = envelope[..PUBLIC_KEY_LEN]
        .try_into()
        .map_err(|_| SpdgError::MalformedCiphertext)?;
    let ephemeral_public = LayerKey::from_bytes(ephemeral_bytes);
    let recipient = capability.public_key();

    let content_key =
        keys::derive_content_key(capability, &ephemeral_public, &ephemeral_public, &recipient)?;
    decrypt(
        content_key.as_bytes(),
        recipient.as_bytes(),
        &envelope[PUBLIC_KEY_LEN..],
    )
}
