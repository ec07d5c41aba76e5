//! Session cryptography for LANDrop.
//!
//! This module provides:
//! - Ephemeral X25519 key agreement (see [`Identity`])
//! - HKDF-SHA256 derivation of the symmetric session key
//! - ChaCha20-Poly1305 (IETF) authenticated encryption of every frame
//! - A 6-digit session fingerprint for out-of-band comparison
//!
//! ## Security Model
//!
//! - Keys are ephemeral: a new pair per session, never stored
//! - Every frame carries its own random 96-bit nonce
//! - Authentication failure rejects the whole frame
//! - The fingerprint is compared by humans on both screens; the protocol
//!   itself does not authenticate device identity

mod identity;

pub use identity::{Identity, PUBLIC_KEY_SIZE};

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use crate::error::{Error, Result};

/// Size of the AEAD nonce prepended to every ciphertext.
pub const NONCE_SIZE: usize = 12;

/// Size of the Poly1305 authentication tag.
pub const TAG_SIZE: usize = 16;

/// Size of the symmetric session key.
pub const SESSION_KEY_SIZE: usize = 32;

/// Bytes added to a plaintext by [`SessionCrypto::encrypt`].
pub const ENCRYPTION_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

const KDF_SALT: &[u8] = b"landrop/v1";
const KDF_INFO: &[u8] = b"landrop session key";

/// Symmetric key shared by both ends of a session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

impl SessionKey {
    /// Derive the session key from a raw key-agreement output.
    #[must_use]
    pub fn derive(shared_secret: &[u8]) -> Self {
        Self(hkdf_sha256(KDF_SALT, shared_secret, KDF_INFO))
    }

    /// The 6-digit code shown to the user on both devices.
    ///
    /// SHA-256 of the key, low 8 bytes read little-endian, reduced modulo
    /// one million and zero-padded.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = sha256(&self.0);
        let mut low = [0u8; 8];
        low.copy_from_slice(&digest[..8]);
        format!("{:06}", u64::from_le_bytes(low) % 1_000_000)
    }
}

/// Per-session crypto state, owned by exactly one transfer session.
pub struct SessionCrypto {
    identity: Identity,
    session_key: Option<SessionKey>,
    cipher: Option<ChaCha20Poly1305>,
}

impl std::fmt::Debug for SessionCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCrypto")
            .field("identity", &self.identity)
            .field("established", &self.session_key.is_some())
            .finish()
    }
}

impl Default for SessionCrypto {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCrypto {
    /// Create crypto state with a freshly generated identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: Identity::generate(),
            session_key: None,
            cipher: None,
        }
    }

    /// The local public key, sent unencrypted as the first handshake step.
    #[must_use]
    pub fn local_public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.identity.public_key()
    }

    /// Whether the session key has been derived.
    #[must_use]
    pub fn is_established(&self) -> bool {
        self.session_key.is_some()
    }

    /// The derived session key, if the handshake got that far.
    #[must_use]
    pub fn session_key(&self) -> Option<&SessionKey> {
        self.session_key.as_ref()
    }

    /// Agree on the session key with the peer's public key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyAgreement`] if the key is malformed, or
    /// [`Error::InvalidOperation`] if a key was already derived.
    pub fn compute_session_key(&mut self, remote_public_key: &[u8]) -> Result<()> {
        if self.session_key.is_some() {
            return Err(Error::InvalidOperation(
                "session key already established".to_string(),
            ));
        }

        let shared = self.identity.agree(remote_public_key)?;
        let key = SessionKey::derive(shared.as_bytes());
        self.cipher = Some(ChaCha20Poly1305::new(Key::from_slice(&key.0)));
        self.session_key = Some(key);
        Ok(())
    }

    /// The session fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] before the key is established.
    pub fn session_fingerprint(&self) -> Result<String> {
        self.session_key
            .as_ref()
            .map(SessionKey::fingerprint)
            .ok_or_else(|| Error::InvalidOperation("no session key yet".to_string()))
    }

    /// Encrypt a message, returning `nonce || ciphertext || tag`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] before the key is established.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = self.cipher()?;
        let nonce = random_bytes::<NONCE_SIZE>();

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| Error::InvalidOperation("encryption failed".to_string()))?;

        let mut frame = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        frame.extend_from_slice(&nonce);
        frame.extend_from_slice(&ciphertext);
        Ok(frame)
    }

    /// Decrypt a `nonce || ciphertext || tag` frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decryption`] if the frame is shorter than a nonce or
    /// fails authentication.
    pub fn decrypt(&self, frame: &[u8]) -> Result<Vec<u8>> {
        let cipher = self.cipher()?;
        if frame.len() < NONCE_SIZE {
            return Err(Error::Decryption("cipher text too short".to_string()));
        }

        let (nonce, ciphertext) = frame.split_at(NONCE_SIZE);
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::Decryption("authentication failed".to_string()))
    }

    fn cipher(&self) -> Result<&ChaCha20Poly1305> {
        self.cipher
            .as_ref()
            .ok_or_else(|| Error::InvalidOperation("no session key yet".to_string()))
    }
}

/// Compute HMAC-SHA256.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Single-block HKDF-SHA256 (RFC 5869) producing 32 bytes.
pub fn hkdf_sha256(salt: &[u8], ikm: &[u8], info: &[u8]) -> [u8; 32] {
    let prk = hmac_sha256(salt, ikm);

    let mut block = Vec::with_capacity(info.len() + 1);
    block.extend_from_slice(info);
    block.push(0x01);
    hmac_sha256(&prk, &block)
}

/// Compute SHA-256 hash of data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Generate cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    use rand::RngCore;

    let mut bytes = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn established_pair() -> (SessionCrypto, SessionCrypto) {
        let mut a = SessionCrypto::new();
        let mut b = SessionCrypto::new();
        let a_pub = a.local_public_key();
        let b_pub = b.local_public_key();
        a.compute_session_key(&b_pub).expect("a derives");
        b.compute_session_key(&a_pub).expect("b derives");
        (a, b)
    }

    #[test]
    fn test_both_sides_derive_same_key() {
        for _ in 0..8 {
            let (a, b) = established_pair();
            assert_eq!(a.session_key(), b.session_key());
            assert!(a.is_established());
        }
    }

    #[test]
    fn test_fingerprint_is_stable_and_six_digits() {
        let (a, b) = established_pair();

        let code = a.session_fingerprint().expect("fingerprint");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(code, a.session_fingerprint().expect("again"));
        assert_eq!(code, b.session_fingerprint().expect("peer"));
    }

    #[test]
    fn test_fingerprint_known_key() {
        let key = SessionKey([0u8; SESSION_KEY_SIZE]);
        let digest = sha256(&[0u8; SESSION_KEY_SIZE]);
        let mut low = [0u8; 8];
        low.copy_from_slice(&digest[..8]);
        let expected = format!("{:06}", u64::from_le_bytes(low) % 1_000_000);

        assert_eq!(key.fingerprint(), expected);
    }

    #[test]
    fn test_fingerprint_before_handshake() {
        let crypto = SessionCrypto::new();
        assert!(matches!(
            crypto.session_fingerprint(),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_session_key_only_once() {
        let (mut a, b) = established_pair();
        assert!(matches!(
            a.compute_session_key(&b.local_public_key()),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_encrypt_decrypt_lengths() {
        let (a, b) = established_pair();

        for len in [0usize, 1, 15, 16, 17, 1000, 64_000] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let frame = a.encrypt(&plaintext).expect("encrypt");
            assert_eq!(frame.len(), len + ENCRYPTION_OVERHEAD);
            assert_eq!(b.decrypt(&frame).expect("decrypt"), plaintext);
        }
    }

    #[test]
    fn test_nonces_differ() {
        let (a, _) = established_pair();
        let one = a.encrypt(b"same").expect("encrypt");
        let two = a.encrypt(b"same").expect("encrypt");
        assert_ne!(one[..NONCE_SIZE], two[..NONCE_SIZE]);
    }

    #[test]
    fn test_any_bit_flip_fails() {
        let (a, b) = established_pair();
        let frame = a.encrypt(b"tamper-evident payload").expect("encrypt");

        for byte in 0..frame.len() {
            for bit in 0..8 {
                let mut corrupted = frame.clone();
                corrupted[byte] ^= 1 << bit;
                assert!(
                    matches!(b.decrypt(&corrupted), Err(Error::Decryption(_))),
                    "flip at byte {byte} bit {bit} was accepted"
                );
            }
        }
    }

    #[test]
    fn test_short_frame_rejected() {
        let (_, b) = established_pair();
        assert!(matches!(
            b.decrypt(&[0u8; NONCE_SIZE - 1]),
            Err(Error::Decryption(_))
        ));
        assert!(matches!(
            b.decrypt(&[0u8; NONCE_SIZE]),
            Err(Error::Decryption(_))
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let (a, _) = established_pair();
        let (_, other) = established_pair();
        let frame = a.encrypt(b"secret").expect("encrypt");
        assert!(other.decrypt(&frame).is_err());
    }

    #[test]
    fn test_hkdf_rfc5869_case_1() {
        let ikm = [0x0bu8; 22];
        let salt: Vec<u8> = (0x00..=0x0c).collect();
        let info: Vec<u8> = (0xf0..=0xf9).collect();

        let okm = hkdf_sha256(&salt, &ikm, &info);
        let expected = [
            0x3c, 0xb2, 0x5f, 0x25, 0xfa, 0xac, 0xd5, 0x7a, 0x90, 0x43, 0x4f, 0x64, 0xd0, 0x36,
            0x2f, 0x2a, 0x2d, 0x2d, 0x0a, 0x90, 0xcf, 0x1a, 0x5a, 0x4c, 0x5d, 0xb0, 0x2d, 0x56,
            0xec, 0xc4, 0xc5, 0xbf,
        ];
        assert_eq!(okm, expected);
    }

    #[test]
    fn test_random_bytes() {
        let bytes1: [u8; 16] = random_bytes();
        let bytes2: [u8; 16] = random_bytes();
        assert_ne!(bytes1, bytes2, "Random bytes should be different");
    }
}
