//! Ephemeral key-agreement identity.
//!
//! A fresh X25519 key pair is generated for every session and never
//! persisted. The public half is the only unencrypted data a session ever
//! puts on the wire.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};

use crate::error::{Error, Result};

/// Size of an X25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// An ephemeral X25519 key pair.
pub struct Identity {
    secret: StaticSecret,
    public: PublicKey,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public", &self.public.as_bytes())
            .finish_non_exhaustive()
    }
}

impl Identity {
    /// Generate a new random identity.
    #[must_use]
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// The public key to send to the peer.
    #[must_use]
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public.to_bytes()
    }

    /// Run the Diffie-Hellman exchange against the peer's raw public key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyAgreement`] if the key has the wrong length or is
    /// a low-order point (the shared secret would be all zeros).
    pub fn agree(&self, remote_public_key: &[u8]) -> Result<SharedSecret> {
        let bytes: [u8; PUBLIC_KEY_SIZE] = remote_public_key.try_into().map_err(|_| {
            Error::KeyAgreement(format!(
                "expected a {PUBLIC_KEY_SIZE}-byte public key, got {} bytes",
                remote_public_key.len()
            ))
        })?;

        let shared = self.secret.diffie_hellman(&PublicKey::from(bytes));
        if !shared.was_contributory() {
            return Err(Error::KeyAgreement(
                "peer public key is a low-order point".to_string(),
            ));
        }

        Ok(shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique() {
        let a = Identity::generate();
        let b = Identity::generate();

        assert_ne!(a.public_key(), b.public_key());
        assert_ne!(a.public_key(), [0u8; PUBLIC_KEY_SIZE]);
    }

    #[test]
    fn test_agree_symmetric() {
        let alice = Identity::generate();
        let bob = Identity::generate();

        let ab = alice.agree(&bob.public_key()).expect("alice agree");
        let ba = bob.agree(&alice.public_key()).expect("bob agree");

        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn test_agree_rejects_wrong_length() {
        let identity = Identity::generate();

        assert!(matches!(
            identity.agree(&[7u8; 31]),
            Err(Error::KeyAgreement(_))
        ));
        assert!(matches!(
            identity.agree(&[7u8; 33]),
            Err(Error::KeyAgreement(_))
        ));
    }

    #[test]
    fn test_agree_rejects_low_order_point() {
        let identity = Identity::generate();
        assert!(matches!(
            identity.agree(&[0u8; PUBLIC_KEY_SIZE]),
            Err(Error::KeyAgreement(_))
        ));
    }
}
