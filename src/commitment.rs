//! Hash commitments binding a peer to a value before the value is revealed.
//!
//! A commitment to `value` is `(r_send, SHA-512(r_send || r_keep || value))`, where
//! `r_send` and `r_keep` are 32 random bytes each. `r_send` is published together with the hash;
//! `r_keep` is the [`Opening`] kept secret until the value is revealed. Hiding follows from
//! the secrecy of `r_keep`; binding follows from the collision resistance of SHA-512.
//!
//! The scheme is stateless. Protection against replaying a commitment in another context
//! (e.g., another selection round) is the caller's responsibility; the round protocol
//! binds the round identifier into the committed value.
//!
//! # Examples
//!
//! ```
//! # use golle::commitment;
//! let mut rng = rand::thread_rng();
//! let (commitment, opening) = commitment::create(b"my choice", &mut rng);
//! // `commitment` can be published right away; `opening` is revealed later.
//! assert!(commitment::verify(&commitment, b"my choice", &opening));
//! assert!(!commitment::verify(&commitment, b"other choice", &opening));
//! ```

use rand_core::{CryptoRng, RngCore};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use core::fmt;

#[cfg(feature = "serde")]
use crate::serde::BytesHelper;

/// Byte length of the random strings used in commitments.
pub const RANDOM_BYTES: usize = 32;
/// Byte length of the commitment hash.
pub const HASH_BYTES: usize = 64;

/// Public part of a hash commitment.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Commitment {
    #[cfg_attr(feature = "serde", serde(with = "BytesHelper::<RANDOM_BYTES>"))]
    random_send: [u8; RANDOM_BYTES],
    #[cfg_attr(feature = "serde", serde(with = "BytesHelper::<HASH_BYTES>"))]
    hash: [u8; HASH_BYTES],
}

impl fmt::Debug for Commitment {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Commitment")
            .field("hash", &HexPrefix(&self.hash))
            .finish_non_exhaustive()
    }
}

struct HexPrefix<'a>(&'a [u8]);

impl fmt::Debug for HexPrefix<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().take(8) {
            write!(formatter, "{byte:02x}")?;
        }
        formatter.write_str("..")
    }
}

impl Commitment {
    /// Creates a commitment from its parts.
    pub fn from_parts(random_send: [u8; RANDOM_BYTES], hash: [u8; HASH_BYTES]) -> Self {
        Self { random_send, hash }
    }

    /// Returns the public random string.
    pub fn random_send(&self) -> &[u8; RANDOM_BYTES] {
        &self.random_send
    }

    /// Returns the commitment hash.
    pub fn hash(&self) -> &[u8; HASH_BYTES] {
        &self.hash
    }
}

/// Secret random string opening a [`Commitment`]. It is zeroized on drop.
#[derive(Clone)]
pub struct Opening(pub(crate) Zeroizing<[u8; RANDOM_BYTES]>);

impl fmt::Debug for Opening {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Opening").finish_non_exhaustive()
    }
}

impl Opening {
    /// Wraps the provided bytes.
    pub fn from_bytes(bytes: [u8; RANDOM_BYTES]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Returns the secret bytes of this opening.
    pub fn as_bytes(&self) -> &[u8; RANDOM_BYTES] {
        &self.0
    }
}

fn digest(random_send: &[u8], random_keep: &[u8], value: &[u8]) -> [u8; HASH_BYTES] {
    let mut hasher = Sha512::new();
    hasher.update(random_send);
    hasher.update(random_keep);
    hasher.update(value);
    hasher.finalize().into()
}

/// Commits to `value`, returning the public commitment and the secret opening.
pub fn create<R: CryptoRng + RngCore>(value: &[u8], rng: &mut R) -> (Commitment, Opening) {
    let mut random_send = [0_u8; RANDOM_BYTES];
    rng.fill_bytes(&mut random_send);
    let mut random_keep = Zeroizing::new([0_u8; RANDOM_BYTES]);
    rng.fill_bytes(&mut *random_keep);

    let hash = digest(&random_send, &random_keep[..], value);
    let commitment = Commitment { random_send, hash };
    (commitment, Opening(random_keep))
}

/// Checks that `commitment` was created for `value` with the specified `opening`.
/// The hash comparison is constant-time.
pub fn verify(commitment: &Commitment, value: &[u8], opening: &Opening) -> bool {
    let hash = digest(&commitment.random_send, &opening.0[..], value);
    bool::from(hash[..].ct_eq(&commitment.hash[..]))
}
