//! [`DisjunctiveSchnorrProof`].

use merlin::Transcript;
use rand_core::{CryptoRng, RngCore};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::disjunction::{DisjunctionProof, Dlog};
use crate::{
    group::Group,
    proofs::{TranscriptForGroup, VerificationError},
    PublicKey, SecretKey,
};

/// Zero-knowledge proof of knowledge of the discrete log of *one of* several public keys,
/// without revealing which one.
///
/// The proof is an OR-composition of [`SchnorrProof`](crate::proofs::SchnorrProof)s:
/// the branch for the known key is run honestly, the other branches are simulated,
/// and the per-branch challenges must add up to the Fiat–Shamir challenge
/// of the whole transcript. Verification treats every branch the same way,
/// so the proof does not reveal the real index.
///
/// The proof consists of `2n` scalars, where `n` is the number of public keys.
///
/// # Examples
///
/// ```
/// # use golle::{group::Ristretto, proofs::DisjunctiveSchnorrProof, Keypair};
/// # use merlin::Transcript;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut rng = rand::thread_rng();
/// let keypairs: Vec<_> = (0..4).map(|_| Keypair::<Ristretto>::generate(&mut rng)).collect();
/// let public_keys: Vec<_> = keypairs.iter().map(|pair| pair.public().clone()).collect();
///
/// // Prove knowledge of the secret key #2 without revealing the index.
/// let proof = DisjunctiveSchnorrProof::new(
///     &public_keys,
///     2,
///     keypairs[2].secret(),
///     &mut Transcript::new(b"ring"),
///     &mut rng,
/// );
/// proof.verify(&public_keys, &mut Transcript::new(b"ring"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent, bound = ""))]
pub struct DisjunctiveSchnorrProof<G: Group> {
    inner: DisjunctionProof<G>,
}

impl<G: Group> DisjunctiveSchnorrProof<G> {
    fn statements(public_keys: &[PublicKey<G>]) -> Vec<Dlog<G>> {
        public_keys
            .iter()
            .map(|key| Dlog {
                base: G::generator(),
                power: key.as_element(),
            })
            .collect()
    }

    /// Creates a proof that the prover knows `secret`, the discrete log
    /// of `public_keys[index]`.
    ///
    /// # Panics
    ///
    /// Panics if `public_keys` is empty or `index` is out of bounds.
    pub fn new<R: CryptoRng + RngCore>(
        public_keys: &[PublicKey<G>],
        index: usize,
        secret: &SecretKey<G>,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Self {
        transcript.start_proof(b"disjunctive_schnorr");
        let statements = Self::statements(public_keys);
        Self {
            inner: DisjunctionProof::new(&statements, index, secret, transcript, rng),
        }
    }

    /// Verifies this proof against `public_keys`, which must be in the same order
    /// as during proving.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of keys does not match the proof, or if any branch
    /// of the proof is invalid.
    pub fn verify(
        &self,
        public_keys: &[PublicKey<G>],
        transcript: &mut Transcript,
    ) -> Result<(), VerificationError> {
        transcript.start_proof(b"disjunctive_schnorr");
        self.inner.verify(&Self::statements(public_keys), transcript)
    }

    /// Returns the number of branches in this proof.
    pub fn len(&self) -> usize {
        self.inner.branch_count()
    }

    /// Checks whether this proof has no branches. Always `false` for well-formed proofs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes this proof: all challenges followed by all responses.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.inner.to_bytes()
    }

    /// Parses a proof from `bytes`. Returns `None` if `bytes` are malformed.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        DisjunctionProof::from_bytes(bytes).map(|inner| Self { inner })
    }
}
