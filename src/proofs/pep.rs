//! Plaintext equivalence proofs for ElGamal ciphertexts.
//!
//! Two ciphertexts `a`, `b` encrypted for key `K` have the same plaintext iff
//! `a - b = ([z]G, [z]K)` for some scalar `z` (equal to the difference of the encryption
//! randomness). Thus, plaintext equivalence reduces to the [`LogEqualityProof`] relation,
//! and "equivalent to one of several ciphertexts" reduces to a disjunction of such relations.

use merlin::Transcript;
use rand_core::{CryptoRng, RngCore};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::disjunction::{DisjunctionProof, DlogEquality};
use crate::{
    group::Group,
    proofs::{LogEqualityProof, TranscriptForGroup, VerificationError},
    Ciphertext, ExtendedCiphertext, PublicKey, SecretKey,
};

/// Proof that two ciphertexts encrypt the same plaintext, without revealing the plaintext.
///
/// # Construction
///
/// The proof is a [`LogEqualityProof`] for `log_G(Δ.R) = log_K(Δ.B)`, where `Δ = a - b`
/// and `K` is the receiver key. Both ciphertexts are absorbed into the transcript beforehand.
///
/// # Examples
///
/// ```
/// # use golle::{group::{Group, Ristretto}, proofs::PlaintextEquivalenceProof, Keypair};
/// # use merlin::Transcript;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut rng = rand::thread_rng();
/// let receiver = Keypair::<Ristretto>::generate(&mut rng);
/// let value = Ristretto::mul_generator(&5_u64.into());
/// let first = receiver.public().encrypt_extended(value, &mut rng);
/// let second = receiver.public().encrypt_extended(value, &mut rng);
///
/// let proof = PlaintextEquivalenceProof::new(
///     receiver.public(),
///     &first,
///     &second,
///     &mut Transcript::new(b"pep"),
///     &mut rng,
/// );
/// proof.verify(
///     receiver.public(),
///     &first.ciphertext(),
///     &second.ciphertext(),
///     &mut Transcript::new(b"pep"),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent, bound = ""))]
pub struct PlaintextEquivalenceProof<G: Group> {
    inner: LogEqualityProof<G>,
}

impl<G: Group> PlaintextEquivalenceProof<G> {
    fn append_ciphertexts(transcript: &mut Transcript, a: &Ciphertext<G>, b: &Ciphertext<G>) {
        transcript.start_proof(b"pep");
        transcript.append_message(b"a", &a.to_bytes());
        transcript.append_message(b"b", &b.to_bytes());
    }

    /// Creates a proof that `a` and `b` encrypt the same plaintext for `receiver`.
    /// The encryption randomness of both ciphertexts must be known to the prover.
    /// If the plaintexts differ, the proof will not verify.
    pub fn new<R: CryptoRng + RngCore>(
        receiver: &PublicKey<G>,
        a: &ExtendedCiphertext<G>,
        b: &ExtendedCiphertext<G>,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Self {
        let randomness_delta = a.random_scalar.clone() - b.random_scalar.clone();
        Self::from_delta(receiver, &a.inner, &b.inner, &randomness_delta, transcript, rng)
    }

    pub(crate) fn from_delta<R: CryptoRng + RngCore>(
        receiver: &PublicKey<G>,
        a: &Ciphertext<G>,
        b: &Ciphertext<G>,
        randomness_delta: &SecretKey<G>,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Self {
        Self::append_ciphertexts(transcript, a, b);
        let delta = *a - *b;
        let inner = LogEqualityProof::new(
            receiver.as_element(),
            randomness_delta,
            (delta.random_element, delta.blinded_element),
            transcript,
            rng,
        );
        Self { inner }
    }

    /// Verifies that `a` and `b` encrypt the same plaintext for `receiver`.
    ///
    /// # Errors
    ///
    /// Returns an error if this proof does not verify.
    pub fn verify(
        &self,
        receiver: &PublicKey<G>,
        a: &Ciphertext<G>,
        b: &Ciphertext<G>,
        transcript: &mut Transcript,
    ) -> Result<(), VerificationError> {
        Self::append_ciphertexts(transcript, a, b);
        let delta = *a - *b;
        self.inner.verify(
            receiver.as_element(),
            (delta.random_element, delta.blinded_element),
            transcript,
        )
    }

    /// Serializes this proof as 2 scalars.
    pub fn to_bytes(self) -> Vec<u8> {
        self.inner.to_bytes()
    }

    /// Parses a proof from `bytes`. Returns `None` if `bytes` are malformed.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        LogEqualityProof::from_bytes(bytes).map(|inner| Self { inner })
    }
}

/// Disjunctive plaintext equivalence proof: a ciphertext encrypts the same plaintext
/// as *one of* the reference ciphertexts, without revealing which one.
///
/// Reference ciphertexts may be [non-blinded](Ciphertext::non_blinded()) encryptions
/// of public values, in which case the proof shows that the ciphertext encrypts one of
/// these values (a "1-out-of-n" encryption proof). This is how a peer proves that its round
/// contribution lies in the admissible range, and how a selection result is proven
/// to be a re-encryption of one of the encrypted candidates.
///
/// # Construction
///
/// Branch `j` is the [`LogEqualityProof`] relation for `Δ_j = c - ref_j`; the branches
/// are OR-composed (Cramer–Damgård–Schoenmakers) with per-branch challenges summing up
/// to the Fiat–Shamir challenge. The proof consists of `2n` scalars.
///
/// # Examples
///
/// ```
/// # use golle::{
/// #     group::{Group, Ristretto}, proofs::DisjunctivePep, Ciphertext, Keypair,
/// # };
/// # use merlin::Transcript;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut rng = rand::thread_rng();
/// let receiver = Keypair::<Ristretto>::generate(&mut rng);
/// let admissible: Vec<_> = (0..4_u64)
///     .map(|i| Ciphertext::non_blinded(Ristretto::mul_generator(&i.into())))
///     .collect();
/// let value = Ristretto::mul_generator(&2_u64.into());
/// let encrypted = receiver.public().encrypt_extended(value, &mut rng);
///
/// let proof = DisjunctivePep::new(
///     receiver.public(),
///     &encrypted.ciphertext(),
///     &admissible,
///     2,
///     encrypted.randomness(),
///     &mut Transcript::new(b"range"),
///     &mut rng,
/// );
/// proof.verify(
///     receiver.public(),
///     &encrypted.ciphertext(),
///     &admissible,
///     &mut Transcript::new(b"range"),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent, bound = ""))]
pub struct DisjunctivePep<G: Group> {
    inner: DisjunctionProof<G>,
}

impl<G: Group> DisjunctivePep<G> {
    fn statements(
        receiver: &PublicKey<G>,
        ciphertext: &Ciphertext<G>,
        references: &[Ciphertext<G>],
    ) -> Vec<DlogEquality<G>> {
        let log_base = receiver.as_element();
        references
            .iter()
            .map(|reference| {
                let delta = *ciphertext - *reference;
                DlogEquality {
                    log_base,
                    powers: (delta.random_element, delta.blinded_element),
                }
            })
            .collect()
    }

    fn append_ciphertext(transcript: &mut Transcript, ciphertext: &Ciphertext<G>) {
        transcript.start_proof(b"disjunctive_pep");
        transcript.append_message(b"c", &ciphertext.to_bytes());
    }

    /// Creates a proof that `ciphertext` is plaintext-equivalent to `references[index]`.
    ///
    /// `randomness_delta` is the scalar `z` such that
    /// `ciphertext - references[index] = ([z]G, [z]K)`. For non-blinded references,
    /// this is the encryption randomness of `ciphertext`; for re-encryptions, it is the random
    /// scalar added during re-encryption.
    ///
    /// # Panics
    ///
    /// Panics if `references` is empty or `index` is out of bounds.
    pub fn new<R: CryptoRng + RngCore>(
        receiver: &PublicKey<G>,
        ciphertext: &Ciphertext<G>,
        references: &[Ciphertext<G>],
        index: usize,
        randomness_delta: &SecretKey<G>,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Self {
        Self::append_ciphertext(transcript, ciphertext);
        let statements = Self::statements(receiver, ciphertext, references);
        Self {
            inner: DisjunctionProof::new(&statements, index, randomness_delta, transcript, rng),
        }
    }

    /// Verifies that `ciphertext` is plaintext-equivalent to one of `references`.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of references does not match the proof, or if
    /// the proof is invalid.
    pub fn verify(
        &self,
        receiver: &PublicKey<G>,
        ciphertext: &Ciphertext<G>,
        references: &[Ciphertext<G>],
        transcript: &mut Transcript,
    ) -> Result<(), VerificationError> {
        Self::append_ciphertext(transcript, ciphertext);
        let statements = Self::statements(receiver, ciphertext, references);
        self.inner.verify(&statements, transcript)
    }

    /// Returns the number of branches (i.e., reference ciphertexts) in this proof.
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
