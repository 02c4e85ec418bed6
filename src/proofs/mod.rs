//! Zero-knowledge proofs.
//!
//! All proofs are non-interactive via the Fiat–Shamir transform: challenges are squeezed
//! from a [`Transcript`] which the caller may pre-seed with context (e.g., a round identifier
//! and the prover's peer identifier). The same context must be supplied on verification.
//! Verification is a pure function of its inputs, so it may be re-run any number of times.

use merlin::Transcript;

use crate::group::{element_to_bytes, Group, RandomBytesProvider};

mod disjunction;
mod disjunctive_schnorr;
mod log_equality;
mod pep;
mod schnorr;

pub use self::{
    disjunctive_schnorr::DisjunctiveSchnorrProof,
    log_equality::LogEqualityProof,
    pep::{DisjunctivePep, PlaintextEquivalenceProof},
    schnorr::SchnorrProof,
};

/// Extension trait for Merlin transcripts used in constructing our proofs.
pub(crate) trait TranscriptForGroup {
    fn start_proof(&mut self, proof_label: &'static [u8]);

    fn append_element_bytes(&mut self, label: &'static [u8], element_bytes: &[u8]);

    fn append_element<G: Group>(&mut self, label: &'static [u8], element: &G::Element);

    fn challenge_scalar<G: Group>(&mut self, label: &'static [u8]) -> G::Scalar;
}

impl TranscriptForGroup for Transcript {
    fn start_proof(&mut self, proof_label: &'static [u8]) {
        self.append_message(b"dom-sep", proof_label);
    }

    fn append_element_bytes(&mut self, label: &'static [u8], element_bytes: &[u8]) {
        self.append_message(label, element_bytes);
    }

    fn append_element<G: Group>(&mut self, label: &'static [u8], element: &G::Element) {
        self.append_element_bytes(label, &element_to_bytes::<G>(element));
    }

    fn challenge_scalar<G: Group>(&mut self, label: &'static [u8]) -> G::Scalar {
        G::scalar_from_random_bytes(RandomBytesProvider::new(self, label))
    }
}

/// Error verifying base proofs, such as [`SchnorrProof`], [`LogEqualityProof`]
/// or [`DisjunctivePep`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum VerificationError {
    /// Restored challenge scalar does not match the one provided in the proof.
    ///
    /// This error most likely means that the proof itself is malformed, or that it was created
    /// for a different context than it is being verified for.
    #[error("restored challenge scalar does not match the one provided in the proof")]
    ChallengeMismatch,
    /// A collection (e.g., number of responses in a [`DisjunctivePep`]) has a different size
    /// than expected.
    ///
    /// This error most likely means that the proof is malformed.
    #[error("number of {collection} ({actual}) differs from expected ({expected})")]
    LenMismatch {
        /// Human-readable collection name, such as "public keys".
        collection: &'static str,
        /// Expected size of the collection.
        expected: usize,
        /// Actual size of the collection.
        actual: usize,
    },
}

impl VerificationError {
    pub(crate) fn check_lengths(
        collection: &'static str,
        expected: usize,
        actual: usize,
    ) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::LenMismatch {
                collection,
                expected,
                actual,
            })
        }
    }
}
