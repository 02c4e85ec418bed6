//! Errors produced by the peer registry and selection rounds.

use crate::{
    proofs::VerificationError,
    registry::{ContributionError, PeerId},
    round::Phase,
};

/// Errors that can occur in the peer registry or during a selection round.
///
/// Registry errors and round errors caused by a misplaced call (e.g., [`Self::NotFound`],
/// [`Self::OutOfPhase`], [`Self::StaleCommitment`]) leave the state untouched.
/// Cryptographic failures during a round ([`Self::CommitmentMismatch`], [`Self::ProofInvalid`],
/// [`Self::IncompleteDecryption`]) abort the round; they are never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Peer with the specified identifier is already registered.
    #[error("peer {0} is already registered")]
    DuplicateId(PeerId),
    /// Peer with the specified identifier is not registered (or does not participate
    /// in the round).
    #[error("peer {0} is not found")]
    NotFound(PeerId),
    /// Key contribution was rejected.
    #[error("invalid key contribution from peer {peer}: {reason}")]
    InvalidContribution {
        /// Peer that submitted the contribution.
        peer: PeerId,
        /// Reason for rejection.
        reason: ContributionError,
    },
    /// Aggregate public key is not available because not every registered peer is ready
    /// (or there are no peers).
    #[error("aggregate public key is not ready")]
    KeyNotReady,
    /// Decryption cannot proceed because partial decryptions from some peers are missing.
    #[error("partial decryptions are missing for peers {missing:?}")]
    IncompleteDecryption {
        /// Peers that have not supplied a partial decryption.
        missing: Vec<PeerId>,
    },
    /// Round commitment was created for another round.
    #[error("commitment from peer {peer} belongs to another round")]
    StaleCommitment {
        /// Peer that submitted the commitment.
        peer: PeerId,
    },
    /// Revealed contribution does not match the earlier commitment.
    #[error("revealed contribution from peer {peer} does not match its commitment")]
    CommitmentMismatch {
        /// Offending peer.
        peer: PeerId,
    },
    /// Zero-knowledge proof supplied by a peer does not verify.
    #[error("invalid proof from peer {peer}: {source}")]
    ProofInvalid {
        /// Offending peer.
        peer: PeerId,
        /// Proof verification error.
        #[source]
        source: VerificationError,
    },
    /// Value is outside its admissible range: a malformed group element or scalar,
    /// a contribution index not below the number of candidates, or a selected index
    /// produced by a faulty combination policy.
    #[error("{0} is out of range")]
    OutOfRange(&'static str),
    /// Operation is not allowed in the current phase of the round.
    #[error("`{operation}` is not allowed in phase {actual:?}")]
    OutOfPhase {
        /// Name of the rejected operation.
        operation: &'static str,
        /// Phase the round is in.
        actual: Phase,
    },
    /// Peer has already submitted a message of this kind in the current phase.
    #[error("peer {peer} has already submitted this message")]
    DuplicateSubmission {
        /// Offending peer.
        peer: PeerId,
    },
    /// Candidate set is empty or contains duplicate elements.
    #[error("invalid candidate set: {0}")]
    InvalidCandidates(&'static str),
}

impl Error {
    /// Returns the peer blamed by this error, if any.
    pub fn peer(&self) -> Option<PeerId> {
        match self {
            Self::DuplicateId(peer)
            | Self::NotFound(peer)
            | Self::InvalidContribution { peer, .. }
            | Self::StaleCommitment { peer }
            | Self::CommitmentMismatch { peer }
            | Self::ProofInvalid { peer, .. }
            | Self::DuplicateSubmission { peer } => Some(*peer),
            _ => None,
        }
    }
}

/// Result type with [`Error`] as the default error.
pub type Result<T, E = Error> = core::result::Result<T, E>;
