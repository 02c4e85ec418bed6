//! Registry of peers and distributed aggregation of their public keys.
//!
//! Each peer contributes a share of the aggregate ElGamal key. To prevent the last peer
//! from choosing its share after seeing the others, shares are distributed
//! commit-then-reveal:
//!
//! 1. Each peer publishes a [`KeyCommitment`] (a hash commitment to its key share).
//! 2. Each peer publishes a [`KeyReveal`]: the key share, the commitment opening
//!    and a [`SchnorrProof`] of possession of the corresponding secret key.
//!
//! The [`PeerRegistry`] tracks the [`KeyState`] of every peer through these steps
//! and recomputes the aggregate key after every mutation.
//!
//! # Examples
//!
//! ```
//! # use golle::{group::Ristretto, KeyState, LocalPeer, PeerId, PeerRegistry};
//! # fn main() -> Result<(), golle::Error> {
//! let mut rng = rand::thread_rng();
//! let peers: Vec<_> = (1..=3)
//!     .map(|i| LocalPeer::<Ristretto>::new(PeerId(i), &mut rng))
//!     .collect();
//!
//! let mut registry = PeerRegistry::new();
//! for peer in &peers {
//!     registry.add(peer.id())?;
//!     registry.commit(peer.id(), peer.key_commitment())?;
//! }
//! assert_eq!(registry.key_state(), KeyState::Incomplete);
//! assert!(registry.aggregate_key().is_err());
//!
//! for peer in &peers {
//!     registry.verify(peer.id(), peer.key_reveal(&mut rng))?;
//! }
//! assert_eq!(registry.key_state(), KeyState::Ready);
//! let aggregate_key = registry.aggregate_key()?;
//! # Ok(())
//! # }
//! ```

use merlin::Transcript;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use core::fmt;
use std::collections::BTreeMap;

use crate::{
    commitment::{self, Commitment, Opening},
    config::RegistryConfig,
    error::{Error, Result},
    group::Group,
    proofs::{SchnorrProof, VerificationError},
    PublicKey,
};

/// Caller-assigned identifier of a peer, unique within a [`PeerRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// State of a peer's key share (or of the registry as a whole, see
/// [`PeerRegistry::key_state()`]).
///
/// The state only moves forward: `Undefined → Empty → Incomplete → Ready`, with `Empty`
/// being optional. The only way back is removing the peer from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum KeyState {
    /// No contribution has been received.
    Undefined,
    /// Peer is explicitly marked as not having contributed yet.
    Empty,
    /// Peer has committed to its key share, but has not revealed it.
    Incomplete,
    /// Key share is revealed and verified.
    Ready,
}

/// Reason why a key contribution was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ContributionError {
    /// Peer key share is already verified; no further contributions are accepted.
    #[error("key share is already finalized")]
    AlreadyReady,
    /// Peer has already committed to a key share.
    #[error("peer has already committed to a different key share")]
    CommitmentConflict,
    /// Contribution is not allowed in the current peer state.
    #[error("contribution is not allowed in state {0:?}")]
    UnexpectedState(KeyState),
    /// Key share is revealed without an earlier commitment.
    #[error("key share is revealed without a commitment")]
    MissingCommitment,
    /// Revealed key share does not match the commitment.
    #[error("revealed key share does not match the commitment")]
    OpeningMismatch,
    /// Proof of possession of the key share does not verify.
    #[error("invalid proof of possession: {0}")]
    InvalidProof(#[source] VerificationError),
}

/// Commitment of a peer to its key share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct KeyCommitment(Commitment);

impl KeyCommitment {
    pub(crate) fn new(commitment: Commitment) -> Self {
        Self(commitment)
    }

    /// Returns the underlying hash commitment.
    pub fn as_commitment(&self) -> &Commitment {
        &self.0
    }
}

/// Revealed key share of a peer together with the opening of its [`KeyCommitment`]
/// and a proof of possession of the secret key.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = ""))]
pub struct KeyReveal<G: Group> {
    public_key: PublicKey<G>,
    opening: Opening,
    proof: SchnorrProof<G>,
}

impl<G: Group> KeyReveal<G> {
    pub(crate) fn new(public_key: PublicKey<G>, opening: Opening, proof: SchnorrProof<G>) -> Self {
        Self {
            public_key,
            opening,
            proof,
        }
    }

    /// Returns the revealed key share.
    pub fn public_key(&self) -> &PublicKey<G> {
        &self.public_key
    }

    /// Returns the opening of the key commitment.
    pub fn opening(&self) -> &Opening {
        &self.opening
    }

    /// Returns the proof of possession of the secret key.
    pub fn proof(&self) -> &SchnorrProof<G> {
        &self.proof
    }
}

/// Value committed to in a [`KeyCommitment`]: the peer identifier and the key share.
pub(crate) fn key_commitment_value<G: Group>(peer: PeerId, public_key: &PublicKey<G>) -> Vec<u8> {
    let mut value = Vec::with_capacity(8 + G::ELEMENT_SIZE);
    value.extend_from_slice(&peer.0.to_le_bytes());
    value.extend_from_slice(public_key.as_bytes());
    value
}

/// Transcript for the proof of possession; binds the proof to the peer.
pub(crate) fn key_transcript(peer: PeerId) -> Transcript {
    let mut transcript = Transcript::new(b"golle_key_share");
    transcript.append_u64(b"peer", peer.0);
    transcript
}

/// Key contribution of a peer, submitted via [`PeerRegistry::set_key_contribution()`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = "", rename_all = "snake_case"))]
pub enum KeyContribution<G: Group> {
    /// Explicitly marks the peer as not having contributed.
    Empty,
    /// Partial contribution: commitment to the key share.
    Commitment(KeyCommitment),
    /// Final contribution: the key share.
    Reveal(KeyReveal<G>),
}

/// Peer entry in a [`PeerRegistry`].
#[derive(Debug, Clone)]
pub struct Peer<G: Group> {
    id: PeerId,
    state: KeyState,
    commitment: Option<KeyCommitment>,
    key: Option<PublicKey<G>>,
}

impl<G: Group> Peer<G> {
    fn new(id: PeerId) -> Self {
        Self {
            id,
            state: KeyState::Undefined,
            commitment: None,
            key: None,
        }
    }

    /// Returns the identifier of this peer.
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Returns the key state of this peer.
    pub fn state(&self) -> KeyState {
        self.state
    }

    /// Returns the key commitment of this peer, if any.
    pub fn commitment(&self) -> Option<&KeyCommitment> {
        self.commitment.as_ref()
    }

    /// Returns the verified key share of this peer. Always `Some(_)` iff the peer
    /// is [`Ready`](KeyState::Ready).
    pub fn key(&self) -> Option<&PublicKey<G>> {
        self.key.as_ref()
    }

    /// Checks the contribution against this peer without mutating it. Returns the new
    /// peer state.
    fn check_contribution(
        &self,
        contribution: &KeyContribution<G>,
        config: &RegistryConfig,
    ) -> Result<KeyState, ContributionError> {
        if self.state == KeyState::Ready {
            return Err(ContributionError::AlreadyReady);
        }

        match contribution {
            KeyContribution::Empty => match self.state {
                KeyState::Undefined | KeyState::Empty => Ok(KeyState::Empty),
                state => Err(ContributionError::UnexpectedState(state)),
            },

            KeyContribution::Commitment(commitment) => match &self.commitment {
                Some(existing) if existing == commitment => Ok(self.state),
                Some(_) => Err(ContributionError::CommitmentConflict),
                None => Ok(KeyState::Incomplete),
            },

            KeyContribution::Reveal(reveal) => {
                if let Some(commitment) = &self.commitment {
                    let value = key_commitment_value(self.id, &reveal.public_key);
                    if !commitment::verify(&commitment.0, &value, &reveal.opening) {
                        return Err(ContributionError::OpeningMismatch);
                    }
                } else if config.require_key_commitment {
                    return Err(ContributionError::MissingCommitment);
                }

                reveal
                    .proof
                    .verify(&reveal.public_key, &mut key_transcript(self.id))
                    .map_err(ContributionError::InvalidProof)?;
                Ok(KeyState::Ready)
            }
        }
    }
}

/// Ordered collection of peers keyed by [`PeerId`], together with the aggregate public key.
///
/// The aggregate key is available iff the registry is non-empty and every peer
/// is [`Ready`](KeyState::Ready). It is recomputed after each mutation, so it is never stale.
/// A [`SelectionRound`](crate::SelectionRound) borrows the registry for its entire lifetime,
/// thus the registry cannot be mutated while a round is in progress.
#[derive(Debug, Clone)]
pub struct PeerRegistry<G: Group> {
    config: RegistryConfig,
    peers: BTreeMap<PeerId, Peer<G>>,
    aggregate_key: Option<PublicKey<G>>,
}

impl<G: Group> Default for PeerRegistry<G> {
    fn default() -> Self {
        Self::with_config(RegistryConfig::default())
    }
}

impl<G: Group> PeerRegistry<G> {
    /// Creates an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry with the specified configuration.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            peers: BTreeMap::new(),
            aggregate_key: None,
        }
    }

    /// Returns the configuration of this registry.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the number of registered peers.
    pub fn size(&self) -> usize {
        self.peers.len()
    }

    /// Checks whether the registry has no peers.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Iterates over registered peers in the order of their identifiers.
    pub fn iter(&self) -> impl Iterator<Item = &Peer<G>> + '_ {
        self.peers.values()
    }

    /// Returns the peer with the specified identifier.
    pub fn get(&self, id: PeerId) -> Option<&Peer<G>> {
        self.peers.get(&id)
    }

    fn peer(&self, id: PeerId) -> Result<&Peer<G>> {
        self.peers.get(&id).ok_or(Error::NotFound(id))
    }

    /// Registers a new peer in the [`Undefined`](KeyState::Undefined) state. This invalidates
    /// the aggregate key until the new peer is ready.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateId`] if the peer is already registered.
    pub fn add(&mut self, id: PeerId) -> Result<&Peer<G>> {
        if self.peers.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        self.peers.insert(id, Peer::new(id));
        self.recompute_aggregate_key();
        debug!(peer = %id, size = self.peers.len(), "added peer");
        self.peer(id)
    }

    /// Removes a peer from the registry. The aggregate key is recomputed from
    /// the remaining peers, which keep their states.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the peer is not registered.
    pub fn remove(&mut self, id: PeerId) -> Result<Peer<G>> {
        let peer = self.peers.remove(&id).ok_or(Error::NotFound(id))?;
        self.recompute_aggregate_key();
        debug!(peer = %id, size = self.peers.len(), "removed peer");
        Ok(peer)
    }

    /// Applies a key contribution of a peer. The operation is all-or-nothing: if it fails,
    /// the registry is not changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the peer is not registered, and
    /// [`Error::InvalidContribution`] if the contribution is not valid in the current
    /// peer state or fails verification.
    pub fn set_key_contribution(
        &mut self,
        id: PeerId,
        contribution: KeyContribution<G>,
    ) -> Result<KeyState> {
        let peer = self.peer(id)?;
        let new_state = peer
            .check_contribution(&contribution, &self.config)
            .map_err(|reason| {
                warn!(peer = %id, %reason, "rejected key contribution");
                Error::InvalidContribution { peer: id, reason }
            })?;

        let peer = self.peers.get_mut(&id).ok_or(Error::NotFound(id))?;
        let old_state = peer.state;
        peer.state = new_state;
        match contribution {
            KeyContribution::Empty => {}
            KeyContribution::Commitment(commitment) => {
                peer.commitment = Some(commitment);
            }
            KeyContribution::Reveal(reveal) => {
                peer.key = Some(reveal.public_key);
            }
        }
        debug!(peer = %id, from = ?old_state, to = ?new_state, "accepted key contribution");

        if new_state == KeyState::Ready {
            self.recompute_aggregate_key();
        }
        Ok(new_state)
    }

    /// Submits a key commitment for the peer. Shortcut for
    /// [`Self::set_key_contribution()`] with [`KeyContribution::Commitment`].
    ///
    /// # Errors
    ///
    /// See [`Self::set_key_contribution()`].
    pub fn commit(&mut self, id: PeerId, commitment: KeyCommitment) -> Result<KeyState> {
        self.set_key_contribution(id, KeyContribution::Commitment(commitment))
    }

    /// Returns the key commitment of the peer, if it has committed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the peer is not registered.
    pub fn get_commitment(&self, id: PeerId) -> Result<Option<&KeyCommitment>> {
        self.peer(id).map(Peer::commitment)
    }

    /// Reveals the key share of the peer, verifying it against the earlier commitment.
    /// Shortcut for [`Self::set_key_contribution()`] with [`KeyContribution::Reveal`].
    ///
    /// # Errors
    ///
    /// See [`Self::set_key_contribution()`].
    pub fn verify(&mut self, id: PeerId, reveal: KeyReveal<G>) -> Result<KeyState> {
        self.set_key_contribution(id, KeyContribution::Reveal(reveal))
    }

    /// Returns the key state of the peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the peer is not registered.
    pub fn get_state(&self, id: PeerId) -> Result<KeyState> {
        self.peer(id).map(Peer::state)
    }

    /// Returns the verified key share of the peer, or `None` if it is not ready yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the peer is not registered.
    pub fn get_key(&self, id: PeerId) -> Result<Option<&PublicKey<G>>> {
        self.peer(id).map(Peer::key)
    }

    /// Checks whether `candidate` matches the stored key share of the peer.
    /// Returns `false` if the peer has no key share yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the peer is not registered.
    pub fn check_key(&self, id: PeerId, candidate: &PublicKey<G>) -> Result<bool> {
        let peer = self.peer(id)?;
        Ok(peer.key.as_ref().map_or(false, |key| key == candidate))
    }

    /// Returns the aggregate state of the registry: [`Empty`](KeyState::Empty) if there
    /// are no peers, [`Ready`](KeyState::Ready) if all peers are ready,
    /// [`Undefined`](KeyState::Undefined) if no peer has contributed,
    /// and [`Incomplete`](KeyState::Incomplete) otherwise.
    pub fn key_state(&self) -> KeyState {
        if self.peers.is_empty() {
            KeyState::Empty
        } else if self.aggregate_key.is_some() {
            KeyState::Ready
        } else if self
            .peers
            .values()
            .all(|peer| peer.state <= KeyState::Empty)
        {
            KeyState::Undefined
        } else {
            KeyState::Incomplete
        }
    }

    /// Returns the aggregate public key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotReady`] if the registry is empty or some peers are not ready.
    pub fn aggregate_key(&self) -> Result<&PublicKey<G>> {
        self.aggregate_key.as_ref().ok_or(Error::KeyNotReady)
    }

    fn recompute_aggregate_key(&mut self) {
        let all_ready = self
            .peers
            .values()
            .all(|peer| peer.state == KeyState::Ready);
        self.aggregate_key = if all_ready {
            let key = PublicKey::aggregate(self.peers.values().filter_map(Peer::key));
            if key.is_none() && !self.peers.is_empty() {
                warn!("key shares cancel out; aggregate key is undefined");
            }
            key
        } else {
            None
        };
    }
}
