//! Selection rounds: jointly choosing one candidate uniformly at random.
//!
//! # Protocol
//!
//! Let `n` be the number of candidates, `N` the number of peers and `K` the aggregate key
//! of the [`PeerRegistry`].
//!
//! 1. **Commit.** Each peer draws a random contribution `r_i ∈ [0, n)`, encrypts it as
//!    `C_i = Enc_K([r_i]G)` and publishes a hash commitment to `C_i` ([`RoundCommitment`]).
//!    The round waits until every peer has committed.
//! 2. **Reveal.** Each peer reveals `C_i` together with the commitment opening and
//!    a [`DisjunctivePep`] showing that `C_i` encrypts one of `[0]G, …, [n - 1]G`
//!    ([`ContributionReveal`]). Once all reveals are accepted, the encrypted sum
//!    `S = Σ C_i` is fixed.
//! 3. **Decrypt.** Each peer supplies a [`PartialDecryption`] of `S`. After all partial
//!    decryptions are verified, `s = Σ r_i` is recovered and mapped to the index of
//!    the selected candidate with a [`CombinationPolicy`] (by default, [`ModularSum`]).
//!
//! Since no peer sees other contributions before committing to its own, and encrypted
//! contributions cannot be decrypted without every peer, a single honest peer suffices
//! for `s mod n` to be uniformly distributed.
//!
//! The selected candidate is accompanied by the verified partial decryptions of `S`
//! and a [`SelectionProof`]: a re-encryption of the selected encrypted candidate,
//! a [`DisjunctivePep`] that it re-encrypts one of the encrypted candidates, and
//! a [`PlaintextEquivalenceProof`] that it encrypts the announced candidate. With the published
//! contributions, any peer can recompute `s` and the selected index with [`Selection::verify()`].

use merlin::Transcript;
use rand_core::{CryptoRng, RngCore};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use core::fmt;
use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

#[cfg(feature = "serde")]
use crate::serde::{BytesHelper, ElementHelper};
use crate::{
    commitment::{self, Commitment, Opening},
    config::RoundConfig,
    encryption::ExtendedCiphertext,
    error::{Error, Result},
    group::{element_to_bytes, Group},
    proofs::{DisjunctivePep, PlaintextEquivalenceProof, VerificationError},
    registry::{PeerId, PeerRegistry},
    threshold::{DecryptionCollector, PartialDecryption},
    Ciphertext, DiscreteLogTable, PublicKey, SecretKey,
};

/// Byte length of a [`RoundId`].
pub const ROUND_ID_BYTES: usize = 32;

/// Maximum admissible value of `N * (n - 1)`, the largest possible sum of contributions
/// for `N` peers and `n` candidates. The decrypted sum is looked up in a table of this size.
pub const MAX_CONTRIBUTION_SUM: u64 = 1 << 20;

/// Random identifier of a selection round. Binds commitments and proofs to the round,
/// so that they cannot be replayed in another round.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RoundId(
    #[cfg_attr(feature = "serde", serde(with = "BytesHelper::<ROUND_ID_BYTES>"))]
    [u8; ROUND_ID_BYTES],
);

impl fmt::Debug for RoundId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "RoundId({self})")
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first 8 bytes are enough to tell rounds apart in logs.
        for byte in &self.0[..8] {
            write!(formatter, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl RoundId {
    /// Generates a random round identifier.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0_u8; ROUND_ID_BYTES];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wraps the provided bytes.
    pub fn from_bytes(bytes: [u8; ROUND_ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Returns the bytes of this identifier.
    pub fn as_bytes(&self) -> &[u8; ROUND_ID_BYTES] {
        &self.0
    }
}

/// Phase of a [`SelectionRound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    /// Round is created, but [`SelectionRound::begin()`] was not called yet.
    NotStarted,
    /// Peers submit commitments to their contributions.
    Committing,
    /// All peers have committed; candidates are encrypted. Peers reveal their contributions.
    Encrypted,
    /// Some, but not all contributions are revealed and verified.
    Proving,
    /// All contributions are verified. Peers supply partial decryptions.
    Decrypting,
    /// Selection is made. The round is immutable.
    Complete,
    /// Round was aborted; see [`SelectionRound::abort_reason()`].
    Aborted,
}

impl Phase {
    /// Checks whether this phase is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Aborted)
    }
}

/// Reason why a [`SelectionRound`] was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Round was aborted by calling [`SelectionRound::abort()`].
    Requested,
    /// Round was aborted because of a cryptographic failure.
    Failure(Error),
}

/// Public parameters of a round shared by all peers and auditors: the round identifier,
/// the key shares of participating peers with their aggregate, the candidates,
/// and the combination policy.
#[derive(Debug, Clone)]
pub struct RoundContext<G: Group> {
    id: RoundId,
    key: PublicKey<G>,
    key_shares: BTreeMap<PeerId, PublicKey<G>>,
    candidates: Vec<G::Element>,
    policy: Arc<dyn CombinationPolicy>,
    transcript_label: &'static [u8],
}

impl<G: Group> RoundContext<G> {
    /// Creates a context. Peers and auditors should normally obtain the context
    /// from [`SelectionRound::context()`] instead.
    ///
    /// # Errors
    ///
    /// - [`Error::KeyNotReady`] if `key_shares` is empty or the shares cancel each other out.
    /// - [`Error::InvalidCandidates`] if `candidates` is empty or contains duplicates.
    /// - [`Error::OutOfRange`] if the largest sum of contributions exceeds
    ///   [`MAX_CONTRIBUTION_SUM`].
    pub fn new(
        id: RoundId,
        key_shares: impl IntoIterator<Item = (PeerId, PublicKey<G>)>,
        candidates: Vec<G::Element>,
        config: &RoundConfig,
    ) -> Result<Self> {
        let key_shares: BTreeMap<_, _> = key_shares.into_iter().collect();
        let key = PublicKey::aggregate(key_shares.values()).ok_or(Error::KeyNotReady)?;
        if candidates.is_empty() {
            return Err(Error::InvalidCandidates("candidate set is empty"));
        }
        check_max_sum(key_shares.len(), candidates.len())?;
        let mut unique = HashSet::with_capacity(candidates.len());
        if !candidates
            .iter()
            .all(|candidate| unique.insert(element_to_bytes::<G>(candidate)))
        {
            return Err(Error::InvalidCandidates("candidate set contains duplicates"));
        }

        Ok(Self {
            id,
            key,
            key_shares,
            candidates,
            policy: Arc::clone(&config.policy),
            transcript_label: config.transcript_label,
        })
    }

    /// Returns the round identifier.
    pub fn id(&self) -> RoundId {
        self.id
    }

    /// Returns the aggregate public key used in the round.
    pub fn key(&self) -> &PublicKey<G> {
        &self.key
    }

    /// Iterates over participating peers and their key shares, ordered by peer.
    pub fn key_shares(&self) -> impl Iterator<Item = (PeerId, &PublicKey<G>)> + '_ {
        self.key_shares.iter().map(|(peer, key)| (*peer, key))
    }

    /// Returns the number of participating peers.
    pub fn peer_count(&self) -> usize {
        self.key_shares.len()
    }

    /// Returns the candidates.
    pub fn candidates(&self) -> &[G::Element] {
        &self.candidates
    }

    /// Returns the number of candidates.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Returns the policy mapping the decrypted sum of contributions to the selected index.
    pub fn policy(&self) -> &dyn CombinationPolicy {
        self.policy.as_ref()
    }

    fn max_sum(&self) -> u64 {
        self.key_shares.len() as u64 * (self.candidates.len() as u64 - 1)
    }

    /// Creates a transcript for a proof of the specified `purpose` bound to the round
    /// and, optionally, a peer.
    pub(crate) fn transcript(&self, purpose: &'static [u8], peer: Option<PeerId>) -> Transcript {
        let mut transcript = Transcript::new(self.transcript_label);
        transcript.append_message(b"round", &self.id.0);
        transcript.append_message(b"K", self.key.as_bytes());
        transcript.append_u64(b"n", self.candidates.len() as u64);
        transcript.append_message(b"purpose", purpose);
        if let Some(peer) = peer {
            transcript.append_u64(b"peer", peer.0);
        }
        transcript
    }

    /// Encryptions of `[0]G, …, [n - 1]G` with zero randomness, i.e., the admissible
    /// contribution values.
    pub(crate) fn admissible_contributions(&self) -> Vec<Ciphertext<G>> {
        (0..self.candidates.len() as u64)
            .map(|value| Ciphertext::non_blinded(G::vartime_mul_generator(&value.into())))
            .collect()
    }

    /// Verifies a partial decryption of `ciphertext` supplied by `peer` in this round.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `peer` does not participate in the round.
    /// - [`Error::ProofInvalid`] if the decryption proof does not verify.
    pub fn verify_partial(
        &self,
        peer: PeerId,
        ciphertext: Ciphertext<G>,
        partial: &PartialDecryption<G>,
    ) -> Result<()> {
        let key_share = self.key_shares.get(&peer).ok_or(Error::NotFound(peer))?;
        let mut transcript = self.transcript(b"partial_decryption", Some(peer));
        partial
            .verify(ciphertext, key_share, &mut transcript)
            .map_err(|source| Error::ProofInvalid { peer, source })
    }
}

/// Returns `N * (n - 1)` for `N` peers and `n > 0` candidates, checking it against
/// [`MAX_CONTRIBUTION_SUM`].
fn check_max_sum(peer_count: usize, candidate_count: usize) -> Result<u64> {
    (candidate_count as u64 - 1)
        .checked_mul(peer_count as u64)
        .filter(|&sum| sum <= MAX_CONTRIBUTION_SUM)
        .ok_or(Error::OutOfRange("candidate set size"))
}

/// Value committed to in a [`RoundCommitment`].
pub(crate) fn contribution_commitment_value<G: Group>(
    round: RoundId,
    peer: PeerId,
    ciphertext: &Ciphertext<G>,
) -> Vec<u8> {
    let mut value = Vec::with_capacity(ROUND_ID_BYTES + 8 + 2 * G::ELEMENT_SIZE);
    value.extend_from_slice(&round.0);
    value.extend_from_slice(&peer.0.to_le_bytes());
    value.extend_from_slice(&ciphertext.to_bytes());
    value
}

/// Commitment of a peer to its encrypted contribution in a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoundCommitment {
    round: RoundId,
    commitment: Commitment,
}

impl RoundCommitment {
    pub(crate) fn new(round: RoundId, commitment: Commitment) -> Self {
        Self { round, commitment }
    }

    /// Returns the round this commitment belongs to.
    pub fn round(&self) -> RoundId {
        self.round
    }

    /// Returns the hash commitment.
    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }
}

/// Revealed encrypted contribution of a peer.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = ""))]
pub struct ContributionReveal<G: Group> {
    ciphertext: Ciphertext<G>,
    opening: Opening,
    proof: DisjunctivePep<G>,
}

impl<G: Group> ContributionReveal<G> {
    pub(crate) fn new(
        ciphertext: Ciphertext<G>,
        opening: Opening,
        proof: DisjunctivePep<G>,
    ) -> Self {
        Self {
            ciphertext,
            opening,
            proof,
        }
    }

    /// Returns the encrypted contribution.
    pub fn ciphertext(&self) -> Ciphertext<G> {
        self.ciphertext
    }

    /// Returns the opening of the round commitment.
    pub fn opening(&self) -> &Opening {
        &self.opening
    }

    /// Returns the proof that the contribution lies in the admissible range.
    pub fn proof(&self) -> &DisjunctivePep<G> {
        &self.proof
    }

    /// Checks that this reveal opens `commitment`.
    pub fn matches(
        &self,
        context: &RoundContext<G>,
        peer: PeerId,
        commitment: &RoundCommitment,
    ) -> bool {
        let value = contribution_commitment_value(context.id, peer, &self.ciphertext);
        commitment.round == context.id
            && commitment::verify(&commitment.commitment, &value, &self.opening)
    }

    /// Verifies the range proof of the contribution submitted by `peer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the proof does not verify.
    pub fn verify_proof(
        &self,
        context: &RoundContext<G>,
        peer: PeerId,
    ) -> Result<(), VerificationError> {
        self.proof.verify(
            &context.key,
            &self.ciphertext,
            &context.admissible_contributions(),
            &mut context.transcript(b"contribution", Some(peer)),
        )
    }
}

/// Disclosure of a contribution: the contribution value and the encryption randomness.
/// Disclosing it after the round allows auditing the contribution with
/// [`SelectionRound::verify_contribution_reveal()`]. Secret while the round is in progress.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = ""))]
pub struct ContributionDisclosure<G: Group> {
    /// Contribution value in `0..n`.
    pub value: u64,
    /// Randomness used to encrypt the contribution.
    pub randomness: SecretKey<G>,
}

/// Policy mapping the decrypted sum of contributions to a candidate index.
///
/// Implementations must be deterministic and return an index in `0..candidate_count`;
/// a round that gets an index out of this range is aborted.
pub trait CombinationPolicy: fmt::Debug + Send + Sync {
    /// Maps `sum` (the sum of `peer_count` contributions, each in `0..candidate_count`)
    /// to a candidate index.
    fn select(&self, sum: u64, peer_count: usize, candidate_count: usize) -> usize;
}

/// Default [`CombinationPolicy`]: the sum of contributions modulo the number of candidates.
///
/// If at least one contribution is uniformly distributed and independent of the others,
/// the result is uniformly distributed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModularSum;

impl CombinationPolicy for ModularSum {
    fn select(&self, sum: u64, _peer_count: usize, candidate_count: usize) -> usize {
        (sum % candidate_count as u64) as usize
    }
}

/// Proof that a [`Selection`] is one of the encrypted candidates.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = ""))]
pub struct SelectionProof<G: Group> {
    reencrypted: Ciphertext<G>,
    membership: DisjunctivePep<G>,
    equivalence: PlaintextEquivalenceProof<G>,
}

impl<G: Group> SelectionProof<G> {
    fn new<R: CryptoRng + RngCore>(
        context: &RoundContext<G>,
        encrypted_candidates: &[ExtendedCiphertext<G>],
        index: usize,
        candidate: G::Element,
        rng: &mut R,
    ) -> Self {
        let selected = &encrypted_candidates[index];
        let (reencrypted, delta) = context.key.reencrypt(selected.inner, rng);
        let references: Vec<_> = encrypted_candidates
            .iter()
            .map(ExtendedCiphertext::ciphertext)
            .collect();

        let mut transcript = context.transcript(b"selection", None);
        let membership = DisjunctivePep::new(
            &context.key,
            &reencrypted,
            &references,
            index,
            &delta,
            &mut transcript,
            rng,
        );
        let total_randomness = selected.random_scalar.clone() + delta;
        let equivalence = PlaintextEquivalenceProof::from_delta(
            &context.key,
            &reencrypted,
            &Ciphertext::non_blinded(candidate),
            &total_randomness,
            &mut transcript,
            rng,
        );

        Self {
            reencrypted,
            membership,
            equivalence,
        }
    }

    /// Returns the re-encryption of the selected encrypted candidate.
    pub fn reencrypted(&self) -> Ciphertext<G> {
        self.reencrypted
    }
}

/// Error returned by [`Selection::verify()`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SelectionError {
    /// Announced candidate is not the candidate at the announced index.
    #[error("announced candidate does not match the candidate at index {index}")]
    CandidateMismatch {
        /// Announced index.
        index: usize,
    },
    /// Partial decryptions do not correspond one-to-one to the participating peers.
    #[error("unexpected partial decryption from peer {0}")]
    UnexpectedPeer(PeerId),
    /// Partial decryption of a peer does not verify.
    #[error("invalid partial decryption from peer {peer}: {source}")]
    Decryption {
        /// Offending peer.
        peer: PeerId,
        /// Proof verification error.
        #[source]
        source: VerificationError,
    },
    /// Announced sum is not the joint decryption of the combined contributions.
    #[error("announced sum of contributions does not match the joint decryption")]
    SumMismatch,
    /// Announced index does not follow from the sum under the combination policy.
    #[error("announced index {actual} differs from the index {expected} chosen by the policy")]
    IndexMismatch {
        /// Index chosen by the combination policy.
        expected: usize,
        /// Announced index.
        actual: usize,
    },
    /// Proof of the selection does not verify.
    #[error("invalid selection proof: {0}")]
    Proof(#[from] VerificationError),
}

/// Result of a [`SelectionRound`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = ""))]
pub struct Selection<G: Group> {
    index: usize,
    #[cfg_attr(feature = "serde", serde(with = "ElementHelper::<G>"))]
    candidate: G::Element,
    sum: u64,
    partials: Vec<(PeerId, PartialDecryption<G>)>,
    proof: SelectionProof<G>,
}

impl<G: Group> Selection<G> {
    /// Returns the index of the selected candidate.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the selected candidate.
    pub fn candidate(&self) -> G::Element {
        self.candidate
    }

    /// Returns the decrypted sum of contributions the index was derived from.
    pub fn sum(&self) -> u64 {
        self.sum
    }

    /// Returns the partial decryptions of the combined contributions, ordered by peer.
    pub fn partial_decryptions(&self) -> &[(PeerId, PartialDecryption<G>)] {
        &self.partials
    }

    /// Returns the proof of the selection.
    pub fn proof(&self) -> &SelectionProof<G> {
        &self.proof
    }

    /// Verifies that the selection was derived honestly from the encrypted `contributions`
    /// of all peers (as published by [`SelectionRound::contributions()`], in any order):
    ///
    /// - the partial decryptions of `S = Σ contributions` by every peer are valid,
    ///   and the decrypted sum of contributions is [`Self::sum()`];
    /// - the index is the one chosen by the combination policy of the round for this sum,
    ///   and the candidate is the candidate at this index;
    /// - the selected candidate is one of `encrypted_candidates` (as published
    ///   by [`SelectionRound::encrypted_candidates()`]).
    ///
    /// # Errors
    ///
    /// Returns an error if any of these checks fails.
    pub fn verify(
        &self,
        context: &RoundContext<G>,
        encrypted_candidates: &[Ciphertext<G>],
        contributions: &[Ciphertext<G>],
    ) -> Result<(), SelectionError> {
        VerificationError::check_lengths(
            "encrypted candidates",
            context.candidate_count(),
            encrypted_candidates.len(),
        )?;
        VerificationError::check_lengths(
            "contributions",
            context.peer_count(),
            contributions.len(),
        )?;
        VerificationError::check_lengths(
            "partial decryptions",
            context.peer_count(),
            self.partials.len(),
        )?;
        if context.candidates.get(self.index) != Some(&self.candidate) {
            return Err(SelectionError::CandidateMismatch { index: self.index });
        }

        let combined = contributions
            .iter()
            .fold(Ciphertext::zero(), |acc, contribution| acc + *contribution);
        let mut dh_sum = G::identity();
        for ((peer, key_share), (partial_peer, partial)) in
            context.key_shares.iter().zip(&self.partials)
        {
            if peer != partial_peer {
                return Err(SelectionError::UnexpectedPeer(*partial_peer));
            }
            let mut transcript = context.transcript(b"partial_decryption", Some(*peer));
            partial
                .verify(combined, key_share, &mut transcript)
                .map_err(|source| SelectionError::Decryption {
                    peer: *peer,
                    source,
                })?;
            dh_sum += *partial.as_element();
        }
        let decrypted = *combined.blinded_element() - dh_sum;
        if self.sum > context.max_sum() || decrypted != G::vartime_mul_generator(&self.sum.into())
        {
            return Err(SelectionError::SumMismatch);
        }

        let expected_index =
            context
                .policy
                .select(self.sum, context.peer_count(), context.candidate_count());
        if expected_index != self.index {
            return Err(SelectionError::IndexMismatch {
                expected: expected_index,
                actual: self.index,
            });
        }

        let proof = &self.proof;
        let mut transcript = context.transcript(b"selection", None);
        proof.membership.verify(
            &context.key,
            &proof.reencrypted,
            encrypted_candidates,
            &mut transcript,
        )?;
        proof.equivalence.verify(
            &context.key,
            &proof.reencrypted,
            &Ciphertext::non_blinded(self.candidate),
            &mut transcript,
        )?;
        Ok(())
    }
}

#[derive(Debug)]
struct RoundState<G: Group> {
    context: RoundContext<G>,
    encrypted_candidates: Vec<ExtendedCiphertext<G>>,
    commitments: BTreeMap<PeerId, RoundCommitment>,
    contributions: BTreeMap<PeerId, Ciphertext<G>>,
    decryption: Option<DecryptionCollector<G>>,
    selection: Option<Selection<G>>,
}

impl<G: Group> RoundState<G> {
    fn check_participant(&self, peer: PeerId) -> Result<()> {
        if self.context.key_shares.contains_key(&peer) {
            Ok(())
        } else {
            Err(Error::NotFound(peer))
        }
    }

    fn missing<'a, T>(&'a self, received: &'a BTreeMap<PeerId, T>) -> Vec<PeerId> {
        self.context
            .key_shares
            .keys()
            .filter(|peer| !received.contains_key(peer))
            .copied()
            .collect()
    }
}

/// Single selection among a set of candidates by all peers of a [`PeerRegistry`].
///
/// The round borrows the registry, so the registry cannot be mutated while the round
/// is alive. The round is driven by the caller: it exposes methods to submit messages
/// received from peers and `missing_*` methods to check which peers are still expected
/// to send messages. All methods return immediately.
///
/// Errors caused by misplaced calls ([`Error::OutOfPhase`], [`Error::NotFound`],
/// [`Error::StaleCommitment`], [`Error::DuplicateSubmission`]) leave the round unchanged.
/// Cryptographic failures ([`Error::CommitmentMismatch`], [`Error::ProofInvalid`],
/// [`Error::IncompleteDecryption`]) abort the round and discard its state.
///
/// # Examples
///
/// ```
/// # use golle::{group::{Group, Ristretto}, LocalPeer, PeerId, PeerRegistry, SelectionRound};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut rng = rand::thread_rng();
/// let peers: Vec<_> = (1..=3)
///     .map(|i| LocalPeer::<Ristretto>::new(PeerId(i), &mut rng))
///     .collect();
/// let mut registry = PeerRegistry::new();
/// for peer in &peers {
///     registry.add(peer.id())?;
///     registry.commit(peer.id(), peer.key_commitment())?;
/// }
/// for peer in &peers {
///     registry.verify(peer.id(), peer.key_reveal(&mut rng))?;
/// }
///
/// let candidates: Vec<_> = (1..=5_u64)
///     .map(|i| Ristretto::mul_generator(&i.into()))
///     .collect();
/// let mut round = SelectionRound::new(&registry);
/// let context = round.begin(&candidates, &mut rng)?.clone();
///
/// let contributions: Vec<_> = peers
///     .iter()
///     .map(|peer| peer.contribute(&context, &mut rng))
///     .collect();
/// for (peer, (commitment, _)) in peers.iter().zip(&contributions) {
///     round.commit(peer.id(), *commitment)?;
/// }
/// for (peer, (_, pending)) in peers.iter().zip(&contributions) {
///     round.verify(peer.id(), &pending.reveal(&mut rng))?;
/// }
/// let sum = round.combined_ciphertext().unwrap();
/// for peer in &peers {
///     round.submit_partial(peer.id(), &peer.partial_decrypt(&context, sum, &mut rng))?;
/// }
///
/// let selection = round.round_end(&mut rng)?;
/// assert!(candidates.contains(&selection.candidate()));
/// let encrypted_candidates = round.encrypted_candidates().unwrap();
/// let contributions = round.contributions().unwrap();
/// selection.verify(&context, &encrypted_candidates, &contributions)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SelectionRound<'r, G: Group> {
    registry: &'r PeerRegistry<G>,
    config: RoundConfig,
    phase: Phase,
    state: Option<RoundState<G>>,
    abort_reason: Option<AbortReason>,
}

impl<'r, G: Group> SelectionRound<'r, G> {
    /// Creates a round over the peers of `registry` with the default configuration.
    pub fn new(registry: &'r PeerRegistry<G>) -> Self {
        Self::with_config(registry, RoundConfig::default())
    }

    /// Creates a round over the peers of `registry` with the specified configuration.
    pub fn with_config(registry: &'r PeerRegistry<G>, config: RoundConfig) -> Self {
        Self {
            registry,
            config,
            phase: Phase::NotStarted,
            state: None,
            abort_reason: None,
        }
    }

    /// Returns the registry this round runs over.
    pub fn registry(&self) -> &'r PeerRegistry<G> {
        self.registry
    }

    /// Returns the current phase of the round.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the reason why the round was aborted, or `None` if it was not aborted.
    pub fn abort_reason(&self) -> Option<&AbortReason> {
        self.abort_reason.as_ref()
    }

    /// Returns the public context of the round, or `None` if the round is not started
    /// or is aborted.
    pub fn context(&self) -> Option<&RoundContext<G>> {
        self.state.as_ref().map(|state| &state.context)
    }

    /// Returns the candidates of the round (empty if the round is not started or is aborted).
    pub fn candidates(&self) -> &[G::Element] {
        self.state
            .as_ref()
            .map_or(&[][..], |state| state.context.candidates())
    }

    fn check_phase(&self, operation: &'static str, allowed: &[Phase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(Error::OutOfPhase {
                operation,
                actual: self.phase,
            })
        }
    }

    fn state(&self, operation: &'static str) -> Result<&RoundState<G>> {
        self.state.as_ref().ok_or(Error::OutOfPhase {
            operation,
            actual: self.phase,
        })
    }

    fn state_mut(&mut self, operation: &'static str) -> Result<&mut RoundState<G>> {
        let phase = self.phase;
        self.state.as_mut().ok_or(Error::OutOfPhase {
            operation,
            actual: phase,
        })
    }

    /// Aborts the round because of `error` and returns the error back.
    fn fail(&mut self, error: Error) -> Error {
        let round = self.state.as_ref().map(|state| state.context.id);
        warn!(
            round = %DisplayOption(round),
            phase = ?self.phase,
            peer = ?error.peer(),
            %error,
            "aborting round"
        );
        self.phase = Phase::Aborted;
        self.state = None;
        self.abort_reason = Some(AbortReason::Failure(error.clone()));
        error
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase == phase {
            return;
        }
        if let Some(state) = &self.state {
            info!(round = %state.context.id, from = ?self.phase, to = ?phase, "round phase changed");
        }
        self.phase = phase;
    }

    /// Starts the round: snapshots the key shares of the registry and encrypts
    /// the candidates. Returns the public context of the round, which should be sent
    /// to all peers.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfPhase`] if the round is already started.
    /// - [`Error::KeyNotReady`] if the aggregate key of the registry is not ready.
    /// - [`Error::InvalidCandidates`] if `candidates` is empty or contains duplicates.
    /// - [`Error::OutOfRange`] if there are too many candidates for the number of peers
    ///   (see [`MAX_CONTRIBUTION_SUM`]).
    pub fn begin<R: CryptoRng + RngCore>(
        &mut self,
        candidates: &[G::Element],
        rng: &mut R,
    ) -> Result<&RoundContext<G>> {
        self.check_phase("begin", &[Phase::NotStarted])?;
        self.registry.aggregate_key()?;
        let key_shares = self
            .registry
            .iter()
            .filter_map(|peer| Some((peer.id(), peer.key()?.clone())));
        let context = RoundContext::new(
            RoundId::generate(rng),
            key_shares,
            candidates.to_vec(),
            &self.config,
        )?;

        let encrypted_candidates = candidates
            .iter()
            .map(|candidate| context.key.encrypt_extended(*candidate, rng))
            .collect();
        info!(
            round = %context.id,
            peers = context.peer_count(),
            candidates = candidates.len(),
            "round started"
        );

        self.phase = Phase::Committing;
        let state = self.state.insert(RoundState {
            context,
            encrypted_candidates,
            commitments: BTreeMap::new(),
            contributions: BTreeMap::new(),
            decryption: None,
            selection: None,
        });
        Ok(&state.context)
    }

    /// Records a commitment of `peer` to its contribution. When the last commitment
    /// is recorded, the round moves to [`Phase::Encrypted`]. Returns the phase after
    /// the call.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfPhase`] if the round is not in [`Phase::Committing`].
    /// - [`Error::NotFound`] if `peer` does not participate in the round.
    /// - [`Error::StaleCommitment`] if the commitment belongs to another round.
    /// - [`Error::DuplicateSubmission`] if the peer has already committed.
    pub fn commit(&mut self, peer: PeerId, commitment: RoundCommitment) -> Result<Phase> {
        self.check_phase("commit", &[Phase::Committing])?;
        let state = self.state_mut("commit")?;
        state.check_participant(peer)?;
        if commitment.round != state.context.id {
            return Err(Error::StaleCommitment { peer });
        }
        if state.commitments.contains_key(&peer) {
            return Err(Error::DuplicateSubmission { peer });
        }

        state.commitments.insert(peer, commitment);
        debug!(round = %state.context.id, %peer, "accepted round commitment");
        if state.commitments.len() == state.context.peer_count() {
            self.set_phase(Phase::Encrypted);
        }
        Ok(self.phase)
    }

    /// Returns the commitment of `peer`. Commitments are only exposed after all peers
    /// have committed.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfPhase`] if not all peers have committed yet, or the round is aborted.
    /// - [`Error::NotFound`] if `peer` does not participate in the round.
    pub fn get_commitment(&self, peer: PeerId) -> Result<RoundCommitment> {
        if matches!(
            self.phase,
            Phase::NotStarted | Phase::Committing | Phase::Aborted
        ) {
            return Err(Error::OutOfPhase {
                operation: "get_commitment",
                actual: self.phase,
            });
        }
        let state = self.state("get_commitment")?;
        state
            .commitments
            .get(&peer)
            .copied()
            .ok_or(Error::NotFound(peer))
    }

    /// Verifies the revealed contribution of `peer` against its commitment and checks
    /// the range proof. When the last contribution is verified, the encrypted sum
    /// of contributions is fixed and the round moves to [`Phase::Decrypting`].
    /// Returns the phase after the call.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfPhase`] if the round is not in [`Phase::Encrypted`] or [`Phase::Proving`].
    /// - [`Error::NotFound`] if `peer` does not participate in the round.
    /// - [`Error::DuplicateSubmission`] if the contribution of the peer is already verified.
    /// - [`Error::CommitmentMismatch`] if the reveal does not match the commitment.
    ///   The round is aborted.
    /// - [`Error::ProofInvalid`] if the range proof does not verify. The round is aborted.
    pub fn verify(&mut self, peer: PeerId, reveal: &ContributionReveal<G>) -> Result<Phase> {
        self.check_phase("verify", &[Phase::Encrypted, Phase::Proving])?;
        let state = self.state("verify")?;
        state.check_participant(peer)?;
        if state.contributions.contains_key(&peer) {
            return Err(Error::DuplicateSubmission { peer });
        }
        let commitment = state.commitments.get(&peer).ok_or(Error::NotFound(peer))?;

        if !reveal.matches(&state.context, peer, commitment) {
            return Err(self.fail(Error::CommitmentMismatch { peer }));
        }
        if let Err(source) = reveal.verify_proof(&state.context, peer) {
            return Err(self.fail(Error::ProofInvalid { peer, source }));
        }

        let state = self.state_mut("verify")?;
        state.contributions.insert(peer, reveal.ciphertext);
        debug!(round = %state.context.id, %peer, "accepted contribution");
        if state.contributions.len() < state.context.peer_count() {
            self.set_phase(Phase::Proving);
            return Ok(self.phase);
        }

        let sum = state
            .contributions
            .values()
            .fold(Ciphertext::zero(), |acc, ciphertext| acc + *ciphertext);
        let key_shares = state
            .context
            .key_shares()
            .map(|(id, key)| (id, key.clone()));
        state.decryption = Some(DecryptionCollector::new(sum, key_shares));
        self.set_phase(Phase::Decrypting);
        Ok(self.phase)
    }

    /// Verifies and records a partial decryption of the combined ciphertext from `peer`.
    /// Returns the phase after the call.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfPhase`] if the round is not in [`Phase::Decrypting`].
    /// - [`Error::NotFound`] if `peer` does not participate in the round.
    /// - [`Error::DuplicateSubmission`] if the peer has already supplied a partial decryption.
    /// - [`Error::ProofInvalid`] if the decryption proof does not verify. The round is aborted.
    pub fn submit_partial(
        &mut self,
        peer: PeerId,
        partial: &PartialDecryption<G>,
    ) -> Result<Phase> {
        self.check_phase("submit_partial", &[Phase::Decrypting])?;
        let state = self.state_mut("submit_partial")?;
        let mut transcript = state.context.transcript(b"partial_decryption", Some(peer));
        let collector = state.decryption.as_mut().ok_or(Error::OutOfPhase {
            operation: "submit_partial",
            actual: Phase::Decrypting,
        })?;

        match collector.insert(peer, partial, &mut transcript) {
            Ok(()) => Ok(self.phase),
            Err(err @ Error::ProofInvalid { .. }) => Err(self.fail(err)),
            Err(err) => Err(err),
        }
    }

    /// Completes the round: combines partial decryptions of all peers, maps the decrypted sum
    /// of contributions to the selected candidate and proves the selection.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfPhase`] if the round is not in [`Phase::Decrypting`]. The round
    ///   is not aborted.
    /// - [`Error::IncompleteDecryption`] if some partial decryptions are missing.
    ///   The round is aborted.
    /// - [`Error::OutOfRange`] if the decrypted sum is not a valid sum of contributions,
    ///   or if the combination policy returns an index out of range. The round is aborted.
    pub fn round_end<R: CryptoRng + RngCore>(&mut self, rng: &mut R) -> Result<Selection<G>> {
        self.check_phase("round_end", &[Phase::Decrypting])?;
        let state = self.state("round_end")?;
        let Some(collector) = state.decryption.as_ref() else {
            return Err(Error::OutOfPhase {
                operation: "round_end",
                actual: self.phase,
            });
        };
        let decrypted = match collector.combine() {
            Ok(element) => element,
            Err(err) => return Err(self.fail(err)),
        };

        let context = &state.context;
        let table = DiscreteLogTable::<G>::new(0..=context.max_sum());
        let Some(sum) = table.get(&decrypted) else {
            return Err(self.fail(Error::OutOfRange("decrypted sum of contributions")));
        };
        let candidate_count = context.candidate_count();
        let index = context
            .policy
            .select(sum, context.peer_count(), candidate_count);
        if index >= candidate_count {
            return Err(self.fail(Error::OutOfRange("selected candidate index")));
        }

        let candidate = context.candidates[index];
        let proof = SelectionProof::new(
            context,
            &state.encrypted_candidates,
            index,
            candidate,
            rng,
        );
        let partials = collector
            .partials()
            .map(|(peer, partial)| (peer, partial.clone()))
            .collect();
        let selection = Selection {
            index,
            candidate,
            sum,
            partials,
            proof,
        };
        info!(round = %context.id, index, sum, "round complete");

        let state = self.state_mut("round_end")?;
        state.selection = Some(selection.clone());
        self.set_phase(Phase::Complete);
        Ok(selection)
    }

    /// Returns the selection made by the round, if the round is complete.
    pub fn selection(&self) -> Option<&Selection<G>> {
        self.state.as_ref()?.selection.as_ref()
    }

    /// Aborts the round and discards its state. The registry is not affected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfPhase`] if the round is already complete or aborted.
    pub fn abort(&mut self) -> Result<()> {
        if self.phase.is_terminal() {
            return Err(Error::OutOfPhase {
                operation: "abort",
                actual: self.phase,
            });
        }
        if let Some(state) = &self.state {
            warn!(round = %state.context.id, phase = ?self.phase, "round aborted on request");
        }
        self.phase = Phase::Aborted;
        self.state = None;
        self.abort_reason = Some(AbortReason::Requested);
        Ok(())
    }

    /// Returns the encrypted candidates, or `None` if not all peers have committed yet
    /// (or the round is aborted).
    pub fn encrypted_candidates(&self) -> Option<Vec<Ciphertext<G>>> {
        if matches!(self.phase, Phase::NotStarted | Phase::Committing) {
            return None;
        }
        let state = self.state.as_ref()?;
        Some(
            state
                .encrypted_candidates
                .iter()
                .map(ExtendedCiphertext::ciphertext)
                .collect(),
        )
    }

    /// Returns the encrypted sum of all contributions, or `None` if not all contributions
    /// are verified yet (or the round is aborted). This is the ciphertext peers
    /// should partially decrypt.
    pub fn combined_ciphertext(&self) -> Option<Ciphertext<G>> {
        let collector = self.state.as_ref()?.decryption.as_ref()?;
        Some(collector.ciphertext())
    }

    /// Returns the encrypted contributions of all peers ordered by peer, or `None` if not all
    /// contributions are verified yet (or the round is aborted).
    pub fn contributions(&self) -> Option<Vec<Ciphertext<G>>> {
        let state = self.state.as_ref()?;
        if state.contributions.len() < state.context.peer_count() {
            return None;
        }
        Some(state.contributions.values().copied().collect())
    }

    /// Returns the encrypted contribution of `peer`, if it is verified.
    pub fn contribution(&self, peer: PeerId) -> Option<Ciphertext<G>> {
        self.state.as_ref()?.contributions.get(&peer).copied()
    }

    /// Returns peers that have not committed yet.
    pub fn missing_commitments(&self) -> Vec<PeerId> {
        self.state
            .as_ref()
            .map_or_else(Vec::new, |state| state.missing(&state.commitments))
    }

    /// Returns peers whose contributions are not verified yet.
    pub fn missing_reveals(&self) -> Vec<PeerId> {
        self.state
            .as_ref()
            .map_or_else(Vec::new, |state| state.missing(&state.contributions))
    }

    /// Returns peers that have not supplied a partial decryption yet. Empty before
    /// the round reaches [`Phase::Decrypting`].
    pub fn missing_partials(&self) -> Vec<PeerId> {
        self.state
            .as_ref()
            .and_then(|state| state.decryption.as_ref())
            .map_or_else(Vec::new, |collector| collector.missing().collect())
    }

    /// Audits a disclosed contribution of `peer` against its verified encrypted contribution.
    /// Does not change the round.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfPhase`] if contributions are not fixed yet (i.e., the round is not in
    ///   [`Phase::Decrypting`] or [`Phase::Complete`]).
    /// - [`Error::NotFound`] if `peer` does not participate in the round.
    /// - [`Error::OutOfRange`] if the disclosed value is not below the number of candidates.
    /// - [`Error::CommitmentMismatch`] if the disclosure does not match the contribution.
    pub fn verify_contribution_reveal(
        &self,
        peer: PeerId,
        disclosure: &ContributionDisclosure<G>,
    ) -> Result<()> {
        self.check_phase(
            "verify_contribution_reveal",
            &[Phase::Decrypting, Phase::Complete],
        )?;
        let state = self.state("verify_contribution_reveal")?;
        let ciphertext = state.contributions.get(&peer).ok_or(Error::NotFound(peer))?;
        if disclosure.value >= state.context.candidate_count() as u64 {
            return Err(Error::OutOfRange("disclosed contribution value"));
        }

        let value = G::vartime_mul_generator(&disclosure.value.into());
        if state
            .context
            .key
            .is_encryption_of(ciphertext, value, &disclosure.randomness)
        {
            Ok(())
        } else {
            Err(Error::CommitmentMismatch { peer })
        }
    }
}

/// Displays `-` for a missing value.
struct DisplayOption<T>(Option<T>);

impl<T: fmt::Display> fmt::Display for DisplayOption<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => fmt::Display::fmt(value, formatter),
            None => formatter.write_str("-"),
        }
    }
}
