//! Secret-holding side of a peer.

use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use core::fmt;

use crate::{
    commitment::{self, Opening},
    encryption::ExtendedCiphertext,
    group::{uniform_below, Group},
    proofs::{DisjunctivePep, SchnorrProof},
    registry::{key_commitment_value, key_transcript, KeyCommitment, KeyReveal, PeerId},
    round::{
        contribution_commitment_value, ContributionDisclosure, ContributionReveal,
        RoundCommitment, RoundContext,
    },
    threshold::PartialDecryption,
    Ciphertext, Keypair, PublicKey,
};

/// Peer holding its secret key share. Produces every message the peer sends
/// to the [`PeerRegistry`](crate::PeerRegistry) and [`SelectionRound`](crate::SelectionRound)s.
///
/// # Examples
///
/// See [`SelectionRound`](crate::SelectionRound) for an end-to-end example.
#[derive(Debug, Clone)]
pub struct LocalPeer<G: Group> {
    id: PeerId,
    keys: Keypair<G>,
    key_commitment: KeyCommitment,
    key_opening: Opening,
}

impl<G: Group> LocalPeer<G> {
    /// Creates a peer with a freshly generated key share.
    pub fn new<R: CryptoRng + RngCore>(id: PeerId, rng: &mut R) -> Self {
        Self::from_keys(id, Keypair::generate(rng), rng)
    }

    /// Creates a peer with the specified key share.
    pub fn from_keys<R: CryptoRng + RngCore>(id: PeerId, keys: Keypair<G>, rng: &mut R) -> Self {
        let value = key_commitment_value(id, keys.public());
        let (commitment, key_opening) = commitment::create(&value, rng);
        Self {
            id,
            keys,
            key_commitment: KeyCommitment::new(commitment),
            key_opening,
        }
    }

    /// Returns the identifier of this peer.
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Returns the public key share of this peer.
    pub fn public_key(&self) -> &PublicKey<G> {
        self.keys.public()
    }

    /// Returns the commitment to the key share, which should be published first.
    pub fn key_commitment(&self) -> KeyCommitment {
        self.key_commitment
    }

    /// Reveals the key share together with a proof of possession of the secret key.
    pub fn key_reveal<R: CryptoRng + RngCore>(&self, rng: &mut R) -> KeyReveal<G> {
        let proof = SchnorrProof::new(&self.keys, &mut key_transcript(self.id), rng);
        KeyReveal::new(self.keys.public().clone(), self.key_opening.clone(), proof)
    }

    /// Draws a random contribution to the round and commits to it. The commitment
    /// should be published right away; the returned [`PendingContribution`] must be kept
    /// secret until all peers have committed.
    pub fn contribute<R: CryptoRng + RngCore>(
        &self,
        context: &RoundContext<G>,
        rng: &mut R,
    ) -> (RoundCommitment, PendingContribution<G>) {
        let value = Zeroizing::new(uniform_below(context.candidate_count() as u64, rng));
        let element = G::mul_generator(&(*value).into());
        let encrypted = ExtendedCiphertext::new(element, context.key(), rng);

        let committed_value =
            contribution_commitment_value(context.id(), self.id, &encrypted.ciphertext());
        let (commitment, opening) = commitment::create(&committed_value, rng);
        let pending = PendingContribution {
            peer: self.id,
            context: context.clone(),
            value,
            encrypted,
            opening,
        };
        (RoundCommitment::new(context.id(), commitment), pending)
    }

    /// Partially decrypts `ciphertext` (normally, the
    /// [combined ciphertext](crate::SelectionRound::combined_ciphertext()) of the round).
    pub fn partial_decrypt<R: CryptoRng + RngCore>(
        &self,
        context: &RoundContext<G>,
        ciphertext: Ciphertext<G>,
        rng: &mut R,
    ) -> PartialDecryption<G> {
        let mut transcript = context.transcript(b"partial_decryption", Some(self.id));
        PartialDecryption::new(ciphertext, &self.keys, &mut transcript, rng)
    }
}

/// Contribution of a peer to a round that is committed to, but not yet revealed.
#[derive(Clone)]
pub struct PendingContribution<G: Group> {
    peer: PeerId,
    context: RoundContext<G>,
    value: Zeroizing<u64>,
    encrypted: ExtendedCiphertext<G>,
    opening: Opening,
}

impl<G: Group> fmt::Debug for PendingContribution<G> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PendingContribution")
            .field("peer", &self.peer)
            .field("round", &self.context.id())
            .field("ciphertext", &self.encrypted.ciphertext())
            .finish_non_exhaustive()
    }
}

impl<G: Group> PendingContribution<G> {
    /// Returns the encrypted contribution.
    pub fn ciphertext(&self) -> Ciphertext<G> {
        self.encrypted.ciphertext()
    }

    /// Reveals the encrypted contribution together with a proof that it lies
    /// in the admissible range.
    pub fn reveal<R: CryptoRng + RngCore>(&self, rng: &mut R) -> ContributionReveal<G> {
        let ciphertext = self.encrypted.ciphertext();
        let mut transcript = self.context.transcript(b"contribution", Some(self.peer));
        let proof = DisjunctivePep::new(
            self.context.key(),
            &ciphertext,
            &self.context.admissible_contributions(),
            *self.value as usize,
            self.encrypted.randomness(),
            &mut transcript,
            rng,
        );
        ContributionReveal::new(ciphertext, self.opening.clone(), proof)
    }

    /// Discloses the contribution value and encryption randomness for a post-round audit.
    /// Must not be published before the round is complete.
    pub fn disclosure(&self) -> ContributionDisclosure<G> {
        ContributionDisclosure {
            value: *self.value,
            randomness: self.encrypted.randomness().clone(),
        }
    }
}
