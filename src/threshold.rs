//! Verifiable threshold decryption with all peers' key shares.
//!
//! A ciphertext encrypted for the aggregate key `K = Σ K_i` can only be decrypted
//! with a [`PartialDecryption`] from every peer. Each partial decryption is a single group
//! element `D_i = [x_i]R`, where `x_i` is the secret key share of the peer and `R` is the random
//! element of the ciphertext (i.e., the Diffie – Hellman construction), accompanied by
//! a [`LogEqualityProof`] of `dlog_G(K_i) = dlog_R(D_i)`.
//!
//! [`DecryptionCollector`] accumulates verified partial decryptions and refuses to combine them
//! until every peer has contributed; decryption with a subset of peers is never performed.

use merlin::Transcript;
use rand_core::{CryptoRng, RngCore};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use crate::serde::ElementHelper;
use crate::{
    error::{Error, Result},
    group::{element_to_bytes, Group},
    proofs::{LogEqualityProof, TranscriptForGroup, VerificationError},
    registry::PeerId,
    Ciphertext, Keypair, PublicKey,
};

/// Partial decryption of a [`Ciphertext`] by a single key share together with
/// a zero-knowledge proof of its validity.
///
/// # Examples
///
/// ```
/// # use golle::{group::Ristretto, DiscreteLogTable, Keypair, PartialDecryption, PublicKey};
/// # use merlin::Transcript;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut rng = rand::thread_rng();
/// let shares: Vec<_> = (0..3).map(|_| Keypair::<Ristretto>::generate(&mut rng)).collect();
/// let key = PublicKey::aggregate(shares.iter().map(Keypair::public)).unwrap();
/// let ciphertext = key.encrypt(5_u64, &mut rng);
///
/// let mut decrypted = *ciphertext.blinded_element();
/// for share in &shares {
///     let partial = PartialDecryption::new(
///         ciphertext,
///         share,
///         &mut Transcript::new(b"decryption"),
///         &mut rng,
///     );
///     partial.verify(ciphertext, share.public(), &mut Transcript::new(b"decryption"))?;
///     decrypted -= *partial.as_element();
/// }
/// let table = DiscreteLogTable::<Ristretto>::new(0..10);
/// assert_eq!(table.get(&decrypted), Some(5));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = ""))]
pub struct PartialDecryption<G: Group> {
    #[cfg_attr(feature = "serde", serde(with = "ElementHelper::<G>"))]
    dh_element: G::Element,
    proof: LogEqualityProof<G>,
}

impl<G: Group> PartialDecryption<G> {
    /// Creates a partial decryption of `ciphertext` with the key share from `keys`.
    pub fn new<R: CryptoRng + RngCore>(
        ciphertext: Ciphertext<G>,
        keys: &Keypair<G>,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Self {
        // Commit to the ciphertext so that the proof cannot be replayed for another one.
        transcript.start_proof(b"partial_decryption");
        transcript.append_element::<G>(b"B", &ciphertext.blinded_element);

        let dh_element = ciphertext.random_element * keys.secret().expose_scalar();
        let proof = LogEqualityProof::new(
            ciphertext.random_element,
            keys.secret(),
            (keys.public().as_element(), dh_element),
            transcript,
            rng,
        );
        Self { dh_element, proof }
    }

    /// Returns the group element `D_i` encapsulated in this decryption.
    pub fn as_element(&self) -> &G::Element {
        &self.dh_element
    }

    /// Returns the proof of validity of this decryption.
    pub fn proof(&self) -> &LogEqualityProof<G> {
        &self.proof
    }

    /// Verifies this decryption of `ciphertext` against the key share of the peer.
    ///
    /// # Errors
    ///
    /// Returns an error if the proof does not verify.
    pub fn verify(
        &self,
        ciphertext: Ciphertext<G>,
        key_share: &PublicKey<G>,
        transcript: &mut Transcript,
    ) -> Result<(), VerificationError> {
        transcript.start_proof(b"partial_decryption");
        transcript.append_element::<G>(b"B", &ciphertext.blinded_element);
        self.proof.verify(
            ciphertext.random_element,
            (key_share.as_element(), self.dh_element),
            transcript,
        )
    }

    /// Serializes this decryption: the element `D_i` followed by the proof.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = element_to_bytes::<G>(&self.dh_element);
        bytes.extend_from_slice(&self.proof.to_bytes());
        bytes
    }

    /// Deserializes a decryption from `bytes`. Returns `None` if the data is malformed.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < G::ELEMENT_SIZE {
            return None;
        }
        let (element_bytes, proof_bytes) = bytes.split_at(G::ELEMENT_SIZE);
        let dh_element = G::deserialize_element(element_bytes)?;
        let proof = LogEqualityProof::from_bytes(proof_bytes)?;
        Some(Self { dh_element, proof })
    }
}

/// Collector of [`PartialDecryption`]s for a single ciphertext from a fixed set of peers.
///
/// Partial decryptions are verified on insertion; only verified elements are retained.
#[derive(Debug, Clone)]
pub struct DecryptionCollector<G: Group> {
    ciphertext: Ciphertext<G>,
    key_shares: BTreeMap<PeerId, PublicKey<G>>,
    partials: BTreeMap<PeerId, PartialDecryption<G>>,
}

impl<G: Group> DecryptionCollector<G> {
    /// Creates a collector for `ciphertext` and the specified peers with their key shares.
    pub fn new(
        ciphertext: Ciphertext<G>,
        key_shares: impl IntoIterator<Item = (PeerId, PublicKey<G>)>,
    ) -> Self {
        Self {
            ciphertext,
            key_shares: key_shares.into_iter().collect(),
            partials: BTreeMap::new(),
        }
    }

    /// Returns the ciphertext being decrypted.
    pub fn ciphertext(&self) -> Ciphertext<G> {
        self.ciphertext
    }

    /// Verifies and records a partial decryption from `peer`. `transcript` must be
    /// the one the peer used to create the decryption.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the peer does not participate in decryption.
    /// - [`Error::DuplicateSubmission`] if the peer has already supplied a decryption.
    /// - [`Error::ProofInvalid`] if the decryption proof does not verify.
    pub fn insert(
        &mut self,
        peer: PeerId,
        partial: &PartialDecryption<G>,
        transcript: &mut Transcript,
    ) -> Result<()> {
        let key_share = self.key_shares.get(&peer).ok_or(Error::NotFound(peer))?;
        if self.partials.contains_key(&peer) {
            return Err(Error::DuplicateSubmission { peer });
        }
        partial
            .verify(self.ciphertext, key_share, transcript)
            .map_err(|source| Error::ProofInvalid { peer, source })?;

        self.partials.insert(peer, partial.clone());
        debug!(%peer, received = self.partials.len(), "accepted partial decryption");
        Ok(())
    }

    /// Iterates over peers that have not supplied a partial decryption yet.
    pub fn missing(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.key_shares
            .keys()
            .copied()
            .filter(move |peer| !self.partials.contains_key(peer))
    }

    /// Iterates over verified partial decryptions ordered by peer.
    pub fn partials(&self) -> impl Iterator<Item = (PeerId, &PartialDecryption<G>)> + '_ {
        self.partials.iter().map(|(peer, partial)| (*peer, partial))
    }

    /// Checks whether every peer has supplied a verified partial decryption.
    pub fn is_complete(&self) -> bool {
        self.partials.len() == self.key_shares.len()
    }

    /// Combines partial decryptions from all peers and returns the decrypted group element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompleteDecryption`] listing the missing peers if not all peers
    /// have supplied their partial decryptions.
    pub fn combine(&self) -> Result<G::Element> {
        if !self.is_complete() {
            return Err(Error::IncompleteDecryption {
                missing: self.missing().collect(),
            });
        }
        let dh_element = self
            .partials
            .values()
            .fold(G::identity(), |acc, partial| acc + partial.dh_element);
        Ok(self.ciphertext.blinded_element - dh_element)
    }
}
