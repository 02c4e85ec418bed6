//! [`SchnorrProof`] and related logic.

use merlin::Transcript;
use rand_core::{CryptoRng, RngCore};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "serde")]
use crate::serde::ScalarHelper;
use crate::{
    group::Group,
    proofs::{TranscriptForGroup, VerificationError},
    Keypair, PublicKey, SecretKey,
};

/// Schnorr identification: zero-knowledge proof of knowledge of the discrete log `x`
/// of a public value `K = [x]G`.
///
/// Peers attach this proof to their revealed key share, which rules out rogue-key attacks
/// on the aggregate key: a peer cannot publish a share derived from other peers' shares
/// without knowing its discrete log.
///
/// # Construction
///
/// The prover picks a random scalar `w` and computes `T = [w]G`. The challenge `c` is derived
/// from the transcript after absorbing `K` and `T`; the response is `s = w + cx`.
/// The verifier restores `T = [s]G - [c]K` and checks that it leads to the same challenge.
/// The proof is serialized as 2 scalars `(c, s)`.
///
/// Proof generation is constant-time. Verification is **not** constant-time.
///
/// # Examples
///
/// ```
/// # use golle::{group::Ristretto, proofs::SchnorrProof, Keypair};
/// # use merlin::Transcript;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut rng = rand::thread_rng();
/// let keypair = Keypair::<Ristretto>::generate(&mut rng);
/// let proof = SchnorrProof::new(&keypair, &mut Transcript::new(b"identify"), &mut rng);
/// proof.verify(keypair.public(), &mut Transcript::new(b"identify"))?;
///
/// // The proof is tied to its context.
/// assert!(proof
///     .verify(keypair.public(), &mut Transcript::new(b"other"))
///     .is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = ""))]
pub struct SchnorrProof<G: Group> {
    #[cfg_attr(feature = "serde", serde(with = "ScalarHelper::<G>"))]
    challenge: G::Scalar,
    #[cfg_attr(feature = "serde", serde(with = "ScalarHelper::<G>"))]
    response: G::Scalar,
}

impl<G: Group> SchnorrProof<G> {
    /// Proves possession of the secret key in `keypair`.
    pub fn new<R: CryptoRng + RngCore>(
        keypair: &Keypair<G>,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Self {
        Self::from_keys(keypair.secret(), keypair.public(), transcript, rng)
    }

    /// Proves knowledge of `secret` as the discrete log of `public`. It is **not** checked
    /// whether the keys match; if they do not, the proof will not verify.
    pub fn from_keys<R: CryptoRng + RngCore>(
        secret: &SecretKey<G>,
        public: &PublicKey<G>,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Self {
        transcript.start_proof(b"schnorr");
        transcript.append_element_bytes(b"K", public.as_bytes());

        let mut randomness = SecretKey::<G>::generate(rng);
        transcript.append_element::<G>(b"T", &G::mul_generator(randomness.expose_scalar()));
        let challenge = transcript.challenge_scalar::<G>(b"c");
        randomness += secret * &challenge;

        Self {
            challenge,
            response: *randomness.expose_scalar(),
        }
    }

    /// Verifies this proof against the provided `public` key.
    ///
    /// # Errors
    ///
    /// Returns an error if this proof does not verify.
    pub fn verify(
        &self,
        public: &PublicKey<G>,
        transcript: &mut Transcript,
    ) -> Result<(), VerificationError> {
        let commitment =
            G::vartime_double_mul_generator(&-self.challenge, public.as_element(), &self.response);

        transcript.start_proof(b"schnorr");
        transcript.append_element_bytes(b"K", public.as_bytes());
        transcript.append_element::<G>(b"T", &commitment);
        let expected_challenge = transcript.challenge_scalar::<G>(b"c");

        if expected_challenge == self.challenge {
            Ok(())
        } else {
            Err(VerificationError::ChallengeMismatch)
        }
    }

    /// Serializes this proof as `(c, s)`.
    pub fn to_bytes(self) -> Vec<u8> {
        let mut bytes = vec![0_u8; 2 * G::SCALAR_SIZE];
        G::serialize_scalar(&self.challenge, &mut bytes[..G::SCALAR_SIZE]);
        G::serialize_scalar(&self.response, &mut bytes[G::SCALAR_SIZE..]);
        bytes
    }

    /// Parses a proof from `bytes`. Returns `None` if `bytes` are malformed.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 2 * G::SCALAR_SIZE {
            return None;
        }
        Some(Self {
            challenge: G::deserialize_scalar(&bytes[..G::SCALAR_SIZE])?,
            response: G::deserialize_scalar(&bytes[G::SCALAR_SIZE..])?,
        })
    }
}
