//! OR-composition of sigma protocols (Cramer–Damgård–Schoenmakers).
//!
//! A [`DisjunctionProof`] shows that the prover knows a witness for *one of* several
//! [`SigmaStatement`]s. The prover runs the real protocol for the statement it knows
//! a witness for and simulates the others; the verifier treats all branches identically.
//! Proof generation is not constant-time w.r.t. the index of the real branch.

use merlin::Transcript;
use rand_core::{CryptoRng, RngCore};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use core::fmt;

#[cfg(feature = "serde")]
use crate::serde::{ScalarHelper, VecHelper};
use crate::{
    group::Group,
    proofs::{TranscriptForGroup, VerificationError},
    SecretKey,
};

/// Statement of a sigma protocol in which every base is raised to the same secret scalar.
pub(crate) trait SigmaStatement<G: Group> {
    /// Absorbs public parameters of the statement.
    fn append_to(&self, transcript: &mut Transcript);

    /// Absorbs commitments for a real protocol run, i.e., `[w]B` for every base `B`.
    fn append_commitments(&self, random_scalar: &G::Scalar, transcript: &mut Transcript);

    /// Absorbs commitments restored from a challenge and response, i.e., `[s]B - [c]P`
    /// for every base `B` and the corresponding power `P`.
    fn append_restored_commitments(
        &self,
        challenge: &G::Scalar,
        response: &G::Scalar,
        transcript: &mut Transcript,
    );
}

/// Knowledge of `x` such that `power = [x]base`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dlog<G: Group> {
    pub base: G::Element,
    pub power: G::Element,
}

impl<G: Group> SigmaStatement<G> for Dlog<G> {
    fn append_to(&self, transcript: &mut Transcript) {
        transcript.append_element::<G>(b"B", &self.base);
        transcript.append_element::<G>(b"P", &self.power);
    }

    fn append_commitments(&self, random_scalar: &G::Scalar, transcript: &mut Transcript) {
        transcript.append_element::<G>(b"T", &(self.base * random_scalar));
    }

    fn append_restored_commitments(
        &self,
        challenge: &G::Scalar,
        response: &G::Scalar,
        transcript: &mut Transcript,
    ) {
        let commitment = G::vartime_multi_mul([response, &-*challenge], [self.base, self.power]);
        transcript.append_element::<G>(b"T", &commitment);
    }
}

/// Knowledge of `x` such that `powers.0 = [x]G` and `powers.1 = [x]K`, where `G`
/// is the group generator.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DlogEquality<G: Group> {
    pub log_base: G::Element,
    pub powers: (G::Element, G::Element),
}

impl<G: Group> SigmaStatement<G> for DlogEquality<G> {
    fn append_to(&self, transcript: &mut Transcript) {
        transcript.append_element::<G>(b"K", &self.log_base);
        transcript.append_element::<G>(b"[x]G", &self.powers.0);
        transcript.append_element::<G>(b"[x]K", &self.powers.1);
    }

    fn append_commitments(&self, random_scalar: &G::Scalar, transcript: &mut Transcript) {
        transcript.append_element::<G>(b"T_G", &G::mul_generator(random_scalar));
        transcript.append_element::<G>(b"T_K", &(self.log_base * random_scalar));
    }

    fn append_restored_commitments(
        &self,
        challenge: &G::Scalar,
        response: &G::Scalar,
        transcript: &mut Transcript,
    ) {
        let neg_challenge = -*challenge;
        let commitment_g = G::vartime_double_mul_generator(&neg_challenge, self.powers.0, response);
        let commitment_k =
            G::vartime_multi_mul([response, &neg_challenge], [self.log_base, self.powers.1]);
        transcript.append_element::<G>(b"T_G", &commitment_g);
        transcript.append_element::<G>(b"T_K", &commitment_k);
    }
}

/// Prover-side state of a single branch.
enum Branch<G: Group> {
    /// Branch for which the prover knows the witness.
    Real { random_scalar: SecretKey<G> },
    /// Branch with a challenge and response chosen upfront.
    Simulated {
        challenge: G::Scalar,
        response: G::Scalar,
    },
}

/// Proof that the prover knows a witness for one of the statements. Consists of
/// a challenge and a response per statement; the challenges sum up to the Fiat–Shamir
/// challenge of the entire transcript.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = ""))]
pub(crate) struct DisjunctionProof<G: Group> {
    #[cfg_attr(feature = "serde", serde(with = "VecHelper::<ScalarHelper<G>, 1>"))]
    challenges: Vec<G::Scalar>,
    #[cfg_attr(feature = "serde", serde(with = "VecHelper::<ScalarHelper<G>, 1>"))]
    responses: Vec<G::Scalar>,
}

impl<G: Group> fmt::Debug for DisjunctionProof<G> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DisjunctionProof")
            .field("challenges", &self.challenges)
            .field("responses", &self.responses)
            .finish()
    }
}

impl<G: Group> DisjunctionProof<G> {
    /// # Panics
    ///
    /// Panics if `statements` is empty or `real_index` is out of bounds.
    pub fn new<S, R>(
        statements: &[S],
        real_index: usize,
        secret: &SecretKey<G>,
        transcript: &mut Transcript,
        rng: &mut R,
    ) -> Self
    where
        S: SigmaStatement<G>,
        R: CryptoRng + RngCore,
    {
        assert!(!statements.is_empty(), "no statements supplied");
        assert!(
            real_index < statements.len(),
            "real index {real_index} is out of bounds"
        );

        Self::append_statements(statements, transcript);
        let branches: Vec<_> = statements
            .iter()
            .enumerate()
            .map(|(i, statement)| {
                let branch = if i == real_index {
                    Branch::Real {
                        random_scalar: SecretKey::generate(rng),
                    }
                } else {
                    Branch::Simulated {
                        challenge: G::generate_scalar(rng),
                        response: G::generate_scalar(rng),
                    }
                };
                match &branch {
                    Branch::Real { random_scalar } => {
                        statement.append_commitments(random_scalar.expose_scalar(), transcript);
                    }
                    Branch::Simulated {
                        challenge,
                        response,
                    } => {
                        statement.append_restored_commitments(challenge, response, transcript);
                    }
                }
                branch
            })
            .collect();

        let total_challenge = transcript.challenge_scalar::<G>(b"c");
        let simulated_sum = branches
            .iter()
            .fold(G::Scalar::from(0_u64), |acc, branch| match branch {
                Branch::Real { .. } => acc,
                Branch::Simulated { challenge, .. } => acc + challenge,
            });
        let real_challenge = total_challenge - simulated_sum;

        let (challenges, responses) = branches
            .into_iter()
            .map(|branch| match branch {
                Branch::Real { random_scalar } => {
                    let response = random_scalar + secret * &real_challenge;
                    (real_challenge, *response.expose_scalar())
                }
                Branch::Simulated {
                    challenge,
                    response,
                } => (challenge, response),
            })
            .unzip();

        Self {
            challenges,
            responses,
        }
    }

    fn append_statements<S: SigmaStatement<G>>(statements: &[S], transcript: &mut Transcript) {
        transcript.append_u64(b"n", statements.len() as u64);
        for statement in statements {
            statement.append_to(transcript);
        }
    }

    pub fn verify<S: SigmaStatement<G>>(
        &self,
        statements: &[S],
        transcript: &mut Transcript,
    ) -> Result<(), VerificationError> {
        VerificationError::check_lengths("challenges", statements.len(), self.challenges.len())?;
        VerificationError::check_lengths("responses", statements.len(), self.responses.len())?;

        Self::append_statements(statements, transcript);
        let mut challenge_sum = G::Scalar::from(0_u64);
        let branches = statements.iter().zip(&self.challenges).zip(&self.responses);
        for ((statement, challenge), response) in branches {
            statement.append_restored_commitments(challenge, response, transcript);
            challenge_sum += *challenge;
        }

        let expected_challenge = transcript.challenge_scalar::<G>(b"c");
        if expected_challenge == challenge_sum {
            Ok(())
        } else {
            Err(VerificationError::ChallengeMismatch)
        }
    }

    pub fn branch_count(&self) -> usize {
        self.challenges.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0_u8; 2 * self.branch_count() * G::SCALAR_SIZE];
        let scalars = self.challenges.iter().chain(&self.responses);
        for (chunk, scalar) in bytes.chunks_exact_mut(G::SCALAR_SIZE).zip(scalars) {
            G::serialize_scalar(scalar, chunk);
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let pair_size = 2 * G::SCALAR_SIZE;
        if bytes.is_empty() || bytes.len() % pair_size != 0 {
            return None;
        }
        let len = bytes.len() / pair_size;
        let scalars = bytes
            .chunks_exact(G::SCALAR_SIZE)
            .map(G::deserialize_scalar)
            .collect::<Option<Vec<_>>>()?;
        let (challenges, responses) = scalars.split_at(len);
        Some(Self {
            challenges: challenges.to_vec(),
            responses: responses.to_vec(),
        })
    }

    #[cfg(test)]
    pub(crate) fn corrupt_response(&mut self, index: usize) {
        self.responses[index] += G::Scalar::from(1_u64);
    }

    #[cfg(test)]
    pub(crate) fn corrupt_challenge(&mut self, index: usize) {
        self.challenges[index] += G::Scalar::from(1_u64);
    }
}
