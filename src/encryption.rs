//! `Ciphertext` and closely related types.

use rand_core::{CryptoRng, RngCore};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use core::{fmt, marker::PhantomData, ops};
use std::collections::HashMap;

#[cfg(feature = "serde")]
use crate::serde::ElementHelper;
use crate::{group::Group, PublicKey, SecretKey};

/// Ciphertext for ElGamal encryption over a prime-order group.
///
/// A ciphertext consists of 2 group elements: the random element `R = [r]G` and the blinded
/// plaintext `B = M + [r]K`, where `K` is the receiver's public key. Ciphertexts are additively
/// homomorphic: adding two ciphertexts yields an encryption of the sum of plaintexts under
/// the sum of randomness, and multiplying by a scalar scales both.
///
/// In the selection protocol, `K` is the aggregate key of all peers, so decryption requires
/// a [`PartialDecryption`](crate::PartialDecryption) from every peer.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = ""))]
pub struct Ciphertext<G: Group> {
    #[cfg_attr(feature = "serde", serde(with = "ElementHelper::<G>"))]
    pub(crate) random_element: G::Element,
    #[cfg_attr(feature = "serde", serde(with = "ElementHelper::<G>"))]
    pub(crate) blinded_element: G::Element,
}

impl<G: Group> fmt::Debug for Ciphertext<G> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Ciphertext")
            .field("random_element", &self.random_element)
            .field("blinded_element", &self.blinded_element)
            .finish()
    }
}

impl<G: Group> PartialEq for Ciphertext<G> {
    fn eq(&self, other: &Self) -> bool {
        bool::from(
            self.random_element.ct_eq(&other.random_element)
                & self.blinded_element.ct_eq(&other.blinded_element),
        )
    }
}

impl<G: Group> Ciphertext<G> {
    /// Represents encryption of zero value without the blinding factor.
    pub fn zero() -> Self {
        Self {
            random_element: G::identity(),
            blinded_element: G::identity(),
        }
    }

    /// Creates a non-blinded encryption of the specified group element. Such ciphertexts
    /// are public knowledge; they are useful as reference points in plaintext
    /// equivalence proofs.
    pub fn non_blinded(element: G::Element) -> Self {
        Self {
            random_element: G::identity(),
            blinded_element: element,
        }
    }

    /// Returns a reference to the random element.
    pub fn random_element(&self) -> &G::Element {
        &self.random_element
    }

    /// Returns a reference to the blinded element.
    pub fn blinded_element(&self) -> &G::Element {
        &self.blinded_element
    }

    /// Serializes this ciphertext as two group elements (the random element,
    /// then the blinded value).
    pub fn to_bytes(self) -> Vec<u8> {
        let mut bytes = vec![0_u8; 2 * G::ELEMENT_SIZE];
        G::serialize_element(&self.random_element, &mut bytes[..G::ELEMENT_SIZE]);
        G::serialize_element(&self.blinded_element, &mut bytes[G::ELEMENT_SIZE..]);
        bytes
    }

    /// Deserializes a ciphertext from bytes produced by [`Self::to_bytes()`]. Returns `None`
    /// if the bytes do not encode two valid group elements.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 2 * G::ELEMENT_SIZE {
            return None;
        }
        let random_element = G::deserialize_element(&bytes[..G::ELEMENT_SIZE])?;
        let blinded_element = G::deserialize_element(&bytes[G::ELEMENT_SIZE..])?;
        Some(Self {
            random_element,
            blinded_element,
        })
    }
}

impl<G: Group> ops::Add for Ciphertext<G> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            random_element: self.random_element + rhs.random_element,
            blinded_element: self.blinded_element + rhs.blinded_element,
        }
    }
}

impl<G: Group> ops::AddAssign for Ciphertext<G> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<G: Group> ops::Sub for Ciphertext<G> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            random_element: self.random_element - rhs.random_element,
            blinded_element: self.blinded_element - rhs.blinded_element,
        }
    }
}

impl<G: Group> ops::Neg for Ciphertext<G> {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            random_element: -self.random_element,
            blinded_element: -self.blinded_element,
        }
    }
}

impl<G: Group> ops::Mul<&G::Scalar> for Ciphertext<G> {
    type Output = Self;

    fn mul(self, rhs: &G::Scalar) -> Self {
        Self {
            random_element: self.random_element * rhs,
            blinded_element: self.blinded_element * rhs,
        }
    }
}

impl<G: Group> ops::Mul<u64> for Ciphertext<G> {
    type Output = Self;

    fn mul(self, rhs: u64) -> Self {
        let scalar = G::Scalar::from(rhs);
        self * &scalar
    }
}

/// Lookup table for discrete logarithms.
///
/// For [`Ciphertext`]s to be partially homomorphic, the encrypted values must be
/// group scalars linearly mapped to group elements: `x -> [x]G`, where `G` is the group
/// generator. After decryption it is necessary to map the decrypted group element back to a scalar
/// (i.e., get its discrete logarithm with base `G`). Because of discrete logarithm assumption,
/// this task is computationally infeasible in the general case; however, if the possible range
/// of encrypted values is small, it is possible to "cheat" by precomputing mapping `[x]G -> x`
/// for all allowed `x` ahead of time. This is exactly what `DiscreteLogTable` does.
///
/// The selection protocol decrypts the sum of peers' index contributions, which lies
/// in `0..=peers * (candidates - 1)`; the table is built for exactly that range.
#[derive(Debug, Clone)]
pub struct DiscreteLogTable<G: Group> {
    inner: HashMap<[u8; 8], u64>,
    _t: PhantomData<G>,
}

impl<G: Group> DiscreteLogTable<G> {
    /// Creates a lookup table for the specified `values`.
    pub fn new(values: impl IntoIterator<Item = u64>) -> Self {
        let lookup_table = values
            .into_iter()
            .filter(|&value| value != 0)
            .map(|i| {
                let element = G::vartime_mul_generator(&G::Scalar::from(i));
                let mut bytes = vec![0_u8; G::ELEMENT_SIZE];
                G::serialize_element(&element, &mut bytes);
                let mut initial_bytes = [0_u8; 8];
                initial_bytes.copy_from_slice(&bytes[..8]);
                (initial_bytes, i)
            })
            .collect();

        Self {
            inner: lookup_table,
            _t: PhantomData,
        }
    }

    /// Gets the discrete log of `decrypted_element`, or `None` if it is not present among `values`
    /// stored in this table.
    pub fn get(&self, decrypted_element: &G::Element) -> Option<u64> {
        if G::is_identity(decrypted_element) {
            // The identity element may have a special serialization (e.g., in SEC standard),
            // so we check it separately.
            Some(0)
        } else {
            let mut bytes = vec![0_u8; G::ELEMENT_SIZE];
            G::serialize_element(decrypted_element, &mut bytes);
            let mut initial_bytes = [0_u8; 8];
            initial_bytes.copy_from_slice(&bytes[..8]);
            self.inner.get(&initial_bytes).copied()
        }
    }
}

/// [`Ciphertext`] together with the random scalar used to create it. Knowledge of the scalar
/// is what allows to prove statements about the ciphertext, such as plaintext equivalence.
#[derive(Debug, Clone)]
pub struct ExtendedCiphertext<G: Group> {
    pub(crate) inner: Ciphertext<G>,
    pub(crate) random_scalar: SecretKey<G>,
}

impl<G: Group> ExtendedCiphertext<G> {
    /// Creates an encryption of `value` for the specified `receiver`.
    pub fn new<R: CryptoRng + RngCore>(
        value: G::Element,
        receiver: &PublicKey<G>,
        rng: &mut R,
    ) -> Self {
        let random_scalar = SecretKey::<G>::generate(rng);
        Self::with_randomness(value, receiver, random_scalar)
    }

    pub(crate) fn with_randomness(
        value: G::Element,
        receiver: &PublicKey<G>,
        random_scalar: SecretKey<G>,
    ) -> Self {
        let random_element = G::mul_generator(random_scalar.expose_scalar());
        let dh_element = receiver.as_element() * random_scalar.expose_scalar();
        let blinded_element = value + dh_element;

        Self {
            inner: Ciphertext {
                random_element,
                blinded_element,
            },
            random_scalar,
        }
    }

    /// Returns the wrapped ciphertext.
    pub fn ciphertext(&self) -> Ciphertext<G> {
        self.inner
    }

    /// Returns the random scalar used to create the ciphertext.
    pub fn randomness(&self) -> &SecretKey<G> {
        &self.random_scalar
    }

    /// Splits this encryption into the ciphertext and the random scalar.
    pub fn into_parts(self) -> (Ciphertext<G>, SecretKey<G>) {
        (self.inner, self.random_scalar)
    }
}

impl<G: Group> From<ExtendedCiphertext<G>> for Ciphertext<G> {
    fn from(extended: ExtendedCiphertext<G>) -> Self {
        extended.inner
    }
}
