//! Encryption and decryption operations on public / secret keys.

use rand_core::{CryptoRng, RngCore};

use crate::{
    encryption::ExtendedCiphertext, group::Group, Ciphertext, DiscreteLogTable, PublicKey,
    SecretKey,
};

impl<G: Group> PublicKey<G> {
    /// Encrypts a small integer value for this key. The value is mapped to the group element
    /// `[value]G`; use [`DiscreteLogTable`] to recover it after decryption.
    pub fn encrypt<T, R: CryptoRng + RngCore>(&self, value: T, rng: &mut R) -> Ciphertext<G>
    where
        G::Scalar: From<T>,
    {
        let scalar = G::Scalar::from(value);
        let element = G::mul_generator(&scalar);
        ExtendedCiphertext::new(element, self, rng).inner
    }

    /// Encrypts a group element for this key. Each call uses fresh randomness, so encrypting
    /// the same element twice produces unrelated ciphertexts.
    pub fn encrypt_element<R: CryptoRng + RngCore>(
        &self,
        value: G::Element,
        rng: &mut R,
    ) -> Ciphertext<G> {
        ExtendedCiphertext::new(value, self, rng).inner
    }

    /// Encrypts a group element for this key and retains the random scalar used for encryption.
    pub fn encrypt_extended<R: CryptoRng + RngCore>(
        &self,
        value: G::Element,
        rng: &mut R,
    ) -> ExtendedCiphertext<G> {
        ExtendedCiphertext::new(value, self, rng)
    }

    /// Re-randomizes `ciphertext` by adding a fresh encryption of zero. Returns the new
    /// ciphertext together with the added random scalar; the plaintext is unchanged.
    pub fn reencrypt<R: CryptoRng + RngCore>(
        &self,
        ciphertext: Ciphertext<G>,
        rng: &mut R,
    ) -> (Ciphertext<G>, SecretKey<G>) {
        let zero = ExtendedCiphertext::new(G::identity(), self, rng);
        (ciphertext + zero.inner, zero.random_scalar)
    }

    /// Checks that `ciphertext` is an encryption of `value` with the specified randomness.
    /// This is how a disclosed contribution is audited after the fact.
    pub fn is_encryption_of(
        &self,
        ciphertext: &Ciphertext<G>,
        value: G::Element,
        randomness: &SecretKey<G>,
    ) -> bool {
        let expected = ExtendedCiphertext::with_randomness(value, self, randomness.clone());
        expected.inner == *ciphertext
    }
}

impl<G: Group> SecretKey<G> {
    /// Decrypts the provided ciphertext and returns the produced group element.
    ///
    /// As the ciphertext does not include a MAC or another way to assert integrity,
    /// this operation cannot fail. If the ciphertext is not produced properly (e.g., it targets
    /// another receiver), the returned group element will be garbage.
    pub fn decrypt_to_element(&self, encrypted: Ciphertext<G>) -> G::Element {
        let dh_element = encrypted.random_element * self.expose_scalar();
        encrypted.blinded_element - dh_element
    }

    /// Decrypts the provided ciphertext and returns the original encrypted value.
    ///
    /// `lookup_table` is used to find encrypted values based on the original decrypted
    /// group element. That is, it must contain all valid plaintext values. If the value
    /// is not in the table, this method will return `None`.
    pub fn decrypt(
        &self,
        encrypted: Ciphertext<G>,
        lookup_table: &DiscreteLogTable<G>,
    ) -> Option<u64> {
        lookup_table.get(&self.decrypt_to_element(encrypted))
    }
}
