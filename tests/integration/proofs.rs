//! Soundness checks for zero-knowledge proofs.

use merlin::Transcript;
use rand::{rngs::ThreadRng, thread_rng, Rng};

use golle::{
    group::Group,
    proofs::{DisjunctivePep, DisjunctiveSchnorrProof, PlaintextEquivalenceProof, SchnorrProof},
    Ciphertext, Keypair, PublicKey,
};

fn random_scalar_bytes<G: Group>(rng: &mut ThreadRng) -> Vec<u8> {
    let mut bytes = vec![0_u8; G::SCALAR_SIZE];
    G::serialize_scalar(&G::generate_scalar(rng), &mut bytes);
    bytes
}

fn test_forged_schnorr_proofs<G: Group>() {
    let mut rng = thread_rng();
    let keypair = Keypair::<G>::generate(&mut rng);
    for _ in 0..100 {
        let mut bytes = random_scalar_bytes::<G>(&mut rng);
        bytes.extend_from_slice(&random_scalar_bytes::<G>(&mut rng));
        let forged = SchnorrProof::<G>::from_bytes(&bytes).unwrap();
        assert!(forged
            .verify(keypair.public(), &mut Transcript::new(b"test"))
            .is_err());
    }
}

fn test_corrupted_disjunctive_schnorr<G: Group>() {
    let mut rng = thread_rng();
    let keypairs: Vec<_> = (0..4).map(|_| Keypair::<G>::generate(&mut rng)).collect();
    let public_keys: Vec<_> = keypairs.iter().map(|pair| pair.public().clone()).collect();
    let index = rng.gen_range(0..4);
    let proof = DisjunctiveSchnorrProof::new(
        &public_keys,
        index,
        keypairs[index].secret(),
        &mut Transcript::new(b"test"),
        &mut rng,
    );
    proof
        .verify(&public_keys, &mut Transcript::new(b"test"))
        .unwrap();

    // Replace each scalar in turn; the proof must not verify regardless of the real index.
    let bytes = proof.to_bytes();
    for i in 0..bytes.len() / G::SCALAR_SIZE {
        let mut corrupted = bytes.clone();
        corrupted[i * G::SCALAR_SIZE..(i + 1) * G::SCALAR_SIZE]
            .copy_from_slice(&random_scalar_bytes::<G>(&mut rng));
        let corrupted = DisjunctiveSchnorrProof::<G>::from_bytes(&corrupted).unwrap();
        assert!(corrupted
            .verify(&public_keys, &mut Transcript::new(b"test"))
            .is_err());
    }
}

fn test_pep_soundness<G: Group>() {
    let mut rng = thread_rng();
    let receiver = Keypair::<G>::generate(&mut rng);
    let value = G::mul_generator(&G::generate_scalar(&mut rng));
    let a = receiver.public().encrypt_extended(value, &mut rng);
    let b = receiver.public().encrypt_extended(value, &mut rng);
    let proof = PlaintextEquivalenceProof::new(
        receiver.public(),
        &a,
        &b,
        &mut Transcript::new(b"test"),
        &mut rng,
    );
    proof
        .verify(
            receiver.public(),
            &a.ciphertext(),
            &b.ciphertext(),
            &mut Transcript::new(b"test"),
        )
        .unwrap();

    for _ in 0..20 {
        let other_value = G::mul_generator(&G::generate_scalar(&mut rng));
        let c = receiver.public().encrypt_extended(other_value, &mut rng);
        let proof = PlaintextEquivalenceProof::new(
            receiver.public(),
            &a,
            &c,
            &mut Transcript::new(b"test"),
            &mut rng,
        );
        assert!(proof
            .verify(
                receiver.public(),
                &a.ciphertext(),
                &c.ciphertext(),
                &mut Transcript::new(b"test"),
            )
            .is_err());
    }
}

fn test_disjunctive_pep_over_candidates<G: Group>() {
    let mut rng = thread_rng();
    let receiver = Keypair::<G>::generate(&mut rng);
    let candidates: Vec<_> = (0..5)
        .map(|_| G::mul_generator(&G::generate_scalar(&mut rng)))
        .collect();
    let encrypted: Vec<_> = candidates
        .iter()
        .map(|candidate| receiver.public().encrypt_element(*candidate, &mut rng))
        .collect();

    let index = rng.gen_range(0..5);
    let (reencrypted, delta) = receiver.public().reencrypt(encrypted[index], &mut rng);
    let proof = DisjunctivePep::new(
        receiver.public(),
        &reencrypted,
        &encrypted,
        index,
        &delta,
        &mut Transcript::new(b"test"),
        &mut rng,
    );
    assert_eq!(proof.len(), 5);
    proof
        .verify(
            receiver.public(),
            &reencrypted,
            &encrypted,
            &mut Transcript::new(b"test"),
        )
        .unwrap();

    // Proof does not verify for another key or a substituted ciphertext.
    let other_key: PublicKey<G> = Keypair::generate(&mut rng).public().clone();
    assert!(proof
        .verify(
            &other_key,
            &reencrypted,
            &encrypted,
            &mut Transcript::new(b"test"),
        )
        .is_err());
    let outsider = receiver.public().encrypt_element(G::generator(), &mut rng);
    assert!(proof
        .verify(
            receiver.public(),
            &outsider,
            &encrypted,
            &mut Transcript::new(b"test"),
        )
        .is_err());
    let admissible: Vec<_> = candidates
        .iter()
        .map(|candidate| Ciphertext::non_blinded(*candidate))
        .collect();
    assert!(proof
        .verify(
            receiver.public(),
            &reencrypted,
            &admissible,
            &mut Transcript::new(b"test"),
        )
        .is_err());
}

mod curve25519 {
    use super::*;
    use golle::group::Curve25519Subgroup;

    #[test]
    fn forged_schnorr_proofs() {
        test_forged_schnorr_proofs::<Curve25519Subgroup>();
    }

    #[test]
    fn corrupted_disjunctive_schnorr() {
        test_corrupted_disjunctive_schnorr::<Curve25519Subgroup>();
    }

    #[test]
    fn pep_soundness() {
        test_pep_soundness::<Curve25519Subgroup>();
    }

    #[test]
    fn disjunctive_pep_over_candidates() {
        test_disjunctive_pep_over_candidates::<Curve25519Subgroup>();
    }
}

mod ristretto {
    use super::*;
    use golle::group::Ristretto;

    #[test]
    fn forged_schnorr_proofs() {
        test_forged_schnorr_proofs::<Ristretto>();
    }

    #[test]
    fn corrupted_disjunctive_schnorr() {
        test_corrupted_disjunctive_schnorr::<Ristretto>();
    }

    #[test]
    fn pep_soundness() {
        test_pep_soundness::<Ristretto>();
    }

    #[test]
    fn disjunctive_pep_over_candidates() {
        test_disjunctive_pep_over_candidates::<Ristretto>();
    }
}
