//! Basic tests: encryption, commitments and threshold decryption.

use merlin::Transcript;
use rand::{thread_rng, Rng};

use crate::assert_ct_eq;
use golle::{
    commitment, group::Group, DecryptionCollector, DiscreteLogTable, Keypair, PartialDecryption,
    PeerId, PublicKey,
};

fn test_encryption_roundtrip<G: Group>() {
    let mut rng = thread_rng();
    let keypair = Keypair::<G>::generate(&mut rng);
    let message = 12_345_u64;
    let ciphertext = keypair.public().encrypt(message, &mut rng);
    let decryption = keypair.secret().decrypt_to_element(ciphertext);
    let message = G::mul_generator(&G::Scalar::from(message));
    assert_ct_eq(&decryption, &message);
}

fn test_reencryption_preserves_plaintext<G: Group>() {
    let mut rng = thread_rng();
    let keypair = Keypair::<G>::generate(&mut rng);
    let element = G::mul_generator(&G::generate_scalar(&mut rng));
    let ciphertext = keypair.public().encrypt_element(element, &mut rng);

    let (reencrypted, _) = keypair.public().reencrypt(ciphertext, &mut rng);
    assert_ne!(reencrypted, ciphertext);
    assert_ct_eq(&keypair.secret().decrypt_to_element(reencrypted), &element);
}

fn test_aggregate_key_decryption<G: Group>() {
    let mut rng = thread_rng();
    let shares: Vec<_> = (0..5).map(|_| Keypair::<G>::generate(&mut rng)).collect();
    let key = PublicKey::aggregate(shares.iter().map(Keypair::public)).unwrap();

    let values: Vec<u64> = (0..5).map(|_| rng.gen_range(0..10)).collect();
    let sum = values
        .iter()
        .map(|&value| key.encrypt(value, &mut rng))
        .reduce(|acc, ciphertext| acc + ciphertext)
        .unwrap();

    let mut collector = DecryptionCollector::new(
        sum,
        shares
            .iter()
            .enumerate()
            .map(|(i, share)| (PeerId(i as u64), share.public().clone())),
    );
    // Submission order is irrelevant.
    for (i, share) in shares.iter().enumerate().rev() {
        let partial =
            PartialDecryption::new(sum, share, &mut Transcript::new(b"test"), &mut rng);
        collector
            .insert(PeerId(i as u64), &partial, &mut Transcript::new(b"test"))
            .unwrap();
    }

    let table = DiscreteLogTable::<G>::new(0..50);
    let decrypted = table.get(&collector.combine().unwrap());
    assert_eq!(decrypted, Some(values.iter().sum()));
}

#[test]
fn commitments_are_binding() {
    let mut rng = thread_rng();
    for _ in 0..100 {
        let len = rng.gen_range(0..100);
        let mut value = vec![0_u8; len];
        rng.fill(value.as_mut_slice());

        let (commitment, opening) = commitment::create(&value, &mut rng);
        assert!(commitment::verify(&commitment, &value, &opening));

        let mut other_value = value.clone();
        if other_value.is_empty() {
            other_value.push(rng.gen());
        } else {
            let pos = rng.gen_range(0..other_value.len());
            other_value[pos] ^= 1 << rng.gen_range(0..8);
        }
        assert!(!commitment::verify(&commitment, &other_value, &opening));

        let (_, other_opening) = commitment::create(&value, &mut rng);
        assert!(!commitment::verify(&commitment, &value, &other_opening));
    }
}

mod curve25519 {
    use super::*;
    use golle::group::Curve25519Subgroup;

    #[test]
    fn encryption_roundtrip() {
        test_encryption_roundtrip::<Curve25519Subgroup>();
    }

    #[test]
    fn reencryption_preserves_plaintext() {
        test_reencryption_preserves_plaintext::<Curve25519Subgroup>();
    }

    #[test]
    fn aggregate_key_decryption() {
        test_aggregate_key_decryption::<Curve25519Subgroup>();
    }
}

mod ristretto {
    use super::*;
    use golle::group::Ristretto;

    #[test]
    fn encryption_roundtrip() {
        test_encryption_roundtrip::<Ristretto>();
    }

    #[test]
    fn reencryption_preserves_plaintext() {
        test_reencryption_preserves_plaintext::<Ristretto>();
    }

    #[test]
    fn aggregate_key_decryption() {
        test_aggregate_key_decryption::<Ristretto>();
    }
}
