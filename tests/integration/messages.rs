//! Tests that protocol messages survive (de)serialization and remain valid.

use rand::thread_rng;
use serde::{de::DeserializeOwned, Serialize};

use crate::{random_candidates, Rig};
use golle::{
    group::Group,
    registry::{KeyCommitment, KeyReveal},
    round::{ContributionReveal, RoundCommitment},
    KeyState, LocalPeer, PartialDecryption, PeerId, PeerRegistry, RegistryConfig, Selection,
    SelectionRound,
};

fn via_json<T: Serialize + DeserializeOwned>(value: &T) -> T {
    let json = serde_json::to_string(value).unwrap();
    serde_json::from_str(&json).unwrap()
}

fn via_bincode<T: Serialize + DeserializeOwned>(value: &T) -> T {
    let bytes = bincode::serialize(value).unwrap();
    bincode::deserialize(&bytes).unwrap()
}

fn test_key_messages<G: Group>(transform: fn(&KeyReveal<G>) -> KeyReveal<G>) {
    let mut rng = thread_rng();
    let peer = LocalPeer::<G>::new(PeerId(7), &mut rng);
    let commitment: KeyCommitment = via_json(&peer.key_commitment());
    assert_eq!(commitment, peer.key_commitment());
    let reveal = transform(&peer.key_reveal(&mut rng));
    assert_eq!(reveal.public_key(), peer.public_key());

    let mut registry = PeerRegistry::new();
    registry.add(peer.id()).unwrap();
    registry.commit(peer.id(), commitment).unwrap();
    assert_eq!(
        registry.verify(peer.id(), reveal).unwrap(),
        KeyState::Ready
    );
}

fn test_round_messages<G: Group>() {
    let mut rng = thread_rng();
    let rig = Rig::<G>::new(2);
    let mut round = SelectionRound::new(&rig.registry);
    let context = round
        .begin(&random_candidates::<G>(3), &mut rng)
        .unwrap()
        .clone();

    let contributions: Vec<_> = rig
        .peers
        .iter()
        .map(|peer| peer.contribute(&context, &mut rng))
        .collect();
    for (peer, (commitment, _)) in rig.peers.iter().zip(&contributions) {
        let commitment: RoundCommitment = via_bincode(commitment);
        round.commit(peer.id(), via_json(&commitment)).unwrap();
    }
    for (peer, (_, pending)) in rig.peers.iter().zip(&contributions) {
        let reveal: ContributionReveal<G> = via_json(&pending.reveal(&mut rng));
        round.verify(peer.id(), &via_bincode(&reveal)).unwrap();
    }

    let sum = round.combined_ciphertext().unwrap();
    for peer in &rig.peers {
        let partial: PartialDecryption<G> = via_json(&peer.partial_decrypt(&context, sum, &mut rng));
        round.submit_partial(peer.id(), &via_bincode(&partial)).unwrap();
    }

    let selection = round.round_end(&mut rng).unwrap();
    let encrypted_candidates = via_json(&round.encrypted_candidates().unwrap());
    let contributions = via_bincode(&round.contributions().unwrap());
    let restored: Selection<G> = via_json(&selection);
    assert_eq!(restored.index(), selection.index());
    assert_eq!(restored.partial_decryptions().len(), 2);
    restored
        .verify(&context, &encrypted_candidates, &contributions)
        .unwrap();
    let restored: Selection<G> = via_bincode(&selection);
    restored
        .verify(&context, &encrypted_candidates, &contributions)
        .unwrap();
}

#[test]
fn json_uses_base64_strings() {
    let mut rng = thread_rng();
    let peer = LocalPeer::<golle::group::Ristretto>::new(PeerId(1), &mut rng);
    let json = serde_json::to_value(peer.key_reveal(&mut rng)).unwrap();
    let public_key = json["public_key"].as_str().unwrap();
    assert_eq!(public_key.len(), 43); // 32 bytes in base64url without padding
    assert!(json["opening"].is_string());

    let config: RegistryConfig = serde_json::from_str("{}").unwrap();
    assert!(config.require_key_commitment);
}

#[test]
fn truncated_messages_are_rejected() {
    let mut rng = thread_rng();
    let peer = LocalPeer::<golle::group::Ristretto>::new(PeerId(1), &mut rng);
    let mut json = serde_json::to_value(peer.key_reveal(&mut rng)).unwrap();
    json["public_key"] = "AAAA".into();
    assert!(serde_json::from_value::<KeyReveal<golle::group::Ristretto>>(json).is_err());
}

mod curve25519 {
    use super::*;
    use golle::group::Curve25519Subgroup;

    #[test]
    fn key_messages_json() {
        test_key_messages::<Curve25519Subgroup>(via_json);
    }

    #[test]
    fn key_messages_bincode() {
        test_key_messages::<Curve25519Subgroup>(via_bincode);
    }

    #[test]
    fn round_messages() {
        test_round_messages::<Curve25519Subgroup>();
    }
}

mod ristretto {
    use super::*;
    use golle::group::Ristretto;

    #[test]
    fn key_messages_json() {
        test_key_messages::<Ristretto>(via_json);
    }

    #[test]
    fn key_messages_bincode() {
        test_key_messages::<Ristretto>(via_bincode);
    }

    #[test]
    fn round_messages() {
        test_round_messages::<Ristretto>();
    }
}
