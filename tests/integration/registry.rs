//! Tests for key distribution among peers.

use rand::{seq::SliceRandom, thread_rng};

use crate::assert_ct_eq;
use golle::{
    group::Group,
    registry::{ContributionError, KeyContribution},
    Error, KeyState, LocalPeer, PeerId, PeerRegistry, PublicKey,
};

fn test_key_distribution<G: Group>() {
    let mut rng = thread_rng();
    let peers: Vec<_> = (1..=3)
        .map(|i| LocalPeer::<G>::new(PeerId(i), &mut rng))
        .collect();
    let mut registry = PeerRegistry::new();
    for peer in &peers {
        registry.add(peer.id()).unwrap();
    }
    assert_eq!(registry.size(), 3);

    // Peers walk through `Empty -> Incomplete -> Ready` one after another.
    for (i, peer) in peers.iter().enumerate() {
        let state = registry
            .set_key_contribution(peer.id(), KeyContribution::Empty)
            .unwrap();
        assert_eq!(state, KeyState::Empty);
        let state = registry
            .set_key_contribution(peer.id(), KeyContribution::Commitment(peer.key_commitment()))
            .unwrap();
        assert_eq!(state, KeyState::Incomplete);
        assert_eq!(registry.aggregate_key().unwrap_err(), Error::KeyNotReady);

        let state = registry
            .set_key_contribution(peer.id(), KeyContribution::Reveal(peer.key_reveal(&mut rng)))
            .unwrap();
        assert_eq!(state, KeyState::Ready);
        assert_eq!(registry.aggregate_key().is_ok(), i == 2);
    }

    let aggregate_key = registry.aggregate_key().unwrap();
    let expected_element = peers
        .iter()
        .map(|peer| peer.public_key().as_element())
        .fold(G::identity(), |acc, element| acc + element);
    assert_ct_eq(&aggregate_key.as_element(), &expected_element);
    for peer in &peers {
        assert_eq!(registry.get_key(peer.id()).unwrap(), Some(peer.public_key()));
    }
}

fn test_reveal_order_is_irrelevant<G: Group>() {
    let mut rng = thread_rng();
    let mut peers: Vec<_> = (1..=5)
        .map(|i| LocalPeer::<G>::new(PeerId(i), &mut rng))
        .collect();
    let expected_key = PublicKey::aggregate(peers.iter().map(LocalPeer::public_key)).unwrap();

    let mut registry = PeerRegistry::new();
    for peer in &peers {
        registry.add(peer.id()).unwrap();
        registry.commit(peer.id(), peer.key_commitment()).unwrap();
    }
    peers.shuffle(&mut rng);
    for peer in &peers {
        registry.verify(peer.id(), peer.key_reveal(&mut rng)).unwrap();
    }
    assert_eq!(*registry.aggregate_key().unwrap(), expected_key);
}

fn test_tampered_reveal_is_rejected<G: Group>() {
    let mut rng = thread_rng();
    let peer = LocalPeer::<G>::new(PeerId(1), &mut rng);
    let impostor = LocalPeer::<G>::new(PeerId(1), &mut rng);
    let mut registry = PeerRegistry::new();
    registry.add(peer.id()).unwrap();
    registry.commit(peer.id(), peer.key_commitment()).unwrap();

    // Same peer ID, but another key share: the commitment does not open.
    let err = registry
        .verify(peer.id(), impostor.key_reveal(&mut rng))
        .unwrap_err();
    assert_eq!(
        err,
        Error::InvalidContribution {
            peer: peer.id(),
            reason: ContributionError::OpeningMismatch,
        }
    );
    assert_eq!(err.peer(), Some(peer.id()));
    assert_eq!(registry.get_state(peer.id()).unwrap(), KeyState::Incomplete);
    assert!(!registry
        .check_key(peer.id(), impostor.public_key())
        .unwrap());

    registry.verify(peer.id(), peer.key_reveal(&mut rng)).unwrap();
    assert!(registry.check_key(peer.id(), peer.public_key()).unwrap());
    assert!(!registry
        .check_key(peer.id(), impostor.public_key())
        .unwrap());
}

#[test]
fn removing_peers_recomputes_key() {
    let mut rng = thread_rng();
    let peers: Vec<_> = (1..=4)
        .map(|i| LocalPeer::<golle::group::Ristretto>::new(PeerId(i), &mut rng))
        .collect();
    let mut registry = PeerRegistry::new();
    assert_eq!(registry.key_state(), KeyState::Empty);
    for peer in &peers {
        registry.add(peer.id()).unwrap();
        registry.commit(peer.id(), peer.key_commitment()).unwrap();
        registry.verify(peer.id(), peer.key_reveal(&mut rng)).unwrap();
    }

    let removed = registry.remove(PeerId(2)).unwrap();
    assert_eq!(removed.state(), KeyState::Ready);
    assert_eq!(registry.size(), 3);
    let expected_key = PublicKey::aggregate(
        peers
            .iter()
            .filter(|peer| peer.id() != PeerId(2))
            .map(LocalPeer::public_key),
    )
    .unwrap();
    assert_eq!(*registry.aggregate_key().unwrap(), expected_key);

    for peer in &peers {
        if peer.id() != PeerId(2) {
            registry.remove(peer.id()).unwrap();
        }
    }
    assert!(registry.is_empty());
    assert_eq!(registry.key_state(), KeyState::Empty);
    assert_eq!(registry.aggregate_key().unwrap_err(), Error::KeyNotReady);
}

mod curve25519 {
    use super::*;
    use golle::group::Curve25519Subgroup;

    #[test]
    fn key_distribution() {
        test_key_distribution::<Curve25519Subgroup>();
    }

    #[test]
    fn reveal_order_is_irrelevant() {
        test_reveal_order_is_irrelevant::<Curve25519Subgroup>();
    }

    #[test]
    fn tampered_reveal_is_rejected() {
        test_tampered_reveal_is_rejected::<Curve25519Subgroup>();
    }
}

mod ristretto {
    use super::*;
    use golle::group::Ristretto;

    #[test]
    fn key_distribution() {
        test_key_distribution::<Ristretto>();
    }

    #[test]
    fn reveal_order_is_irrelevant() {
        test_reveal_order_is_irrelevant::<Ristretto>();
    }

    #[test]
    fn tampered_reveal_is_rejected() {
        test_tampered_reveal_is_rejected::<Ristretto>();
    }
}
