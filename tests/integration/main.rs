//! Generic tests independent of the `Group` implementation.

use rand::thread_rng;
use subtle::ConstantTimeEq;
use tracing_subscriber::EnvFilter;

use std::fmt;

use golle::{group::Group, KeyState, LocalPeer, PeerId, PeerRegistry};

mod basic;
#[cfg(feature = "serde")]
mod messages;
mod proofs;
mod registry;
mod round;

pub fn assert_ct_eq<T: ConstantTimeEq + fmt::Debug>(x: &T, y: &T) {
    assert!(
        bool::from(x.ct_eq(y)),
        "Values are not equal: {:?}, {:?}",
        x,
        y
    );
}

/// Installs a `tracing` subscriber writing to the test output. Filtered with `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Peers with a ready registry.
pub struct Rig<G: Group> {
    pub peers: Vec<LocalPeer<G>>,
    pub registry: PeerRegistry<G>,
}

impl<G: Group> Rig<G> {
    pub fn new(peer_count: u64) -> Self {
        let mut rng = thread_rng();
        let peers: Vec<_> = (1..=peer_count)
            .map(|i| LocalPeer::new(PeerId(i), &mut rng))
            .collect();

        let mut registry = PeerRegistry::new();
        for peer in &peers {
            registry.add(peer.id()).unwrap();
            registry.commit(peer.id(), peer.key_commitment()).unwrap();
        }
        for peer in &peers {
            registry.verify(peer.id(), peer.key_reveal(&mut rng)).unwrap();
        }
        assert_eq!(registry.key_state(), KeyState::Ready);

        Self { peers, registry }
    }

    pub fn peer(&self, id: PeerId) -> &LocalPeer<G> {
        self.peers.iter().find(|peer| peer.id() == id).unwrap()
    }
}

/// Generates `count` distinct random candidates.
pub fn random_candidates<G: Group>(count: usize) -> Vec<G::Element> {
    let mut rng = thread_rng();
    (0..count)
        .map(|_| G::mul_generator(&G::generate_scalar(&mut rng)))
        .collect()
}
