//! Configuration for [`PeerRegistry`](crate::PeerRegistry) and
//! [`SelectionRound`](crate::SelectionRound).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::sync::Arc;

use crate::round::{CombinationPolicy, ModularSum};

/// Configuration of a [`PeerRegistry`](crate::PeerRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistryConfig {
    /// Whether a peer must commit to its key share before revealing it. If `false`,
    /// a [`KeyReveal`](crate::registry::KeyReveal) is accepted from a peer without
    /// a commitment (the proof of possession is still checked). Default: `true`.
    ///
    /// Disabling commitments allows a peer that reveals last to choose its share
    /// based on the others' shares; the proof of possession prevents it from cancelling
    /// out their keys, but not from biasing the aggregate key.
    pub require_key_commitment: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            require_key_commitment: true,
        }
    }
}

/// Configuration of a [`SelectionRound`](crate::SelectionRound).
#[derive(Debug, Clone)]
pub struct RoundConfig {
    /// Policy mapping the jointly decrypted sum of peers' contributions to a candidate
    /// index. Default: [`ModularSum`].
    pub policy: Arc<dyn CombinationPolicy>,
    /// Label used to initialize Fiat–Shamir transcripts of the round. Peers and auditors
    /// must use the same label. Default: `b"golle_round"`.
    pub transcript_label: &'static [u8],
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            policy: Arc::new(ModularSum),
            transcript_label: b"golle_round",
        }
    }
}

impl RoundConfig {
    /// Replaces the combination policy.
    #[must_use]
    pub fn with_policy(mut self, policy: impl CombinationPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }
}
