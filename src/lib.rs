//! Verifiable distributed selection of a random candidate among mutually distrusting peers,
//! based on the protocol by Golle et al. and [ElGamal encryption] with pluggable
//! crypto backend.
//!
//! # ⚠ Warnings
//!
//! While the logic in this crate relies on standard cryptographic assumptions
//! (complexity of discrete log and computational / decisional Diffie–Hellman problems
//! in certain groups), it has not been independently verified for correctness or absence
//! of side-channel attack vectors. **Use at your own risk.**
//!
//! The crate defines message contents and the order in which they are validated;
//! delivering messages between peers and authenticating their senders
//! is the responsibility of the caller.
//!
//! # Overview
//!
//! - [`PeerRegistry`] tracks peers and aggregates their public key shares into
//!   a joint ElGamal key. Shares are distributed commit-then-reveal, with
//!   a proof of possession for each share.
//! - [`SelectionRound`] runs a single selection: peers commit to encrypted random
//!   contributions, reveal them with range proofs, and jointly decrypt their sum
//!   with [`PartialDecryption`]s from *every* peer. The outcome is a [`Selection`]
//!   that anyone can verify against the published contributions and encrypted candidates.
//! - [`LocalPeer`] holds the secret key share of a peer and produces its messages.
//! - [`proofs`] module contains the zero-knowledge proofs used by the protocol:
//!   (disjunctive) Schnorr proofs of knowledge, proofs of discrete log equality, and
//!   (disjunctive) plaintext equivalence proofs for ElGamal ciphertexts.
//! - [`commitment`] module provides hash commitments.
//!
//! # Backends
//!
//! [`group`] module exposes a generic framework for plugging a [`Group`]
//! implementation into crypto primitives. It provides [`Ristretto`] and [`Curve25519Subgroup`]
//! implementations based on Curve25519.
//!
//! # Crate features
//!
//! ## `curve25519-dalek`
//!
//! *(on by default)*
//!
//! Implements [`Group`] for two prime groups based on Curve25519 using the [`curve25519-dalek`]
//! crate: its prime subgroup, and the Ristretto transform of Curve25519 (aka ristretto255).
//!
//! ## `serde`
//!
//! *(off by default)*
//!
//! Enables [`Serialize`](::serde::Serialize) / [`Deserialize`](::serde::Deserialize)
//! implementations for protocol messages, proofs and configuration.
//! Group scalars, elements, commitments and wrapper key types are serialized to human-readable
//! formats (JSON, YAML, TOML, etc.) as strings that represent corresponding byte buffers using
//! base64-url encoding without padding. For binary formats, byte buffers are serialized directly.
//!
//! Deserialized messages are untrusted; they are validated by the registry or round
//! they are submitted to.
//!
//! # Logging
//!
//! The crate emits [`tracing`] events: `debug` for accepted messages, `info` for round phase
//! transitions, and `warn` for rejected contributions and aborted rounds. No secrets
//! are logged.
//!
//! # Examples
//!
//! See [`SelectionRound`] for an end-to-end example.
//!
//! [ElGamal encryption]: https://en.wikipedia.org/wiki/ElGamal_encryption
//! [`Group`]: group::Group
//! [`Ristretto`]: group::Ristretto
//! [`Curve25519Subgroup`]: group::Curve25519Subgroup
//! [`curve25519-dalek`]: https://docs.rs/curve25519-dalek/
//! [`tracing`]: https://docs.rs/tracing/

// Documentation settings.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc(html_root_url = "https://docs.rs/golle/0.1.0")]
// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::doc_markdown,
    clippy::cast_possible_truncation
)]

pub mod commitment;
mod config;
mod encryption;
mod error;
pub mod group;
mod keys;
mod participant;
pub mod proofs;
pub mod registry;
pub mod round;
#[cfg(feature = "serde")]
mod serde;
mod threshold;

pub use crate::{
    config::{RegistryConfig, RoundConfig},
    encryption::{Ciphertext, DiscreteLogTable, ExtendedCiphertext},
    error::{Error, Result},
    keys::{Keypair, PublicKey, PublicKeyConversionError, SecretKey},
    participant::{LocalPeer, PendingContribution},
    proofs::VerificationError,
    registry::{KeyState, PeerId, PeerRegistry},
    round::{RoundId, Selection, SelectionError, SelectionRound},
    threshold::{DecryptionCollector, PartialDecryption},
};
