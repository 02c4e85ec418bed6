//! End-to-end tests for selection rounds.

use merlin::Transcript;
use rand::thread_rng;

use crate::{init_tracing, random_candidates, Rig};
use golle::{
    group::Group,
    proofs::DisjunctivePep,
    round::{AbortReason, ContributionReveal, Phase, RoundContext},
    Ciphertext, Error, PendingContribution, PeerId, RoundConfig, SelectionError, SelectionRound,
};

/// Runs the commit and reveal phases for all peers of `rig`.
fn commit_and_reveal<G: Group>(
    rig: &Rig<G>,
    round: &mut SelectionRound<'_, G>,
    context: &RoundContext<G>,
) -> Vec<PendingContribution<G>> {
    let mut rng = thread_rng();
    let contributions: Vec<_> = rig
        .peers
        .iter()
        .map(|peer| peer.contribute(context, &mut rng))
        .collect();

    for (peer, (commitment, _)) in rig.peers.iter().zip(&contributions) {
        round.commit(peer.id(), *commitment).unwrap();
    }
    assert_eq!(round.phase(), Phase::Encrypted);

    for (i, (peer, (_, pending))) in rig.peers.iter().zip(&contributions).enumerate() {
        let phase = round.verify(peer.id(), &pending.reveal(&mut rng)).unwrap();
        let expected_phase = if i + 1 == rig.peers.len() {
            Phase::Decrypting
        } else {
            Phase::Proving
        };
        assert_eq!(phase, expected_phase);
    }

    contributions
        .into_iter()
        .map(|(_, pending)| pending)
        .collect()
}

fn test_end_to_end_selection<G: Group>() {
    init_tracing();
    let mut rng = thread_rng();
    let rig = Rig::<G>::new(3);
    assert_eq!(rig.registry.size(), 3);
    let candidates = random_candidates::<G>(3);

    let mut round = SelectionRound::new(&rig.registry);
    assert_eq!(round.phase(), Phase::NotStarted);
    let context = round.begin(&candidates, &mut rng).unwrap().clone();
    assert_eq!(round.phase(), Phase::Committing);
    assert_eq!(context.candidate_count(), 3);
    assert_eq!(context.candidates(), candidates.as_slice());
    assert_eq!(context.peer_count(), 3);
    assert_eq!(context.key(), rig.registry.aggregate_key().unwrap());
    assert!(round.contributions().is_none());

    let pending = commit_and_reveal(&rig, &mut round, &context);
    assert!(round.missing_reveals().is_empty());
    for peer in &rig.peers {
        let commitment = round.get_commitment(peer.id()).unwrap();
        assert_eq!(commitment.round(), context.id());
    }

    let sum = round.combined_ciphertext().unwrap();
    for peer in &rig.peers {
        assert!(round.missing_partials().contains(&peer.id()));
        let partial = peer.partial_decrypt(&context, sum, &mut rng);
        assert_eq!(
            round.submit_partial(peer.id(), &partial).unwrap(),
            Phase::Decrypting
        );
    }
    assert!(round.missing_partials().is_empty());

    let selection = round.round_end(&mut rng).unwrap();
    assert_eq!(round.phase(), Phase::Complete);
    assert!(candidates.contains(&selection.candidate()));
    assert_eq!(candidates[selection.index()], selection.candidate());

    // The decrypted sum matches disclosed contributions.
    let disclosures: Vec<_> = pending.iter().map(PendingContribution::disclosure).collect();
    let expected_sum: u64 = disclosures.iter().map(|disclosure| disclosure.value).sum();
    assert_eq!(selection.sum(), expected_sum);
    assert_eq!(selection.index(), (expected_sum % 3) as usize);
    for (peer, disclosure) in rig.peers.iter().zip(&disclosures) {
        round
            .verify_contribution_reveal(peer.id(), disclosure)
            .unwrap();
    }

    // Any peer can check the selection against the published contributions
    // and encrypted candidates.
    let encrypted_candidates = round.encrypted_candidates().unwrap();
    let contributions = round.contributions().unwrap();
    assert_eq!(contributions.len(), 3);
    selection
        .verify(&context, &encrypted_candidates, &contributions)
        .unwrap();
    assert!(selection
        .verify(&context, &encrypted_candidates[..2], &contributions)
        .is_err());
    let mut swapped = encrypted_candidates.clone();
    swapped.swap(0, 1);
    swapped.swap(1, 2);
    assert!(selection
        .verify(&context, &swapped, &contributions)
        .is_err());
    for (peer, partial) in selection.partial_decryptions() {
        context.verify_partial(*peer, sum, partial).unwrap();
    }

    // A selection restored from another round does not verify.
    let mut other_round = SelectionRound::new(&rig.registry);
    let other_context = other_round.begin(&candidates, &mut rng).unwrap().clone();
    let err = selection
        .verify(&other_context, &encrypted_candidates, &contributions)
        .unwrap_err();
    assert!(matches!(err, SelectionError::Decryption { .. }));

    // Membership in the original candidate set via a standalone disjunctive PEP.
    let key = context.key();
    let encrypted = key.encrypt_extended(selection.candidate(), &mut rng);
    let references: Vec<_> = candidates
        .iter()
        .map(|candidate| Ciphertext::non_blinded(*candidate))
        .collect();
    let proof = DisjunctivePep::new(
        key,
        &encrypted.ciphertext(),
        &references,
        selection.index(),
        encrypted.randomness(),
        &mut Transcript::new(b"membership"),
        &mut rng,
    );
    proof
        .verify(
            key,
            &encrypted.ciphertext(),
            &references,
            &mut Transcript::new(b"membership"),
        )
        .unwrap();

    // Complete rounds are immutable.
    assert!(matches!(
        round.round_end(&mut rng).unwrap_err(),
        Error::OutOfPhase {
            actual: Phase::Complete,
            ..
        }
    ));
    assert!(round.abort().is_err());
    assert_eq!(round.selection().unwrap().index(), selection.index());
}

fn test_commitment_mismatch_aborts_round<G: Group>() {
    init_tracing();
    let mut rng = thread_rng();
    let rig = Rig::<G>::new(3);
    let mut round = SelectionRound::new(&rig.registry);
    let context = round
        .begin(&random_candidates::<G>(4), &mut rng)
        .unwrap()
        .clone();

    let contributions: Vec<_> = rig
        .peers
        .iter()
        .map(|peer| peer.contribute(&context, &mut rng))
        .collect();
    for (peer, (commitment, _)) in rig.peers.iter().zip(&contributions) {
        round.commit(peer.id(), *commitment).unwrap();
    }
    round
        .verify(rig.peers[0].id(), &contributions[0].1.reveal(&mut rng))
        .unwrap();

    // Peer #2 reveals the contribution of peer #3.
    let offender = rig.peers[1].id();
    let err = round
        .verify(offender, &contributions[2].1.reveal(&mut rng))
        .unwrap_err();
    assert_eq!(err, Error::CommitmentMismatch { peer: offender });
    assert_eq!(err.peer(), Some(offender));
    assert_eq!(round.phase(), Phase::Aborted);
    assert_eq!(round.abort_reason(), Some(&AbortReason::Failure(err)));

    // No decryption step is reached.
    assert!(round.combined_ciphertext().is_none());
    assert!(round.missing_partials().is_empty());
    let sum = contributions[0].1.ciphertext();
    let partial = rig.peers[0].partial_decrypt(&context, sum, &mut rng);
    assert_eq!(
        round.submit_partial(rig.peers[0].id(), &partial).unwrap_err(),
        Error::OutOfPhase {
            operation: "submit_partial",
            actual: Phase::Aborted,
        }
    );
    // Registry is unaffected.
    assert!(rig.registry.aggregate_key().is_ok());
}

fn test_invalid_range_proof_aborts_round<G: Group>() {
    let mut rng = thread_rng();
    let rig = Rig::<G>::new(2);
    let mut round = SelectionRound::new(&rig.registry);
    let context = round
        .begin(&random_candidates::<G>(2), &mut rng)
        .unwrap()
        .clone();

    // Peer #1 contributes as if there were more candidates, trying to bias the outcome.
    let cheater = &rig.peers[0];
    let inflated_context = RoundContext::new(
        context.id(),
        context.key_shares().map(|(peer, key)| (peer, key.clone())),
        random_candidates::<G>(10),
        &RoundConfig::default(),
    )
    .unwrap();
    assert_eq!(inflated_context.key(), context.key());
    let (cheater_commitment, cheater_pending) = cheater.contribute(&inflated_context, &mut rng);
    let honest = &rig.peers[1];
    let (honest_commitment, honest_pending) = honest.contribute(&context, &mut rng);
    round.commit(cheater.id(), cheater_commitment).unwrap();
    round.commit(honest.id(), honest_commitment).unwrap();
    round
        .verify(honest.id(), &honest_pending.reveal(&mut rng))
        .unwrap();

    let reveal: ContributionReveal<G> = cheater_pending.reveal(&mut rng);
    let err = round.verify(cheater.id(), &reveal).unwrap_err();
    assert!(matches!(err, Error::ProofInvalid { peer, .. } if peer == cheater.id()));
    assert_eq!(round.phase(), Phase::Aborted);
}

fn test_invalid_partial_decryption_aborts_round<G: Group>() {
    let mut rng = thread_rng();
    let rig = Rig::<G>::new(3);
    let mut round = SelectionRound::new(&rig.registry);
    let context = round
        .begin(&random_candidates::<G>(5), &mut rng)
        .unwrap()
        .clone();
    commit_and_reveal(&rig, &mut round, &context);
    let sum = round.combined_ciphertext().unwrap();

    let partial = rig.peers[0].partial_decrypt(&context, sum, &mut rng);
    round.submit_partial(rig.peers[0].id(), &partial).unwrap();
    // Resubmission is rejected without aborting the round.
    assert_eq!(
        round.submit_partial(rig.peers[0].id(), &partial).unwrap_err(),
        Error::DuplicateSubmission {
            peer: rig.peers[0].id()
        }
    );
    assert_eq!(
        round.submit_partial(PeerId(100), &partial).unwrap_err(),
        Error::NotFound(PeerId(100))
    );
    assert_eq!(round.phase(), Phase::Decrypting);

    // Peer #2 replays the partial decryption of peer #1.
    let err = round
        .submit_partial(rig.peers[1].id(), &partial)
        .unwrap_err();
    assert!(matches!(err, Error::ProofInvalid { peer, .. } if peer == rig.peers[1].id()));
    assert_eq!(round.phase(), Phase::Aborted);
}

fn test_incomplete_decryption_aborts_round<G: Group>() {
    let mut rng = thread_rng();
    let rig = Rig::<G>::new(3);
    let mut round = SelectionRound::new(&rig.registry);
    let context = round
        .begin(&random_candidates::<G>(3), &mut rng)
        .unwrap()
        .clone();
    commit_and_reveal(&rig, &mut round, &context);
    let sum = round.combined_ciphertext().unwrap();

    for peer in &rig.peers[..2] {
        let partial = peer.partial_decrypt(&context, sum, &mut rng);
        round.submit_partial(peer.id(), &partial).unwrap();
    }
    let missing_peer = rig.peers[2].id();
    assert_eq!(round.missing_partials(), [missing_peer]);

    let err = round.round_end(&mut rng).unwrap_err();
    assert_eq!(
        err,
        Error::IncompleteDecryption {
            missing: vec![missing_peer],
        }
    );
    assert_eq!(round.phase(), Phase::Aborted);
    assert!(round.selection().is_none());
}

fn test_stale_commitment_is_rejected<G: Group>() {
    let mut rng = thread_rng();
    let rig = Rig::<G>::new(2);
    let candidates = random_candidates::<G>(3);

    let mut first_round = SelectionRound::new(&rig.registry);
    let first_context = first_round.begin(&candidates, &mut rng).unwrap().clone();
    first_round.abort().unwrap();
    assert_eq!(first_round.abort_reason(), Some(&AbortReason::Requested));

    let mut round = SelectionRound::new(&rig.registry);
    let context = round.begin(&candidates, &mut rng).unwrap().clone();
    assert_ne!(context.id(), first_context.id());

    let peer = rig.peer(PeerId(1));
    let (stale_commitment, _) = peer.contribute(&first_context, &mut rng);
    let err = round.commit(peer.id(), stale_commitment).unwrap_err();
    assert_eq!(err, Error::StaleCommitment { peer: peer.id() });
    assert_eq!(round.phase(), Phase::Committing);
    assert_eq!(round.missing_commitments().len(), 2);

    // The round proceeds normally afterwards.
    commit_and_reveal(&rig, &mut round, &context);
    let sum = round.combined_ciphertext().unwrap();
    for peer in &rig.peers {
        let partial = peer.partial_decrypt(&context, sum, &mut rng);
        round.submit_partial(peer.id(), &partial).unwrap();
    }
    round.round_end(&mut rng).unwrap();
}

fn test_all_candidates_are_reachable<G: Group>() {
    let mut rng = thread_rng();
    let rig = Rig::<G>::new(1);
    let candidates = random_candidates::<G>(2);
    let mut selected = [false; 2];

    for _ in 0..40 {
        let mut round = SelectionRound::new(&rig.registry);
        let context = round.begin(&candidates, &mut rng).unwrap().clone();
        commit_and_reveal(&rig, &mut round, &context);
        let sum = round.combined_ciphertext().unwrap();
        let partial = rig.peers[0].partial_decrypt(&context, sum, &mut rng);
        round.submit_partial(rig.peers[0].id(), &partial).unwrap();
        selected[round.round_end(&mut rng).unwrap().index()] = true;
    }
    assert_eq!(selected, [true; 2]);
}

mod curve25519 {
    use super::*;
    use golle::group::Curve25519Subgroup;

    #[test]
    fn end_to_end_selection() {
        test_end_to_end_selection::<Curve25519Subgroup>();
    }

    #[test]
    fn commitment_mismatch_aborts_round() {
        test_commitment_mismatch_aborts_round::<Curve25519Subgroup>();
    }

    #[test]
    fn invalid_range_proof_aborts_round() {
        test_invalid_range_proof_aborts_round::<Curve25519Subgroup>();
    }

    #[test]
    fn invalid_partial_decryption_aborts_round() {
        test_invalid_partial_decryption_aborts_round::<Curve25519Subgroup>();
    }

    #[test]
    fn incomplete_decryption_aborts_round() {
        test_incomplete_decryption_aborts_round::<Curve25519Subgroup>();
    }

    #[test]
    fn stale_commitment_is_rejected() {
        test_stale_commitment_is_rejected::<Curve25519Subgroup>();
    }
}

mod ristretto {
    use super::*;
    use golle::group::Ristretto;

    #[test]
    fn end_to_end_selection() {
        test_end_to_end_selection::<Ristretto>();
    }

    #[test]
    fn commitment_mismatch_aborts_round() {
        test_commitment_mismatch_aborts_round::<Ristretto>();
    }

    #[test]
    fn invalid_range_proof_aborts_round() {
        test_invalid_range_proof_aborts_round::<Ristretto>();
    }

    #[test]
    fn invalid_partial_decryption_aborts_round() {
        test_invalid_partial_decryption_aborts_round::<Ristretto>();
    }

    #[test]
    fn incomplete_decryption_aborts_round() {
        test_incomplete_decryption_aborts_round::<Ristretto>();
    }

    #[test]
    fn stale_commitment_is_rejected() {
        test_stale_commitment_is_rejected::<Ristretto>();
    }

    #[test]
    fn all_candidates_are_reachable() {
        test_all_candidates_are_reachable::<Ristretto>();
    }
}
