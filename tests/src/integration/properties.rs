//! # Protocol Properties
//!
//! Properties that must hold across any run of the register:
//!
//! - **Determinism**: every validator derives the same leader for a term and
//!   the same merkle root for a transaction order
//! - **Quorum**: every ledger docket carries at least the minimum number of
//!   distinct valid signatures
//! - **Gapless sequencing**: committed sequences are 0, 1, 2, ... and each
//!   docket links to its predecessor
//! - **No loss**: an abandoned transaction is retried until it commits, and
//!   commits exactly once
//! - **Leader uniqueness**: no term ever has two validators acting as leader
//! - **Failover**: a silent leader is replaced through heartbeat timeout and
//!   the next leader keeps extending the same chain

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use dc_02_mempool::TxLocation;
    use dc_05_docket_consensus::merkle_root;
    use shared_bus::{ConsensusEvent, LeaderChangeReason};
    use shared_types::{TxId, ValidatorId};
    use std::collections::{BTreeMap, HashSet};
    use std::time::Duration;

    const SETTLE: Duration = Duration::from_millis(500);

    /// Submit one transaction at a time to `leader` and wait for each commit.
    async fn commit_sequentially(cluster: &Cluster, leader: usize, nonces: std::ops::Range<u64>) {
        let mut events = cluster.node(leader).subscribe();
        for nonce in nonces {
            cluster.broadcast(&cluster.publication(nonce));
            let committed = wait_for_event(&mut events, Duration::from_secs(5), is_commit).await;
            assert!(committed.is_some(), "transaction {nonce} never committed");
        }
    }

    // =========================================================================
    // DETERMINISM
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_all_validators_agree_on_rotation() {
        let mut cluster = Cluster::new(5);
        for index in 0..5 {
            cluster.build(index);
        }

        for term in 0..12u64 {
            let expected = validator(term as usize % 5);
            for index in 0..5 {
                let leader = cluster.engine(index).election().expected_leader(REGISTER, term);
                assert_eq!(leader.as_ref(), Some(&expected), "term {term} on v{index}");
            }
        }
    }

    #[test]
    fn test_merkle_root_depends_on_order_only() {
        let ids: Vec<TxId> = (1..=5u8).map(|b| [b; 32]).collect();
        let mut reversed = ids.clone();
        reversed.reverse();

        assert_eq!(merkle_root(&ids), merkle_root(&ids.clone()));
        assert_ne!(merkle_root(&ids), merkle_root(&reversed));
    }

    // =========================================================================
    // QUORUM AND SEQUENCING
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_committed_chain_is_gapless_and_signed_by_quorum() {
        let mut cluster = Cluster::new(5);
        cluster.start_all();
        tokio::time::sleep(SETTLE).await;

        commit_sequentially(&cluster, 0, 1..5).await;

        let dockets = cluster.committed();
        assert_eq!(dockets.len(), 4);
        let mut previous = None;
        let mut seen = HashSet::new();
        for (expected_sequence, docket) in dockets.iter().enumerate() {
            assert_eq!(docket.sequence_number, expected_sequence as u64);
            assert_eq!(docket.previous_docket_id, previous);
            assert_eq!(docket.id, docket.hash());
            let signers = cluster.valid_signers(docket);
            assert!(signers.len() >= cluster.consensus.signature_threshold_min);
            assert!(signers.len() <= cluster.consensus.signature_threshold_max);
            for id in docket.transaction_ids() {
                assert!(seen.insert(id), "transaction committed twice");
            }
            previous = Some(docket.id);
        }

        cluster.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_exposed_after_commit() {
        let mut cluster = Cluster::new(5);
        for index in 0..3 {
            cluster.start(index);
        }
        tokio::time::sleep(SETTLE).await;
        commit_sequentially(&cluster, 0, 1..2).await;

        let exposition = dc_telemetry::encode_metrics().unwrap();
        assert!(exposition.contains("docket_committed_total"));
        assert!(exposition.contains("docket_signature_collection_seconds"));

        cluster.shutdown().await;
    }

    // =========================================================================
    // NO LOSS
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_transactions_commit_once_quorum_returns() {
        let mut cluster = Cluster::new(5);
        cluster.start(0);
        cluster.start(1);
        let mut events = cluster.node(0).subscribe();
        tokio::time::sleep(SETTLE).await;

        let transactions: Vec<_> = (1..=3).map(|nonce| cluster.publication(nonce)).collect();
        for tx in &transactions {
            cluster.submit(0, tx.clone());
        }
        let abandoned = wait_for_event(&mut events, Duration::from_secs(40), is_abandon).await;
        assert!(matches!(
            abandoned,
            Some(ConsensusEvent::DocketAbandoned { requeued: 3, .. })
        ));

        // A third validator comes online; the retried docket now reaches quorum.
        cluster.start(2);
        let committed = wait_for_event(&mut events, Duration::from_secs(70), is_commit).await;
        assert!(committed.is_some(), "retried docket never committed");

        let committed_ids: Vec<TxId> = cluster
            .committed()
            .iter()
            .flat_map(|docket| docket.transaction_ids())
            .collect();
        let unique: HashSet<_> = committed_ids.iter().copied().collect();
        assert_eq!(committed_ids.len(), unique.len());
        for tx in &transactions {
            assert!(unique.contains(&tx.id));
            assert_eq!(cluster.location(0, tx), TxLocation::Committed);
        }

        cluster.shutdown().await;
    }

    // =========================================================================
    // LEADERSHIP
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_leader_per_term() {
        let mut cluster = Cluster::new(5);
        cluster.start_all();
        tokio::time::sleep(SETTLE).await;
        cluster.crash(0);

        let mut claims: BTreeMap<u64, HashSet<ValidatorId>> = BTreeMap::new();
        for _ in 0..50 {
            for index in 0..5 {
                let election = cluster.engine(index).election().clone();
                if election.is_leader(REGISTER) {
                    claims
                        .entry(election.current_term(REGISTER))
                        .or_default()
                        .insert(validator(index));
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        for (term, leaders) in &claims {
            assert_eq!(leaders.len(), 1, "term {term} claimed by {leaders:?}");
        }
        assert!(claims.keys().any(|term| *term > 0), "no failover observed");

        cluster.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failover_after_leader_crash_extends_chain() {
        let mut cluster = Cluster::new(5);
        cluster.start_all();
        tokio::time::sleep(SETTLE).await;
        commit_sequentially(&cluster, 0, 1..2).await;
        let first = cluster.committed()[0].clone();

        let mut follower_events = cluster.node(2).subscribe();
        cluster.crash(0);

        let failover = wait_for_event(&mut follower_events, Duration::from_secs(5), |event| {
            matches!(
                event,
                ConsensusEvent::LeaderChanged {
                    new_leader,
                    term: 1,
                    reason: LeaderChangeReason::HeartbeatTimeout | LeaderChangeReason::HigherTerm,
                    ..
                } if *new_leader == validator(1)
            )
        })
        .await;
        assert!(failover.is_some(), "no leader change after crash");

        let converged = wait_until(Duration::from_secs(2), || {
            (1..5).all(|i| {
                let election = cluster.engine(i).election().clone();
                election.current_term(REGISTER) == 1
                    && election.current_leader(REGISTER) == Some(validator(1))
            })
        })
        .await;
        assert!(converged);

        commit_sequentially(&cluster, 1, 2..3).await;
        let dockets = cluster.committed();
        assert_eq!(dockets.len(), 2);
        let second = &dockets[1];
        assert_eq!(second.sequence_number, 1);
        assert_eq!(second.term, 1);
        assert_eq!(second.initiator_id, validator(1));
        assert_eq!(second.previous_docket_id, Some(first.id));
        assert!(cluster.valid_signers(second).len() >= 3);
        assert!(!cluster.valid_signers(second).contains(&validator(0)));

        cluster.shutdown().await;
    }
}
