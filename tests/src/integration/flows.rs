//! # Docket Flows
//!
//! End-to-end paths of a docket through a five validator register
//! (thresholds 3 of 5, 30 second timeout):
//!
//! 1. **Commit**: two confirmers online, the leader reaches three
//!    signatures and the ledger holds the docket at once
//! 2. **Timeout**: one confirmer online, the docket is abandoned after
//!    30 seconds and never reaches the ledger
//! 3. **Dead letter**: a transaction with a broken chain is dropped from
//!    the docket while the valid ones commit
//! 4. **Forged id**: a transaction whose id does not match its content is
//!    refused at intake and never holds back the register

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use dc_02_mempool::{MempoolError, TxLocation};
    use dc_05_docket_consensus::{AbandonReason, DocketOutcome};
    use shared_bus::ConsensusEvent;
    use shared_types::TimeSource;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Long enough for every validator to initialize its election and see
    /// a few heartbeats.
    const SETTLE: Duration = Duration::from_millis(500);

    // =========================================================================
    // COMMIT
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_commits_immediately_with_two_confirmers() {
        let mut cluster = Cluster::new(5);
        for index in 0..3 {
            cluster.start(index);
        }
        let mut events = cluster.node(0).subscribe();
        tokio::time::sleep(SETTLE).await;

        let tx = cluster.publication(1);
        cluster.submit(0, tx.clone());
        let submitted = Instant::now();
        let committed = wait_for_event(&mut events, Duration::from_secs(5), is_commit).await;
        assert!(committed.is_some(), "docket never committed");
        assert!(submitted.elapsed() < Duration::from_secs(1));

        let dockets = cluster.committed();
        assert_eq!(dockets.len(), 1);
        let docket = &dockets[0];
        assert_eq!(docket.sequence_number, 0);
        assert_eq!(docket.previous_docket_id, None);
        assert_eq!(docket.initiator_id, validator(0));
        assert_eq!(docket.transaction_ids(), vec![tx.id]);
        assert_eq!(cluster.valid_signers(docket).len(), 3);
        assert!(docket.consensus_metadata.completed_at.is_some());
        assert_eq!(cluster.location(0, &tx), TxLocation::Committed);

        // Confirmers adopt the commit notification.
        let followed = wait_until(Duration::from_secs(1), || {
            (1..3).all(|i| {
                cluster
                    .engine(i)
                    .tip(REGISTER)
                    .is_some_and(|tip| tip.next_sequence() == 1)
            })
        })
        .await;
        assert!(followed);

        cluster.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmers_drop_committed_transactions_from_their_mempools() {
        let mut cluster = Cluster::new(5);
        for index in 0..3 {
            cluster.start(index);
        }
        let mut events = cluster.node(0).subscribe();
        tokio::time::sleep(SETTLE).await;

        let tx = cluster.publication(1);
        cluster.broadcast(&tx);
        assert!(wait_for_event(&mut events, Duration::from_secs(5), is_commit)
            .await
            .is_some());

        let cleared = wait_until(Duration::from_secs(1), || {
            (1..3).all(|i| cluster.location(i, &tx) == TxLocation::Committed)
        })
        .await;
        assert!(cleared);
        assert_eq!(cluster.committed().len(), 1);

        cluster.shutdown().await;
    }

    // =========================================================================
    // TIMEOUT
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_after_timeout_with_one_confirmer() {
        let mut cluster = Cluster::new(5);
        cluster.start(0);
        cluster.start(1);
        let mut events = cluster.node(0).subscribe();
        tokio::time::sleep(SETTLE).await;

        let tx = cluster.publication(1);
        cluster.submit(0, tx.clone());
        let submitted = Instant::now();
        let abandoned = wait_for_event(&mut events, Duration::from_secs(40), is_abandon).await;

        let Some(ConsensusEvent::DocketAbandoned {
            sequence_number,
            reason,
            requeued,
            ..
        }) = abandoned
        else {
            panic!("docket was not abandoned");
        };
        assert!(submitted.elapsed() >= Duration::from_secs(30));
        assert_eq!(sequence_number, 0);
        assert_eq!(reason, AbandonReason::Timeout.to_string());
        assert_eq!(requeued, 1);
        assert_eq!(cluster.ledger.submissions(), 0);
        assert!(cluster.committed().is_empty());
        assert!(matches!(
            cluster.location(0, &tx),
            TxLocation::Pending | TxLocation::InFlight { .. }
        ));

        cluster.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_docket_records_completion() {
        let mut cluster = Cluster::new(5);
        cluster.start_inbound(0);
        cluster.start_inbound(1);
        let leader = cluster.engine(0);
        leader
            .election()
            .initialize(REGISTER, cluster.clock.now())
            .await
            .unwrap();

        let tx = cluster.publication(1);
        cluster.submit(0, tx.clone());
        let outcome = leader.run_build_cycle(REGISTER).await.unwrap();

        let DocketOutcome::Abandoned { docket, reason } = outcome else {
            panic!("expected abandonment, got {outcome:?}");
        };
        assert_eq!(reason, AbandonReason::Timeout);
        let metadata = &docket.consensus_metadata;
        assert_eq!(metadata.signatures_collected, 2);
        assert_eq!(metadata.threshold_required, 3);
        assert_eq!(metadata.timeout_ms, 30_000);
        let completed_at = metadata.completed_at.expect("completion time recorded");
        assert!(completed_at - docket.created_at >= 30_000);
        assert_eq!(cluster.ledger.submissions(), 0);
        assert_eq!(cluster.location(0, &tx), TxLocation::Pending);

        cluster.shutdown().await;
    }

    // =========================================================================
    // DEAD LETTER
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_broken_chain_transaction_dead_lettered() {
        let mut cluster = Cluster::new(5);
        for index in 0..3 {
            cluster.start(index);
        }
        let mut events = cluster.node(0).subscribe();
        tokio::time::sleep(SETTLE).await;

        let broken = cluster.broken_chain_action(1);
        let valid = cluster.publication(2);
        cluster.submit(0, broken.clone());
        cluster.submit(0, valid.clone());

        let mut dead_lettered = false;
        let committed = wait_for_event(&mut events, Duration::from_secs(5), |event| {
            if matches!(
                event,
                ConsensusEvent::TransactionDeadLettered { tx_id, .. } if *tx_id == broken.id
            ) {
                dead_lettered = true;
            }
            is_commit(event)
        })
        .await;
        assert!(committed.is_some());
        assert!(dead_lettered);

        let dockets = cluster.committed();
        assert_eq!(dockets.len(), 1);
        assert_eq!(dockets[0].transaction_ids(), vec![valid.id]);
        assert_eq!(cluster.location(0, &broken), TxLocation::DeadLetter);
        assert_eq!(cluster.location(0, &valid), TxLocation::Committed);
        assert!(!cluster.ledger.contains_transaction(&broken.id));

        cluster.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_forged_id_refused_while_valid_commits() {
        let mut cluster = Cluster::new(5);
        for index in 0..3 {
            cluster.start(index);
        }
        let mut events = cluster.node(0).subscribe();
        tokio::time::sleep(SETTLE).await;

        let mut forged = cluster.publication(1);
        forged.id = [7u8; 32];
        for node in cluster.running() {
            assert_eq!(
                node.engine.mempool().enqueue(forged.clone(), 0),
                Err(MempoolError::IdMismatch([7u8; 32]))
            );
        }

        let valid = cluster.publication(2);
        cluster.broadcast(&valid);
        assert!(wait_for_event(&mut events, Duration::from_secs(5), is_commit)
            .await
            .is_some());
        let dockets = cluster.committed();
        assert_eq!(dockets.len(), 1);
        assert_eq!(dockets[0].transaction_ids(), vec![valid.id]);

        cluster.shutdown().await;
    }
}
