//! # Send / Approve / Discard Flows
//!
//! Drives `Transactor::send_transaction` end to end against the registry,
//! the key store and a scripted upstream node.
//!
//! ## Flows Tested:
//!
//! 1. **Concurrent sends**: one address, many callers, consecutive nonces
//! 2. **Retry after a wrong password**: the blocked caller still gets its hash
//! 3. **Discard**: a blocked caller is released with `Discarded`
//! 4. **Cancellation**: the caller's context aborts the in-flight broadcast
//! 5. **Failed broadcast**: the nonce is reused by the next send
//! 6. **External signing**: a device-signed transaction shares the nonce
//!    sequence with approved ones

#[cfg(test)]
mod tests {
    use crate::integration::{Harness, ScriptedUpstream, CHAIN_ID, PASSWORD};
    use qc_01_sign_requests::{Request, SignError};
    use qc_02_transactor::{contract_address, CallContext, SendTxArgs, TransactorConfig};
    use shared_bus::{EventFilter, EventSubscriber, EventTopic};
    use shared_types::{Address, Hash, RequestId, U256};
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn transfer(from: Address) -> SendTxArgs {
        SendTxArgs::transfer(from, Address::new([0x42; 20]), U256::from(10_000u64))
    }

    /// Start a blocking `send_transaction` in the background.
    fn spawn_send(
        harness: &Harness,
        ctx: CallContext,
        args: SendTxArgs,
    ) -> JoinHandle<Result<Hash, SignError>> {
        let transactor = Arc::clone(&harness.transactor);
        tokio::spawn(async move { transactor.send_transaction(ctx, args).await })
    }

    /// Wait until the registry holds a request.
    async fn next_request(harness: &Harness) -> Request {
        timeout(Duration::from_secs(5), async {
            loop {
                if let Some(request) = harness.transactor.pending().first() {
                    return request;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("request was never queued")
    }

    // =============================================================================
    // FLOW 1: Concurrent sends from one address
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_get_consecutive_nonces() {
        const SENDERS: u64 = 8;
        let harness = Harness::new();
        harness.upstream.pending_nonce.store(5, Ordering::SeqCst);
        harness.upstream.estimate.store(21_000, Ordering::SeqCst);

        let mut enqueued = harness
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::Enqueued]));

        let senders: Vec<_> = (0..SENDERS)
            .map(|_| spawn_send(&harness, CallContext::background(), transfer(harness.from)))
            .collect();

        let mut ids: Vec<RequestId> = Vec::new();
        while ids.len() < SENDERS as usize {
            let event = timeout(Duration::from_secs(5), enqueued.recv())
                .await
                .expect("enqueued event")
                .expect("bus open");
            ids.push(event.request_id());
        }

        let results = harness.transactor.approve_transactions(&ids, PASSWORD).await;
        assert_eq!(results.len(), ids.len());
        assert!(results.values().all(Result::is_ok));

        let mut hashes = HashSet::new();
        for sender in senders {
            let hash = sender.await.unwrap().unwrap();
            assert!(hashes.insert(hash), "duplicate transaction hash");
        }

        assert_eq!(harness.upstream.sent_nonces(), (5..5 + SENDERS).collect::<Vec<_>>());
        assert_eq!(
            harness.transactor.local_nonce(harness.from).await,
            Some(5 + SENDERS)
        );
        assert_eq!(harness.transactor.pending().count(), 0);
    }

    // =============================================================================
    // FLOW 2: Gas and payload handling
    // =============================================================================

    #[tokio::test]
    async fn test_preset_gas_skips_estimation() {
        let harness = Harness::new();
        let args = SendTxArgs {
            gas: Some(50_000),
            gas_price: Some(U256::from(7u64)),
            ..transfer(harness.from)
        };

        let sender = spawn_send(&harness, CallContext::background(), args);
        let request = next_request(&harness).await;
        harness.transactor.approve(request.id, PASSWORD).await.unwrap();
        sender.await.unwrap().unwrap();

        assert_eq!(harness.upstream.gas_price_calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.upstream.estimate_calls.load(Ordering::SeqCst), 0);
        let tx = &harness.upstream.sent()[0];
        assert_eq!(tx.gas_limit, 50_000);
        assert_eq!(tx.gas_price, U256::from(7u64));
    }

    #[tokio::test]
    async fn test_contract_creation() {
        let harness = Harness::new();
        harness.upstream.pending_nonce.store(3, Ordering::SeqCst);
        harness.upstream.estimate.store(250_000, Ordering::SeqCst);

        let code = vec![0x60, 0x80, 0x60, 0x40, 0x52];
        let sender = spawn_send(
            &harness,
            CallContext::background(),
            SendTxArgs::deploy(harness.from, code.clone()),
        );
        let request = next_request(&harness).await;
        assert_eq!(request.method, "eth_sendTransaction");
        assert!(request.meta.get("to").is_none());

        harness.transactor.approve(request.id, PASSWORD).await.unwrap();
        let hash = sender.await.unwrap().unwrap();

        let tx = harness.upstream.sent()[0].clone();
        assert_eq!(tx.hash, hash);
        assert_eq!(tx.to, None);
        assert_eq!(tx.input, code);
        assert_eq!(tx.gas_limit, 250_000);
        assert_eq!(tx.chain_id(), Some(CHAIN_ID));
        assert_eq!(tx.sender().unwrap(), harness.from);
        assert_eq!(
            tx.contract_address(harness.from),
            Some(contract_address(harness.from, 3))
        );
    }

    // =============================================================================
    // FLOW 3: Approval retries and discard
    // =============================================================================

    #[tokio::test]
    async fn test_wrong_password_then_right_password() {
        let harness = Harness::new();
        let sender = spawn_send(&harness, CallContext::background(), transfer(harness.from));
        let request = next_request(&harness).await;

        assert_eq!(
            harness.transactor.approve(request.id, "guess").await,
            Err(SignError::InvalidPassword)
        );
        assert!(harness.transactor.pending().has(request.id));
        assert!(!sender.is_finished());

        let response = harness.transactor.approve(request.id, PASSWORD).await.unwrap();
        let hash = sender.await.unwrap().unwrap();
        assert_eq!(response.to_hash(), Some(hash));

        let stats = harness.transactor.pending().stats().snapshot();
        assert_eq!(stats.total_transient_failures, 1);
        assert_eq!(stats.total_completed, 1);
    }

    #[tokio::test]
    async fn test_discard_releases_blocked_sender() {
        let harness = Harness::new();
        let sender = spawn_send(&harness, CallContext::background(), transfer(harness.from));
        let request = next_request(&harness).await;

        harness.transactor.discard(request.id).unwrap();

        assert_eq!(sender.await.unwrap(), Err(SignError::Discarded));
        assert!(!harness.transactor.pending().has(request.id));
        assert_eq!(
            harness.transactor.approve(request.id, PASSWORD).await,
            Err(SignError::NotFound(request.id))
        );
        assert!(harness.upstream.sent().is_empty());
        assert_eq!(harness.upstream.nonce_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_times_out_without_approval() {
        let config = TransactorConfig {
            send_timeout: Duration::from_millis(50),
            ..TransactorConfig::for_network(CHAIN_ID)
        };
        let harness = Harness::with_config(config);

        let result = harness
            .transactor
            .send_transaction(CallContext::background(), transfer(harness.from))
            .await;

        assert_eq!(result, Err(SignError::TimedOut));
        assert_eq!(harness.transactor.pending().count(), 0);
        assert_eq!(harness.transactor.pending().stats().snapshot().total_timeouts, 1);
    }

    // =============================================================================
    // FLOW 4: Cancellation and upstream failures
    // =============================================================================

    #[tokio::test]
    async fn test_cancel_aborts_inflight_broadcast() {
        let harness = Harness::new();
        harness.upstream.send_delay_ms.store(5_000, Ordering::SeqCst);

        let (ctx, cancel) = CallContext::with_cancel();
        let sender = spawn_send(&harness, ctx, transfer(harness.from));
        let request = next_request(&harness).await;

        let transactor = Arc::clone(&harness.transactor);
        let approval = tokio::spawn(async move { transactor.approve(request.id, PASSWORD).await });

        // Let the pipeline reach the slow broadcast
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = timeout(Duration::from_secs(2), sender)
            .await
            .expect("cancellation must release the sender")
            .unwrap();
        assert!(matches!(result, Err(SignError::Cancelled { .. })));
        assert!(matches!(
            approval.await.unwrap(),
            Err(SignError::Cancelled { .. })
        ));

        assert!(harness.upstream.sent().is_empty());
        assert_eq!(harness.transactor.local_nonce(harness.from).await, None);
    }

    #[tokio::test]
    async fn test_failed_broadcast_reuses_nonce() {
        let harness = Harness::new();
        harness.upstream.pending_nonce.store(9, Ordering::SeqCst);
        harness.upstream.fail_send.store(true, Ordering::SeqCst);

        let sender = spawn_send(&harness, CallContext::background(), transfer(harness.from));
        let request = next_request(&harness).await;
        let _ = harness.transactor.approve(request.id, PASSWORD).await;

        assert!(matches!(
            sender.await.unwrap(),
            Err(SignError::Upstream {
                op: "eth_sendRawTransaction",
                ..
            })
        ));
        assert_eq!(harness.transactor.local_nonce(harness.from).await, None);

        harness.upstream.fail_send.store(false, Ordering::SeqCst);
        let sender = spawn_send(&harness, CallContext::background(), transfer(harness.from));
        let request = next_request(&harness).await;
        harness.transactor.approve(request.id, PASSWORD).await.unwrap();
        sender.await.unwrap().unwrap();

        assert_eq!(harness.upstream.sent_nonces(), vec![9]);
        assert_eq!(harness.transactor.local_nonce(harness.from).await, Some(10));
    }

    #[tokio::test]
    async fn test_independent_addresses_do_not_share_nonces() {
        let harness = Harness::new();
        let other = harness.keystore.add_account(
            k256::ecdsa::SigningKey::random(&mut rand::thread_rng()),
            PASSWORD,
        );

        for from in [harness.from, other, harness.from] {
            harness.keystore.select_account(from).unwrap();
            let sender = spawn_send(&harness, CallContext::background(), transfer(from));
            let request = next_request(&harness).await;
            harness.transactor.approve(request.id, PASSWORD).await.unwrap();
            sender.await.unwrap().unwrap();
        }

        assert_eq!(harness.transactor.local_nonce(harness.from).await, Some(2));
        assert_eq!(harness.transactor.local_nonce(other).await, Some(1));
        let senders: Vec<Address> = harness
            .upstream
            .sent()
            .iter()
            .map(|tx| tx.sender().unwrap())
            .collect();
        assert_eq!(senders, vec![harness.from, other, harness.from]);
    }

    // =============================================================================
    // FLOW 5: External signing
    // =============================================================================

    #[tokio::test]
    async fn test_external_signing_interleaves_with_approvals() {
        let harness = Harness::new();
        harness.upstream.pending_nonce.store(2, Ordering::SeqCst);

        let (validated, hash) = harness
            .transactor
            .hash_transaction(CallContext::background(), transfer(harness.from))
            .await
            .unwrap();
        assert_eq!(validated.nonce, Some(2));
        assert_eq!(harness.transactor.pending().count(), 0);

        let (signature, recovery_id) = harness
            .key
            .sign_prehash_recoverable(hash.as_bytes())
            .unwrap();
        let mut signature = signature.to_bytes().to_vec();
        signature.push(recovery_id.to_byte() + 27);

        let device_hash = harness
            .transactor
            .send_transaction_with_signature(CallContext::background(), &validated, &signature)
            .await
            .unwrap();

        // The approval flow continues from the device-signed nonce
        let sender = spawn_send(&harness, CallContext::background(), transfer(harness.from));
        let request = next_request(&harness).await;
        harness.transactor.approve(request.id, PASSWORD).await.unwrap();
        let approved_hash = sender.await.unwrap().unwrap();

        let sent = harness.upstream.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!((sent[0].hash, sent[0].nonce), (device_hash, 2));
        assert_eq!((sent[1].hash, sent[1].nonce), (approved_hash, 3));
        assert!(sent.iter().all(|tx| tx.sender().unwrap() == harness.from));

        // Replaying the device signature is refused
        assert_eq!(
            harness
                .transactor
                .send_transaction_with_signature(CallContext::background(), &validated, &signature)
                .await,
            Err(SignError::BadNonce {
                expected: 4,
                actual: 2
            })
        );
    }

    #[test]
    fn test_scripted_upstream_starts_empty() {
        let upstream = ScriptedUpstream::default();
        assert!(upstream.sent().is_empty());
        assert!(upstream.sent_nonces().is_empty());
    }
}
