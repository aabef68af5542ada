//! # Lifecycle Notifications
//!
//! Sign-request events observed on the shared bus while the transactor
//! queues, fails, and resolves transactions.

#[cfg(test)]
mod tests {
    use crate::integration::{Harness, CHAIN_ID, PASSWORD};
    use qc_01_sign_requests::SignError;
    use qc_02_transactor::{CallContext, SendTxArgs, TransactorConfig};
    use shared_bus::{
        ErrorCode, EventFilter, EventSubscriber, EventTopic, SignRequestEvent, Subscription,
    };
    use shared_types::{Address, U256};
    use std::time::Duration;
    use tokio::time::timeout;

    fn transfer(from: Address) -> SendTxArgs {
        SendTxArgs::transfer(from, Address::new([0x42; 20]), U256::from(1u64))
    }

    async fn next_event(subscription: &mut Subscription) -> SignRequestEvent {
        timeout(Duration::from_secs(5), subscription.recv())
            .await
            .expect("event delivered")
            .expect("bus open")
    }

    #[tokio::test]
    async fn test_enqueued_and_resolved_for_approved_transaction() {
        let harness = Harness::new();
        let mut events = harness.bus.subscribe(EventFilter::all());

        let request = harness
            .transactor
            .queue_transaction(CallContext::background(), transfer(harness.from));
        harness.transactor.approve(request.id, PASSWORD).await.unwrap();

        let mut seen = vec![next_event(&mut events).await, next_event(&mut events).await];
        seen.sort_by_key(|event| event.topic() != EventTopic::Enqueued);

        assert!(matches!(&seen[0], SignRequestEvent::Enqueued(_)));
        assert!(matches!(&seen[1], SignRequestEvent::Resolved { error: None, .. }));
        assert_eq!(seen[1].error_code(), Some(ErrorCode::NoError));
        for event in &seen {
            let notice = event.notice();
            assert_eq!(notice.id, request.id);
            assert_eq!(notice.method, "eth_sendTransaction");
            assert_eq!(notice.meta["from"], harness.from.to_hex());
        }
    }

    #[tokio::test]
    async fn test_transient_failure_publishes_failed() {
        let harness = Harness::new();
        let mut failures = harness
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::Failed]));

        let request = harness
            .transactor
            .queue_transaction(CallContext::background(), transfer(harness.from));
        assert_eq!(
            harness.transactor.approve(request.id, "nope").await,
            Err(SignError::InvalidPassword)
        );

        match next_event(&mut failures).await {
            SignRequestEvent::Failed {
                notice,
                error,
                error_code,
            } => {
                assert_eq!(notice.id, request.id);
                assert_eq!(error, SignError::InvalidPassword.to_string());
                assert_eq!(error_code, ErrorCode::Password);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(harness.transactor.pending().has(request.id));
    }

    #[tokio::test]
    async fn test_discard_publishes_resolved_with_error() {
        let harness = Harness::new();
        let mut resolved = harness
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::Resolved]));

        let request = harness
            .transactor
            .queue_transaction(CallContext::background(), transfer(harness.from));
        harness.transactor.discard(request.id).unwrap();

        match next_event(&mut resolved).await {
            SignRequestEvent::Resolved {
                notice,
                error,
                error_code,
            } => {
                assert_eq!(notice.id, request.id);
                assert_eq!(error, Some(SignError::Discarded.to_string()));
                assert_eq!(error_code, ErrorCode::Discarded);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_and_upstream_failure_codes() {
        let harness = Harness::with_config(TransactorConfig {
            send_timeout: Duration::from_millis(50),
            ..TransactorConfig::for_network(CHAIN_ID)
        });
        let mut resolved = harness
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::Resolved]));

        let result = harness
            .transactor
            .send_transaction(CallContext::background(), transfer(harness.from))
            .await;
        assert_eq!(result, Err(SignError::TimedOut));
        assert_eq!(
            next_event(&mut resolved).await.error_code(),
            Some(ErrorCode::Timeout)
        );

        harness
            .upstream
            .fail_send
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let request = harness
            .transactor
            .queue_transaction(CallContext::background(), transfer(harness.from));
        assert!(harness.transactor.approve(request.id, PASSWORD).await.is_err());
        assert_eq!(
            next_event(&mut resolved).await.error_code(),
            Some(ErrorCode::Default)
        );
    }

    #[tokio::test]
    async fn test_message_id_travels_with_events() {
        let harness = Harness::new();
        let mut events = harness.bus.subscribe(EventFilter::all());

        let ctx = CallContext::background().with_message_id("chat-msg-17");
        let request = harness
            .transactor
            .queue_transaction(ctx, transfer(harness.from));
        harness.transactor.discard(request.id).unwrap();

        for _ in 0..2 {
            let event = next_event(&mut events).await;
            assert_eq!(event.notice().message_id.as_deref(), Some("chat-msg-17"));
        }
    }

    #[tokio::test]
    async fn test_method_filter_excludes_other_methods() {
        let harness = Harness::new();
        let mut everything = harness.bus.subscribe(EventFilter::all());
        let mut personal_sign = harness
            .bus
            .subscribe(EventFilter::methods(vec!["personal_sign".to_string()]));

        let request = harness
            .transactor
            .queue_transaction(CallContext::background(), transfer(harness.from));
        harness.transactor.discard(request.id).unwrap();

        // Both events reached the unfiltered subscriber, so both were broadcast
        for _ in 0..2 {
            next_event(&mut everything).await;
        }
        assert!(matches!(personal_sign.try_recv(), Ok(None)));
    }
}
