//! # Integration Fixtures
//!
//! A scripted upstream node and a harness wiring the registry, the
//! transactor, an in-memory key store and the event bus together.

pub mod flows;
pub mod notifications;

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use parking_lot::Mutex;
use qc_01_sign_requests::PendingRequests;
use qc_02_transactor::{
    CallMsg, InMemoryKeyStore, SelectedAccount, SignedTransaction, Transactor, TransactorConfig,
    UpstreamError, UpstreamNode,
};
use shared_bus::InMemoryEventBus;
use shared_types::{Address, U256};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const PASSWORD: &str = "integration-password";
pub const CHAIN_ID: u64 = 1337;
pub const SUGGESTED_GAS_PRICE: u64 = 2_000_000_000;

/// Upstream node double with call counters.
#[derive(Default)]
pub struct ScriptedUpstream {
    pub pending_nonce: AtomicU64,
    pub estimate: AtomicU64,
    /// Delay before `send_raw_transaction` answers, in milliseconds.
    pub send_delay_ms: AtomicU64,
    pub fail_send: AtomicBool,
    pub nonce_calls: AtomicUsize,
    pub gas_price_calls: AtomicUsize,
    pub estimate_calls: AtomicUsize,
    pub sent: Mutex<Vec<SignedTransaction>>,
}

impl ScriptedUpstream {
    pub fn sent(&self) -> Vec<SignedTransaction> {
        self.sent.lock().clone()
    }

    pub fn sent_nonces(&self) -> Vec<u64> {
        let mut nonces: Vec<u64> = self.sent.lock().iter().map(|tx| tx.nonce).collect();
        nonces.sort_unstable();
        nonces
    }
}

#[async_trait]
impl UpstreamNode for ScriptedUpstream {
    async fn pending_nonce_at(&self, _address: Address) -> Result<u64, UpstreamError> {
        self.nonce_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.pending_nonce.load(Ordering::SeqCst))
    }

    async fn suggest_gas_price(&self) -> Result<U256, UpstreamError> {
        self.gas_price_calls.fetch_add(1, Ordering::SeqCst);
        Ok(U256::from(SUGGESTED_GAS_PRICE))
    }

    async fn estimate_gas(&self, _msg: CallMsg) -> Result<u64, UpstreamError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.estimate.load(Ordering::SeqCst))
    }

    async fn send_raw_transaction(&self, tx: &SignedTransaction) -> Result<(), UpstreamError> {
        let delay = self.send_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(UpstreamError::Connection("connection reset".into()));
        }
        self.sent.lock().push(tx.clone());
        Ok(())
    }
}

/// Everything a flow needs, wired the way a node would wire it.
pub struct Harness {
    pub transactor: Arc<Transactor>,
    pub upstream: Arc<ScriptedUpstream>,
    pub keystore: Arc<InMemoryKeyStore>,
    pub bus: Arc<InMemoryEventBus>,
    /// Key behind `from`, for signing outside the key store.
    pub key: SigningKey,
    pub from: Address,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(TransactorConfig::for_network(CHAIN_ID))
    }

    pub fn with_config(config: TransactorConfig) -> Self {
        crate::init_tracing();

        let upstream = Arc::new(ScriptedUpstream::default());
        let keystore = Arc::new(InMemoryKeyStore::new());
        let key = SigningKey::random(&mut rand::thread_rng());
        let from = keystore.add_account(key.clone(), PASSWORD);
        keystore
            .select_account(from)
            .expect("freshly imported account");

        let bus = Arc::new(InMemoryEventBus::new());
        let pending = Arc::new(PendingRequests::<SelectedAccount>::new().with_publisher(bus.clone()));

        let transactor = Transactor::new(config, upstream.clone(), keystore.clone(), pending)
            .expect("valid configuration");

        Self {
            transactor: Arc::new(transactor),
            upstream,
            keystore,
            bus,
            key,
            from,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
