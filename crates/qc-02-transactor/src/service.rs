//! # Transactor Service
//!
//! Queues `eth_sendTransaction` calls in the sign-request registry and,
//! once approved, runs the submission pipeline:
//!
//! 1. Check the verified account matches `from`
//! 2. Resolve the payload
//! 3. Lock `from`
//! 4. `nonce = max(local, upstream pending nonce)`
//! 5. Gas price: caller's or suggested
//! 6. Gas limit: caller's or estimated, floored at `min_gas_limit`
//! 7. Build and sign (EIP-155)
//! 8. Broadcast
//! 9. On success only, `local = nonce + 1`
//!
//! Each upstream call runs under `rpc_call_timeout` and the caller's
//! [`CallContext`].
//!
//! ## External Signing
//!
//! [`Transactor::hash_transaction`] resolves nonce and gas and returns the
//! signing hash. [`Transactor::send_transaction_with_signature`] re-checks
//! the nonce under the address lock, attaches the signature and broadcasts.
//! Neither goes through the registry.

use crate::config::{ConfigError, TransactorConfig};
use crate::context::CallContext;
use crate::domain::addr_locker::AddrLocker;
use crate::domain::args::{CallMsg, SendTxArgs};
use crate::domain::transaction::{
    contract_address, SignedTransaction, TransactionRequest, SIGNATURE_LEN,
};
use crate::ports::outbound::{AccountManager, SelectedAccount, UpstreamNode};
use async_trait::async_trait;
use qc_01_sign_requests::{
    CompleteFunc, PendingRequests, Request, Response, SignError, SignResult,
};
use shared_types::{Address, Hash, RequestId, U256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Check that the approving account may send this transaction.
///
/// Both failures are transient under the default classification: the
/// approver can select the right account and retry.
pub fn validate_account(
    args: &SendTxArgs,
    account: Option<&SelectedAccount>,
) -> Result<(), SignError> {
    let account = account.ok_or(SignError::NoAccountSelected)?;
    if args.from != account.address {
        return Err(SignError::InvalidSender {
            expected: args.from,
            actual: account.address,
        });
    }
    Ok(())
}

/// State shared between the transactor and queued completions.
struct Pipeline {
    config: TransactorConfig,
    upstream: Arc<dyn UpstreamNode>,
    /// Per-address lock guarding the next local nonce.
    nonces: AddrLocker<Option<u64>>,
}

impl Pipeline {
    /// `max(local, upstream pending)`. Call with `from` locked.
    async fn next_nonce(
        &self,
        ctx: &CallContext,
        from: Address,
        local: Option<u64>,
    ) -> Result<u64, SignError> {
        let pending_nonce = ctx
            .call(
                "eth_getTransactionCount",
                self.config.rpc_call_timeout,
                self.upstream.pending_nonce_at(from),
            )
            .await?;
        Ok(match local {
            Some(local) if local > pending_nonce => {
                debug!(from = %from, local, pending_nonce, "Using local nonce ahead of upstream");
                local
            }
            _ => pending_nonce,
        })
    }

    /// Gas price and limit: the caller's, or suggested and estimated.
    async fn resolve_gas(
        &self,
        ctx: &CallContext,
        args: &SendTxArgs,
        input: &[u8],
    ) -> Result<(U256, u64), SignError> {
        let deadline = self.config.rpc_call_timeout;
        let gas_price = match args.gas_price {
            Some(price) => price,
            None => {
                ctx.call("eth_gasPrice", deadline, self.upstream.suggest_gas_price())
                    .await?
            }
        };

        let gas_limit = match args.gas {
            Some(gas) => gas,
            None => {
                let msg = CallMsg {
                    from: args.from,
                    to: args.to,
                    gas_price,
                    value: args.value.unwrap_or_default(),
                    data: input.to_vec(),
                };
                let estimated = ctx
                    .call("eth_estimateGas", deadline, self.upstream.estimate_gas(msg))
                    .await?;
                if estimated < self.config.min_gas_limit {
                    debug!(
                        estimated,
                        floor = self.config.min_gas_limit,
                        "Gas estimate below minimum, using floor"
                    );
                    self.config.min_gas_limit
                } else {
                    estimated
                }
            }
        };
        Ok((gas_price, gas_limit))
    }

    fn build(
        args: &SendTxArgs,
        nonce: u64,
        gas_price: U256,
        gas_limit: u64,
        input: Vec<u8>,
    ) -> TransactionRequest {
        let tx = TransactionRequest {
            nonce,
            gas_price,
            gas_limit,
            to: args.to,
            value: args.value.unwrap_or_default(),
            input,
        };
        if tx.is_contract_creation() {
            info!(
                from = %args.from,
                nonce,
                contract = %contract_address(args.from, nonce),
                "New contract"
            );
        }
        info!(
            from = %args.from,
            to = ?args.to,
            nonce,
            gas = gas_limit,
            gas_price = %gas_price,
            "Transaction prepared"
        );
        tx
    }

    async fn broadcast(
        &self,
        ctx: &CallContext,
        signed: &SignedTransaction,
    ) -> Result<(), SignError> {
        ctx.call(
            "eth_sendRawTransaction",
            self.config.rpc_call_timeout,
            self.upstream.send_raw_transaction(signed),
        )
        .await
    }

    async fn validate_and_propagate(
        &self,
        ctx: &CallContext,
        account: &SelectedAccount,
        args: &SendTxArgs,
    ) -> Result<Hash, SignError> {
        validate_account(args, Some(account))?;
        let input = args.payload()?;

        let mut local_nonce = self.nonces.lock_addr(args.from).await;
        let nonce = self.next_nonce(ctx, args.from, *local_nonce).await?;
        let next_nonce = advance(nonce)?;
        let (gas_price, gas_limit) = self.resolve_gas(ctx, args, &input).await?;

        let signed = Self::build(args, nonce, gas_price, gas_limit, input)
            .sign(&account.signing_key, self.config.network_id)?;
        self.broadcast(ctx, &signed).await?;

        *local_nonce = Some(next_nonce);
        info!(from = %args.from, nonce, hash = %signed.hash, "Transaction submitted");

        Ok(signed.hash)
    }

    /// Fill nonce and gas, and return the hash an external signer signs.
    async fn hash_transaction(
        &self,
        ctx: &CallContext,
        args: &SendTxArgs,
    ) -> Result<(SendTxArgs, Hash), SignError> {
        let input = args.payload()?;

        let local_nonce = self.nonces.lock_addr(args.from).await;
        let nonce = self.next_nonce(ctx, args.from, *local_nonce).await?;
        let (gas_price, gas_limit) = self.resolve_gas(ctx, args, &input).await?;
        drop(local_nonce);

        let validated = SendTxArgs {
            nonce: Some(nonce),
            gas: Some(gas_limit),
            gas_price: Some(gas_price),
            ..args.clone()
        };
        let hash = Self::build(args, nonce, gas_price, gas_limit, input)
            .signing_hash(self.config.network_id);
        debug!(from = %args.from, nonce, hash = %hash, "Transaction hashed for external signing");

        Ok((validated, hash))
    }

    /// Broadcast `args` (as returned by `hash_transaction`) with an external
    /// signature.
    async fn propagate_with_signature(
        &self,
        ctx: &CallContext,
        args: &SendTxArgs,
        signature: &[u8],
    ) -> Result<Hash, SignError> {
        let input = args.payload()?;
        if signature.len() != SIGNATURE_LEN {
            return Err(SignError::InvalidSignatureSize(signature.len()));
        }
        let (Some(nonce), Some(gas_limit), Some(gas_price)) = (args.nonce, args.gas, args.gas_price)
        else {
            return Err(SignError::InvalidArgs(
                "nonce, gas and gasPrice must be set for a pre-signed transaction".to_string(),
            ));
        };

        let mut local_nonce = self.nonces.lock_addr(args.from).await;
        let expected = self.next_nonce(ctx, args.from, *local_nonce).await?;
        if nonce != expected {
            return Err(SignError::BadNonce {
                expected,
                actual: nonce,
            });
        }
        let next_nonce = advance(nonce)?;

        let signed = Self::build(args, nonce, gas_price, gas_limit, input)
            .with_signature(signature, self.config.network_id)?;
        let signer = signed.sender()?;
        if signer != args.from {
            return Err(SignError::InvalidSender {
                expected: args.from,
                actual: signer,
            });
        }
        self.broadcast(ctx, &signed).await?;

        *local_nonce = Some(next_nonce);
        info!(from = %args.from, nonce, hash = %signed.hash, "Pre-signed transaction submitted");

        Ok(signed.hash)
    }
}

/// Nonce following `nonce`.
fn advance(nonce: u64) -> Result<u64, SignError> {
    nonce
        .checked_add(1)
        .ok_or_else(|| SignError::InvalidArgs(format!("nonce {nonce} cannot be advanced")))
}

/// Completion queued for one `send_transaction` call.
struct SendTxCompletion {
    pipeline: Arc<Pipeline>,
    ctx: CallContext,
    args: SendTxArgs,
}

#[async_trait]
impl CompleteFunc<SelectedAccount> for SendTxCompletion {
    async fn complete(&self, account: SelectedAccount, _password: &str) -> SignResult {
        self.pipeline
            .validate_and_propagate(&self.ctx, &account, &self.args)
            .await
            .map(Response::from)
    }
}

/// Transaction submission service.
pub struct Transactor {
    pipeline: Arc<Pipeline>,
    accounts: Arc<dyn AccountManager>,
    pending: Arc<PendingRequests<SelectedAccount>>,
}

impl Transactor {
    /// Create a transactor. Fails on invalid configuration.
    pub fn new(
        config: TransactorConfig,
        upstream: Arc<dyn UpstreamNode>,
        accounts: Arc<dyn AccountManager>,
        pending: Arc<PendingRequests<SelectedAccount>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(network_id = config.network_id, "Transactor initialized");

        Ok(Self {
            pipeline: Arc::new(Pipeline {
                config,
                upstream,
                nonces: AddrLocker::new(),
            }),
            accounts,
            pending,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TransactorConfig {
        &self.pipeline.config
    }

    /// The registry transactions are queued in.
    #[must_use]
    pub fn pending(&self) -> &Arc<PendingRequests<SelectedAccount>> {
        &self.pending
    }

    /// Queue a transaction and wait until it is approved and broadcast,
    /// discarded, or the send timeout expires.
    pub async fn send_transaction(
        &self,
        ctx: CallContext,
        args: SendTxArgs,
    ) -> Result<Hash, SignError> {
        let request = self.queue_transaction(ctx, args);
        self.wait_transaction(&request).await
    }

    /// Queue a transaction without waiting.
    pub fn queue_transaction(&self, ctx: CallContext, args: SendTxArgs) -> Request {
        let meta = args.to_meta();
        let message_id = ctx.message_id().map(str::to_owned);
        let completion = SendTxCompletion {
            pipeline: Arc::clone(&self.pipeline),
            ctx,
            args,
        };
        self.pending.add_with_message_id(
            self.pipeline.config.method.clone(),
            meta,
            message_id,
            Arc::new(completion),
        )
    }

    /// Wait for a queued transaction's hash.
    pub async fn wait_transaction(&self, request: &Request) -> Result<Hash, SignError> {
        let response = self
            .pending
            .wait_request(request, Some(self.pipeline.config.send_timeout))
            .await?;
        response
            .to_hash()
            .ok_or_else(|| SignError::Signing("completion returned a malformed hash".to_string()))
    }

    /// Resolve nonce and gas for `args` and return them with the hash an
    /// external signer (e.g. a hardware wallet) must sign.
    ///
    /// Nothing is queued and the local nonce does not move.
    pub async fn hash_transaction(
        &self,
        ctx: CallContext,
        args: SendTxArgs,
    ) -> Result<(SendTxArgs, Hash), SignError> {
        self.pipeline.hash_transaction(&ctx, &args).await
    }

    /// Broadcast a transaction prepared by [`hash_transaction`](Self::hash_transaction)
    /// with its 65-byte `r || s || v` signature.
    ///
    /// Fails with `BadNonce` if another transaction from the same address
    /// took the nonce in between.
    pub async fn send_transaction_with_signature(
        &self,
        ctx: CallContext,
        args: &SendTxArgs,
        signature: &[u8],
    ) -> Result<Hash, SignError> {
        self.pipeline
            .propagate_with_signature(&ctx, args, signature)
            .await
    }

    /// Approve a queued transaction with the selected account's password.
    pub async fn approve(&self, id: RequestId, password: &str) -> SignResult {
        self.pending
            .approve(id, password, selected_account_verifier(Arc::clone(&self.accounts)))
            .await
    }

    /// Discard a queued transaction.
    pub fn discard(&self, id: RequestId) -> Result<(), SignError> {
        self.pending.discard(id)
    }

    /// Approve several transactions concurrently with one password.
    pub async fn approve_transactions(
        &self,
        ids: &[RequestId],
        password: &str,
    ) -> HashMap<RequestId, SignResult> {
        let mut tasks = JoinSet::new();
        for &id in ids {
            let pending = Arc::clone(&self.pending);
            let verify = selected_account_verifier(Arc::clone(&self.accounts));
            let password = password.to_string();
            tasks.spawn(async move { (id, pending.approve(id, &password, verify).await) });
        }

        let mut results = HashMap::with_capacity(ids.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, result)) => {
                    results.insert(id, result);
                }
                Err(err) => warn!(error = %err, "Approval task failed"),
            }
        }
        results
    }

    /// Discard several transactions. Only failures are reported.
    pub fn discard_transactions(&self, ids: &[RequestId]) -> HashMap<RequestId, SignError> {
        ids.iter()
            .filter_map(|&id| self.discard(id).err().map(|err| (id, err)))
            .collect()
    }

    /// Next nonce the pipeline will use for `address`, if it has sent before.
    ///
    /// Waits for in-flight submissions from `address` to finish.
    pub async fn local_nonce(&self, address: Address) -> Option<u64> {
        *self.pipeline.nonces.lock_addr(address).await
    }
}

/// `verify` function unlocking the currently selected account.
fn selected_account_verifier(
    accounts: Arc<dyn AccountManager>,
) -> impl FnOnce(&str) -> Result<SelectedAccount, SignError> + Send + 'static {
    move |password: &str| {
        let address = accounts
            .selected_account_address()
            .ok_or(SignError::NoAccountSelected)?;
        accounts.verify_account_password(address, password)
    }
}
