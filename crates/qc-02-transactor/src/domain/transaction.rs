//! # Legacy Transactions
//!
//! RLP encoding, EIP-155 replay-protected signing and sender recovery for
//! legacy (untyped) transactions.
//!
//! ## Encoding
//!
//! - Signing payload: `rlp([nonce, gasPrice, gas, to, value, input, chainId, 0, 0])`
//! - Signed payload: `rlp([nonce, gasPrice, gas, to, value, input, v, r, s])`
//! - `v = recovery_id + chainId * 2 + 35`
//!
//! `to` is the empty string for contract creation.
//!
//! Chain IDs above [`MAX_CHAIN_ID`] cannot be encoded in a `u64` `v`.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use qc_01_sign_requests::SignError;
use rlp::RlpStream;
use shared_types::{address_from_pubkey, keccak256, Address, Hash, U256};

/// Length of an externally produced `r || s || v` signature.
pub const SIGNATURE_LEN: usize = 65;

/// Largest chain ID whose EIP-155 `v` fits in a `u64`.
pub const MAX_CHAIN_ID: u64 = (u64::MAX - 36) / 2;

/// `recovery_id + chain_id * 2 + 35`, or `None` on overflow.
fn eip155_v(recovery_id: RecoveryId, chain_id: u64) -> Option<u64> {
    chain_id
        .checked_mul(2)?
        .checked_add(35)?
        .checked_add(u64::from(recovery_id.to_byte()))
}

/// Address of a contract created by `from` with the given nonce.
///
/// `keccak256(rlp([from, nonce]))[12..]`
#[must_use]
pub fn contract_address(from: Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(&from.as_bytes().to_vec());
    stream.append(&nonce);
    let hash = keccak256(&stream.out());

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash.as_bytes()[12..]);
    Address::new(address)
}

/// An unsigned legacy transaction with every field resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub input: Vec<u8>,
}

impl TransactionRequest {
    #[must_use]
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    fn append_body(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        match &self.to {
            Some(to) => stream.append(&to.as_bytes().to_vec()),
            None => stream.append_empty_data(),
        };
        stream.append(&self.value);
        stream.append(&self.input);
    }

    /// EIP-155 signing payload.
    #[must_use]
    pub fn signing_payload(&self, chain_id: u64) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
        stream.out().to_vec()
    }

    /// Hash that is signed.
    #[must_use]
    pub fn signing_hash(&self, chain_id: u64) -> Hash {
        keccak256(&self.signing_payload(chain_id))
    }

    /// Sign with replay protection for `chain_id`.
    pub fn sign(self, key: &SigningKey, chain_id: u64) -> Result<SignedTransaction, SignError> {
        let hash = self.signing_hash(chain_id);
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(hash.as_bytes())
            .map_err(|e| SignError::Signing(e.to_string()))?;

        self.into_signed(signature, recovery_id, chain_id)
    }

    /// Attach a signature produced elsewhere (e.g. a hardware device) over
    /// [`signing_hash`](Self::signing_hash).
    ///
    /// `signature` is `r || s || v` with `v` in `{0, 1}` or `{27, 28}`.
    pub fn with_signature(
        self,
        signature: &[u8],
        chain_id: u64,
    ) -> Result<SignedTransaction, SignError> {
        if signature.len() != SIGNATURE_LEN {
            return Err(SignError::InvalidSignatureSize(signature.len()));
        }

        let parity = match signature[64] {
            v @ (0 | 1) => v,
            v @ (27 | 28) => v - 27,
            v => return Err(SignError::Signing(format!("invalid recovery byte {v}"))),
        };
        let recovery_id = RecoveryId::from_byte(parity)
            .ok_or_else(|| SignError::Signing("invalid recovery id".to_string()))?;
        let rs = Signature::from_slice(&signature[..64])
            .map_err(|e| SignError::Signing(e.to_string()))?;

        self.into_signed(rs, recovery_id, chain_id)
    }

    fn into_signed(
        self,
        mut signature: Signature,
        mut recovery_id: RecoveryId,
        chain_id: u64,
    ) -> Result<SignedTransaction, SignError> {
        // Low-S form only
        if let Some(normalized) = signature.normalize_s() {
            signature = normalized;
            recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
        }

        let v = eip155_v(recovery_id, chain_id)
            .ok_or_else(|| SignError::Signing(format!("chain id {chain_id} too large")))?;
        let bytes = signature.to_bytes();
        let r = U256::from_big_endian(&bytes[..32]);
        let s = U256::from_big_endian(&bytes[32..]);

        Ok(SignedTransaction::new(self, v, r, s))
    }
}

/// A signed legacy transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Vec<u8>,
    pub v: u64,
    pub r: U256,
    pub s: U256,
    /// RLP encoding as sent with `eth_sendRawTransaction`.
    pub raw: Vec<u8>,
    /// Transaction hash, `keccak256(raw)`.
    pub hash: Hash,
}

impl SignedTransaction {
    fn new(tx: TransactionRequest, v: u64, r: U256, s: U256) -> Self {
        let mut stream = RlpStream::new_list(9);
        tx.append_body(&mut stream);
        stream.append(&v);
        stream.append(&r);
        stream.append(&s);
        let raw = stream.out().to_vec();
        let hash = keccak256(&raw);

        Self {
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            to: tx.to,
            value: tx.value,
            input: tx.input,
            v,
            r,
            s,
            raw,
            hash,
        }
    }

    /// Chain ID encoded in `v`.
    #[must_use]
    pub fn chain_id(&self) -> Option<u64> {
        self.v.checked_sub(35).map(|x| x / 2)
    }

    /// Address of the created contract, for creation transactions.
    #[must_use]
    pub fn contract_address(&self, from: Address) -> Option<Address> {
        self.to
            .is_none()
            .then(|| contract_address(from, self.nonce))
    }

    fn unsigned(&self) -> TransactionRequest {
        TransactionRequest {
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            to: self.to,
            value: self.value,
            input: self.input.clone(),
        }
    }

    /// Recover the signer from the signature.
    pub fn sender(&self) -> Result<Address, SignError> {
        let chain_id = self
            .chain_id()
            .ok_or_else(|| SignError::Signing(format!("not an EIP-155 signature: v={}", self.v)))?;
        let parity = (self.v - 35) % 2;
        let recovery_id = RecoveryId::from_byte(parity as u8)
            .ok_or_else(|| SignError::Signing("invalid recovery id".to_string()))?;

        let mut bytes = [0u8; 64];
        self.r.to_big_endian(&mut bytes[..32]);
        self.s.to_big_endian(&mut bytes[32..]);
        let signature =
            Signature::from_slice(&bytes).map_err(|e| SignError::Signing(e.to_string()))?;

        let hash = self.unsigned().signing_hash(chain_id);
        let key = VerifyingKey::recover_from_prehash(hash.as_bytes(), &signature, recovery_id)
            .map_err(|e| SignError::Signing(e.to_string()))?;

        Ok(address_from_pubkey(&key))
    }
}
