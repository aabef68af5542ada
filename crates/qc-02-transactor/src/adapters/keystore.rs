//! # In-Memory Key Store
//!
//! `AccountManager` adapter holding signing keys in process memory.
//!
//! ## Security Notes
//!
//! - Passwords are never stored, only `sha256(salt || password)` with a
//!   random 16-byte salt per account
//! - Digests are compared with `subtle::ConstantTimeEq`

use crate::ports::outbound::{AccountManager, SelectedAccount};
use k256::ecdsa::SigningKey;
use parking_lot::RwLock;
use qc_01_sign_requests::SignError;
use rand::RngCore;
use sha2::{Digest, Sha256};
use shared_types::{address_from_pubkey, Address};
use std::collections::HashMap;
use subtle::ConstantTimeEq;
use tracing::{debug, info};

struct StoredAccount {
    signing_key: SigningKey,
    salt: [u8; 16],
    digest: [u8; 32],
}

fn password_digest(salt: &[u8; 16], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Password-protected accounts plus the user's current selection.
#[derive(Default)]
pub struct InMemoryKeyStore {
    accounts: RwLock<HashMap<Address, StoredAccount>>,
    selected: RwLock<Option<Address>>,
}

impl InMemoryKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Import a key protected by `password`. Returns its address.
    pub fn add_account(&self, signing_key: SigningKey, password: &str) -> Address {
        let address = address_from_pubkey(signing_key.verifying_key());
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = password_digest(&salt, password);

        self.accounts.write().insert(
            address,
            StoredAccount {
                signing_key,
                salt,
                digest,
            },
        );
        debug!(address = %address, "Account imported");
        address
    }

    /// Make `address` the account used for approvals.
    pub fn select_account(&self, address: Address) -> Result<(), SignError> {
        if !self.accounts.read().contains_key(&address) {
            return Err(SignError::AccountNotFound(address));
        }
        *self.selected.write() = Some(address);
        info!(address = %address, "Account selected");
        Ok(())
    }

    /// Clear the selection.
    pub fn logout(&self) {
        *self.selected.write() = None;
    }

    #[must_use]
    pub fn selected_account(&self) -> Option<Address> {
        *self.selected.read()
    }

    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        self.accounts.read().contains_key(&address)
    }
}

impl AccountManager for InMemoryKeyStore {
    fn selected_account_address(&self) -> Option<Address> {
        self.selected_account()
    }

    fn verify_account_password(
        &self,
        address: Address,
        password: &str,
    ) -> Result<SelectedAccount, SignError> {
        let accounts = self.accounts.read();
        let stored = accounts
            .get(&address)
            .ok_or(SignError::AccountNotFound(address))?;

        let digest = password_digest(&stored.salt, password);
        if !bool::from(digest[..].ct_eq(&stored.digest[..])) {
            return Err(SignError::InvalidPassword);
        }

        Ok(SelectedAccount {
            address,
            signing_key: stored.signing_key.clone(),
        })
    }
}
