use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::deposit::StoredDepositRequest;
use crate::error::StoreError;
use crate::transfer::PendingTransfer;

pub mod memory_store;

/// Persisted state of one account.
///
/// Deposit requests are keyed by key index in a `BTreeMap` so iteration runs
/// in allocation order, which input selection relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Last issued key index; 0 means none was ever issued.
    pub key_index: u64,
    pub deposit_requests: BTreeMap<u64, StoredDepositRequest>,
    /// Pending transfers keyed by tail transaction hash.
    pub pending_transfers: BTreeMap<String, PendingTransfer>,
}

impl AccountState {
    /// An account is new until it allocates an index or records a transfer.
    pub fn is_new(&self) -> bool {
        self.key_index == 0
            && self.deposit_requests.is_empty()
            && self.pending_transfers.is_empty()
    }
}

/// Persistence collaborator of the account engine.
///
/// Implementations must be usable from multiple threads; the engine itself
/// serializes mutating calls behind the account lock.
pub trait Store: Send + Sync {
    /// Loads the state of the given account, creating an empty state if the
    /// account was never seen before.
    fn load_account(&self, id: &str) -> Result<AccountState, StoreError>;

    /// Persists the last issued key index.
    fn write_index(&self, id: &str, index: u64) -> Result<(), StoreError>;

    /// Records a deposit request under the given key index.
    fn add_deposit_request(
        &self,
        id: &str,
        index: u64,
        request: &StoredDepositRequest,
    ) -> Result<(), StoreError>;

    /// All currently allocated deposit requests, keyed by key index.
    fn deposit_requests(&self, id: &str)
    -> Result<BTreeMap<u64, StoredDepositRequest>, StoreError>;

    /// Frees a single deposit request. Unknown indices are a no-op.
    fn remove_deposit_request(&self, id: &str, index: u64) -> Result<(), StoreError>;

    /// Records a pending transfer and, in the same step, frees the deposit
    /// requests named by its `freed_indices`.
    fn add_pending_transfer(&self, id: &str, transfer: &PendingTransfer)
    -> Result<(), StoreError>;
}
