use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::deposit::StoredDepositRequest;
use crate::error::StoreError;
use crate::transfer::PendingTransfer;

use super::{AccountState, Store};

/// In-memory [`Store`], the reference implementation and the test backend.
#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<HashMap<String, AccountState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut AccountState) -> T,
    ) -> Result<T, StoreError> {
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| StoreError("memory store mutex poisoned".into()))?;
        Ok(f(accounts.entry(id.to_owned()).or_default()))
    }
}

impl Store for MemoryStore {
    fn load_account(&self, id: &str) -> Result<AccountState, StoreError> {
        self.with_state(id, |state| state.clone())
    }

    fn write_index(&self, id: &str, index: u64) -> Result<(), StoreError> {
        self.with_state(id, |state| state.key_index = index)
    }

    fn add_deposit_request(
        &self,
        id: &str,
        index: u64,
        request: &StoredDepositRequest,
    ) -> Result<(), StoreError> {
        self.with_state(id, |state| {
            state.deposit_requests.insert(index, request.clone());
        })
    }

    fn deposit_requests(
        &self,
        id: &str,
    ) -> Result<BTreeMap<u64, StoredDepositRequest>, StoreError> {
        self.with_state(id, |state| state.deposit_requests.clone())
    }

    fn remove_deposit_request(&self, id: &str, index: u64) -> Result<(), StoreError> {
        self.with_state(id, |state| {
            state.deposit_requests.remove(&index);
        })
    }

    fn add_pending_transfer(
        &self,
        id: &str,
        transfer: &PendingTransfer,
    ) -> Result<(), StoreError> {
        self.with_state(id, |state| {
            for index in &transfer.freed_indices {
                state.deposit_requests.remove(index);
            }
            state
                .pending_transfers
                .insert(transfer.tail_hash.clone(), transfer.clone());
        })
    }
}
