use serde::{Deserialize, Serialize};

use crate::address::{Address, SecurityLevel};

/// A transfer destination with the value to send to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: Address,
    pub value: u64,
    pub tag: Option<String>,
    pub message: Option<String>,
}

impl Recipient {
    pub fn new(address: Address, value: u64) -> Self {
        Self {
            address,
            value,
            tag: None,
            message: None,
        }
    }
}

/// A deposit address realized as a spend source of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub address: Address,
    pub key_index: u64,
    pub balance: u64,
    pub security: SecurityLevel,
}

/// An outgoing transfer that has been persisted locally; it may or may not
/// have been broadcast or confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    /// Hash of the tail transaction, the handle for reattachment/promotion.
    pub tail_hash: String,
    /// Raw encoded transactions as produced by proof-of-work attachment.
    pub raw: Vec<String>,
    /// Key indices whose deposit requests this transfer consumes.
    pub freed_indices: Vec<u64>,
}

/// Options handed to the ledger client when preparing a transfer.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub inputs: Vec<Input>,
    pub remainder_address: Option<Address>,
    /// Seconds since the Unix epoch, taken from the injected clock.
    pub timestamp: u64,
    pub security: SecurityLevel,
}

/// One transaction inside a bundle, as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleTransaction {
    pub hash: String,
    /// Bundle hash; reattachments of the same transfer share it.
    pub bundle: String,
    pub address: Address,
    /// Positive for deposits into the address, negative for spends from it.
    pub value: i64,
}

/// A bundle of transactions with its confirmation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// Tail transaction first.
    pub transactions: Vec<BundleTransaction>,
    pub confirmed: bool,
}

impl Bundle {
    /// Hash of the tail transaction, if the bundle is non-empty.
    pub fn tail_hash(&self) -> Option<&str> {
        self.transactions.first().map(|tx| tx.hash.as_str())
    }

    /// The bundle hash identifying this transfer family across reattachments.
    pub fn bundle_hash(&self) -> Option<&str> {
        self.transactions.first().map(|tx| tx.bundle.as_str())
    }

    /// Whether this bundle moves a positive value onto the given address.
    pub fn deposits_to(&self, address: &Address) -> bool {
        self.transactions
            .iter()
            .any(|tx| tx.value > 0 && &tx.address == address)
    }
}

/// Result of attaching a prepared transfer via proof-of-work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedTransfer {
    pub tail_hash: String,
    pub raw: Vec<String>,
}
