use crate::address::{Address, Seed};
use crate::error::LedgerError;
use crate::transfer::{AttachedTransfer, Bundle, Recipient, TransferOptions};

/// A ledger-wide marker defining a consistent snapshot for balance queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint(pub String);

/// A pair of tip transactions to reference when attaching a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tips {
    pub trunk: String,
    pub branch: String,
}

/// Wire-level collaborator speaking to the ledger network.
///
/// The engine performs no retries, timeouts or cancellation against it;
/// those are the implementation's responsibility.
pub trait LedgerClient: Send + Sync {
    /// The latest checkpoint to pin balance queries against.
    fn latest_checkpoint(&self) -> Result<Checkpoint, LedgerError>;

    /// Balances of the given addresses at the given checkpoint, in the same
    /// order as the input slice.
    fn balances(&self, addresses: &[Address], checkpoint: &Checkpoint)
    -> Result<Vec<u64>, LedgerError>;

    /// All bundles touching the given address, with confirmation state.
    fn bundles_from_address(&self, address: &Address) -> Result<Vec<Bundle>, LedgerError>;

    /// Whether the transaction is currently consistent, i.e. attachable to a
    /// tip without conflicting with the ledger.
    fn is_consistent(&self, tail_hash: &str) -> Result<bool, LedgerError>;

    /// Assembles and signs the raw transfer out of recipients and options.
    fn prepare_transfer(
        &self,
        seed: &Seed,
        recipients: &[Recipient],
        options: &TransferOptions,
    ) -> Result<Vec<String>, LedgerError>;

    /// Selects two tips to approve, walking back `depth` checkpoints.
    fn tips(&self, depth: u64) -> Result<Tips, LedgerError>;

    /// Performs proof-of-work over the raw transfer against the given tips.
    fn attach(
        &self,
        tips: &Tips,
        min_weight_magnitude: u64,
        raw: &[String],
    ) -> Result<AttachedTransfer, LedgerError>;

    /// Stores the attached transfer on the network and broadcasts it,
    /// returning the finalized bundle.
    fn store_and_broadcast(&self, raw: &[String]) -> Result<Bundle, LedgerError>;
}
