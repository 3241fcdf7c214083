use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::address::{Address, SecurityLevel};

/// Minimum distance between now and a requested timeout; a margin against
/// network propagation delay and clock skew between sender and receiver.
pub const TIMEOUT_SAFETY_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Rules governing when an allocated deposit address becomes eligible to be
/// swept as a transaction input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRequest {
    /// Instant after which the address may be spent even if unfunded
    /// expectations were not met. `None` denotes a remainder address.
    pub timeout_at: Option<SystemTime>,
    /// Whether the address is expected to receive several incoming transfers
    /// before being swept.
    pub multi_use: bool,
    /// Amount the depositor is expected to transfer; the address is not
    /// selected before its balance reaches this amount.
    pub expected_amount: Option<u64>,
}

impl DepositRequest {
    /// A request with no timeout denotes a remainder (change) address; such
    /// requests always carry an expected amount.
    pub fn is_remainder(&self) -> bool {
        self.timeout_at.is_none()
    }
}

/// A [`DepositRequest`] as persisted by the store, pinned to the security
/// level it was allocated under so the address stays reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDepositRequest {
    pub request: DepositRequest,
    pub security_level: SecurityLevel,
}

/// The outcome of allocating a deposit request: the derived address together
/// with the conditions the depositor must honor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositConditions {
    pub address: Address,
    pub request: DepositRequest,
}
