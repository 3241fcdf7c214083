use std::sync::Arc;
use std::time::SystemTime;

use crate::account::Account;
use crate::address::{Address, SecurityLevel, Seed};
use crate::error::{ClockError, PluginError, SeedError, SignerError};
use crate::ledger::LedgerClient;
use crate::selection::InputSelectionStrategy;
use crate::selection::timeout_strategy::TimeoutStrategy;
use crate::store::Store;
use crate::transfer::Bundle;

/// Source of the account's secret seed material.
pub trait SeedProvider: Send + Sync {
    fn seed(&self) -> Result<Seed, SeedError>;
}

/// Deterministic address derivation.
///
/// `generate_address` must be a pure function of its arguments: the same
/// seed, index and security level always reproduce the same address.
pub trait Signer: Send + Sync {
    fn generate_address(
        &self,
        seed: &Seed,
        index: u64,
        security: SecurityLevel,
        with_checksum: bool,
    ) -> Result<Address, SignerError>;
}

/// Time source, injected so the send pipeline stays deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> Result<SystemTime, ClockError>;
}

/// Wall-clock [`Clock`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<SystemTime, ClockError> {
        Ok(SystemTime::now())
    }
}

/// Lifecycle and transfer notifications, fire-and-forget.
#[derive(Debug, Clone)]
pub enum AccountEvent {
    /// The account was shut down.
    Shutdown,
    /// A transfer was handed to the network for broadcast.
    SendingTransfer(Bundle),
}

pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: AccountEvent);
}

/// [`EventEmitter`] that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmitter;

impl EventEmitter for NullEmitter {
    fn emit(&self, _event: AccountEvent) {}
}

/// An injected background worker started and stopped in lock-step with the
/// account lifecycle.
///
/// `start` runs while the account lock is held; implementations must defer
/// any call back into the account to their own threads.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn start(&self, account: &Account) -> Result<(), PluginError>;
    fn shutdown(&self) -> Result<(), PluginError>;
}

/// Immutable configuration snapshot of an account.
///
/// A snapshot is replaced wholesale via
/// [`Account::update_settings`](crate::account::Account::update_settings),
/// never mutated in place, so plugins never observe a torn configuration.
#[derive(Clone)]
pub struct Settings {
    pub seed_provider: Arc<dyn SeedProvider>,
    pub store: Arc<dyn Store>,
    pub ledger: Arc<dyn LedgerClient>,
    pub signer: Arc<dyn Signer>,
    pub clock: Arc<dyn Clock>,
    pub events: Arc<dyn EventEmitter>,
    pub plugins: Vec<Arc<dyn Plugin>>,
    pub input_strategy: Arc<dyn InputSelectionStrategy>,
    pub security_level: SecurityLevel,
    /// How many checkpoints tip selection walks back.
    pub depth: u64,
    /// Proof-of-work difficulty handed to the ledger client.
    pub min_weight_magnitude: u64,
}

impl Settings {
    /// Settings with the default strategy, system clock, no events and no
    /// plugins; override fields as needed.
    pub fn new(
        seed_provider: Arc<dyn SeedProvider>,
        store: Arc<dyn Store>,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn Signer>,
    ) -> Self {
        Self {
            seed_provider,
            store,
            ledger,
            signer,
            clock: Arc::new(SystemClock),
            events: Arc::new(NullEmitter),
            plugins: Vec::new(),
            input_strategy: Arc::new(TimeoutStrategy),
            security_level: SecurityLevel::default(),
            depth: 3,
            min_weight_magnitude: 14,
        }
    }
}
