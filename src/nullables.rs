//! Nullable collaborators for deterministic testing.
//!
//! Every external dependency of the engine (store, ledger, signer, seed,
//! clock, events, plugins) is a trait; this module provides controllable
//! implementations that return fixed values and never touch a network.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use crate::address::{
    Address, CHECKSUM_TRYTES, HASH_TRYTES, SEED_TRYTES, SecurityLevel, Seed,
};
use crate::error::{ClockError, LedgerError, PluginError, SeedError, SignerError};
use crate::ledger::{Checkpoint, LedgerClient, Tips};
use crate::settings::{AccountEvent, Clock, EventEmitter, Plugin, SeedProvider, Signer};
use crate::transfer::{AttachedTransfer, Bundle, BundleTransaction, Recipient, TransferOptions};

/// A deterministic clock; time only advances when told to.
pub struct NullClock {
    current: Mutex<u64>,
}

impl NullClock {
    pub fn new(initial_secs: u64) -> Self {
        Self {
            current: Mutex::new(initial_secs),
        }
    }

    pub fn advance(&self, secs: u64) {
        *self.current.lock().unwrap() += secs;
    }

    pub fn set(&self, secs: u64) {
        *self.current.lock().unwrap() = secs;
    }
}

impl Clock for NullClock {
    fn now(&self) -> Result<SystemTime, ClockError> {
        let secs = *self.current.lock().unwrap();
        Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
    }
}

/// Serves a fixed seed.
pub struct NullSeedProvider {
    seed: Seed,
}

impl NullSeedProvider {
    pub fn new(seed: Seed) -> Self {
        Self { seed }
    }
}

impl Default for NullSeedProvider {
    fn default() -> Self {
        Self {
            seed: Seed::new("9".repeat(SEED_TRYTES)).expect("all-9 seed is valid"),
        }
    }
}

impl SeedProvider for NullSeedProvider {
    fn seed(&self) -> Result<Seed, SeedError> {
        Ok(self.seed.clone())
    }
}

/// Derives a fixed-output address per key index: the hash is the index's
/// letter (`A` for 1, `B` for 2, ...) repeated, the checksum all `9`s.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSigner;

/// The address the [`NullSigner`] derives for the given key index.
pub fn null_address(index: u64, with_checksum: bool) -> Address {
    let letter = (b'A' + (index % 26) as u8) as char;
    let mut trytes = letter.to_string().repeat(HASH_TRYTES);
    if with_checksum {
        trytes.push_str(&"9".repeat(CHECKSUM_TRYTES));
    }
    Address::new(trytes).expect("generated trytes are valid")
}

impl Signer for NullSigner {
    fn generate_address(
        &self,
        _seed: &Seed,
        index: u64,
        _security: SecurityLevel,
        with_checksum: bool,
    ) -> Result<Address, SignerError> {
        Ok(null_address(index, with_checksum))
    }
}

#[derive(Default)]
struct NullLedgerState {
    balances: HashMap<String, u64>,
    bundles: HashMap<String, Vec<Bundle>>,
    consistency: HashMap<String, bool>,
    failing_consistency: Vec<String>,
    fail_broadcasts: bool,
    broadcasts: Vec<Vec<String>>,
    last_options: Option<TransferOptions>,
}

/// Programmable in-memory ledger.
///
/// Balances, bundle histories and consistency verdicts are scripted up
/// front; transfer preparation, tip selection, attachment and broadcast
/// produce canned values and record what they were given.
#[derive(Default)]
pub struct NullLedger {
    state: Mutex<NullLedgerState>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, address: &Address, balance: u64) {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(address.hash().to_owned(), balance);
    }

    pub fn add_bundle(&self, address: &Address, bundle: Bundle) {
        self.state
            .lock()
            .unwrap()
            .bundles
            .entry(address.hash().to_owned())
            .or_default()
            .push(bundle);
    }

    pub fn set_consistency(&self, tail_hash: &str, consistent: bool) {
        self.state
            .lock()
            .unwrap()
            .consistency
            .insert(tail_hash.to_owned(), consistent);
    }

    /// Make `is_consistent` fail for the given tail hash.
    pub fn fail_consistency(&self, tail_hash: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_consistency
            .push(tail_hash.to_owned());
    }

    /// Make every `store_and_broadcast` call fail.
    pub fn fail_broadcasts(&self) {
        self.state.lock().unwrap().fail_broadcasts = true;
    }

    /// Raw transfers handed to `store_and_broadcast` so far.
    pub fn broadcasts(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    /// Options of the most recent `prepare_transfer` call.
    pub fn last_options(&self) -> Option<TransferOptions> {
        self.state.lock().unwrap().last_options.clone()
    }
}

impl LedgerClient for NullLedger {
    fn latest_checkpoint(&self) -> Result<Checkpoint, LedgerError> {
        Ok(Checkpoint("NULLCHECKPOINT".into()))
    }

    fn balances(
        &self,
        addresses: &[Address],
        _checkpoint: &Checkpoint,
    ) -> Result<Vec<u64>, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(addresses
            .iter()
            .map(|addr| state.balances.get(addr.hash()).copied().unwrap_or(0))
            .collect())
    }

    fn bundles_from_address(&self, address: &Address) -> Result<Vec<Bundle>, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state.bundles.get(address.hash()).cloned().unwrap_or_default())
    }

    fn is_consistent(&self, tail_hash: &str) -> Result<bool, LedgerError> {
        let state = self.state.lock().unwrap();
        if state.failing_consistency.iter().any(|t| t == tail_hash) {
            return Err(LedgerError(format!("consistency check for {tail_hash} failed")));
        }
        Ok(state.consistency.get(tail_hash).copied().unwrap_or(false))
    }

    fn prepare_transfer(
        &self,
        _seed: &Seed,
        recipients: &[Recipient],
        options: &TransferOptions,
    ) -> Result<Vec<String>, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.last_options = Some(options.clone());
        let count = recipients.len() + options.inputs.len();
        Ok((0..count.max(1)).map(|i| format!("RAW{i}")).collect())
    }

    fn tips(&self, _depth: u64) -> Result<Tips, LedgerError> {
        Ok(Tips {
            trunk: "TRUNK".into(),
            branch: "BRANCH".into(),
        })
    }

    fn attach(
        &self,
        _tips: &Tips,
        _min_weight_magnitude: u64,
        raw: &[String],
    ) -> Result<AttachedTransfer, LedgerError> {
        Ok(AttachedTransfer {
            tail_hash: "NULLTAIL".into(),
            raw: raw.to_vec(),
        })
    }

    fn store_and_broadcast(&self, raw: &[String]) -> Result<Bundle, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_broadcasts {
            return Err(LedgerError("broadcast scripted to fail".into()));
        }
        state.broadcasts.push(raw.to_vec());
        Ok(Bundle {
            transactions: vec![BundleTransaction {
                hash: "NULLTAIL".into(),
                bundle: "NULLBUNDLE".into(),
                address: null_address(0, false),
                value: 0,
            }],
            confirmed: false,
        })
    }
}

/// Records every emitted event.
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<AccountEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AccountEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit(&self, event: AccountEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Counts starts and shutdowns; optionally fails either.
pub struct NullPlugin {
    name: String,
    starts: AtomicUsize,
    shutdowns: AtomicUsize,
    fail_start: bool,
    fail_shutdown: bool,
}

impl NullPlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            starts: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            fail_start: false,
            fail_shutdown: false,
        }
    }

    pub fn failing_start(name: impl Into<String>) -> Self {
        Self {
            fail_start: true,
            ..Self::new(name)
        }
    }

    pub fn failing_shutdown(name: impl Into<String>) -> Self {
        Self {
            fail_shutdown: true,
            ..Self::new(name)
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl Plugin for NullPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, _account: &crate::account::Account) -> Result<(), PluginError> {
        if self.fail_start {
            return Err(PluginError("start scripted to fail".into()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        if self.fail_shutdown {
            return Err(PluginError("shutdown scripted to fail".into()));
        }
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
