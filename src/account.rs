use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::deposit::{DepositConditions, DepositRequest, StoredDepositRequest, TIMEOUT_SAFETY_MARGIN};
use crate::error::Error;
use crate::selection::SelectionContext;
use crate::settings::{AccountEvent, Settings};
use crate::transfer::{Bundle, PendingTransfer, Recipient, TransferOptions};

/// A thread-safe account: deposit address management, input selection and
/// transfer sending against a remote ledger.
///
/// All mutating operations serialize on one per-account writer lock; balance
/// and status queries share a reader lock. Every operation except
/// [`start`](Self::start) is rejected with [`Error::NotRunning`] while the
/// account is stopped.
pub struct Account {
    id: String,
    inner: RwLock<Inner>,
}

struct Inner {
    running: bool,
    settings: Arc<Settings>,
    last_key_index: u64,
}

impl Account {
    /// Creates the account for the seed served by the settings' seed
    /// provider. The identifier is the hex-encoded SHA-256 of the seed; the
    /// seed itself is never retained.
    pub fn new(settings: Settings) -> Result<Self, Error> {
        let seed = settings
            .seed_provider
            .seed()
            .map_err(|e| Error::seed("fetching the seed during account construction", e))?;
        let id = hex::encode(Sha256::digest(seed.as_str().as_bytes()));
        Ok(Self {
            id,
            inner: RwLock::new(Inner {
                running: false,
                settings: Arc::new(settings),
                last_key_index: 0,
            }),
        })
    }

    /// The account's identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Loads the persisted key index, starts the configured plugins and
    /// marks the account running. A failure leaves the account stopped.
    pub fn start(&self) -> Result<(), Error> {
        let mut inner = self.write()?;
        let state = inner
            .settings
            .store
            .load_account(&self.id)
            .map_err(|e| Error::store("loading the persisted state at startup", e))?;
        inner.last_key_index = state.key_index;

        let settings = inner.settings.clone();
        self.start_plugins(&settings)?;

        inner.running = true;
        debug!(account = %self.id, key_index = state.key_index, "account started");
        Ok(())
    }

    /// Stops the account: clears the running flag first (blocking new
    /// callers), shuts the plugins down, then emits
    /// [`AccountEvent::Shutdown`].
    pub fn shutdown(&self) -> Result<(), Error> {
        let mut inner = self.write()?;
        if !inner.running {
            return Err(Error::NotRunning);
        }
        inner.running = false;
        shutdown_plugins(&inner.settings)?;
        inner.settings.events.emit(AccountEvent::Shutdown);
        debug!(account = %self.id, "account shut down");
        Ok(())
    }

    /// Swaps in a new immutable settings snapshot.
    ///
    /// Plugins are stopped under the old settings and restarted under the
    /// new ones. A stop failure aborts before the swap; a restart failure
    /// surfaces after it, with the new settings already in place.
    pub fn update_settings(&self, settings: Settings) -> Result<(), Error> {
        let mut inner = self.write()?;
        if !inner.running {
            return Err(Error::NotRunning);
        }
        shutdown_plugins(&inner.settings)?;

        inner.settings = Arc::new(settings);

        let settings = inner.settings.clone();
        self.start_plugins(&settings)?;
        Ok(())
    }

    /// Allocates a new deposit address under the given request.
    ///
    /// The request must carry a timeout at least [`TIMEOUT_SAFETY_MARGIN`]
    /// in the future. The key index consumed here is never reused, even if a
    /// later persistence step fails.
    pub fn allocate_deposit_request(
        &self,
        request: &DepositRequest,
    ) -> Result<DepositConditions, Error> {
        let mut inner = self.write()?;
        if !inner.running {
            return Err(Error::NotRunning);
        }

        let Some(timeout_at) = request.timeout_at else {
            return Err(Error::TimeoutNotSpecified);
        };
        let now = inner
            .settings
            .clock
            .now()
            .map_err(|e| Error::clock("reading the time for deposit allocation", e))?;
        if timeout_at < now + TIMEOUT_SAFETY_MARGIN {
            return Err(Error::TimeoutTooLow);
        }

        allocate(&mut inner, &self.id, request)
    }

    /// Sends the given values to the given recipients and returns the
    /// finalized bundle.
    ///
    /// Recipient addresses must be in the checksummed format. The pending
    /// transfer is persisted before it is broadcast, so a crash in between
    /// is recoverable by external reattachment tooling.
    pub fn send(&self, recipients: &[Recipient]) -> Result<Bundle, Error> {
        let mut inner = self.write()?;
        if !inner.running {
            return Err(Error::NotRunning);
        }
        if recipients.is_empty() {
            return Err(Error::EmptyRecipients);
        }
        for recipient in recipients {
            if !recipient.address.is_checksummed() {
                return Err(Error::InvalidAddress(recipient.address.to_string()));
            }
        }
        self.send_locked(&mut inner, recipients)
    }

    /// The balance usable as transfer input right now, probed through the
    /// configured input-selection strategy.
    pub fn available_balance(&self) -> Result<u64, Error> {
        let inner = self.read()?;
        if !inner.running {
            return Err(Error::NotRunning);
        }
        let ctx = SelectionContext {
            account_id: &self.id,
            settings: &inner.settings,
        };
        let selection = inner.settings.input_strategy.select(&ctx, 0, true)?;
        Ok(selection.sum)
    }

    /// The gross balance across every allocated deposit address, regardless
    /// of spendability. Not usable as a transferable amount; see
    /// [`available_balance`](Self::available_balance).
    pub fn total_balance(&self) -> Result<u64, Error> {
        let inner = self.read()?;
        if !inner.running {
            return Err(Error::NotRunning);
        }
        let setts = &inner.settings;

        let state = setts
            .store
            .load_account(&self.id)
            .map_err(|e| Error::store("loading the account state for the total balance", e))?;
        if state.deposit_requests.is_empty() {
            return Ok(0);
        }

        let checkpoint = setts
            .ledger
            .latest_checkpoint()
            .map_err(|e| Error::ledger("fetching the latest checkpoint for the total balance", e))?;
        let seed = setts
            .seed_provider
            .seed()
            .map_err(|e| Error::seed("fetching the seed for the total balance", e))?;

        let mut addresses = Vec::with_capacity(state.deposit_requests.len());
        for (&index, stored) in &state.deposit_requests {
            let address = setts
                .signer
                .generate_address(&seed, index, stored.security_level, false)
                .map_err(|e| Error::signer("deriving an address for the total balance", e))?;
            addresses.push(address);
        }
        let balances = setts
            .ledger
            .balances(&addresses, &checkpoint)
            .map_err(|e| Error::ledger("fetching balances for the total balance", e))?;
        Ok(balances.iter().sum())
    }

    /// Whether the account has never allocated an address or sent a
    /// transfer.
    pub fn is_new(&self) -> Result<bool, Error> {
        let inner = self.read()?;
        if !inner.running {
            return Err(Error::NotRunning);
        }
        let state = inner
            .settings
            .store
            .load_account(&self.id)
            .map_err(|e| Error::store("loading the account state for the is-new check", e))?;
        Ok(state.is_new())
    }

    fn send_locked(&self, inner: &mut Inner, recipients: &[Recipient]) -> Result<Bundle, Error> {
        let setts = inner.settings.clone();
        let transfer_sum: u64 = recipients.iter().map(|r| r.value).sum();

        let mut inputs = Vec::new();
        let mut freed_indices = Vec::new();
        let mut remainder_address = None;

        if transfer_sum > 0 {
            let ctx = SelectionContext {
                account_id: &self.id,
                settings: &setts,
            };
            let selection = setts.input_strategy.select(&ctx, transfer_sum, false)?;
            inputs = selection.inputs;
            freed_indices = selection.freed_indices;

            // surplus goes to a freshly allocated remainder address
            if selection.sum > transfer_sum {
                let surplus = selection.sum - transfer_sum;
                let conditions = allocate(
                    inner,
                    &self.id,
                    &DepositRequest {
                        expected_amount: Some(surplus),
                        ..Default::default()
                    },
                )?;
                remainder_address = Some(conditions.address);
            }
        }

        let now = setts
            .clock
            .now()
            .map_err(|e| Error::clock("reading the time for the transfer timestamp", e))?;
        let timestamp = now
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let options = TransferOptions {
            inputs,
            remainder_address,
            timestamp,
            security: setts.security_level,
        };
        let seed = setts
            .seed_provider
            .seed()
            .map_err(|e| Error::seed("fetching the seed for the send", e))?;
        let raw = setts
            .ledger
            .prepare_transfer(&seed, recipients, &options)
            .map_err(|e| Error::ledger("preparing the transfer", e))?;
        let tips = setts
            .ledger
            .tips(setts.depth)
            .map_err(|e| Error::ledger("selecting tips for the transfer", e))?;
        let attached = setts
            .ledger
            .attach(&tips, setts.min_weight_magnitude, &raw)
            .map_err(|e| Error::ledger("performing proof-of-work on the transfer", e))?;

        // durability precedes visibility: a crash after this point is
        // recoverable by reattachment, a crash before it loses nothing
        let pending = PendingTransfer {
            tail_hash: attached.tail_hash.clone(),
            raw: attached.raw.clone(),
            freed_indices,
        };
        setts
            .store
            .add_pending_transfer(&self.id, &pending)
            .map_err(|e| Error::store("persisting the pending transfer", e))?;

        let bundle = setts
            .ledger
            .store_and_broadcast(&attached.raw)
            .map_err(|e| Error::ledger("broadcasting the transfer", e))?;

        setts.events.emit(AccountEvent::SendingTransfer(bundle.clone()));
        debug!(
            account = %self.id,
            tail = %attached.tail_hash,
            value = transfer_sum,
            "transfer sent"
        );
        Ok(bundle)
    }

    fn start_plugins(&self, settings: &Settings) -> Result<(), Error> {
        for plugin in &settings.plugins {
            plugin.start(self).map_err(|source| Error::Plugin {
                phase: "start",
                name: plugin.name().to_owned(),
                source,
            })?;
        }
        Ok(())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, Error> {
        self.inner.write().map_err(|_| Error::LockPoisoned)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, Error> {
        self.inner.read().map_err(|_| Error::LockPoisoned)
    }
}

fn shutdown_plugins(settings: &Settings) -> Result<(), Error> {
    for plugin in &settings.plugins {
        plugin.shutdown().map_err(|source| Error::Plugin {
            phase: "shut down",
            name: plugin.name().to_owned(),
            source,
        })?;
    }
    Ok(())
}

/// Issues the next key index, derives its address and persists the request.
/// The index increment sticks even when a later step fails: a skipped index
/// is tolerated, a reused one is not.
fn allocate(
    inner: &mut Inner,
    account_id: &str,
    request: &DepositRequest,
) -> Result<DepositConditions, Error> {
    let setts = inner.settings.clone();

    let seed = setts
        .seed_provider
        .seed()
        .map_err(|e| Error::seed("fetching the seed for deposit allocation", e))?;

    inner.last_key_index += 1;
    let index = inner.last_key_index;

    let address = setts
        .signer
        .generate_address(&seed, index, setts.security_level, true)
        .map_err(|e| Error::signer("deriving the deposit address", e))?;
    setts
        .store
        .write_index(account_id, index)
        .map_err(|e| Error::store("persisting the key index", e))?;
    setts
        .store
        .add_deposit_request(
            account_id,
            index,
            &StoredDepositRequest {
                request: request.clone(),
                security_level: setts.security_level,
            },
        )
        .map_err(|e| Error::store("persisting the deposit request", e))?;

    debug!(account = account_id, index, "allocated deposit request");
    Ok(DepositConditions {
        address,
        request: request.clone(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::StoreError;
    use crate::nullables::{
        NullClock, NullLedger, NullPlugin, NullSeedProvider, NullSigner, RecordingEmitter,
        null_address,
    };
    use crate::store::memory_store::MemoryStore;
    use crate::store::{AccountState, Store};

    const NOW: u64 = 100_000;

    struct Fixture {
        store: Arc<MemoryStore>,
        ledger: Arc<NullLedger>,
        clock: Arc<NullClock>,
        emitter: Arc<RecordingEmitter>,
        settings: Settings,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(NullLedger::new());
        let clock = Arc::new(NullClock::new(NOW));
        let emitter = Arc::new(RecordingEmitter::new());
        let mut settings = Settings::new(
            Arc::new(NullSeedProvider::default()),
            store.clone(),
            ledger.clone(),
            Arc::new(NullSigner),
        );
        settings.clock = clock.clone();
        settings.events = emitter.clone();
        Fixture {
            store,
            ledger,
            clock,
            emitter,
            settings,
        }
    }

    fn running_account(fx: &Fixture) -> Account {
        let account = Account::new(fx.settings.clone()).unwrap();
        account.start().unwrap();
        account
    }

    fn timed_request(offset_secs: u64) -> DepositRequest {
        DepositRequest {
            timeout_at: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(NOW + offset_secs)),
            ..Default::default()
        }
    }

    fn deposit_requests(fx: &Fixture, account: &Account) -> BTreeMap<u64, StoredDepositRequest> {
        fx.store.deposit_requests(account.id()).unwrap()
    }

    /// Delegates to a [`MemoryStore`] but fails scripted operations once.
    struct FlakyStore {
        inner: MemoryStore,
        fail_write_index: AtomicBool,
        fail_add_pending: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                fail_write_index: AtomicBool::new(false),
                fail_add_pending: AtomicBool::new(false),
            }
        }

        fn trip(flag: &AtomicBool) -> Result<(), StoreError> {
            if flag.swap(false, Ordering::SeqCst) {
                return Err(StoreError("scripted failure".into()));
            }
            Ok(())
        }
    }

    impl Store for FlakyStore {
        fn load_account(&self, id: &str) -> Result<AccountState, StoreError> {
            self.inner.load_account(id)
        }

        fn write_index(&self, id: &str, index: u64) -> Result<(), StoreError> {
            Self::trip(&self.fail_write_index)?;
            self.inner.write_index(id, index)
        }

        fn add_deposit_request(
            &self,
            id: &str,
            index: u64,
            request: &StoredDepositRequest,
        ) -> Result<(), StoreError> {
            self.inner.add_deposit_request(id, index, request)
        }

        fn deposit_requests(
            &self,
            id: &str,
        ) -> Result<BTreeMap<u64, StoredDepositRequest>, StoreError> {
            self.inner.deposit_requests(id)
        }

        fn remove_deposit_request(&self, id: &str, index: u64) -> Result<(), StoreError> {
            self.inner.remove_deposit_request(id, index)
        }

        fn add_pending_transfer(
            &self,
            id: &str,
            transfer: &PendingTransfer,
        ) -> Result<(), StoreError> {
            Self::trip(&self.fail_add_pending)?;
            self.inner.add_pending_transfer(id, transfer)
        }
    }

    #[test]
    fn id_is_derived_from_the_seed_and_irreversible() {
        let fx = fixture();
        let a = Account::new(fx.settings.clone()).unwrap();
        let b = Account::new(fx.settings.clone()).unwrap();
        assert_eq!(a.id(), b.id());
        // hex-encoded sha256
        assert_eq!(a.id().len(), 64);
        assert!(a.id().bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn operations_require_a_running_account() {
        let fx = fixture();
        let account = Account::new(fx.settings.clone()).unwrap();

        assert!(matches!(account.shutdown(), Err(Error::NotRunning)));
        assert!(matches!(
            account.send(&[Recipient::new(null_address(1, true), 1)]),
            Err(Error::NotRunning)
        ));
        assert!(matches!(
            account.allocate_deposit_request(&timed_request(600)),
            Err(Error::NotRunning)
        ));
        assert!(matches!(account.available_balance(), Err(Error::NotRunning)));
        assert!(matches!(account.total_balance(), Err(Error::NotRunning)));
        assert!(matches!(account.is_new(), Err(Error::NotRunning)));
        assert!(matches!(
            account.update_settings(fx.settings.clone()),
            Err(Error::NotRunning)
        ));
    }

    #[test]
    fn shutdown_stops_the_account_and_emits() {
        let fx = fixture();
        let account = running_account(&fx);
        account.shutdown().unwrap();

        assert!(matches!(account.shutdown(), Err(Error::NotRunning)));
        assert!(matches!(
            fx.emitter.events().as_slice(),
            [AccountEvent::Shutdown]
        ));
    }

    #[test]
    fn start_resumes_from_the_persisted_key_index() {
        let fx = fixture();
        let account = Account::new(fx.settings.clone()).unwrap();
        fx.store.write_index(account.id(), 7).unwrap();
        account.start().unwrap();

        let conditions = account.allocate_deposit_request(&timed_request(600)).unwrap();
        assert_eq!(conditions.address, null_address(8, true));
        assert_eq!(fx.store.load_account(account.id()).unwrap().key_index, 8);
    }

    #[test]
    fn allocation_validates_the_timeout() {
        let fx = fixture();
        let account = running_account(&fx);

        let no_timeout = DepositRequest::default();
        assert!(matches!(
            account.allocate_deposit_request(&no_timeout),
            Err(Error::TimeoutNotSpecified)
        ));

        // 2 minutes is inside the safety margin
        assert!(matches!(
            account.allocate_deposit_request(&timed_request(120)),
            Err(Error::TimeoutTooLow)
        ));

        // exactly 5 minutes is accepted
        let conditions = account.allocate_deposit_request(&timed_request(300)).unwrap();
        assert_eq!(conditions.address, null_address(1, true));
        assert!(conditions.address.is_checksummed());

        let requests = deposit_requests(&fx, &account);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[&1].request, timed_request(300));
    }

    #[test]
    fn key_indices_are_never_reused_even_after_failures() {
        let store = Arc::new(FlakyStore::new());
        let mut fx = fixture();
        fx.settings.store = store.clone();
        let account = running_account(&fx);

        store.fail_write_index.store(true, Ordering::SeqCst);
        let err = account
            .allocate_deposit_request(&timed_request(600))
            .unwrap_err();
        assert!(matches!(err, Error::Store { phase, .. } if phase == "persisting the key index"));

        // index 1 is burned, the next allocation gets 2
        let conditions = account.allocate_deposit_request(&timed_request(600)).unwrap();
        assert_eq!(conditions.address, null_address(2, true));
        let indices: Vec<u64> = store
            .deposit_requests(account.id())
            .unwrap()
            .keys()
            .copied()
            .collect();
        assert_eq!(indices, vec![2]);
    }

    #[test]
    fn send_validates_recipients_before_any_collaborator_call() {
        let fx = fixture();
        let account = running_account(&fx);

        assert!(matches!(account.send(&[]), Err(Error::EmptyRecipients)));

        let unchecksummed = Recipient::new(null_address(1, false), 10);
        assert!(matches!(
            account.send(&[unchecksummed]),
            Err(Error::InvalidAddress(_))
        ));

        assert!(fx.ledger.broadcasts().is_empty());
        assert!(fx.ledger.last_options().is_none());
        assert!(fx.store.load_account(account.id()).unwrap().is_new());
    }

    #[test]
    fn send_selects_inputs_allocates_remainder_and_broadcasts() {
        let fx = fixture();
        let account = running_account(&fx);
        account.allocate_deposit_request(&timed_request(600)).unwrap();
        account.allocate_deposit_request(&timed_request(600)).unwrap();
        fx.ledger.set_balance(&null_address(1, false), 40);
        fx.ledger.set_balance(&null_address(2, false), 70);

        let bundle = account
            .send(&[Recipient::new(null_address(9, true), 100)])
            .unwrap();

        // both inputs consumed, surplus of 10 on a fresh remainder address
        let options = fx.ledger.last_options().unwrap();
        assert_eq!(options.inputs.len(), 2);
        assert_eq!(options.remainder_address, Some(null_address(3, true)));
        assert_eq!(options.timestamp, NOW);

        let state = fx.store.load_account(account.id()).unwrap();
        let pending: Vec<&PendingTransfer> = state.pending_transfers.values().collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].tail_hash, "NULLTAIL");
        assert_eq!(pending[0].freed_indices, vec![1, 2]);

        // only the remainder request is left, and it is a proper remainder
        let remaining = &state.deposit_requests;
        assert_eq!(remaining.len(), 1);
        let remainder = &remaining[&3].request;
        assert!(remainder.is_remainder());
        assert_eq!(remainder.expected_amount, Some(10));
        assert!(remainder.timeout_at.is_none());

        assert_eq!(fx.ledger.broadcasts().len(), 1);
        assert!(matches!(
            fx.emitter.events().as_slice(),
            [AccountEvent::SendingTransfer(b)] if *b == bundle
        ));
    }

    #[test]
    fn send_timestamp_comes_from_the_injected_clock() {
        let fx = fixture();
        let account = running_account(&fx);
        fx.clock.advance(5_000);

        account
            .send(&[Recipient::new(null_address(9, true), 0)])
            .unwrap();
        assert_eq!(fx.ledger.last_options().unwrap().timestamp, NOW + 5_000);
    }

    #[test]
    fn zero_value_send_skips_input_selection() {
        let fx = fixture();
        let account = running_account(&fx);

        account
            .send(&[Recipient::new(null_address(9, true), 0)])
            .unwrap();

        let options = fx.ledger.last_options().unwrap();
        assert!(options.inputs.is_empty());
        assert!(options.remainder_address.is_none());
        assert_eq!(fx.ledger.broadcasts().len(), 1);
    }

    #[test]
    fn send_persists_the_pending_transfer_before_broadcasting() {
        let fx = fixture();
        let account = running_account(&fx);
        fx.ledger.fail_broadcasts();

        let err = account
            .send(&[Recipient::new(null_address(9, true), 0)])
            .unwrap_err();
        assert!(matches!(err, Error::Ledger { phase, .. } if phase == "broadcasting the transfer"));

        // persisted despite the failed broadcast; reattachment can recover it
        let state = fx.store.load_account(account.id()).unwrap();
        assert_eq!(state.pending_transfers.len(), 1);
        assert!(fx.emitter.events().is_empty());
    }

    #[test]
    fn failed_persistence_prevents_the_broadcast() {
        let store = Arc::new(FlakyStore::new());
        let mut fx = fixture();
        fx.settings.store = store.clone();
        let account = running_account(&fx);

        store.fail_add_pending.store(true, Ordering::SeqCst);
        let err = account
            .send(&[Recipient::new(null_address(9, true), 0)])
            .unwrap_err();
        assert!(
            matches!(err, Error::Store { phase, .. } if phase == "persisting the pending transfer")
        );
        assert!(fx.ledger.broadcasts().is_empty());
    }

    #[test]
    fn insufficient_balance_aborts_the_send() {
        let fx = fixture();
        let account = running_account(&fx);
        account.allocate_deposit_request(&timed_request(600)).unwrap();
        fx.ledger.set_balance(&null_address(1, false), 30);

        let err = account
            .send(&[Recipient::new(null_address(9, true), 100)])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientBalance {
                requested: 100,
                selectable: 30
            }
        ));
        assert!(fx.ledger.broadcasts().is_empty());
    }

    #[test]
    fn available_and_total_balance_differ_on_spendability() {
        let fx = fixture();
        let account = running_account(&fx);
        // spendable
        account.allocate_deposit_request(&timed_request(600)).unwrap();
        fx.ledger.set_balance(&null_address(1, false), 40);
        // below its expected amount, counts only toward the total
        account
            .allocate_deposit_request(&DepositRequest {
                expected_amount: Some(50),
                ..timed_request(600)
            })
            .unwrap();
        fx.ledger.set_balance(&null_address(2, false), 10);

        assert_eq!(account.available_balance().unwrap(), 40);
        assert_eq!(account.total_balance().unwrap(), 50);
    }

    #[test]
    fn is_new_reflects_the_stored_state() {
        let fx = fixture();
        let account = running_account(&fx);
        assert!(account.is_new().unwrap());

        account.allocate_deposit_request(&timed_request(600)).unwrap();
        assert!(!account.is_new().unwrap());
    }

    #[test]
    fn plugins_follow_the_lifecycle() {
        let mut fx = fixture();
        let plugin = Arc::new(NullPlugin::new("worker"));
        fx.settings.plugins = vec![plugin.clone()];

        let account = running_account(&fx);
        assert_eq!(plugin.starts(), 1);
        assert_eq!(plugin.shutdowns(), 0);

        account.shutdown().unwrap();
        assert_eq!(plugin.shutdowns(), 1);
    }

    #[test]
    fn failed_plugin_start_leaves_the_account_stopped() {
        let mut fx = fixture();
        fx.settings.plugins = vec![Arc::new(NullPlugin::failing_start("broken"))];

        let account = Account::new(fx.settings.clone()).unwrap();
        let err = account.start().unwrap_err();
        assert!(matches!(err, Error::Plugin { phase: "start", .. }));
        assert!(matches!(account.is_new(), Err(Error::NotRunning)));
    }

    #[test]
    fn update_settings_restarts_plugins_under_the_new_snapshot() {
        let mut fx = fixture();
        let old_plugin = Arc::new(NullPlugin::new("old"));
        fx.settings.plugins = vec![old_plugin.clone()];
        let account = running_account(&fx);

        let new_plugin = Arc::new(NullPlugin::new("new"));
        let mut new_settings = fx.settings.clone();
        new_settings.plugins = vec![new_plugin.clone()];

        account.update_settings(new_settings).unwrap();
        assert_eq!(old_plugin.shutdowns(), 1);
        assert_eq!(new_plugin.starts(), 1);
    }

    #[test]
    fn update_settings_aborts_before_the_swap_when_stopping_fails() {
        let mut fx = fixture();
        fx.settings.plugins = vec![Arc::new(NullPlugin::failing_shutdown("stuck"))];
        let account = running_account(&fx);

        let new_plugin = Arc::new(NullPlugin::new("new"));
        let mut new_settings = fx.settings.clone();
        new_settings.plugins = vec![new_plugin.clone()];

        let err = account.update_settings(new_settings).unwrap_err();
        assert!(matches!(err, Error::Plugin { phase: "shut down", .. }));
        // the new snapshot never took effect
        assert_eq!(new_plugin.starts(), 0);
    }
}
