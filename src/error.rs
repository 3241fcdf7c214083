use thiserror::Error;

/// Failure reported by a [`Store`](crate::store::Store) implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Failure reported by a [`LedgerClient`](crate::ledger::LedgerClient) implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct LedgerError(pub String);

/// Failure reported by a [`Signer`](crate::settings::Signer) implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SignerError(pub String);

/// Failure reported by a [`SeedProvider`](crate::settings::SeedProvider) implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SeedError(pub String);

/// Failure reported by a [`Clock`](crate::settings::Clock) implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ClockError(pub String);

/// Failure reported by a [`Plugin`](crate::settings::Plugin) implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PluginError(pub String);

/// Everything that can go wrong when operating an account.
///
/// Collaborator failures are wrapped with the phase that was executing when
/// they occurred, so a caller can tell a failed balance query apart from a
/// failed broadcast without parsing messages.
#[derive(Debug, Error)]
pub enum Error {
    #[error("account is not running")]
    NotRunning,
    #[error("at least one recipient is required")]
    EmptyRecipients,
    #[error("invalid recipient address `{0}`")]
    InvalidAddress(String),
    #[error("deposit request must specify a timeout")]
    TimeoutNotSpecified,
    #[error("deposit request timeout must be at least 5 minutes in the future")]
    TimeoutTooLow,
    #[error("insufficient balance: requested {requested}, selectable {selectable}")]
    InsufficientBalance { requested: u64, selectable: u64 },
    #[error("account lock was poisoned by a panicked caller")]
    LockPoisoned,
    #[error("store error while {phase}: {source}")]
    Store {
        phase: &'static str,
        source: StoreError,
    },
    #[error("ledger error while {phase}: {source}")]
    Ledger {
        phase: &'static str,
        source: LedgerError,
    },
    #[error("signer error while {phase}: {source}")]
    Signer {
        phase: &'static str,
        source: SignerError,
    },
    #[error("seed provider error while {phase}: {source}")]
    Seed {
        phase: &'static str,
        source: SeedError,
    },
    #[error("clock error while {phase}: {source}")]
    Clock {
        phase: &'static str,
        source: ClockError,
    },
    #[error("unable to {phase} plugin `{name}`: {source}")]
    Plugin {
        phase: &'static str,
        name: String,
        source: PluginError,
    },
}

impl Error {
    pub(crate) fn store(phase: &'static str, source: StoreError) -> Self {
        Self::Store { phase, source }
    }

    pub(crate) fn ledger(phase: &'static str, source: LedgerError) -> Self {
        Self::Ledger { phase, source }
    }

    pub(crate) fn signer(phase: &'static str, source: SignerError) -> Self {
        Self::Signer { phase, source }
    }

    pub(crate) fn seed(phase: &'static str, source: SeedError) -> Self {
        Self::Seed { phase, source }
    }

    pub(crate) fn clock(phase: &'static str, source: ClockError) -> Self {
        Self::Clock { phase, source }
    }
}
