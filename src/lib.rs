/// The account orchestrator: lifecycle, concurrency guard, deposit
/// allocation, the send pipeline and balance queries.
pub mod account;

/// Tryte-based addresses, seeds and security levels.
pub mod address;

/// Deposit requests: the rules under which an allocated address becomes
/// spendable.
pub mod deposit;

/// The crate-wide error taxonomy.
pub mod error;

/// The ledger-client collaborator contract.
pub mod ledger;

/// Deterministic collaborator implementations for tests and examples.
pub mod nullables;

/// Input selection: the pluggable strategy seam plus the default
/// timeout-based strategy.
pub mod selection;

/// The immutable settings snapshot and the remaining collaborator contracts
/// (seed provider, signer, clock, events, plugins).
pub mod settings;

/// The store collaborator contract, plus an in-memory implementation.
pub mod store;

/// Transfer-side types: recipients, inputs, pending transfers and bundle
/// views.
pub mod transfer;
