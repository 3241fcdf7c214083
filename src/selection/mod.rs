use crate::error::Error;
use crate::settings::Settings;
use crate::transfer::Input;

pub mod timeout_strategy;

/// Outcome of an input-selection pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Selection {
    /// Total value covered by the scanned addresses. In transfer mode this
    /// exceeds the target (or the call failed); in probe mode it is the
    /// currently available balance.
    pub sum: u64,
    /// The addresses to spend. Always empty in probe mode.
    pub inputs: Vec<Input>,
    /// Key indices to free from the store once the transfer is persisted.
    /// Always empty in probe mode.
    pub freed_indices: Vec<u64>,
}

/// What a strategy gets to work with: the account's identity and its current
/// settings snapshot, taken under the account lock.
pub struct SelectionContext<'a> {
    pub account_id: &'a str,
    pub settings: &'a Settings,
}

/// Pluggable policy deciding which deposit addresses may be spent to cover
/// a target value.
///
/// With `probe` set, the strategy only reports the prospective sum: it must
/// not record inputs and must not mutate the store.
pub trait InputSelectionStrategy: Send + Sync {
    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        target_value: u64,
        probe: bool,
    ) -> Result<Selection, Error>;
}
