use std::collections::HashSet;
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::address::{Address, SecurityLevel};
use crate::error::Error;
use crate::settings::Settings;
use crate::transfer::Input;

use super::{InputSelectionStrategy, Selection, SelectionContext};

/// Default strategy: spends fulfilled and timed-out deposit addresses, in
/// allocation order, stopping as soon as the target value is exceeded.
///
/// Addresses are scanned in two passes. The primary pass covers remainder
/// addresses plus non-timed-out addresses that are spendable by their own
/// rules. The secondary pass covers timed-out addresses and is only entered
/// when the primary pass falls short, because deciding whether a timed-out
/// address may be reclaimed requires per-address bundle history lookups
/// against the ledger.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeoutStrategy;

struct Candidate {
    key_index: u64,
    address: Address,
    expected_amount: Option<u64>,
    security: SecurityLevel,
}

impl InputSelectionStrategy for TimeoutStrategy {
    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        target_value: u64,
        probe: bool,
    ) -> Result<Selection, Error> {
        let setts = ctx.settings;

        let requests = setts
            .store
            .deposit_requests(ctx.account_id)
            .map_err(|e| Error::store("loading deposit requests for input selection", e))?;

        // no deposit requests, therefore 0 balance
        if requests.is_empty() {
            if probe {
                return Ok(Selection::default());
            }
            return Err(Error::InsufficientBalance {
                requested: target_value,
                selectable: 0,
            });
        }

        // pin every balance query of this call to one checkpoint
        let checkpoint = setts
            .ledger
            .latest_checkpoint()
            .map_err(|e| Error::ledger("fetching the latest checkpoint for input selection", e))?;

        let now = setts
            .clock
            .now()
            .map_err(|e| Error::clock("reading the time for input selection", e))?;

        let seed = setts
            .seed_provider
            .seed()
            .map_err(|e| Error::seed("fetching the seed for input selection", e))?;

        let mut primary = Vec::new();
        let mut secondary = Vec::new();

        for (&key_index, stored) in &requests {
            let derive = || {
                setts
                    .signer
                    .generate_address(&seed, key_index, stored.security_level, false)
                    .map_err(|e| Error::signer("deriving a deposit address for input selection", e))
            };
            let candidate = |address| Candidate {
                key_index,
                address,
                expected_amount: stored.request.expected_amount,
                security: stored.security_level,
            };

            match stored.request.timeout_at {
                // remainder address, always spendable once funded
                None => primary.push(candidate(derive()?)),
                Some(timeout_at) if timed_out(now, timeout_at) => {
                    secondary.push(candidate(derive()?));
                }
                Some(_) if stored.request.multi_use => {
                    // a multi-use address without an expected amount is only
                    // spent once it has timed out
                    if stored.request.expected_amount.is_some() {
                        primary.push(candidate(derive()?));
                    }
                }
                Some(_) => primary.push(candidate(derive()?)),
            }
        }

        debug!(
            account = ctx.account_id,
            target_value,
            probe,
            primary = primary.len(),
            secondary = secondary.len(),
            "running input selection"
        );

        // one balance round-trip for both passes
        let addresses: Vec<Address> = primary
            .iter()
            .chain(secondary.iter())
            .map(|c| c.address.clone())
            .collect();
        let balances = setts
            .ledger
            .balances(&addresses, &checkpoint)
            .map_err(|e| Error::ledger("fetching balances for input selection", e))?;
        if balances.len() != addresses.len() {
            return Err(Error::ledger(
                "fetching balances for input selection",
                crate::error::LedgerError(format!(
                    "expected {} balances, got {}",
                    addresses.len(),
                    balances.len()
                )),
            ));
        }

        let mut sum: u64 = 0;
        let mut inputs = Vec::new();
        let mut freed_indices = Vec::new();

        for (candidate, &balance) in primary.iter().zip(&balances) {
            // an expected amount that isn't reached yet keeps the address out
            if let Some(expected) = candidate.expected_amount {
                if balance < expected {
                    continue;
                }
            }
            sum += balance;
            if balance == 0 || probe {
                continue;
            }
            inputs.push(candidate.as_input(balance));
            freed_indices.push(candidate.key_index);
            if sum > target_value {
                break;
            }
        }

        if sum < target_value || probe {
            let secondary_balances = &balances[primary.len()..];
            for (candidate, &balance) in secondary.iter().zip(secondary_balances) {
                if balance == 0 {
                    if probe {
                        continue;
                    }
                    // reclaim the slot, unless a legitimate deposit is still
                    // on its way; on lookup failure assume one is
                    let has_incoming =
                        has_incoming_consistent_transfer(setts, &candidate.address)
                            .unwrap_or_else(|err| {
                                warn!(
                                    address = %candidate.address,
                                    error = %err,
                                    "incoming transfer check failed, keeping address"
                                );
                                true
                            });
                    if has_incoming {
                        continue;
                    }
                    setts
                        .store
                        .remove_deposit_request(ctx.account_id, candidate.key_index)
                        .map_err(|e| Error::store("freeing a timed-out deposit request", e))?;
                    debug!(
                        account = ctx.account_id,
                        key_index = candidate.key_index,
                        "freed timed-out deposit request with zero balance"
                    );
                    continue;
                }
                sum += balance;
                if probe {
                    continue;
                }
                inputs.push(candidate.as_input(balance));
                freed_indices.push(candidate.key_index);
                if sum > target_value {
                    break;
                }
            }
        }

        if probe {
            return Ok(Selection {
                sum,
                ..Default::default()
            });
        }

        if sum < target_value {
            return Err(Error::InsufficientBalance {
                requested: target_value,
                selectable: sum,
            });
        }

        Ok(Selection {
            sum,
            inputs,
            freed_indices,
        })
    }
}

impl Candidate {
    fn as_input(&self, balance: u64) -> Input {
        Input {
            address: self.address.clone(),
            key_index: self.key_index,
            balance,
            security: self.security,
        }
    }
}

fn timed_out(now: SystemTime, timeout_at: SystemTime) -> bool {
    now > timeout_at
}

/// Decides whether a timed-out address still has a legitimate unconfirmed
/// incoming transfer and therefore must not be reclaimed yet.
///
/// Bundles are grouped by bundle hash; a family with a confirmed member is
/// skipped entirely, since its reattachments are redundant. An unconfirmed
/// bundle counts only if it actually deposits a positive value into the
/// address and the ledger reports it as currently consistent.
pub fn has_incoming_consistent_transfer(
    settings: &Settings,
    address: &Address,
) -> Result<bool, Error> {
    let bundles = settings
        .ledger
        .bundles_from_address(address)
        .map_err(|e| Error::ledger("fetching bundles for the incoming transfer check", e))?;

    let confirmed_families: HashSet<&str> = bundles
        .iter()
        .filter(|b| b.confirmed)
        .filter_map(|b| b.bundle_hash())
        .collect();

    for bundle in &bundles {
        if bundle.confirmed {
            continue;
        }
        if let Some(family) = bundle.bundle_hash() {
            if confirmed_families.contains(family) {
                continue;
            }
        }
        if !bundle.deposits_to(address) {
            continue;
        }
        let Some(tail) = bundle.tail_hash() else {
            continue;
        };
        let consistent = settings
            .ledger
            .is_consistent(tail)
            .map_err(|e| Error::ledger("checking bundle consistency for the incoming transfer check", e))?;
        if consistent {
            return Ok(true);
        }
    }
    Ok(false)
}
