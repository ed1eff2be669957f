use crate::{
    errors::{InternalError, VMError},
    host::Host,
    utils::Address,
};
use bytes::Bytes;
use ethereum_types::{H256, U256};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Event emitted by LOG0..LOG4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

/// One reversible state mutation. The entry stores whatever is needed to
/// undo it; its index in the journal is its snapshot id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEntry {
    StorageChange {
        address: Address,
        key: H256,
        prior: U256,
    },
    TransientChange {
        address: Address,
        key: U256,
        prior: U256,
    },
    BalanceChange {
        address: Address,
        prior: U256,
    },
    NonceChange {
        address: Address,
        prior: u64,
    },
    CodeChange {
        address: Address,
    },
    AccountCreated {
        address: Address,
    },
    AccountDestroyed {
        address: Address,
    },
    AddressWarmed {
        address: Address,
    },
    SlotWarmed {
        address: Address,
        key: H256,
    },
    LogEmitted,
    RefundChange {
        prior: u64,
    },
}

/// Point-in-time marker; reverting to it undoes every entry appended after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot(usize);

/// Reversible log of every state mutation of the running transaction, plus
/// the transaction-scoped companions that revert along with it: the EIP-2929
/// warm sets, EIP-1153 transient storage, emitted logs, the refund counter
/// and the created/destroyed account sets.
///
/// All writes go through the host; the journal keeps the prior values so a
/// frame revert can walk its tail backwards and restore them.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    logs: Vec<Log>,
    refunded_gas: u64,
    warm_addresses: FxHashSet<Address>,
    warm_slots: FxHashSet<(Address, H256)>,
    transient: FxHashMap<(Address, U256), U256>,
    created_accounts: FxHashSet<Address>,
    destroyed_accounts: FxHashSet<Address>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.entries.len())
    }

    /// Undo every entry recorded after `snapshot`, newest first.
    pub fn revert_to(
        &mut self,
        snapshot: Snapshot,
        host: &mut dyn Host,
    ) -> Result<(), VMError> {
        while self.entries.len() > snapshot.0 {
            let entry = self.entries.pop().ok_or(InternalError::Underflow)?;
            match entry {
                JournalEntry::StorageChange {
                    address,
                    key,
                    prior,
                } => {
                    host.set_storage(address, key, prior)?;
                }
                JournalEntry::TransientChange {
                    address,
                    key,
                    prior,
                } => {
                    self.transient.insert((address, key), prior);
                }
                JournalEntry::BalanceChange { address, prior } => {
                    host.set_balance(address, prior)?;
                }
                JournalEntry::NonceChange { address, prior } => {
                    host.set_nonce(address, prior)?;
                }
                JournalEntry::CodeChange { address } => {
                    // Code is only ever set once, on a successful create.
                    host.set_code(address, Bytes::new())?;
                }
                JournalEntry::AccountCreated { address } => {
                    self.created_accounts.remove(&address);
                }
                JournalEntry::AccountDestroyed { address } => {
                    self.destroyed_accounts.remove(&address);
                }
                JournalEntry::AddressWarmed { address } => {
                    self.warm_addresses.remove(&address);
                }
                JournalEntry::SlotWarmed { address, key } => {
                    self.warm_slots.remove(&(address, key));
                }
                JournalEntry::LogEmitted => {
                    self.logs.pop();
                }
                JournalEntry::RefundChange { prior } => {
                    self.refunded_gas = prior;
                }
            }
        }
        Ok(())
    }

    // EIP-2929 access sets ---------------------------------------------------

    /// Mark an address warm without journaling. Only valid before execution
    /// starts (origin, target, coinbase, precompiles).
    pub fn prewarm_address(&mut self, address: Address) {
        self.warm_addresses.insert(address);
    }

    pub fn prewarm_slot(&mut self, address: Address, key: H256) {
        self.warm_slots.insert((address, key));
    }

    /// Mark an address warm and return whether it already was.
    pub fn access_address(&mut self, address: Address) -> bool {
        if self.warm_addresses.contains(&address) {
            return true;
        }
        self.warm_addresses.insert(address);
        self.entries.push(JournalEntry::AddressWarmed { address });
        false
    }

    /// Mark a storage slot warm and return whether it already was.
    pub fn access_slot(&mut self, address: Address, key: H256) -> bool {
        if self.warm_slots.contains(&(address, key)) {
            return true;
        }
        self.warm_slots.insert((address, key));
        self.entries.push(JournalEntry::SlotWarmed { address, key });
        false
    }

    // State-write recording --------------------------------------------------

    pub fn record_storage_change(&mut self, address: Address, key: H256, prior: U256) {
        self.entries.push(JournalEntry::StorageChange {
            address,
            key,
            prior,
        });
    }

    pub fn record_balance_change(&mut self, address: Address, prior: U256) {
        self.entries
            .push(JournalEntry::BalanceChange { address, prior });
    }

    pub fn record_nonce_change(&mut self, address: Address, prior: u64) {
        self.entries
            .push(JournalEntry::NonceChange { address, prior });
    }

    pub fn record_code_change(&mut self, address: Address) {
        self.entries.push(JournalEntry::CodeChange { address });
    }

    // Transient storage (EIP-1153) -------------------------------------------

    pub fn get_transient(&self, address: Address, key: U256) -> U256 {
        self.transient
            .get(&(address, key))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_transient(&mut self, address: Address, key: U256, value: U256) {
        let prior = self.get_transient(address, key);
        self.entries.push(JournalEntry::TransientChange {
            address,
            key,
            prior,
        });
        self.transient.insert((address, key), value);
    }

    // Logs -------------------------------------------------------------------

    pub fn add_log(&mut self, log: Log) {
        self.entries.push(JournalEntry::LogEmitted);
        self.logs.push(log);
    }

    pub fn take_logs(&mut self) -> Vec<Log> {
        std::mem::take(&mut self.logs)
    }

    // Refund counter ---------------------------------------------------------

    pub fn refunded_gas(&self) -> u64 {
        self.refunded_gas
    }

    pub fn add_refund_delta(&mut self, delta: i64) -> Result<(), VMError> {
        let prior = self.refunded_gas;
        match prior.checked_add_signed(delta) {
            Some(refunded) => {
                self.entries.push(JournalEntry::RefundChange { prior });
                self.refunded_gas = refunded;
                Ok(())
            }
            None if delta < 0 => Err(InternalError::Underflow.into()),
            None => Err(InternalError::Overflow.into()),
        }
    }

    // Created / destroyed account tracking -----------------------------------

    pub fn add_created_account(&mut self, address: Address) {
        if self.created_accounts.insert(address) {
            self.entries.push(JournalEntry::AccountCreated { address });
        }
    }

    pub fn is_created(&self, address: Address) -> bool {
        self.created_accounts.contains(&address)
    }

    /// Mark an account destroyed; returns whether it already was.
    pub fn mark_destroyed(&mut self, address: Address) -> bool {
        if !self.destroyed_accounts.insert(address) {
            return true;
        }
        self.entries
            .push(JournalEntry::AccountDestroyed { address });
        false
    }

    pub fn iter_destroyed(&self) -> impl Iterator<Item = &Address> {
        self.destroyed_accounts.iter()
    }

    // Reporting --------------------------------------------------------------

    /// Drain the committed mutations for the execution report, dropping the
    /// bookkeeping entries (warm marks, log markers, refund updates) and the
    /// transient writes that die with the transaction anyway.
    pub fn take_state_changes(&mut self) -> Vec<JournalEntry> {
        std::mem::take(&mut self.entries)
            .into_iter()
            .filter(|entry| {
                matches!(
                    entry,
                    JournalEntry::StorageChange { .. }
                        | JournalEntry::BalanceChange { .. }
                        | JournalEntry::NonceChange { .. }
                        | JournalEntry::CodeChange { .. }
                        | JournalEntry::AccountCreated { .. }
                        | JournalEntry::AccountDestroyed { .. }
                )
            })
            .collect()
    }
}
