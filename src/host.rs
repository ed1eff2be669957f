use crate::{errors::HostError, utils::Address, utils::keccak};
use bytes::Bytes;
use ethereum_types::{H256, U256};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Block- and transaction-level context the opcodes can observe. Captured
/// once at VM construction; it never changes during a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub origin: Address,
    pub gas_price: U256,
    pub block_number: U256,
    pub timestamp: U256,
    pub coinbase: Address,
    pub prev_randao: H256,
    pub block_gas_limit: u64,
    pub base_fee: U256,
    pub chain_id: U256,
    pub blob_base_fee: U256,
    pub blob_hashes: Vec<H256>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            origin: Address::zero(),
            gas_price: U256::zero(),
            block_number: U256::zero(),
            timestamp: U256::zero(),
            coinbase: Address::zero(),
            prev_randao: H256::zero(),
            block_gas_limit: 30_000_000,
            base_fee: U256::zero(),
            chain_id: U256::one(),
            blob_base_fee: U256::zero(),
            blob_hashes: Vec::new(),
        }
    }
}

/// Result of a precompile the host chose to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecompileOutcome {
    pub success: bool,
    pub gas_left: u64,
    pub output: Bytes,
}

/// World-state capability surface consumed by the interpreter.
///
/// The engine journals every write it makes through this trait, so a host
/// only needs to provide raw reads and writes; snapshot and rollback are
/// handled by the core. Storage keys are 32-byte hashes, values are words.
pub trait Host {
    fn environment(&self) -> Environment;

    fn get_balance(&mut self, address: Address) -> Result<U256, HostError>;
    fn set_balance(&mut self, address: Address, balance: U256) -> Result<(), HostError>;

    fn get_nonce(&mut self, address: Address) -> Result<u64, HostError>;
    fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), HostError>;

    fn get_code(&mut self, address: Address) -> Result<Bytes, HostError>;
    fn get_code_hash(&mut self, address: Address) -> Result<H256, HostError>;
    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), HostError>;

    fn get_storage(&mut self, address: Address, key: H256) -> Result<U256, HostError>;
    /// Write a slot and return the value it held before.
    fn set_storage(
        &mut self,
        address: Address,
        key: H256,
        value: U256,
    ) -> Result<U256, HostError>;

    /// True when the account exists and is non-empty per EIP-161
    /// (any of balance, nonce or code set).
    fn account_exists(&mut self, address: Address) -> Result<bool, HostError>;
    /// Remove an account entirely (SELFDESTRUCT settlement).
    fn delete_account(&mut self, address: Address) -> Result<(), HostError>;

    fn block_hash(&mut self, block_number: u64) -> Result<H256, HostError>;

    /// Execute the precompile at `address`, if this host implements it.
    /// Returning `Ok(None)` makes the engine treat the target as a plain
    /// code-less account. Hosts may map extra (e.g. L2-specific) addresses
    /// here; the engine only routes the canonical range through it.
    fn call_precompile(
        &mut self,
        _address: Address,
        _input: &[u8],
        _gas: u64,
    ) -> Result<Option<PrecompileOutcome>, HostError> {
        Ok(None)
    }
}

/// Plain account record used by [`InMemoryHost`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
    pub code: Bytes,
    pub storage: FxHashMap<H256, U256>,
}

impl Account {
    pub fn with_code(code: Bytes) -> Self {
        Self {
            code,
            ..Default::default()
        }
    }

    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }

    /// EIP-161 emptiness.
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0 && self.code.is_empty()
    }
}

/// Hash-map-backed host, the reference implementation used by the test
/// suites and small embedders.
#[derive(Debug, Default, Clone)]
pub struct InMemoryHost {
    pub accounts: FxHashMap<Address, Account>,
    pub env: Environment,
    pub block_hashes: FxHashMap<u64, H256>,
}

impl InMemoryHost {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            ..Default::default()
        }
    }

    pub fn add_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, account);
    }

    fn account_mut(&mut self, address: Address) -> &mut Account {
        self.accounts.entry(address).or_default()
    }
}

impl Host for InMemoryHost {
    fn environment(&self) -> Environment {
        self.env.clone()
    }

    fn get_balance(&mut self, address: Address) -> Result<U256, HostError> {
        Ok(self
            .accounts
            .get(&address)
            .map(|account| account.balance)
            .unwrap_or_default())
    }

    fn set_balance(&mut self, address: Address, balance: U256) -> Result<(), HostError> {
        self.account_mut(address).balance = balance;
        Ok(())
    }

    fn get_nonce(&mut self, address: Address) -> Result<u64, HostError> {
        Ok(self
            .accounts
            .get(&address)
            .map(|account| account.nonce)
            .unwrap_or_default())
    }

    fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), HostError> {
        self.account_mut(address).nonce = nonce;
        Ok(())
    }

    fn get_code(&mut self, address: Address) -> Result<Bytes, HostError> {
        Ok(self
            .accounts
            .get(&address)
            .map(|account| account.code.clone())
            .unwrap_or_default())
    }

    fn get_code_hash(&mut self, address: Address) -> Result<H256, HostError> {
        match self.accounts.get(&address) {
            Some(account) if !account.is_empty() => Ok(keccak(&account.code)),
            _ => Ok(H256::zero()),
        }
    }

    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), HostError> {
        self.account_mut(address).code = code;
        Ok(())
    }

    fn get_storage(&mut self, address: Address, key: H256) -> Result<U256, HostError> {
        Ok(self
            .accounts
            .get(&address)
            .and_then(|account| account.storage.get(&key))
            .copied()
            .unwrap_or_default())
    }

    fn set_storage(
        &mut self,
        address: Address,
        key: H256,
        value: U256,
    ) -> Result<U256, HostError> {
        let storage = &mut self.account_mut(address).storage;
        let prior = if value.is_zero() {
            storage.remove(&key)
        } else {
            storage.insert(key, value)
        };
        Ok(prior.unwrap_or_default())
    }

    fn account_exists(&mut self, address: Address) -> Result<bool, HostError> {
        Ok(self
            .accounts
            .get(&address)
            .is_some_and(|account| !account.is_empty()))
    }

    fn delete_account(&mut self, address: Address) -> Result<(), HostError> {
        self.accounts.remove(&address);
        Ok(())
    }

    fn block_hash(&mut self, block_number: u64) -> Result<H256, HostError> {
        Ok(self
            .block_hashes
            .get(&block_number)
            .copied()
            .unwrap_or_default())
    }

    fn call_precompile(
        &mut self,
        address: Address,
        input: &[u8],
        gas: u64,
    ) -> Result<Option<PrecompileOutcome>, HostError> {
        // Only the identity precompile is provided here; it is enough to
        // exercise the dispatch path. Real hosts plug in the full set.
        if address != Address::from_low_u64_be(0x04) {
            return Ok(None);
        }
        let words = u64::try_from(input.len().div_ceil(32))
            .map_err(|_| HostError("identity input too large".to_string()))?;
        let cost = 15_u64.saturating_add(words.saturating_mul(3));
        if cost > gas {
            return Ok(Some(PrecompileOutcome {
                success: false,
                gas_left: 0,
                output: Bytes::new(),
            }));
        }
        Ok(Some(PrecompileOutcome {
            success: true,
            gas_left: gas.saturating_sub(cost),
            output: Bytes::copy_from_slice(input),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_write_returns_prior_value() {
        let mut host = InMemoryHost::default();
        let address = Address::from_low_u64_be(1);
        let key = H256::from_low_u64_be(2);

        assert_eq!(
            host.set_storage(address, key, U256::from(5)).unwrap(),
            U256::zero()
        );
        assert_eq!(
            host.set_storage(address, key, U256::from(9)).unwrap(),
            U256::from(5)
        );
        assert_eq!(host.get_storage(address, key).unwrap(), U256::from(9));
    }

    #[test]
    fn empty_accounts_do_not_exist() {
        let mut host = InMemoryHost::default();
        let address = Address::from_low_u64_be(1);
        assert!(!host.account_exists(address).unwrap());

        host.set_balance(address, U256::one()).unwrap();
        assert!(host.account_exists(address).unwrap());
    }

    #[test]
    fn code_hash_distinguishes_missing_and_codeless() {
        let mut host = InMemoryHost::default();
        let missing = Address::from_low_u64_be(1);
        assert_eq!(host.get_code_hash(missing).unwrap(), H256::zero());

        let codeless = Address::from_low_u64_be(2);
        host.set_balance(codeless, U256::one()).unwrap();
        assert_eq!(host.get_code_hash(codeless).unwrap(), keccak(&[]));
    }

    #[test]
    fn identity_precompile_copies_input() {
        let mut host = InMemoryHost::default();
        let outcome = host
            .call_precompile(Address::from_low_u64_be(4), &[1, 2, 3], 100)
            .unwrap()
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output.as_ref(), &[1, 2, 3]);
        assert_eq!(outcome.gas_left, 100 - 18);
    }
}
