use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    vm::VM,
};
use ethereum_types::U256;

// Block Information (11)
// Opcodes: BLOCKHASH, COINBASE, TIMESTAMP, NUMBER, PREVRANDAO, GASLIMIT,
// CHAINID, SELFBALANCE, BASEFEE, BLOBHASH, BLOBBASEFEE

/// How far back BLOCKHASH can see.
const BLOCKHASH_WINDOW: u64 = 256;

impl<'a> VM<'a> {
    // BLOCKHASH operation
    pub fn op_blockhash<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        if VALIDATED {
            self.current_call_frame.charge_gas(gas_cost::BLOCKHASH)?;
        }
        let requested = self.current_call_frame.stack.pop_one::<VALIDATED>()?;

        // Only the 256 most recent blocks (and not the current one) resolve.
        let current = self.env.block_number;
        let hash = match u64::try_from(requested) {
            Ok(number)
                if U256::from(number) < current
                    && current.saturating_sub(U256::from(number)) <= U256::from(BLOCKHASH_WINDOW) =>
            {
                self.host.block_hash(number)?
            }
            _ => Default::default(),
        };

        self.current_call_frame
            .stack
            .push_one::<VALIDATED>(U256::from_big_endian(hash.as_bytes()))?;

        Ok(OpcodeResult::Continue)
    }

    // COINBASE operation
    pub fn op_coinbase<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let coinbase = self.env.coinbase;
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::COINBASE)?;
        }
        current_call_frame
            .stack
            .push_one::<VALIDATED>(crate::utils::address_to_word(coinbase))?;

        Ok(OpcodeResult::Continue)
    }

    // TIMESTAMP operation
    pub fn op_timestamp<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let timestamp = self.env.timestamp;
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::TIMESTAMP)?;
        }
        current_call_frame.stack.push_one::<VALIDATED>(timestamp)?;

        Ok(OpcodeResult::Continue)
    }

    // NUMBER operation
    pub fn op_number<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let block_number = self.env.block_number;
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::NUMBER)?;
        }
        current_call_frame.stack.push_one::<VALIDATED>(block_number)?;

        Ok(OpcodeResult::Continue)
    }

    // PREVRANDAO operation
    pub fn op_prevrandao<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let prev_randao = self.env.prev_randao;
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::PREVRANDAO)?;
        }
        current_call_frame
            .stack
            .push_one::<VALIDATED>(U256::from_big_endian(prev_randao.as_bytes()))?;

        Ok(OpcodeResult::Continue)
    }

    // GASLIMIT operation
    pub fn op_gaslimit<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let block_gas_limit = self.env.block_gas_limit;
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::GASLIMIT)?;
        }
        current_call_frame
            .stack
            .push_one::<VALIDATED>(U256::from(block_gas_limit))?;

        Ok(OpcodeResult::Continue)
    }

    // CHAINID operation
    pub fn op_chainid<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let chain_id = self.env.chain_id;
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::CHAINID)?;
        }
        current_call_frame.stack.push_one::<VALIDATED>(chain_id)?;

        Ok(OpcodeResult::Continue)
    }

    // SELFBALANCE operation
    pub fn op_selfbalance<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        if VALIDATED {
            self.current_call_frame.charge_gas(gas_cost::SELFBALANCE)?;
        }
        // Own balance without the EIP-2929 account access charge.
        let balance = self.host.get_balance(self.current_call_frame.to)?;
        self.current_call_frame
            .stack
            .push_one::<VALIDATED>(balance)?;

        Ok(OpcodeResult::Continue)
    }

    // BASEFEE operation
    pub fn op_basefee<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let base_fee = self.env.base_fee;
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::BASEFEE)?;
        }
        current_call_frame.stack.push_one::<VALIDATED>(base_fee)?;

        Ok(OpcodeResult::Continue)
    }

    // BLOBHASH operation
    pub fn op_blobhash<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        if VALIDATED {
            self.current_call_frame.charge_gas(gas_cost::BLOBHASH)?;
        }
        let index = self.current_call_frame.stack.pop_one::<VALIDATED>()?;

        let hash = usize::try_from(index)
            .ok()
            .and_then(|index| self.env.blob_hashes.get(index))
            .copied()
            .unwrap_or_default();
        self.current_call_frame
            .stack
            .push_one::<VALIDATED>(U256::from_big_endian(hash.as_bytes()))?;

        Ok(OpcodeResult::Continue)
    }

    // BLOBBASEFEE operation
    pub fn op_blobbasefee<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let blob_base_fee = self.env.blob_base_fee;
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::BLOBBASEFEE)?;
        }
        current_call_frame
            .stack
            .push_one::<VALIDATED>(blob_base_fee)?;

        Ok(OpcodeResult::Continue)
    }
}
