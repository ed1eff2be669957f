use crate::{
    constants::WORD_SIZE,
    errors::{OpcodeResult, VMError},
    gas_cost,
    vm::VM,
};
use ethereum_types::U256;

// Comparison and Bitwise Logic Operations (14)
// Opcodes: LT, GT, SLT, SGT, EQ, ISZERO, AND, OR, XOR, NOT, BYTE, SHL, SHR, SAR

impl<'a> VM<'a> {
    // LT operation
    #[inline]
    pub fn op_lt<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::LT)?;
        }
        let [lho, rho] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        current_call_frame
            .stack
            .push_one::<VALIDATED>(u256_from_bool(lho < rho))?;

        Ok(OpcodeResult::Continue)
    }

    // GT operation
    #[inline]
    pub fn op_gt<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::GT)?;
        }
        let [lho, rho] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        current_call_frame
            .stack
            .push_one::<VALIDATED>(u256_from_bool(lho > rho))?;

        Ok(OpcodeResult::Continue)
    }

    // SLT operation (signed less than)
    pub fn op_slt<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::SLT)?;
        }
        let [lho, rho] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        let lho_is_negative = lho.bit(255);
        let rho_is_negative = rho.bit(255);
        let result = if lho_is_negative == rho_is_negative {
            // Compare magnitudes if signs are the same
            u256_from_bool(lho < rho)
        } else {
            // Negative is smaller if signs differ
            u256_from_bool(lho_is_negative)
        };
        current_call_frame.stack.push_one::<VALIDATED>(result)?;

        Ok(OpcodeResult::Continue)
    }

    // SGT operation (signed greater than)
    pub fn op_sgt<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::SGT)?;
        }
        let [lho, rho] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        let lho_is_negative = lho.bit(255);
        let rho_is_negative = rho.bit(255);
        let result = if lho_is_negative == rho_is_negative {
            u256_from_bool(lho > rho)
        } else {
            // Positive is bigger if signs differ
            u256_from_bool(rho_is_negative)
        };
        current_call_frame.stack.push_one::<VALIDATED>(result)?;

        Ok(OpcodeResult::Continue)
    }

    // EQ operation (equality check)
    #[inline]
    pub fn op_eq<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::EQ)?;
        }
        let [lho, rho] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        current_call_frame
            .stack
            .push_one::<VALIDATED>(u256_from_bool(lho == rho))?;

        Ok(OpcodeResult::Continue)
    }

    // ISZERO operation (check if zero)
    #[inline]
    pub fn op_iszero<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::ISZERO)?;
        }
        let operand = current_call_frame.stack.pop_one::<VALIDATED>()?;
        current_call_frame
            .stack
            .push_one::<VALIDATED>(u256_from_bool(operand.is_zero()))?;

        Ok(OpcodeResult::Continue)
    }

    // AND operation
    #[inline]
    pub fn op_and<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::AND)?;
        }
        let [a, b] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        current_call_frame.stack.push_one::<VALIDATED>(a & b)?;

        Ok(OpcodeResult::Continue)
    }

    // OR operation
    #[inline]
    pub fn op_or<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::OR)?;
        }
        let [a, b] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        current_call_frame.stack.push_one::<VALIDATED>(a | b)?;

        Ok(OpcodeResult::Continue)
    }

    // XOR operation
    pub fn op_xor<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::XOR)?;
        }
        let [a, b] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        current_call_frame.stack.push_one::<VALIDATED>(a ^ b)?;

        Ok(OpcodeResult::Continue)
    }

    // NOT operation
    pub fn op_not<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::NOT)?;
        }
        let a = current_call_frame.stack.pop_one::<VALIDATED>()?;
        current_call_frame.stack.push_one::<VALIDATED>(!a)?;

        Ok(OpcodeResult::Continue)
    }

    // BYTE operation
    pub fn op_byte<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::BYTE)?;
        }
        let [index, value] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;

        let result = match usize::try_from(index) {
            // byte(i) counts from the least significant end, the opcode from
            // the most significant one.
            Ok(index) if index < WORD_SIZE => {
                let flipped = WORD_SIZE.saturating_sub(index).saturating_sub(1);
                U256::from(value.byte(flipped))
            }
            _ => U256::zero(),
        };
        current_call_frame.stack.push_one::<VALIDATED>(result)?;

        Ok(OpcodeResult::Continue)
    }

    // SHL operation (shift left)
    #[inline]
    #[expect(clippy::arithmetic_side_effects, reason = "shift is below 256")]
    pub fn op_shl<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::SHL)?;
        }
        let [shift, value] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;

        let result = if shift < U256::from(256) {
            value << shift
        } else {
            U256::zero()
        };
        current_call_frame.stack.push_one::<VALIDATED>(result)?;

        Ok(OpcodeResult::Continue)
    }

    // SHR operation (shift right)
    #[inline]
    #[expect(clippy::arithmetic_side_effects, reason = "shift is below 256")]
    pub fn op_shr<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::SHR)?;
        }
        let [shift, value] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;

        let result = if shift < U256::from(256) {
            value >> shift
        } else {
            U256::zero()
        };
        current_call_frame.stack.push_one::<VALIDATED>(result)?;

        Ok(OpcodeResult::Continue)
    }

    // SAR operation (arithmetic shift right)
    #[expect(clippy::arithmetic_side_effects, reason = "shift is below 256")]
    pub fn op_sar<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::SAR)?;
        }
        let [shift, value] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;

        // In two's complement the most significant bit set means negative.
        let is_negative = value.bit(255);

        let result = if shift < U256::from(256) {
            if !is_negative {
                value >> shift
            } else if shift.is_zero() {
                value
            } else {
                (value >> shift) | (U256::MAX << (U256::from(256) - shift))
            }
        } else if is_negative {
            U256::MAX
        } else {
            U256::zero()
        };
        current_call_frame.stack.push_one::<VALIDATED>(result)?;

        Ok(OpcodeResult::Continue)
    }
}

const fn u256_from_bool(value: bool) -> U256 {
    if value { U256::one() } else { U256::zero() }
}
