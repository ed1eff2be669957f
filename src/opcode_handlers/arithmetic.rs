use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    vm::VM,
};
use ethereum_types::{U256, U512};

// Arithmetic Operations (11)
// Opcodes: ADD, SUB, MUL, DIV, SDIV, MOD, SMOD, ADDMOD, MULMOD, EXP, SIGNEXTEND

impl<'a> VM<'a> {
    // ADD operation
    #[inline]
    pub fn op_add<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::ADD)?;
        }

        let [augend, addend] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        let sum = augend.overflowing_add(addend).0;
        current_call_frame.stack.push_one::<VALIDATED>(sum)?;

        Ok(OpcodeResult::Continue)
    }

    // SUB operation
    #[inline]
    pub fn op_sub<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::SUB)?;
        }

        let [minuend, subtrahend] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        let difference = minuend.overflowing_sub(subtrahend).0;
        current_call_frame.stack.push_one::<VALIDATED>(difference)?;

        Ok(OpcodeResult::Continue)
    }

    // MUL operation
    #[inline]
    pub fn op_mul<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::MUL)?;
        }

        let [multiplicand, multiplier] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        let product = multiplicand.overflowing_mul(multiplier).0;
        current_call_frame.stack.push_one::<VALIDATED>(product)?;

        Ok(OpcodeResult::Continue)
    }

    // DIV operation
    pub fn op_div<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::DIV)?;
        }

        let [dividend, divisor] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        // Division by zero yields zero, there is no trap.
        let quotient = dividend.checked_div(divisor).unwrap_or_default();
        current_call_frame.stack.push_one::<VALIDATED>(quotient)?;

        Ok(OpcodeResult::Continue)
    }

    // SDIV operation
    pub fn op_sdiv<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::SDIV)?;
        }

        let [dividend, divisor] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        if divisor.is_zero() || dividend.is_zero() {
            current_call_frame.stack.push_one::<VALIDATED>(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }

        let abs_dividend = abs(dividend);
        let abs_divisor = abs(divisor);

        let quotient = match abs_dividend.checked_div(abs_divisor) {
            Some(quot) => {
                let quotient_is_negative = is_negative(dividend) ^ is_negative(divisor);
                if quotient_is_negative { negate(quot) } else { quot }
            }
            None => U256::zero(),
        };

        current_call_frame.stack.push_one::<VALIDATED>(quotient)?;

        Ok(OpcodeResult::Continue)
    }

    // MOD operation
    pub fn op_mod<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::MOD)?;
        }

        let [dividend, divisor] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        let remainder = dividend.checked_rem(divisor).unwrap_or_default();
        current_call_frame.stack.push_one::<VALIDATED>(remainder)?;

        Ok(OpcodeResult::Continue)
    }

    // SMOD operation
    pub fn op_smod<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::SMOD)?;
        }

        let [unchecked_dividend, unchecked_divisor] =
            current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        if unchecked_divisor.is_zero() || unchecked_dividend.is_zero() {
            current_call_frame.stack.push_one::<VALIDATED>(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }

        let dividend = abs(unchecked_dividend);
        let divisor = abs(unchecked_divisor);

        let unchecked_remainder = dividend.checked_rem(divisor).unwrap_or_default();
        let remainder = if is_negative(unchecked_dividend) {
            negate(unchecked_remainder)
        } else {
            unchecked_remainder
        };

        current_call_frame.stack.push_one::<VALIDATED>(remainder)?;

        Ok(OpcodeResult::Continue)
    }

    // ADDMOD operation
    pub fn op_addmod<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::ADDMOD)?;
        }

        let [augend, addend, modulus] = current_call_frame.stack.pop_n::<3, VALIDATED>()?;
        if modulus.is_zero() {
            current_call_frame.stack.push_one::<VALIDATED>(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }

        let wide_augend: U512 = augend.into();
        let wide_addend: U512 = addend.into();

        #[allow(
            clippy::arithmetic_side_effects,
            reason = "two U256 values always fit a U512 sum, and the modulus is non-zero"
        )]
        let sum_mod = (wide_augend + wide_addend) % U512::from(modulus);

        let sum_mod: U256 = sum_mod.try_into().map_err(|_| {
            crate::errors::InternalError::Custom("modulo result exceeded a word".to_string())
        })?;
        current_call_frame.stack.push_one::<VALIDATED>(sum_mod)?;

        Ok(OpcodeResult::Continue)
    }

    // MULMOD operation
    pub fn op_mulmod<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::MULMOD)?;
        }

        let [multiplicand, multiplier, modulus] =
            current_call_frame.stack.pop_n::<3, VALIDATED>()?;
        if modulus.is_zero() || multiplicand.is_zero() || multiplier.is_zero() {
            current_call_frame.stack.push_one::<VALIDATED>(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }

        let product = multiplicand.full_mul(multiplier);

        #[allow(clippy::arithmetic_side_effects, reason = "modulus isn't zero")]
        let product_mod = product % U512::from(modulus);

        let product_mod: U256 = product_mod.try_into().map_err(|_| {
            crate::errors::InternalError::Custom("modulo result exceeded a word".to_string())
        })?;
        current_call_frame.stack.push_one::<VALIDATED>(product_mod)?;

        Ok(OpcodeResult::Continue)
    }

    // EXP operation
    pub fn op_exp<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        let [base, exponent] = current_call_frame.stack.pop_n::<2, VALIDATED>()?;

        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::EXP_STATIC)?;
        }
        current_call_frame.charge_gas(gas_cost::exp_dynamic(exponent)?)?;

        let power = base.overflowing_pow(exponent).0;
        current_call_frame.stack.push_one::<VALIDATED>(power)?;

        Ok(OpcodeResult::Continue)
    }

    // SIGNEXTEND operation
    pub fn op_signextend<const VALIDATED: bool>(&mut self) -> Result<OpcodeResult, VMError> {
        let current_call_frame = &mut self.current_call_frame;
        if VALIDATED {
            current_call_frame.charge_gas(gas_cost::SIGNEXTEND)?;
        }

        let [byte_size_minus_one, value_to_extend] =
            current_call_frame.stack.pop_n::<2, VALIDATED>()?;
        if byte_size_minus_one > U256::from(31) {
            current_call_frame
                .stack
                .push_one::<VALIDATED>(value_to_extend)?;
            return Ok(OpcodeResult::Continue);
        }

        #[expect(
            clippy::arithmetic_side_effects,
            reason = "byte_size_minus_one ≤ 31, so the index tops out at 255"
        )]
        {
            let sign_bit_index = byte_size_minus_one * 8 + 7;
            let sign_bit = (value_to_extend >> sign_bit_index) & U256::one();
            let mask = (U256::one() << sign_bit_index) - U256::one();

            let result = if sign_bit.is_zero() {
                value_to_extend & mask
            } else {
                value_to_extend | !mask
            };
            current_call_frame.stack.push_one::<VALIDATED>(result)?;
        }

        Ok(OpcodeResult::Continue)
    }
}

/// Shifts the value to the right by 255 bits and checks the most significant bit is a 1
fn is_negative(value: U256) -> bool {
    value.bit(255)
}

/// Negates a number in two's complement
fn negate(value: U256) -> U256 {
    let (negated, _overflowed) = (!value).overflowing_add(U256::one());
    negated
}

fn abs(value: U256) -> U256 {
    if is_negative(value) {
        negate(value)
    } else {
        value
    }
}
