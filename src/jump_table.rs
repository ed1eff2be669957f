use crate::{fork::Fork, opcodes::Opcode};

/// Static execution profile of one opcode, used by the analyser to fold
/// per-instruction checks into per-block metadata and by the validated
/// dispatch path to re-create those checks individually.
///
/// `constant_gas` is only the fixed component; opcodes with `dynamic_gas`
/// charge the variable part (memory expansion, cold access, per-byte costs)
/// inside their handler at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub constant_gas: u32,
    /// Stack items consumed.
    pub inputs: u8,
    /// Stack items produced.
    pub outputs: u8,
    pub dynamic_gas: bool,
    /// Ends a basic block (JUMP, JUMPI, STOP, RETURN, REVERT, INVALID,
    /// SELFDESTRUCT).
    pub terminator: bool,
    /// False for byte values with no meaning under the selected fork.
    pub defined: bool,
}

impl Operation {
    pub const UNDEFINED: Operation = Operation {
        constant_gas: 0,
        inputs: 0,
        outputs: 0,
        dynamic_gas: false,
        terminator: false,
        defined: false,
    };

    const fn fixed(constant_gas: u32, inputs: u8, outputs: u8) -> Operation {
        Operation {
            constant_gas,
            inputs,
            outputs,
            dynamic_gas: false,
            terminator: false,
            defined: true,
        }
    }

    const fn dynamic(constant_gas: u32, inputs: u8, outputs: u8) -> Operation {
        Operation {
            constant_gas,
            inputs,
            outputs,
            dynamic_gas: true,
            terminator: false,
            defined: true,
        }
    }

    const fn terminator(constant_gas: u32, inputs: u8, dynamic_gas: bool) -> Operation {
        Operation {
            constant_gas,
            inputs,
            outputs: 0,
            dynamic_gas,
            terminator: true,
            defined: true,
        }
    }
}

/// Per-fork table mapping every opcode byte to its [`Operation`] profile.
#[derive(Debug)]
pub struct JumpTable(pub [Operation; 256]);

impl JumpTable {
    #[inline]
    pub fn operation(&self, opcode: u8) -> &Operation {
        #[expect(clippy::indexing_slicing)] // a u8 always fits
        #[allow(clippy::as_conversions)]
        &self.0[opcode as usize]
    }
}

/// Select the table matching the given fork.
pub fn jump_table(fork: Fork) -> &'static JumpTable {
    static FRONTIER: JumpTable = JumpTable(build_frontier());
    static HOMESTEAD: JumpTable = JumpTable(build_homestead());
    static BYZANTIUM: JumpTable = JumpTable(build_byzantium());
    static CONSTANTINOPLE: JumpTable = JumpTable(build_constantinople());
    static ISTANBUL: JumpTable = JumpTable(build_istanbul());
    static LONDON: JumpTable = JumpTable(build_london());
    static SHANGHAI: JumpTable = JumpTable(build_shanghai());
    static CANCUN: JumpTable = JumpTable(build_cancun());

    if fork >= Fork::Cancun {
        &CANCUN
    } else if fork >= Fork::Shanghai {
        &SHANGHAI
    } else if fork >= Fork::London {
        &LONDON
    } else if fork >= Fork::Istanbul {
        &ISTANBUL
    } else if fork >= Fork::Constantinople {
        &CONSTANTINOPLE
    } else if fork >= Fork::Byzantium {
        &BYZANTIUM
    } else if fork >= Fork::Homestead {
        &HOMESTEAD
    } else {
        &FRONTIER
    }
}

#[allow(clippy::as_conversions, clippy::indexing_slicing)]
const fn build_frontier() -> [Operation; 256] {
    let mut table = [Operation::UNDEFINED; 256];

    table[Opcode::STOP as usize] = Operation::terminator(0, 0, false);
    table[Opcode::ADD as usize] = Operation::fixed(3, 2, 1);
    table[Opcode::MUL as usize] = Operation::fixed(5, 2, 1);
    table[Opcode::SUB as usize] = Operation::fixed(3, 2, 1);
    table[Opcode::DIV as usize] = Operation::fixed(5, 2, 1);
    table[Opcode::SDIV as usize] = Operation::fixed(5, 2, 1);
    table[Opcode::MOD as usize] = Operation::fixed(5, 2, 1);
    table[Opcode::SMOD as usize] = Operation::fixed(5, 2, 1);
    table[Opcode::ADDMOD as usize] = Operation::fixed(8, 3, 1);
    table[Opcode::MULMOD as usize] = Operation::fixed(8, 3, 1);
    table[Opcode::EXP as usize] = Operation::dynamic(10, 2, 1);
    table[Opcode::SIGNEXTEND as usize] = Operation::fixed(5, 2, 1);

    table[Opcode::LT as usize] = Operation::fixed(3, 2, 1);
    table[Opcode::GT as usize] = Operation::fixed(3, 2, 1);
    table[Opcode::SLT as usize] = Operation::fixed(3, 2, 1);
    table[Opcode::SGT as usize] = Operation::fixed(3, 2, 1);
    table[Opcode::EQ as usize] = Operation::fixed(3, 2, 1);
    table[Opcode::ISZERO as usize] = Operation::fixed(3, 1, 1);
    table[Opcode::AND as usize] = Operation::fixed(3, 2, 1);
    table[Opcode::OR as usize] = Operation::fixed(3, 2, 1);
    table[Opcode::XOR as usize] = Operation::fixed(3, 2, 1);
    table[Opcode::NOT as usize] = Operation::fixed(3, 1, 1);
    table[Opcode::BYTE as usize] = Operation::fixed(3, 2, 1);

    table[Opcode::KECCAK256 as usize] = Operation::dynamic(30, 2, 1);

    table[Opcode::ADDRESS as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::BALANCE as usize] = Operation::dynamic(0, 1, 1);
    table[Opcode::ORIGIN as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::CALLER as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::CALLVALUE as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::CALLDATALOAD as usize] = Operation::fixed(3, 1, 1);
    table[Opcode::CALLDATASIZE as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::CALLDATACOPY as usize] = Operation::dynamic(3, 3, 0);
    table[Opcode::CODESIZE as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::CODECOPY as usize] = Operation::dynamic(3, 3, 0);
    table[Opcode::GASPRICE as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::EXTCODESIZE as usize] = Operation::dynamic(0, 1, 1);
    table[Opcode::EXTCODECOPY as usize] = Operation::dynamic(0, 4, 0);

    table[Opcode::BLOCKHASH as usize] = Operation::fixed(20, 1, 1);
    table[Opcode::COINBASE as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::TIMESTAMP as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::NUMBER as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::PREVRANDAO as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::GASLIMIT as usize] = Operation::fixed(2, 0, 1);

    table[Opcode::POP as usize] = Operation::fixed(2, 1, 0);
    table[Opcode::MLOAD as usize] = Operation::dynamic(3, 1, 1);
    table[Opcode::MSTORE as usize] = Operation::dynamic(3, 2, 0);
    table[Opcode::MSTORE8 as usize] = Operation::dynamic(3, 2, 0);
    table[Opcode::SLOAD as usize] = Operation::dynamic(0, 1, 1);
    table[Opcode::SSTORE as usize] = Operation::dynamic(0, 2, 0);
    table[Opcode::JUMP as usize] = Operation::terminator(8, 1, false);
    table[Opcode::JUMPI as usize] = Operation::terminator(10, 2, false);
    table[Opcode::PC as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::MSIZE as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::GAS as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::JUMPDEST as usize] = Operation::fixed(1, 0, 0);

    // PUSH1..PUSH32
    let mut op = Opcode::PUSH1 as usize;
    while op <= Opcode::PUSH32 as usize {
        table[op] = Operation::fixed(3, 0, 1);
        op += 1;
    }
    // DUP1..DUP16: duplicating depth n requires n items and grows by one.
    let mut n: u8 = 1;
    while n <= 16 {
        table[Opcode::DUP1 as usize + (n as usize - 1)] = Operation::fixed(3, n, n + 1);
        n += 1;
    }
    // SWAP1..SWAP16: swapping with depth n requires n + 1 items, no growth.
    let mut n: u8 = 1;
    while n <= 16 {
        table[Opcode::SWAP1 as usize + (n as usize - 1)] = Operation::fixed(3, n + 1, n + 1);
        n += 1;
    }
    // LOG0..LOG4: 375 base plus 375 per topic; the per-byte part is dynamic.
    let mut n: u8 = 0;
    while n <= 4 {
        table[Opcode::LOG0 as usize + n as usize] =
            Operation::dynamic(375 * (n as u32 + 1), n + 2, 0);
        n += 1;
    }

    table[Opcode::CREATE as usize] = Operation::dynamic(32000, 3, 1);
    table[Opcode::CALL as usize] = Operation::dynamic(0, 7, 1);
    table[Opcode::CALLCODE as usize] = Operation::dynamic(0, 7, 1);
    table[Opcode::RETURN as usize] = Operation::terminator(0, 2, true);
    table[Opcode::INVALID as usize] = Operation::terminator(0, 0, false);
    table[Opcode::SELFDESTRUCT as usize] = Operation::terminator(5000, 1, true);

    table
}

#[allow(clippy::as_conversions, clippy::indexing_slicing)]
const fn build_homestead() -> [Operation; 256] {
    let mut table = build_frontier();
    table[Opcode::DELEGATECALL as usize] = Operation::dynamic(0, 6, 1);
    table
}

#[allow(clippy::as_conversions, clippy::indexing_slicing)]
const fn build_byzantium() -> [Operation; 256] {
    let mut table = build_homestead();
    // EIP-211 / EIP-214 / EIP-140
    table[Opcode::RETURNDATASIZE as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::RETURNDATACOPY as usize] = Operation::dynamic(3, 3, 0);
    table[Opcode::STATICCALL as usize] = Operation::dynamic(0, 6, 1);
    table[Opcode::REVERT as usize] = Operation::terminator(0, 2, true);
    table
}

#[allow(clippy::as_conversions, clippy::indexing_slicing)]
const fn build_constantinople() -> [Operation; 256] {
    let mut table = build_byzantium();
    // EIP-145 / EIP-1014 / EIP-1052
    table[Opcode::SHL as usize] = Operation::fixed(3, 2, 1);
    table[Opcode::SHR as usize] = Operation::fixed(3, 2, 1);
    table[Opcode::SAR as usize] = Operation::fixed(3, 2, 1);
    table[Opcode::CREATE2 as usize] = Operation::dynamic(32000, 4, 1);
    table[Opcode::EXTCODEHASH as usize] = Operation::dynamic(0, 1, 1);
    table
}

#[allow(clippy::as_conversions, clippy::indexing_slicing)]
const fn build_istanbul() -> [Operation; 256] {
    let mut table = build_constantinople();
    // EIP-1344 / EIP-1884
    table[Opcode::CHAINID as usize] = Operation::fixed(2, 0, 1);
    table[Opcode::SELFBALANCE as usize] = Operation::fixed(5, 0, 1);
    table
}

#[allow(clippy::as_conversions, clippy::indexing_slicing)]
const fn build_london() -> [Operation; 256] {
    let mut table = build_istanbul();
    // EIP-3198
    table[Opcode::BASEFEE as usize] = Operation::fixed(2, 0, 1);
    table
}

#[allow(clippy::as_conversions, clippy::indexing_slicing)]
const fn build_shanghai() -> [Operation; 256] {
    let mut table = build_london();
    // EIP-3855
    table[Opcode::PUSH0 as usize] = Operation::fixed(2, 0, 1);
    table
}

#[allow(clippy::as_conversions, clippy::indexing_slicing)]
const fn build_cancun() -> [Operation; 256] {
    let mut table = build_shanghai();
    // EIP-1153 / EIP-5656 / EIP-4844 / EIP-7516
    table[Opcode::TLOAD as usize] = Operation::fixed(100, 1, 1);
    table[Opcode::TSTORE as usize] = Operation::fixed(100, 2, 0);
    table[Opcode::MCOPY as usize] = Operation::dynamic(3, 3, 0);
    table[Opcode::BLOBHASH as usize] = Operation::fixed(3, 1, 1);
    table[Opcode::BLOBBASEFEE as usize] = Operation::fixed(2, 0, 1);
    table
}
