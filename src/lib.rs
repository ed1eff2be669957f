//! # blockvm
//!
//! A block-validated Ethereum Virtual Machine interpreter.
//!
//! ## Overview
//!
//! blockvm executes EVM bytecode in two phases. A one-shot *analysis* pass
//! rewrites the raw code into a linear instruction stream: PUSH immediates
//! are pre-decoded, basic blocks are identified, and every block carries
//! pre-summed gas and stack metadata. The *interpreter* then consumes that
//! stream, validating gas and stack once per block instead of once per
//! opcode; the opcode bodies in between use unchecked fast paths and only
//! charge their dynamic gas.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CodeAnalysis                          │
//! │   bytecode ──► segments / blocks / jumpdests ──► stream     │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           VM                                │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  CallFrame  │  │   Memory    │  │       Stack         │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   Journal   │  │  JumpTable  │  │    Environment      │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Host (trait)                          │
//! │          account state, storage, code, precompiles          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key components
//!
//! - [`vm::VM`]: the execution engine, one instance per external message
//! - [`analysis::CodeAnalysis`]: immutable per-contract analysis, cacheable
//!   by code hash
//! - [`call_frame::CallFrame`]: execution context for each call level
//! - [`journal::Journal`]: reversible state-change log with snapshot revert
//! - [`host::Host`]: world-state capability surface supplied by the embedder
//!
//! ## Supported forks
//!
//! Opcode availability is gated from Frontier through Cancun, with Prague
//! placeholders (extended precompile range). The gas schedule is the
//! canonical post-Berlin/London one for every fork.
//!
//! ## Usage
//!
//! ```ignore
//! use blockvm::{Fork, InMemoryHost, Message, VM};
//!
//! let mut host = InMemoryHost::default();
//! // ... install accounts and code ...
//! let mut vm = VM::new(&mut host, Fork::Cancun, message)?;
//! let report = vm.execute()?;
//! if report.is_success() {
//!     println!("gas used: {}", report.gas_used);
//! }
//! ```

pub mod analysis;
pub mod call_frame;
pub mod constants;
pub mod errors;
pub mod execution_handlers;
pub mod fork;
pub mod gas_cost;
pub mod host;
pub mod journal;
pub mod jump_table;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod precompiles;
pub mod utils;
pub mod vm;

pub use analysis::CodeAnalysis;
pub use errors::{ExceptionalHalt, ExecutionReport, HostError, TxResult, VMError};
pub use fork::Fork;
pub use host::{Account, Environment, Host, InMemoryHost, PrecompileOutcome};
pub use journal::{Journal, JournalEntry, Log};
pub use utils::Address;
pub use vm::{Message, VM};

pub use ethereum_types::{H160, H256, U256, U512};
