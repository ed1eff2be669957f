//! End-to-end interpreter scenarios against the in-memory host.

use blockvm::{
    Account, Address, ExceptionalHalt, ExecutionReport, Fork, Host, InMemoryHost, JournalEntry,
    Message, TxResult, U256, VM,
    utils::{calculate_create_address, u256_to_h256},
};
use bytes::Bytes;

const CONTRACT: u64 = 0xC0DE;
const CALLER: u64 = 0xCA11;
const DEFAULT_GAS: u64 = 100_000;

fn contract_address() -> Address {
    Address::from_low_u64_be(CONTRACT)
}

fn caller_address() -> Address {
    Address::from_low_u64_be(CALLER)
}

fn host_with_code(code: &[u8]) -> InMemoryHost {
    let mut host = InMemoryHost::default();
    host.add_account(
        contract_address(),
        Account::with_code(Bytes::copy_from_slice(code)),
    );
    host
}

fn run(host: &mut InMemoryHost, gas_limit: u64) -> ExecutionReport {
    run_message(
        host,
        Message {
            caller: caller_address(),
            to: Some(contract_address()),
            value: U256::zero(),
            calldata: Bytes::new(),
            gas_limit,
            is_static: false,
        },
    )
}

fn run_message(host: &mut InMemoryHost, message: Message) -> ExecutionReport {
    let mut vm = VM::new(host, Fork::Cancun, message).unwrap();
    vm.execute().unwrap()
}

/// Creation message: the calldata is the initcode and `to` is derived.
fn run_create(host: &mut InMemoryHost, initcode: &[u8], gas_limit: u64) -> ExecutionReport {
    run_message(
        host,
        Message {
            caller: caller_address(),
            to: None,
            value: U256::zero(),
            calldata: Bytes::copy_from_slice(initcode),
            gas_limit,
            is_static: false,
        },
    )
}

/// PUSH20 of an address followed by more code.
fn push_address(code: &mut Vec<u8>, address: Address) {
    code.push(0x73);
    code.extend_from_slice(address.as_bytes());
}

#[test]
fn add_two_numbers() {
    // PUSH1 3, PUSH1 5, ADD, STOP: one block costing 3 + 3 + 3 = 9.
    let mut host = host_with_code(&[0x60, 0x03, 0x60, 0x05, 0x01, 0x00]);
    let report = run(&mut host, DEFAULT_GAS);

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(report.gas_used, 9);
    assert_eq!(report.gas_left, DEFAULT_GAS - 9);
    assert!(report.output.is_empty());
}

#[test]
fn jump_to_valid_destination() {
    // PUSH1 4, JUMP, STOP, JUMPDEST, STOP.
    let mut host = host_with_code(&[0x60, 0x04, 0x56, 0x00, 0x5B, 0x00]);
    let report = run(&mut host, DEFAULT_GAS);

    assert_eq!(report.result, TxResult::Success);
    // Entry block: 3 + 8; target block: 1 (JUMPDEST) + 0 (STOP).
    assert_eq!(report.gas_used, 12);
}

#[test]
fn jump_into_push_data_is_invalid() {
    // PUSH1 0x5B, JUMP: the pushed target is way outside the code.
    let mut host = host_with_code(&[0x60, 0x5B, 0x56, 0x00]);
    let report = run(&mut host, DEFAULT_GAS);
    assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::InvalidJump));
    assert_eq!(report.gas_left, 0);

    // A 0x5B byte hidden in PUSH data is not a destination either.
    let mut host = host_with_code(&[0x60, 0x05, 0x56, 0x00, 0x60, 0x5B, 0x00]);
    let report = run(&mut host, DEFAULT_GAS);
    assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::InvalidJump));
    assert_eq!(report.gas_left, 0);
}

#[test]
fn conditional_jump_falls_through_on_zero() {
    // PUSH1 0 (condition), PUSH1 7 (target), JUMPI, PUSH1 1, STOP, JUMPDEST, STOP
    // Note operand order: JUMPI pops target first.
    let code = [0x60, 0x00, 0x60, 0x07, 0x57, 0x60, 0x01, 0x00, 0x5B, 0x00];
    // target 7 is the STOP before the JUMPDEST; condition is zero so the
    // fall-through path must execute (and the bogus target never resolves).
    let mut host = host_with_code(&code);
    let report = run(&mut host, DEFAULT_GAS);
    assert_eq!(report.result, TxResult::Success);
}

#[test]
fn out_of_gas_at_block_entry_runs_nothing() {
    // PUSH1 1, ADD, STOP needs 6 gas up front; give it 2.
    let mut host = host_with_code(&[0x60, 0x01, 0x01, 0x00]);
    let report = run(&mut host, 2);

    assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::OutOfGas));
    assert_eq!(report.gas_left, 0);
    assert!(report.output.is_empty());
    assert!(report.state_changes.is_empty());
}

#[test]
fn revert_returns_reason_and_remaining_gas() {
    // PUSH32 reason, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, REVERT.
    let reason = [0xAB; 32];
    let mut code = vec![0x7F];
    code.extend_from_slice(&reason);
    code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xFD]);

    let mut host = host_with_code(&code);
    let report = run(&mut host, DEFAULT_GAS);

    assert_eq!(report.result, TxResult::Revert);
    assert_eq!(report.output.as_ref(), &reason);
    // Constants 3+3+3+3+3 plus one word of memory expansion.
    assert_eq!(report.gas_used, 15 + 3);
    assert!(report.logs.is_empty());
    assert!(report.state_changes.is_empty());
}

#[test]
fn storage_write_then_read() {
    // PUSH1 42, PUSH1 1, SSTORE, PUSH1 1, SLOAD, STOP.
    let mut host = host_with_code(&[0x60, 0x2A, 0x60, 0x01, 0x55, 0x60, 0x01, 0x54, 0x00]);
    let report = run(&mut host, DEFAULT_GAS);

    assert_eq!(report.result, TxResult::Success);
    // Constants 3+3+3 plus SSTORE fresh-cold (20000 + 2100) plus warm SLOAD.
    assert_eq!(report.gas_used, 9 + 22100 + 100);

    let slot = u256_to_h256(U256::one());
    assert_eq!(
        host.get_storage(contract_address(), slot).unwrap(),
        U256::from(42)
    );
    assert!(report.state_changes.iter().any(|change| matches!(
        change,
        JournalEntry::StorageChange { address, .. } if *address == contract_address()
    )));
}

#[test]
fn revert_rolls_back_storage_and_logs() {
    // PUSH1 42, PUSH1 1, SSTORE, LOG0(0,0), PUSH1 0, PUSH1 0, REVERT.
    let code = [
        0x60, 0x2A, 0x60, 0x01, 0x55, // SSTORE
        0x60, 0x00, 0x60, 0x00, 0xA0, // LOG0 over an empty window
        0x60, 0x00, 0x60, 0x00, 0xFD, // REVERT empty
    ];
    let mut host = host_with_code(&code);
    let report = run(&mut host, DEFAULT_GAS);

    assert_eq!(report.result, TxResult::Revert);
    assert!(report.logs.is_empty());
    assert!(report.state_changes.is_empty());
    let slot = u256_to_h256(U256::one());
    assert_eq!(
        host.get_storage(contract_address(), slot).unwrap(),
        U256::zero()
    );
}

#[test]
fn logs_survive_success() {
    // PUSH1 topic, PUSH1 0 (size), PUSH1 0 (offset), LOG1, STOP.
    let code = [0x60, 0x07, 0x60, 0x00, 0x60, 0x00, 0xA1, 0x00];
    let mut host = host_with_code(&code);
    let report = run(&mut host, DEFAULT_GAS);

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(report.logs.len(), 1);
    let log = report.logs.first().unwrap();
    assert_eq!(log.address, contract_address());
    assert_eq!(log.topics, vec![u256_to_h256(U256::from(7))]);
    assert!(log.data.is_empty());
}

#[test]
fn gas_opcode_observes_per_instruction_accounting() {
    // GAS, GAS, ADD, MSTORE(0), RETURN(0, 32).
    let code = [
        0x5A, 0x5A, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];
    let mut host = host_with_code(&code);
    let report = run(&mut host, DEFAULT_GAS);

    assert_eq!(report.result, TxResult::Success);
    // First GAS sees limit - 2, the second limit - 4, despite the block
    // having pre-charged its full 19 gas of constants.
    let expected = U256::from(DEFAULT_GAS - 2) + U256::from(DEFAULT_GAS - 4);
    assert_eq!(U256::from_big_endian(&report.output), expected);
}

#[test]
fn mstore_mload_round_trip() {
    // PUSH1 42, PUSH1 64, MSTORE, PUSH1 64, MLOAD, PUSH1 0, MSTORE, RETURN(0,32)
    let code = [
        0x60, 0x2A, 0x60, 0x40, 0x52, // MSTORE at 64
        0x60, 0x40, 0x51, // MLOAD from 64
        0x60, 0x00, 0x52, // MSTORE at 0
        0x60, 0x20, 0x60, 0x00, 0xF3,
    ];
    let mut host = host_with_code(&code);
    let report = run(&mut host, DEFAULT_GAS);

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(U256::from_big_endian(&report.output), U256::from(42));
}

#[test]
fn division_by_zero_yields_zero() {
    // PUSH1 0, PUSH1 5, DIV → 5 / 0 = 0; return it.
    let code = [
        0x60, 0x00, 0x60, 0x05, 0x04, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];
    let mut host = host_with_code(&code);
    let report = run(&mut host, DEFAULT_GAS);
    assert_eq!(U256::from_big_endian(&report.output), U256::zero());
}

#[test]
fn invalid_opcode_consumes_everything() {
    let mut host = host_with_code(&[0xFE]);
    let report = run(&mut host, DEFAULT_GAS);
    assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::InvalidOpcode));
    assert_eq!(report.gas_left, 0);
}

#[test]
fn stack_overflow_is_caught_at_block_entry() {
    // 1025 PUSH0s can never fit; the block entry rejects before any run.
    let mut code = vec![0x5F; 1025];
    code.push(0x00);
    let mut host = host_with_code(&code);
    let report = run(&mut host, DEFAULT_GAS);
    assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::StackOverflow));
    assert_eq!(report.gas_left, 0);
}

#[test]
fn return_data_reads_are_bounds_checked() {
    // RETURNDATACOPY(dest=0, offset=0, size=1) with no prior sub-call.
    let code = [0x60, 0x01, 0x60, 0x00, 0x60, 0x00, 0x3E, 0x00];
    let mut host = host_with_code(&code);
    let report = run(&mut host, DEFAULT_GAS);
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::ReturnDataOutOfBounds)
    );
    assert_eq!(report.gas_left, 0);
}

#[test]
fn unaffordable_memory_expansion_is_out_of_gas() {
    // MSTORE at offset 2^31: the quadratic expansion cost is astronomical.
    let code = [0x60, 0x2A, 0x63, 0x80, 0x00, 0x00, 0x00, 0x52, 0x00];
    let mut host = host_with_code(&code);
    let report = run(&mut host, DEFAULT_GAS);
    assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::OutOfGas));
    assert_eq!(report.gas_left, 0);
}

#[test]
fn transient_storage_round_trips_within_the_transaction() {
    // TSTORE slot 1 = 42, TLOAD it back, return it.
    let code = [
        0x60, 0x2A, 0x60, 0x01, 0x5D, // TSTORE
        0x60, 0x01, 0x5C, // TLOAD
        0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];
    let mut host = host_with_code(&code);
    let report = run(&mut host, DEFAULT_GAS);

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(U256::from_big_endian(&report.output), U256::from(42));
    // Transient writes are not state changes.
    assert!(report.state_changes.is_empty());
}

#[test]
fn clearing_a_slot_earns_a_capped_refund() {
    let mut host = host_with_code(&[0x60, 0x00, 0x60, 0x01, 0x55, 0x00]);
    let slot = u256_to_h256(U256::one());
    host.set_storage(contract_address(), slot, U256::from(7))
        .unwrap();

    let report = run(&mut host, DEFAULT_GAS);
    assert_eq!(report.result, TxResult::Success);
    // Constants 3+3, SSTORE reset-cold 2900 + 2100.
    assert_eq!(report.gas_used, 6 + 5000);
    // The 4800 clear refund is capped to gas_used / 5.
    assert_eq!(report.gas_refunded, report.gas_used / 5);
    assert_eq!(
        host.get_storage(contract_address(), slot).unwrap(),
        U256::zero()
    );
}

#[test]
fn value_transfer_on_top_level_call() {
    let mut host = host_with_code(&[0x00]);
    host.set_balance(caller_address(), U256::from(1000)).unwrap();

    let report = run_message(
        &mut host,
        Message {
            caller: caller_address(),
            to: Some(contract_address()),
            value: U256::from(250),
            calldata: Bytes::new(),
            gas_limit: DEFAULT_GAS,
            is_static: false,
        },
    );

    assert_eq!(report.result, TxResult::Success);
    assert_eq!(host.get_balance(caller_address()).unwrap(), U256::from(750));
    assert_eq!(
        host.get_balance(contract_address()).unwrap(),
        U256::from(250)
    );
}

#[test]
fn insufficient_balance_refuses_the_message() {
    let mut host = host_with_code(&[0x00]);
    let mut vm = VM::new(
        &mut host,
        Fork::Cancun,
        Message {
            caller: caller_address(),
            to: Some(contract_address()),
            value: U256::from(1),
            calldata: Bytes::new(),
            gas_limit: DEFAULT_GAS,
            is_static: false,
        },
    )
    .unwrap();
    let err = vm.execute().unwrap_err();
    assert_eq!(err, ExceptionalHalt::InsufficientBalance.into());
}

#[test]
fn static_call_blocks_storage_writes() {
    // Callee: PUSH1 0, PUSH1 0, SSTORE, STOP — always illegal statically.
    let callee = Address::from_low_u64_be(0xDEAD);
    let mut host = InMemoryHost::default();
    host.add_account(
        callee,
        Account::with_code(Bytes::copy_from_slice(&[
            0x60, 0x00, 0x60, 0x00, 0x55, 0x00,
        ])),
    );

    // Caller: STATICCALL(gas=0xFFFF, callee, 0, 0, 0, 0), store the result
    // flag and return it.
    let mut code = vec![
        0x60, 0x00, // ret_size
        0x60, 0x00, // ret_offset
        0x60, 0x00, // args_size
        0x60, 0x00, // args_offset
    ];
    push_address(&mut code, callee);
    code.extend_from_slice(&[0x61, 0xFF, 0xFF]); // PUSH2 gas
    code.extend_from_slice(&[
        0xFA, // STATICCALL
        0x60, 0x00, 0x52, // MSTORE result at 0
        0x60, 0x20, 0x60, 0x00, 0xF3, // RETURN 32 bytes
    ]);
    host.add_account(contract_address(), Account::with_code(code.into()));

    let report = run(&mut host, 200_000);
    assert_eq!(report.result, TxResult::Success);
    // The child failed, so the flag on the stack was zero.
    assert_eq!(U256::from_big_endian(&report.output), U256::zero());
    // And its write never landed.
    assert_eq!(
        host.get_storage(callee, u256_to_h256(U256::zero()))
            .unwrap(),
        U256::zero()
    );
}

#[test]
fn call_executes_callee_and_copies_return_data() {
    // Callee returns the word 42.
    let callee = Address::from_low_u64_be(0xBEEF);
    let mut host = InMemoryHost::default();
    host.add_account(
        callee,
        Account::with_code(Bytes::copy_from_slice(&[
            0x60, 0x2A, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
        ])),
    );

    // Caller: CALL(gas, callee, 0, 0, 0, ret=0..32), then return memory 0..32.
    let mut code = vec![
        0x60, 0x20, // ret_size 32
        0x60, 0x00, // ret_offset
        0x60, 0x00, // args_size
        0x60, 0x00, // args_offset
        0x60, 0x00, // value
    ];
    push_address(&mut code, callee);
    code.extend_from_slice(&[0x62, 0x01, 0x00, 0x00]); // PUSH3 gas
    code.extend_from_slice(&[
        0xF1, // CALL
        0x50, // POP the success flag
        0x60, 0x20, 0x60, 0x00, 0xF3,
    ]);
    host.add_account(contract_address(), Account::with_code(code.into()));

    let report = run(&mut host, 200_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(U256::from_big_endian(&report.output), U256::from(42));
}

#[test]
fn call_with_value_moves_balance_into_the_callee() {
    let callee = Address::from_low_u64_be(0xBEEF);
    let mut host = InMemoryHost::default();
    host.add_account(callee, Account::with_code(Bytes::from_static(&[0x00])));

    // CALL(gas, callee, value=123, 0, 0, 0, 0); POP; STOP
    let mut code = vec![
        0x60, 0x00, // ret_size
        0x60, 0x00, // ret_offset
        0x60, 0x00, // args_size
        0x60, 0x00, // args_offset
        0x60, 0x7B, // value 123
    ];
    push_address(&mut code, callee);
    code.extend_from_slice(&[0x62, 0x01, 0x00, 0x00, 0xF1, 0x50, 0x00]);
    host.add_account(
        contract_address(),
        Account {
            balance: U256::from(500),
            code: code.into(),
            ..Default::default()
        },
    );

    let report = run(&mut host, 200_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(host.get_balance(callee).unwrap(), U256::from(123));
    assert_eq!(
        host.get_balance(contract_address()).unwrap(),
        U256::from(377)
    );
}

#[test]
fn failed_child_rolls_back_only_its_own_changes() {
    // Callee: SSTORE then REVERT — its write must vanish.
    let callee = Address::from_low_u64_be(0xDEAD);
    let mut host = InMemoryHost::default();
    host.add_account(
        callee,
        Account::with_code(Bytes::copy_from_slice(&[
            0x60, 0x01, 0x60, 0x01, 0x55, // SSTORE slot1 = 1
            0x60, 0x00, 0x60, 0x00, 0xFD, // REVERT
        ])),
    );

    // Caller: SSTORE its own slot, call the reverting callee, STOP.
    let mut code = vec![
        0x60, 0x2A, 0x60, 0x02, 0x55, // parent SSTORE slot2 = 42
        0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00,
    ];
    push_address(&mut code, callee);
    code.extend_from_slice(&[0x62, 0x01, 0x00, 0x00, 0xF1, 0x50, 0x00]);
    host.add_account(contract_address(), Account::with_code(code.into()));

    let report = run(&mut host, 200_000);
    assert_eq!(report.result, TxResult::Success);

    // Parent write survives, child write does not.
    assert_eq!(
        host.get_storage(contract_address(), u256_to_h256(U256::from(2)))
            .unwrap(),
        U256::from(42)
    );
    assert_eq!(
        host.get_storage(callee, u256_to_h256(U256::one())).unwrap(),
        U256::zero()
    );
}

#[test]
fn delegatecall_writes_into_the_callers_storage() {
    // Library code: SSTORE slot1 = 7, STOP.
    let library = Address::from_low_u64_be(0x11B);
    let mut host = InMemoryHost::default();
    host.add_account(
        library,
        Account::with_code(Bytes::copy_from_slice(&[
            0x60, 0x07, 0x60, 0x01, 0x55, 0x00,
        ])),
    );

    // Caller: DELEGATECALL(gas, library, 0, 0, 0, 0); POP; STOP.
    let mut code = vec![
        0x60, 0x00, // ret_size
        0x60, 0x00, // ret_offset
        0x60, 0x00, // args_size
        0x60, 0x00, // args_offset
    ];
    push_address(&mut code, library);
    code.extend_from_slice(&[0x62, 0x01, 0x00, 0x00, 0xF4, 0x50, 0x00]);
    host.add_account(contract_address(), Account::with_code(code.into()));

    let report = run(&mut host, 200_000);
    assert_eq!(report.result, TxResult::Success);

    let slot = u256_to_h256(U256::one());
    assert_eq!(
        host.get_storage(contract_address(), slot).unwrap(),
        U256::from(7)
    );
    assert_eq!(host.get_storage(library, slot).unwrap(), U256::zero());
}

#[test]
fn identity_precompile_routes_through_the_host() {
    // CALL(gas, 0x04, 0, args=0..4, ret=0..4) with memory[0..4] = 0xAABBCCDD,
    // then return memory[0..32].
    let mut code = vec![
        0x63, 0xAA, 0xBB, 0xCC, 0xDD, // PUSH4 payload
        0x60, 0x00, 0x52, // MSTORE word at 0 (payload in bytes 28..32)
        0x60, 0x04, // ret_size 4
        0x60, 0x00, // ret_offset 0
        0x60, 0x04, // args_size 4
        0x60, 0x1C, // args_offset 28
        0x60, 0x00, // value 0
        0x60, 0x04, // address 0x04
    ];
    code.extend_from_slice(&[0x61, 0xFF, 0xFF]); // PUSH2 gas
    code.extend_from_slice(&[0xF1, 0x50, 0x60, 0x20, 0x60, 0x00, 0xF3]);

    let mut host = host_with_code(&code);
    let report = run(&mut host, 200_000);
    assert_eq!(report.result, TxResult::Success);
    // The identity output landed at offset 0, so the returned word starts
    // with the payload.
    assert_eq!(
        report.output.get(..4).unwrap(),
        &[0xAA, 0xBB, 0xCC, 0xDD]
    );
}

#[test]
fn create_deploys_and_runs_initcode() {
    // Initcode: SSTORE slot0 = 42, STOP (deploys an empty contract).
    // Factory: MSTORE the 6 initcode bytes left-aligned at 0, CREATE, STOP.
    let initcode: [u8; 6] = [0x60, 0x2A, 0x60, 0x00, 0x55, 0x00];
    let mut word = [0u8; 32];
    word[..6].copy_from_slice(&initcode);

    let mut code = vec![0x7F];
    code.extend_from_slice(&word); // PUSH32 initcode word
    code.extend_from_slice(&[
        0x60, 0x00, 0x52, // MSTORE at 0
        0x60, 0x06, // size 6
        0x60, 0x00, // offset 0
        0x60, 0x00, // value 0
        0xF0, // CREATE
        0x50, 0x00, // POP; STOP
    ]);

    let mut host = host_with_code(&code);
    let report = run(&mut host, 500_000);
    assert_eq!(report.result, TxResult::Success);

    let created = calculate_create_address(contract_address(), 0);
    // The initcode ran in the created account's context...
    assert_eq!(
        host.get_storage(created, u256_to_h256(U256::zero())).unwrap(),
        U256::from(42)
    );
    // ...the account exists with nonce 1 and empty code...
    assert_eq!(host.get_nonce(created).unwrap(), 1);
    assert!(host.get_code(created).unwrap().is_empty());
    // ...and the factory's nonce advanced.
    assert_eq!(host.get_nonce(contract_address()).unwrap(), 1);
}

#[test]
fn create_rejects_reserved_code_prefix() {
    // Initcode returning one 0xEF byte: MSTORE8(0, 0xEF); RETURN(0, 1).
    let initcode = [0x60, 0xEF, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xF3];
    let mut word = [0u8; 32];
    word[..initcode.len()].copy_from_slice(&initcode);

    let mut code = vec![0x7F];
    code.extend_from_slice(&word);
    code.extend_from_slice(&[
        0x60, 0x00, 0x52, // MSTORE
        0x60, 0x0A, // size 10
        0x60, 0x00, // offset
        0x60, 0x00, // value
        0xF0, // CREATE
        0x60, 0x00, 0x52, // MSTORE result
        0x60, 0x20, 0x60, 0x00, 0xF3,
    ]);

    let mut host = host_with_code(&code);
    let report = run(&mut host, 500_000);
    assert_eq!(report.result, TxResult::Success);
    // CREATE pushed zero: deployment failed on the reserved prefix.
    assert_eq!(U256::from_big_endian(&report.output), U256::zero());

    let created = calculate_create_address(contract_address(), 0);
    assert!(host.get_code(created).unwrap().is_empty());
}

#[test]
fn create_message_deploys_code() {
    // Initcode: RETURN(0, 1) — deploys a single zero byte.
    let initcode = [0x60, 0x01, 0x60, 0x00, 0xF3];
    let mut host = InMemoryHost::default();
    let report = run_create(&mut host, &initcode, DEFAULT_GAS);

    assert_eq!(report.result, TxResult::Success);
    // Constants 3+3, one word of memory expansion, 200 gas code deposit.
    assert_eq!(report.gas_used, 6 + 3 + 200);
    assert_eq!(report.output.as_ref(), &[0x00]);

    let created = calculate_create_address(caller_address(), 0);
    assert_eq!(host.get_code(created).unwrap().as_ref(), &[0x00]);
    assert_eq!(host.get_nonce(created).unwrap(), 1);
    // Creating consumed the sender's nonce.
    assert_eq!(host.get_nonce(caller_address()).unwrap(), 1);
    assert!(report.state_changes.iter().any(|change| matches!(
        change,
        JournalEntry::CodeChange { address } if *address == created
    )));
}

#[test]
fn create_message_rejects_reserved_prefix() {
    // Initcode: MSTORE8(0, 0xEF); RETURN(0, 1).
    let initcode = [0x60, 0xEF, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xF3];
    let mut host = InMemoryHost::default();
    let report = run_create(&mut host, &initcode, DEFAULT_GAS);

    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::InvalidInitialByte)
    );
    assert_eq!(report.gas_left, 0);
    assert!(report.state_changes.is_empty());

    // The account setup was rolled back; only the sender nonce sticks.
    let created = calculate_create_address(caller_address(), 0);
    assert!(host.get_code(created).unwrap().is_empty());
    assert_eq!(host.get_nonce(created).unwrap(), 0);
    assert_eq!(host.get_nonce(caller_address()).unwrap(), 1);
}

#[test]
fn create_message_rejects_oversized_code() {
    // Initcode: RETURN(0, 24577) — one byte past the deployed-code cap.
    let initcode = [0x62, 0x00, 0x60, 0x01, 0x60, 0x00, 0xF3];
    let mut host = InMemoryHost::default();
    let report = run_create(&mut host, &initcode, DEFAULT_GAS);

    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::MaxCodeSizeExceeded)
    );
    assert_eq!(report.gas_left, 0);

    let created = calculate_create_address(caller_address(), 0);
    assert!(host.get_code(created).unwrap().is_empty());
}

#[test]
fn create_message_fails_on_an_occupied_address() {
    let created = calculate_create_address(caller_address(), 0);
    let mut host = InMemoryHost::default();
    host.add_account(
        created,
        Account {
            nonce: 1,
            ..Default::default()
        },
    );

    let report = run_create(&mut host, &[0x00], DEFAULT_GAS);
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::AddressCollision)
    );
    assert_eq!(report.gas_left, 0);
    assert_eq!(host.get_nonce(created).unwrap(), 1);
}

#[test]
fn execution_is_deterministic() {
    let code = [
        0x60, 0x2A, 0x60, 0x01, 0x55, // SSTORE
        0x60, 0x01, 0x54, // SLOAD
        0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];
    let host = host_with_code(&code);

    let mut first_host = host.clone();
    let mut second_host = host.clone();
    let first = run(&mut first_host, DEFAULT_GAS);
    let second = run(&mut second_host, DEFAULT_GAS);

    assert_eq!(first, second);
    assert_eq!(first_host.accounts, second_host.accounts);
}

#[test]
fn calldata_is_visible_to_the_callee() {
    // CALLDATALOAD(0), MSTORE(0), RETURN(0,32).
    let code = [
        0x60, 0x00, 0x35, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];
    let mut host = host_with_code(&code);
    let mut calldata = vec![0u8; 32];
    calldata[31] = 0x2A;
    let report = run_message(
        &mut host,
        Message {
            caller: caller_address(),
            to: Some(contract_address()),
            value: U256::zero(),
            calldata: calldata.into(),
            gas_limit: DEFAULT_GAS,
            is_static: false,
        },
    );
    assert_eq!(U256::from_big_endian(&report.output), U256::from(42));
}

#[test]
fn static_entry_makes_the_whole_call_static() {
    let mut host = host_with_code(&[0x60, 0x00, 0x60, 0x00, 0x55, 0x00]);
    let report = run_message(
        &mut host,
        Message {
            caller: caller_address(),
            to: Some(contract_address()),
            value: U256::zero(),
            calldata: Bytes::new(),
            gas_limit: DEFAULT_GAS,
            is_static: true,
        },
    );
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::StaticCallStateChange)
    );
    assert_eq!(report.gas_left, 0);
}
