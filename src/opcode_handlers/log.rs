//! LOG0..LOG4 (spec §4.5): append an event to `vm.logs` and to the trace
//! tree. Forbidden in a static context, same as SSTORE/CREATE/SELFDESTRUCT.

use crate::errors::{OpcodeResult, VMError};
use crate::expr::{self, LogEntry, Word};
use crate::memory;
use crate::vm::Vm;

fn concrete_offset(w: &Word) -> Result<usize, VMError> {
    let lit = w
        .as_lit()
        .ok_or(crate::errors::ExceptionalHalt::InvalidMemoryAccess)?;
    usize::try_from(lit).map_err(|_| crate::errors::ExceptionalHalt::InvalidMemoryAccess.into())
}

/// `N` is the topic count (0..=4), fixed at the call site by the opcode
/// table the same way `op_push`/`op_dup`/`op_swap` are monomorphized.
pub fn op_log<const N: usize>(vm: &mut Vm) -> Result<OpcodeResult, VMError> {
    vm.require_not_static()?;

    let [offset_word, size_word] = *vm.state.stack.pop()?;
    let off = concrete_offset(&offset_word)?;
    let sz = concrete_offset(&size_word)?;

    let mut topics = Vec::with_capacity(N);
    for _ in 0..N {
        topics.push(vm.state.stack.pop1()?);
    }

    let expansion = memory::access_memory_range(&vm.state.memory, u64::try_from(off).unwrap_or(u64::MAX), u64::try_from(sz).unwrap_or(u64::MAX))?;
    let fees = vm.current_fee_schedule();
    let topic_count = u64::try_from(N).unwrap_or(0);
    let data_cost = fees.g_logdata.saturating_mul(u64::try_from(sz).unwrap_or(u64::MAX));
    let cost = fees
        .g_log
        .saturating_add(fees.g_logtopic.saturating_mul(topic_count))
        .saturating_add(data_cost)
        .saturating_add(expansion);
    vm.burn_gas(cost)?;

    let data = vm.state.memory.load_range(off, sz)?;

    let address = vm.state.address;
    vm.logs.push(LogEntry {
        address,
        data: data.clone(),
        topics: topics.clone(),
    });

    let trace_topics = topics
        .iter()
        .map(|t| t.as_lit().unwrap_or_default())
        .collect();
    let trace_data = expr::concrete_bytes(&data).unwrap_or_default();
    vm.traces.log(trace_topics, trace_data);

    Ok(OpcodeResult::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Fork, StorageBase, VmOpts};
    use crate::expr::{Buf, Prop};
    use bytes::Bytes;
    use ethereum_types::{Address, H256, U256};
    use std::collections::BTreeMap;

    fn base_opts() -> VmOpts {
        VmOpts {
            contract: Address::zero(),
            calldata: (Buf::ConcreteBuf(Bytes::new()), Vec::<Prop>::new()),
            storage_base: StorageBase::Concrete,
            value: U256::zero(),
            priority_fee: U256::zero(),
            address: Address::from_low_u64_be(1),
            caller: Address::from_low_u64_be(2),
            origin: Address::from_low_u64_be(2),
            gas: 1_000_000,
            gas_limit: 1_000_000,
            number: U256::from(1),
            timestamp: U256::from(1),
            coinbase: Address::from_low_u64_be(9),
            prev_randao: H256::zero(),
            max_code_size: 0x6000,
            block_gas_limit: 30_000_000,
            gas_price: U256::zero(),
            base_fee: U256::zero(),
            schedule: crate::gas::FeeSchedule::default(),
            chain_id: U256::one(),
            is_create: false,
            tx_access_list: BTreeMap::new(),
            allow_ffi: false,
            fork: Fork::London,
        }
    }

    #[test]
    fn log0_with_empty_data_records_one_entry() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap();
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap();
        op_log::<0>(&mut vm).unwrap();
        assert_eq!(vm.logs.len(), 1);
        assert!(vm.logs[0].topics.is_empty());
    }

    #[test]
    fn log_in_static_context_errors() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.is_static = true;
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap();
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap();
        let err = op_log::<0>(&mut vm).unwrap_err();
        assert!(matches!(
            err,
            VMError::ExceptionalHalt(crate::errors::ExceptionalHalt::StateChangeWhileStatic)
        ));
    }

    #[test]
    fn log2_pops_two_topics_then_offset_size() {
        let mut vm = Vm::new(base_opts()).unwrap();
        vm.state.stack.push(Word::Lit(U256::from(1))).unwrap(); // topic1
        vm.state.stack.push(Word::Lit(U256::from(2))).unwrap(); // topic2
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap(); // offset
        vm.state.stack.push(Word::Lit(U256::zero())).unwrap(); // size
        op_log::<2>(&mut vm).unwrap();
        assert_eq!(vm.logs[0].topics.len(), 2);
    }
}
