//! Memory operations for WebAssembly
//!
//! Loads, stores, and size operations per the WebAssembly specification
//! section 4.4.7. All accesses go through memory 0 of the current module;
//! the engine resolves the instance and passes it in.
//!
//! The effective address is `base + offset` computed in 64 bits, so the
//! addition itself cannot wrap; the bounds check against the data length
//! happens inside [`MemoryInstance`].

use super::{MemArg, MemoryInstance, Stack, Value, VmError};

#[inline]
fn effective_address(stack: &mut Stack, memarg: &MemArg) -> Result<u64, VmError> {
    let base = stack.pop_i32()? as u32;
    Ok(base as u64 + memarg.offset as u64)
}

// ============================================================================
// Loads
// ============================================================================

/// i32.load
pub fn i32_load(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 4)?;
    stack.push(Value::I32(raw as u32 as i32));
    Ok(())
}

/// i64.load
pub fn i64_load(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 8)?;
    stack.push(Value::I64(raw as i64));
    Ok(())
}

/// f32.load: bit pattern taken verbatim from memory.
pub fn f32_load(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 4)?;
    stack.push(Value::F32(f32::from_bits(raw as u32)));
    Ok(())
}

/// f64.load: bit pattern taken verbatim from memory.
pub fn f64_load(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 8)?;
    stack.push(Value::F64(f64::from_bits(raw)));
    Ok(())
}

/// i32.load8_s: sign-extend the byte.
pub fn i32_load8_s(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 1)?;
    stack.push(Value::I32(raw as u8 as i8 as i32));
    Ok(())
}

/// i32.load8_u: zero-extend the byte.
pub fn i32_load8_u(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 1)?;
    stack.push(Value::I32(raw as u8 as i32));
    Ok(())
}

/// i32.load16_s: sign-extend the halfword.
pub fn i32_load16_s(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 2)?;
    stack.push(Value::I32(raw as u16 as i16 as i32));
    Ok(())
}

/// i32.load16_u: zero-extend the halfword.
pub fn i32_load16_u(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 2)?;
    stack.push(Value::I32(raw as u16 as i32));
    Ok(())
}

/// i64.load8_s
pub fn i64_load8_s(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 1)?;
    stack.push(Value::I64(raw as u8 as i8 as i64));
    Ok(())
}

/// i64.load8_u
pub fn i64_load8_u(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 1)?;
    stack.push(Value::I64(raw as u8 as i64));
    Ok(())
}

/// i64.load16_s
pub fn i64_load16_s(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 2)?;
    stack.push(Value::I64(raw as u16 as i16 as i64));
    Ok(())
}

/// i64.load16_u
pub fn i64_load16_u(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 2)?;
    stack.push(Value::I64(raw as u16 as i64));
    Ok(())
}

/// i64.load32_s
pub fn i64_load32_s(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 4)?;
    stack.push(Value::I64(raw as u32 as i32 as i64));
    Ok(())
}

/// i64.load32_u
pub fn i64_load32_u(stack: &mut Stack, memory: &MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let ea = effective_address(stack, memarg)?;
    let raw = memory.load_uint(ea, 4)?;
    stack.push(Value::I64(raw as u32 as i64));
    Ok(())
}

// ============================================================================
// Stores
// ============================================================================

/// i32.store
pub fn i32_store(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let value = stack.pop_i32()?;
    let ea = effective_address(stack, memarg)?;
    memory.store_uint(ea, value as u32 as u64, 4)
}

/// i64.store
pub fn i64_store(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let value = stack.pop_i64()?;
    let ea = effective_address(stack, memarg)?;
    memory.store_uint(ea, value as u64, 8)
}

/// f32.store: bit pattern written verbatim.
pub fn f32_store(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    let ea = effective_address(stack, memarg)?;
    memory.store_uint(ea, value.to_bits() as u64, 4)
}

/// f64.store: bit pattern written verbatim.
pub fn f64_store(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    let ea = effective_address(stack, memarg)?;
    memory.store_uint(ea, value.to_bits(), 8)
}

/// i32.store8: write the low byte.
pub fn i32_store8(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let value = stack.pop_i32()?;
    let ea = effective_address(stack, memarg)?;
    memory.store_uint(ea, value as u32 as u64, 1)
}

/// i32.store16: write the low halfword.
pub fn i32_store16(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let value = stack.pop_i32()?;
    let ea = effective_address(stack, memarg)?;
    memory.store_uint(ea, value as u32 as u64, 2)
}

/// i64.store8
pub fn i64_store8(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let value = stack.pop_i64()?;
    let ea = effective_address(stack, memarg)?;
    memory.store_uint(ea, value as u64, 1)
}

/// i64.store16
pub fn i64_store16(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let value = stack.pop_i64()?;
    let ea = effective_address(stack, memarg)?;
    memory.store_uint(ea, value as u64, 2)
}

/// i64.store32
pub fn i64_store32(stack: &mut Stack, memory: &mut MemoryInstance, memarg: &MemArg) -> Result<(), VmError> {
    let value = stack.pop_i64()?;
    let ea = effective_address(stack, memarg)?;
    memory.store_uint(ea, value as u64, 4)
}

// ============================================================================
// Size operations
// ============================================================================

/// memory.size: current page count as i32.
pub fn memory_size(stack: &mut Stack, memory: &MemoryInstance) -> Result<(), VmError> {
    stack.push(Value::I32(memory.page_count() as i32));
    Ok(())
}

/// memory.grow: push the previous page count, or -1 if growth is refused.
///
/// A refused growth leaves the memory unchanged; it is not a trap.
pub fn memory_grow(stack: &mut Stack, memory: &mut MemoryInstance) -> Result<(), VmError> {
    let delta = stack.pop_i32()? as u32;
    let previous = memory.page_count();
    match memory.grow_page(delta) {
        Ok(()) => stack.push(Value::I32(previous as i32)),
        Err(VmError::MemorySizeExceeded) => stack.push(Value::I32(-1)),
        Err(e) => return Err(e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::instruction::{Instr, MemArg};
    use crate::runtime::test_utils::test::EngineTest;
    use crate::runtime::Value;

    fn at(offset: u32) -> MemArg {
        MemArg { align: 0, offset }
    }

    #[test]
    fn store_then_load() {
        EngineTest::new()
            .with_memory(1, None)
            .inst(Instr::I32Const { value: 100 })
            .inst(Instr::I32Const { value: 0x1234_5678 })
            .inst(Instr::I32Store { memarg: at(0) })
            .inst(Instr::I32Const { value: 100 })
            .inst(Instr::I32Load { memarg: at(0) })
            .expect_result(Value::I32(0x1234_5678));
    }

    #[test]
    fn static_offset_is_added() {
        EngineTest::new()
            .with_memory(1, None)
            .inst(Instr::I32Const { value: 8 })
            .inst(Instr::I64Const { value: -2 })
            .inst(Instr::I64Store { memarg: at(16) })
            .inst(Instr::I32Const { value: 24 })
            .inst(Instr::I64Load { memarg: at(0) })
            .expect_result(Value::I64(-2));
    }

    #[test]
    fn narrow_load_sign_extension() {
        EngineTest::new()
            .with_memory(1, None)
            .inst(Instr::I32Const { value: 0 })
            .inst(Instr::I32Const { value: 0xFF })
            .inst(Instr::I32Store8 { memarg: at(0) })
            .inst(Instr::I32Const { value: 0 })
            .inst(Instr::I32Load8S { memarg: at(0) })
            .expect_result(Value::I32(-1));

        EngineTest::new()
            .with_memory(1, None)
            .inst(Instr::I32Const { value: 0 })
            .inst(Instr::I32Const { value: 0xFF })
            .inst(Instr::I32Store8 { memarg: at(0) })
            .inst(Instr::I32Const { value: 0 })
            .inst(Instr::I32Load8U { memarg: at(0) })
            .expect_result(Value::I32(255));
    }

    #[test]
    fn i64_partial_loads() {
        EngineTest::new()
            .with_memory(1, None)
            .inst(Instr::I32Const { value: 0 })
            .inst(Instr::I64Const { value: -1 })
            .inst(Instr::I64Store32 { memarg: at(0) })
            .inst(Instr::I32Const { value: 0 })
            .inst(Instr::I64Load32U { memarg: at(0) })
            .expect_result(Value::I64(0xFFFF_FFFF));

        EngineTest::new()
            .with_memory(1, None)
            .inst(Instr::I32Const { value: 0 })
            .inst(Instr::I64Const { value: 0x8000 })
            .inst(Instr::I64Store16 { memarg: at(0) })
            .inst(Instr::I32Const { value: 0 })
            .inst(Instr::I64Load16S { memarg: at(0) })
            .expect_result(Value::I64(-32768));
    }

    #[test]
    fn float_round_trip_preserves_bits() {
        EngineTest::new()
            .with_memory(1, None)
            .inst(Instr::I32Const { value: 0 })
            .inst(Instr::F32Const { value: f32::from_bits(0x7fa0_0001) })
            .inst(Instr::F32Store { memarg: at(0) })
            .inst(Instr::I32Const { value: 0 })
            .inst(Instr::F32Load { memarg: at(0) })
            .expect_result_bits(Value::F32(f32::from_bits(0x7fa0_0001)));
    }

    #[test]
    fn out_of_bounds_access_traps() {
        EngineTest::new()
            .with_memory(1, None)
            .inst(Instr::I32Const { value: 65533 })
            .inst(Instr::I32Load { memarg: at(0) })
            .expect_error("out of bounds memory access");

        // base + offset crossing the end also traps
        EngineTest::new()
            .with_memory(1, None)
            .inst(Instr::I32Const { value: 0 })
            .inst(Instr::I32Load { memarg: at(65533) })
            .expect_error("out of bounds memory access");

        // a negative base is a huge unsigned address
        EngineTest::new()
            .with_memory(1, None)
            .inst(Instr::I32Const { value: -4 })
            .inst(Instr::I32Load { memarg: at(0) })
            .expect_error("out of bounds memory access");
    }

    #[test]
    fn memory_size_and_grow() {
        EngineTest::new()
            .with_memory(1, Some(3))
            .inst(Instr::MemorySize)
            .expect_result(Value::I32(1));

        EngineTest::new()
            .with_memory(1, Some(3))
            .inst(Instr::I32Const { value: 2 })
            .inst(Instr::MemoryGrow)
            .expect_result(Value::I32(1)); // previous page count

        // growth past the maximum reports -1 and does not trap
        EngineTest::new()
            .with_memory(1, Some(3))
            .inst(Instr::I32Const { value: 5 })
            .inst(Instr::MemoryGrow)
            .expect_result(Value::I32(-1));
    }
}
