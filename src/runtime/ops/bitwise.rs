//! Bitwise operations for WebAssembly
//!
//! Logical operations, shifts, and rotations per the WebAssembly
//! specification section 4.4.1. Shift and rotate counts are taken modulo
//! the bit width of the operand type.

use super::{Stack, Value, VmError};

// ============================================================================
// i32 logical operations
// ============================================================================

/// i32.and
pub fn i32_and(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(Value::I32(c1 & c2));
    Ok(())
}

/// i32.or
pub fn i32_or(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(Value::I32(c1 | c2));
    Ok(())
}

/// i32.xor
pub fn i32_xor(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(Value::I32(c1 ^ c2));
    Ok(())
}

// ============================================================================
// i32 shifts and rotations
// ============================================================================

/// i32.shl: shift left, count modulo 32.
pub fn i32_shl(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(Value::I32(c1.wrapping_shl(c2 as u32)));
    Ok(())
}

/// i32.shr_s: arithmetic shift right, count modulo 32.
pub fn i32_shr_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(Value::I32(c1.wrapping_shr(c2 as u32)));
    Ok(())
}

/// i32.shr_u: logical shift right, count modulo 32.
pub fn i32_shr_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(Value::I32(((c1 as u32).wrapping_shr(c2 as u32)) as i32));
    Ok(())
}

/// i32.rotl: rotate left, count modulo 32.
pub fn i32_rotl(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(Value::I32(c1.rotate_left((c2 as u32) % 32)));
    Ok(())
}

/// i32.rotr: rotate right, count modulo 32.
pub fn i32_rotr(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(Value::I32(c1.rotate_right((c2 as u32) % 32)));
    Ok(())
}

// ============================================================================
// i64 logical operations
// ============================================================================

/// i64.and
pub fn i64_and(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(Value::I64(c1 & c2));
    Ok(())
}

/// i64.or
pub fn i64_or(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(Value::I64(c1 | c2));
    Ok(())
}

/// i64.xor
pub fn i64_xor(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(Value::I64(c1 ^ c2));
    Ok(())
}

// ============================================================================
// i64 shifts and rotations
// ============================================================================

/// i64.shl: shift left, count modulo 64.
pub fn i64_shl(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(Value::I64(c1.wrapping_shl(c2 as u32)));
    Ok(())
}

/// i64.shr_s: arithmetic shift right, count modulo 64.
pub fn i64_shr_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(Value::I64(c1.wrapping_shr(c2 as u32)));
    Ok(())
}

/// i64.shr_u: logical shift right, count modulo 64.
pub fn i64_shr_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(Value::I64(((c1 as u64).wrapping_shr(c2 as u32)) as i64));
    Ok(())
}

/// i64.rotl: rotate left, count modulo 64.
pub fn i64_rotl(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(Value::I64(c1.rotate_left((c2 as u64 % 64) as u32)));
    Ok(())
}

/// i64.rotr: rotate right, count modulo 64.
pub fn i64_rotr(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(Value::I64(c1.rotate_right((c2 as u64 % 64) as u32)));
    Ok(())
}
