//! Numeric operations for WebAssembly
//!
//! Constants, unary and binary arithmetic over i32/i64/f32/f64, following
//! the WebAssembly specification section 4.4.1:
//! - Constants (t.const)
//! - Unary operations (t.unop)
//! - Binary operations (t.binop)
//!
//! Float arithmetic results are canonicalised so NaN bit patterns are
//! deterministic; see [`crate::runtime::value::canonicalize_f32`].

use super::{Stack, Value, VmError};
use crate::runtime::value::{canonicalize_f32, canonicalize_f64};

// ============================================================================
// Constants
// ============================================================================

/// i32.const: push the immediate.
pub fn i32_const(stack: &mut Stack, value: i32) -> Result<(), VmError> {
    stack.push(Value::I32(value));
    Ok(())
}

/// i64.const: push the immediate.
pub fn i64_const(stack: &mut Stack, value: i64) -> Result<(), VmError> {
    stack.push(Value::I64(value));
    Ok(())
}

/// f32.const: push the immediate, bit pattern preserved.
pub fn f32_const(stack: &mut Stack, value: f32) -> Result<(), VmError> {
    stack.push(Value::F32(value));
    Ok(())
}

/// f64.const: push the immediate, bit pattern preserved.
pub fn f64_const(stack: &mut Stack, value: f64) -> Result<(), VmError> {
    stack.push(Value::F64(value));
    Ok(())
}

// ============================================================================
// i32 binary operations
// ============================================================================

/// i32.add: c1 + c2 modulo 2^32.
pub fn i32_add(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(Value::I32(c1.wrapping_add(c2)));
    Ok(())
}

/// i32.sub: c1 - c2 modulo 2^32.
pub fn i32_sub(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(Value::I32(c1.wrapping_sub(c2)));
    Ok(())
}

/// i32.mul: c1 * c2 modulo 2^32.
pub fn i32_mul(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(Value::I32(c1.wrapping_mul(c2)));
    Ok(())
}

/// i32.div_s: signed division truncating toward zero.
///
/// Traps on division by zero; `i32::MIN / -1` overflows and traps as an
/// execution failure.
pub fn i32_div_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    if c2 == 0 {
        return Err(VmError::DivideByZero);
    }
    if c1 == i32::MIN && c2 == -1 {
        return Err(VmError::ExecutionFailed("integer overflow in i32.div_s".to_string()));
    }
    stack.push(Value::I32(c1 / c2));
    Ok(())
}

/// i32.div_u: unsigned division.
pub fn i32_div_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    if c2 == 0 {
        return Err(VmError::DivideByZero);
    }
    stack.push(Value::I32(((c1 as u32) / (c2 as u32)) as i32));
    Ok(())
}

/// i32.rem_s: signed remainder.
///
/// `i32::MIN % -1` is 0, not an overflow.
pub fn i32_rem_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    if c2 == 0 {
        return Err(VmError::DivideByZero);
    }
    stack.push(Value::I32(c1.wrapping_rem(c2)));
    Ok(())
}

/// i32.rem_u: unsigned remainder.
pub fn i32_rem_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    if c2 == 0 {
        return Err(VmError::DivideByZero);
    }
    stack.push(Value::I32(((c1 as u32) % (c2 as u32)) as i32));
    Ok(())
}

// ============================================================================
// i32 unary operations
// ============================================================================

/// i32.clz: count leading zero bits.
pub fn i32_clz(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i32()?;
    stack.push(Value::I32(value.leading_zeros() as i32));
    Ok(())
}

/// i32.ctz: count trailing zero bits.
pub fn i32_ctz(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i32()?;
    stack.push(Value::I32(value.trailing_zeros() as i32));
    Ok(())
}

/// i32.popcnt: count set bits.
pub fn i32_popcnt(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i32()?;
    stack.push(Value::I32(value.count_ones() as i32));
    Ok(())
}

// ============================================================================
// i64 binary operations
// ============================================================================

/// i64.add: c1 + c2 modulo 2^64.
pub fn i64_add(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(Value::I64(c1.wrapping_add(c2)));
    Ok(())
}

/// i64.sub: c1 - c2 modulo 2^64.
pub fn i64_sub(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(Value::I64(c1.wrapping_sub(c2)));
    Ok(())
}

/// i64.mul: c1 * c2 modulo 2^64.
pub fn i64_mul(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(Value::I64(c1.wrapping_mul(c2)));
    Ok(())
}

/// i64.div_s: signed division truncating toward zero.
pub fn i64_div_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    if c2 == 0 {
        return Err(VmError::DivideByZero);
    }
    if c1 == i64::MIN && c2 == -1 {
        return Err(VmError::ExecutionFailed("integer overflow in i64.div_s".to_string()));
    }
    stack.push(Value::I64(c1 / c2));
    Ok(())
}

/// i64.div_u: unsigned division.
pub fn i64_div_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    if c2 == 0 {
        return Err(VmError::DivideByZero);
    }
    stack.push(Value::I64(((c1 as u64) / (c2 as u64)) as i64));
    Ok(())
}

/// i64.rem_s: signed remainder; `i64::MIN % -1` is 0.
pub fn i64_rem_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    if c2 == 0 {
        return Err(VmError::DivideByZero);
    }
    stack.push(Value::I64(c1.wrapping_rem(c2)));
    Ok(())
}

/// i64.rem_u: unsigned remainder.
pub fn i64_rem_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    if c2 == 0 {
        return Err(VmError::DivideByZero);
    }
    stack.push(Value::I64(((c1 as u64) % (c2 as u64)) as i64));
    Ok(())
}

// ============================================================================
// i64 unary operations
// ============================================================================

/// i64.clz: count leading zero bits.
pub fn i64_clz(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i64()?;
    stack.push(Value::I64(value.leading_zeros() as i64));
    Ok(())
}

/// i64.ctz: count trailing zero bits.
pub fn i64_ctz(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i64()?;
    stack.push(Value::I64(value.trailing_zeros() as i64));
    Ok(())
}

/// i64.popcnt: count set bits.
pub fn i64_popcnt(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i64()?;
    stack.push(Value::I64(value.count_ones() as i64));
    Ok(())
}

// ============================================================================
// f32 unary operations
// ============================================================================

/// f32.abs: clear the sign bit; NaN payload is preserved.
pub fn f32_abs(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    stack.push(Value::F32(value.abs()));
    Ok(())
}

/// f32.neg: flip the sign bit; NaN payload is preserved.
pub fn f32_neg(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    stack.push(Value::F32(-value));
    Ok(())
}

/// f32.sqrt per IEEE 754; NaN for negative inputs.
pub fn f32_sqrt(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    stack.push(Value::F32(canonicalize_f32(value.sqrt())));
    Ok(())
}

/// f32.ceil: smallest integer >= value.
pub fn f32_ceil(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    stack.push(Value::F32(canonicalize_f32(value.ceil())));
    Ok(())
}

/// f32.floor: largest integer <= value.
pub fn f32_floor(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    stack.push(Value::F32(canonicalize_f32(value.floor())));
    Ok(())
}

/// f32.trunc: round toward zero.
pub fn f32_trunc(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    stack.push(Value::F32(canonicalize_f32(value.trunc())));
    Ok(())
}

/// f32.nearest: round to nearest, ties to even.
pub fn f32_nearest(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    stack.push(Value::F32(canonicalize_f32(value.round_ties_even())));
    Ok(())
}

// ============================================================================
// f64 unary operations
// ============================================================================

/// f64.abs: clear the sign bit; NaN payload is preserved.
pub fn f64_abs(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    stack.push(Value::F64(value.abs()));
    Ok(())
}

/// f64.neg: flip the sign bit; NaN payload is preserved.
pub fn f64_neg(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    stack.push(Value::F64(-value));
    Ok(())
}

/// f64.sqrt per IEEE 754; NaN for negative inputs.
pub fn f64_sqrt(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    stack.push(Value::F64(canonicalize_f64(value.sqrt())));
    Ok(())
}

/// f64.ceil: smallest integer >= value.
pub fn f64_ceil(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    stack.push(Value::F64(canonicalize_f64(value.ceil())));
    Ok(())
}

/// f64.floor: largest integer <= value.
pub fn f64_floor(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    stack.push(Value::F64(canonicalize_f64(value.floor())));
    Ok(())
}

/// f64.trunc: round toward zero.
pub fn f64_trunc(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    stack.push(Value::F64(canonicalize_f64(value.trunc())));
    Ok(())
}

/// f64.nearest: round to nearest, ties to even.
pub fn f64_nearest(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    stack.push(Value::F64(canonicalize_f64(value.round_ties_even())));
    Ok(())
}

// ============================================================================
// f32 binary operations
// ============================================================================

/// f32.add per IEEE 754.
pub fn f32_add(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push(Value::F32(canonicalize_f32(c1 + c2)));
    Ok(())
}

/// f32.sub per IEEE 754.
pub fn f32_sub(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push(Value::F32(canonicalize_f32(c1 - c2)));
    Ok(())
}

/// f32.mul per IEEE 754.
pub fn f32_mul(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push(Value::F32(canonicalize_f32(c1 * c2)));
    Ok(())
}

/// f32.div per IEEE 754; division by zero gives ±∞.
pub fn f32_div(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push(Value::F32(canonicalize_f32(c1 / c2)));
    Ok(())
}

/// f32.min: NaN if either operand is NaN; -0.0 is less than +0.0.
pub fn f32_min(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    let result = if c1.is_nan() || c2.is_nan() {
        f32::NAN
    } else if c1 == 0.0 && c2 == 0.0 && c1.is_sign_negative() != c2.is_sign_negative() {
        -0.0
    } else {
        c1.min(c2)
    };
    stack.push(Value::F32(canonicalize_f32(result)));
    Ok(())
}

/// f32.max: NaN if either operand is NaN; +0.0 is greater than -0.0.
pub fn f32_max(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    let result = if c1.is_nan() || c2.is_nan() {
        f32::NAN
    } else if c1 == 0.0 && c2 == 0.0 && c1.is_sign_negative() != c2.is_sign_negative() {
        0.0
    } else {
        c1.max(c2)
    };
    stack.push(Value::F32(canonicalize_f32(result)));
    Ok(())
}

/// f32.copysign: magnitude of c1, sign of c2.
pub fn f32_copysign(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push(Value::F32(c1.copysign(c2)));
    Ok(())
}

// ============================================================================
// f64 binary operations
// ============================================================================

/// f64.add per IEEE 754.
pub fn f64_add(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push(Value::F64(canonicalize_f64(c1 + c2)));
    Ok(())
}

/// f64.sub per IEEE 754.
pub fn f64_sub(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push(Value::F64(canonicalize_f64(c1 - c2)));
    Ok(())
}

/// f64.mul per IEEE 754.
pub fn f64_mul(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push(Value::F64(canonicalize_f64(c1 * c2)));
    Ok(())
}

/// f64.div per IEEE 754; division by zero gives ±∞.
pub fn f64_div(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push(Value::F64(canonicalize_f64(c1 / c2)));
    Ok(())
}

/// f64.min: NaN if either operand is NaN; -0.0 is less than +0.0.
pub fn f64_min(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    let result = if c1.is_nan() || c2.is_nan() {
        f64::NAN
    } else if c1 == 0.0 && c2 == 0.0 && c1.is_sign_negative() != c2.is_sign_negative() {
        -0.0
    } else {
        c1.min(c2)
    };
    stack.push(Value::F64(canonicalize_f64(result)));
    Ok(())
}

/// f64.max: NaN if either operand is NaN; +0.0 is greater than -0.0.
pub fn f64_max(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    let result = if c1.is_nan() || c2.is_nan() {
        f64::NAN
    } else if c1 == 0.0 && c2 == 0.0 && c1.is_sign_negative() != c2.is_sign_negative() {
        0.0
    } else {
        c1.max(c2)
    };
    stack.push(Value::F64(canonicalize_f64(result)));
    Ok(())
}

/// f64.copysign: magnitude of c1, sign of c2.
pub fn f64_copysign(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push(Value::F64(c1.copysign(c2)));
    Ok(())
}
