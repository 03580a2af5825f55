//! Type conversion operations for WebAssembly
//!
//! Width conversions, float/integer conversions, and reinterpretations per
//! the WebAssembly specification section 4.4.1.6.
//!
//! Truncation from float to integer traps: NaN and infinities are a
//! floating-point exception, finite values whose truncation falls outside
//! the target range are a casting error. Reinterpretations are bit-exact
//! copies and never canonicalise.

use super::{Stack, Value, VmError};
use crate::runtime::value::{canonicalize_f32, canonicalize_f64};

/// Truncate toward zero and range-check against `[lo, hi)`.
///
/// Bounds are given in the f64 domain where every i32 bound and the powers
/// of two bounding i64/u64 are exact.
fn checked_trunc(x: f64, lo: f64, hi: f64, op: &'static str) -> Result<f64, VmError> {
    if x.is_nan() {
        return Err(VmError::FloatingPointException(format!("NaN in {op}")));
    }
    if x.is_infinite() {
        return Err(VmError::FloatingPointException(format!("infinity in {op}")));
    }
    let t = x.trunc();
    if t < lo || t >= hi {
        return Err(VmError::CastingError(format!("{x} out of range in {op}")));
    }
    Ok(t)
}

// ============================================================================
// Integer width conversions
// ============================================================================

/// i32.wrap_i64: keep the low 32 bits.
pub fn i32_wrap_i64(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i64()?;
    stack.push(Value::I32(value as i32));
    Ok(())
}

/// i64.extend_i32_s: sign-extend.
pub fn i64_extend_i32_s(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i32()?;
    stack.push(Value::I64(value as i64));
    Ok(())
}

/// i64.extend_i32_u: zero-extend.
pub fn i64_extend_i32_u(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i32()?;
    stack.push(Value::I64((value as u32) as i64));
    Ok(())
}

// ============================================================================
// Float to integer truncations
// ============================================================================

/// i32.trunc_f32_s
pub fn i32_trunc_f32_s(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    let t = checked_trunc(value as f64, -2147483648.0, 2147483648.0, "i32.trunc_f32_s")?;
    stack.push(Value::I32(t as i32));
    Ok(())
}

/// i32.trunc_f32_u
pub fn i32_trunc_f32_u(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    let t = checked_trunc(value as f64, -0.0, 4294967296.0, "i32.trunc_f32_u")?;
    stack.push(Value::I32(t as u32 as i32));
    Ok(())
}

/// i32.trunc_f64_s
pub fn i32_trunc_f64_s(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    let t = checked_trunc(value, -2147483648.0, 2147483648.0, "i32.trunc_f64_s")?;
    stack.push(Value::I32(t as i32));
    Ok(())
}

/// i32.trunc_f64_u
pub fn i32_trunc_f64_u(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    let t = checked_trunc(value, -0.0, 4294967296.0, "i32.trunc_f64_u")?;
    stack.push(Value::I32(t as u32 as i32));
    Ok(())
}

/// i64.trunc_f32_s
pub fn i64_trunc_f32_s(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    let t = checked_trunc(
        value as f64,
        -9223372036854775808.0,
        9223372036854775808.0,
        "i64.trunc_f32_s",
    )?;
    stack.push(Value::I64(t as i64));
    Ok(())
}

/// i64.trunc_f32_u
pub fn i64_trunc_f32_u(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    let t = checked_trunc(value as f64, -0.0, 18446744073709551616.0, "i64.trunc_f32_u")?;
    stack.push(Value::I64(t as u64 as i64));
    Ok(())
}

/// i64.trunc_f64_s
pub fn i64_trunc_f64_s(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    let t = checked_trunc(
        value,
        -9223372036854775808.0,
        9223372036854775808.0,
        "i64.trunc_f64_s",
    )?;
    stack.push(Value::I64(t as i64));
    Ok(())
}

/// i64.trunc_f64_u
pub fn i64_trunc_f64_u(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    let t = checked_trunc(value, -0.0, 18446744073709551616.0, "i64.trunc_f64_u")?;
    stack.push(Value::I64(t as u64 as i64));
    Ok(())
}

// ============================================================================
// Integer to float conversions
// ============================================================================

/// f32.convert_i32_s
pub fn f32_convert_i32_s(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i32()?;
    stack.push(Value::F32(value as f32));
    Ok(())
}

/// f32.convert_i32_u
pub fn f32_convert_i32_u(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i32()?;
    stack.push(Value::F32((value as u32) as f32));
    Ok(())
}

/// f32.convert_i64_s: rounds to nearest-even when inexact.
pub fn f32_convert_i64_s(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i64()?;
    stack.push(Value::F32(value as f32));
    Ok(())
}

/// f32.convert_i64_u: rounds to nearest-even when inexact.
pub fn f32_convert_i64_u(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i64()?;
    stack.push(Value::F32((value as u64) as f32));
    Ok(())
}

/// f64.convert_i32_s: always exact.
pub fn f64_convert_i32_s(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i32()?;
    stack.push(Value::F64(value as f64));
    Ok(())
}

/// f64.convert_i32_u: always exact.
pub fn f64_convert_i32_u(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i32()?;
    stack.push(Value::F64((value as u32) as f64));
    Ok(())
}

/// f64.convert_i64_s: rounds to nearest-even when inexact.
pub fn f64_convert_i64_s(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i64()?;
    stack.push(Value::F64(value as f64));
    Ok(())
}

/// f64.convert_i64_u: rounds to nearest-even when inexact.
pub fn f64_convert_i64_u(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i64()?;
    stack.push(Value::F64((value as u64) as f64));
    Ok(())
}

// ============================================================================
// Float width conversions
// ============================================================================

/// f32.demote_f64: round to the nearest f32.
pub fn f32_demote_f64(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    stack.push(Value::F32(canonicalize_f32(value as f32)));
    Ok(())
}

/// f64.promote_f32: exact for every finite f32.
pub fn f64_promote_f32(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    stack.push(Value::F64(canonicalize_f64(value as f64)));
    Ok(())
}

// ============================================================================
// Reinterpretations
// ============================================================================

/// i32.reinterpret_f32: bit-exact copy.
pub fn i32_reinterpret_f32(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f32()?;
    stack.push(Value::I32(value.to_bits() as i32));
    Ok(())
}

/// i64.reinterpret_f64: bit-exact copy.
pub fn i64_reinterpret_f64(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_f64()?;
    stack.push(Value::I64(value.to_bits() as i64));
    Ok(())
}

/// f32.reinterpret_i32: bit-exact copy.
pub fn f32_reinterpret_i32(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i32()?;
    stack.push(Value::F32(f32::from_bits(value as u32)));
    Ok(())
}

/// f64.reinterpret_i64: bit-exact copy.
pub fn f64_reinterpret_i64(stack: &mut Stack) -> Result<(), VmError> {
    let value = stack.pop_i64()?;
    stack.push(Value::F64(f64::from_bits(value as u64)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::instruction::Instr;
    use crate::runtime::test_utils::test::EngineTest;
    use crate::runtime::Value;

    #[test]
    fn wrap_and_extend() {
        EngineTest::new()
            .inst(Instr::I64Const { value: 0x1_2345_6789 })
            .inst(Instr::I32WrapI64)
            .expect_result(Value::I32(0x2345_6789));

        EngineTest::new()
            .inst(Instr::I32Const { value: -1 })
            .inst(Instr::I64ExtendI32S)
            .expect_result(Value::I64(-1));

        EngineTest::new()
            .inst(Instr::I32Const { value: -1 })
            .inst(Instr::I64ExtendI32U)
            .expect_result(Value::I64(0xFFFF_FFFF));
    }

    #[test]
    fn trunc_basic() {
        EngineTest::new()
            .inst(Instr::F32Const { value: -3.9 })
            .inst(Instr::I32TruncF32S)
            .expect_result(Value::I32(-3));

        EngineTest::new()
            .inst(Instr::F64Const { value: 4294967295.9 })
            .inst(Instr::I32TruncF64U)
            .expect_result(Value::I32(-1)); // u32::MAX as i32

        EngineTest::new()
            .inst(Instr::F64Const { value: -0.7 })
            .inst(Instr::I32TruncF64U)
            .expect_result(Value::I32(0));
    }

    #[test]
    fn trunc_nan_and_infinity_trap() {
        EngineTest::new()
            .inst(Instr::F32Const { value: f32::NAN })
            .inst(Instr::I32TruncF32S)
            .expect_error("NaN");

        EngineTest::new()
            .inst(Instr::F64Const { value: f64::INFINITY })
            .inst(Instr::I64TruncF64S)
            .expect_error("infinity");
    }

    #[test]
    fn trunc_out_of_range_traps() {
        EngineTest::new()
            .inst(Instr::F32Const { value: 2147483648.0 })
            .inst(Instr::I32TruncF32S)
            .expect_error("out of range");

        EngineTest::new()
            .inst(Instr::F64Const { value: -1.0 })
            .inst(Instr::I32TruncF64U)
            .expect_error("out of range");

        EngineTest::new()
            .inst(Instr::F64Const { value: 18446744073709551616.0 })
            .inst(Instr::I64TruncF64U)
            .expect_error("out of range");
    }

    #[test]
    fn trunc_boundary_values() {
        EngineTest::new()
            .inst(Instr::F64Const { value: 2147483647.0 })
            .inst(Instr::I32TruncF64S)
            .expect_result(Value::I32(i32::MAX));

        EngineTest::new()
            .inst(Instr::F64Const { value: -2147483648.0 })
            .inst(Instr::I32TruncF64S)
            .expect_result(Value::I32(i32::MIN));
    }

    #[test]
    fn int_to_float() {
        EngineTest::new()
            .inst(Instr::I32Const { value: -1 })
            .inst(Instr::F64ConvertI32U)
            .expect_result(Value::F64(4294967295.0));

        EngineTest::new()
            .inst(Instr::I64Const { value: -1 })
            .inst(Instr::F64ConvertI64U)
            .expect_result(Value::F64(18446744073709551616.0));

        EngineTest::new()
            .inst(Instr::I32Const { value: 16777217 })
            .inst(Instr::F32ConvertI32S)
            .expect_result(Value::F32(16777216.0)); // rounds to nearest even
    }

    #[test]
    fn demote_promote() {
        EngineTest::new()
            .inst(Instr::F64Const { value: 1.5 })
            .inst(Instr::F32DemoteF64)
            .expect_result(Value::F32(1.5));

        EngineTest::new()
            .inst(Instr::F32Const { value: 0.1 })
            .inst(Instr::F64PromoteF32)
            .expect_result(Value::F64(0.1f32 as f64));
    }

    #[test]
    fn reinterpret_is_bit_exact() {
        EngineTest::new()
            .inst(Instr::F32Const { value: 1.0 })
            .inst(Instr::I32ReinterpretF32)
            .expect_result(Value::I32(0x3F80_0000));

        EngineTest::new()
            .inst(Instr::I32Const { value: 0x3F80_0000 })
            .inst(Instr::F32ReinterpretI32)
            .expect_result_bits(Value::F32(1.0));

        // A NaN payload must survive the round trip untouched
        let payload = 0x7fa0_1234u32;
        EngineTest::new()
            .inst(Instr::I32Const { value: payload as i32 })
            .inst(Instr::F32ReinterpretI32)
            .inst(Instr::I32ReinterpretF32)
            .expect_result(Value::I32(payload as i32));
    }
}
