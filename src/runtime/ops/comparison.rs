//! Comparison and test operations for WebAssembly
//!
//! Test operations (t.testop) and relational operations (t.relop) per the
//! WebAssembly specification section 4.4.1. All of them produce an i32
//! which is 1 when the condition holds and 0 otherwise.

use super::{Stack, Value, VmError};

#[inline]
fn flag(condition: bool) -> Value {
    Value::I32(condition as i32)
}

// ============================================================================
// Test operations
// ============================================================================

/// i32.eqz: 1 if the operand is zero.
pub fn i32_eqz(stack: &mut Stack) -> Result<(), VmError> {
    let c1 = stack.pop_i32()?;
    stack.push(flag(c1 == 0));
    Ok(())
}

/// i64.eqz: 1 if the operand is zero.
pub fn i64_eqz(stack: &mut Stack) -> Result<(), VmError> {
    let c1 = stack.pop_i64()?;
    stack.push(flag(c1 == 0));
    Ok(())
}

// ============================================================================
// i32 comparisons
// ============================================================================

/// i32.eq
pub fn i32_eq(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(flag(c1 == c2));
    Ok(())
}

/// i32.ne
pub fn i32_ne(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(flag(c1 != c2));
    Ok(())
}

/// i32.lt_s
pub fn i32_lt_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(flag(c1 < c2));
    Ok(())
}

/// i32.lt_u
pub fn i32_lt_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(flag((c1 as u32) < (c2 as u32)));
    Ok(())
}

/// i32.gt_s
pub fn i32_gt_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(flag(c1 > c2));
    Ok(())
}

/// i32.gt_u
pub fn i32_gt_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(flag((c1 as u32) > (c2 as u32)));
    Ok(())
}

/// i32.le_s
pub fn i32_le_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(flag(c1 <= c2));
    Ok(())
}

/// i32.le_u
pub fn i32_le_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(flag((c1 as u32) <= (c2 as u32)));
    Ok(())
}

/// i32.ge_s
pub fn i32_ge_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(flag(c1 >= c2));
    Ok(())
}

/// i32.ge_u
pub fn i32_ge_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push(flag((c1 as u32) >= (c2 as u32)));
    Ok(())
}

// ============================================================================
// i64 comparisons
// ============================================================================

/// i64.eq
pub fn i64_eq(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(flag(c1 == c2));
    Ok(())
}

/// i64.ne
pub fn i64_ne(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(flag(c1 != c2));
    Ok(())
}

/// i64.lt_s
pub fn i64_lt_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(flag(c1 < c2));
    Ok(())
}

/// i64.lt_u
pub fn i64_lt_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(flag((c1 as u64) < (c2 as u64)));
    Ok(())
}

/// i64.gt_s
pub fn i64_gt_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(flag(c1 > c2));
    Ok(())
}

/// i64.gt_u
pub fn i64_gt_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(flag((c1 as u64) > (c2 as u64)));
    Ok(())
}

/// i64.le_s
pub fn i64_le_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(flag(c1 <= c2));
    Ok(())
}

/// i64.le_u
pub fn i64_le_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(flag((c1 as u64) <= (c2 as u64)));
    Ok(())
}

/// i64.ge_s
pub fn i64_ge_s(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(flag(c1 >= c2));
    Ok(())
}

/// i64.ge_u
pub fn i64_ge_u(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push(flag((c1 as u64) >= (c2 as u64)));
    Ok(())
}

// ============================================================================
// Float comparisons
// ============================================================================
//
// IEEE 754 semantics: every comparison with a NaN operand is false, except
// `ne` which is true. Rust's operators on f32/f64 already implement this.

/// f32.eq
pub fn f32_eq(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push(flag(c1 == c2));
    Ok(())
}

/// f32.ne
pub fn f32_ne(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push(flag(c1 != c2));
    Ok(())
}

/// f32.lt
pub fn f32_lt(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push(flag(c1 < c2));
    Ok(())
}

/// f32.gt
pub fn f32_gt(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push(flag(c1 > c2));
    Ok(())
}

/// f32.le
pub fn f32_le(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push(flag(c1 <= c2));
    Ok(())
}

/// f32.ge
pub fn f32_ge(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push(flag(c1 >= c2));
    Ok(())
}

/// f64.eq
pub fn f64_eq(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push(flag(c1 == c2));
    Ok(())
}

/// f64.ne
pub fn f64_ne(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push(flag(c1 != c2));
    Ok(())
}

/// f64.lt
pub fn f64_lt(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push(flag(c1 < c2));
    Ok(())
}

/// f64.gt
pub fn f64_gt(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push(flag(c1 > c2));
    Ok(())
}

/// f64.le
pub fn f64_le(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push(flag(c1 <= c2));
    Ok(())
}

/// f64.ge
pub fn f64_ge(stack: &mut Stack) -> Result<(), VmError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push(flag(c1 >= c2));
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::instruction::Instr;
    use crate::runtime::test_utils::test::EngineTest;
    use crate::runtime::Value;

    #[test]
    fn i32_eqz() {
        EngineTest::new()
            .inst(Instr::I32Const { value: 0 })
            .inst(Instr::I32Eqz)
            .expect_result(Value::I32(1));

        EngineTest::new()
            .inst(Instr::I32Const { value: -1 })
            .inst(Instr::I32Eqz)
            .expect_result(Value::I32(0));
    }

    #[test]
    fn i32_signed_vs_unsigned() {
        // -1 < 1 signed, but 0xFFFFFFFF > 1 unsigned
        EngineTest::new()
            .inst(Instr::I32Const { value: -1 })
            .inst(Instr::I32Const { value: 1 })
            .inst(Instr::I32LtS)
            .expect_result(Value::I32(1));

        EngineTest::new()
            .inst(Instr::I32Const { value: -1 })
            .inst(Instr::I32Const { value: 1 })
            .inst(Instr::I32LtU)
            .expect_result(Value::I32(0));
    }

    #[test]
    fn i64_comparisons() {
        EngineTest::new()
            .inst(Instr::I64Const { value: i64::MIN })
            .inst(Instr::I64Const { value: i64::MAX })
            .inst(Instr::I64LtS)
            .expect_result(Value::I32(1));

        EngineTest::new()
            .inst(Instr::I64Const { value: i64::MIN })
            .inst(Instr::I64Const { value: i64::MAX })
            .inst(Instr::I64GtU)
            .expect_result(Value::I32(1));

        EngineTest::new()
            .inst(Instr::I64Const { value: 7 })
            .inst(Instr::I64Const { value: 7 })
            .inst(Instr::I64GeS)
            .expect_result(Value::I32(1));
    }

    #[test]
    fn float_nan_comparisons() {
        // NaN == NaN is false
        EngineTest::new()
            .inst(Instr::F64Const { value: f64::NAN })
            .inst(Instr::F64Const { value: f64::NAN })
            .inst(Instr::F64Eq)
            .expect_result(Value::I32(0));

        // NaN != anything is true
        EngineTest::new()
            .inst(Instr::F64Const { value: f64::NAN })
            .inst(Instr::F64Const { value: 1.0 })
            .inst(Instr::F64Ne)
            .expect_result(Value::I32(1));

        // All ordered comparisons with NaN are false
        EngineTest::new()
            .inst(Instr::F32Const { value: f32::NAN })
            .inst(Instr::F32Const { value: 1.0 })
            .inst(Instr::F32Lt)
            .expect_result(Value::I32(0));
    }

    #[test]
    fn float_zero_signs_compare_equal() {
        EngineTest::new()
            .inst(Instr::F32Const { value: 0.0 })
            .inst(Instr::F32Const { value: -0.0 })
            .inst(Instr::F32Eq)
            .expect_result(Value::I32(1));
    }

    #[test]
    fn float_ordering() {
        EngineTest::new()
            .inst(Instr::F64Const { value: 1.5 })
            .inst(Instr::F64Const { value: 2.5 })
            .inst(Instr::F64Le)
            .expect_result(Value::I32(1));

        EngineTest::new()
            .inst(Instr::F64Const { value: f64::NEG_INFINITY })
            .inst(Instr::F64Const { value: f64::INFINITY })
            .inst(Instr::F64Gt)
            .expect_result(Value::I32(0));
    }
}
