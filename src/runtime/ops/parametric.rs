//! Parametric operations for WebAssembly
//!
//! `drop` and `select`, per the WebAssembly specification section 4.4.4.

use super::{Stack, VmError};

/// drop: discard the top value.
pub fn drop(stack: &mut Stack) -> Result<(), VmError> {
    stack.pop()?;
    Ok(())
}

/// select: pop an i32 condition and two values; keep the first if the
/// condition is non-zero, the second otherwise.
pub fn select(stack: &mut Stack) -> Result<(), VmError> {
    let cond = stack.pop_i32()?;
    let val2 = stack.pop()?;
    let val1 = stack.pop()?;
    if val1.typ() != val2.typ() {
        return Err(VmError::TypeNotMatch {
            expected: val1.typ().to_string(),
            actual: val2.typ().to_string(),
        });
    }
    stack.push(if cond != 0 { val1 } else { val2 });
    Ok(())
}
