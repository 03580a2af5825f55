//! Variable operations for WebAssembly
//!
//! Local and global accesses per the WebAssembly specification section
//! 4.4.5. Locals live in the current frame's locals region (parameters
//! followed by declared locals); globals are store instances resolved
//! through the current module by the engine.

use super::{Stack, VmError};
use crate::runtime::global::GlobalInstance;

/// local.get: push the value of local `idx`.
pub fn local_get(stack: &mut Stack, idx: u32) -> Result<(), VmError> {
    let value = stack.local(idx)?.clone();
    stack.push(value);
    Ok(())
}

/// local.set: pop a value into local `idx`.
pub fn local_set(stack: &mut Stack, idx: u32) -> Result<(), VmError> {
    let value = stack.pop()?;
    stack.set_local(idx, value)
}

/// local.tee: like `local.set`, but the value stays on the stack.
pub fn local_tee(stack: &mut Stack, idx: u32) -> Result<(), VmError> {
    let value = stack.top()?.clone();
    stack.set_local(idx, value)
}

/// global.get: push the global's current value.
pub fn global_get(stack: &mut Stack, global: &GlobalInstance) -> Result<(), VmError> {
    stack.push(global.get().clone());
    Ok(())
}

/// global.set: pop a value into the global; immutable globals trap.
pub fn global_set(stack: &mut Stack, global: &mut GlobalInstance) -> Result<(), VmError> {
    let value = stack.pop()?;
    global.set(value)
}
