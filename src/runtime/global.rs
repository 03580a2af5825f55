//! WebAssembly global instance

use super::{Value, VmError};
use crate::module::{GlobalType, ValueType};

/// A global variable instance: value type, mutability, current value.
#[derive(Debug, Clone)]
pub struct GlobalInstance {
    value_type: ValueType,
    mutable: bool,
    value: Value,
}

impl GlobalInstance {
    /// Create a global holding `value`
    pub fn new(global_type: GlobalType, value: Value) -> Result<Self, VmError> {
        if value.typ() != global_type.value_type {
            return Err(VmError::TypeNotMatch {
                expected: global_type.value_type.to_string(),
                actual: value.typ().to_string(),
            });
        }
        Ok(GlobalInstance {
            value_type: global_type.value_type,
            mutable: global_type.mutable,
            value,
        })
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Current value
    pub fn get(&self) -> &Value {
        &self.value
    }

    /// Replace the value
    ///
    /// # Errors
    /// - `ExecutionFailed` if the global is immutable
    /// - `TypeNotMatch` if the value type differs from the declared type
    pub fn set(&mut self, value: Value) -> Result<(), VmError> {
        if !self.mutable {
            return Err(VmError::ExecutionFailed(
                "write to immutable global".to_string(),
            ));
        }
        if value.typ() != self.value_type {
            return Err(VmError::TypeNotMatch {
                expected: self.value_type.to_string(),
                actual: value.typ().to_string(),
            });
        }
        self.value = value;
        Ok(())
    }
}
