//! WebAssembly function instance
//!
//! Functions in the store are either native (a decoded body owned by a
//! module instance) or host callables registered through the import
//! boundary. Cross-references between a function and its owning module are
//! store addresses, never ownership edges.

use super::host::HostCallable;
use super::store::ModuleAddr;
use crate::instruction::InstrSeq;
use crate::module::{FunctionType, ValueType};
use std::fmt;

/// A function instance in the store.
pub enum FunctionInstance {
    /// A module-defined function: owning module, signature, locals, body.
    Native {
        module: ModuleAddr,
        func_type: FunctionType,
        /// Declared locals as (count, type) runs, after the parameters.
        locals: Vec<(u32, ValueType)>,
        body: InstrSeq,
    },
    /// A host-registered callable with a declared signature and gas cost.
    Host { callable: Box<dyn HostCallable> },
}

impl FunctionInstance {
    /// The declared signature
    pub fn func_type(&self) -> &FunctionType {
        match self {
            FunctionInstance::Native { func_type, .. } => func_type,
            FunctionInstance::Host { callable } => callable.func_type(),
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, FunctionInstance::Host { .. })
    }
}

impl fmt::Debug for FunctionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionInstance::Native {
                module, func_type, locals, body,
            } => f
                .debug_struct("Native")
                .field("module", module)
                .field("func_type", func_type)
                .field("locals", locals)
                .field("body_len", &body.len())
                .finish(),
            FunctionInstance::Host { callable } => f
                .debug_struct("Host")
                .field("func_type", callable.func_type())
                .field("cost", &callable.cost())
                .finish(),
        }
    }
}
