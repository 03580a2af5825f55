//! WebAssembly runtime implementation
//!
//! This module provides the execution core: the unified operand/label/frame
//! stack, the instantiated store, the metered dispatch engine, and the
//! host-function boundary.

pub mod engine;
pub mod function;
pub mod global;
pub mod host;
pub mod instance;
pub mod measure;
pub mod memory;
pub mod ops;
pub mod stack;
pub mod store;
pub mod table;
pub mod test_utils;
pub mod value;

pub use engine::Engine;
pub use function::FunctionInstance;
pub use global::GlobalInstance;
pub use host::{HostCallable, HostStatus, ImportObject};
pub use instance::ModuleInstance;
pub use measure::{CostProfile, CostTable, Measure};
pub use memory::MemoryInstance;
pub use stack::Stack;
pub use store::{FuncAddr, GlobalAddr, MemAddr, ModuleAddr, Store, TableAddr};
pub use table::TableInstance;
pub use value::Value;

/// Errors observable from the runtime.
///
/// Every operation that may trap names its error kind here. `Terminated` is
/// not a failure at the invocation boundary: the engine converts it to a
/// successful empty result. `Revert` is kept distinct from `ExecutionFailed`
/// so embedders can surface return data that a host wrote before reverting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    #[error("wrong VM workflow: {op} requires stage {requires}, current stage is {current}")]
    WrongVmWorkflow {
        op: &'static str,
        requires: &'static str,
        current: &'static str,
    },
    #[error("instantiation failed: {0}")]
    InstantiateFailed(String),
    #[error("wrong instance address: {0}")]
    WrongInstanceAddress(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeNotMatch { expected: String, actual: String },
    #[error("wrong entry type on stack: expected {expected}")]
    StackWrongEntry { expected: &'static str },
    #[error("pop or peek on empty stack")]
    StackEmpty,
    #[error("integer divide by zero")]
    DivideByZero,
    #[error("invalid floating point operand: {0}")]
    FloatingPointException(String),
    #[error("integer overflow on conversion: {0}")]
    CastingError(String),
    #[error("unreachable instruction executed")]
    Unreachable,
    #[error("out of bounds memory access: offset {offset} + length {length} > size {size}")]
    AccessForbidMemory { offset: u64, length: u64, size: u64 },
    #[error("memory page limit exceeded")]
    MemorySizeExceeded,
    #[error("table size limit exceeded")]
    TableSizeExceeded,
    #[error("invalid function access: {0}")]
    FunctionInvalid(String),
    #[error("arguments do not match function type: {0}")]
    CallFunctionError(String),
    #[error("reverted by host")]
    Revert,
    #[error("cost limit exceeded")]
    CostLimitExceeded,
    #[error("terminated by host")]
    Terminated,
    #[error("unimplemented instruction: {0}")]
    Unimplemented(String),
}
