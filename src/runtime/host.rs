//! The host-function boundary
//!
//! A host function is a host-registered callable with a declared signature,
//! a gas cost, and a (module, field) name. It consumes its arguments from
//! the operand stack, may read and write a designated memory, and reports a
//! [`HostStatus`] that the engine maps onto its error taxonomy.
//!
//! Host libraries (WASI, the Ethereum EEI) are separate crates; this module
//! defines the capability they implement and the registration container the
//! VM accepts.

use super::global::GlobalInstance;
use super::measure::CostProfile;
use super::memory::MemoryInstance;
use super::stack::Stack;
use super::table::TableInstance;
use super::VmError;
use crate::module::FunctionType;

/// Outcome of running a host callable.
///
/// `Revert`, `Terminate`, and `CostLimitExceeded` are distinguished from
/// generic failure so the engine's outer loop can report them differently:
/// `Terminate` becomes a successful top-level completion, `Revert` a
/// distinguished non-success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Success,
    Fail,
    Revert,
    Terminate,
    CostLimitExceeded,
}

impl HostStatus {
    /// Map onto the engine's error taxonomy
    pub fn into_result(self) -> Result<(), VmError> {
        match self {
            HostStatus::Success => Ok(()),
            HostStatus::Fail => Err(VmError::ExecutionFailed("host function failed".to_string())),
            HostStatus::Revert => Err(VmError::Revert),
            HostStatus::Terminate => Err(VmError::Terminated),
            HostStatus::CostLimitExceeded => Err(VmError::CostLimitExceeded),
        }
    }
}

/// A host-callable function.
///
/// The engine charges [`cost`](HostCallable::cost) before calling
/// [`run`](HostCallable::run). `run` pops its declared parameters from the
/// stack and pushes its declared results; the engine does not re-check.
pub trait HostCallable {
    /// Declared signature
    fn func_type(&self) -> &FunctionType;

    /// Declared gas cost, charged on entry
    fn cost(&self) -> u64;

    /// Execute against the stack and the designated memory (memory 0 of the
    /// calling module, when it has one)
    fn run(&mut self, stack: &mut Stack, memory: Option<&mut MemoryInstance>) -> HostStatus;
}

/// A [`HostCallable`] built from a closure; the common case for embedders
/// and tests.
pub struct HostFunction<F> {
    func_type: FunctionType,
    cost: u64,
    body: F,
}

impl<F> HostFunction<F>
where
    F: FnMut(&mut Stack, Option<&mut MemoryInstance>) -> HostStatus,
{
    pub fn new(func_type: FunctionType, cost: u64, body: F) -> Self {
        HostFunction { func_type, cost, body }
    }
}

impl<F> HostCallable for HostFunction<F>
where
    F: FnMut(&mut Stack, Option<&mut MemoryInstance>) -> HostStatus,
{
    fn func_type(&self) -> &FunctionType {
        &self.func_type
    }

    fn cost(&self) -> u64 {
        self.cost
    }

    fn run(&mut self, stack: &mut Stack, memory: Option<&mut MemoryInstance>) -> HostStatus {
        (self.body)(stack, memory)
    }
}

/// A named host module ready for registration.
///
/// Registration turns this into a store-resident module instance whose
/// exports are the named entities below; wasm modules then import them by
/// `(module name, field name)`.
pub struct ImportObject {
    name: String,
    profile: CostProfile,
    pub(crate) functions: Vec<(String, Box<dyn HostCallable>)>,
    pub(crate) memories: Vec<(String, MemoryInstance)>,
    pub(crate) tables: Vec<(String, TableInstance)>,
    pub(crate) globals: Vec<(String, GlobalInstance)>,
}

impl ImportObject {
    /// A host module under `name`, with the cost profile its registration
    /// activates (`"wasi"` and `"ethereum"` are the recognised built-ins)
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let profile = match name.as_str() {
            "ethereum" => CostProfile::Evm,
            "wasi" | "wasi_unstable" | "wasi_snapshot_preview1" => CostProfile::Wasi,
            _ => CostProfile::Base,
        };
        ImportObject {
            name,
            profile,
            functions: Vec::new(),
            memories: Vec::new(),
            tables: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> CostProfile {
        self.profile
    }

    /// Add a host function export
    pub fn add_function(&mut self, field: impl Into<String>, callable: Box<dyn HostCallable>) {
        self.functions.push((field.into(), callable));
    }

    /// Add a memory export
    pub fn add_memory(&mut self, field: impl Into<String>, memory: MemoryInstance) {
        self.memories.push((field.into(), memory));
    }

    /// Add a table export
    pub fn add_table(&mut self, field: impl Into<String>, table: TableInstance) {
        self.tables.push((field.into(), table));
    }

    /// Add a global export
    pub fn add_global(&mut self, field: impl Into<String>, global: GlobalInstance) {
        self.globals.push((field.into(), global));
    }
}

/// Gas rules of the Ethereum EVM-compatibility host.
///
/// Published here so an EEI implementation does not hard-code them; the
/// engine itself only charges declared host costs.
pub mod gas {
    /// Stipend granted to the callee of a value-bearing non-CREATE call.
    /// It is added to the forwarded gas after the caller has been charged,
    /// so the stipend itself is free to the caller.
    pub const CALL_STIPEND: u64 = 2300;

    /// Charged for transferring value with a call.
    pub const VALUE_TRANSFER_GAS: u64 = 9000;

    /// Charged in addition when the transfer creates a new account.
    pub const NEW_ACCOUNT_GAS: u64 = 25000;

    /// Maximum message-call depth.
    pub const MAX_CALL_DEPTH: u32 = 1024;

    /// Gas for copy operations: 3 per started 32-byte word
    pub fn copy_cost(length: u64) -> u64 {
        3 * length.div_ceil(32)
    }
}
