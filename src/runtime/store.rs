//! WebAssembly store - owns every runtime instance by stable address
//!
//! The store is a set of flat arenas, one per entity kind: functions,
//! memories, tables, globals, and module instances. Addresses are
//! allocation-order indices, globally unique, and remain valid until
//! [`Store::reset`]. Cross-references (a function's owning module, a table
//! slot's callee) are addresses, never ownership edges, so reference cycles
//! between modules and functions cost nothing.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                        Store                         │
//! │  functions: [0] Host{ethereum.useGas}  [1] Native{…} │
//! │  memories:  [0] 2 pages                              │
//! │  tables:    [0] 4 slots                              │
//! │  globals:   [0] i64 mut                              │
//! │  modules:   [0] "ethereum"  [1] (active)             │
//! └──────────────────────────────────────────────────────┘
//! ```

use super::function::FunctionInstance;
use super::global::GlobalInstance;
use super::host::HostCallable;
use super::instance::{ExternVal, ModuleInstance};
use super::memory::MemoryInstance;
use super::table::TableInstance;
use super::VmError;
use crate::module::FunctionType;
use std::collections::HashMap;

/// Address of a function instance in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncAddr(pub usize);

/// Address of a memory instance in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemAddr(pub usize);

/// Address of a table instance in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableAddr(pub usize);

/// Address of a global instance in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalAddr(pub usize);

/// Address of a module instance in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleAddr(pub usize);

/// The store: arenas for every instance kind plus the module name registry.
#[derive(Debug, Default)]
pub struct Store {
    functions: Vec<FunctionInstance>,
    memories: Vec<MemoryInstance>,
    tables: Vec<TableInstance>,
    globals: Vec<GlobalInstance>,
    modules: Vec<ModuleInstance>,
    /// Named modules, resolvable as import sources.
    module_names: HashMap<String, ModuleAddr>,
    /// The most recently instantiated anonymous module; invocation target.
    active_module: Option<ModuleAddr>,
}

impl Store {
    /// Create a new empty store
    pub fn new() -> Self {
        Store::default()
    }

    /// Allocate a function instance, returning its address
    pub fn alloc_function(&mut self, func: FunctionInstance) -> FuncAddr {
        let addr = FuncAddr(self.functions.len());
        self.functions.push(func);
        addr
    }

    /// Allocate a memory instance, returning its address
    pub fn alloc_memory(&mut self, memory: MemoryInstance) -> MemAddr {
        let addr = MemAddr(self.memories.len());
        self.memories.push(memory);
        addr
    }

    /// Allocate a table instance, returning its address
    pub fn alloc_table(&mut self, table: TableInstance) -> TableAddr {
        let addr = TableAddr(self.tables.len());
        self.tables.push(table);
        addr
    }

    /// Allocate a global instance, returning its address
    pub fn alloc_global(&mut self, global: GlobalInstance) -> GlobalAddr {
        let addr = GlobalAddr(self.globals.len());
        self.globals.push(global);
        addr
    }

    /// Allocate a module instance, returning its address
    pub fn alloc_module(&mut self, module: ModuleInstance) -> ModuleAddr {
        let addr = ModuleAddr(self.modules.len());
        self.modules.push(module);
        addr
    }

    /// Look up a function
    pub fn function(&self, addr: FuncAddr) -> Result<&FunctionInstance, VmError> {
        self.functions
            .get(addr.0)
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("function address {}", addr.0)))
    }

    /// Look up a memory
    pub fn memory(&self, addr: MemAddr) -> Result<&MemoryInstance, VmError> {
        self.memories
            .get(addr.0)
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("memory address {}", addr.0)))
    }

    /// Look up a memory, mutably
    pub fn memory_mut(&mut self, addr: MemAddr) -> Result<&mut MemoryInstance, VmError> {
        self.memories
            .get_mut(addr.0)
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("memory address {}", addr.0)))
    }

    /// Look up a table
    pub fn table(&self, addr: TableAddr) -> Result<&TableInstance, VmError> {
        self.tables
            .get(addr.0)
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("table address {}", addr.0)))
    }

    /// Look up a table, mutably
    pub fn table_mut(&mut self, addr: TableAddr) -> Result<&mut TableInstance, VmError> {
        self.tables
            .get_mut(addr.0)
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("table address {}", addr.0)))
    }

    /// Look up a global
    pub fn global(&self, addr: GlobalAddr) -> Result<&GlobalInstance, VmError> {
        self.globals
            .get(addr.0)
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("global address {}", addr.0)))
    }

    /// Look up a global, mutably
    pub fn global_mut(&mut self, addr: GlobalAddr) -> Result<&mut GlobalInstance, VmError> {
        self.globals
            .get_mut(addr.0)
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("global address {}", addr.0)))
    }

    /// Look up a module instance
    pub fn module_instance(&self, addr: ModuleAddr) -> Result<&ModuleInstance, VmError> {
        self.modules
            .get(addr.0)
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("module address {}", addr.0)))
    }

    /// Look up a module instance, mutably
    pub fn module_instance_mut(&mut self, addr: ModuleAddr) -> Result<&mut ModuleInstance, VmError> {
        self.modules
            .get_mut(addr.0)
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("module address {}", addr.0)))
    }

    /// Register a module under a name; re-registration overwrites
    pub fn register_module_name(&mut self, name: impl Into<String>, addr: ModuleAddr) {
        self.module_names.insert(name.into(), addr);
    }

    /// Find a named module
    pub fn find_module(&self, name: &str) -> Option<ModuleAddr> {
        self.module_names.get(name).copied()
    }

    /// Mark `addr` as the invocation target
    pub fn set_active_module(&mut self, addr: ModuleAddr) {
        self.active_module = Some(addr);
    }

    /// The invocation target, if a module has been instantiated
    pub fn active_module(&self) -> Option<ModuleAddr> {
        self.active_module
    }

    /// Split borrow for a host call: the callable plus the designated memory
    ///
    /// A host function may need mutable access to a memory while the store
    /// also hands out the callable; the two live in different arenas, which
    /// this method expresses to the borrow checker.
    pub fn host_call_parts(
        &mut self,
        func: FuncAddr,
        mem: Option<MemAddr>,
    ) -> Result<(&mut dyn HostCallable, Option<&mut MemoryInstance>), VmError> {
        let memory = match mem {
            Some(addr) => Some(
                self.memories
                    .get_mut(addr.0)
                    .ok_or_else(|| VmError::WrongInstanceAddress(format!("memory address {}", addr.0)))?,
            ),
            None => None,
        };
        match self.functions.get_mut(func.0) {
            Some(FunctionInstance::Host { callable }) => Ok((callable.as_mut(), memory)),
            Some(FunctionInstance::Native { .. }) => Err(VmError::FunctionInvalid(format!(
                "function address {} is not a host function",
                func.0
            ))),
            None => Err(VmError::WrongInstanceAddress(format!("function address {}", func.0))),
        }
    }

    /// Every named function export in the store: (name, type)
    pub fn func_exports(&self) -> Vec<(String, FunctionType)> {
        let mut result = Vec::new();
        for module in &self.modules {
            for (name, val) in module.exports() {
                if let ExternVal::Func(addr) = val {
                    if let Ok(func) = self.function(*addr) {
                        result.push((name.clone(), func.func_type().clone()));
                    }
                }
            }
        }
        result
    }

    /// Drop all instances; every previously issued address becomes invalid
    pub fn reset(&mut self) {
        self.functions.clear();
        self.memories.clear();
        self.tables.clear();
        self.globals.clear();
        self.modules.clear();
        self.module_names.clear();
        self.active_module = None;
    }
}
