//! WebAssembly module instance
//!
//! A module instance is pure indirection: it maps each local index space
//! (types, functions, tables, memories, globals) to store-wide addresses and
//! binds export names. It owns no entities itself, so instances can
//! reference each other's functions without ownership cycles.

use super::store::{FuncAddr, GlobalAddr, MemAddr, TableAddr};
use super::VmError;
use crate::module::{ExternalKind, FunctionType};
use std::collections::HashMap;

/// An exported entity: its kind and store address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternVal {
    Func(FuncAddr),
    Table(TableAddr),
    Mem(MemAddr),
    Global(GlobalAddr),
}

impl ExternVal {
    pub fn kind(&self) -> ExternalKind {
        match self {
            ExternVal::Func(_) => ExternalKind::Function,
            ExternVal::Table(_) => ExternalKind::Table,
            ExternVal::Mem(_) => ExternalKind::Memory,
            ExternVal::Global(_) => ExternalKind::Global,
        }
    }
}

/// A module instance: index-space address maps plus named exports.
#[derive(Debug, Default)]
pub struct ModuleInstance {
    /// Optional registration name ("wasi", "ethereum", user modules).
    pub name: Option<String>,
    types: Vec<FunctionType>,
    func_addrs: Vec<FuncAddr>,
    table_addrs: Vec<TableAddr>,
    mem_addrs: Vec<MemAddr>,
    global_addrs: Vec<GlobalAddr>,
    exports: HashMap<String, ExternVal>,
    /// Start function, invoked once at instantiation.
    pub start: Option<FuncAddr>,
}

impl ModuleInstance {
    pub fn new(name: Option<String>) -> Self {
        ModuleInstance {
            name,
            ..Default::default()
        }
    }

    pub fn push_type(&mut self, func_type: FunctionType) {
        self.types.push(func_type);
    }

    pub fn push_func_addr(&mut self, addr: FuncAddr) {
        self.func_addrs.push(addr);
    }

    pub fn push_table_addr(&mut self, addr: TableAddr) {
        self.table_addrs.push(addr);
    }

    pub fn push_mem_addr(&mut self, addr: MemAddr) {
        self.mem_addrs.push(addr);
    }

    pub fn push_global_addr(&mut self, addr: GlobalAddr) {
        self.global_addrs.push(addr);
    }

    /// Resolve a type index
    pub fn func_type(&self, idx: u32) -> Result<&FunctionType, VmError> {
        self.types
            .get(idx as usize)
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("type index {idx} out of range")))
    }

    /// Resolve a function index to its store address
    pub fn func_addr(&self, idx: u32) -> Result<FuncAddr, VmError> {
        self.func_addrs
            .get(idx as usize)
            .copied()
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("function index {idx} out of range")))
    }

    /// Resolve a table index to its store address
    pub fn table_addr(&self, idx: u32) -> Result<TableAddr, VmError> {
        self.table_addrs
            .get(idx as usize)
            .copied()
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("table index {idx} out of range")))
    }

    /// Resolve a memory index to its store address
    pub fn mem_addr(&self, idx: u32) -> Result<MemAddr, VmError> {
        self.mem_addrs
            .get(idx as usize)
            .copied()
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("memory index {idx} out of range")))
    }

    /// Resolve a global index to its store address
    pub fn global_addr(&self, idx: u32) -> Result<GlobalAddr, VmError> {
        self.global_addrs
            .get(idx as usize)
            .copied()
            .ok_or_else(|| VmError::WrongInstanceAddress(format!("global index {idx} out of range")))
    }

    pub fn func_count(&self) -> usize {
        self.func_addrs.len()
    }

    /// Bind an export; re-binding the same name overwrites
    pub fn add_export(&mut self, name: impl Into<String>, value: ExternVal) {
        self.exports.insert(name.into(), value);
    }

    /// Look up an export by name
    pub fn export(&self, name: &str) -> Option<&ExternVal> {
        self.exports.get(name)
    }

    /// Iterate over all exports
    pub fn exports(&self) -> impl Iterator<Item = (&String, &ExternVal)> {
        self.exports.iter()
    }
}
