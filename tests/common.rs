//! Shared helpers for integration tests: a small module-tree builder.

use gasm::instruction::InstrSeq;
use gasm::module::{
    DataSegment, ElementSegment, Export, ExternalKind, FunctionBody, FunctionType, GlobalEntry,
    GlobalType, Import, ImportDesc, Limits, MemoryType, Module, TableType,
};

/// Incrementally build a [`Module`] tree.
#[derive(Default)]
pub struct ModuleBuilder {
    module: Module,
}

#[allow(dead_code)] // not every test file uses every helper
impl ModuleBuilder {
    pub fn new() -> Self {
        ModuleBuilder::default()
    }

    pub fn add_type(&mut self, func_type: FunctionType) -> u32 {
        self.module.types.push(func_type);
        (self.module.types.len() - 1) as u32
    }

    /// Import a function; imports must be added before local functions
    pub fn import_function(&mut self, module: &str, name: &str, type_idx: u32) -> u32 {
        let index = self.module.import_count(ExternalKind::Function) as u32;
        self.module.imports.push(Import {
            module: module.to_string(),
            name: name.to_string(),
            desc: ImportDesc::Function(type_idx),
        });
        index
    }

    /// Import a global; imports must be added before local globals
    pub fn import_global(&mut self, module: &str, name: &str, global_type: GlobalType) -> u32 {
        let index = self.module.import_count(ExternalKind::Global) as u32;
        self.module.imports.push(Import {
            module: module.to_string(),
            name: name.to_string(),
            desc: ImportDesc::Global(global_type),
        });
        index
    }

    /// Add a local function, optionally exported; returns its index in the
    /// function index space (imports first)
    pub fn add_function(&mut self, type_idx: u32, body: FunctionBody, export: Option<&str>) -> u32 {
        let imported = self.module.import_count(ExternalKind::Function);
        let index = (imported + self.module.functions.len()) as u32;
        self.module.functions.push(type_idx);
        self.module.code.push(body);
        if let Some(name) = export {
            self.module.exports.push(Export {
                name: name.to_string(),
                kind: ExternalKind::Function,
                index,
            });
        }
        index
    }

    pub fn add_memory(&mut self, min: u32, max: Option<u32>) -> u32 {
        self.module.memories.push(MemoryType {
            limits: Limits { min, max },
        });
        (self.module.memories.len() - 1) as u32
    }

    pub fn add_table(&mut self, min: u32, max: Option<u32>) -> u32 {
        self.module.tables.push(TableType {
            limits: Limits { min, max },
        });
        (self.module.tables.len() - 1) as u32
    }

    pub fn add_global(&mut self, global_type: GlobalType, init: InstrSeq) -> u32 {
        self.module.globals.push(GlobalEntry { global_type, init });
        (self.module.globals.len() - 1) as u32
    }

    pub fn add_element(&mut self, table_idx: u32, offset: InstrSeq, func_indices: Vec<u32>) {
        self.module.elements.push(ElementSegment {
            table_idx,
            offset,
            func_indices,
        });
    }

    pub fn add_data(&mut self, memory_idx: u32, offset: InstrSeq, bytes: Vec<u8>) {
        self.module.data.push(DataSegment {
            memory_idx,
            offset,
            bytes,
        });
    }

    pub fn set_start(&mut self, func_idx: u32) {
        self.module.start = Some(func_idx);
    }

    pub fn export(&mut self, name: &str, kind: ExternalKind, index: u32) {
        self.module.exports.push(Export {
            name: name.to_string(),
            kind,
            index,
        });
    }

    pub fn build(&mut self) -> Module {
        std::mem::take(&mut self.module)
    }
}
