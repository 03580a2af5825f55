//! The decoded WebAssembly module tree.
//!
//! This is the input boundary of the interpreter: a loader collaborator
//! decodes `.wasm` bytes into a [`Module`] and hands it over for
//! instantiation. Only the sections the execution core consumes are
//! represented: types, imports, functions, tables, memories, globals,
//! exports, start, elements, code, and data.

use crate::instruction::InstrSeq;
use std::fmt;

/// WebAssembly value types.
///
/// Integer signedness is a property of the operation, not the type; `I32`
/// and `I64` are plain bit patterns interpreted per opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::I32 => write!(f, "i32"),
            ValueType::I64 => write!(f, "i64"),
            ValueType::F32 => write!(f, "f32"),
            ValueType::F64 => write!(f, "f64"),
        }
    }
}

/// A function signature: ordered parameter types and ordered result types.
///
/// WebAssembly 1.0 allows at most one result; the engine enforces this
/// during structural validation rather than in the type itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionType {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> (")?;
        for (i, r) in self.results.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{r}")?;
        }
        write!(f, ")")
    }
}

/// Size bounds for memories and tables, in pages or elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

/// A table declaration. Element kind is function reference only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableType {
    pub limits: Limits,
}

/// A linear memory declaration, bounds in 64KiB pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub limits: Limits,
}

/// A global declaration: value type plus mutability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    pub value_type: ValueType,
    pub mutable: bool,
}

/// What kind of entity an import or export refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalKind {
    Function,
    Table,
    Memory,
    Global,
}

impl fmt::Display for ExternalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalKind::Function => write!(f, "function"),
            ExternalKind::Table => write!(f, "table"),
            ExternalKind::Memory => write!(f, "memory"),
            ExternalKind::Global => write!(f, "global"),
        }
    }
}

/// The expected shape of an imported entity.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportDesc {
    /// Index into the type section.
    Function(u32),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

impl ImportDesc {
    pub fn kind(&self) -> ExternalKind {
        match self {
            ImportDesc::Function(_) => ExternalKind::Function,
            ImportDesc::Table(_) => ExternalKind::Table,
            ImportDesc::Memory(_) => ExternalKind::Memory,
            ImportDesc::Global(_) => ExternalKind::Global,
        }
    }
}

/// One import: `(module, name)` pair plus the expected entity shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub desc: ImportDesc,
}

/// One export: a name bound to an index into the local index space of `kind`.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub name: String,
    pub kind: ExternalKind,
    pub index: u32,
}

/// A module-defined global: its type and the initialiser expression.
///
/// The initialiser is a constant expression evaluated during instantiation;
/// its result becomes the global's initial value.
#[derive(Debug, Clone)]
pub struct GlobalEntry {
    pub global_type: GlobalType,
    pub init: InstrSeq,
}

/// An element segment: function indices copied into a table at instantiation.
#[derive(Debug, Clone)]
pub struct ElementSegment {
    pub table_idx: u32,
    /// Constant expression producing the i32 start offset.
    pub offset: InstrSeq,
    pub func_indices: Vec<u32>,
}

/// A data segment: bytes copied into a memory at instantiation.
#[derive(Debug, Clone)]
pub struct DataSegment {
    pub memory_idx: u32,
    /// Constant expression producing the i32 start offset.
    pub offset: InstrSeq,
    pub bytes: Vec<u8>,
}

/// The body of a module-defined function.
#[derive(Debug, Clone)]
pub struct FunctionBody {
    /// Local declarations as (count, type) runs, following the parameters.
    pub locals: Vec<(u32, ValueType)>,
    pub body: InstrSeq,
}

/// A decoded module, one field per section the execution core consumes.
///
/// `functions[i]` is the type index of the i-th module-defined function;
/// its body is `code[i]`. Imported functions precede module-defined
/// functions in the function index space, and likewise for the other kinds.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub types: Vec<FunctionType>,
    pub imports: Vec<Import>,
    pub functions: Vec<u32>,
    pub tables: Vec<TableType>,
    pub memories: Vec<MemoryType>,
    pub globals: Vec<GlobalEntry>,
    pub exports: Vec<Export>,
    pub start: Option<u32>,
    pub elements: Vec<ElementSegment>,
    pub code: Vec<FunctionBody>,
    pub data: Vec<DataSegment>,
}

impl Module {
    /// Count the imports of a given kind.
    pub fn import_count(&self, kind: ExternalKind) -> usize {
        self.imports.iter().filter(|imp| imp.desc.kind() == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_type_display() {
        let ft = FunctionType {
            params: vec![ValueType::I32, ValueType::I64],
            results: vec![ValueType::F64],
        };
        assert_eq!(format!("{ft}"), "(i32, i64) -> (f64)");

        let empty = FunctionType::default();
        assert_eq!(format!("{empty}"), "() -> ()");
    }

    #[test]
    fn test_import_count() {
        let mut module = Module::default();
        module.imports.push(Import {
            module: "env".to_string(),
            name: "f".to_string(),
            desc: ImportDesc::Function(0),
        });
        module.imports.push(Import {
            module: "env".to_string(),
            name: "m".to_string(),
            desc: ImportDesc::Memory(MemoryType {
                limits: Limits { min: 1, max: None },
            }),
        });

        assert_eq!(module.import_count(ExternalKind::Function), 1);
        assert_eq!(module.import_count(ExternalKind::Memory), 1);
        assert_eq!(module.import_count(ExternalKind::Table), 0);
    }
}
