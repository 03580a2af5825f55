//! A gas-metered WebAssembly interpreter written in Rust.
//!
//! gasm executes validated WebAssembly modules against a cost budget. It
//! covers the hard-engineering core of a WebAssembly virtual machine: the
//! unified operand/label/frame stack, the instantiated store, the
//! instruction dispatch engine, and the host-function boundary with gas
//! accounting. Binary decoding and full static validation are left to
//! collaborating crates; gasm consumes an already-decoded [`module::Module`]
//! tree.
//!
//! # Modules
//!
//! - [`module`] -- The decoded module tree handed over by a loader.
//! - [`instruction`] -- Decoded instructions with structured block bodies.
//! - [`runtime`] -- Store, stack, instances, dispatch engine, host boundary.
//! - [`vm`] -- The staged VM facade (`Inited → Loaded → Validated → Instantiated`).
//!
//! # Example
//!
//! Build a module tree, instantiate it, and call an exported function:
//!
//! ```
//! use gasm::module::{Export, ExternalKind, FunctionBody, FunctionType, Module, ValueType};
//! use gasm::instruction::Instr;
//! use gasm::runtime::Value;
//! use gasm::vm::Vm;
//!
//! let mut module = Module::default();
//! module.types.push(FunctionType {
//!     params: vec![ValueType::I32, ValueType::I32],
//!     results: vec![ValueType::I32],
//! });
//! module.functions.push(0);
//! module.code.push(FunctionBody {
//!     locals: vec![],
//!     body: vec![
//!         Instr::LocalGet { local_idx: 0 },
//!         Instr::LocalGet { local_idx: 1 },
//!         Instr::I32Add,
//!     ]
//!     .into(),
//! });
//! module.exports.push(Export {
//!     name: "add".to_string(),
//!     kind: ExternalKind::Function,
//!     index: 0,
//! });
//!
//! let mut vm = Vm::new();
//! vm.load_module(module);
//! vm.validate().unwrap();
//! vm.instantiate().unwrap();
//! let results = vm.execute("add", vec![Value::I32(2), Value::I32(3)]).unwrap();
//! assert_eq!(results, vec![Value::I32(5)]);
//! ```

pub mod instruction;
pub mod module;
pub mod runtime;
pub mod vm;
