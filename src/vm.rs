//! The staged VM facade
//!
//! Wraps the store and engine behind the workflow embedders drive:
//! `Inited → Loaded → Validated → Instantiated`. Calling a stage-requiring
//! operation from an earlier stage fails with `WrongVmWorkflow`.
//! Registering another module while `Instantiated` drops the VM back to
//! `Validated`, since the store's module view must be rebuilt by the next
//! instantiation.
//!
//! Decoding is the loader collaborator's job, so the facade accepts a
//! decoded [`Module`] tree. Validation here covers only the structural
//! facts the engine itself relies on; full type checking belongs to the
//! validator collaborator.

use crate::module::{ExternalKind, FunctionType, Module};
use crate::runtime::host::ImportObject;
use crate::runtime::store::MemAddr;
use crate::runtime::{Engine, Measure, Store, Value, VmError};
use log::debug;
use std::time::Instant;

/// Execution stage of the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VmStage {
    Inited,
    Loaded,
    Validated,
    Instantiated,
}

impl VmStage {
    fn name(self) -> &'static str {
        match self {
            VmStage::Inited => "Inited",
            VmStage::Loaded => "Loaded",
            VmStage::Validated => "Validated",
            VmStage::Instantiated => "Instantiated",
        }
    }
}

/// The VM: a store, a metered engine, and the stage machine.
pub struct Vm {
    stage: VmStage,
    module: Option<Module>,
    store: Store,
    engine: Engine,
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Vm {
            stage: VmStage::Inited,
            module: None,
            store: Store::new(),
            engine: Engine::with_measure(Measure::new()),
        }
    }

    pub fn stage(&self) -> VmStage {
        self.stage
    }

    fn require_stage(&self, op: &'static str, requires: VmStage) -> Result<(), VmError> {
        if self.stage < requires {
            return Err(VmError::WrongVmWorkflow {
                op,
                requires: requires.name(),
                current: self.stage.name(),
            });
        }
        Ok(())
    }

    /// When a registration changes the store while `Instantiated`, the
    /// active instantiation becomes stale and must be redone.
    fn drop_to_validated(&mut self) {
        if self.stage == VmStage::Instantiated {
            self.stage = VmStage::Validated;
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Instantiate `module` under `name` so other modules can import from it
    pub fn register_module(&mut self, name: &str, module: &Module) -> Result<(), VmError> {
        self.drop_to_validated();
        validate_module(module)?;
        self.engine.register_module(&mut self.store, module, name)?;
        Ok(())
    }

    /// Register a host import object ("wasi", "ethereum", or an extension)
    pub fn register_import_object(&mut self, import_object: ImportObject) -> Result<(), VmError> {
        self.drop_to_validated();
        self.engine.register_import_object(&mut self.store, import_object)?;
        Ok(())
    }

    // ========================================================================
    // The load / validate / instantiate / execute workflow
    // ========================================================================

    /// Accept a decoded module; the VM moves to `Loaded`
    pub fn load_module(&mut self, module: Module) {
        self.module = Some(module);
        self.stage = VmStage::Loaded;
    }

    /// Check the loaded module structurally; the VM moves to `Validated`
    pub fn validate(&mut self) -> Result<(), VmError> {
        self.require_stage("validate", VmStage::Loaded)?;
        let module = self.module.as_ref().ok_or(VmError::WrongVmWorkflow {
            op: "validate",
            requires: "Loaded",
            current: "Inited",
        })?;
        validate_module(module)?;
        self.stage = VmStage::Validated;
        Ok(())
    }

    /// Instantiate the validated module; the VM moves to `Instantiated`
    pub fn instantiate(&mut self) -> Result<(), VmError> {
        self.require_stage("instantiate", VmStage::Validated)?;
        let module = self.module.take().ok_or(VmError::WrongVmWorkflow {
            op: "instantiate",
            requires: "Validated",
            current: "Inited",
        })?;
        let result = self.engine.instantiate(&mut self.store, &module);
        self.module = Some(module);
        result?;
        self.stage = VmStage::Instantiated;
        Ok(())
    }

    /// Invoke an exported function of the instantiated module
    pub fn execute(&mut self, func_name: &str, args: Vec<Value>) -> Result<Vec<Value>, VmError> {
        self.require_stage("execute", VmStage::Instantiated)?;
        self.engine.invoke(&mut self.store, func_name, args)
    }

    /// One-shot helper: validate, instantiate, and invoke `module`
    pub fn run_module(
        &mut self,
        module: Module,
        func_name: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, VmError> {
        self.drop_to_validated();
        validate_module(&module)?;
        let started = Instant::now();
        self.load_module(module);
        self.stage = VmStage::Validated;
        self.instantiate()?;
        debug!("instantiation took {:?}", started.elapsed());
        self.execute(func_name, args)
    }

    /// Reset everything back to `Inited`
    pub fn cleanup(&mut self) {
        self.module = None;
        self.store.reset();
        if let Some(measure) = self.engine.measure_mut() {
            measure.clear();
        }
        self.stage = VmStage::Inited;
    }

    // ========================================================================
    // Metering
    // ========================================================================

    pub fn set_cost_limit(&mut self, limit: u64) {
        if let Some(measure) = self.engine.measure_mut() {
            measure.set_cost_limit(limit);
        }
    }

    pub fn cost_limit(&self) -> u64 {
        self.engine.measure().map(Measure::cost_limit).unwrap_or(u64::MAX)
    }

    pub fn used_cost(&self) -> u64 {
        self.engine.measure().map(Measure::cost_sum).unwrap_or(0)
    }

    // ========================================================================
    // Introspection and memory helpers
    // ========================================================================

    /// Name and type of every exported function in the store
    pub fn function_list(&self) -> Vec<(String, FunctionType)> {
        self.store.func_exports()
    }

    /// Read `len` bytes from memory instance `idx` at `offset`
    pub fn memory_bytes(&self, idx: u32, offset: u64, len: u64) -> Result<Vec<u8>, VmError> {
        self.store.memory(MemAddr(idx as usize))?.get_bytes(offset, len)
    }

    /// Write `bytes` into memory instance `idx` at `offset`
    pub fn set_memory_bytes(&mut self, idx: u32, offset: u64, bytes: &[u8]) -> Result<(), VmError> {
        self.store.memory_mut(MemAddr(idx as usize))?.set_bytes(offset, bytes)
    }

    /// Replace the contents of memory instance `idx`
    pub fn replace_memory(&mut self, idx: u32, pages: u32, bytes: &[u8]) -> Result<(), VmError> {
        self.store.memory_mut(MemAddr(idx as usize))?.replace_data(pages, bytes)
    }

    /// Page count of memory instance `idx`
    pub fn memory_page_count(&self, idx: u32) -> Result<u32, VmError> {
        Ok(self.store.memory(MemAddr(idx as usize))?.page_count())
    }
}

/// The structural checks the engine relies on.
///
/// Index-space coherence and the single-result, single-memory,
/// single-table shape of WebAssembly 1.0. Full type checking of
/// instruction sequences is the validator collaborator's job.
fn validate_module(module: &Module) -> Result<(), VmError> {
    let failed = |message: String| Err(VmError::InstantiateFailed(message));

    if module.memories.len() > 1 {
        return failed(format!("at most one memory is supported, found {}", module.memories.len()));
    }
    if module.tables.len() > 1 {
        return failed(format!("at most one table is supported, found {}", module.tables.len()));
    }
    for (i, func_type) in module.types.iter().enumerate() {
        if func_type.results.len() > 1 {
            return failed(format!("type {i} has {} results; at most one is supported", func_type.results.len()));
        }
    }
    if module.functions.len() != module.code.len() {
        return failed(format!(
            "{} function declarations but {} bodies",
            module.functions.len(),
            module.code.len()
        ));
    }
    for (i, type_idx) in module.functions.iter().enumerate() {
        if *type_idx as usize >= module.types.len() {
            return failed(format!("function {i} references unknown type {type_idx}"));
        }
    }

    let func_count = module.import_count(ExternalKind::Function) + module.functions.len();
    let table_count = module.import_count(ExternalKind::Table) + module.tables.len();
    let mem_count = module.import_count(ExternalKind::Memory) + module.memories.len();
    let global_count = module.import_count(ExternalKind::Global) + module.globals.len();
    for export in &module.exports {
        let space = match export.kind {
            ExternalKind::Function => func_count,
            ExternalKind::Table => table_count,
            ExternalKind::Memory => mem_count,
            ExternalKind::Global => global_count,
        };
        if export.index as usize >= space {
            return failed(format!(
                "export '{}' references {} index {} out of range",
                export.name, export.kind, export.index
            ));
        }
    }
    if let Some(start_idx) = module.start {
        if start_idx as usize >= func_count {
            return failed(format!("start function index {start_idx} out of range"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instr;
    use crate::module::{Export, FunctionBody, ValueType};

    fn add_module() -> Module {
        let mut module = Module::default();
        module.types.push(FunctionType {
            params: vec![ValueType::I32, ValueType::I32],
            results: vec![ValueType::I32],
        });
        module.functions.push(0);
        module.code.push(FunctionBody {
            locals: vec![],
            body: vec![
                Instr::LocalGet { local_idx: 0 },
                Instr::LocalGet { local_idx: 1 },
                Instr::I32Add,
            ]
            .into(),
        });
        module.exports.push(Export {
            name: "add".to_string(),
            kind: ExternalKind::Function,
            index: 0,
        });
        module
    }

    #[test]
    fn test_full_workflow() {
        let mut vm = Vm::new();
        assert_eq!(vm.stage(), VmStage::Inited);

        vm.load_module(add_module());
        assert_eq!(vm.stage(), VmStage::Loaded);

        vm.validate().unwrap();
        assert_eq!(vm.stage(), VmStage::Validated);

        vm.instantiate().unwrap();
        assert_eq!(vm.stage(), VmStage::Instantiated);

        let results = vm.execute("add", vec![Value::I32(2), Value::I32(3)]).unwrap();
        assert_eq!(results, vec![Value::I32(5)]);
    }

    #[test]
    fn test_stage_violations() {
        let mut vm = Vm::new();

        assert!(matches!(vm.validate(), Err(VmError::WrongVmWorkflow { .. })));
        assert!(matches!(vm.instantiate(), Err(VmError::WrongVmWorkflow { .. })));
        assert!(matches!(
            vm.execute("add", vec![]),
            Err(VmError::WrongVmWorkflow { .. })
        ));

        // Loaded is not enough to instantiate
        vm.load_module(add_module());
        assert!(matches!(vm.instantiate(), Err(VmError::WrongVmWorkflow { .. })));
    }

    #[test]
    fn test_register_drops_back_to_validated() {
        let mut vm = Vm::new();
        vm.load_module(add_module());
        vm.validate().unwrap();
        vm.instantiate().unwrap();

        vm.register_module("adder", &add_module()).unwrap();
        assert_eq!(vm.stage(), VmStage::Validated);

        // Execution now requires re-instantiation
        assert!(matches!(
            vm.execute("add", vec![]),
            Err(VmError::WrongVmWorkflow { .. })
        ));
        vm.instantiate().unwrap();
        let results = vm.execute("add", vec![Value::I32(1), Value::I32(1)]).unwrap();
        assert_eq!(results, vec![Value::I32(2)]);
    }

    #[test]
    fn test_cleanup_resets() {
        let mut vm = Vm::new();
        vm.set_cost_limit(1000);
        vm.load_module(add_module());
        vm.validate().unwrap();
        vm.instantiate().unwrap();
        vm.execute("add", vec![Value::I32(1), Value::I32(2)]).unwrap();
        assert!(vm.used_cost() > 0);

        vm.cleanup();
        assert_eq!(vm.stage(), VmStage::Inited);
        assert_eq!(vm.used_cost(), 0);
        // The limit is configuration and survives cleanup
        assert_eq!(vm.cost_limit(), 1000);
    }

    #[test]
    fn test_run_module_one_shot() {
        let mut vm = Vm::new();
        let results = vm
            .run_module(add_module(), "add", vec![Value::I32(20), Value::I32(22)])
            .unwrap();
        assert_eq!(results, vec![Value::I32(42)]);
        assert_eq!(vm.stage(), VmStage::Instantiated);
    }

    #[test]
    fn test_validate_rejects_malformed_modules() {
        // Two results in one type
        let mut module = add_module();
        module.types[0].results.push(ValueType::I32);
        let mut vm = Vm::new();
        vm.load_module(module);
        assert!(matches!(vm.validate(), Err(VmError::InstantiateFailed(_))));

        // Function without a body
        let mut module = add_module();
        module.code.clear();
        let mut vm = Vm::new();
        vm.load_module(module);
        assert!(vm.validate().is_err());

        // Export pointing past the function space
        let mut module = add_module();
        module.exports[0].index = 9;
        let mut vm = Vm::new();
        vm.load_module(module);
        assert!(vm.validate().is_err());
    }

    #[test]
    fn test_function_list() {
        let mut vm = Vm::new();
        vm.load_module(add_module());
        vm.validate().unwrap();
        vm.instantiate().unwrap();

        let list = vm.function_list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].0, "add");
        assert_eq!(list[0].1.params.len(), 2);
    }

    #[test]
    fn test_memory_helpers() {
        let mut module = add_module();
        module.memories.push(crate::module::MemoryType {
            limits: crate::module::Limits { min: 1, max: Some(2) },
        });
        let mut vm = Vm::new();
        vm.load_module(module);
        vm.validate().unwrap();
        vm.instantiate().unwrap();

        vm.set_memory_bytes(0, 8, &[1, 2, 3]).unwrap();
        assert_eq!(vm.memory_bytes(0, 8, 3).unwrap(), vec![1, 2, 3]);

        vm.replace_memory(0, 2, &[9, 9]).unwrap();
        assert_eq!(vm.memory_page_count(0).unwrap(), 2);
        assert_eq!(vm.memory_bytes(0, 0, 2).unwrap(), vec![9, 9]);

        assert!(vm.memory_bytes(5, 0, 1).is_err());
    }
}
