//! The dispatch and evaluation engine
//!
//! The engine drives a run loop over the [`provider::InstrProvider`] scope
//! stack: fetch the next instruction of the current scope, meter it,
//! evaluate it; when a scope runs out, leave the construct that pushed it.
//! Control flow (blocks, loops, branches, calls) manipulates the scope
//! stack and the label/frame structure of the unified [`Stack`]; everything
//! else is delegated to the operators in [`crate::runtime::ops`].
//!
//! The engine also performs instantiation: resolving imports, allocating
//! instances into the store, evaluating initialiser expressions, and
//! running the start function.

pub mod provider;

use self::provider::{InstrProvider, ScopeKind};
use super::function::FunctionInstance;
use super::global::GlobalInstance;
use super::host::ImportObject;
use super::instance::{ExternVal, ModuleInstance};
use super::measure::{Measure, TimerTag};
use super::memory::MemoryInstance;
use super::ops;
use super::stack::{LabelOrigin, Stack};
use super::store::{FuncAddr, MemAddr, ModuleAddr, Store};
use super::table::TableInstance;
use super::{Value, VmError};
use crate::instruction::{Instr, InstrSeq};
use crate::module::{ExternalKind, ImportDesc, Limits, Module};
use log::{debug, error};

/// The execution engine: unified stack, scope stack, optional metering.
#[derive(Debug, Default)]
pub struct Engine {
    stack: Stack,
    provider: InstrProvider,
    measure: Option<Measure>,
}

impl Engine {
    /// An unmetered engine
    pub fn new() -> Self {
        Engine::default()
    }

    /// A metered engine
    pub fn with_measure(measure: Measure) -> Self {
        Engine {
            stack: Stack::new(),
            provider: InstrProvider::new(),
            measure: Some(measure),
        }
    }

    pub fn measure(&self) -> Option<&Measure> {
        self.measure.as_ref()
    }

    pub fn measure_mut(&mut self) -> Option<&mut Measure> {
        self.measure.as_mut()
    }

    /// Entry count of the operand stack; 0 between top-level invocations
    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    // ========================================================================
    // Registration and instantiation
    // ========================================================================

    /// Register a host import object as a named module
    ///
    /// Its functions, memories, tables, and globals are allocated into the
    /// store and exported under their field names. Registration upgrades
    /// the active cost profile when the host's profile outranks it.
    pub fn register_import_object(
        &mut self,
        store: &mut Store,
        import_object: ImportObject,
    ) -> Result<ModuleAddr, VmError> {
        if let Some(measure) = &mut self.measure {
            measure.upgrade_profile(import_object.profile());
        }

        let name = import_object.name().to_string();
        let mut instance = ModuleInstance::new(Some(name.clone()));

        for (field, callable) in import_object.functions {
            let addr = store.alloc_function(FunctionInstance::Host { callable });
            instance.push_func_addr(addr);
            instance.add_export(field, ExternVal::Func(addr));
        }
        for (field, memory) in import_object.memories {
            let addr = store.alloc_memory(memory);
            instance.push_mem_addr(addr);
            instance.add_export(field, ExternVal::Mem(addr));
        }
        for (field, table) in import_object.tables {
            let addr = store.alloc_table(table);
            instance.push_table_addr(addr);
            instance.add_export(field, ExternVal::Table(addr));
        }
        for (field, global) in import_object.globals {
            let addr = store.alloc_global(global);
            instance.push_global_addr(addr);
            instance.add_export(field, ExternVal::Global(addr));
        }

        let addr = store.alloc_module(instance);
        store.register_module_name(name, addr);
        Ok(addr)
    }

    /// Instantiate `module` and register it under `name` for imports
    pub fn register_module(
        &mut self,
        store: &mut Store,
        module: &Module,
        name: &str,
    ) -> Result<ModuleAddr, VmError> {
        let addr = self.instantiate_module(store, module, Some(name))?;
        store.register_module_name(name, addr);
        Ok(addr)
    }

    /// Instantiate `module` anonymously and make it the invocation target
    pub fn instantiate(&mut self, store: &mut Store, module: &Module) -> Result<ModuleAddr, VmError> {
        let addr = self.instantiate_module(store, module, None)?;
        store.set_active_module(addr);
        Ok(addr)
    }

    /// The instantiation sequence: imports, allocation, initialisers,
    /// segments, exports, start function.
    ///
    /// On failure the module is never registered or activated, so the store
    /// stays logically unchanged for it; already allocated entities are
    /// unreachable and reclaimed on [`Store::reset`].
    fn instantiate_module(
        &mut self,
        store: &mut Store,
        module: &Module,
        name: Option<&str>,
    ) -> Result<ModuleAddr, VmError> {
        debug!("instantiating module{}", name.map(|n| format!(" '{n}'")).unwrap_or_default());

        let mod_addr = store.alloc_module(ModuleInstance::new(name.map(String::from)));

        for func_type in &module.types {
            store.module_instance_mut(mod_addr)?.push_type(func_type.clone());
        }

        // Resolve imports by (module name, field name, expected shape)
        for import in &module.imports {
            let extern_val = self.resolve_import(store, module, import)?;
            let instance = store.module_instance_mut(mod_addr)?;
            match extern_val {
                ExternVal::Func(a) => instance.push_func_addr(a),
                ExternVal::Table(a) => instance.push_table_addr(a),
                ExternVal::Mem(a) => instance.push_mem_addr(a),
                ExternVal::Global(a) => instance.push_global_addr(a),
            }
        }

        // Module-defined functions
        for (i, type_idx) in module.functions.iter().enumerate() {
            let func_type = module.types.get(*type_idx as usize).ok_or_else(|| {
                VmError::InstantiateFailed(format!("function {i} has unknown type index {type_idx}"))
            })?;
            let body = module.code.get(i).ok_or_else(|| {
                VmError::InstantiateFailed(format!("function {i} has no body"))
            })?;
            let addr = store.alloc_function(FunctionInstance::Native {
                module: mod_addr,
                func_type: func_type.clone(),
                locals: body.locals.clone(),
                body: body.body.clone(),
            });
            store.module_instance_mut(mod_addr)?.push_func_addr(addr);
        }

        // Tables and memories, sized to their minimum
        for table_type in &module.tables {
            let table = TableInstance::new(table_type.limits.min, table_type.limits.max)
                .map_err(|e| VmError::InstantiateFailed(format!("table limits: {e}")))?;
            let addr = store.alloc_table(table);
            store.module_instance_mut(mod_addr)?.push_table_addr(addr);
        }
        for memory_type in &module.memories {
            let memory = MemoryInstance::new(memory_type.limits.min, memory_type.limits.max)
                .map_err(|e| VmError::InstantiateFailed(format!("memory limits: {e}")))?;
            let addr = store.alloc_memory(memory);
            store.module_instance_mut(mod_addr)?.push_mem_addr(addr);
        }

        // Globals: evaluate each initialiser in an auxiliary frame
        for (i, entry) in module.globals.iter().enumerate() {
            let value = self.eval_const_expr(store, mod_addr, &entry.init).map_err(|e| {
                VmError::InstantiateFailed(format!("global {i} initialiser: {e}"))
            })?;
            let global = GlobalInstance::new(entry.global_type, value)
                .map_err(|e| VmError::InstantiateFailed(format!("global {i}: {e}")))?;
            let addr = store.alloc_global(global);
            store.module_instance_mut(mod_addr)?.push_global_addr(addr);
        }

        // Element segments
        for (i, segment) in module.elements.iter().enumerate() {
            let offset = self
                .eval_const_expr(store, mod_addr, &segment.offset)
                .map_err(|e| VmError::InstantiateFailed(format!("element segment {i} offset: {e}")))?
                .as_i32()
                .ok_or_else(|| {
                    VmError::InstantiateFailed(format!("element segment {i} offset is not i32"))
                })? as u32;
            let mut addrs = Vec::with_capacity(segment.func_indices.len());
            for func_idx in &segment.func_indices {
                addrs.push(store.module_instance(mod_addr)?.func_addr(*func_idx)?);
            }
            let table_addr = store.module_instance(mod_addr)?.table_addr(segment.table_idx)?;
            store
                .table_mut(table_addr)?
                .init(offset, &addrs)
                .map_err(|_| {
                    VmError::InstantiateFailed(format!(
                        "element segment {i} of length {} does not fit at offset {offset}",
                        addrs.len()
                    ))
                })?;
        }

        // Data segments
        for (i, segment) in module.data.iter().enumerate() {
            let offset = self
                .eval_const_expr(store, mod_addr, &segment.offset)
                .map_err(|e| VmError::InstantiateFailed(format!("data segment {i} offset: {e}")))?
                .as_i32()
                .ok_or_else(|| {
                    VmError::InstantiateFailed(format!("data segment {i} offset is not i32"))
                })? as u32;
            let mem_addr = store.module_instance(mod_addr)?.mem_addr(segment.memory_idx)?;
            store
                .memory_mut(mem_addr)?
                .set_bytes(offset as u64, &segment.bytes)
                .map_err(|_| {
                    VmError::InstantiateFailed(format!(
                        "data segment {i} of length {} does not fit at offset {offset}",
                        segment.bytes.len()
                    ))
                })?;
        }

        // Exports
        for export in &module.exports {
            let instance = store.module_instance(mod_addr)?;
            let value = match export.kind {
                ExternalKind::Function => ExternVal::Func(instance.func_addr(export.index)?),
                ExternalKind::Table => ExternVal::Table(instance.table_addr(export.index)?),
                ExternalKind::Memory => ExternVal::Mem(instance.mem_addr(export.index)?),
                ExternalKind::Global => ExternVal::Global(instance.global_addr(export.index)?),
            };
            store
                .module_instance_mut(mod_addr)?
                .add_export(export.name.clone(), value);
        }

        // Start function
        if let Some(start_idx) = module.start {
            let start_addr = store.module_instance(mod_addr)?.func_addr(start_idx)?;
            store.module_instance_mut(mod_addr)?.start = Some(start_addr);
            debug!("running start function");
            self.call_function(store, start_addr, vec![])?;
        }

        Ok(mod_addr)
    }

    fn resolve_import(
        &self,
        store: &Store,
        module: &Module,
        import: &crate::module::Import,
    ) -> Result<ExternVal, VmError> {
        let not_found = || {
            VmError::InstantiateFailed(format!("unknown import {}.{}", import.module, import.name))
        };
        let src_addr = store.find_module(&import.module).ok_or_else(not_found)?;
        let extern_val = *store
            .module_instance(src_addr)?
            .export(&import.name)
            .ok_or_else(not_found)?;

        let mismatch = |expected: &str, actual: &str| {
            VmError::InstantiateFailed(format!(
                "import {}.{}: expected {expected}, found {actual}",
                import.module, import.name
            ))
        };

        match (&import.desc, extern_val) {
            (ImportDesc::Function(type_idx), ExternVal::Func(addr)) => {
                let expected = module.types.get(*type_idx as usize).ok_or_else(|| {
                    VmError::InstantiateFailed(format!(
                        "import {}.{} has unknown type index {type_idx}",
                        import.module, import.name
                    ))
                })?;
                let actual = store.function(addr)?.func_type();
                if expected != actual {
                    return Err(mismatch(&expected.to_string(), &actual.to_string()));
                }
            }
            (ImportDesc::Memory(memory_type), ExternVal::Mem(addr)) => {
                let memory = store.memory(addr)?;
                check_limits(
                    &memory_type.limits,
                    memory.page_count(),
                    memory.max_page(),
                )
                .map_err(|_| mismatch("matching memory limits", "incompatible memory"))?;
            }
            (ImportDesc::Table(table_type), ExternVal::Table(addr)) => {
                let table = store.table(addr)?;
                check_limits(&table_type.limits, table.size(), table.max())
                    .map_err(|_| mismatch("matching table limits", "incompatible table"))?;
            }
            (ImportDesc::Global(global_type), ExternVal::Global(addr)) => {
                let global = store.global(addr)?;
                if global.value_type() != global_type.value_type
                    || global.is_mutable() != global_type.mutable
                {
                    return Err(mismatch(
                        &format!("global {}", global_type.value_type),
                        &format!("global {}", global.value_type()),
                    ));
                }
            }
            (desc, actual) => {
                return Err(mismatch(&desc.kind().to_string(), &actual.kind().to_string()));
            }
        }
        Ok(extern_val)
    }

    /// Evaluate a constant expression in an auxiliary frame and return the
    /// value it leaves on top of the stack.
    fn eval_const_expr(
        &mut self,
        store: &mut Store,
        module: ModuleAddr,
        expr: &InstrSeq,
    ) -> Result<Value, VmError> {
        self.stack.push_frame(module, 0, 0)?;
        self.provider.push_scope(ScopeKind::Expression, expr.clone());
        let result = self.run(store).and_then(|()| self.stack.pop());
        match result {
            Ok(value) => {
                self.stack.pop_frame()?;
                Ok(value)
            }
            Err(e) => {
                self.stack.reset();
                self.provider.reset();
                Err(e)
            }
        }
    }

    // ========================================================================
    // Invocation
    // ========================================================================

    /// Invoke an exported function of the active module by name
    pub fn invoke(
        &mut self,
        store: &mut Store,
        func_name: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, VmError> {
        let mod_addr = store
            .active_module()
            .ok_or_else(|| VmError::FunctionInvalid("no module instantiated".to_string()))?;
        let addr = match store.module_instance(mod_addr)?.export(func_name) {
            Some(ExternVal::Func(addr)) => *addr,
            Some(other) => {
                return Err(VmError::FunctionInvalid(format!(
                    "export '{func_name}' is a {}, not a function",
                    other.kind()
                )))
            }
            None => {
                return Err(VmError::FunctionInvalid(format!(
                    "no exported function '{func_name}'"
                )))
            }
        };
        self.call_function(store, addr, args)
    }

    /// Invoke the function at `addr` with `args`
    ///
    /// Arguments are checked against the declared signature; the invocation
    /// returns the declared results. A `Terminated` signal from a host
    /// function is a successful (empty) completion. On any error the stack
    /// is unwound to empty; store mutations up to the trap are retained.
    pub fn call_function(
        &mut self,
        store: &mut Store,
        addr: FuncAddr,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, VmError> {
        let func_type = store.function(addr)?.func_type().clone();
        if args.len() != func_type.params.len() {
            return Err(VmError::CallFunctionError(format!(
                "expected {} arguments, got {}",
                func_type.params.len(),
                args.len()
            )));
        }
        for (i, (arg, param)) in args.iter().zip(&func_type.params).enumerate() {
            if arg.typ() != *param {
                return Err(VmError::CallFunctionError(format!(
                    "argument {i}: expected {param}, got {}",
                    arg.typ()
                )));
            }
        }

        debug!("invoking function at address {}", addr.0);
        for arg in args {
            self.stack.push(arg);
        }

        if let Some(measure) = &mut self.measure {
            measure.timers().start_record(TimerTag::Execution);
        }
        let outcome = self
            .enter_function(store, addr)
            .and_then(|()| self.run(store));
        if let Some(measure) = &mut self.measure {
            measure.timers().stop_record(TimerTag::Execution);
        }

        match outcome {
            Ok(()) => {
                let mut results = Vec::with_capacity(func_type.results.len());
                for _ in 0..func_type.results.len() {
                    results.push(self.stack.pop()?);
                }
                results.reverse();
                debug!("execution succeeded");
                Ok(results)
            }
            Err(VmError::Terminated) => {
                // A host-requested shutdown completes successfully
                debug!("terminated");
                self.stack.reset();
                self.provider.reset();
                Ok(vec![])
            }
            Err(e) => {
                if e == VmError::Revert {
                    error!("reverted");
                } else {
                    error!("execution failed: {e}");
                }
                self.stack.reset();
                self.provider.reset();
                Err(e)
            }
        }
    }

    // ========================================================================
    // The run loop
    // ========================================================================

    /// Drive the scope stack until it is empty
    fn run(&mut self, store: &mut Store) -> Result<(), VmError> {
        while self.provider.scope_count() > 0 {
            match self.provider.fetch() {
                Some(instr) => {
                    if let Some(measure) = &mut self.measure {
                        measure.inc_instr_count();
                        if !measure.add_instr_cost(instr.opcode()) {
                            return Err(VmError::CostLimitExceeded);
                        }
                    }
                    self.eval(store, &instr)?;
                }
                None => match self.provider.top_kind() {
                    Some(ScopeKind::FunctionCall) => self.leave_function()?,
                    Some(ScopeKind::Block) => self.leave_block()?,
                    _ => self.provider.pop_scope(),
                },
            }
        }
        Ok(())
    }

    // ========================================================================
    // Function and block entry / exit
    // ========================================================================

    /// Enter the function at `addr`; its arguments are the top values
    fn enter_function(&mut self, store: &mut Store, addr: FuncAddr) -> Result<(), VmError> {
        if store.function(addr)?.is_host() {
            return self.enter_host_function(store, addr);
        }

        let (module, param_arity, result_arity, local_decls, body) = match store.function(addr)? {
            FunctionInstance::Native {
                module, func_type, locals, body,
            } => (
                *module,
                func_type.params.len(),
                func_type.results.len(),
                locals.clone(),
                body.clone(),
            ),
            FunctionInstance::Host { .. } => unreachable!("checked above"),
        };

        self.stack.push_frame(module, param_arity, result_arity)?;
        for (count, value_type) in &local_decls {
            self.stack
                .append_locals((0..*count).map(|_| Value::default_for(*value_type)))?;
        }

        // The body runs as a block whose label carries the return arity
        self.provider.push_call_marker();
        self.stack.push_label(result_arity, LabelOrigin::Block);
        self.provider.push_scope(ScopeKind::Block, body);
        Ok(())
    }

    /// Enter a host function: charge its declared cost, then run it against
    /// the stack and the calling module's memory 0
    fn enter_host_function(&mut self, store: &mut Store, addr: FuncAddr) -> Result<(), VmError> {
        let declared_cost = match store.function(addr)? {
            FunctionInstance::Host { callable } => callable.cost(),
            FunctionInstance::Native { .. } => {
                return Err(VmError::FunctionInvalid(format!(
                    "function address {} is not a host function",
                    addr.0
                )))
            }
        };

        if let Some(measure) = &mut self.measure {
            if !measure.add_cost(declared_cost) {
                return Err(VmError::CostLimitExceeded);
            }
            measure.timers().stop_record(TimerTag::Execution);
            measure.timers().start_record(TimerTag::HostFunc);
        }

        // The designated memory is memory 0 of the calling module, when
        // there is a calling frame and it has one
        let mem_addr = self.current_mem_addr(store).ok();
        let (callable, memory) = store.host_call_parts(addr, mem_addr)?;
        let status = callable.run(&mut self.stack, memory);

        if let Some(measure) = &mut self.measure {
            measure.timers().stop_record(TimerTag::HostFunc);
            measure.timers().start_record(TimerTag::Execution);
        }

        status.into_result()
    }

    /// Leave the current function: pop its frame and the matching scopes
    ///
    /// Also implements `return`: every label above the frame unwinds, and
    /// the frame restores its declared results.
    fn leave_function(&mut self) -> Result<(), VmError> {
        let labels_unwound = self.stack.pop_frame()?;
        for _ in 0..labels_unwound {
            self.provider.pop_scope();
        }
        // The FunctionCall marker itself
        self.provider.pop_scope();
        Ok(())
    }

    /// Leave a block normally: its label goes, its results stay
    fn leave_block(&mut self) -> Result<(), VmError> {
        self.stack.exit_label()?;
        self.provider.pop_scope();
        Ok(())
    }

    /// Enter a block-like construct: push its label and its body scope
    fn enter_block(&mut self, arity: usize, origin: LabelOrigin, body: InstrSeq) {
        self.stack.push_label(arity, origin);
        self.provider.push_scope(ScopeKind::Block, body);
    }

    /// Branch to the `depth`-th enclosing label
    ///
    /// Preserves the label's arity in values, drops `depth + 1` labels and
    /// their scopes, then transfers control: a loop label re-enters the
    /// loop body from the start, a block/if label resumes after the block.
    fn branch_to_label(&mut self, depth: u32) -> Result<(), VmError> {
        let label = self.stack.label_at(depth)?.clone();

        let mut kept = Vec::with_capacity(label.arity);
        for _ in 0..label.arity {
            kept.push(self.stack.pop()?);
        }
        self.stack.pop_label(depth as usize + 1)?;
        for value in kept.into_iter().rev() {
            self.stack.push(value);
        }
        for _ in 0..=depth {
            self.provider.pop_scope();
        }

        if let LabelOrigin::Loop { body } = label.origin {
            // Replay the loop from its first instruction
            self.enter_block(label.arity, LabelOrigin::Loop { body: body.clone() }, body);
        }
        Ok(())
    }

    fn current_mem_addr(&self, store: &Store) -> Result<MemAddr, VmError> {
        let module = self.stack.current_module()?;
        store.module_instance(module)?.mem_addr(0)
    }

    // ========================================================================
    // Instruction evaluation
    // ========================================================================

    fn eval(&mut self, store: &mut Store, instr: &Instr) -> Result<(), VmError> {
        let stack = &mut self.stack;
        match instr {
            // Control
            Instr::Unreachable => Err(VmError::Unreachable),
            Instr::Nop => Ok(()),
            Instr::Block { block_type, body } => {
                self.enter_block(block_type.result_arity(), LabelOrigin::Block, body.clone());
                Ok(())
            }
            Instr::Loop { block_type, body } => {
                self.enter_block(
                    block_type.result_arity(),
                    LabelOrigin::Loop { body: body.clone() },
                    body.clone(),
                );
                Ok(())
            }
            Instr::If { block_type, then_body, else_body } => {
                let cond = stack.pop_i32()?;
                let body = if cond != 0 { then_body } else { else_body };
                self.enter_block(block_type.result_arity(), LabelOrigin::Block, body.clone());
                Ok(())
            }
            Instr::Br { depth } => self.branch_to_label(*depth),
            Instr::BrIf { depth } => {
                let cond = stack.pop_i32()?;
                if cond != 0 {
                    self.branch_to_label(*depth)
                } else {
                    Ok(())
                }
            }
            Instr::BrTable { targets, default } => {
                let index = stack.pop_i32()? as u32;
                let depth = targets.get(index as usize).copied().unwrap_or(*default);
                self.branch_to_label(depth)
            }
            Instr::Return => self.leave_function(),
            Instr::Call { func_idx } => {
                let module = self.stack.current_module()?;
                let addr = store.module_instance(module)?.func_addr(*func_idx)?;
                self.enter_function(store, addr)
            }
            Instr::CallIndirect { type_idx } => {
                let module = self.stack.current_module()?;
                let index = self.stack.pop_i32()? as u32;
                let table_addr = store.module_instance(module)?.table_addr(0)?;
                let addr = store.table(table_addr)?.get(index)?;
                let expected = store.module_instance(module)?.func_type(*type_idx)?;
                let actual = store.function(addr)?.func_type();
                if expected != actual {
                    return Err(VmError::TypeNotMatch {
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    });
                }
                self.enter_function(store, addr)
            }

            // Parametric
            Instr::Drop => ops::parametric::drop(stack),
            Instr::Select => ops::parametric::select(stack),

            // Variables
            Instr::LocalGet { local_idx } => ops::variable::local_get(stack, *local_idx),
            Instr::LocalSet { local_idx } => ops::variable::local_set(stack, *local_idx),
            Instr::LocalTee { local_idx } => ops::variable::local_tee(stack, *local_idx),
            Instr::GlobalGet { global_idx } => {
                let module = stack.current_module()?;
                let addr = store.module_instance(module)?.global_addr(*global_idx)?;
                ops::variable::global_get(stack, store.global(addr)?)
            }
            Instr::GlobalSet { global_idx } => {
                let module = stack.current_module()?;
                let addr = store.module_instance(module)?.global_addr(*global_idx)?;
                ops::variable::global_set(stack, store.global_mut(addr)?)
            }

            // Memory
            Instr::I32Load { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i32_load(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::I64Load { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i64_load(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::F32Load { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::f32_load(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::F64Load { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::f64_load(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::I32Load8S { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i32_load8_s(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::I32Load8U { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i32_load8_u(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::I32Load16S { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i32_load16_s(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::I32Load16U { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i32_load16_u(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::I64Load8S { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i64_load8_s(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::I64Load8U { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i64_load8_u(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::I64Load16S { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i64_load16_s(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::I64Load16U { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i64_load16_u(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::I64Load32S { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i64_load32_s(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::I64Load32U { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i64_load32_u(&mut self.stack, store.memory(addr)?, memarg)
            }
            Instr::I32Store { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i32_store(&mut self.stack, store.memory_mut(addr)?, memarg)
            }
            Instr::I64Store { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i64_store(&mut self.stack, store.memory_mut(addr)?, memarg)
            }
            Instr::F32Store { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::f32_store(&mut self.stack, store.memory_mut(addr)?, memarg)
            }
            Instr::F64Store { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::f64_store(&mut self.stack, store.memory_mut(addr)?, memarg)
            }
            Instr::I32Store8 { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i32_store8(&mut self.stack, store.memory_mut(addr)?, memarg)
            }
            Instr::I32Store16 { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i32_store16(&mut self.stack, store.memory_mut(addr)?, memarg)
            }
            Instr::I64Store8 { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i64_store8(&mut self.stack, store.memory_mut(addr)?, memarg)
            }
            Instr::I64Store16 { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i64_store16(&mut self.stack, store.memory_mut(addr)?, memarg)
            }
            Instr::I64Store32 { memarg } => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::i64_store32(&mut self.stack, store.memory_mut(addr)?, memarg)
            }
            Instr::MemorySize => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::memory_size(&mut self.stack, store.memory(addr)?)
            }
            Instr::MemoryGrow => {
                let addr = self.current_mem_addr(store)?;
                ops::memory::memory_grow(&mut self.stack, store.memory_mut(addr)?)
            }

            // Constants
            Instr::I32Const { value } => ops::numeric::i32_const(stack, *value),
            Instr::I64Const { value } => ops::numeric::i64_const(stack, *value),
            Instr::F32Const { value } => ops::numeric::f32_const(stack, *value),
            Instr::F64Const { value } => ops::numeric::f64_const(stack, *value),

            // Tests and comparisons
            Instr::I32Eqz => ops::comparison::i32_eqz(stack),
            Instr::I32Eq => ops::comparison::i32_eq(stack),
            Instr::I32Ne => ops::comparison::i32_ne(stack),
            Instr::I32LtS => ops::comparison::i32_lt_s(stack),
            Instr::I32LtU => ops::comparison::i32_lt_u(stack),
            Instr::I32GtS => ops::comparison::i32_gt_s(stack),
            Instr::I32GtU => ops::comparison::i32_gt_u(stack),
            Instr::I32LeS => ops::comparison::i32_le_s(stack),
            Instr::I32LeU => ops::comparison::i32_le_u(stack),
            Instr::I32GeS => ops::comparison::i32_ge_s(stack),
            Instr::I32GeU => ops::comparison::i32_ge_u(stack),
            Instr::I64Eqz => ops::comparison::i64_eqz(stack),
            Instr::I64Eq => ops::comparison::i64_eq(stack),
            Instr::I64Ne => ops::comparison::i64_ne(stack),
            Instr::I64LtS => ops::comparison::i64_lt_s(stack),
            Instr::I64LtU => ops::comparison::i64_lt_u(stack),
            Instr::I64GtS => ops::comparison::i64_gt_s(stack),
            Instr::I64GtU => ops::comparison::i64_gt_u(stack),
            Instr::I64LeS => ops::comparison::i64_le_s(stack),
            Instr::I64LeU => ops::comparison::i64_le_u(stack),
            Instr::I64GeS => ops::comparison::i64_ge_s(stack),
            Instr::I64GeU => ops::comparison::i64_ge_u(stack),
            Instr::F32Eq => ops::comparison::f32_eq(stack),
            Instr::F32Ne => ops::comparison::f32_ne(stack),
            Instr::F32Lt => ops::comparison::f32_lt(stack),
            Instr::F32Gt => ops::comparison::f32_gt(stack),
            Instr::F32Le => ops::comparison::f32_le(stack),
            Instr::F32Ge => ops::comparison::f32_ge(stack),
            Instr::F64Eq => ops::comparison::f64_eq(stack),
            Instr::F64Ne => ops::comparison::f64_ne(stack),
            Instr::F64Lt => ops::comparison::f64_lt(stack),
            Instr::F64Gt => ops::comparison::f64_gt(stack),
            Instr::F64Le => ops::comparison::f64_le(stack),
            Instr::F64Ge => ops::comparison::f64_ge(stack),

            // Arithmetic
            Instr::I32Clz => ops::numeric::i32_clz(stack),
            Instr::I32Ctz => ops::numeric::i32_ctz(stack),
            Instr::I32Popcnt => ops::numeric::i32_popcnt(stack),
            Instr::I32Add => ops::numeric::i32_add(stack),
            Instr::I32Sub => ops::numeric::i32_sub(stack),
            Instr::I32Mul => ops::numeric::i32_mul(stack),
            Instr::I32DivS => ops::numeric::i32_div_s(stack),
            Instr::I32DivU => ops::numeric::i32_div_u(stack),
            Instr::I32RemS => ops::numeric::i32_rem_s(stack),
            Instr::I32RemU => ops::numeric::i32_rem_u(stack),
            Instr::I32And => ops::bitwise::i32_and(stack),
            Instr::I32Or => ops::bitwise::i32_or(stack),
            Instr::I32Xor => ops::bitwise::i32_xor(stack),
            Instr::I32Shl => ops::bitwise::i32_shl(stack),
            Instr::I32ShrS => ops::bitwise::i32_shr_s(stack),
            Instr::I32ShrU => ops::bitwise::i32_shr_u(stack),
            Instr::I32Rotl => ops::bitwise::i32_rotl(stack),
            Instr::I32Rotr => ops::bitwise::i32_rotr(stack),
            Instr::I64Clz => ops::numeric::i64_clz(stack),
            Instr::I64Ctz => ops::numeric::i64_ctz(stack),
            Instr::I64Popcnt => ops::numeric::i64_popcnt(stack),
            Instr::I64Add => ops::numeric::i64_add(stack),
            Instr::I64Sub => ops::numeric::i64_sub(stack),
            Instr::I64Mul => ops::numeric::i64_mul(stack),
            Instr::I64DivS => ops::numeric::i64_div_s(stack),
            Instr::I64DivU => ops::numeric::i64_div_u(stack),
            Instr::I64RemS => ops::numeric::i64_rem_s(stack),
            Instr::I64RemU => ops::numeric::i64_rem_u(stack),
            Instr::I64And => ops::bitwise::i64_and(stack),
            Instr::I64Or => ops::bitwise::i64_or(stack),
            Instr::I64Xor => ops::bitwise::i64_xor(stack),
            Instr::I64Shl => ops::bitwise::i64_shl(stack),
            Instr::I64ShrS => ops::bitwise::i64_shr_s(stack),
            Instr::I64ShrU => ops::bitwise::i64_shr_u(stack),
            Instr::I64Rotl => ops::bitwise::i64_rotl(stack),
            Instr::I64Rotr => ops::bitwise::i64_rotr(stack),
            Instr::F32Abs => ops::numeric::f32_abs(stack),
            Instr::F32Neg => ops::numeric::f32_neg(stack),
            Instr::F32Ceil => ops::numeric::f32_ceil(stack),
            Instr::F32Floor => ops::numeric::f32_floor(stack),
            Instr::F32Trunc => ops::numeric::f32_trunc(stack),
            Instr::F32Nearest => ops::numeric::f32_nearest(stack),
            Instr::F32Sqrt => ops::numeric::f32_sqrt(stack),
            Instr::F32Add => ops::numeric::f32_add(stack),
            Instr::F32Sub => ops::numeric::f32_sub(stack),
            Instr::F32Mul => ops::numeric::f32_mul(stack),
            Instr::F32Div => ops::numeric::f32_div(stack),
            Instr::F32Min => ops::numeric::f32_min(stack),
            Instr::F32Max => ops::numeric::f32_max(stack),
            Instr::F32Copysign => ops::numeric::f32_copysign(stack),
            Instr::F64Abs => ops::numeric::f64_abs(stack),
            Instr::F64Neg => ops::numeric::f64_neg(stack),
            Instr::F64Ceil => ops::numeric::f64_ceil(stack),
            Instr::F64Floor => ops::numeric::f64_floor(stack),
            Instr::F64Trunc => ops::numeric::f64_trunc(stack),
            Instr::F64Nearest => ops::numeric::f64_nearest(stack),
            Instr::F64Sqrt => ops::numeric::f64_sqrt(stack),
            Instr::F64Add => ops::numeric::f64_add(stack),
            Instr::F64Sub => ops::numeric::f64_sub(stack),
            Instr::F64Mul => ops::numeric::f64_mul(stack),
            Instr::F64Div => ops::numeric::f64_div(stack),
            Instr::F64Min => ops::numeric::f64_min(stack),
            Instr::F64Max => ops::numeric::f64_max(stack),
            Instr::F64Copysign => ops::numeric::f64_copysign(stack),

            // Conversions
            Instr::I32WrapI64 => ops::conversion::i32_wrap_i64(stack),
            Instr::I32TruncF32S => ops::conversion::i32_trunc_f32_s(stack),
            Instr::I32TruncF32U => ops::conversion::i32_trunc_f32_u(stack),
            Instr::I32TruncF64S => ops::conversion::i32_trunc_f64_s(stack),
            Instr::I32TruncF64U => ops::conversion::i32_trunc_f64_u(stack),
            Instr::I64ExtendI32S => ops::conversion::i64_extend_i32_s(stack),
            Instr::I64ExtendI32U => ops::conversion::i64_extend_i32_u(stack),
            Instr::I64TruncF32S => ops::conversion::i64_trunc_f32_s(stack),
            Instr::I64TruncF32U => ops::conversion::i64_trunc_f32_u(stack),
            Instr::I64TruncF64S => ops::conversion::i64_trunc_f64_s(stack),
            Instr::I64TruncF64U => ops::conversion::i64_trunc_f64_u(stack),
            Instr::F32ConvertI32S => ops::conversion::f32_convert_i32_s(stack),
            Instr::F32ConvertI32U => ops::conversion::f32_convert_i32_u(stack),
            Instr::F32ConvertI64S => ops::conversion::f32_convert_i64_s(stack),
            Instr::F32ConvertI64U => ops::conversion::f32_convert_i64_u(stack),
            Instr::F32DemoteF64 => ops::conversion::f32_demote_f64(stack),
            Instr::F64ConvertI32S => ops::conversion::f64_convert_i32_s(stack),
            Instr::F64ConvertI32U => ops::conversion::f64_convert_i32_u(stack),
            Instr::F64ConvertI64S => ops::conversion::f64_convert_i64_s(stack),
            Instr::F64ConvertI64U => ops::conversion::f64_convert_i64_u(stack),
            Instr::F64PromoteF32 => ops::conversion::f64_promote_f32(stack),
            Instr::I32ReinterpretF32 => ops::conversion::i32_reinterpret_f32(stack),
            Instr::I64ReinterpretF64 => ops::conversion::i64_reinterpret_f64(stack),
            Instr::F32ReinterpretI32 => ops::conversion::f32_reinterpret_i32(stack),
            Instr::F64ReinterpretI64 => ops::conversion::f64_reinterpret_i64(stack),
        }
    }
}

/// Check that actual limits satisfy declared import limits: the actual
/// minimum must reach the declared minimum, and a declared maximum must be
/// honoured by the actual maximum.
fn check_limits(declared: &Limits, actual_min: u32, actual_max: Option<u32>) -> Result<(), ()> {
    if actual_min < declared.min {
        return Err(());
    }
    if let Some(declared_max) = declared.max {
        match actual_max {
            Some(actual_max) if actual_max <= declared_max => {}
            _ => return Err(()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::BlockType;
    use crate::module::{FunctionBody, FunctionType, ValueType};
    use crate::runtime::test_utils::test::{EngineTest, ModuleBuilder};

    #[test]
    fn test_block_leaves_result() {
        EngineTest::new()
            .inst(Instr::Block {
                block_type: BlockType::Value(ValueType::I32),
                body: vec![Instr::I32Const { value: 7 }].into(),
            })
            .expect_result(Value::I32(7));
    }

    #[test]
    fn test_branch_out_of_block_skips_rest() {
        // br 0 exits the block; the trailing unreachable must not run
        EngineTest::new()
            .inst(Instr::Block {
                block_type: BlockType::Empty,
                body: vec![Instr::Br { depth: 0 }, Instr::Unreachable].into(),
            })
            .inst(Instr::I32Const { value: 1 })
            .expect_result(Value::I32(1));
    }

    #[test]
    fn test_branch_carries_label_arity_values() {
        EngineTest::new()
            .inst(Instr::Block {
                block_type: BlockType::Value(ValueType::I32),
                body: vec![
                    Instr::I32Const { value: 9 },
                    Instr::Br { depth: 0 },
                    Instr::Unreachable,
                ]
                .into(),
            })
            .expect_result(Value::I32(9));
    }

    #[test]
    fn test_nested_branch_depth() {
        // br 1 from the inner block exits the outer block
        EngineTest::new()
            .inst(Instr::Block {
                block_type: BlockType::Empty,
                body: vec![
                    Instr::Block {
                        block_type: BlockType::Empty,
                        body: vec![Instr::Br { depth: 1 }, Instr::Unreachable].into(),
                    },
                    Instr::Unreachable,
                ]
                .into(),
            })
            .inst(Instr::I32Const { value: 3 })
            .expect_result(Value::I32(3));
    }

    #[test]
    fn test_if_takes_then_or_else() {
        let if_instr = |cond: i32| {
            vec![
                Instr::I32Const { value: cond },
                Instr::If {
                    block_type: BlockType::Value(ValueType::I32),
                    then_body: vec![Instr::I32Const { value: 1 }].into(),
                    else_body: vec![Instr::I32Const { value: 2 }].into(),
                },
            ]
        };

        let mut test = EngineTest::new();
        for i in if_instr(5) {
            test = test.inst(i);
        }
        test.expect_result(Value::I32(1));

        let mut test = EngineTest::new();
        for i in if_instr(0) {
            test = test.inst(i);
        }
        test.expect_result(Value::I32(2));
    }

    #[test]
    fn test_empty_else_arm() {
        EngineTest::new()
            .inst(Instr::I32Const { value: 0 })
            .inst(Instr::If {
                block_type: BlockType::Empty,
                then_body: vec![Instr::Unreachable].into(),
                else_body: Vec::new().into(),
            })
            .inst(Instr::I32Const { value: 4 })
            .expect_result(Value::I32(4));
    }

    #[test]
    fn test_br_table_selects_target() {
        // targets [0], default 1. The outer block yields one i32: 55 comes
        // straight from the default branch, 100 from the fall-through after
        // the inner block.
        let body = |index: i32| {
            Instr::Block {
                block_type: BlockType::Value(ValueType::I32),
                body: vec![
                    Instr::Block {
                        block_type: BlockType::Empty,
                        body: vec![
                            Instr::I32Const { value: 55 },
                            Instr::I32Const { value: index },
                            Instr::BrTable {
                                targets: vec![0],
                                default: 1,
                            },
                        ]
                        .into(),
                    },
                    // reached only via br_table 0
                    Instr::I32Const { value: 100 },
                    Instr::Br { depth: 0 },
                ]
                .into(),
            }
        };

        EngineTest::new()
            .inst(body(0))
            .inst(Instr::I32Const { value: 1 })
            .inst(Instr::I32Add)
            .expect_result(Value::I32(101));

        // out-of-range index takes the default target and carries the 55
        EngineTest::new()
            .inst(body(7))
            .inst(Instr::I32Const { value: 1 })
            .inst(Instr::I32Add)
            .expect_result(Value::I32(56));
    }

    #[test]
    fn test_unreachable_traps() {
        EngineTest::new().inst(Instr::Unreachable).expect_error("unreachable");
    }

    #[test]
    fn test_loop_with_exit_condition() {
        // local 0 counts down from 5; the loop re-enters until it hits 0
        EngineTest::new()
            .param(ValueType::I32)
            .arg(Value::I32(5))
            .inst(Instr::Block {
                block_type: BlockType::Empty,
                body: vec![Instr::Loop {
                    block_type: BlockType::Empty,
                    body: vec![
                        Instr::LocalGet { local_idx: 0 },
                        Instr::I32Eqz,
                        Instr::BrIf { depth: 1 },
                        Instr::LocalGet { local_idx: 0 },
                        Instr::I32Const { value: 1 },
                        Instr::I32Sub,
                        Instr::LocalSet { local_idx: 0 },
                        Instr::Br { depth: 0 },
                    ]
                    .into(),
                }]
                .into(),
            })
            .inst(Instr::LocalGet { local_idx: 0 })
            .expect_result(Value::I32(0));
    }

    #[test]
    fn test_call_and_return() {
        // callee: (i32) -> i32, returns arg * 2; caller invokes it with 21
        let mut builder = ModuleBuilder::new();
        let ty = builder.add_type(FunctionType {
            params: vec![ValueType::I32],
            results: vec![ValueType::I32],
        });
        builder.add_function(
            ty,
            FunctionBody {
                locals: vec![],
                body: vec![
                    Instr::LocalGet { local_idx: 0 },
                    Instr::I32Const { value: 2 },
                    Instr::I32Mul,
                    Instr::Return,
                    Instr::Unreachable,
                ]
                .into(),
            },
            None,
        );
        builder.add_function(
            ty,
            FunctionBody {
                locals: vec![],
                body: vec![
                    Instr::LocalGet { local_idx: 0 },
                    Instr::Call { func_idx: 0 },
                ]
                .into(),
            },
            Some("double"),
        );
        let module = builder.build();

        let mut store = Store::new();
        let mut engine = Engine::new();
        engine.instantiate(&mut store, &module).unwrap();
        let results = engine.invoke(&mut store, "double", vec![Value::I32(21)]).unwrap();
        assert_eq!(results, vec![Value::I32(42)]);
        assert_eq!(engine.stack_depth(), 0);
    }

    #[test]
    fn test_invoke_argument_checking() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.add_type(FunctionType {
            params: vec![ValueType::I32],
            results: vec![ValueType::I32],
        });
        builder.add_function(
            ty,
            FunctionBody {
                locals: vec![],
                body: vec![Instr::LocalGet { local_idx: 0 }].into(),
            },
            Some("id"),
        );
        let module = builder.build();

        let mut store = Store::new();
        let mut engine = Engine::new();
        engine.instantiate(&mut store, &module).unwrap();

        // wrong arity
        assert!(matches!(
            engine.invoke(&mut store, "id", vec![]),
            Err(VmError::CallFunctionError(_))
        ));
        // wrong type
        assert!(matches!(
            engine.invoke(&mut store, "id", vec![Value::I64(1)]),
            Err(VmError::CallFunctionError(_))
        ));
        // unknown export
        assert!(matches!(
            engine.invoke(&mut store, "missing", vec![Value::I32(1)]),
            Err(VmError::FunctionInvalid(_))
        ));
    }

    #[test]
    fn test_stack_is_empty_after_trap() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.add_type(FunctionType {
            params: vec![],
            results: vec![ValueType::I32],
        });
        builder.add_function(
            ty,
            FunctionBody {
                locals: vec![],
                body: vec![
                    Instr::I32Const { value: 1 },
                    Instr::I32Const { value: 2 },
                    Instr::Unreachable,
                ]
                .into(),
            },
            Some("boom"),
        );
        let module = builder.build();

        let mut store = Store::new();
        let mut engine = Engine::new();
        engine.instantiate(&mut store, &module).unwrap();

        assert_eq!(engine.invoke(&mut store, "boom", vec![]), Err(VmError::Unreachable));
        assert_eq!(engine.stack_depth(), 0);
    }
}
