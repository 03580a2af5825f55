//! Test utilities for runtime testing
//!
//! A fluent builder for single-function engine tests and a small module
//! builder for multi-function scenarios, shared by the unit tests across
//! the runtime.

#[cfg(test)]
pub mod test {
    use crate::instruction::{Instr, InstrSeq};
    use crate::module::{
        Export, ExternalKind, FunctionBody, FunctionType, GlobalEntry, GlobalType, Limits, MemoryType,
        Module, ValueType,
    };
    use crate::runtime::{Engine, Store, Value};

    /// Incrementally build a [`Module`] tree for tests.
    #[derive(Default)]
    pub struct ModuleBuilder {
        module: Module,
    }

    impl ModuleBuilder {
        pub fn new() -> Self {
            ModuleBuilder::default()
        }

        pub fn add_type(&mut self, func_type: FunctionType) -> u32 {
            self.module.types.push(func_type);
            (self.module.types.len() - 1) as u32
        }

        /// Add a local function, optionally exported; returns its index in
        /// the function index space (imports first)
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

        pub fn add_global(&mut self, global_type: GlobalType, init: InstrSeq) -> u32 {
            self.module.globals.push(GlobalEntry { global_type, init });
            (self.module.globals.len() - 1) as u32
        }

        pub fn build(&mut self) -> Module {
            std::mem::take(&mut self.module)
        }
    }

    /// Fluent builder running one function body through a fresh engine.
    pub struct EngineTest {
        instructions: Vec<Instr>,
        params: Vec<ValueType>,
        locals: Vec<(u32, ValueType)>,
        args: Vec<Value>,
        globals: Vec<(ValueType, Value, bool)>,
        memory: Option<(u32, Option<u32>)>,
    }

    impl EngineTest {
        pub fn new() -> Self {
            EngineTest {
                instructions: Vec::new(),
                params: Vec::new(),
                locals: Vec::new(),
                args: Vec::new(),
                globals: Vec::new(),
                memory: None,
            }
        }

        pub fn inst(mut self, instr: Instr) -> Self {
            self.instructions.push(instr);
            self
        }

        pub fn param(mut self, value_type: ValueType) -> Self {
            self.params.push(value_type);
            self
        }

        pub fn local(mut self, value_type: ValueType) -> Self {
            self.locals.push((1, value_type));
            self
        }

        pub fn arg(mut self, value: Value) -> Self {
            self.args.push(value);
            self
        }

        pub fn global(mut self, value_type: ValueType, initial: Value, mutable: bool) -> Self {
            self.globals.push((value_type, initial, mutable));
            self
        }

        pub fn with_memory(mut self, min: u32, max: Option<u32>) -> Self {
            self.memory = Some((min, max));
            self
        }

        /// Execute and require the single result to equal `expected`
        pub fn expect_result(self, expected: Value) {
            let results = self.execute(vec![expected.typ()]).expect("execution should succeed");
            assert_eq!(results, vec![expected]);
        }

        /// Execute and require the single result to be bit-identical to
        /// `expected` (distinguishes NaN payloads and zero signs)
        pub fn expect_result_bits(self, expected: Value) {
            let results = self.execute(vec![expected.typ()]).expect("execution should succeed");
            assert_eq!(results.len(), 1);
            assert!(
                results[0].bit_eq(&expected),
                "expected {expected} (bits), got {}",
                results[0]
            );
        }

        /// Execute and require an error whose message contains `needle`
        pub fn expect_error(self, needle: &str) {
            match self.execute(vec![]) {
                Err(e) => {
                    let message = e.to_string();
                    assert!(
                        message.contains(needle),
                        "expected error containing '{needle}', got: '{message}'"
                    );
                }
                Ok(results) => {
                    panic!("expected error containing '{needle}', but execution returned {results:?}")
                }
            }
        }

        fn execute(self, results: Vec<ValueType>) -> Result<Vec<Value>, crate::runtime::VmError> {
            let mut builder = ModuleBuilder::new();
            let type_idx = builder.add_type(FunctionType {
                params: self.params,
                results,
            });
            builder.add_function(
                type_idx,
                FunctionBody {
                    locals: self.locals,
                    body: self.instructions.into(),
                },
                Some("test"),
            );
            if let Some((min, max)) = self.memory {
                builder.add_memory(min, max);
            }
            for (value_type, initial, mutable) in &self.globals {
                builder.add_global(
                    GlobalType {
                        value_type: *value_type,
                        mutable: *mutable,
                    },
                    vec![const_instr(initial)].into(),
                );
            }
            let module = builder.build();

            let mut store = Store::new();
            let mut engine = Engine::new();
            engine
                .instantiate(&mut store, &module)
                .expect("instantiation should succeed");
            engine.invoke(&mut store, "test", self.args)
        }
    }

    /// The `t.const` instruction producing `value`.
    pub fn const_instr(value: &Value) -> Instr {
        match value {
            Value::I32(v) => Instr::I32Const { value: *v },
            Value::I64(v) => Instr::I64Const { value: *v },
            Value::F32(v) => Instr::F32Const { value: *v },
            Value::F64(v) => Instr::F64Const { value: *v },
        }
    }
}
