//! The instruction provider
//!
//! Models the nesting of currently executing instruction sequences as an
//! explicit stack of scopes instead of host recursion, so deeply nested
//! wasm control flow cannot overflow the host stack and the run loop can
//! meter every step.
//!
//! Each scope is a cursor over a shared instruction sequence, tagged with
//! what created it: a bare expression (initialisers), a block body, or a
//! function call marker.

use crate::instruction::{Instr, InstrSeq};

/// What pushed a scope; decides the action when the scope runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// A constant expression being evaluated outside any function body.
    Expression,
    /// The body of a `block`, `loop`, `if` arm, or function.
    Block,
    /// Marker under a function's body; exhausting it leaves the function.
    FunctionCall,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    seq: InstrSeq,
    pc: usize,
}

/// The scope stack the run loop drives.
#[derive(Debug, Default)]
pub struct InstrProvider {
    scopes: Vec<Scope>,
}

impl InstrProvider {
    pub fn new() -> Self {
        InstrProvider::default()
    }

    /// Push a scope whose cursor starts at the beginning of `seq`
    pub fn push_scope(&mut self, kind: ScopeKind, seq: InstrSeq) {
        self.scopes.push(Scope { kind, seq, pc: 0 });
    }

    /// Push an empty `FunctionCall` marker scope
    pub fn push_call_marker(&mut self) {
        self.push_scope(ScopeKind::FunctionCall, Vec::new().into());
    }

    /// Remove the top scope
    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Number of live scopes
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Kind of the top scope
    pub fn top_kind(&self) -> Option<ScopeKind> {
        self.scopes.last().map(|scope| scope.kind)
    }

    /// Fetch the next instruction of the top scope and advance its cursor
    ///
    /// `None` means the top scope is exhausted (or no scope is live); the
    /// caller then leaves the corresponding construct and pops the scope.
    pub fn fetch(&mut self) -> Option<Instr> {
        let scope = self.scopes.last_mut()?;
        let instr = scope.seq.get(scope.pc)?.clone();
        scope.pc += 1;
        Some(instr)
    }

    /// Drop every scope; used when unwinding after a trap
    pub fn reset(&mut self) {
        self.scopes.clear();
    }
}
