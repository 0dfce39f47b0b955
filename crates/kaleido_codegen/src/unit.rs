// crates/kaleido_codegen/src/unit.rs
//
// Compilation units. A unit is a named table of function declarations; while
// open it also owns the backend module its functions are compiled into.
// Closing a unit hands that module to an `Engine` and keeps only the table.

use crate::error::CodegenResult;
use cranelift_codegen::ir::{types, AbiParam, Signature};
use cranelift_jit::JITModule;
use cranelift_module::{FuncId, Linkage, Module};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Source-level name, for diagnostics.
    pub name: String,
    /// Legalized backend symbol.
    pub symbol: String,
    pub arity: usize,
    /// Id within the module of the unit holding this declaration.
    pub func_id: FuncId,
    pub has_body: bool,
}

#[derive(Debug)]
pub struct CompilationUnit {
    name: String,
    decls: HashMap<String, Declaration>,
    /// Declaration order, for stable listings.
    order: Vec<String>,
}

impl CompilationUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decls: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaration(&self, symbol: &str) -> Option<&Declaration> {
        self.decls.get(symbol)
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.order.iter().filter_map(|s| self.decls.get(s))
    }

    pub fn defined(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations().filter(|d| d.has_body)
    }
}

/// The unit currently accepting definitions.
pub struct OpenUnit {
    pub unit: CompilationUnit,
    pub module: JITModule,
}

impl OpenUnit {
    pub fn new(unit: CompilationUnit, module: JITModule) -> Self {
        Self { unit, module }
    }

    /// Declares `symbol` with `arity` float parameters. Re-declaring keeps the
    /// existing entry; the backend upgrades an import to an export when the
    /// body arrives.
    pub fn declare(
        &mut self,
        name: &str,
        symbol: &str,
        arity: usize,
        linkage: Linkage,
    ) -> CodegenResult<&Declaration> {
        let sig = float_signature(&self.module, arity);
        let func_id = self.module.declare_function(symbol, linkage, &sig)?;

        if !self.unit.decls.contains_key(symbol) {
            self.unit.order.push(symbol.to_string());
        }
        let decl = self
            .unit
            .decls
            .entry(symbol.to_string())
            .or_insert_with(|| Declaration {
                name: name.to_string(),
                symbol: symbol.to_string(),
                arity,
                func_id,
                has_body: false,
            });
        Ok(decl)
    }

    pub fn mark_defined(&mut self, symbol: &str) {
        if let Some(decl) = self.unit.decls.get_mut(symbol) {
            decl.has_body = true;
        }
    }
}

/// `fn(f64, ..., f64) -> f64` in the host calling convention.
pub fn float_signature(module: &JITModule, arity: usize) -> Signature {
    let mut sig = module.make_signature();
    for _ in 0..arity {
        sig.params.push(AbiParam::new(types::F64));
    }
    sig.returns.push(AbiParam::new(types::F64));
    sig
}
