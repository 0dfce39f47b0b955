// crates/kaleido_codegen/src/manager.rs
//
// The unit manager: owns the open unit, the closed units and their engines,
// and decides when a unit is finalized.
//
// Lifecycle of a unit:
//   (none open) --first declaration--> Open --finalize--> Closed + Engine
//
// A unit is finalized when an address is needed for one of its functions and
// no engine provides it yet, or when forced via `finalize_open_unit`. The
// next declaration after that opens a fresh unit.

use crate::config::JitConfig;
use crate::engine::{Engine, SymbolRegistry};
use crate::error::{CodegenError, CodegenResult};
use crate::names::{self, NameLegalizer};
use crate::unit::{CompilationUnit, Declaration, OpenUnit};
use crate::CompiledFunction;
use anyhow::{anyhow, Result};
use cranelift_codegen::isa::{self, OwnedTargetIsa};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{default_libcall_names, Linkage};
use kaleido_frontend::Prototype;
use std::collections::HashMap;
use target_lexicon::Triple;

pub struct UnitManager {
    config: JitConfig,
    isa: OwnedTargetIsa,
    registry: SymbolRegistry,
    names: NameLegalizer,
    open: Option<OpenUnit>,
    /// Closed units, oldest first. Append-only.
    units: Vec<CompilationUnit>,
    /// One engine per closed unit, in the same order. Append-only.
    engines: Vec<Engine>,
    next_unit: usize,
}

impl UnitManager {
    pub fn new(config: JitConfig) -> Result<Self> {
        let isa = host_isa(&config)?;
        Ok(Self {
            config,
            isa,
            registry: SymbolRegistry::new(),
            names: NameLegalizer::new(),
            open: None,
            units: Vec::new(),
            engines: Vec::new(),
            next_unit: 0,
        })
    }

    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    /// Backend symbol for a source name; empty names get a fresh anonymous one.
    pub fn symbol_for(&mut self, name: &str) -> String {
        self.names.symbol_for(name)
    }

    pub fn open_unit_name(&self) -> Option<&str> {
        self.open.as_ref().map(|o| o.unit.name())
    }

    /// Closed units plus the open one, if any.
    pub fn unit_count(&self) -> usize {
        self.units.len() + usize::from(self.open.is_some())
    }

    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    pub fn engines(&self) -> &[Engine] {
        &self.engines
    }

    pub fn closed_units(&self) -> &[CompilationUnit] {
        &self.units
    }

    /// The open unit, opening a new one if necessary.
    pub fn open_unit(&mut self) -> &mut OpenUnit {
        let Self {
            config,
            isa,
            registry,
            open,
            next_unit,
            ..
        } = self;

        open.get_or_insert_with(|| {
            let name = format!("unit_{}", next_unit);
            *next_unit += 1;

            let mut builder = JITBuilder::with_isa(isa.clone(), default_libcall_names());
            builder.symbol_lookup_fn(registry.lookup_fn());
            let module = JITModule::new(builder);

            if config.verbose {
                eprintln!("[jit] opened {}", name);
            }
            OpenUnit::new(CompilationUnit::new(name), module)
        })
    }

    /// Looks `symbol` up in the open unit, then in closed units oldest first.
    ///
    /// A hit in a closed unit is mirrored into the open unit as a forwarding
    /// declaration, so the returned declaration is always usable from the
    /// open unit's module.
    pub fn find_declaration(&mut self, symbol: &str) -> CodegenResult<Option<Declaration>> {
        if let Some(decl) = self
            .open
            .as_ref()
            .and_then(|o| o.unit.declaration(symbol))
        {
            return Ok(Some(decl.clone()));
        }

        let Some(found) = self.closed_declaration(symbol).cloned() else {
            return Ok(None);
        };

        let forward = self
            .open_unit()
            .declare(&found.name, symbol, found.arity, Linkage::Import)?
            .clone();
        Ok(Some(forward))
    }

    fn closed_declaration(&self, symbol: &str) -> Option<&Declaration> {
        self.units.iter().find_map(|u| u.declaration(symbol))
    }

    /// Checks that a body for `symbol` with `arity` parameters may be added to
    /// the open unit. Existing declarations anywhere must agree on arity, and
    /// no unit may already hold a body.
    pub fn check_definition(&self, name: &str, symbol: &str, arity: usize) -> CodegenResult<()> {
        let open = self.open.as_ref().and_then(|o| o.unit.declaration(symbol));
        let closed = self.units.iter().filter_map(|u| u.declaration(symbol));

        for decl in open.into_iter().chain(closed) {
            if decl.has_body {
                return Err(CodegenError::DuplicateDefinition(name.to_string()));
            }
            if decl.arity != arity {
                return Err(CodegenError::ArityMismatch {
                    name: name.to_string(),
                    expected: decl.arity,
                    found: arity,
                });
            }
        }
        Ok(())
    }

    /// Handles `extern name(params)`. Compatible with any earlier declaration
    /// or definition of the same arity; a no-op when one exists.
    pub fn declare_extern(&mut self, proto: &Prototype) -> CodegenResult<Declaration> {
        let symbol = names::legalize(&proto.name);
        let arity = proto.arity();

        let existing = self
            .open
            .as_ref()
            .and_then(|o| o.unit.declaration(&symbol))
            .or_else(|| self.closed_declaration(&symbol))
            .cloned();

        match existing {
            Some(decl) if decl.arity != arity => Err(CodegenError::ArityMismatch {
                name: proto.name.clone(),
                expected: decl.arity,
                found: arity,
            }),
            Some(decl) => Ok(decl),
            None => Ok(self
                .open_unit()
                .declare(&proto.name, &symbol, arity, Linkage::Import)?
                .clone()),
        }
    }

    /// Closes the open unit and builds its engine. Externals are resolved
    /// here; one that resolves nowhere aborts the process.
    ///
    /// Returns the index of the new engine, or `None` if no unit was open.
    pub fn finalize_open_unit(&mut self) -> CodegenResult<Option<usize>> {
        let Some(OpenUnit { unit, mut module }) = self.open.take() else {
            return Ok(None);
        };

        module.finalize_definitions()?;

        let symbols: HashMap<String, usize> = unit
            .defined()
            .map(|d| {
                let addr = module.get_finalized_function(d.func_id) as usize;
                (d.symbol.clone(), addr)
            })
            .collect();
        self.registry.publish(symbols.clone());

        if self.config.verbose {
            eprintln!(
                "[jit] finalized {} ({} function(s)); {} engine(s)",
                unit.name(),
                symbols.len(),
                self.engines.len() + 1
            );
        }

        self.engines
            .push(Engine::new(unit.name().to_string(), module, symbols));
        self.units.push(unit);
        Ok(Some(self.engines.len() - 1))
    }

    fn engine_address(&self, symbol: &str) -> Option<*const u8> {
        self.engines.iter().find_map(|e| e.address(symbol))
    }

    /// Executable address of `symbol`, finalizing the open unit if that is
    /// where its body lives.
    pub fn get_address(&mut self, symbol: &str) -> CodegenResult<*const u8> {
        if let Some(addr) = self.engine_address(symbol) {
            return Ok(addr);
        }

        let defined_in_open = self
            .open
            .as_ref()
            .and_then(|o| o.unit.declaration(symbol))
            .is_some_and(|d| d.has_body);
        if defined_in_open {
            self.finalize_open_unit()?;
            if let Some(addr) = self.engine_address(symbol) {
                return Ok(addr);
            }
        }

        Err(CodegenError::UnknownSymbol(symbol.to_string()))
    }

    /// Runs a compiled zero-argument function and returns its result.
    pub fn run(&mut self, function: &CompiledFunction) -> CodegenResult<f64> {
        if function.arity != 0 {
            return Err(CodegenError::ArityMismatch {
                name: function.name.clone(),
                expected: function.arity,
                found: 0,
            });
        }

        let addr = self.get_address(&function.symbol)?;
        // SAFETY: `addr` is the entry of a finalized function declared with
        // `float_signature(_, 0)` in the host calling convention, and its
        // engine is kept alive by `self`.
        let code: extern "C" fn() -> f64 = unsafe { std::mem::transmute(addr) };
        Ok(code())
    }
}

/// Host ISA with the flags the JIT needs and the configured optimization level.
fn host_isa(config: &JitConfig) -> Result<OwnedTargetIsa> {
    let mut flags = settings::builder();
    flags
        .set("use_colocated_libcalls", "false")
        .map_err(|e| anyhow!("failed to set use_colocated_libcalls: {}", e))?;
    flags
        .set("is_pic", "false")
        .map_err(|e| anyhow!("failed to set is_pic: {}", e))?;
    flags
        .set("opt_level", config.opt_level.as_setting())
        .map_err(|e| anyhow!("failed to set opt_level: {}", e))?;

    let triple = Triple::host();
    let isa = isa::lookup(triple.clone())
        .map_err(|e| anyhow!("failed to lookup ISA for {}: {}", triple, e))?
        .finish(settings::Flags::new(flags))
        .map_err(|e| anyhow!("failed to build ISA for {}: {}", triple, e))?;
    Ok(isa)
}
