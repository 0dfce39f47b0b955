// crates/kaleido_codegen/src/engine.rs
//
// Engines: the executable form of finalized compilation units, plus the
// cross-engine symbol resolution that links a unit being finalized against
// everything finalized before it.

use crate::intrinsics;
use cranelift_jit::JITModule;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Symbol lookup installed into every unit's `JITBuilder`.
pub type LookupFn = Box<dyn Fn(&str) -> Option<*const u8> + Send>;

/// Addresses published by finalized units, oldest first.
///
/// Shared between the unit manager and the lookup closures handed to the
/// backend, which must be `Send` and cannot borrow the manager.
#[derive(Debug, Clone, Default)]
pub struct SymbolRegistry {
    engines: Arc<RwLock<Vec<HashMap<String, usize>>>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, symbols: HashMap<String, usize>) {
        self.engines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(symbols);
    }

    /// Resolution chain: finalized engines oldest first, then host intrinsics.
    pub fn resolve(&self, symbol: &str) -> Option<usize> {
        let engines = self.engines.read().unwrap_or_else(PoisonError::into_inner);
        engines
            .iter()
            .find_map(|symbols| symbols.get(symbol).copied())
            .or_else(|| intrinsics::lookup(symbol))
    }

    /// Lookup for the backend to call when compiled code references a symbol
    /// its own unit does not define. A miss is fatal.
    pub fn lookup_fn(&self) -> LookupFn {
        let registry = self.clone();
        Box::new(move |symbol| match registry.resolve(symbol) {
            Some(addr) => Some(addr as *const u8),
            None => fatal_unresolved(symbol),
        })
    }
}

/// Compiled code has already been linked against `symbol`; there is no
/// address to hand back that would not corrupt the call site.
pub fn fatal_unresolved(symbol: &str) -> ! {
    eprintln!("fatal: unresolved external symbol '{}'", symbol);
    std::process::abort()
}

/// A finalized unit. Owns the backend module so its code stays mapped for
/// the rest of the process.
pub struct Engine {
    unit: String,
    symbols: HashMap<String, usize>,
    _module: JITModule,
}

impl Engine {
    pub(crate) fn new(unit: String, module: JITModule, symbols: HashMap<String, usize>) -> Self {
        Self {
            unit,
            symbols,
            _module: module,
        }
    }

    /// Name of the unit this engine was built from.
    pub fn unit_name(&self) -> &str {
        &self.unit
    }

    pub fn address(&self, symbol: &str) -> Option<*const u8> {
        self.symbols.get(symbol).map(|addr| *addr as *const u8)
    }

    pub fn defines(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("unit", &self.unit)
            .field("symbols", &self.symbols.len())
            .finish()
    }
}
