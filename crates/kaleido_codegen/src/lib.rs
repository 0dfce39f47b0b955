// crates/kaleido_codegen/src/lib.rs
//
// Incremental JIT for Kaleido.
//
// Functions are compiled one at a time into the open compilation unit. When
// the address of a function in the open unit is needed, the unit is
// finalized into an executable engine and a fresh unit is opened on the next
// declaration. Calls across units resolve by symbol name at finalization,
// searching engines oldest first and then the host intrinsics.
//
// Backend: Cranelift -> JIT module per unit.

pub mod codegen;
pub mod config;
pub mod engine;
pub mod error;
pub mod intrinsics;
pub mod manager;
pub mod names;
pub mod unit;

pub use codegen::{Codegen, CompiledFunction};
pub use config::{JitConfig, OptLevel};
pub use engine::Engine;
pub use error::{CodegenError, CodegenResult};
pub use manager::UnitManager;
pub use unit::{CompilationUnit, Declaration};
