// crates/kaleido_codegen/src/error.rs
//
// Recoverable code generation errors. A failing statement is dropped and the
// session continues; units and engines built before it are untouched.
//
// Unresolvable externals at link time are not represented here: see
// `engine::fatal_unresolved`.

use cranelift_module::ModuleError;
use std::fmt;

pub type CodegenResult<T> = Result<T, CodegenError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    UnknownVariable(String),
    UnknownFunction(String),
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    InvalidOperator(char),
    DuplicateDefinition(String),
    /// An address was requested for a symbol no unit ever defined.
    UnknownSymbol(String),
    Verifier {
        function: String,
        message: String,
    },
    Backend(String),
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenError::UnknownVariable(name) => write!(f, "unknown variable name '{}'", name),
            CodegenError::UnknownFunction(name) => {
                write!(f, "unknown function referenced: '{}'", name)
            }
            CodegenError::ArityMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "arity mismatch for '{}': expected {} argument(s), found {}",
                name, expected, found
            ),
            CodegenError::InvalidOperator(op) => write!(f, "invalid binary operator '{}'", op),
            CodegenError::DuplicateDefinition(name) => {
                write!(f, "function '{}' cannot be redefined", name)
            }
            CodegenError::UnknownSymbol(symbol) => {
                write!(f, "symbol '{}' was never compiled", symbol)
            }
            CodegenError::Verifier { function, message } => write!(
                f,
                "generated code for '{}' failed verification: {}",
                function, message
            ),
            CodegenError::Backend(msg) => write!(f, "backend error: {}", msg),
        }
    }
}

impl std::error::Error for CodegenError {}

impl From<ModuleError> for CodegenError {
    fn from(e: ModuleError) -> Self {
        CodegenError::Backend(e.to_string())
    }
}
