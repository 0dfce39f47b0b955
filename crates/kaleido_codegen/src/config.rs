// crates/kaleido_codegen/src/config.rs
//
// Knobs for the JIT backend. Filled in by the driver from the command line.

/// Cranelift optimization level applied to every function of every unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    None,
    #[default]
    Speed,
    SpeedAndSize,
}

impl OptLevel {
    /// Value of Cranelift's `opt_level` setting.
    pub fn as_setting(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JitConfig {
    pub opt_level: OptLevel,
    /// Write each function's Cranelift IR to stderr before it is compiled.
    pub print_ir: bool,
    /// Report unit and engine lifecycle events on stderr.
    pub verbose: bool,
}
