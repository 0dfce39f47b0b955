// crates/kaleido_driver/src/main.rs

mod repl;
mod session;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kaleido_codegen::{JitConfig, OptLevel};
use repl::Repl;
use session::{Session, Summary};
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "kaleido")]
#[command(version)]
#[command(about = "Kaleido expression language with an incremental JIT")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Backend optimization level
    #[arg(long, value_enum, default_value_t = OptLevelArg::Speed, global = true)]
    opt_level: OptLevelArg,

    /// Print each function's Cranelift IR to stderr before compiling it
    #[arg(long, global = true)]
    print_ir: bool,

    /// Report definitions and unit/engine lifecycle on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive session (the default). Reads a script from stdin when it
    /// is not a terminal.
    Repl,
    /// Run a script file
    Run { file: PathBuf },
    /// Print the parsed top-level items of a file as JSON
    Ast { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum OptLevelArg {
    None,
    Speed,
    SpeedAndSize,
}

impl From<OptLevelArg> for OptLevel {
    fn from(arg: OptLevelArg) -> Self {
        match arg {
            OptLevelArg::None => OptLevel::None,
            OptLevelArg::Speed => OptLevel::Speed,
            OptLevelArg::SpeedAndSize => OptLevel::SpeedAndSize,
        }
    }
}

impl Cli {
    fn jit_config(&self) -> JitConfig {
        JitConfig {
            opt_level: self.opt_level.into(),
            print_ir: self.print_ir,
            verbose: self.verbose,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli.jit_config();

    match cli.command.unwrap_or(Command::Repl) {
        Command::Repl => {
            let mut session = Session::new(config)?;
            if io::stdin().is_terminal() {
                Repl::new()?.run(&mut session)?;
                Ok(ExitCode::SUCCESS)
            } else {
                let mut src = String::new();
                io::stdin()
                    .read_to_string(&mut src)
                    .context("failed to read stdin")?;
                let summary = session.run_source(&src);
                Ok(script_status(&session, summary))
            }
        }
        Command::Run { file } => {
            let src = read_source(&file)?;
            let mut session = Session::new(config)?;
            let summary = session.run_source(&src);
            Ok(script_status(&session, summary))
        }
        Command::Ast { file } => {
            let src = read_source(&file)?;
            dump_ast(&src)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// A script that hit any error exits non-zero, after running to the end.
fn script_status(session: &Session, summary: Summary) -> ExitCode {
    if session.verbose() {
        let units = session.units();
        eprintln!(
            "[jit] {} statement(s), {} error(s); {} unit(s), {} engine(s)",
            summary.statements,
            summary.errors,
            units.unit_count(),
            units.engine_count()
        );
    }
    if summary.errors == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn dump_ast(src: &str) -> Result<()> {
    let items = match kaleido_frontend::parse_source(src) {
        Ok(items) => items,
        Err(e) => bail!("parse error: {}", e),
    };
    for item in &items {
        let json = serde_json::to_string(item).context("failed to serialize AST")?;
        println!("{}", json);
    }
    Ok(())
}
