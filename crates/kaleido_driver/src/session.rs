// crates/kaleido_driver/src/session.rs
//
// One read-compile-execute session: every statement goes through the same
// unit manager, so definitions persist across lines and scripts.

use anyhow::Result;
use kaleido_codegen::{Codegen, CodegenError, JitConfig, UnitManager};
use kaleido_frontend::{ParseError, Parser, PrecedenceTable, TopLevel};
use std::fmt;

/// What a successfully handled statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Defined(String),
    Declared(String),
    Evaluated(f64),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Defined(name) => write!(f, "Defined {}", name),
            Reply::Declared(name) => write!(f, "Declared extern {}", name),
            Reply::Evaluated(value) => write!(f, "Evaluated to {}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementError {
    Parse(ParseError),
    Codegen(CodegenError),
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementError::Parse(e) => write!(f, "{}", e),
            StatementError::Codegen(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StatementError {}

impl From<ParseError> for StatementError {
    fn from(e: ParseError) -> Self {
        StatementError::Parse(e)
    }
}

impl From<CodegenError> for StatementError {
    fn from(e: CodegenError) -> Self {
        StatementError::Codegen(e)
    }
}

/// Counts for a processed chunk of source.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub statements: usize,
    pub errors: usize,
}

pub struct Session {
    units: UnitManager,
    codegen: Codegen,
    precedence: PrecedenceTable,
    verbose: bool,
}

impl Session {
    pub fn new(config: JitConfig) -> Result<Self> {
        let verbose = config.verbose;
        Ok(Self {
            units: UnitManager::new(config)?,
            codegen: Codegen::new(),
            precedence: PrecedenceTable::default(),
            verbose,
        })
    }

    pub fn precedence(&self) -> &PrecedenceTable {
        &self.precedence
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn units(&self) -> &UnitManager {
        &self.units
    }

    /// Compiles one parsed statement and, for a bare expression, runs it.
    pub fn handle(&mut self, item: TopLevel) -> Result<Reply, StatementError> {
        match item {
            TopLevel::Definition(func) => {
                let compiled = self.codegen.generate(&func, &mut self.units)?;
                Ok(Reply::Defined(compiled.name))
            }
            TopLevel::Extern(proto) => {
                self.units.declare_extern(&proto)?;
                Ok(Reply::Declared(proto.name))
            }
            TopLevel::Expression(func) => {
                let compiled = self.codegen.generate(&func, &mut self.units)?;
                Ok(Reply::Evaluated(self.units.run(&compiled)?))
            }
        }
    }

    /// Runs every statement in `src`, reporting as it goes. Errors are
    /// printed and skipped; a parse error drops one token and resumes.
    pub fn run_source(&mut self, src: &str) -> Summary {
        let mut parser = Parser::with_precedence(src, self.precedence.clone());
        let mut summary = Summary::default();

        loop {
            parser.skip_separators();
            if parser.at_eof() {
                return summary;
            }
            summary.statements += 1;

            let outcome = parser
                .parse_top_level()
                .map_err(StatementError::from)
                .and_then(|item| self.handle(item.node));

            match outcome {
                Ok(reply) => self.report(&reply),
                Err(e) => {
                    summary.errors += 1;
                    eprintln!("error: {}", e);
                    if matches!(e, StatementError::Parse(_)) {
                        parser.recover();
                    }
                }
            }
        }
    }

    fn report(&self, reply: &Reply) {
        match reply {
            Reply::Evaluated(_) => println!("{}", reply),
            Reply::Defined(_) | Reply::Declared(_) if self.verbose => eprintln!("{}", reply),
            _ => {}
        }
    }
}

/// Whether `src` stops in the middle of a statement, so an interactive
/// reader should ask for another line before running it.
pub fn is_incomplete(src: &str, precedence: &PrecedenceTable) -> bool {
    let mut parser = Parser::with_precedence(src, precedence.clone());
    loop {
        parser.skip_separators();
        if parser.at_eof() {
            return false;
        }
        match parser.parse_top_level() {
            Ok(_) => {}
            Err(e) => return e.at_eof,
        }
    }
}
