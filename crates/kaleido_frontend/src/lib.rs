// crates/kaleido_frontend/src/lib.rs
// Frontend: tokenizing + parsing Kaleido source into AST

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{Expr, Function, Prototype, Span, Spanned, TopLevel};
pub use lexer::{Keyword, Lexer, Token};
pub use parser::{ParseError, Parser, PrecedenceTable};

/// Parses every top-level item in `src`, skipping `;` separators.
/// Stops at the first error.
pub fn parse_source(src: &str) -> Result<Vec<Spanned<TopLevel>>, ParseError> {
    let mut parser = Parser::new(src);
    let mut items = Vec::new();
    loop {
        parser.skip_separators();
        if parser.at_eof() {
            return Ok(items);
        }
        items.push(parser.parse_top_level()?);
    }
}
