// crates/kaleido_frontend/src/parser.rs
//
// Recursive-descent parser with precedence climbing for binary operators.
// Holds exactly one token of lookahead; each parse_* method leaves the
// lookahead on the first token after the construct it consumed.

use crate::ast::*;
use crate::lexer::{Keyword, Lexer, Token};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    /// The offending token was end of input, i.e. the construct is incomplete
    /// rather than malformed.
    pub at_eof: bool,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

// ─────────────────────────────────────────────────────────────────────────────
// Operator precedence
// ─────────────────────────────────────────────────────────────────────────────

/// Binary operator precedences. Higher binds tighter.
///
/// The default table ranks `-` above `+`, so `1 + 2 - 3` groups as
/// `1 + (2 - 3)`. Existing programs depend on this grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecedenceTable {
    ops: HashMap<char, i32>,
}

impl Default for PrecedenceTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.install('<', 10);
        table.install('+', 20);
        table.install('-', 30);
        table.install('*', 40);
        table
    }
}

impl PrecedenceTable {
    pub fn empty() -> Self {
        Self {
            ops: HashMap::new(),
        }
    }

    /// Registers `op` as a binary operator, replacing any earlier precedence.
    pub fn install(&mut self, op: char, precedence: i32) {
        self.ops.insert(op, precedence);
    }

    pub fn get(&self, op: char) -> Option<i32> {
        self.ops.get(&op).copied()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser
// ─────────────────────────────────────────────────────────────────────────────

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: Spanned<Token>,
    /// End offset of the last consumed token.
    prev_end: u32,
    precedence: PrecedenceTable,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self::with_precedence(src, PrecedenceTable::default())
    }

    pub fn with_precedence(src: &'a str, precedence: PrecedenceTable) -> Self {
        let mut lexer = Lexer::new(src);
        let cur = lexer.next_token();
        Self {
            lexer,
            cur,
            prev_end: 0,
            precedence,
        }
    }

    pub fn precedence_mut(&mut self) -> &mut PrecedenceTable {
        &mut self.precedence
    }

    /// The lookahead token.
    pub fn peek(&self) -> &Spanned<Token> {
        &self.cur
    }

    pub fn at_eof(&self) -> bool {
        matches!(self.cur.node, Token::Eof)
    }

    /// Consumes any run of `;` statement separators.
    pub fn skip_separators(&mut self) {
        while self.peek_is_char(';') {
            self.bump();
        }
    }

    /// Resynchronizes after a parse error by discarding the lookahead token.
    pub fn recover(&mut self) {
        if !self.at_eof() {
            self.bump();
        }
    }

    /// Parses one `def`, `extern` or bare expression.
    pub fn parse_top_level(&mut self) -> Result<Spanned<TopLevel>, ParseError> {
        let start = self.cur.span.start;
        let item = match self.cur.node {
            Token::Keyword(Keyword::Def) => TopLevel::Definition(self.parse_definition()?),
            Token::Keyword(Keyword::Extern) => TopLevel::Extern(self.parse_extern()?),
            _ => TopLevel::Expression(self.parse_top_level_expr()?),
        };
        Ok(Spanned::new(item, Span::new(start, self.prev_end)))
    }

    /// definition ::= 'def' prototype expression
    pub fn parse_definition(&mut self) -> Result<Function, ParseError> {
        self.expect_kw(Keyword::Def)?;
        let proto = self.parse_prototype()?;
        let body = self.parse_expression()?;
        Ok(Function::new(proto, body))
    }

    /// external ::= 'extern' prototype
    pub fn parse_extern(&mut self) -> Result<Prototype, ParseError> {
        self.expect_kw(Keyword::Extern)?;
        self.parse_prototype()
    }

    /// toplevelexpr ::= expression
    pub fn parse_top_level_expr(&mut self) -> Result<Function, ParseError> {
        let body = self.parse_expression()?;
        Ok(Function::new(Prototype::anonymous(), body))
    }

    /// prototype ::= identifier '(' identifier* ')'
    pub fn parse_prototype(&mut self) -> Result<Prototype, ParseError> {
        let name = match &self.cur.node {
            Token::Ident(name) => name.clone(),
            _ => return Err(self.error("Expected function name in prototype")),
        };
        self.bump();

        self.expect_char('(', "Expected '(' in prototype")?;

        let mut params: Vec<String> = Vec::new();
        while let Token::Ident(param) = &self.cur.node {
            if params.contains(param) {
                return Err(self.error(format!(
                    "Duplicate parameter '{}' in prototype '{}'",
                    param, name
                )));
            }
            params.push(param.clone());
            self.bump();
        }

        self.expect_char(')', "Expected ')' in prototype")?;
        Ok(Prototype::new(name, params))
    }

    // ---- expressions ----

    /// expression ::= primary binoprhs
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_primary()?;
        self.parse_bin_op_rhs(0, lhs)
    }

    /// binoprhs ::= (binop primary)*
    ///
    /// Absorbs operators binding at least as tightly as `min_prec`. When the
    /// operator after the right operand binds tighter than the current one,
    /// that operand becomes the left side of a recursive parse.
    fn parse_bin_op_rhs(&mut self, min_prec: i32, mut lhs: Expr) -> Result<Expr, ParseError> {
        loop {
            let (op, prec) = match self.current_binop() {
                Some((op, prec)) if prec >= min_prec => (op, prec),
                _ => return Ok(lhs),
            };
            self.bump();

            let mut rhs = self.parse_primary()?;
            if let Some((_, next_prec)) = self.current_binop() {
                if prec < next_prec {
                    rhs = self.parse_bin_op_rhs(prec + 1, rhs)?;
                }
            }

            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    /// primary ::= number | identifierexpr | parenexpr
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match &self.cur.node {
            Token::Number(value) => {
                let value = *value;
                self.bump();
                Ok(Expr::Number(value))
            }
            Token::Ident(_) => self.parse_identifier_expr(),
            Token::Char('(') => self.parse_paren_expr(),
            _ => Err(self.error("Expected expression")),
        }
    }

    /// identifierexpr ::= identifier | identifier '(' (expression (',' expression)*)? ')'
    fn parse_identifier_expr(&mut self) -> Result<Expr, ParseError> {
        let name = match &self.cur.node {
            Token::Ident(name) => name.clone(),
            _ => return Err(self.error("Expected identifier")),
        };
        self.bump();

        if !self.peek_is_char('(') {
            return Ok(Expr::Variable(name));
        }
        self.bump();

        let mut args = Vec::new();
        if !self.peek_is_char(')') {
            loop {
                args.push(self.parse_expression()?);
                if self.peek_is_char(')') {
                    break;
                }
                if !self.peek_is_char(',') {
                    return Err(self.error("Expected ')' or ',' in argument list"));
                }
                self.bump();
            }
        }
        self.bump();

        Ok(Expr::Call { callee: name, args })
    }

    /// parenexpr ::= '(' expression ')'
    fn parse_paren_expr(&mut self) -> Result<Expr, ParseError> {
        self.expect_char('(', "Expected '('")?;
        let inner = self.parse_expression()?;
        self.expect_char(')', "Expected ')'")?;
        Ok(inner)
    }

    // ---- token utils ----

    fn bump(&mut self) {
        self.prev_end = self.cur.span.end;
        self.cur = self.lexer.next_token();
    }

    fn current_binop(&self) -> Option<(char, i32)> {
        match self.cur.node {
            Token::Char(c) => self.precedence.get(c).map(|p| (c, p)),
            _ => None,
        }
    }

    fn peek_is_char(&self, want: char) -> bool {
        matches!(self.cur.node, Token::Char(c) if c == want)
    }

    fn expect_char(&mut self, want: char, message: &str) -> Result<(), ParseError> {
        if self.peek_is_char(want) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn expect_kw(&mut self, want: Keyword) -> Result<(), ParseError> {
        match &self.cur.node {
            Token::Keyword(k) if *k == want => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error(format!("Expected keyword {:?}", want))),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            span: self.cur.span,
            at_eof: self.at_eof(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(src: &str) -> String {
        Parser::new(src).parse_expression().unwrap().to_string()
    }

    fn top(src: &str) -> TopLevel {
        Parser::new(src).parse_top_level().unwrap().node
    }

    #[test]
    fn multiplication_binds_tighter_than_subtraction() {
        assert_eq!(expr("1 - 2 * 3"), "(1 - (2 * 3))");
    }

    #[test]
    fn subtraction_binds_tighter_than_addition() {
        assert_eq!(expr("1 + 2 - 3"), "(1 + (2 - 3))");
        assert_eq!(expr("1 - 2 + 3"), "((1 - 2) + 3)");
    }

    #[test]
    fn equal_precedence_is_left_associative() {
        assert_eq!(expr("1 - 2 - 3"), "((1 - 2) - 3)");
        assert_eq!(expr("1 + 2 + 3"), "((1 + 2) + 3)");
        assert_eq!(expr("a * b * c"), "((a * b) * c)");
    }

    #[test]
    fn comparison_binds_loosest() {
        assert_eq!(expr("a + 1 < b * 2"), "((a + 1) < (b * 2))");
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(expr("(1 + 2) * 3"), "((1 + 2) * 3)");
    }

    #[test]
    fn calls_take_comma_separated_arguments() {
        assert_eq!(expr("foo(1, x + 2, bar())"), "foo(1, (x + 2), bar())");
    }

    #[test]
    fn unknown_operator_ends_the_expression() {
        let mut p = Parser::new("4 / 2");
        assert_eq!(p.parse_expression().unwrap(), Expr::Number(4.0));
        assert_eq!(p.peek().node, Token::Char('/'));
    }

    #[test]
    fn installed_operator_participates_in_climbing() {
        let mut table = PrecedenceTable::default();
        table.install('/', 40);
        let e = Parser::with_precedence("1 + 6 / 3", table)
            .parse_expression()
            .unwrap();
        assert_eq!(e.to_string(), "(1 + (6 / 3))");
    }

    #[test]
    fn definition() {
        let TopLevel::Definition(f) = top("def foo(x y) x + y") else {
            panic!("expected definition");
        };
        assert_eq!(f.proto, Prototype::new("foo", vec!["x".into(), "y".into()]));
        assert_eq!(f.body.to_string(), "(x + y)");
    }

    #[test]
    fn extern_has_no_body() {
        assert_eq!(
            top("extern sin(a)"),
            TopLevel::Extern(Prototype::new("sin", vec!["a".into()]))
        );
    }

    #[test]
    fn bare_expression_is_wrapped_anonymously() {
        let TopLevel::Expression(f) = top("3 + 4 * 5") else {
            panic!("expected expression");
        };
        assert!(f.proto.is_anonymous());
        assert_eq!(f.body.to_string(), "(3 + (4 * 5))");
    }

    #[test]
    fn lookahead_rests_on_following_token() {
        let mut p = Parser::new("def f(x) x; 1");
        p.parse_top_level().unwrap();
        assert_eq!(p.peek().node, Token::Char(';'));
        p.skip_separators();
        assert_eq!(p.peek().node, Token::Number(1.0));
    }

    #[test]
    fn prototype_errors_name_the_expected_token() {
        let err = Parser::new("def (x) x").parse_top_level().unwrap_err();
        assert_eq!(err.message, "Expected function name in prototype");

        let err = Parser::new("def f x").parse_top_level().unwrap_err();
        assert_eq!(err.message, "Expected '(' in prototype");

        let err = Parser::new("extern f(x, y)").parse_top_level().unwrap_err();
        assert_eq!(err.message, "Expected ')' in prototype");
        assert_eq!(err.span, Span::new(10, 11));
    }

    #[test]
    fn duplicate_parameters_are_rejected() {
        let err = Parser::new("def f(x x) x").parse_top_level().unwrap_err();
        assert_eq!(err.message, "Duplicate parameter 'x' in prototype 'f'");
    }

    #[test]
    fn argument_list_errors() {
        let err = Parser::new("foo(1 2)").parse_top_level().unwrap_err();
        assert_eq!(err.message, "Expected ')' or ',' in argument list");
    }

    #[test]
    fn incomplete_input_is_flagged() {
        let err = Parser::new("def foo(x) x +").parse_top_level().unwrap_err();
        assert!(err.at_eof);

        let err = Parser::new("def foo(x) ) x").parse_top_level().unwrap_err();
        assert!(!err.at_eof);
    }

    #[test]
    fn recover_skips_the_offending_token() {
        let mut p = Parser::new(") 7");
        let err = p.parse_top_level().unwrap_err();
        assert_eq!(err.message, "Expected expression");
        p.recover();
        let TopLevel::Expression(f) = p.parse_top_level().unwrap().node else {
            panic!("expected expression");
        };
        assert_eq!(f.body, Expr::Number(7.0));
    }

    #[test]
    fn top_level_span_covers_the_construct() {
        let mut p = Parser::new("  extern f(a) ; 2");
        assert_eq!(p.parse_top_level().unwrap().span, Span::new(2, 13));
    }

    #[test]
    fn error_display_includes_span() {
        let err = Parser::new("  )").parse_top_level().unwrap_err();
        assert_eq!(err.to_string(), "Expected expression at 2..3");
    }
}
