// crates/kaleido_codegen/src/names.rs
//
// Mapping from source identifiers to backend symbol names.
//
// Symbols are limited to [A-Za-z0-9_] and never start with a digit. A leading
// digit gets a `_` prefix and any other character is spelled as `_<code>_`.
// Source identifiers cannot contain `_`, so escaped names and the generated
// `anon_func_<n>` names never collide with a legalized identifier.

use std::fmt::Write;

pub fn legalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if i == 0 && c.is_ascii_digit() {
                out.push('_');
            }
            out.push(c);
        } else {
            let _ = write!(out, "_{}_", c as u32);
        }
    }
    out
}

/// Hands out symbol names, inventing fresh ones for anonymous functions.
#[derive(Debug, Default)]
pub struct NameLegalizer {
    next_anon: usize,
}

impl NameLegalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol_for(&mut self, name: &str) -> String {
        if name.is_empty() {
            self.fresh_anonymous()
        } else {
            legalize(name)
        }
    }

    pub fn fresh_anonymous(&mut self) -> String {
        let n = self.next_anon;
        self.next_anon += 1;
        format!("anon_func_{}", n)
    }
}
