// crates/kaleido_codegen/src/intrinsics.rs
//
// Host functions callable from compiled code once declared with `extern`.
// They are consulted after every finalized unit, so a user definition with
// the same name takes precedence.

use std::io::Write;

/// Writes the byte `x` to stdout.
pub extern "C" fn putchard(x: f64) -> f64 {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(&[x as u8]);
    let _ = out.flush();
    0.0
}

/// Prints `x` on its own line.
pub extern "C" fn printd(x: f64) -> f64 {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{}", x);
    let _ = out.flush();
    0.0
}

extern "C" fn sin(x: f64) -> f64 {
    x.sin()
}

extern "C" fn cos(x: f64) -> f64 {
    x.cos()
}

extern "C" fn sqrt(x: f64) -> f64 {
    x.sqrt()
}

extern "C" fn exp(x: f64) -> f64 {
    x.exp()
}

extern "C" fn log(x: f64) -> f64 {
    x.ln()
}

extern "C" fn fabs(x: f64) -> f64 {
    x.abs()
}

type Unary = extern "C" fn(f64) -> f64;

const INTRINSICS: &[(&str, Unary)] = &[
    ("putchard", putchard as Unary),
    ("printd", printd as Unary),
    ("sin", sin as Unary),
    ("cos", cos as Unary),
    ("sqrt", sqrt as Unary),
    ("exp", exp as Unary),
    ("log", log as Unary),
    ("fabs", fabs as Unary),
];

pub fn lookup(symbol: &str) -> Option<usize> {
    INTRINSICS
        .iter()
        .find(|(name, _)| *name == symbol)
        .map(|(_, f)| *f as usize)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    INTRINSICS.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_intrinsic_resolves() {
        for name in names() {
            assert!(lookup(name).is_some(), "{} should resolve", name);
        }
        assert_eq!(lookup("nope"), None);
    }

    #[test]
    fn output_intrinsics_return_zero() {
        assert_eq!(putchard(10.0), 0.0);
        assert_eq!(printd(1.5), 0.0);
    }
}
