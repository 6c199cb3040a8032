//! Numeric cell formatting
//!
//! Reals are written fixed-point with six decimals and then trimmed of
//! trailing zeros, so `2.0` becomes `2` and `1/3` becomes `0.333333`.
//! NaN is written as an empty cell.

use std::fmt::Write;

/// Digits after the decimal point before trimming
pub const DECIMALS: usize = 6;

/// Append the text of `value` to `out`
pub fn write_real(out: &mut String, value: f64) {
    if value.is_nan() {
        return;
    }
    if value.is_infinite() {
        out.push_str(if value > 0.0 { "inf" } else { "-inf" });
        return;
    }

    let start = out.len();
    let _ = write!(out, "{:.*}", DECIMALS, value);
    if out[start..].contains('.') {
        let trimmed = out.trim_end_matches('0').trim_end_matches('.').len();
        out.truncate(trimmed);
    }
    if &out[start..] == "-0" {
        out.truncate(start);
        out.push('0');
    }
}

/// Text of a real-valued cell
pub fn real(value: f64) -> String {
    let mut out = String::new();
    write_real(&mut out, value);
    out
}

/// Text of an integer-valued cell
pub fn integer(value: u64) -> String {
    value.to_string()
}
