//! Exact constant values
//!
//! Numeric constants keep an exact textual form instead of being narrowed to
//! a machine type, so a consumer can later give an untyped constant any
//! concrete type without precision loss.

use std::fmt;

/// Value of a package-level constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstValue {
    /// Boolean constant
    Bool(bool),
    /// String constant
    String(String),
    /// Integer constant as exact decimal digits, with a leading `-` if negative
    Int(String),
    /// Real constant as an exact decimal (`0.5`, `3e10`), `n/d` ratio, or `mp e` binary form
    Float(String),
    /// Complex constant as exact real and imaginary parts
    Complex(String, String),
    /// Value the encoder could not represent
    Unknown,
}

impl ConstValue {
    /// Whether this is a numeric constant
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ConstValue::Int(_) | ConstValue::Float(_) | ConstValue::Complex(..)
        )
    }

    /// The exact textual form of a numeric value, if any
    pub fn exact_text(&self) -> Option<String> {
        match self {
            ConstValue::Int(s) | ConstValue::Float(s) => Some(s.clone()),
            ConstValue::Complex(re, im) => Some(format!("({re} + {im}i)")),
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Bool(b) => write!(f, "{b}"),
            ConstValue::String(s) => write!(f, "{s:?}"),
            ConstValue::Int(s) | ConstValue::Float(s) => f.write_str(s),
            ConstValue::Complex(re, im) => write!(f, "({re} + {im}i)"),
            ConstValue::Unknown => f.write_str("unknown"),
        }
    }
}

/// Binary exponents beyond this are rendered as `<mantissa>p<exp>` instead of
/// being expanded to decimal digits.
const MAX_EXPANDED_EXP: u64 = 4096;

/// Decimal digits stored least significant first
struct Digits(Vec<u8>);

impl Digits {
    fn from_be_bytes(bytes: &[u8]) -> Self {
        let mut digits = Digits(vec![0]);
        for &b in bytes {
            digits.mul_add(256, u64::from(b));
        }
        digits.trim();
        digits
    }

    fn mul_add(&mut self, factor: u64, addend: u64) {
        let mut carry = addend;
        for d in self.0.iter_mut() {
            let v = u64::from(*d) * factor + carry;
            *d = (v % 10) as u8;
            carry = v / 10;
        }
        while carry > 0 {
            self.0.push((carry % 10) as u8);
            carry /= 10;
        }
    }

    /// Multiply by `base^exp` in word-sized chunks
    fn mul_pow(&mut self, base: u64, chunk_exp: u32, mut exp: u64) {
        let chunk = base.pow(chunk_exp);
        while exp >= u64::from(chunk_exp) {
            self.mul_add(chunk, 0);
            exp -= u64::from(chunk_exp);
        }
        if exp > 0 {
            self.mul_add(base.pow(exp as u32), 0);
        }
    }

    fn trim(&mut self) {
        while self.0.len() > 1 && self.0.last() == Some(&0) {
            self.0.pop();
        }
    }

    fn is_zero(&self) -> bool {
        self.0.iter().all(|&d| d == 0)
    }

    fn to_decimal_string(&self) -> String {
        self.0.iter().rev().map(|d| char::from(b'0' + d)).collect()
    }
}

/// Decimal form of a big-endian unsigned magnitude
pub fn magnitude_to_decimal(bytes: &[u8]) -> String {
    Digits::from_be_bytes(bytes).to_decimal_string()
}

/// Exact decimal form of `sign * mantissa * 2^exp`
pub fn binary_float_to_decimal(negative: bool, mantissa: &[u8], exp: i64) -> String {
    let mut digits = Digits::from_be_bytes(mantissa);
    if digits.is_zero() {
        return "0".to_string();
    }
    let sign = if negative { "-" } else { "" };
    if exp.unsigned_abs() > MAX_EXPANDED_EXP {
        return format!("{sign}{}p{exp}", digits.to_decimal_string());
    }
    if exp >= 0 {
        digits.mul_pow(2, 29, exp.unsigned_abs());
        return format!("{sign}{}", digits.to_decimal_string());
    }

    // m / 2^k == m * 5^k / 10^k
    let k = exp.unsigned_abs();
    digits.mul_pow(5, 13, k);
    let k = k as usize;
    let mut text = digits.to_decimal_string();
    if text.len() <= k {
        text = format!("{}{text}", "0".repeat(k + 1 - text.len()));
    }
    let (int_part, frac_part) = text.split_at(text.len() - k);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        format!("{sign}{int_part}")
    } else {
        format!("{sign}{int_part}.{frac_part}")
    }
}
