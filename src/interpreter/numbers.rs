//! Numeric tower: Int, Ratio, Double and Decimal.
//!
//! Binary operations convert both operands to the category chosen by
//! [`combine`] and compute there. The tree-walker's natives and the VM's
//! arithmetic opcodes both call into this module, so the two execution
//! strategies agree on every result.

use std::cmp::Ordering;
use std::fmt;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::RuntimeError;
use crate::interpreter::value::Value;
use crate::span::Span;

/// An exact rational `num/den`, always normalized: `den > 1` and `gcd(num, den) == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ratio {
    pub num: i64,
    pub den: i64,
}

impl Ratio {
    /// Build the normalized value of `num/den`, collapsing to `Int` when the
    /// denominator divides the numerator.
    pub fn make(num: i128, den: i128) -> Result<Value, RuntimeError> {
        if den == 0 {
            return Err(RuntimeError::division_by_zero(Span::default()));
        }
        let g = gcd(num.abs(), den.abs()).max(1);
        let (mut num, mut den) = (num / g, den / g);
        if den < 0 {
            num = -num;
            den = -den;
        }
        let num = i64::try_from(num).map_err(|_| ratio_overflow())?;
        let den = i64::try_from(den).map_err(|_| ratio_overflow())?;
        if den == 1 {
            Ok(Value::Int(num))
        } else {
            Ok(Value::Ratio(Ratio { num, den }))
        }
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn ratio_overflow() -> RuntimeError {
    RuntimeError::new("Ratio overflow", Span::default())
}

fn decimal_overflow() -> RuntimeError {
    RuntimeError::new("Decimal overflow", Span::default())
}

/// Numeric category of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Int,
    Ratio,
    Double,
    Decimal,
}

pub fn category(value: &Value) -> Option<Category> {
    match value {
        Value::Int(_) => Some(Category::Int),
        Value::Ratio(_) => Some(Category::Ratio),
        Value::Double(_) => Some(Category::Double),
        Value::Decimal(_) => Some(Category::Decimal),
        _ => None,
    }
}

/// The category a binary operation on `a` and `b` is computed in.
pub fn combine(a: Category, b: Category) -> Category {
    use Category::*;
    match (a, b) {
        (Int, other) | (other, Int) => other,
        (Decimal, _) | (_, Decimal) => Decimal,
        (Double, _) | (_, Double) => Double,
        (Ratio, Ratio) => Ratio,
    }
}

pub fn is_number(value: &Value) -> bool {
    category(value).is_some()
}

fn not_a_number(op: &str, value: &Value) -> RuntimeError {
    RuntimeError::type_error(
        format!("Cannot apply {} to {}", op, value.type_name()),
        Span::default(),
    )
}

fn categories(op: &str, a: &Value, b: &Value) -> Result<Category, RuntimeError> {
    let ca = category(a).ok_or_else(|| not_a_number(op, a))?;
    let cb = category(b).ok_or_else(|| not_a_number(op, b))?;
    Ok(combine(ca, cb))
}

fn as_ratio(value: &Value) -> (i128, i128) {
    match value {
        Value::Int(n) => (*n as i128, 1),
        Value::Ratio(r) => (r.num as i128, r.den as i128),
        _ => (0, 1),
    }
}

fn int_pair(a: &Value, b: &Value) -> (i64, i64) {
    (as_ratio(a).0 as i64, as_ratio(b).0 as i64)
}

pub fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Ratio(r) => Some(r.to_f64()),
        Value::Double(d) => Some(*d),
        Value::Decimal(d) => d.to_f64(),
        _ => None,
    }
}

fn to_decimal(value: &Value) -> Result<Decimal, RuntimeError> {
    match value {
        Value::Int(n) => Ok(Decimal::from(*n)),
        Value::Ratio(r) => Decimal::from(r.num)
            .checked_div(Decimal::from(r.den))
            .ok_or_else(decimal_overflow),
        Value::Double(d) => Decimal::from_f64(*d).ok_or_else(decimal_overflow),
        Value::Decimal(d) => Ok(*d),
        other => Err(not_a_number("decimal arithmetic", other)),
    }
}

fn double_operands(a: &Value, b: &Value) -> (f64, f64) {
    (to_f64(a).unwrap_or(f64::NAN), to_f64(b).unwrap_or(f64::NAN))
}

pub fn add(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match categories("+", a, b)? {
        Category::Int => {
            let (x, y) = int_pair(a, b);
            Ok(Value::Int(x.wrapping_add(y)))
        }
        Category::Ratio => {
            let ((an, ad), (bn, bd)) = (as_ratio(a), as_ratio(b));
            Ratio::make(an * bd + bn * ad, ad * bd)
        }
        Category::Double => {
            let (x, y) = double_operands(a, b);
            Ok(Value::Double(x + y))
        }
        Category::Decimal => to_decimal(a)?
            .checked_add(to_decimal(b)?)
            .map(Value::Decimal)
            .ok_or_else(decimal_overflow),
    }
}

pub fn sub(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match categories("-", a, b)? {
        Category::Int => {
            let (x, y) = int_pair(a, b);
            Ok(Value::Int(x.wrapping_sub(y)))
        }
        Category::Ratio => {
            let ((an, ad), (bn, bd)) = (as_ratio(a), as_ratio(b));
            Ratio::make(an * bd - bn * ad, ad * bd)
        }
        Category::Double => {
            let (x, y) = double_operands(a, b);
            Ok(Value::Double(x - y))
        }
        Category::Decimal => to_decimal(a)?
            .checked_sub(to_decimal(b)?)
            .map(Value::Decimal)
            .ok_or_else(decimal_overflow),
    }
}

pub fn mul(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match categories("*", a, b)? {
        Category::Int => {
            let (x, y) = int_pair(a, b);
            Ok(Value::Int(x.wrapping_mul(y)))
        }
        Category::Ratio => {
            let ((an, ad), (bn, bd)) = (as_ratio(a), as_ratio(b));
            Ratio::make(an * bn, ad * bd)
        }
        Category::Double => {
            let (x, y) = double_operands(a, b);
            Ok(Value::Double(x * y))
        }
        Category::Decimal => to_decimal(a)?
            .checked_mul(to_decimal(b)?)
            .map(Value::Decimal)
            .ok_or_else(decimal_overflow),
    }
}

pub fn div(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match categories("/", a, b)? {
        Category::Int | Category::Ratio => {
            let ((an, ad), (bn, bd)) = (as_ratio(a), as_ratio(b));
            if bn == 0 {
                return Err(RuntimeError::division_by_zero(Span::default()));
            }
            Ratio::make(an * bd, ad * bn)
        }
        Category::Double => {
            let (x, y) = double_operands(a, b);
            Ok(Value::Double(x / y))
        }
        Category::Decimal => {
            let divisor = to_decimal(b)?;
            if divisor.is_zero() {
                return Err(RuntimeError::division_by_zero(Span::default()));
            }
            to_decimal(a)?
                .checked_div(divisor)
                .map(Value::Decimal)
                .ok_or_else(decimal_overflow)
        }
    }
}

pub fn negate(a: &Value) -> Result<Value, RuntimeError> {
    match a {
        Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
        Value::Ratio(r) => Ok(Value::Ratio(Ratio {
            num: r.num.checked_neg().ok_or_else(ratio_overflow)?,
            den: r.den,
        })),
        Value::Double(d) => Ok(Value::Double(-d)),
        Value::Decimal(d) => Ok(Value::Decimal(-*d)),
        other => Err(not_a_number("-", other)),
    }
}

/// Numeric ordering; `None` when either side is NaN.
pub fn compare(a: &Value, b: &Value) -> Result<Option<Ordering>, RuntimeError> {
    Ok(match categories("comparison", a, b)? {
        Category::Int | Category::Ratio => {
            let ((an, ad), (bn, bd)) = (as_ratio(a), as_ratio(b));
            Some((an * bd).cmp(&(bn * ad)))
        }
        Category::Double => {
            let (x, y) = double_operands(a, b);
            x.partial_cmp(&y)
        }
        Category::Decimal => Some(to_decimal(a)?.cmp(&to_decimal(b)?)),
    })
}

pub fn lt(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(compare(a, b)? == Some(Ordering::Less)))
}

pub fn gt(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(compare(a, b)? == Some(Ordering::Greater)))
}

pub fn lte(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(matches!(
        compare(a, b)?,
        Some(Ordering::Less | Ordering::Equal)
    )))
}

pub fn gte(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(matches!(
        compare(a, b)?,
        Some(Ordering::Greater | Ordering::Equal)
    )))
}

pub fn is_zero(a: &Value) -> Result<bool, RuntimeError> {
    match a {
        Value::Int(n) => Ok(*n == 0),
        Value::Ratio(_) => Ok(false),
        Value::Double(d) => Ok(*d == 0.0),
        Value::Decimal(d) => Ok(d.is_zero()),
        other => Err(not_a_number("zero?", other)),
    }
}

/// Integer quotient, truncating toward zero.
pub fn quot(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(RuntimeError::division_by_zero(Span::default())),
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x.wrapping_div(*y))),
        _ => {
            let (x, y) = float_pair("quot", a, b)?;
            Ok(Value::Double((x / y).trunc()))
        }
    }
}

/// Remainder with the sign of the dividend.
pub fn rem(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(RuntimeError::division_by_zero(Span::default())),
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x.wrapping_rem(*y))),
        _ => {
            let (x, y) = float_pair("rem", a, b)?;
            Ok(Value::Double(x % y))
        }
    }
}

/// Modulus with the sign of the divisor.
pub fn modulo(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(RuntimeError::division_by_zero(Span::default())),
        (Value::Int(x), Value::Int(y)) => {
            let r = x.wrapping_rem(*y);
            Ok(Value::Int(if r != 0 && (r < 0) != (*y < 0) { r + y } else { r }))
        }
        _ => {
            let (x, y) = float_pair("mod", a, b)?;
            let r = x % y;
            Ok(Value::Double(if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r }))
        }
    }
}

fn float_pair(op: &str, a: &Value, b: &Value) -> Result<(f64, f64), RuntimeError> {
    let x = to_f64(a).ok_or_else(|| not_a_number(op, a))?;
    let y = to_f64(b).ok_or_else(|| not_a_number(op, b))?;
    Ok((x, y))
}
