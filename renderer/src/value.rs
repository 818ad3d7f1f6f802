use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use stencil::Expression;

/// A dynamic value produced by evaluation or scope lookup.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    List(Vec<Value>),
    /// Insertion-ordered; equality ignores order.
    Map(IndexMap<String, Value>),
    Lambda(Arc<Lambda>),
}

/// A callable produced by a lambda expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    List,
    Map,
    Lambda,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "Null",
            ValueKind::Boolean => "Boolean",
            ValueKind::Int => "Int",
            ValueKind::Long => "Long",
            ValueKind::Float => "Float",
            ValueKind::Double => "Double",
            ValueKind::String => "String",
            ValueKind::List => "List",
            ValueKind::Map => "Map",
            ValueKind::Lambda => "Lambda",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Int(_) => ValueKind::Int,
            Value::Long(_) => ValueKind::Long,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Lambda(_) => ValueKind::Lambda,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by conditionals: non-zero Ints, `true`, non-empty
    /// strings and collections, and any other non-null value.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Long(_) | Value::Float(_) | Value::Double(_) | Value::Lambda(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Long(n) => Some(Number::Long(*n)),
            Value::Float(n) => Some(Number::Float(*n)),
            Value::Double(n) => Some(Number::Double(*n)),
            _ => None,
        }
    }

    pub fn map(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Value::Map(entries.into_iter().collect())
    }

    /// Render as a host-language string literal.
    pub fn quoted(s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('"');
        for c in s.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '$' => out.push_str("\\$"),
                c => out.push(c),
            }
        }
        out.push('"');
        out
    }
}

/// Equality used by `==`, `in`, `contains` and `when` clauses: numbers
/// compare after promotion, collections element-wise.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, v)| b.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => Number::compare(a, b) == Some(Ordering::Equal),
            _ => left == right,
        },
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Long(n) => write!(f, "{}", n),
            Value::Float(n) => write_float(f, f64::from(*n), *n),
            Value::Double(n) => write_float(f, *n, *n),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                f.write_str("}")
            }
            Value::Lambda(_) => f.write_str("(lambda)"),
        }
    }
}

/// Whole finite numbers keep a trailing `.0`. Magnitudes outside
/// `[1e-3, 1e7)` use scientific notation with a mantissa like `1.0E20`.
fn write_float<T: fmt::Display + fmt::LowerExp>(
    f: &mut fmt::Formatter<'_>,
    n: f64,
    raw: T,
) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n != 0.0 && !(1e-3..1e7).contains(&n.abs()) {
        write_scientific(f, format!("{:e}", raw))
    } else if n.fract() == 0.0 {
        write!(f, "{:.1}", n)
    } else {
        write!(f, "{}", raw)
    }
}

fn write_scientific(f: &mut fmt::Formatter<'_>, formatted: String) -> fmt::Result {
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
    if mantissa.contains('.') {
        write!(f, "{}E{}", mantissa, exponent)
    } else {
        write!(f, "{}.0E{}", mantissa, exponent)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// A numeric value. Variants are ordered by promotion rank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

/// Two numbers widened to a common kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Promoted {
    Int(i32, i32),
    Long(i64, i64),
    Float(f32, f32),
    Double(f64, f64),
}

impl Number {
    fn rank(self) -> u8 {
        match self {
            Number::Int(_) => 0,
            Number::Long(_) => 1,
            Number::Float(_) => 2,
            Number::Double(_) => 3,
        }
    }

    pub fn to_i64(self) -> i64 {
        match self {
            Number::Int(n) => i64::from(n),
            Number::Long(n) => n,
            Number::Float(n) => n as i64,
            Number::Double(n) => n as i64,
        }
    }

    pub fn to_f32(self) -> f32 {
        match self {
            Number::Int(n) => n as f32,
            Number::Long(n) => n as f32,
            Number::Float(n) => n,
            Number::Double(n) => n as f32,
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Number::Int(n) => f64::from(n),
            Number::Long(n) => n as f64,
            Number::Float(n) => f64::from(n),
            Number::Double(n) => n,
        }
    }

    /// Widen both operands to the wider of the two kinds
    /// (Double > Float > Long > Int).
    pub fn promote(a: Number, b: Number) -> Promoted {
        match a.rank().max(b.rank()) {
            0 => match (a, b) {
                (Number::Int(x), Number::Int(y)) => Promoted::Int(x, y),
                _ => Promoted::Long(a.to_i64(), b.to_i64()),
            },
            1 => Promoted::Long(a.to_i64(), b.to_i64()),
            2 => Promoted::Float(a.to_f32(), b.to_f32()),
            _ => Promoted::Double(a.to_f64(), b.to_f64()),
        }
    }

    /// `None` when either side is NaN.
    pub fn compare(a: Number, b: Number) -> Option<Ordering> {
        match Number::promote(a, b) {
            Promoted::Int(x, y) => Some(x.cmp(&y)),
            Promoted::Long(x, y) => Some(x.cmp(&y)),
            Promoted::Float(x, y) => x.partial_cmp(&y),
            Promoted::Double(x, y) => x.partial_cmp(&y),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Number::Int(n) => Value::Int(n),
            Number::Long(n) => Value::Long(n),
            Number::Float(n) => Value::Float(n),
            Number::Double(n) => Value::Double(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_table() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-3).is_truthy());
        assert!(Value::Long(0).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("false").is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::from(vec![1]).is_truthy());
        assert!(!Value::Map(IndexMap::new()).is_truthy());
        assert!(Value::map([("a".to_string(), Value::Int(1))]).is_truthy());
        assert!(Value::Float(0.0).is_truthy());
        assert!(Value::Double(0.0).is_truthy());
        let identity = Lambda {
            params: vec!["x".to_string()],
            body: Expression::VariableRef("x".to_string()),
        };
        assert!(Value::Lambda(Arc::new(identity)).is_truthy());
    }

    #[test]
    fn display_matches_host_conventions() {
        assert_eq!(Value::Double(1.0).to_string(), "1.0");
        assert_eq!(Value::Double(2.5).to_string(), "2.5");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Double(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::Double(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(Value::from(vec!["a", "b"]).to_string(), "[a, b]");
        let map = Value::map([("k".to_string(), Value::Int(1))]);
        assert_eq!(map.to_string(), "{k=1}");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn large_and_tiny_floats_use_exponents() {
        assert_eq!(Value::Double(1e20).to_string(), "1.0E20");
        assert_eq!(Value::Double(-2.5e10).to_string(), "-2.5E10");
        assert_eq!(Value::Double(1.5e-5).to_string(), "1.5E-5");
        assert_eq!(Value::Double(1_000_000.0).to_string(), "1000000.0");
        assert_eq!(Value::Double(0.001).to_string(), "0.001");
        assert_eq!(Value::Double(0.0).to_string(), "0.0");
        assert_eq!(Value::Float(3.3e8).to_string(), "3.3E8");
    }

    #[test]
    fn quoting_escapes_host_specials() {
        assert_eq!(Value::quoted("a\"b$c\n"), "\"a\\\"b\\$c\\n\"");
    }

    #[test]
    fn promotion_picks_widest_kind() {
        assert_eq!(
            Number::promote(Number::Int(1), Number::Long(2)),
            Promoted::Long(1, 2)
        );
        assert_eq!(
            Number::promote(Number::Long(1), Number::Float(2.0)),
            Promoted::Float(1.0, 2.0)
        );
        assert_eq!(
            Number::promote(Number::Float(1.5), Number::Double(2.0)),
            Promoted::Double(1.5, 2.0)
        );
    }

    #[test]
    fn equality_promotes_numbers_and_ignores_map_order() {
        assert!(values_equal(&Value::Int(1), &Value::Double(1.0)));
        assert!(!values_equal(&Value::Int(1), &Value::from("1")));
        let a = Value::map([("x".into(), Value::Int(1)), ("y".into(), Value::Int(2))]);
        let b = Value::map([("y".into(), Value::Long(2)), ("x".into(), Value::Int(1))]);
        assert!(values_equal(&a, &b));
    }
}
