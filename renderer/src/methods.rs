use std::cmp::Ordering;

use indexmap::IndexMap;
use stencil::BinaryOperator;

use crate::error::RuntimeError;
use crate::evaluator::{arithmetic, call_lambda, contains};
use crate::scope::{Scope, len_as_int, map_entries};
use crate::value::{Lambda, Number, Value, ValueKind, values_equal};

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Call a receiver-less function: the static table first, then a lambda
/// bound under that name.
pub fn call_function(
    name: &str,
    args: Vec<Value>,
    scope: &mut Scope,
) -> Result<Value, RuntimeError> {
    match name {
        "listOf" => Ok(Value::List(args)),
        "setOf" => Ok(Value::List(distinct(args))),
        "mapOf" => {
            if args.len() % 2 != 0 {
                return Err(RuntimeError::invalid_argument(
                    name,
                    format!("expects key/value pairs but got {} arguments", args.len()),
                ));
            }
            let mut map = IndexMap::new();
            let mut args = args.into_iter();
            while let (Some(key), Some(value)) = (args.next(), args.next()) {
                map.insert(key_string(key), value);
            }
            Ok(Value::Map(map))
        }
        "emptyList" => {
            check_arity(name, &args, 0, 0)?;
            Ok(Value::List(Vec::new()))
        }
        "emptyMap" => {
            check_arity(name, &args, 0, 0)?;
            Ok(Value::Map(IndexMap::new()))
        }
        _ => match scope.lookup(name).cloned() {
            Some(Value::Lambda(lambda)) => call_lambda(&lambda, args, scope),
            _ => Err(RuntimeError::UnsupportedMethod {
                name: name.to_string(),
                receiver: "top level".to_string(),
            }),
        },
    }
}

/// Call a method on a receiver, dispatching on its kind.
pub fn call_method(
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
    scope: &mut Scope,
) -> Result<Value, RuntimeError> {
    match receiver {
        Value::String(s) => string_method(s, name, args),
        Value::List(items) => list_method(items, name, args, scope),
        Value::Map(map) => map_method(map, name, args),
        Value::Bool(b) => boolean_method(*b, name, args),
        Value::Int(_) | Value::Long(_) | Value::Float(_) | Value::Double(_) => {
            number_method(receiver, name, args)
        }
        Value::Null if name == "toString" || name == "not" => {
            check_arity(name, &args, 0, 0)?;
            Ok(if name == "not" {
                Value::Bool(true)
            } else {
                Value::from("null")
            })
        }
        other => Err(unsupported(name, other.kind())),
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn unsupported(name: &str, receiver: ValueKind) -> RuntimeError {
    RuntimeError::UnsupportedMethod {
        name: name.to_string(),
        receiver: receiver.to_string(),
    }
}

fn check_arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), RuntimeError> {
    if args.len() < min || args.len() > max {
        return Err(RuntimeError::ArityMismatch {
            name: name.to_string(),
            expected: if args.len() < min { min } else { max },
            got: args.len(),
        });
    }
    Ok(())
}

fn string_arg<'v>(name: &str, receiver: ValueKind, arg: &'v Value) -> Result<&'v str, RuntimeError> {
    match arg {
        Value::String(s) => Ok(s),
        other => Err(RuntimeError::type_mismatch(name, receiver, other.kind())),
    }
}

fn int_arg(name: &str, receiver: ValueKind, arg: &Value) -> Result<i64, RuntimeError> {
    match arg {
        Value::Int(n) => Ok(i64::from(*n)),
        Value::Long(n) => Ok(*n),
        other => Err(RuntimeError::type_mismatch(name, receiver, other.kind())),
    }
}

fn bool_arg(name: &str, arg: &Value) -> Result<bool, RuntimeError> {
    match arg {
        Value::Bool(b) => Ok(*b),
        other => Err(RuntimeError::type_mismatch(name, ValueKind::Boolean, other.kind())),
    }
}

fn lambda_arg<'v>(name: &str, receiver: ValueKind, arg: &'v Value) -> Result<&'v Lambda, RuntimeError> {
    match arg {
        Value::Lambda(lambda) => Ok(lambda.as_ref()),
        other => Err(RuntimeError::type_mismatch(name, receiver, other.kind())),
    }
}

fn key_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn size(len: usize) -> Value {
    Value::Int(len_as_int(len))
}

/// Resolve a possibly negative count argument into a usize.
fn count_arg(name: &str, receiver: ValueKind, arg: &Value) -> Result<usize, RuntimeError> {
    let n = int_arg(name, receiver, arg)?;
    usize::try_from(n)
        .map_err(|_| RuntimeError::invalid_argument(name, format!("count {} is negative", n)))
}

fn distinct(items: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !out.iter().any(|seen| values_equal(seen, &item)) {
            out.push(item);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// String
// ---------------------------------------------------------------------------

fn string_method(s: &str, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
    const KIND: ValueKind = ValueKind::String;
    let (min, max) = match name {
        "length" | "isEmpty" | "isNotEmpty" | "isBlank" | "isNotBlank" | "uppercase"
        | "lowercase" | "trim" | "lines" | "toInt" | "toIntOrNull" | "toString" => (0, 0),
        "contains" | "startsWith" | "endsWith" | "split" | "removePrefix" | "removeSuffix"
        | "get" => (1, 1),
        "substring" => (1, 2),
        "replace" => (2, 2),
        _ => return Err(unsupported(name, KIND)),
    };
    check_arity(name, &args, min, max)?;

    match name {
        "length" => Ok(size(s.chars().count())),
        "isEmpty" => Ok(Value::Bool(s.is_empty())),
        "isNotEmpty" => Ok(Value::Bool(!s.is_empty())),
        "isBlank" => Ok(Value::Bool(s.trim().is_empty())),
        "isNotBlank" => Ok(Value::Bool(!s.trim().is_empty())),
        "uppercase" => Ok(Value::String(s.to_uppercase())),
        "lowercase" => Ok(Value::String(s.to_lowercase())),
        "trim" => Ok(Value::String(s.trim().to_string())),
        "lines" => Ok(Value::List(s.lines().map(Value::from).collect())),
        "toInt" => s.parse::<i32>().map(Value::Int).map_err(|_| {
            RuntimeError::invalid_argument(name, format!("\"{}\" is not an Int", s))
        }),
        "toIntOrNull" => Ok(s.parse::<i32>().map(Value::Int).unwrap_or(Value::Null)),
        "toString" => Ok(Value::from(s)),
        "contains" => contains(&Value::from(s), &args[0], name),
        "startsWith" => Ok(Value::Bool(s.starts_with(string_arg(name, KIND, &args[0])?))),
        "endsWith" => Ok(Value::Bool(s.ends_with(string_arg(name, KIND, &args[0])?))),
        "split" => {
            let delimiter = string_arg(name, KIND, &args[0])?;
            Ok(Value::List(s.split(delimiter).map(Value::from).collect()))
        }
        "removePrefix" => {
            let prefix = string_arg(name, KIND, &args[0])?;
            Ok(Value::from(s.strip_prefix(prefix).unwrap_or(s)))
        }
        "removeSuffix" => {
            let suffix = string_arg(name, KIND, &args[0])?;
            Ok(Value::from(s.strip_suffix(suffix).unwrap_or(s)))
        }
        "get" => {
            let index = int_arg(name, KIND, &args[0])?;
            usize::try_from(index)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .ok_or_else(|| {
                    RuntimeError::invalid_argument(
                        name,
                        format!("index {} out of bounds for length {}", index, s.chars().count()),
                    )
                })
        }
        "substring" => {
            let chars: Vec<char> = s.chars().collect();
            let start = int_arg(name, KIND, &args[0])?;
            let end = match args.get(1) {
                Some(arg) => int_arg(name, KIND, arg)?,
                None => chars.len() as i64,
            };
            if start < 0 || end < start || end > chars.len() as i64 {
                return Err(RuntimeError::invalid_argument(
                    name,
                    format!("range {}..{} out of bounds for length {}", start, end, chars.len()),
                ));
            }
            Ok(Value::String(chars[start as usize..end as usize].iter().collect()))
        }
        "replace" => {
            let from = string_arg(name, KIND, &args[0])?;
            let to = string_arg(name, KIND, &args[1])?;
            Ok(Value::String(s.replace(from, to)))
        }
        _ => Err(unsupported(name, KIND)),
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

fn list_method(
    items: &[Value],
    name: &str,
    args: Vec<Value>,
    scope: &mut Scope,
) -> Result<Value, RuntimeError> {
    const KIND: ValueKind = ValueKind::List;
    let (min, max) = match name {
        "size" | "isEmpty" | "isNotEmpty" | "single" | "flatten" | "reversed" | "sorted"
        | "distinct" | "toString" => (0, 0),
        "first" | "firstOrNull" | "last" | "lastOrNull" | "any" | "none" | "count" => (0, 1),
        "contains" | "indexOf" | "take" | "drop" | "map" | "filter" | "filterNot" | "all"
        | "get" | "getOrNull" | "plus" => (1, 1),
        "joinToString" => (0, 2),
        _ => return Err(unsupported(name, KIND)),
    };
    check_arity(name, &args, min, max)?;

    match name {
        "size" => Ok(size(items.len())),
        "isEmpty" => Ok(Value::Bool(items.is_empty())),
        "isNotEmpty" => Ok(Value::Bool(!items.is_empty())),
        "toString" => Ok(Value::String(Value::List(items.to_vec()).to_string())),
        "contains" => contains(&Value::List(items.to_vec()), &args[0], name),
        "indexOf" => Ok(Value::Int(
            items
                .iter()
                .position(|item| values_equal(item, &args[0]))
                .map_or(-1, len_as_int),
        )),
        "single" => match items {
            [only] => Ok(only.clone()),
            [] => Err(RuntimeError::NoSuchElement {
                method: name.to_string(),
            }),
            _ => Err(RuntimeError::invalid_argument(
                name,
                format!("list has {} elements", items.len()),
            )),
        },
        "first" | "firstOrNull" | "last" | "lastOrNull" => {
            let found = match args.first() {
                Some(arg) => {
                    let predicate = lambda_arg(name, KIND, arg)?;
                    let mut matching = Vec::new();
                    for item in items {
                        if call_lambda(predicate, vec![item.clone()], scope)?.is_truthy() {
                            matching.push(item);
                        }
                    }
                    if name.starts_with("first") {
                        matching.first().copied()
                    } else {
                        matching.last().copied()
                    }
                }
                None if name.starts_with("first") => items.first(),
                None => items.last(),
            };
            match found {
                Some(item) => Ok(item.clone()),
                None if name.ends_with("OrNull") => Ok(Value::Null),
                None => Err(RuntimeError::NoSuchElement {
                    method: name.to_string(),
                }),
            }
        }
        "take" => {
            let n = count_arg(name, KIND, &args[0])?;
            Ok(Value::List(items.iter().take(n).cloned().collect()))
        }
        "drop" => {
            let n = count_arg(name, KIND, &args[0])?;
            Ok(Value::List(items.iter().skip(n).cloned().collect()))
        }
        "get" | "getOrNull" => {
            let index = int_arg(name, KIND, &args[0])?;
            match usize::try_from(index).ok().and_then(|i| items.get(i)) {
                Some(item) => Ok(item.clone()),
                None if name == "getOrNull" => Ok(Value::Null),
                None => Err(RuntimeError::invalid_argument(
                    name,
                    format!("index {} out of bounds for size {}", index, items.len()),
                )),
            }
        }
        "joinToString" => {
            let mut separator = ", ";
            let mut transform = None;
            for arg in &args {
                match arg {
                    Value::String(s) if transform.is_none() => separator = s,
                    Value::Lambda(lambda) => transform = Some(lambda),
                    other => {
                        return Err(RuntimeError::type_mismatch(name, KIND, other.kind()));
                    }
                }
            }
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                let part = match transform {
                    Some(lambda) => call_lambda(lambda, vec![item.clone()], scope)?,
                    None => item.clone(),
                };
                parts.push(part.to_string());
            }
            Ok(Value::String(parts.join(separator)))
        }
        "flatten" => {
            let mut flat = Vec::new();
            for item in items {
                match item {
                    Value::List(inner) => flat.extend(inner.iter().cloned()),
                    other => {
                        return Err(RuntimeError::type_mismatch(name, KIND, other.kind()));
                    }
                }
            }
            Ok(Value::List(flat))
        }
        "map" => {
            let lambda = lambda_arg(name, KIND, &args[0])?;
            let mut mapped = Vec::with_capacity(items.len());
            for item in items {
                mapped.push(call_lambda(lambda, vec![item.clone()], scope)?);
            }
            Ok(Value::List(mapped))
        }
        "filter" | "filterNot" => {
            let lambda = lambda_arg(name, KIND, &args[0])?;
            let keep = name == "filter";
            let mut kept = Vec::new();
            for item in items {
                if call_lambda(lambda, vec![item.clone()], scope)?.is_truthy() == keep {
                    kept.push(item.clone());
                }
            }
            Ok(Value::List(kept))
        }
        "any" | "all" | "none" | "count" => {
            let Some(arg) = args.first() else {
                return Ok(match name {
                    "any" => Value::Bool(!items.is_empty()),
                    "none" => Value::Bool(items.is_empty()),
                    _ => size(items.len()),
                });
            };
            let lambda = lambda_arg(name, KIND, arg)?;
            let mut matches = 0usize;
            for item in items {
                if call_lambda(lambda, vec![item.clone()], scope)?.is_truthy() {
                    matches += 1;
                }
            }
            Ok(match name {
                "any" => Value::Bool(matches > 0),
                "all" => Value::Bool(matches == items.len()),
                "none" => Value::Bool(matches == 0),
                _ => size(matches),
            })
        }
        "reversed" => Ok(Value::List(items.iter().rev().cloned().collect())),
        "distinct" => Ok(Value::List(distinct(items.to_vec()))),
        "sorted" => sorted(items).map(Value::List),
        "plus" => {
            let mut joined = items.to_vec();
            match &args[0] {
                Value::List(more) => joined.extend(more.iter().cloned()),
                other => joined.push(other.clone()),
            }
            Ok(Value::List(joined))
        }
        _ => Err(unsupported(name, KIND)),
    }
}

/// Sort numbers numerically or strings lexicographically.
fn sorted(items: &[Value]) -> Result<Vec<Value>, RuntimeError> {
    let mut sorted = items.to_vec();
    let Some(first) = items.first() else {
        return Ok(sorted);
    };
    for item in items {
        let same_family = match (first, item) {
            (Value::String(_), Value::String(_)) => true,
            _ => first.as_number().is_some() && item.as_number().is_some(),
        };
        if !same_family {
            return Err(RuntimeError::type_mismatch("sorted", first.kind(), item.kind()));
        }
    }
    sorted.sort_by(|a, b| match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => Number::compare(x, y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    });
    Ok(sorted)
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

fn map_method(
    map: &IndexMap<String, Value>,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    const KIND: ValueKind = ValueKind::Map;
    let (min, max) = match name {
        "size" | "isEmpty" | "isNotEmpty" | "keys" | "values" | "entries" | "toString" => (0, 0),
        "containsKey" | "containsValue" | "get" => (1, 1),
        "getOrDefault" => (2, 2),
        _ => return Err(unsupported(name, KIND)),
    };
    check_arity(name, &args, min, max)?;

    let mut args = args.into_iter();
    let first = args.next().unwrap_or_default();
    let second = args.next().unwrap_or_default();

    match name {
        "size" => Ok(size(map.len())),
        "isEmpty" => Ok(Value::Bool(map.is_empty())),
        "isNotEmpty" => Ok(Value::Bool(!map.is_empty())),
        "keys" => Ok(Value::List(map.keys().map(|k| Value::from(k.as_str())).collect())),
        "values" => Ok(Value::List(map.values().cloned().collect())),
        "entries" => Ok(Value::List(map_entries(map))),
        "toString" => Ok(Value::String(Value::Map(map.clone()).to_string())),
        "containsKey" => Ok(Value::Bool(map.contains_key(&key_string(first)))),
        "containsValue" => Ok(Value::Bool(map.values().any(|v| values_equal(v, &first)))),
        "get" => Ok(map.get(&key_string(first)).cloned().unwrap_or(Value::Null)),
        "getOrDefault" => Ok(map.get(&key_string(first)).cloned().unwrap_or(second)),
        _ => Err(unsupported(name, KIND)),
    }
}

// ---------------------------------------------------------------------------
// Number
// ---------------------------------------------------------------------------

fn number_method(receiver: &Value, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let kind = receiver.kind();
    let Some(number) = receiver.as_number() else {
        return Err(unsupported(name, kind));
    };
    let (min, max) = match name {
        "toInt" | "toLong" | "toFloat" | "toDouble" | "toString" | "unaryMinus"
        | "absoluteValue" => (0, 0),
        "plus" | "minus" | "times" | "div" | "rem" | "compareTo" | "coerceAtLeast"
        | "coerceAtMost" => (1, 1),
        _ => return Err(unsupported(name, kind)),
    };
    check_arity(name, &args, min, max)?;

    match name {
        "toInt" => Ok(Value::Int(match number {
            Number::Int(n) => n,
            Number::Long(n) => n as i32,
            Number::Float(n) => n as i32,
            Number::Double(n) => n as i32,
        })),
        "toLong" => Ok(Value::Long(number.to_i64())),
        "toFloat" => Ok(Value::Float(number.to_f32())),
        "toDouble" => Ok(Value::Double(number.to_f64())),
        "toString" => Ok(Value::String(receiver.to_string())),
        "unaryMinus" => Ok(match number {
            Number::Int(n) => Value::Int(n.wrapping_neg()),
            Number::Long(n) => Value::Long(n.wrapping_neg()),
            Number::Float(n) => Value::Float(-n),
            Number::Double(n) => Value::Double(-n),
        }),
        "absoluteValue" => Ok(match number {
            Number::Int(n) => Value::Int(n.wrapping_abs()),
            Number::Long(n) => Value::Long(n.wrapping_abs()),
            Number::Float(n) => Value::Float(n.abs()),
            Number::Double(n) => Value::Double(n.abs()),
        }),
        "plus" => arithmetic(BinaryOperator::Add, receiver, &args[0]),
        "minus" => arithmetic(BinaryOperator::Subtract, receiver, &args[0]),
        "times" => arithmetic(BinaryOperator::Multiply, receiver, &args[0]),
        "div" => arithmetic(BinaryOperator::Divide, receiver, &args[0]),
        "rem" => arithmetic(BinaryOperator::Remainder, receiver, &args[0]),
        "compareTo" | "coerceAtLeast" | "coerceAtMost" => {
            let Some(other) = args[0].as_number() else {
                return Err(RuntimeError::type_mismatch(name, kind, args[0].kind()));
            };
            let ordering = Number::compare(number, other).unwrap_or(Ordering::Equal);
            Ok(match name {
                "compareTo" => Value::Int(match ordering {
                    Ordering::Less => -1,
                    Ordering::Equal => 0,
                    Ordering::Greater => 1,
                }),
                "coerceAtLeast" if ordering == Ordering::Less => other.into_value(),
                "coerceAtMost" if ordering == Ordering::Greater => other.into_value(),
                _ => receiver.clone(),
            })
        }
        _ => Err(unsupported(name, kind)),
    }
}

// ---------------------------------------------------------------------------
// Boolean
// ---------------------------------------------------------------------------

fn boolean_method(b: bool, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let (min, max) = match name {
        "not" | "toString" => (0, 0),
        "and" | "or" | "xor" => (1, 1),
        _ => return Err(unsupported(name, ValueKind::Boolean)),
    };
    check_arity(name, &args, min, max)?;

    match name {
        "not" => Ok(Value::Bool(!b)),
        "toString" => Ok(Value::String(b.to_string())),
        "and" => Ok(Value::Bool(b & bool_arg(name, &args[0])?)),
        "or" => Ok(Value::Bool(b | bool_arg(name, &args[0])?)),
        "xor" => Ok(Value::Bool(b ^ bool_arg(name, &args[0])?)),
        _ => Err(unsupported(name, ValueKind::Boolean)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::scope::ScopeBuilder;
    use stencil::parser::parse_expression;

    fn eval(source: &str) -> Result<Value, RuntimeError> {
        let mut scope = ScopeBuilder::new()
            .property("xs", vec![3, 1, 2])
            .property("words", vec!["b", "a", "c"])
            .property("name", "Stencil")
            .property("m.a", 1)
            .property("m.b", 2)
            .build();
        let expr = parse_expression(source).expect("expression should parse");
        evaluate(&expr, &mut scope)
    }

    fn ok(source: &str) -> Value {
        eval(source).unwrap_or_else(|e| panic!("{} failed: {}", source, e))
    }

    #[test]
    fn static_functions() {
        assert_eq!(ok("listOf(1, 2)"), Value::from(vec![1, 2]));
        assert_eq!(ok("setOf(1, 1, 2)"), Value::from(vec![1, 2]));
        assert_eq!(ok("mapOf(\"a\", 1).get(\"a\")"), Value::Int(1));
        assert_eq!(ok("emptyList().isEmpty()"), Value::Bool(true));
        assert!(matches!(
            eval("mapOf(\"a\")"),
            Err(RuntimeError::InvalidArgument { .. })
        ));
        assert!(matches!(
            eval("nope()"),
            Err(RuntimeError::UnsupportedMethod { .. })
        ));
    }

    #[test]
    fn string_methods() {
        assert_eq!(ok("name.uppercase()"), Value::from("STENCIL"));
        assert_eq!(ok("name.length()"), Value::Int(7));
        assert_eq!(ok("name.substring(1, 3)"), Value::from("te"));
        assert_eq!(ok("\"a,b\".split(\",\")"), Value::from(vec!["a", "b"]));
        assert_eq!(ok("\"x.kt\".removeSuffix(\".kt\")"), Value::from("x"));
        assert_eq!(ok("\"  \".isBlank()"), Value::Bool(true));
        assert_eq!(ok("\"42\".toInt() + 1"), Value::Int(43));
        assert_eq!(ok("\"4x\".toIntOrNull()"), Value::Null);
        assert!(matches!(
            eval("name.substring(5, 99)"),
            Err(RuntimeError::InvalidArgument { .. })
        ));
        assert!(matches!(
            eval("name.startsWith(1)"),
            Err(RuntimeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            eval("name.reverse()"),
            Err(RuntimeError::UnsupportedMethod { .. })
        ));
    }

    #[test]
    fn list_methods() {
        assert_eq!(ok("xs.sorted()"), Value::from(vec![1, 2, 3]));
        assert_eq!(ok("words.sorted().joinToString(\"-\")"), Value::from("a-b-c"));
        assert_eq!(ok("xs.map { it * 10 }"), Value::from(vec![30, 10, 20]));
        assert_eq!(ok("xs.filter { it > 1 }"), Value::from(vec![3, 2]));
        assert_eq!(ok("xs.first()"), Value::Int(3));
        assert_eq!(ok("xs.last { it < 3 }"), Value::Int(2));
        assert_eq!(ok("xs.indexOf(2)"), Value::Int(2));
        assert_eq!(ok("xs.take(2).drop(1)"), Value::from(vec![1]));
        assert_eq!(
            ok("listOf(listOf(1), listOf(2, 3)).flatten()"),
            Value::from(vec![1, 2, 3])
        );
        assert_eq!(
            ok("xs.joinToString { \"<\" + it + \">\" }"),
            Value::from("<3>, <1>, <2>")
        );
        assert_eq!(ok("xs.count { it != 1 }"), Value::Int(2));
        assert_eq!(ok("xs[1]"), Value::Int(1));
        assert_eq!(ok("xs.plus(4).size()"), Value::Int(4));
        assert_eq!(ok("emptyList().firstOrNull()"), Value::Null);
        assert!(matches!(
            eval("emptyList().first()"),
            Err(RuntimeError::NoSuchElement { .. })
        ));
        assert!(matches!(
            eval("xs.single()"),
            Err(RuntimeError::InvalidArgument { .. })
        ));
        assert!(matches!(
            eval("xs.map(1, 2)"),
            Err(RuntimeError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn map_methods() {
        assert_eq!(ok("m.keys()"), Value::from(vec!["a", "b"]));
        assert_eq!(ok("m.containsKey(\"b\")"), Value::Bool(true));
        assert_eq!(ok("m.getOrDefault(\"z\", 9)"), Value::Int(9));
        assert_eq!(ok("m.entries().size()"), Value::Int(2));
        assert_eq!(ok("m.toString()"), Value::from("{a=1, b=2}"));
    }

    #[test]
    fn number_and_boolean_methods() {
        assert_eq!(ok("3.7.toInt()"), Value::Int(3));
        assert_eq!(ok("5.coerceAtLeast(10)"), Value::Int(10));
        assert_eq!(ok("5.compareTo(2.0)"), Value::Int(1));
        assert_eq!(ok("(0 - 4).absoluteValue()"), Value::Int(4));
        assert_eq!(ok("1.5.toString()"), Value::from("1.5"));
        assert_eq!(ok("true.xor(true)"), Value::Bool(false));
        assert_eq!(ok("!missing"), Value::Bool(true));
        assert!(matches!(
            eval("1.div(0)"),
            Err(RuntimeError::ArithmeticError { .. })
        ));
    }
}
