use std::cmp::Ordering;
use std::sync::Arc;

use stencil::{BinaryOperator, Expression, PostfixOperator};

use crate::error::RuntimeError;
use crate::methods;
use crate::scope::{Frame, Scope};
use crate::value::{Lambda, Number, Promoted, Value, values_equal};

/// Evaluate an expression against the current scope.
pub fn evaluate(expr: &Expression, scope: &mut Scope) -> Result<Value, RuntimeError> {
    match expr {
        // --- Literals ---
        Expression::NullLiteral => Ok(Value::Null),
        Expression::StringLiteral(s) => Ok(Value::String(s.clone())),
        Expression::IntLiteral(n) => Ok(Value::Int(*n)),
        Expression::LongLiteral(n) => Ok(Value::Long(*n)),
        Expression::FloatLiteral(n) => Ok(Value::Float(*n)),
        Expression::DoubleLiteral(n) => Ok(Value::Double(*n)),
        Expression::CharLiteral(c) => Ok(Value::String(c.to_string())),
        Expression::BooleanLiteral(b) => Ok(Value::Bool(*b)),

        // --- References ---
        Expression::VariableRef(name) => Ok(scope.get(name)),

        // --- Operations ---
        Expression::BinaryOp {
            operator,
            left,
            right,
        } => {
            let l = evaluate(left, scope)?;
            match operator {
                BinaryOperator::And | BinaryOperator::Or => {
                    logical(*operator, l, right, scope)
                }
                BinaryOperator::Elvis => {
                    if l.is_null() {
                        evaluate(right, scope)
                    } else {
                        Ok(l)
                    }
                }
                _ => {
                    let r = evaluate(right, scope)?;
                    eval_binary_op(*operator, &l, &r)
                }
            }
        }

        Expression::PostfixOp { operator, target } => {
            let value = evaluate(target, scope)?;
            match operator {
                PostfixOperator::Increment => Ok(step(&value, 1)),
                PostfixOperator::Decrement => Ok(step(&value, -1)),
                PostfixOperator::NotNull => {
                    if value.is_null() {
                        Err(RuntimeError::NullAssertion {
                            expression: target.to_string(),
                        })
                    } else {
                        Ok(value)
                    }
                }
            }
        }

        Expression::Lambda { params, body } => Ok(Value::Lambda(Arc::new(Lambda {
            params: params.clone(),
            body: (**body).clone(),
        }))),

        Expression::MethodCall {
            receiver,
            name,
            args,
        } => {
            let receiver = match receiver {
                Some(receiver) => Some(evaluate(receiver, scope)?),
                None => None,
            };
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            match receiver {
                Some(receiver) => methods::call_method(&receiver, name, args, scope),
                None => methods::call_function(name, args, scope),
            }
        }
    }
}

/// Invoke a lambda with one frame binding its parameters. The frame is
/// popped whether or not the body succeeds.
pub fn call_lambda(
    lambda: &Lambda,
    args: Vec<Value>,
    scope: &mut Scope,
) -> Result<Value, RuntimeError> {
    if args.len() != lambda.params.len() {
        return Err(RuntimeError::ArityMismatch {
            name: "lambda".to_string(),
            expected: lambda.params.len(),
            got: args.len(),
        });
    }
    let frame: Frame = lambda.params.iter().cloned().zip(args).collect();
    scope.push(frame);
    let result = evaluate(&lambda.body, scope);
    scope.pop();
    result
}

fn logical(
    operator: BinaryOperator,
    left: Value,
    right: &Expression,
    scope: &mut Scope,
) -> Result<Value, RuntimeError> {
    let Value::Bool(l) = left else {
        // The right side only names its kind; its failure keeps the mismatch.
        let right_kind = evaluate(right, scope).map_or(left.kind(), |r| r.kind());
        return Err(RuntimeError::type_mismatch(
            operator.symbol(),
            left.kind(),
            right_kind,
        ));
    };
    match (operator, l) {
        (BinaryOperator::And, false) => return Ok(Value::Bool(false)),
        (BinaryOperator::Or, true) => return Ok(Value::Bool(true)),
        _ => {}
    }
    match evaluate(right, scope)? {
        Value::Bool(r) => Ok(Value::Bool(r)),
        other => Err(RuntimeError::type_mismatch(
            operator.symbol(),
            left.kind(),
            other.kind(),
        )),
    }
}

/// `++`/`--` keep the numeric kind; anything else becomes `1`.
fn step(value: &Value, delta: i8) -> Value {
    match value.as_number() {
        Some(Number::Int(n)) => Value::Int(n.wrapping_add(i32::from(delta))),
        Some(Number::Long(n)) => Value::Long(n.wrapping_add(i64::from(delta))),
        Some(Number::Float(n)) => Value::Float(n + f32::from(delta)),
        Some(Number::Double(n)) => Value::Double(n + f64::from(delta)),
        None => Value::Int(1),
    }
}

/// Apply a binary operator to two evaluated operands.
pub fn eval_binary_op(
    operator: BinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<Value, RuntimeError> {
    match operator {
        BinaryOperator::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", left, right)))
            }
            _ => arithmetic(operator, left, right),
        },
        BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Remainder => arithmetic(operator, left, right),
        BinaryOperator::Less
        | BinaryOperator::Greater
        | BinaryOperator::LessOrEqual
        | BinaryOperator::GreaterOrEqual => comparison(operator, left, right),
        BinaryOperator::Equal => Ok(Value::Bool(values_equal(left, right))),
        BinaryOperator::NotEqual => Ok(Value::Bool(!values_equal(left, right))),
        BinaryOperator::And | BinaryOperator::Or => match (left, right) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if operator == BinaryOperator::And {
                *a && *b
            } else {
                *a || *b
            })),
            _ => Err(RuntimeError::type_mismatch(
                operator.symbol(),
                left.kind(),
                right.kind(),
            )),
        },
        BinaryOperator::Elvis => Ok(if left.is_null() {
            right.clone()
        } else {
            left.clone()
        }),
        BinaryOperator::In => contains(right, left, "in"),
    }
}

/// Membership test shared by `in` and the `contains` methods.
pub fn contains(container: &Value, item: &Value, operator: &str) -> Result<Value, RuntimeError> {
    match container {
        Value::List(items) => Ok(Value::Bool(items.iter().any(|v| values_equal(v, item)))),
        Value::Map(map) => Ok(Value::Bool(match item {
            Value::String(key) => map.contains_key(key),
            other => map.contains_key(&other.to_string()),
        })),
        Value::String(s) => match item {
            Value::String(needle) => Ok(Value::Bool(s.contains(needle.as_str()))),
            other => Err(RuntimeError::type_mismatch(
                operator,
                other.kind(),
                container.kind(),
            )),
        },
        other => Err(RuntimeError::type_mismatch(
            operator,
            item.kind(),
            other.kind(),
        )),
    }
}

pub(crate) fn arithmetic(
    operator: BinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<Value, RuntimeError> {
    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Err(RuntimeError::type_mismatch(
            operator.symbol(),
            left.kind(),
            right.kind(),
        ));
    };
    match Number::promote(a, b) {
        Promoted::Int(x, y) => Ok(Value::Int(int_op(operator, x, y)?)),
        Promoted::Long(x, y) => Ok(Value::Long(long_op(operator, x, y)?)),
        Promoted::Float(x, y) => Ok(Value::Float(float_op(operator, x, y))),
        Promoted::Double(x, y) => Ok(Value::Double(double_op(operator, x, y))),
    }
}

fn division_by_zero(operator: BinaryOperator) -> RuntimeError {
    RuntimeError::ArithmeticError {
        operator: operator.symbol().to_string(),
    }
}

fn int_op(operator: BinaryOperator, a: i32, b: i32) -> Result<i32, RuntimeError> {
    match operator {
        BinaryOperator::Add => Ok(a.wrapping_add(b)),
        BinaryOperator::Subtract => Ok(a.wrapping_sub(b)),
        BinaryOperator::Multiply => Ok(a.wrapping_mul(b)),
        _ if b == 0 => Err(division_by_zero(operator)),
        BinaryOperator::Divide => Ok(a.wrapping_div(b)),
        _ => Ok(a.wrapping_rem(b)),
    }
}

fn long_op(operator: BinaryOperator, a: i64, b: i64) -> Result<i64, RuntimeError> {
    match operator {
        BinaryOperator::Add => Ok(a.wrapping_add(b)),
        BinaryOperator::Subtract => Ok(a.wrapping_sub(b)),
        BinaryOperator::Multiply => Ok(a.wrapping_mul(b)),
        _ if b == 0 => Err(division_by_zero(operator)),
        BinaryOperator::Divide => Ok(a.wrapping_div(b)),
        _ => Ok(a.wrapping_rem(b)),
    }
}

fn float_op(operator: BinaryOperator, a: f32, b: f32) -> f32 {
    match operator {
        BinaryOperator::Add => a + b,
        BinaryOperator::Subtract => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide => a / b,
        _ => a % b,
    }
}

fn double_op(operator: BinaryOperator, a: f64, b: f64) -> f64 {
    match operator {
        BinaryOperator::Add => a + b,
        BinaryOperator::Subtract => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide => a / b,
        _ => a % b,
    }
}

fn comparison(
    operator: BinaryOperator,
    left: &Value,
    right: &Value,
) -> Result<Value, RuntimeError> {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => Number::compare(a, b),
            _ => {
                return Err(RuntimeError::type_mismatch(
                    operator.symbol(),
                    left.kind(),
                    right.kind(),
                ));
            }
        },
    };
    let result = match ordering {
        None => false,
        Some(ordering) => match operator {
            BinaryOperator::Less => ordering == Ordering::Less,
            BinaryOperator::Greater => ordering == Ordering::Greater,
            BinaryOperator::LessOrEqual => ordering != Ordering::Greater,
            _ => ordering != Ordering::Less,
        },
    };
    Ok(Value::Bool(result))
}
