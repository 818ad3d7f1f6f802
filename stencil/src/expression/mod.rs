use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Equal,
    NotEqual,
    And,
    Or,
    /// `a ?: b`: `a` unless it is null.
    Elvis,
    /// `a in b`: membership in a list, map keys or substring.
    In,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Remainder => "%",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::GreaterOrEqual => ">=",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Elvis => "?:",
            BinaryOperator::In => "in",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostfixOperator {
    Increment,
    Decrement,
    /// `x!!`
    NotNull,
}

impl PostfixOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            PostfixOperator::Increment => "++",
            PostfixOperator::Decrement => "--",
            PostfixOperator::NotNull => "!!",
        }
    }
}

impl fmt::Display for PostfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// An expression attached to a directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    NullLiteral,
    StringLiteral(String),
    IntLiteral(i32),
    LongLiteral(i64),
    FloatLiteral(f32),
    DoubleLiteral(f64),
    CharLiteral(char),
    BooleanLiteral(bool),

    /// A possibly dotted property path such as `project.name`.
    VariableRef(String),

    BinaryOp {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    PostfixOp {
        operator: PostfixOperator,
        target: Box<Expression>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expression>,
    },
    /// A method call; without a receiver it names a top-level function.
    MethodCall {
        receiver: Option<Box<Expression>>,
        name: String,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn variable(name: impl Into<String>) -> Self {
        Expression::VariableRef(name.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expression::StringLiteral(s.into())
    }

    pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::BinaryOp {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn postfix(operator: PostfixOperator, target: Expression) -> Self {
        Expression::PostfixOp {
            operator,
            target: Box::new(target),
        }
    }

    pub fn call(receiver: Option<Expression>, name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::MethodCall {
            receiver: receiver.map(Box::new),
            name: name.into(),
            args,
        }
    }

    pub fn lambda(params: Vec<String>, body: Expression) -> Self {
        Expression::Lambda {
            params,
            body: Box::new(body),
        }
    }

    fn is_atomic(&self) -> bool {
        !matches!(self, Expression::BinaryOp { .. })
    }
}

/// Prints the expression back in source form.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::NullLiteral => f.write_str("null"),
            Expression::StringLiteral(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        '$' => f.write_str("\\$")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
            Expression::IntLiteral(n) => write!(f, "{}", n),
            Expression::LongLiteral(n) => write!(f, "{}L", n),
            Expression::FloatLiteral(n) => write!(f, "{:?}f", n),
            Expression::DoubleLiteral(n) => write!(f, "{:?}", n),
            Expression::CharLiteral(c) => match c {
                '\'' => f.write_str("'\\''"),
                '\\' => f.write_str("'\\\\'"),
                '\n' => f.write_str("'\\n'"),
                '\t' => f.write_str("'\\t'"),
                c => write!(f, "'{}'", c),
            },
            Expression::BooleanLiteral(b) => write!(f, "{}", b),
            Expression::VariableRef(name) => f.write_str(name),
            Expression::BinaryOp {
                operator,
                left,
                right,
            } => {
                write_operand(f, left)?;
                write!(f, " {} ", operator)?;
                write_operand(f, right)
            }
            Expression::PostfixOp { operator, target } => {
                write_operand(f, target)?;
                write!(f, "{}", operator)
            }
            Expression::Lambda { params, body } => {
                if params.len() == 1 && params[0] == "it" {
                    write!(f, "{{ {} }}", body)
                } else {
                    write!(f, "{{ {} -> {} }}", params.join(", "), body)
                }
            }
            Expression::MethodCall {
                receiver,
                name,
                args,
            } => {
                if let Some(receiver) = receiver {
                    write_operand(f, receiver)?;
                    f.write_str(".")?;
                }
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expression) -> fmt::Result {
    if expr.is_atomic() {
        write!(f, "{}", expr)
    } else {
        write!(f, "({})", expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_nested_operators_with_parentheses() {
        let expr = Expression::binary(
            BinaryOperator::Multiply,
            Expression::binary(
                BinaryOperator::Add,
                Expression::IntLiteral(1),
                Expression::variable("x"),
            ),
            Expression::postfix(PostfixOperator::NotNull, Expression::variable("y")),
        );
        assert_eq!(expr.to_string(), "(1 + x) * y!!");
    }

    #[test]
    fn prints_calls_and_lambdas() {
        let expr = Expression::call(
            Some(Expression::variable("items")),
            "map",
            vec![Expression::lambda(
                vec!["it".into()],
                Expression::call(Some(Expression::variable("it")), "uppercase", vec![]),
            )],
        );
        assert_eq!(expr.to_string(), "items.map({ it.uppercase() })");
        assert_eq!(Expression::string("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(Expression::LongLiteral(3).to_string(), "3L");
        assert_eq!(Expression::DoubleLiteral(1.0).to_string(), "1.0");
    }
}
