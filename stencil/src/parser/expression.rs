use std::ops::Range;

use crate::expression::{BinaryOperator, Expression, PostfixOperator};
use crate::parser::error::ParseError;

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Char(char),
    True,
    False,
    Null,

    Ident(String),
    In,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    BangEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    AmpAmp,
    PipePipe,
    Bang,
    BangBang,
    PlusPlus,
    MinusMinus,
    Elvis,
    Dot,
    Comma,
    Arrow,

    // Grouping
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
}

fn describe(token: &Token) -> String {
    match token {
        Token::Int(n) => n.to_string(),
        Token::Long(n) => format!("{}L", n),
        Token::Float(n) => format!("{}f", n),
        Token::Double(n) => n.to_string(),
        Token::Str(_) => "string literal".to_string(),
        Token::Char(_) => "character literal".to_string(),
        Token::True => "true".to_string(),
        Token::False => "false".to_string(),
        Token::Null => "null".to_string(),
        Token::Ident(name) => format!("identifier '{}'", name),
        Token::In => "in".to_string(),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::Percent => "'%'".to_string(),
        Token::EqEq => "'=='".to_string(),
        Token::BangEq => "'!='".to_string(),
        Token::Lt => "'<'".to_string(),
        Token::Gt => "'>'".to_string(),
        Token::LtEq => "'<='".to_string(),
        Token::GtEq => "'>='".to_string(),
        Token::AmpAmp => "'&&'".to_string(),
        Token::PipePipe => "'||'".to_string(),
        Token::Bang => "'!'".to_string(),
        Token::BangBang => "'!!'".to_string(),
        Token::PlusPlus => "'++'".to_string(),
        Token::MinusMinus => "'--'".to_string(),
        Token::Elvis => "'?:'".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Arrow => "'->'".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::LBrace => "'{'".to_string(),
        Token::RBrace => "'}'".to_string(),
        Token::LBracket => "'['".to_string(),
        Token::RBracket => "']'".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a standalone expression.
pub fn parse_expression(source: &str) -> Result<Expression, ParseError> {
    parse_expression_at(source, 0, 0)
}

/// Parse a comma-separated list of expressions, as used by `is` clauses.
pub fn parse_expression_list(source: &str) -> Result<Vec<Expression>, ParseError> {
    parse_expression_list_at(source, 0, 0)
}

/// Parse an expression embedded at `base` in file `file_id`, so spans in
/// errors point into the enclosing template.
pub(crate) fn parse_expression_at(
    source: &str,
    base: usize,
    file_id: usize,
) -> Result<Expression, ParseError> {
    let tokens = tokenize(source, base, file_id)?;
    let mut parser = ExprParser::new(tokens, base + source.len(), file_id);
    let expr = parser.parse_expr(0)?;
    parser.expect_end()?;
    Ok(expr)
}

pub(crate) fn parse_expression_list_at(
    source: &str,
    base: usize,
    file_id: usize,
) -> Result<Vec<Expression>, ParseError> {
    let tokens = tokenize(source, base, file_id)?;
    let mut parser = ExprParser::new(tokens, base + source.len(), file_id);
    let mut items = vec![parser.parse_expr(0)?];
    while parser.eat(&Token::Comma) {
        items.push(parser.parse_expr(0)?);
    }
    parser.expect_end()?;
    Ok(items)
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

struct Lexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    base: usize,
    file_id: usize,
}

fn tokenize(
    source: &str,
    base: usize,
    file_id: usize,
) -> Result<Vec<(Token, Range<usize>)>, ParseError> {
    let mut lexer = Lexer {
        source,
        chars: source.char_indices().collect(),
        pos: 0,
        base,
        file_id,
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(i, _)| i)
            .unwrap_or(self.source.len())
    }

    fn span_from(&self, start: usize) -> Range<usize> {
        self.base + start..self.base + self.offset()
    }

    fn error(&self, message: impl Into<String>, start: usize) -> ParseError {
        let mut span = self.span_from(start);
        if span.is_empty() {
            span.end += 1;
        }
        ParseError::new(message, span, self.file_id)
    }

    fn next_token(&mut self) -> Result<Option<(Token, Range<usize>)>, ParseError> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let start = self.offset();

        if c.is_ascii_digit() {
            let token = self.lex_number(start)?;
            return Ok(Some((token, self.span_from(start))));
        }
        if c.is_alphabetic() || c == '_' {
            let token = self.lex_word();
            return Ok(Some((token, self.span_from(start))));
        }
        if c == '"' {
            self.pos += 1;
            let s = self.lex_quoted('"', start)?;
            return Ok(Some((Token::Str(s), self.span_from(start))));
        }
        if c == '\'' {
            self.pos += 1;
            let s = self.lex_quoted('\'', start)?;
            let mut chars = s.chars();
            return match (chars.next(), chars.next()) {
                (Some(ch), None) => Ok(Some((Token::Char(ch), self.span_from(start)))),
                _ => Err(self.error("character literal must hold exactly one character", start)),
            };
        }

        let two = match (c, self.peek_at(1)) {
            ('=', Some('=')) => Some(Token::EqEq),
            ('!', Some('=')) => Some(Token::BangEq),
            ('!', Some('!')) => Some(Token::BangBang),
            ('<', Some('=')) => Some(Token::LtEq),
            ('>', Some('=')) => Some(Token::GtEq),
            ('&', Some('&')) => Some(Token::AmpAmp),
            ('|', Some('|')) => Some(Token::PipePipe),
            ('+', Some('+')) => Some(Token::PlusPlus),
            ('-', Some('>')) => Some(Token::Arrow),
            ('-', Some('-')) => Some(Token::MinusMinus),
            ('?', Some(':')) => Some(Token::Elvis),
            _ => None,
        };
        if let Some(token) = two {
            self.pos += 2;
            return Ok(Some((token, self.span_from(start))));
        }

        let one = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '<' => Token::Lt,
            '>' => Token::Gt,
            '!' => Token::Bang,
            '.' => Token::Dot,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            other => {
                self.pos += 1;
                return Err(self.error(format!("unexpected character '{}'", other), start));
            }
        };
        self.pos += 1;
        Ok(Some((one, self.span_from(start))))
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, ParseError> {
        let mut digits = String::new();
        let mut is_float = false;

        self.take_digits(&mut digits);
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            digits.push('.');
            self.pos += 1;
            self.take_digits(&mut digits);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = matches!(self.peek_at(1), Some('+' | '-'));
            let first = if sign { self.peek_at(2) } else { self.peek_at(1) };
            if first.is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                digits.push('e');
                self.pos += 1;
                if sign {
                    digits.extend(self.peek());
                    self.pos += 1;
                }
                self.take_digits(&mut digits);
            }
        }

        match self.peek() {
            Some('L') => {
                self.pos += 1;
                if is_float {
                    return Err(self.error("a floating-point literal cannot be Long", start));
                }
                digits
                    .parse::<i64>()
                    .map(Token::Long)
                    .map_err(|_| self.error("integer literal out of range", start))
            }
            Some('f' | 'F') => {
                self.pos += 1;
                digits
                    .parse::<f32>()
                    .map(Token::Float)
                    .map_err(|_| self.error("malformed Float literal", start))
            }
            _ if is_float => digits
                .parse::<f64>()
                .map(Token::Double)
                .map_err(|_| self.error("malformed Double literal", start)),
            _ => {
                let n = digits
                    .parse::<i64>()
                    .map_err(|_| self.error("integer literal out of range", start))?;
                Ok(match i32::try_from(n) {
                    Ok(n) => Token::Int(n),
                    Err(_) => Token::Long(n),
                })
            }
        }
    }

    fn take_digits(&mut self, out: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                out.push(c);
            } else if c != '_' {
                break;
            }
            self.pos += 1;
        }
    }

    fn lex_word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            word.push(c);
            self.pos += 1;
        }
        match word.as_str() {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "in" => Token::In,
            _ => Token::Ident(word),
        }
    }

    /// Lex the rest of a quoted literal; the opening quote is already consumed.
    fn lex_quoted(&mut self, quote: char, start: usize) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error("unterminated literal", start));
            };
            self.pos += 1;
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let Some(escaped) = self.peek() else {
                return Err(self.error("unterminated escape sequence", start));
            };
            self.pos += 1;
            match escaped {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{8}'),
                '"' | '\'' | '\\' | '$' => out.push(escaped),
                'u' => {
                    let hex: String = (0..4).filter_map(|i| self.peek_at(i)).collect();
                    let code = u32::from_str_radix(&hex, 16)
                        .ok()
                        .filter(|_| hex.len() == 4)
                        .and_then(char::from_u32)
                        .ok_or_else(|| self.error("malformed unicode escape", start))?;
                    self.pos += 4;
                    out.push(code);
                }
                other => {
                    return Err(self.error(format!("unknown escape sequence '\\{}'", other), start));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pratt parser
// ---------------------------------------------------------------------------

struct ExprParser {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    /// Offset just past the expression source, for end-of-input errors.
    end: usize,
    file_id: usize,
}

// Binding powers, loosest first. Binary operators are left-associative.
const BP_OR: u8 = 2; // ||
const BP_AND: u8 = 4; // &&
const BP_EQUALITY: u8 = 6; // == !=
const BP_COMPARISON: u8 = 8; // < > <= >=
const BP_IN: u8 = 10; // in
const BP_ELVIS: u8 = 12; // ?:
const BP_ADDITIVE: u8 = 14; // + -
const BP_MULTIPLICATIVE: u8 = 16; // * / %
const BP_PREFIX: u8 = 18; // ! -

fn infix(token: &Token) -> Option<(u8, BinaryOperator)> {
    let entry = match token {
        Token::PipePipe => (BP_OR, BinaryOperator::Or),
        Token::AmpAmp => (BP_AND, BinaryOperator::And),
        Token::EqEq => (BP_EQUALITY, BinaryOperator::Equal),
        Token::BangEq => (BP_EQUALITY, BinaryOperator::NotEqual),
        Token::Lt => (BP_COMPARISON, BinaryOperator::Less),
        Token::Gt => (BP_COMPARISON, BinaryOperator::Greater),
        Token::LtEq => (BP_COMPARISON, BinaryOperator::LessOrEqual),
        Token::GtEq => (BP_COMPARISON, BinaryOperator::GreaterOrEqual),
        Token::In => (BP_IN, BinaryOperator::In),
        Token::Elvis => (BP_ELVIS, BinaryOperator::Elvis),
        Token::Plus => (BP_ADDITIVE, BinaryOperator::Add),
        Token::Minus => (BP_ADDITIVE, BinaryOperator::Subtract),
        Token::Star => (BP_MULTIPLICATIVE, BinaryOperator::Multiply),
        Token::Slash => (BP_MULTIPLICATIVE, BinaryOperator::Divide),
        Token::Percent => (BP_MULTIPLICATIVE, BinaryOperator::Remainder),
        _ => return None,
    };
    Some(entry)
}

impl ExprParser {
    fn new(tokens: Vec<(Token, Range<usize>)>, end: usize, file_id: usize) -> Self {
        ExprParser {
            tokens,
            pos: 0,
            end,
            file_id,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_is(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn advance(&mut self) -> Option<(Token, Range<usize>)> {
        let next = self.tokens.get(self.pos).cloned();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek_is(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn current_span(&self) -> Range<usize> {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.clone())
            .unwrap_or(self.end..self.end)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.current_span(), self.file_id)
    }

    fn expect(&mut self, token: Token, message: &str) -> Result<(), ParseError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn expect_ident(&mut self, message: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(message)),
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(self.error(format!(
                "unexpected {} after expression",
                describe(token)
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Pratt parser core
    // ------------------------------------------------------------------

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expression, ParseError> {
        let mut left = self.parse_prefix()?;

        while let Some((bp, operator)) = self.peek().and_then(infix) {
            if bp < min_bp {
                break;
            }
            self.pos += 1;
            let right = self.parse_expr(bp + 1)?;
            left = Expression::binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expression, ParseError> {
        if self.eat(&Token::Bang) {
            let operand = self.parse_expr(BP_PREFIX)?;
            return Ok(Expression::call(Some(operand), "not", vec![]));
        }
        if self.eat(&Token::Minus) {
            let operand = self.parse_expr(BP_PREFIX)?;
            return Ok(match operand {
                Expression::IntLiteral(n) => Expression::IntLiteral(n.wrapping_neg()),
                Expression::LongLiteral(n) => Expression::LongLiteral(n.wrapping_neg()),
                Expression::FloatLiteral(n) => Expression::FloatLiteral(-n),
                Expression::DoubleLiteral(n) => Expression::DoubleLiteral(-n),
                other => Expression::call(Some(other), "unaryMinus", vec![]),
            });
        }
        let (primary, chainable) = self.parse_primary()?;
        self.parse_postfix(primary, chainable)
    }

    /// Returns the primary expression and whether it is a bare property path
    /// that later `.name` segments may extend.
    fn parse_primary(&mut self) -> Result<(Expression, bool), ParseError> {
        let Some((token, _)) = self.advance() else {
            return Err(self.error("expected an expression"));
        };

        let expr = match token {
            Token::Int(n) => Expression::IntLiteral(n),
            Token::Long(n) => Expression::LongLiteral(n),
            Token::Float(n) => Expression::FloatLiteral(n),
            Token::Double(n) => Expression::DoubleLiteral(n),
            Token::Str(s) => Expression::StringLiteral(s),
            Token::Char(c) => Expression::CharLiteral(c),
            Token::True => Expression::BooleanLiteral(true),
            Token::False => Expression::BooleanLiteral(false),
            Token::Null => Expression::NullLiteral,

            Token::Ident(name) => {
                if self.peek_is(&Token::LParen) {
                    let args = self.parse_call_args()?;
                    Expression::call(None, name, args)
                } else {
                    return Ok((Expression::VariableRef(name), true));
                }
            }

            Token::LParen => {
                let inner = self.parse_expr(0)?;
                self.expect(Token::RParen, "expected ')' to close the group")?;
                inner
            }

            Token::LBrace => self.parse_lambda()?,

            other => {
                self.pos -= 1;
                return Err(self.error(format!("unexpected {}", describe(&other))));
            }
        };
        Ok((expr, false))
    }

    fn parse_postfix(
        &mut self,
        mut expr: Expression,
        mut chainable: bool,
    ) -> Result<Expression, ParseError> {
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = self.expect_ident("expected a member name after '.'")?;
                    if self.peek_is(&Token::LParen) || self.peek_is(&Token::LBrace) {
                        let args = self.parse_call_args()?;
                        expr = Expression::call(Some(expr), name, args);
                        chainable = false;
                    } else if chainable {
                        if let Expression::VariableRef(path) = &mut expr {
                            path.push('.');
                            path.push_str(&name);
                        }
                    } else {
                        expr = Expression::call(Some(expr), name, vec![]);
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_expr(0)?;
                    self.expect(Token::RBracket, "expected ']' to close the index")?;
                    expr = Expression::call(Some(expr), "get", vec![index]);
                    chainable = false;
                }
                Some(Token::PlusPlus) => {
                    self.pos += 1;
                    expr = Expression::postfix(PostfixOperator::Increment, expr);
                    chainable = false;
                }
                Some(Token::MinusMinus) => {
                    self.pos += 1;
                    expr = Expression::postfix(PostfixOperator::Decrement, expr);
                    chainable = false;
                }
                Some(Token::BangBang) => {
                    self.pos += 1;
                    expr = Expression::postfix(PostfixOperator::NotNull, expr);
                    chainable = false;
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Parse `(args)` and/or a trailing lambda.
    fn parse_call_args(&mut self) -> Result<Vec<Expression>, ParseError> {
        let mut args = Vec::new();
        if self.eat(&Token::LParen) {
            while !self.peek_is(&Token::RParen) {
                args.push(self.parse_expr(0)?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::RParen, "expected ')' to close the argument list")?;
        }
        if self.eat(&Token::LBrace) {
            args.push(self.parse_lambda()?);
        }
        Ok(args)
    }

    /// Parse a lambda after its opening brace.
    fn parse_lambda(&mut self) -> Result<Expression, ParseError> {
        let params = match self.arrow_params() {
            Some(params) => params,
            None => vec!["it".to_string()],
        };
        if self.eat(&Token::RBrace) {
            return Ok(Expression::lambda(params, Expression::NullLiteral));
        }
        let body = self.parse_expr(0)?;
        self.expect(Token::RBrace, "expected '}' to close the lambda")?;
        Ok(Expression::lambda(params, body))
    }

    /// Consume `a, b ->` if present and return the parameter names.
    fn arrow_params(&mut self) -> Option<Vec<String>> {
        let mut i = self.pos;
        let mut params = Vec::new();
        loop {
            match self.tokens.get(i) {
                Some((Token::Arrow, _)) if params.is_empty() => {
                    self.pos = i + 1;
                    return Some(params);
                }
                Some((Token::Ident(name), _)) => params.push(name.clone()),
                _ => return None,
            }
            i += 1;
            match self.tokens.get(i) {
                Some((Token::Arrow, _)) => {
                    self.pos = i + 1;
                    return Some(params);
                }
                Some((Token::Comma, _)) => i += 1,
                _ => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Expression {
        parse_expression(source).expect("expression should parse")
    }

    #[test]
    fn literals() {
        assert_eq!(parse("null"), Expression::NullLiteral);
        assert_eq!(parse("42"), Expression::IntLiteral(42));
        assert_eq!(parse("42L"), Expression::LongLiteral(42));
        assert_eq!(parse("3000000000"), Expression::LongLiteral(3_000_000_000));
        assert_eq!(parse("1_000"), Expression::IntLiteral(1000));
        assert_eq!(parse("1.5"), Expression::DoubleLiteral(1.5));
        assert_eq!(parse("2.5f"), Expression::FloatLiteral(2.5));
        assert_eq!(parse("1e3"), Expression::DoubleLiteral(1000.0));
        assert_eq!(parse("-7"), Expression::IntLiteral(-7));
        assert_eq!(parse("'x'"), Expression::CharLiteral('x'));
        assert_eq!(parse(r#""a\n\"b\" \$x""#), Expression::string("a\n\"b\" $x"));
        assert_eq!(parse("true"), Expression::BooleanLiteral(true));
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(parse("1 + 2 * 3").to_string(), "1 + (2 * 3)");
        assert_eq!(parse("(1 + 2) * 3").to_string(), "(1 + 2) * 3");
        assert_eq!(parse("a - b - c").to_string(), "(a - b) - c");
        assert_eq!(parse("a || b && c").to_string(), "a || (b && c)");
        assert_eq!(parse("a == b < c").to_string(), "a == (b < c)");
        assert_eq!(parse("x ?: 1 + 2").to_string(), "x ?: (1 + 2)");
        assert_eq!(parse("a in xs && b").to_string(), "(a in xs) && b");
    }

    #[test]
    fn dotted_paths_stay_variable_refs() {
        assert_eq!(parse("project.name"), Expression::variable("project.name"));
        assert_eq!(parse("items.size"), Expression::variable("items.size"));
    }

    #[test]
    fn method_calls() {
        assert_eq!(
            parse("project.name.uppercase()"),
            Expression::call(Some(Expression::variable("project.name")), "uppercase", vec![])
        );
        assert_eq!(
            parse("listOf(1, 2)"),
            Expression::call(
                None,
                "listOf",
                vec![Expression::IntLiteral(1), Expression::IntLiteral(2)]
            )
        );
        assert_eq!(
            parse("\"abc\".length"),
            Expression::call(Some(Expression::string("abc")), "length", vec![])
        );
        assert_eq!(
            parse("xs[0]"),
            Expression::call(Some(Expression::variable("xs")), "get", vec![Expression::IntLiteral(0)])
        );
    }

    #[test]
    fn lambdas() {
        assert_eq!(parse("xs.map { it * 2 }").to_string(), "xs.map({ it * 2 })");
        assert_eq!(
            parse("xs.joinToString(\", \") { a -> a.name }").to_string(),
            "xs.joinToString(\", \", { a -> a.name })"
        );
        assert_eq!(
            parse("{ a, b -> a + b }"),
            Expression::lambda(
                vec!["a".into(), "b".into()],
                Expression::binary(
                    BinaryOperator::Add,
                    Expression::variable("a"),
                    Expression::variable("b")
                )
            )
        );
        assert_eq!(parse("{ -> 1 }"), Expression::lambda(vec![], Expression::IntLiteral(1)));
    }

    #[test]
    fn prefix_and_postfix() {
        assert_eq!(parse("!flag").to_string(), "flag.not()");
        assert_eq!(parse("-x").to_string(), "x.unaryMinus()");
        assert_eq!(parse("!xs.isEmpty()").to_string(), "xs.isEmpty().not()");
        assert_eq!(
            parse("count++"),
            Expression::postfix(PostfixOperator::Increment, Expression::variable("count"))
        );
        assert_eq!(parse("name!!.length").to_string(), "name!!.length()");
    }

    #[test]
    fn lists_for_clauses() {
        let items = parse_expression_list("\"a\", 2, true").unwrap();
        assert_eq!(
            items,
            vec![
                Expression::string("a"),
                Expression::IntLiteral(2),
                Expression::BooleanLiteral(true)
            ]
        );
    }

    #[test]
    fn errors_carry_offset_spans() {
        let err = parse_expression_at("1 + ", 10, 3).unwrap_err();
        assert_eq!(err.span, 14..14);
        assert_eq!(err.file_id, 3);

        let err = parse_expression("a b").unwrap_err();
        assert_eq!(err.message, "unexpected identifier 'b' after expression");
        assert_eq!(err.span, 2..3);

        assert!(parse_expression("\"open").is_err());
        assert!(parse_expression("a # b").is_err());
    }
}
