//! A small arithmetic evaluator.
//!
//! Supports integer and float literals, `+ - * / // % **`, unary signs,
//! parentheses and a handful of functions (see [`FUNCTIONS`]). Integers stay
//! integers until an operation needs a float, `/` always produces one.
//! Nothing else is accepted, in particular no names other than the
//! functions.

use std::fmt::{self, Display};

/// Functions callable from an expression.
pub const FUNCTIONS: &[&str] =
    &["abs", "sqrt", "exp", "log", "log10", "sin", "cos", "tan"];

const MAX_DEPTH: usize = 64;

/// Why an expression could not be evaluated.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The input has no tokens.
    #[error("empty expression")]
    Empty,
    /// A character outside the grammar.
    #[error("invalid character '{0}'")]
    InvalidCharacter(char),
    /// A name that isn't a known function.
    #[error("name '{0}' is not allowed")]
    UnknownName(String),
    /// The tokens don't form an expression.
    #[error("invalid syntax: {0}")]
    Syntax(String),
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Integer arithmetic left the 64-bit range.
    #[error("integer overflow")]
    Overflow,
    /// The result is infinite or not a number.
    #[error("result is not a finite number")]
    NonFinite,
}

/// Evaluates `expression` and renders the result.
///
/// Floats always carry a fractional part, so `4 / 2` gives `2.0` while
/// `2 + 2 * 5` gives `12`.
pub fn evaluate(expression: &str) -> Result<String, EvalError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(EvalError::Syntax(format!("unexpected {token}")));
    }
    Ok(value.to_string())
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn finite(f: f64) -> Result<Number, EvalError> {
        if f.is_finite() {
            Ok(Number::Float(f))
        } else {
            Err(EvalError::NonFinite)
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(x) if x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{x:.1}")
            }
            Number::Float(x) if x.abs() >= 1e16 => write!(f, "{x:e}"),
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(Number),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    StarStar,
    LParen,
    RParen,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {n}"),
            Token::Ident(name) => write!(f, "name '{name}'"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::SlashSlash => f.write_str("'//'"),
            Token::Percent => f.write_str("'%'"),
            Token::StarStar => f.write_str("'**'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = vec![];
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let (token, len) = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '0'..='9' | '.' => {
                let (number, len) = scan_number(&chars[i..])?;
                (Token::Number(number), len)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let len = chars[i..]
                    .iter()
                    .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                    .count();
                let name: String = chars[i..i + len].iter().collect();
                if !FUNCTIONS.contains(&name.as_str()) {
                    return Err(EvalError::UnknownName(name));
                }
                (Token::Ident(name), len)
            }
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' if next == Some('*') => (Token::StarStar, 2),
            '*' => (Token::Star, 1),
            '/' if next == Some('/') => (Token::SlashSlash, 2),
            '/' => (Token::Slash, 1),
            '%' => (Token::Percent, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            other => return Err(EvalError::InvalidCharacter(other)),
        };
        tokens.push(token);
        i += len;
    }
    Ok(tokens)
}

/// Scans a numeric literal at the start of `chars`.
fn scan_number(chars: &[char]) -> Result<(Number, usize), EvalError> {
    let digits = |from: usize| {
        chars[from..].iter().take_while(|c| c.is_ascii_digit()).count()
    };

    let mut len = digits(0);
    let mut is_float = false;
    if chars.get(len) == Some(&'.') {
        is_float = true;
        len += 1 + digits(len + 1);
    }
    if len == 1 && is_float {
        return Err(EvalError::Syntax("lone '.'".to_owned()));
    }
    if matches!(chars.get(len), Some('e' | 'E')) {
        let mut end = len + 1;
        if matches!(chars.get(end), Some('+' | '-')) {
            end += 1;
        }
        let exp_digits = digits(end);
        if exp_digits == 0 {
            return Err(EvalError::Syntax("malformed exponent".to_owned()));
        }
        is_float = true;
        len = end + exp_digits;
    }

    let text: String = chars[..len].iter().collect();
    let number = if is_float {
        let f: f64 = text
            .parse()
            .map_err(|_| EvalError::Syntax(format!("bad number {text}")))?;
        Number::finite(f)?
    } else {
        Number::Int(text.parse().map_err(|_| EvalError::Overflow)?)
    };
    Ok((number, len))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), EvalError> {
        match self.next() {
            Some(t) if &t == token => Ok(()),
            Some(t) => {
                Err(EvalError::Syntax(format!("expected {token}, found {t}")))
            }
            None => Err(EvalError::Syntax(format!("expected {token}"))),
        }
    }

    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, EvalError>,
    ) -> Result<T, EvalError> {
        if self.depth >= MAX_DEPTH {
            return Err(EvalError::Syntax("nested too deeply".to_owned()));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Number, EvalError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => Token::Plus,
                Some(Token::Minus) => Token::Minus,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = binary(&op, lhs, rhs)?;
        }
    }

    // term := unary (('*' | '/' | '//' | '%') unary)*
    fn term(&mut self) -> Result<Number, EvalError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(
                    op @ (Token::Star
                    | Token::Slash
                    | Token::SlashSlash
                    | Token::Percent),
                ) => op.clone(),
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = binary(&op, lhs, rhs)?;
        }
    }

    // unary := ('+' | '-') unary | power
    fn unary(&mut self) -> Result<Number, EvalError> {
        if self.eat(&Token::Minus) {
            return match self.nested(Self::unary)? {
                Number::Int(i) => {
                    i.checked_neg().map(Number::Int).ok_or(EvalError::Overflow)
                }
                Number::Float(f) => Ok(Number::Float(-f)),
            };
        }
        if self.eat(&Token::Plus) {
            return self.nested(Self::unary);
        }
        self.power()
    }

    // power := atom ('**' unary)?
    fn power(&mut self) -> Result<Number, EvalError> {
        let base = self.atom()?;
        if self.eat(&Token::StarStar) {
            let exp = self.nested(Self::unary)?;
            return binary(&Token::StarStar, base, exp);
        }
        Ok(base)
    }

    // atom := number | function '(' expr ')' | '(' expr ')'
    fn atom(&mut self) -> Result<Number, EvalError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.nested(Self::expr)?;
                self.expect(&Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                self.expect(&Token::LParen)?;
                let arg = self.nested(Self::expr)?;
                self.expect(&Token::RParen)?;
                call(&name, arg)
            }
            Some(token) => {
                Err(EvalError::Syntax(format!("unexpected {token}")))
            }
            None => Err(EvalError::Syntax("unexpected end".to_owned())),
        }
    }
}

fn binary(op: &Token, lhs: Number, rhs: Number) -> Result<Number, EvalError> {
    use Number::{Float, Int};

    let value = match (lhs, rhs) {
        (Int(a), Int(b)) => int_binary(op, a, b)?,
        _ => float_binary(op, lhs.as_f64(), rhs.as_f64())?,
    };
    match value {
        Float(f) => Number::finite(f),
        Int(_) => Ok(value),
    }
}

fn int_binary(op: &Token, a: i64, b: i64) -> Result<Number, EvalError> {
    let checked = |r: Option<i64>| r.map(Number::Int).ok_or(EvalError::Overflow);
    match op {
        Token::Plus => checked(a.checked_add(b)),
        Token::Minus => checked(a.checked_sub(b)),
        Token::Star => checked(a.checked_mul(b)),
        Token::Slash => float_binary(op, a as f64, b as f64),
        Token::SlashSlash | Token::Percent if b == 0 => {
            Err(EvalError::DivisionByZero)
        }
        // Rounds toward negative infinity.
        Token::SlashSlash => {
            let q = a.checked_div(b).ok_or(EvalError::Overflow)?;
            if (a % b != 0) && ((a < 0) != (b < 0)) {
                checked(q.checked_sub(1))
            } else {
                Ok(Number::Int(q))
            }
        }
        // Takes the sign of the divisor.
        Token::Percent => {
            let r = a.checked_rem(b).ok_or(EvalError::Overflow)?;
            if r != 0 && ((r < 0) != (b < 0)) {
                Ok(Number::Int(r + b))
            } else {
                Ok(Number::Int(r))
            }
        }
        Token::StarStar if b < 0 => float_binary(op, a as f64, b as f64),
        Token::StarStar => {
            let exp = u32::try_from(b).map_err(|_| EvalError::Overflow)?;
            checked(a.checked_pow(exp))
        }
        _ => Err(EvalError::Syntax(format!("{op} is not an operator"))),
    }
}

fn float_binary(op: &Token, a: f64, b: f64) -> Result<Number, EvalError> {
    let zero_divisor = b == 0.0;
    let value = match op {
        Token::Plus => a + b,
        Token::Minus => a - b,
        Token::Star => a * b,
        Token::Slash if zero_divisor => return Err(EvalError::DivisionByZero),
        Token::Slash => a / b,
        Token::SlashSlash if zero_divisor => {
            return Err(EvalError::DivisionByZero);
        }
        Token::SlashSlash => (a / b).floor(),
        Token::Percent if zero_divisor => return Err(EvalError::DivisionByZero),
        Token::Percent => {
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
        }
        Token::StarStar if a == 0.0 && b < 0.0 => {
            return Err(EvalError::DivisionByZero);
        }
        Token::StarStar => a.powf(b),
        _ => return Err(EvalError::Syntax(format!("{op} is not an operator"))),
    };
    Ok(Number::Float(value))
}

fn call(name: &str, arg: Number) -> Result<Number, EvalError> {
    if name == "abs" {
        return match arg {
            Number::Int(i) => {
                i.checked_abs().map(Number::Int).ok_or(EvalError::Overflow)
            }
            Number::Float(f) => Ok(Number::Float(f.abs())),
        };
    }

    let x = arg.as_f64();
    let value = match name {
        "sqrt" => x.sqrt(),
        "exp" => x.exp(),
        "log" => x.ln(),
        "log10" => x.log10(),
        "sin" => x.sin(),
        "cos" => x.cos(),
        "tan" => x.tan(),
        _ => return Err(EvalError::UnknownName(name.to_owned())),
    };
    Number::finite(value)
}
