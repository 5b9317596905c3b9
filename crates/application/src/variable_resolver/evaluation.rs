//! Extended variable expression evaluator
//!
//! Evaluates the trailing text of references such as `${obj.attr}`,
//! `${items[1:]}` or `${count + 1}` against an already resolved base value.
//! The language is deliberately tiny: literals, attribute access,
//! indexing and slicing, arithmetic and comparisons. There are no names
//! besides `True`, `False` and `None`, and nothing can be called.

use std::cmp::Ordering;

use scopevar_domain::{AttributeAccess, IndexAccess, Slice, Value};

type EvalResult<T> = Result<T, String>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Op(&'static str),
}

/// Largest sequence `*` may build.
const MAX_REPEAT_LEN: usize = 1 << 24;

const OPERATORS: [&str; 19] = [
    "//", "==", "!=", "<=", ">=", "+", "-", "*", "/", "%", "(", ")", "[", "]", ".", ",", ":",
    "<", ">",
];

/// Evaluates `expression` with `base` as its implicit leading operand.
///
/// # Errors
///
/// Returns a Python-style error message when the expression is malformed
/// or an operation is not supported for the operand types.
pub fn evaluate_extended(base: &Value, expression: &str) -> EvalResult<Value> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        base: Some(base.clone()),
    };
    let value = parser.expression()?;
    if parser.position < parser.tokens.len() {
        return Err("SyntaxError: invalid syntax".to_string());
    }
    Ok(value)
}

fn tokenize(expression: &str) -> EvalResult<Vec<Token>> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;
    while index < chars.len() {
        let ch = chars[index];
        if ch.is_whitespace() {
            index += 1;
        } else if ch.is_ascii_digit() {
            let start = index;
            while index < chars.len() && (chars[index].is_ascii_digit() || chars[index] == '_') {
                index += 1;
            }
            let mut is_float = false;
            if index < chars.len() && chars[index] == '.' {
                is_float = true;
                index += 1;
                while index < chars.len() && chars[index].is_ascii_digit() {
                    index += 1;
                }
            }
            if index < chars.len() && matches!(chars[index], 'e' | 'E') {
                is_float = true;
                index += 1;
                if index < chars.len() && matches!(chars[index], '+' | '-') {
                    index += 1;
                }
                while index < chars.len() && chars[index].is_ascii_digit() {
                    index += 1;
                }
            }
            let text: String = chars[start..index].iter().filter(|c| **c != '_').collect();
            let token = if is_float {
                text.parse().map(Token::Float).ok()
            } else {
                text.parse().map(Token::Int).ok()
            };
            tokens.push(token.ok_or_else(|| format!("SyntaxError: invalid number '{text}'"))?);
        } else if ch.is_alphabetic() || ch == '_' {
            let start = index;
            while index < chars.len() && (chars[index].is_alphanumeric() || chars[index] == '_') {
                index += 1;
            }
            tokens.push(Token::Name(chars[start..index].iter().collect()));
        } else if ch == '\'' || ch == '"' {
            let (text, consumed) = string_literal(&chars[index..])?;
            tokens.push(Token::Str(text));
            index += consumed;
        } else {
            let rest: String = chars[index..chars.len().min(index + 2)].iter().collect();
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .ok_or_else(|| format!("SyntaxError: invalid character '{ch}'"))?;
            tokens.push(Token::Op(op));
            index += op.len();
        }
    }
    Ok(tokens)
}

fn string_literal(chars: &[char]) -> EvalResult<(String, usize)> {
    let quote = chars[0];
    let mut text = String::new();
    let mut index = 1;
    while index < chars.len() {
        match chars[index] {
            c if c == quote => return Ok((text, index + 1)),
            '\\' if index + 1 < chars.len() => {
                index += 1;
                text.push(match chars[index] {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
            }
            c => text.push(c),
        }
        index += 1;
    }
    Err("SyntaxError: unterminated string literal".to_string())
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    base: Option<Value>,
}

impl Parser {
    fn peek_op(&self) -> Option<&'static str> {
        match self.tokens.get(self.position) {
            Some(Token::Op(op)) => Some(op),
            _ => None,
        }
    }

    fn eat(&mut self, op: &str) -> bool {
        if self.peek_op() == Some(op) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, op: &str) -> EvalResult<()> {
        if self.eat(op) {
            Ok(())
        } else {
            Err(format!("SyntaxError: expected '{op}'"))
        }
    }

    fn expression(&mut self) -> EvalResult<Value> {
        let left = self.additive()?;
        let Some(op) = self.peek_op() else {
            return Ok(left);
        };
        if !matches!(op, "==" | "!=" | "<" | "<=" | ">" | ">=") {
            return Ok(left);
        }
        self.position += 1;
        let right = self.additive()?;
        compare(op, &left, &right).map(Value::Bool)
    }

    fn additive(&mut self) -> EvalResult<Value> {
        let mut value = self.term()?;
        while let Some(op @ ("+" | "-")) = self.peek_op() {
            self.position += 1;
            let right = self.term()?;
            value = binary(op, &value, &right)?;
        }
        Ok(value)
    }

    fn term(&mut self) -> EvalResult<Value> {
        let mut value = self.unary()?;
        while let Some(op @ ("*" | "/" | "//" | "%")) = self.peek_op() {
            self.position += 1;
            let right = self.unary()?;
            value = binary(op, &value, &right)?;
        }
        Ok(value)
    }

    fn unary(&mut self) -> EvalResult<Value> {
        if self.base.is_none() {
            if self.eat("-") {
                return negate(&self.unary()?);
            }
            if self.eat("+") {
                return self.unary();
            }
        }
        self.postfix()
    }

    fn postfix(&mut self) -> EvalResult<Value> {
        let mut value = self.primary()?;
        loop {
            if self.eat(".") {
                let Some(Token::Name(name)) = self.tokens.get(self.position).cloned() else {
                    return Err("SyntaxError: invalid syntax".to_string());
                };
                self.position += 1;
                value = value.attribute(&name).ok_or_else(|| {
                    format!(
                        "AttributeError: '{}' object has no attribute '{name}'",
                        value.type_name()
                    )
                })?;
            } else if self.eat("[") {
                value = self.subscript(&value)?;
                self.expect("]")?;
            } else if self.peek_op() == Some("(") {
                return Err("TypeError: calling is not supported".to_string());
            } else {
                return Ok(value);
            }
        }
    }

    fn primary(&mut self) -> EvalResult<Value> {
        if let Some(base) = self.base.take() {
            return Ok(base);
        }
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or_else(|| "SyntaxError: unexpected end of expression".to_string())?;
        self.position += 1;
        match token {
            Token::Int(number) => Ok(Value::Int(number)),
            Token::Float(number) => Ok(Value::Float(number)),
            Token::Str(text) => Ok(Value::String(text)),
            Token::Name(name) => match name.as_str() {
                "True" => Ok(Value::Bool(true)),
                "False" => Ok(Value::Bool(false)),
                "None" => Ok(Value::None),
                _ => Err(format!("NameError: name '{name}' is not defined")),
            },
            Token::Op("(") => {
                let value = self.expression()?;
                self.expect(")")?;
                Ok(value)
            }
            Token::Op("[") => {
                let mut items = Vec::new();
                while !self.eat("]") {
                    items.push(self.expression()?);
                    if !self.eat(",") {
                        self.expect("]")?;
                        break;
                    }
                }
                Ok(Value::list(items))
            }
            Token::Op(_) => Err("SyntaxError: invalid syntax".to_string()),
        }
    }

    fn slice_bound(&mut self) -> EvalResult<Option<i64>> {
        if matches!(self.peek_op(), Some(":" | "]")) {
            return Ok(None);
        }
        match self.expression()? {
            Value::Int(number) => Ok(Some(number)),
            Value::None => Ok(None),
            other => Err(format!(
                "TypeError: slice indices must be integers or None, not {}",
                other.type_name()
            )),
        }
    }

    fn subscript(&mut self, value: &Value) -> EvalResult<Value> {
        let checkpoint = self.position;
        let first = self.slice_bound_or_key()?;
        if !self.eat(":") {
            return index(value, first);
        }
        self.position = checkpoint;
        let start = self.slice_bound()?;
        self.expect(":")?;
        let stop = self.slice_bound()?;
        let step = if self.eat(":") { self.slice_bound()? } else { None };
        value
            .slice(Slice { start, stop, step })
            .map_err(|message| format!("TypeError: {message}"))
    }

    fn slice_bound_or_key(&mut self) -> EvalResult<Option<Value>> {
        if self.peek_op() == Some(":") {
            return Ok(None);
        }
        self.expression().map(Some)
    }
}

fn index(value: &Value, key: Option<Value>) -> EvalResult<Value> {
    let key = key.ok_or_else(|| "SyntaxError: invalid syntax".to_string())?;
    match value {
        Value::Dict(entries) => {
            let name = key.as_str().map_or_else(|| key.to_string(), str::to_string);
            entries
                .borrow()
                .get(&name)
                .cloned()
                .ok_or_else(|| format!("KeyError: {}", key.repr()))
        }
        Value::List(_) | Value::String(_) => {
            let Value::Int(position) = key else {
                return Err(format!(
                    "TypeError: {} indices must be integers or slices, not {}",
                    value.type_name(),
                    key.type_name()
                ));
            };
            value
                .item_at(position)
                .ok_or_else(|| format!("IndexError: {} index out of range", value.type_name()))
        }
        other => Err(format!(
            "TypeError: '{}' object is not subscriptable",
            other.type_name()
        )),
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

const fn number(value: &Value) -> Option<Number> {
    match value {
        Value::Int(n) => Some(Number::Int(*n)),
        Value::Float(n) => Some(Number::Float(*n)),
        Value::Bool(flag) => Some(Number::Int(if *flag { 1 } else { 0 })),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
const fn as_float(number: Number) -> f64 {
    match number {
        Number::Int(n) => n as f64,
        Number::Float(n) => n,
    }
}

fn unsupported(op: &str, left: &Value, right: &Value) -> String {
    format!(
        "TypeError: unsupported operand type(s) for {op}: '{}' and '{}'",
        left.type_name(),
        right.type_name()
    )
}

fn overflow() -> String {
    "OverflowError: integer result too large".to_string()
}

fn zero_division() -> String {
    "ZeroDivisionError: division by zero".to_string()
}

fn negate(value: &Value) -> EvalResult<Value> {
    match number(value) {
        Some(Number::Int(n)) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
        Some(Number::Float(n)) => Ok(Value::Float(-n)),
        None => Err(format!(
            "TypeError: bad operand type for unary -: '{}'",
            value.type_name()
        )),
    }
}

fn repeat(sequence: &Value, times: i64) -> Option<EvalResult<Value>> {
    let times = usize::try_from(times).unwrap_or(0);
    let length = match sequence {
        Value::String(text) => text.len(),
        Value::List(items) => items.borrow().len(),
        _ => return None,
    };
    let total = match length.checked_mul(times) {
        Some(total) if total <= MAX_REPEAT_LEN => total,
        Some(_) => return Some(Err("MemoryError: repeated sequence is too large".to_string())),
        None => {
            return Some(Err(
                "OverflowError: cannot fit 'int' into an index-sized integer".to_string(),
            ));
        }
    };
    let value = match sequence {
        Value::String(text) => Value::String(text.repeat(times)),
        Value::List(items) => {
            let items = items.borrow();
            let mut repeated = Vec::with_capacity(total);
            for _ in 0..times {
                repeated.extend(items.iter().cloned());
            }
            Value::list(repeated)
        }
        _ => return None,
    };
    Some(Ok(value))
}

fn binary(op: &str, left: &Value, right: &Value) -> EvalResult<Value> {
    if let (Some(a), Some(b)) = (number(left), number(right)) {
        return arithmetic(op, a, b);
    }
    let result = match (op, left, right) {
        ("+", Value::String(a), Value::String(b)) => Some(Ok(Value::String(format!("{a}{b}")))),
        ("+", Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Some(Ok(Value::list(items)))
        }
        ("*", sequence, Value::Int(times)) | ("*", Value::Int(times), sequence) => {
            repeat(sequence, *times)
        }
        _ => None,
    };
    result.unwrap_or_else(|| Err(unsupported(op, left, right)))
}

fn arithmetic(op: &str, a: Number, b: Number) -> EvalResult<Value> {
    if let (Number::Int(a), Number::Int(b)) = (a, b) {
        return match op {
            "+" => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            "-" => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            "*" => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            "/" if b == 0 => Err(zero_division()),
            "/" => Ok(Value::Float(as_float(Number::Int(a)) / as_float(Number::Int(b)))),
            "//" | "%" if b == 0 => Err(zero_division()),
            "//" => floor_div(a, b).map(Value::Int).ok_or_else(overflow),
            "%" => Ok(Value::Int(floor_mod(a, b))),
            _ => Err(format!("SyntaxError: unknown operator '{op}'")),
        };
    }
    let (a, b) = (as_float(a), as_float(b));
    match op {
        "+" => Ok(Value::Float(a + b)),
        "-" => Ok(Value::Float(a - b)),
        "*" => Ok(Value::Float(a * b)),
        "/" | "//" | "%" if b == 0.0 => Err(zero_division()),
        "/" => Ok(Value::Float(a / b)),
        "//" => Ok(Value::Float((a / b).floor())),
        "%" => Ok(Value::Float(a - b * (a / b).floor())),
        _ => Err(format!("SyntaxError: unknown operator '{op}'")),
    }
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let quotient = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        quotient.checked_sub(1)
    } else {
        Some(quotient)
    }
}

/// Remainder with the sign of the divisor. `b` is non-zero.
fn floor_mod(a: i64, b: i64) -> i64 {
    // Only `i64::MIN % -1` overflows, and its remainder is zero.
    let remainder = a.checked_rem(b).unwrap_or(0);
    if remainder != 0 && ((remainder < 0) != (b < 0)) {
        remainder + b
    } else {
        remainder
    }
}

fn compare(op: &str, left: &Value, right: &Value) -> EvalResult<bool> {
    match op {
        "==" => return Ok(left == right),
        "!=" => return Ok(left != right),
        _ => {}
    }
    let ordering = match (number(left), number(right), left, right) {
        (Some(a), Some(b), _, _) => as_float(a).partial_cmp(&as_float(b)),
        (_, _, Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
    .ok_or_else(|| {
        format!(
            "TypeError: '{op}' not supported between instances of '{}' and '{}'",
            left.type_name(),
            right.type_name()
        )
    })?;
    Ok(match op {
        "<" => ordering == Ordering::Less,
        "<=" => ordering != Ordering::Greater,
        ">" => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use scopevar_domain::Record;

    fn eval(base: &Value, expression: &str) -> Value {
        evaluate_extended(base, expression).unwrap()
    }

    #[test]
    fn test_arithmetic_on_base() {
        assert_eq!(eval(&Value::Int(5), " + 1"), Value::Int(6));
        assert_eq!(eval(&Value::Int(5), "-2*3"), Value::Int(-1));
        assert_eq!(eval(&Value::Int(7), " // 2"), Value::Int(3));
        assert_eq!(eval(&Value::Int(-7), " // 2"), Value::Int(-4));
        assert_eq!(eval(&Value::Int(-7), " % 3"), Value::Int(2));
        assert_eq!(eval(&Value::Int(1), " / 4"), Value::Float(0.25));
        assert_eq!(eval(&Value::Float(1.5), " * 2"), Value::Float(3.0));
        assert_eq!(eval(&Value::from("ab"), " * 2"), Value::from("abab"));
        assert_eq!(eval(&Value::from("ab"), " + 'cd'"), Value::from("abcd"));
    }

    #[test]
    fn test_integer_boundaries() {
        let min = Value::Int(i64::MIN);
        assert_eq!(
            evaluate_extended(&min, " // -1").unwrap_err(),
            "OverflowError: integer result too large"
        );
        assert_eq!(eval(&min, " % 3"), Value::Int(1));
        assert_eq!(eval(&min, " % -1"), Value::Int(0));
        assert_eq!(eval(&min, " // 2"), Value::Int(i64::MIN / 2));
        assert_eq!(eval(&Value::Int(i64::MAX), " % -2"), Value::Int(-1));
        assert!(evaluate_extended(&min, " - 1").unwrap_err().starts_with("OverflowError"));
    }

    #[test]
    fn test_sequence_repetition_limits() {
        let text = Value::from("ab");
        assert_eq!(
            evaluate_extended(&text, " * 9223372036854775807").unwrap_err(),
            "OverflowError: cannot fit 'int' into an index-sized integer"
        );
        assert!(evaluate_extended(&text, " * 100000000").unwrap_err().starts_with("MemoryError"));
        assert_eq!(eval(&text, " * -3"), Value::from(""));

        let list = Value::list(vec![Value::Int(1)]);
        assert_eq!(
            eval(&list, " * 3"),
            Value::list(vec![Value::Int(1), Value::Int(1), Value::Int(1)])
        );
        assert!(evaluate_extended(&list, " * 9223372036854775807").is_err());
    }

    #[test]
    fn test_attribute_access() {
        let record = Value::object(Record::new("Point").with_field("x", 3));
        assert_eq!(eval(&record, ".x"), Value::Int(3));
        assert_eq!(eval(&record, ".x + 1"), Value::Int(4));

        let err = evaluate_extended(&record, ".missing").unwrap_err();
        assert_eq!(err, "AttributeError: 'Point' object has no attribute 'missing'");
    }

    #[test]
    fn test_indexing_and_slicing() {
        let list = Value::list(vec![Value::Int(0), Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(eval(&list, "[-1]"), Value::Int(3));
        assert_eq!(
            eval(&list, "[1:3]"),
            Value::list(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            eval(&list, "[::2]"),
            Value::list(vec![Value::Int(0), Value::Int(2)])
        );
        assert_eq!(eval(&list, "[0] + [1][0]"), Value::Int(1));
        assert_eq!(
            evaluate_extended(&list, "[10]").unwrap_err(),
            "IndexError: list index out of range"
        );
    }

    #[test]
    fn test_dict_key_and_attribute() {
        let mut entries = IndexMap::new();
        entries.insert("key".to_string(), Value::from("value"));
        let dict = Value::dict(entries);
        assert_eq!(eval(&dict, "['key']"), Value::from("value"));
        assert_eq!(eval(&dict, ".key"), Value::from("value"));
        assert_eq!(
            evaluate_extended(&dict, "['nope']").unwrap_err(),
            "KeyError: 'nope'"
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval(&Value::Int(3), " > 2"), Value::Bool(true));
        assert_eq!(eval(&Value::Int(3), " == 3.0"), Value::Bool(true));
        assert_eq!(eval(&Value::from("a"), " < 'b'"), Value::Bool(true));
        assert_eq!(eval(&Value::None, " == None"), Value::Bool(true));
    }

    #[test]
    fn test_rejected_constructs() {
        let text = Value::from("abc");
        assert_eq!(
            evaluate_extended(&text, ".upper()").unwrap_err(),
            "AttributeError: 'string' object has no attribute 'upper'"
        );
        assert!(evaluate_extended(&text, " + os").unwrap_err().starts_with("NameError"));
        assert!(evaluate_extended(&Value::Int(1), " / 0").unwrap_err().starts_with("ZeroDivisionError"));
        assert!(evaluate_extended(&Value::Int(1), " + ").is_err());
        assert!(evaluate_extended(&Value::Int(1), " 2").is_err());
    }
}
