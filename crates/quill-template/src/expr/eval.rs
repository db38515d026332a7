use std::cmp::Ordering;

use crate::data::DataContext;
use crate::error::EvalError;
use crate::value::{Map, Value};

use super::{BinaryOp, Expr, Expression, UnaryOp};

impl Expression {
    /// Evaluate against a runtime data context.
    pub fn eval(&self, data: &DataContext) -> Result<Value, EvalError> {
        self.root().eval(data)
    }
}

impl Expr {
    pub fn eval(&self, data: &DataContext) -> Result<Value, EvalError> {
        Ok(match self {
            Expr::Literal(value) => value.clone(),
            Expr::Field(name) => data.get(name),
            Expr::Member(target, name) => property(&target.eval(data)?, name)?,
            Expr::Index(target, key) => {
                let target = target.eval(data)?;
                match (&target, key.eval(data)?) {
                    (Value::Array(items), Value::Number(n)) if n >= 0.0 && n.fract() == 0.0 => {
                        items.get(n as usize).cloned().unwrap_or_default()
                    }
                    (_, key) => property(&target, &key.to_string())?,
                }
            }
            Expr::Unary(op, operand) => {
                let value = operand.eval(data)?;
                match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::String(value.type_of().to_string()),
                }
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                let left = lhs.eval(data)?;
                if !left.is_truthy() {
                    return Ok(left);
                }
                rhs.eval(data)?
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                let left = lhs.eval(data)?;
                if left.is_truthy() {
                    return Ok(left);
                }
                rhs.eval(data)?
            }
            Expr::Binary(op, lhs, rhs) => binary(*op, &lhs.eval(data)?, &rhs.eval(data)?),
            Expr::Conditional(cond, then, otherwise) => {
                if cond.eval(data)?.is_truthy() {
                    then.eval(data)?
                } else {
                    otherwise.eval(data)?
                }
            }
            Expr::Array(items) => {
                Value::Array(items.iter().map(|e| e.eval(data)).collect::<Result<_, _>>()?)
            }
            Expr::Object(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, expr) in entries {
                    map.insert(key.clone(), expr.eval(data)?);
                }
                Value::Object(map)
            }
        })
    }
}

/// Property read with JavaScript semantics: missing keys are `undefined`,
/// reading from `undefined` or `null` is an error.
fn property(target: &Value, key: &str) -> Result<Value, EvalError> {
    let index = || key.parse::<usize>().ok();
    Ok(match target {
        Value::Undefined | Value::Null => {
            return Err(EvalError::MemberOfNothing {
                property: key.to_string(),
                target: if target.is_undefined() { "undefined" } else { "null" },
            });
        }
        Value::Object(map) => map.get(key).cloned().unwrap_or_default(),
        Value::Array(items) if key == "length" => Value::from(items.len()),
        Value::Array(items) => index().and_then(|i| items.get(i).cloned()).unwrap_or_default(),
        Value::String(s) if key == "length" => Value::from(s.encode_utf16().count()),
        Value::String(s) => index()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or_default(),
        Value::Bool(_) | Value::Number(_) | Value::Function(_) => Value::Undefined,
    })
}

/// JavaScript `ToPrimitive` for operators: containers collapse to strings.
fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) | Value::Function(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (to_primitive(left), to_primitive(right)) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            let (a, b) = (to_primitive(left), to_primitive(right));
            if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) {
                Value::String(format!("{a}{b}"))
            } else {
                Value::Number(a.to_number() + b.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::Le => {
            Value::Bool(matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal)))
        }
        BinaryOp::Ge => {
            Value::Bool(matches!(compare(left, right), Some(Ordering::Greater | Ordering::Equal)))
        }
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::Ne => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_eq(right)),
        // Short-circuiting operators never reach here.
        BinaryOp::And | BinaryOp::Or => Value::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::format_expression;

    fn eval(src: &str, data: &DataContext) -> Result<Value, EvalError> {
        Expression::parse(&format_expression(src)).unwrap().eval(data)
    }

    fn data() -> DataContext {
        DataContext::from_json(&serde_json::json!({
            "a": { "b": 2 },
            "c": 3,
            "name": "quill",
            "items": [10, 20, 30],
            "empty": "",
        }))
        .unwrap()
    }

    // ── lookups ───────────────────────────────────────────────────────────

    #[test]
    fn member_and_context_lookup() {
        assert_eq!(eval("a.b + c", &data()), Ok(Value::from(5)));
    }

    #[test]
    fn missing_fields_are_undefined() {
        assert_eq!(eval("missing", &data()), Ok(Value::Undefined));
        assert_eq!(eval("a.zzz", &data()), Ok(Value::Undefined));
    }

    #[test]
    fn member_of_undefined_is_an_error() {
        assert_eq!(
            eval("missing.x", &data()),
            Err(EvalError::MemberOfNothing { property: "x".into(), target: "undefined" })
        );
    }

    #[test]
    fn index_and_length() {
        let d = data();
        assert_eq!(eval("items[1]", &d), Ok(Value::from(20)));
        assert_eq!(eval("items[7]", &d), Ok(Value::Undefined));
        assert_eq!(eval("items.length", &d), Ok(Value::from(3)));
        assert_eq!(eval("name.length", &d), Ok(Value::from(5)));
        assert_eq!(eval("name[0]", &d), Ok(Value::from("q")));
        assert_eq!(eval("a['b']", &d), Ok(Value::from(2)));
    }

    // ── operators ─────────────────────────────────────────────────────────

    #[test]
    fn addition_concatenates_when_a_string_is_involved() {
        let d = data();
        assert_eq!(eval("name + '!'", &d), Ok(Value::from("quill!")));
        assert_eq!(eval("'n=' + c", &d), Ok(Value::from("n=3")));
        assert_eq!(eval("1 + true", &d), Ok(Value::from(2)));
        assert_eq!(eval("items + ''", &d), Ok(Value::from("10,20,30")));
    }

    #[test]
    fn logical_operators_return_operands() {
        let d = data();
        assert_eq!(eval("empty || 'fallback'", &d), Ok(Value::from("fallback")));
        assert_eq!(eval("c && name", &d), Ok(Value::from("quill")));
        assert_eq!(eval("missing && missing.x", &d), Ok(Value::Undefined));
    }

    #[test]
    fn comparisons() {
        let d = data();
        assert_eq!(eval("c > 2", &d), Ok(Value::Bool(true)));
        assert_eq!(eval("'a' < 'b'", &d), Ok(Value::Bool(true)));
        assert_eq!(eval("'10' < '9'", &d), Ok(Value::Bool(true)));
        assert_eq!(eval("missing <= 1", &d), Ok(Value::Bool(false)));
        assert_eq!(eval("c == '3'", &d), Ok(Value::Bool(true)));
        assert_eq!(eval("c === '3'", &d), Ok(Value::Bool(false)));
    }

    #[test]
    fn unary_and_conditional() {
        let d = data();
        assert_eq!(eval("!empty", &d), Ok(Value::Bool(true)));
        assert_eq!(eval("-c", &d), Ok(Value::from(-3)));
        assert_eq!(eval("typeof missing", &d), Ok(Value::from("undefined")));
        assert_eq!(eval("c % 2 ? 'odd' : 'even'", &d), Ok(Value::from("odd")));
    }

    #[test]
    fn literals() {
        let d = data();
        assert_eq!(
            eval("['class', c]", &d),
            Ok(Value::from(vec![Value::from("class"), Value::from(3)]))
        );
        let Ok(Value::Object(map)) = eval("{id: c, 'data-x': name}", &d) else {
            panic!("expected object")
        };
        assert_eq!(map["id"], Value::from(3));
        assert_eq!(map["data-x"], Value::from("quill"));
    }
}
