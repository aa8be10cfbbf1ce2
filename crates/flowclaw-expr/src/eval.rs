//! Tree-walking evaluator over a JSON scope.

use serde_json::{Map, Number, Value};

use flowclaw_core::{FlowClawError, Result};

use crate::parser::{parse, BinaryOp, Expr, MemberKey, UnaryOp};

/// Evaluate an expression against a scope of named values.
///
/// The scope is a plain map — for workflow steps it carries `input` plus one
/// entry per completed step id. Failures come back as
/// [`FlowClawError::Expression`] with the source text and the scope keys
/// that were available.
pub fn evaluate(expression: &str, scope: &Map<String, Value>) -> Result<Value> {
    let wrap = |cause: String| {
        let mut available: Vec<&str> = scope.keys().map(String::as_str).collect();
        available.sort_unstable();
        FlowClawError::Expression {
            expression: expression.to_string(),
            cause,
            available: available.join(", "),
        }
    };

    let ast = parse(expression).map_err(&wrap)?;
    eval_expr(&ast, scope).map_err(&wrap)
}

fn eval_expr(expr: &Expr, scope: &Map<String, Value>) -> std::result::Result<Value, String> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Int(i) => Ok(Value::from(*i)),
        Expr::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| "non-finite number literal".to_string()),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval_expr(item, scope)?);
            }
            Ok(Value::Array(out))
        }
        Expr::Object(entries) => {
            let mut out = Map::new();
            for (key, value) in entries {
                out.insert(key.clone(), eval_expr(value, scope)?);
            }
            Ok(Value::Object(out))
        }
        Expr::Ident(name) => scope
            .get(name)
            .cloned()
            .ok_or_else(|| format!("unknown variable `{name}`")),
        Expr::Member { object, key } => {
            let object = eval_expr(object, scope)?;
            eval_member(&object, key)
        }
        Expr::Unary { op, operand } => {
            let operand = eval_expr(operand, scope)?;
            eval_unary(*op, &operand)
        }
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, scope),
        Expr::Ternary {
            cond,
            when_true,
            when_false,
        } => match eval_expr(cond, scope)? {
            Value::Bool(true) => eval_expr(when_true, scope),
            Value::Bool(false) => eval_expr(when_false, scope),
            other => Err(format!(
                "ternary condition must be a boolean, got {}",
                type_name(&other)
            )),
        },
    }
}

fn eval_member(object: &Value, key: &MemberKey) -> std::result::Result<Value, String> {
    match (object, key) {
        (Value::Object(map), MemberKey::Name(name)) => {
            Ok(map.get(name).cloned().unwrap_or(Value::Null))
        }
        (Value::Object(map), MemberKey::Index(index)) => {
            Ok(map.get(&index.to_string()).cloned().unwrap_or(Value::Null))
        }
        (Value::Array(items), MemberKey::Name(name)) if name == "length" => {
            Ok(Value::from(items.len() as u64))
        }
        (Value::String(text), MemberKey::Name(name)) if name == "length" => {
            Ok(Value::from(text.chars().count() as u64))
        }
        (Value::Array(items), MemberKey::Index(index)) => Ok(items
            .get(*index as usize)
            .cloned()
            .unwrap_or(Value::Null)),
        (Value::String(text), MemberKey::Index(index)) => Ok(text
            .chars()
            .nth(*index as usize)
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null)),
        (Value::Null, key) => Err(format!("cannot read {} of null", key_label(key))),
        (other, key) => Err(format!(
            "cannot read {} of {}",
            key_label(key),
            type_name(other)
        )),
    }
}

fn eval_unary(op: UnaryOp, operand: &Value) -> std::result::Result<Value, String> {
    match (op, operand) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Not, other) => Err(format!("`!` expects a boolean, got {}", type_name(other))),
        (UnaryOp::Neg, Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.checked_neg()
                    .map(Value::from)
                    .ok_or_else(|| "integer overflow".to_string())
            } else if let Some(f) = n.as_f64() {
                Number::from_f64(-f)
                    .map(Value::Number)
                    .ok_or_else(|| "non-finite result".to_string())
            } else {
                Err("integer overflow".to_string())
            }
        }
        (UnaryOp::Neg, other) => Err(format!("`-` expects a number, got {}", type_name(other))),
    }
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    scope: &Map<String, Value>,
) -> std::result::Result<Value, String> {
    // Logical operators short-circuit; everything else evaluates both sides.
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let left = expect_bool(&eval_expr(lhs, scope)?, "left operand")?;
        return match (op, left) {
            (BinaryOp::And, false) => Ok(Value::Bool(false)),
            (BinaryOp::Or, true) => Ok(Value::Bool(true)),
            _ => {
                let right = expect_bool(&eval_expr(rhs, scope)?, "right operand")?;
                Ok(Value::Bool(right))
            }
        };
    }

    let left = eval_expr(lhs, scope)?;
    let right = eval_expr(rhs, scope)?;

    match op {
        BinaryOp::Eq | BinaryOp::StrictEq => Ok(Value::Bool(values_equal(&left, &right))),
        BinaryOp::Ne | BinaryOp::StrictNe => Ok(Value::Bool(!values_equal(&left, &right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(op, &left, &right),
        BinaryOp::Add => add(&left, &right),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, &left, &right)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

/// Deep equality with numeric awareness: `2` and `2.0` are the same number.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => match (x.as_f64(), y.as_f64()) {
                (Some(i), Some(j)) => i == j,
                _ => x == y,
            },
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> std::result::Result<Value, String> {
    let ordering = match (left, right) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (
                x.as_f64().ok_or("number out of range")?,
                y.as_f64().ok_or("number out of range")?,
            );
            x.partial_cmp(&y).ok_or("numbers are not comparable")?
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (x, y) => {
            return Err(format!(
                "cannot compare {} with {}",
                type_name(x),
                type_name(y)
            ))
        }
    };
    Ok(Value::Bool(match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => unreachable!(),
    }))
}

fn add(left: &Value, right: &Value) -> std::result::Result<Value, String> {
    // `+` concatenates when either side is a string, like the source language.
    if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
        return Ok(Value::String(format!(
            "{}{}",
            stringify(left)?,
            stringify(right)?
        )));
    }
    arithmetic(BinaryOp::Add, left, right)
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> std::result::Result<Value, String> {
    let (Value::Number(x), Value::Number(y)) = (left, right) else {
        return Err(format!(
            "arithmetic needs numbers, got {} and {}",
            type_name(left),
            type_name(right)
        ));
    };

    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return match op {
            BinaryOp::Add => a
                .checked_add(b)
                .map(Value::from)
                .ok_or_else(|| "integer overflow".to_string()),
            BinaryOp::Sub => a
                .checked_sub(b)
                .map(Value::from)
                .ok_or_else(|| "integer overflow".to_string()),
            BinaryOp::Mul => a
                .checked_mul(b)
                .map(Value::from)
                .ok_or_else(|| "integer overflow".to_string()),
            BinaryOp::Div => {
                if b == 0 {
                    Err("division by zero".to_string())
                } else if a % b == 0 {
                    Ok(Value::from(a / b))
                } else {
                    float_value(a as f64 / b as f64)
                }
            }
            BinaryOp::Rem => {
                if b == 0 {
                    Err("division by zero".to_string())
                } else {
                    Ok(Value::from(a % b))
                }
            }
            _ => unreachable!(),
        };
    }

    let a = x.as_f64().ok_or("number out of range")?;
    let b = y.as_f64().ok_or("number out of range")?;
    match op {
        BinaryOp::Add => float_value(a + b),
        BinaryOp::Sub => float_value(a - b),
        BinaryOp::Mul => float_value(a * b),
        BinaryOp::Div => {
            if b == 0.0 {
                Err("division by zero".to_string())
            } else {
                float_value(a / b)
            }
        }
        BinaryOp::Rem => {
            if b == 0.0 {
                Err("division by zero".to_string())
            } else {
                float_value(a % b)
            }
        }
        _ => unreachable!(),
    }
}

fn float_value(f: f64) -> std::result::Result<Value, String> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| "non-finite result".to_string())
}

fn stringify(value: &Value) -> std::result::Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        other => Err(format!("cannot concatenate {}", type_name(other))),
    }
}

fn expect_bool(value: &Value, side: &str) -> std::result::Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(format!(
            "logical {side} must be a boolean, got {}",
            type_name(other)
        )),
    }
}

fn key_label(key: &MemberKey) -> String {
    match key {
        MemberKey::Name(name) => format!("property `{name}`"),
        MemberKey::Index(index) => format!("index {index}"),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
