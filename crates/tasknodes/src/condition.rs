use taskcore::{ExecutionContext, Value};

/// Evaluate a boolean condition expression against the execution context.
///
/// Supported forms: `lhs OP rhs` with `==`, `!=`, `>=`, `<=`, `>`, `<` or
/// `contains`, or a bare operand tested for truthiness. Operands are quoted
/// strings, numbers, booleans, `null`, or working-memory keys.
///
/// Evaluation failures — unreplaced `{{template}}` placeholders, unknown
/// keys, type mismatches — are reported as "no match" rather than raised;
/// branch executors fall through to their false/default target.
pub async fn evaluate_condition(expression: &str, ctx: &ExecutionContext) -> bool {
    match try_evaluate(expression, ctx).await {
        Some(matched) => matched,
        None => {
            tracing::debug!(
                node = %ctx.node_key,
                expression,
                "Condition did not evaluate; treating as no match"
            );
            false
        }
    }
}

async fn try_evaluate(expression: &str, ctx: &ExecutionContext) -> Option<bool> {
    let expression = expression.trim();
    if expression.is_empty() || expression.contains("{{") {
        return None;
    }

    // Longer operators first so ">=" is not split as ">".
    for op in ["==", "!=", ">=", "<=", ">", "<"] {
        if let Some((lhs, rhs)) = expression.split_once(op) {
            let lhs = resolve_operand(lhs, ctx).await?;
            let rhs = resolve_operand(rhs, ctx).await?;
            return compare(op, &lhs, &rhs);
        }
    }
    if let Some((lhs, rhs)) = expression.split_once(" contains ") {
        let lhs = resolve_operand(lhs, ctx).await?;
        let rhs = resolve_operand(rhs, ctx).await?;
        return contains(&lhs, &rhs);
    }

    truthy(&resolve_operand(expression, ctx).await?)
}

/// A literal, or a working-memory lookup when nothing else matches.
async fn resolve_operand(raw: &str, ctx: &ExecutionContext) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if (raw.starts_with('\'') && raw.ends_with('\'') && raw.len() >= 2)
        || (raw.starts_with('"') && raw.ends_with('"') && raw.len() >= 2)
    {
        return Some(Value::String(raw[1..raw.len() - 1].to_string()));
    }
    if let Ok(n) = raw.parse::<f64>() {
        return Some(Value::Number(n));
    }
    match raw {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }
    ctx.read(raw).await
}

fn compare(op: &str, lhs: &Value, rhs: &Value) -> Option<bool> {
    if let (Some(a), Some(b)) = (lhs.coerce_f64(), rhs.coerce_f64()) {
        return Some(match op {
            "==" => a == b,
            "!=" => a != b,
            ">=" => a >= b,
            "<=" => a <= b,
            ">" => a > b,
            "<" => a < b,
            _ => return None,
        });
    }
    // Non-numeric operands only support (in)equality, as strings.
    match op {
        "==" => Some(lhs.coerce_string() == rhs.coerce_string()),
        "!=" => Some(lhs.coerce_string() != rhs.coerce_string()),
        _ => None,
    }
}

fn contains(lhs: &Value, rhs: &Value) -> Option<bool> {
    match lhs {
        Value::String(s) => Some(s.contains(&rhs.coerce_string())),
        Value::Array(items) => Some(
            items
                .iter()
                .any(|item| item.coerce_string() == rhs.coerce_string()),
        ),
        _ => None,
    }
}

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(*n != 0.0),
        Value::String(s) => Some(!s.is_empty()),
        Value::Null => Some(false),
        _ => None,
    }
}
