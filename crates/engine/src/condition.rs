//! Guards for conditional and looping block items.
//!
//! Expressions read context paths and compare them with JSON literals:
//! `count < 3`, `status == "ready" && !halted`, `tags.includes('beta')`. Operands that
//! are not JSON literals or single-quoted strings are treated as context paths and
//! resolved with [`Context::get_value`]; a missing path reads as `null`.

use std::{cmp::Ordering, fmt, sync::Arc};

use serde_json::Value as JsonValue;

use crate::{
    context::{Context, Lookup, Value},
    error::{ContextError, EvaluationError},
};

/// Predicate evaluated against a block's context right before a guarded item runs.
#[derive(Clone, Default)]
pub enum Condition {
    #[default]
    Always,
    Expr(String),
    Check(Arc<dyn Fn(&Context) -> anyhow::Result<bool> + Send + Sync>),
}

impl Condition {
    pub fn expr(expression: impl Into<String>) -> Self {
        Condition::Expr(expression.into())
    }

    pub fn check<F>(check: F) -> Self
    where
        F: Fn(&Context) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Condition::Check(Arc::new(check))
    }

    pub fn evaluate(&self, context: &Context) -> Result<bool, ContextError> {
        match self {
            Condition::Always => Ok(true),
            Condition::Expr(expression) => eval_condition(expression, context),
            Condition::Check(check) => check(context).map_err(|error| EvaluationError::new("condition", error).into()),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => f.write_str("Always"),
            Condition::Expr(expression) => write!(f, "Expr({expression:?})"),
            Condition::Check(_) => f.write_str("Check(..)"),
        }
    }
}

/// Evaluates a condition expression against `context`.
pub fn eval_condition(expression: &str, context: &Context) -> Result<bool, ContextError> {
    let expression = strip_enclosing_parentheses(expression.trim());
    if expression.is_empty() {
        return Err(malformed(expression, "empty condition"));
    }

    if let Some(parts) = split_expression(expression, "||") {
        for part in parts {
            if eval_condition(part, context)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    if let Some(parts) = split_expression(expression, "&&") {
        for part in parts {
            if !eval_condition(part, context)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    let (negations, inner) = strip_leading_negations(expression);
    let inner = inner.trim();
    if negations > 0 {
        if inner.is_empty() {
            return Err(malformed(expression, "expression cannot end with negation operator"));
        }
        let result = eval_condition(inner, context)?;
        return Ok(if negations % 2 == 1 { !result } else { result });
    }

    if let Some(result) = evaluate_includes(inner, context)? {
        return Ok(result);
    }
    if let Some(result) = evaluate_comparison(inner, context)? {
        return Ok(result);
    }
    Ok(is_truthy(&resolve_operand(inner, context)?))
}

fn evaluate_includes(expression: &str, context: &Context) -> Result<Option<bool>, ContextError> {
    let Some(index) = find_top_level_operator(expression, ".includes(") else {
        return Ok(None);
    };
    let (left, right_with_paren) = expression.split_at(index);
    let right = right_with_paren.trim_start_matches(".includes(").trim();
    let right = right.strip_suffix(')').unwrap_or(right).trim();
    if right.is_empty() {
        return Err(malformed(expression, "includes expression is missing an argument"));
    }

    let haystack = resolve_operand(left.trim(), context)?;
    let needle = resolve_operand(right, context)?;
    let included = match (&haystack, &needle) {
        (JsonValue::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
        (JsonValue::String(text), JsonValue::String(fragment)) => text.contains(fragment.as_str()),
        _ => false,
    };
    Ok(Some(included))
}

const COMPARISON_OPERATORS: [&str; 6] = ["!=", "==", "<=", ">=", "<", ">"];

fn evaluate_comparison(expression: &str, context: &Context) -> Result<Option<bool>, ContextError> {
    for operator in COMPARISON_OPERATORS {
        let Some(position) = find_top_level_operator(expression, operator) else {
            continue;
        };
        let left_expression = expression[..position].trim();
        let right_expression = expression[position + operator.len()..].trim();
        if left_expression.is_empty() || right_expression.is_empty() {
            return Err(malformed(expression, "comparison expression must include both left and right operands"));
        }
        let left = resolve_operand(left_expression, context)?;
        let right = resolve_operand(right_expression, context)?;
        let result = match operator {
            "==" => values_equal(&left, &right),
            "!=" => !values_equal(&left, &right),
            "<" => compare(&left, &right) == Some(Ordering::Less),
            "<=" => matches!(compare(&left, &right), Some(Ordering::Less | Ordering::Equal)),
            ">" => compare(&left, &right) == Some(Ordering::Greater),
            _ => matches!(compare(&left, &right), Some(Ordering::Greater | Ordering::Equal)),
        };
        return Ok(Some(result));
    }
    Ok(None)
}

fn resolve_operand(expression: &str, context: &Context) -> Result<JsonValue, ContextError> {
    let trimmed = expression.trim();
    if let Some(quoted) = trimmed.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')) {
        return Ok(JsonValue::String(quoted.to_string()));
    }
    if looks_like_json_literal(trimmed)
        && let Ok(literal) = serde_json::from_str::<JsonValue>(trimmed)
    {
        return Ok(literal);
    }
    Ok(match context.get_value(trimmed)? {
        Lookup::Found(Value::Json(value)) => value,
        Lookup::Found(_) => JsonValue::Bool(true),
        Lookup::FoundNone | Lookup::NotFound => JsonValue::Null,
    })
}

fn values_equal(left: &JsonValue, right: &JsonValue) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(left), Some(right)) => left == right,
        _ => left == right,
    }
}

fn compare(left: &JsonValue, right: &JsonValue) -> Option<Ordering> {
    match (left, right) {
        (JsonValue::Number(_), JsonValue::Number(_)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (JsonValue::String(left), JsonValue::String(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(flag) => *flag,
        JsonValue::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        JsonValue::String(text) => !text.is_empty() && text != "false",
        JsonValue::Array(items) => !items.is_empty(),
        JsonValue::Object(fields) => !fields.is_empty(),
    }
}

fn looks_like_json_literal(expression: &str) -> bool {
    let starts_like_number = expression
        .chars()
        .next()
        .map(|character| character == '-' || character.is_ascii_digit())
        .unwrap_or(false);
    expression.starts_with('[')
        || expression.starts_with('{')
        || expression.starts_with('"')
        || expression == "null"
        || expression == "true"
        || expression == "false"
        || starts_like_number
}

fn malformed(expression: &str, reason: &str) -> ContextError {
    ContextError::InvalidAssociation {
        path: String::new(),
        association: expression.to_string(),
        reason: reason.to_string(),
    }
}

fn strip_enclosing_parentheses(expression: &str) -> &str {
    let mut current = expression;
    while current.starts_with('(') && current.ends_with(')') {
        let inner = &current[1..current.len() - 1];
        if find_top_level_operator(inner, ")").is_some() || has_unbalanced_close(inner) {
            break;
        }
        current = inner.trim();
    }
    current
}

fn has_unbalanced_close(expression: &str) -> bool {
    let mut depth = 0i32;
    for character in expression.chars() {
        match character {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

fn split_expression<'a>(expression: &'a str, operator: &str) -> Option<Vec<&'a str>> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    let length = expression.len();

    while start < length {
        if let Some(relative_index) = find_top_level_operator(&expression[start..], operator) {
            let absolute_index = start + relative_index;
            let part = expression[start..absolute_index].trim();
            if !part.is_empty() {
                parts.push(part);
            }
            start = absolute_index + operator.len();
        } else {
            let part = expression[start..].trim();
            if !part.is_empty() {
                parts.push(part);
            }
            break;
        }
    }

    if parts.len() > 1 { Some(parts) } else { None }
}

fn strip_leading_negations(expression: &str) -> (usize, &str) {
    let mut count = 0usize;
    let mut remainder = expression.trim_start();
    while let Some(stripped) = remainder.strip_prefix('!') {
        if stripped.starts_with('=') {
            break;
        }
        count += 1;
        remainder = stripped.trim_start();
    }
    (count, remainder)
}

fn find_top_level_operator(expression: &str, operator: &str) -> Option<usize> {
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut depth = 0i32;

    for (index, character) in expression.char_indices() {
        if !in_single_quote && !in_double_quote && depth == 0 && expression[index..].starts_with(operator) {
            return Some(index);
        }
        match character {
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            '(' if !in_single_quote && !in_double_quote => depth += 1,
            ')' if !in_single_quote && !in_double_quote && depth > 0 => depth -= 1,
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::sequential_ids;

    fn context() -> Context {
        let ids = sequential_ids();
        let context = Context::new(&ids, "guards");
        context.put_value("count", 2).unwrap();
        context.put_value("status", "ready").unwrap();
        context.put_value("tags", serde_json::json!(["alpha", "beta"])).unwrap();
        context.put_value("flags/halted", false).unwrap();
        context
    }

    #[test]
    fn comparisons_read_paths() {
        let context = context();
        assert!(eval_condition("count < 3", &context).unwrap());
        assert!(eval_condition("count >= 2", &context).unwrap());
        assert!(!eval_condition("count > 2", &context).unwrap());
        assert!(eval_condition("count == 2.0", &context).unwrap());
        assert!(eval_condition("status == \"ready\"", &context).unwrap());
        assert!(eval_condition("status != 'done'", &context).unwrap());
    }

    #[test]
    fn boolean_connectives_and_negation() {
        let context = context();
        assert!(eval_condition("status == 'ready' && !flags/halted", &context).unwrap());
        assert!(eval_condition("missing || count == 2", &context).unwrap());
        assert!(!eval_condition("!(count == 2)", &context).unwrap());
        assert!(eval_condition("!!count", &context).unwrap());
    }

    #[test]
    fn includes_checks_arrays_and_strings() {
        let context = context();
        assert!(eval_condition("tags.includes('beta')", &context).unwrap());
        assert!(!eval_condition("tags.includes(\"gamma\")", &context).unwrap());
        assert!(eval_condition("status.includes('ead')", &context).unwrap());
    }

    #[test]
    fn missing_paths_are_falsy() {
        let context = context();
        assert!(!eval_condition("nothing/here", &context).unwrap());
        assert!(eval_condition("nothing/here == null", &context).unwrap());
    }

    #[test]
    fn malformed_expressions_are_errors() {
        let context = context();
        assert!(eval_condition("count <", &context).is_err());
        assert!(eval_condition("   ", &context).is_err());
    }

    #[test]
    fn closure_conditions_see_the_context() {
        let context = context();
        let condition = Condition::check(|context| Ok(context.get_value("count")?.as_i64() == Some(2)));
        assert!(condition.evaluate(&context).unwrap());
        assert!(Condition::Always.evaluate(&context).unwrap());
    }
}
