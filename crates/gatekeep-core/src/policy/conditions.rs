use serde_json::Value;

use super::schema::ConditionSet;

/// Checks `conditions` against `params` in a fixed, deterministic
/// order: `max_amount` -> `currencies` -> `folder_prefix`. Returns the
/// first violation's reason, or `None` if every present condition is
/// satisfied.
pub fn first_violation(conditions: &ConditionSet, params: &Value) -> Option<String> {
    if let Some(max_amount) = conditions.max_amount {
        match params.get("amount").and_then(Value::as_f64) {
            Some(amount) if amount > max_amount => {
                return Some(format!(
                    "Amount {amount:.2} exceeds max_amount={max_amount:.2}"
                ));
            }
            Some(_) => {}
            None => return Some("params.amount missing or not numeric".to_string()),
        }
    }

    if !conditions.currencies.is_empty() {
        match params.get("currency").and_then(Value::as_str) {
            Some(currency) if !conditions.currencies.contains(currency) => {
                let allowed: Vec<&str> = conditions.currencies.iter().map(String::as_str).collect();
                return Some(format!(
                    "Currency '{currency}' not in allowed list: {}",
                    allowed.join(", ")
                ));
            }
            Some(_) => {}
            None => return Some("params.currency missing".to_string()),
        }
    }

    if let Some(prefix) = &conditions.folder_prefix {
        match params.get("path").and_then(Value::as_str) {
            Some(path) if !path.starts_with(prefix.as_str()) => {
                return Some(format!("Path '{path}' does not match folder_prefix='{prefix}'"));
            }
            Some(_) => {}
            None => return Some("params.path missing".to_string()),
        }
    }

    None
}
