//! Named-parameter binding (§4.4 "Parameter binding", §9 open question:
//! bind by scan order, never by map iteration order).

use std::collections::HashMap;

use crate::expr::Value;

/// Scans `sql` left to right for `:name` occurrences, replacing each with
/// `?` and collecting the bound values in first-occurrence (scan) order.
/// Unknown names are left in place and returned separately so the caller
/// can log them.
pub fn bind_named_parameters(
    sql: &str,
    params: &HashMap<String, Value>,
) -> (String, Vec<Value>, Vec<String>) {
    let mut output = String::with_capacity(sql.len());
    let mut bound = Vec::new();
    let mut unknown = Vec::new();
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == ':' && chars.get(i + 1).is_some_and(|c| c.is_alphabetic() || *c == '_') {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
                end += 1;
            }
            let name: String = chars[start..end].iter().collect();
            match params.get(&name) {
                Some(value) => {
                    output.push('?');
                    bound.push(value.clone());
                }
                None => {
                    unknown.push(name.clone());
                    output.push(':');
                    output.push_str(&name);
                }
            }
            i = end;
        } else {
            output.push(chars[i]);
            i += 1;
        }
    }

    (output, bound, unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_in_scan_order_not_map_order() {
        let mut params = HashMap::new();
        params.insert("b".to_string(), Value::Int(2));
        params.insert("a".to_string(), Value::Int(1));
        let (sql, bound, unknown) = bind_named_parameters("SELECT * FROM t WHERE x=:b AND y=:a", &params);
        assert_eq!(sql, "SELECT * FROM t WHERE x=? AND y=?");
        assert_eq!(bound, vec![Value::Int(2), Value::Int(1)]);
        assert!(unknown.is_empty());
    }

    #[test]
    fn unknown_names_are_left_as_is_and_reported() {
        let params = HashMap::new();
        let (sql, bound, unknown) = bind_named_parameters("SELECT :missing", &params);
        assert_eq!(sql, "SELECT :missing");
        assert!(bound.is_empty());
        assert_eq!(unknown, vec!["missing".to_string()]);
    }
}
