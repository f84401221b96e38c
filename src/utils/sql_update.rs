use actix_web::error::ErrorBadRequest;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::MySqlPool;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug)]
pub enum BindValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct UpdateStatement {
    pub sql: String,
    pub values: Vec<BindValue>,
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Column names come from client JSON, so every key is checked against
/// the caller's whitelist before it reaches the statement text.
pub fn build_update(
    table: &str,
    allowed_columns: &[&str],
    payload: &Value,
    id_column: &str,
    id_value: u64,
) -> Result<UpdateStatement, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    for key in obj.keys() {
        if !allowed_columns.contains(&key.as_str()) {
            return Err(ErrorBadRequest(format!("Unknown field '{}'", key)));
        }
    }

    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);

    // Convert JSON values -> BindValue
    for value in obj.values() {
        match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    values.push(BindValue::Date(d));
                } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                    values.push(BindValue::DateTime(dt));
                } else {
                    values.push(BindValue::String(s.clone()));
                }
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    values.push(BindValue::I64(i));
                } else if let Some(f) = n.as_f64() {
                    values.push(BindValue::F64(f));
                }
            }
            Value::Bool(b) => values.push(BindValue::Bool(*b)),
            Value::Null => values.push(BindValue::Null),
            _ => return Err(ErrorBadRequest("Unsupported JSON value type")),
        }
    }

    // WHERE id = ?
    values.push(BindValue::I64(id_value as i64));

    Ok(UpdateStatement { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(
    pool: &MySqlPool,
    update: UpdateStatement,
) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            BindValue::String(v) => query.bind(v),
            BindValue::I64(v) => query.bind(v),
            BindValue::F64(v) => query.bind(v),
            BindValue::Bool(v) => query.bind(v),
            BindValue::Date(v) => query.bind(v),
            BindValue::DateTime(v) => query.bind(v),
            BindValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_whitelisted_update() {
        let stmt = build_update(
            "employees",
            &["first_name", "status"],
            &json!({"first_name": "Ada", "status": "active"}),
            "id",
            7,
        )
        .unwrap();

        assert!(stmt.sql.starts_with("UPDATE employees SET "));
        assert!(stmt.sql.ends_with("WHERE id = ?"));
        assert_eq!(stmt.values.len(), 3); // two columns + id
    }

    #[test]
    fn rejects_unknown_column() {
        let err = build_update(
            "employees",
            &["first_name"],
            &json!({"first_name": "Ada", "role_id": 1}),
            "id",
            7,
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(build_update("employees", &["first_name"], &json!({}), "id", 7).is_err());
        assert!(build_update("employees", &["first_name"], &json!([1, 2]), "id", 7).is_err());
    }
}
