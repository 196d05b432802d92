//! Named-parameter statement mapping
//!
//! A small layer over `sqlx` for the mapped-query backend:
//!
//! - statements name their parameters as `@Name` instead of `?`
//! - parameter values come from any `Serialize` value, looked up by field name
//!   in its serialized form (so a [`Reason`](crate::models::Reason) binds as
//!   `@Id`, `@Active`, `@CreatedAt`, `@CreatedBy`, `@Name`)
//! - result rows become typed values through [`sqlx::FromRow`]
//!
//! ```ignore
//! let reason: Option<Reason> = mapper::query_optional(
//!     &mut conn,
//!     "SELECT * FROM Reasons WHERE Id = @Id",
//!     &serde_json::json!({ "Id": 7 }),
//! )
//! .await?;
//! ```

use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{Decode, FromRow, Row, Sqlite, Type};

use crate::error::{ReasonError, Result};

/// A statement with `@Name` placeholders rewritten to positional `?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedStatement {
    sql: String,
    names: Vec<String>,
}

impl NamedStatement {
    /// Rewrite `@Name` placeholders. Text inside single-quoted literals is
    /// left alone, and `@` not followed by an identifier is kept verbatim.
    pub fn parse(text: &str) -> Self {
        let mut sql = String::with_capacity(text.len());
        let mut names = Vec::new();
        let mut chars = text.chars().peekable();
        let mut in_literal = false;

        while let Some(c) = chars.next() {
            if c == '\'' {
                in_literal = !in_literal;
                sql.push(c);
                continue;
            }

            let starts_name = chars
                .peek()
                .is_some_and(|next| next.is_ascii_alphabetic() || *next == '_');

            if c == '@' && !in_literal && starts_name {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                names.push(name);
                sql.push('?');
            } else {
                sql.push(c);
            }
        }

        Self { sql, names }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Placeholder names in binding order; repeats are kept.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolve every placeholder against `params`.
    fn values(&self, params: &impl Serialize) -> Result<Vec<Value>> {
        if self.names.is_empty() {
            return Ok(Vec::new());
        }

        let serialized = serde_json::to_value(params)
            .map_err(|e| ReasonError::Mapping(format!("parameters are not serializable: {e}")))?;
        let Value::Object(fields) = serialized else {
            return Err(ReasonError::Mapping(
                "parameters must serialize to an object with named fields".to_string(),
            ));
        };

        self.names
            .iter()
            .map(|name| {
                fields
                    .get(name)
                    .or_else(|| {
                        fields
                            .iter()
                            .find(|(key, _)| key.eq_ignore_ascii_case(name))
                            .map(|(_, value)| value)
                    })
                    .cloned()
                    .ok_or_else(|| ReasonError::Mapping(format!("no value for parameter @{name}")))
            })
            .collect()
    }

    fn bind(
        &self,
        params: &impl Serialize,
    ) -> Result<sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>>> {
        let mut query = sqlx::query(&self.sql);

        for (name, value) in self.names.iter().zip(self.values(params)?) {
            query = match value {
                Value::Null => query.bind(None::<i64>),
                Value::Bool(b) => query.bind(b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => query.bind(i),
                    None => match n.as_f64() {
                        Some(f) => query.bind(f),
                        None => {
                            return Err(ReasonError::Mapping(format!(
                                "parameter @{name} is out of range"
                            )))
                        }
                    },
                },
                Value::String(s) => query.bind(s),
                Value::Array(_) | Value::Object(_) => {
                    return Err(ReasonError::Mapping(format!(
                        "parameter @{name} is not a scalar value"
                    )))
                }
            };
        }

        Ok(query)
    }
}

/// Run a statement and map every row to `T`.
pub async fn query<T>(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &(impl Serialize + Sync),
) -> Result<Vec<T>>
where
    T: for<'r> FromRow<'r, SqliteRow>,
{
    let statement = NamedStatement::parse(sql);
    let rows = statement.bind(params)?.fetch_all(&mut *conn).await?;

    rows.iter()
        .map(|row| T::from_row(row).map_err(ReasonError::from_row_error))
        .collect()
}

/// Run a statement and map its first row, if any.
pub async fn query_optional<T>(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &(impl Serialize + Sync),
) -> Result<Option<T>>
where
    T: for<'r> FromRow<'r, SqliteRow>,
{
    let statement = NamedStatement::parse(sql);
    let row = statement.bind(params)?.fetch_optional(&mut *conn).await?;

    row.as_ref()
        .map(|row| T::from_row(row).map_err(ReasonError::from_row_error))
        .transpose()
}

/// Run a statement and return the first column of its first row.
pub async fn execute_scalar<T>(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &(impl Serialize + Sync),
) -> Result<T>
where
    T: for<'r> Decode<'r, Sqlite> + Type<Sqlite>,
{
    let statement = NamedStatement::parse(sql);
    let row = statement.bind(params)?.fetch_one(&mut *conn).await?;

    row.try_get::<T, _>(0).map_err(ReasonError::from_row_error)
}

/// Run a statement that returns no rows; report the rows affected.
pub async fn execute(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &(impl Serialize + Sync),
) -> Result<u64> {
    let statement = NamedStatement::parse(sql);
    let result = statement.bind(params)?.execute(&mut *conn).await?;

    Ok(result.rows_affected())
}
