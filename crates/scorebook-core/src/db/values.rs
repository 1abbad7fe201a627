//! Column conversion helpers shared by the repositories

use libsql::{Connection, Row, Value};
use serde_json::{Map, Value as Json};

use crate::error::{Error, Result};

pub fn text_or_null(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

pub fn int_or_null(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

pub const fn flag(value: bool) -> Value {
    Value::Integer(if value { 1 } else { 0 })
}

pub fn json_column(value: &Json) -> Result<Value> {
    Ok(Value::Text(serde_json::to_string(value)?))
}

pub fn map_column(map: &Map<String, Json>) -> Result<Value> {
    Ok(Value::Text(serde_json::to_string(map)?))
}

pub fn opt_text(row: &Row, idx: i32) -> Result<Option<String>> {
    Ok(match row.get_value(idx)? {
        Value::Null => None,
        Value::Text(text) => Some(text),
        Value::Integer(number) => Some(number.to_string()),
        Value::Real(number) => Some(number.to_string()),
        Value::Blob(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
    })
}

pub fn text(row: &Row, idx: i32) -> Result<String> {
    Ok(opt_text(row, idx)?.unwrap_or_default())
}

#[allow(clippy::cast_possible_truncation)]
pub fn opt_int(row: &Row, idx: i32) -> Result<Option<i64>> {
    Ok(match row.get_value(idx)? {
        Value::Integer(number) => Some(number),
        Value::Real(number) => Some(number.round() as i64),
        Value::Text(text) => text.trim().parse().ok(),
        Value::Null | Value::Blob(_) => None,
    })
}

pub fn int(row: &Row, idx: i32) -> Result<i64> {
    Ok(opt_int(row, idx)?.unwrap_or_default())
}

pub fn boolean(row: &Row, idx: i32) -> Result<bool> {
    Ok(int(row, idx)? != 0)
}

pub fn json(row: &Row, idx: i32) -> Result<Json> {
    match opt_text(row, idx)? {
        Some(text) if !text.is_empty() => Ok(serde_json::from_str(&text)?),
        _ => Ok(Json::Null),
    }
}

pub fn json_map(row: &Row, idx: i32) -> Result<Map<String, Json>> {
    match json(row, idx)? {
        Json::Object(map) => Ok(map),
        Json::Null => Ok(Map::new()),
        other => Err(Error::Database(format!(
            "expected JSON object in column {idx}, found {other}"
        ))),
    }
}

/// Run a `SELECT COUNT(*)`-style query and return the single integer
pub async fn scalar(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<i64> {
    let mut rows = conn.query(sql, params).await?;
    match rows.next().await? {
        Some(row) => int(&row, 0),
        None => Ok(0),
    }
}
