//! Response body interpolation.
//!
//! A record may declare `interpolate: { <body field>: <request field> }`. When
//! its body is a mapping, each listed body field is replaced by the value of
//! the request body's field of the same name, if the request has it.

use crate::mock::MockRecord;
use serde_json::{Map, Value};

/// Whether `record` asks for interpolation and can receive it.
pub fn is_interpolated(record: &MockRecord) -> bool {
    record.interpolate.is_some() && record.body.is_object()
}

/// Render the body of `record` for a request carrying `request_body`.
///
/// Returns the stored body unchanged when interpolation does not apply.
/// Request bodies that are not JSON objects provide no values. Fields missing
/// from the request keep their stored value.
pub fn render_body(record: &MockRecord, request_body: Option<&[u8]>) -> Value {
    let (Some(fields), Value::Object(stored)) = (&record.interpolate, &record.body) else {
        return record.body.clone();
    };

    let source = parse_request_body(request_body);
    let mut body = stored.clone();

    for (target, source_field) in fields {
        if let Some(value) = source.get(source_field) {
            if !value.is_null() {
                body.insert(target.clone(), value.clone());
            }
        }
    }

    Value::Object(body)
}

fn parse_request_body(body: Option<&[u8]>) -> Map<String, Value> {
    body.and_then(|b| serde_json::from_slice::<Value>(b).ok())
        .and_then(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default()
}
