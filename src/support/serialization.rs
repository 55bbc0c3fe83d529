// src/support/serialization.rs

//! Deep-copy of task results into plain JSON values.
//!
//! Whatever a task hands back is materialised through `serde` before it is
//! attached to an event, so subscribers only ever see owned plain data.

use serde::Serialize;
use serde_json::Value;

use crate::errors::Result;
use crate::events::EventData;

/// Materialise any serialisable value as a plain JSON value.
pub fn flatten<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Turn a flattened result into event data.
///
/// Objects are used as-is; any other value is wrapped under `"result"`.
/// `null` yields empty data.
pub fn into_event_data(value: Value) -> EventData {
    match value {
        Value::Object(map) => map,
        Value::Null => EventData::new(),
        other => {
            let mut data = EventData::new();
            data.insert("result".to_string(), other);
            data
        }
    }
}
