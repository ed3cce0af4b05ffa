use serde_json::Value;

use crate::error::CoreError;

/// Splits an incoming payload into the individual broker records it
/// contains. Accepts exactly the three shapes the consumer framework must
/// handle: a single record, an array of records, or a queue wrapper whose
/// `Records[].body` is a JSON-encoded record (recursive one level — the
/// body is not itself searched for further wrapping).
pub fn extract_records(payload: &Value) -> Result<Vec<Value>, CoreError> {
    match payload {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => {
            if let Some(Value::Array(records)) = map.get("Records") {
                records.iter().map(extract_sqs_record).collect()
            } else {
                Ok(vec![payload.clone()])
            }
        }
        other => Err(CoreError::permanent_decode(format!(
            "unsupported payload shape: {other}"
        ))),
    }
}

fn extract_sqs_record(record: &Value) -> Result<Value, CoreError> {
    let body = record
        .get("body")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::permanent_decode("SQS record missing string 'body' field"))?;
    serde_json::from_str(body)
        .map_err(|err| CoreError::permanent_decode(format!("SQS record body is not valid JSON: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_record_yields_one_item() {
        let payload = json!({"eventType": "file.processed"});
        let records = extract_records(&payload).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn array_yields_each_item() {
        let payload = json!([{"eventType": "a"}, {"eventType": "b"}]);
        let records = extract_records(&payload).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn sqs_records_decode_json_encoded_body() {
        let payload = json!({
            "Records": [
                {"body": "{\"eventType\": \"file.processed\"}"},
                {"body": "{\"eventType\": \"file.deletion.requested\"}"}
            ]
        });
        let records = extract_records(&payload).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["eventType"], "file.processed");
    }

    #[test]
    fn sqs_record_with_non_json_body_is_permanent() {
        let payload = json!({"Records": [{"body": "not json"}]});
        let err = extract_records(&payload).unwrap_err();
        assert!(err.is_permanent());
    }

    #[test]
    fn scalar_payload_is_permanent() {
        let payload = json!("just a string");
        let err = extract_records(&payload).unwrap_err();
        assert!(err.is_permanent());
    }
}
