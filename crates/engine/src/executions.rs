use common::{ExecutionNotice, Payload, Result};

/// Render an `executions` payload as `symbol: <s> price: <p> amount: <a>`.
///
/// Fails with `Error::Decode` if `data` is missing or not an object.
pub fn format_execution_notice(payload: &Payload) -> Result<String> {
    Ok(ExecutionNotice::from_payload(payload)?.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(v: serde_json::Value) -> Payload {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn formats_fill() {
        let p = payload(json!({"data": {"symbol": "BTC", "price": "50000", "amount": "0.1"}}));
        assert_eq!(
            format_execution_notice(&p).unwrap(),
            "symbol: BTC price: 50000 amount: 0.1"
        );
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let p = payload(json!({"data": [1, 2]}));
        assert!(format_execution_notice(&p).unwrap_err().is_decode());
    }
}
