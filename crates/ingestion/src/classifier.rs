//! Severity classifier - decode a raw payload and pick its route

use contracts::{DecodeError, LogRecord, RoutingDecision, SeverityTier};
use serde::Deserialize;

/// Payload as it appears on the wire
///
/// `timestamp` and `message` may be absent; the level decides routing and is
/// required.
#[derive(Debug, Deserialize)]
struct WireRecord {
    #[serde(default)]
    timestamp: f64,
    level: String,
    #[serde(default)]
    message: String,
}

/// Decode a JSON payload and map its level to a routing decision
pub fn classify(value: &[u8]) -> Result<(LogRecord, RoutingDecision), DecodeError> {
    let wire: WireRecord =
        serde_json::from_slice(value).map_err(|e| DecodeError::malformed(e.to_string()))?;
    let level: SeverityTier = wire.level.parse()?;

    let record = LogRecord {
        timestamp: wire.timestamp,
        level,
        message: wire.message,
    };
    Ok((record, RoutingDecision::for_level(level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_routes_to_alert_and_database() {
        let (record, decision) =
            classify(br#"{"timestamp": 1700000000.5, "level": "ERROR", "message": "disk full"}"#)
                .unwrap();
        assert_eq!(record.level, SeverityTier::Error);
        assert_eq!(record.message, "disk full");
        assert_eq!(record.timestamp, 1700000000.5);
        assert_eq!(decision, RoutingDecision::AlertAndDatabase);
    }

    #[test]
    fn test_levels_below_error_are_database_only() {
        for level in ["debug", "INFO", "Warn", "WARNING"] {
            let payload = format!(r#"{{"timestamp": 1, "level": "{level}", "message": "m"}}"#);
            let (_, decision) = classify(payload.as_bytes()).unwrap();
            assert_eq!(decision, RoutingDecision::DatabaseOnly, "level {level}");
        }
        let (_, decision) = classify(br#"{"level": "fatal"}"#).unwrap();
        assert_eq!(decision, RoutingDecision::AlertAndDatabase);
    }

    #[test]
    fn test_malformed_payload() {
        assert!(matches!(
            classify(b"not-json"),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(
            classify(br#"{"timestamp": 1, "message": "no level"}"#),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(
            classify(br#"{"timestamp": "soon", "level": "INFO"}"#),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(classify(b"").is_err());
    }

    #[test]
    fn test_unknown_level() {
        match classify(br#"{"timestamp": 1, "level": "TRACE", "message": "m"}"#) {
            Err(DecodeError::UnknownLevel { level }) => assert_eq!(level, "TRACE"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
