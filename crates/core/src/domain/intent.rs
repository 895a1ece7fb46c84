use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of question categories the router can pick from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    AuditTrail,
    ErrorLog,
    Trend,
    Anomaly,
}

impl Intent {
    pub const ALL: [Intent; 4] = [Self::AuditTrail, Self::ErrorLog, Self::Trend, Self::Anomaly];

    /// Used whenever classification output cannot be trusted.
    pub const DEFAULT: Intent = Self::AuditTrail;

    pub fn token(&self) -> &'static str {
        match self {
            Self::AuditTrail => "audittrail",
            Self::ErrorLog => "errorlog",
            Self::Trend => "trend",
            Self::Anomaly => "anomaly",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::AuditTrail => "AuditTrail",
            Self::ErrorLog => "ErrorLog",
            Self::Trend => "Trend",
            Self::Anomaly => "Anomaly",
        }
    }

    /// Exact token match after lowercasing and trimming. Anything else is `None`.
    pub fn from_token(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|intent| intent.token() == normalized)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::Intent;

    #[test]
    fn tokens_round_trip_through_from_token() {
        for intent in Intent::ALL {
            assert_eq!(Intent::from_token(intent.token()), Some(intent));
        }
    }

    #[test]
    fn from_token_normalizes_case_and_whitespace() {
        assert_eq!(Intent::from_token("  Trend\n"), Some(Intent::Trend));
        assert_eq!(Intent::from_token("ERRORLOG"), Some(Intent::ErrorLog));
    }

    #[test]
    fn from_token_rejects_near_misses() {
        assert_eq!(Intent::from_token("trend."), None);
        assert_eq!(Intent::from_token("audit trail"), None);
        assert_eq!(Intent::from_token(""), None);
    }

    #[test]
    fn serializes_as_lowercase_token() {
        let encoded = serde_json::to_string(&Intent::AuditTrail).expect("serialize");
        assert_eq!(encoded, "\"audittrail\"");
    }
}
