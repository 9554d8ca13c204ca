//! Success indicators recognised in callback payloads
//!
//! Different workflow nodes report success in different shapes. A payload is
//! accepted when any one of the indicators below is present; they are
//! checked in order and the first hit is reported.

use serde_json::Value;

/// One recognised way of saying "this record was handled"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessIndicator {
    /// `{ "success": true }`
    SuccessFlag,
    /// `{ "status": "ok" }`
    StatusOk,
    /// `{ "flag": "success" }`
    FlagSuccess,
    /// `{ "result": "success" }`
    ResultSuccess,
}

impl SuccessIndicator {
    /// All indicators, in evaluation order
    pub const ALL: [SuccessIndicator; 4] = [
        SuccessIndicator::SuccessFlag,
        SuccessIndicator::StatusOk,
        SuccessIndicator::FlagSuccess,
        SuccessIndicator::ResultSuccess,
    ];

    /// Payload field the indicator inspects
    pub fn field(self) -> &'static str {
        match self {
            SuccessIndicator::SuccessFlag => "success",
            SuccessIndicator::StatusOk => "status",
            SuccessIndicator::FlagSuccess => "flag",
            SuccessIndicator::ResultSuccess => "result",
        }
    }

    /// Exact match; no case folding and no coercion of strings or numbers.
    pub fn matches(self, payload: &Value) -> bool {
        let Some(value) = payload.get(self.field()) else {
            return false;
        };

        match self {
            SuccessIndicator::SuccessFlag => value.as_bool() == Some(true),
            SuccessIndicator::StatusOk => value.as_str() == Some("ok"),
            SuccessIndicator::FlagSuccess | SuccessIndicator::ResultSuccess => {
                value.as_str() == Some("success")
            },
        }
    }
}

/// First indicator present in `payload`, if any
pub fn recognize(payload: &Value) -> Option<SuccessIndicator> {
    SuccessIndicator::ALL
        .into_iter()
        .find(|indicator| indicator.matches(payload))
}
