use crate::ipc::error::err;

/// Handler-internal error carried up to the wire response. Mirrors the
/// `{code, message, details?}` error object of the protocol.
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn bad_params(message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code: "not_found",
            message: message.into(),
            details: None,
        }
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Required and non-blank (the registration form treats whitespace as empty).
pub fn get_required_non_empty(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let v = get_required_str(params, key)?;
    if v.trim().is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(v)
}

pub fn get_opt_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Store failures: a JSON decode error means a corrupt value under some key,
/// anything else is a database-level failure.
pub fn map_store_err(e: anyhow::Error) -> HandlerErr {
    let corrupt = e
        .chain()
        .any(|cause| cause.downcast_ref::<serde_json::Error>().is_some());
    HandlerErr {
        code: if corrupt { "store_corrupt" } else { "db_query_failed" },
        message: format!("{:#}", e),
        details: None,
    }
}
