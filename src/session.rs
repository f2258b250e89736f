//! Caller session state carried across requests: current user, current page and submission markers.

use crate::model::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    /// Authenticated user id, if any. Scopes user-specific models.
    #[serde(default)]
    pub user_id: Option<Value>,
    /// Current page request parameter; pagination falls back to it.
    #[serde(default)]
    pub page: Option<u64>,
    /// Last submission fingerprint per model name.
    #[serde(default)]
    submissions: HashMap<String, String>,
}

impl UserSession {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: impl Into<Value>) -> Self {
        UserSession {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    /// SHA-256 over the serialized scalar fields, in field order.
    pub fn fingerprint(record: &Record) -> String {
        let fields: serde_json::Map<String, Value> = record
            .scalars()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let bytes = serde_json::to_vec(&fields).unwrap_or_default();
        format!("{:x}", Sha256::digest(&bytes))
    }

    pub fn is_duplicate(&self, model: &str, fingerprint: &str) -> bool {
        self.submissions.get(model).map(String::as_str) == Some(fingerprint)
    }

    pub fn remember_submission(&mut self, model: &str, fingerprint: String) {
        self.submissions.insert(model.to_string(), fingerprint);
    }
}
