//! Inbound request bodies.
//!
//! # Design Decisions
//! - `list_messages` is accepted as an alias of `items`
//! - A missing item list is an empty batch, rejected by the router with
//!   400 rather than by the JSON extractor
//! - Request IDs come from tower-http (`x-request-id`), set as early as
//!   possible so every log line of a batch carries it

use serde::Deserialize;
use serde_json::Value;

use crate::backend::GenerationParams;

/// Header carrying the correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Body of `POST /inference`.
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceRequest {
    #[serde(default, alias = "list_messages")]
    pub items: Vec<Value>,

    #[serde(flatten)]
    pub params: GenerationParams,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_items_and_params() {
        let req: InferenceRequest = serde_json::from_value(json!({
            "items": ["a", "b"],
            "max_tokens": 64,
            "lora_adapter": "sql"
        }))
        .unwrap();
        assert_eq!(req.items, vec![json!("a"), json!("b")]);
        assert_eq!(req.params.max_tokens, 64);
        assert_eq!(req.params.lora_adapter.as_deref(), Some("sql"));
        assert_eq!(req.params.top_p, GenerationParams::default().top_p);
    }

    #[test]
    fn test_list_messages_alias() {
        let req: InferenceRequest =
            serde_json::from_value(json!({ "list_messages": [[{"role": "user"}]] })).unwrap();
        assert_eq!(req.items.len(), 1);
    }

    #[test]
    fn test_missing_items_is_empty() {
        let req: InferenceRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.items.is_empty());
    }
}
