//! List response shaping.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{cursor::encode_key, paginate::Page};

/// Canonical list payload: `{"items": [...], "next": token | null}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListBody {
    pub items: Vec<Value>,
    pub next: Option<String>,
}

/// Renders a page with an opaque `next` token.
pub fn list_response_body<T>(page: Page<T>, render: impl FnMut(T) -> Value) -> Value {
    let next = encode_key(page.next.as_ref());
    let items: Vec<Value> = page.items.into_iter().map(render).collect();
    json!({ "items": items, "next": next })
}

/// Reads a list payload regardless of where the array sits.
///
/// A bare array is taken as the items. An object may carry them under
/// `items`, `rows` or `data`; the token is read from `next` or `nextCursor`.
/// Anything else yields an empty list.
pub fn normalize_list_body(body: Value) -> ListBody {
    match body {
        Value::Array(items) => ListBody { items, next: None },
        Value::Object(mut map) => {
            let items = ["items", "rows", "data"]
                .iter()
                .find_map(|k| match map.remove(*k) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                })
                .unwrap_or_default();
            let next = ["next", "nextCursor"].iter().find_map(|k| match map.remove(*k) {
                Some(Value::String(s)) if !s.is_empty() => Some(s),
                _ => None,
            });
            ListBody { items, next }
        }
        _ => ListBody::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_nested_shapes() {
        let rows = normalize_list_body(json!({ "rows": [1, 2], "nextCursor": "abc" }));
        assert_eq!(rows.items, vec![json!(1), json!(2)]);
        assert_eq!(rows.next.as_deref(), Some("abc"));

        let data = normalize_list_body(json!({ "data": [{ "id": "a" }] }));
        assert_eq!(data.items.len(), 1);
        assert_eq!(data.next, None);

        let bare = normalize_list_body(json!([3]));
        assert_eq!(bare.items, vec![json!(3)]);

        assert_eq!(normalize_list_body(json!("junk")), ListBody::default());
    }

    #[test]
    fn null_next_is_none() {
        let body = normalize_list_body(json!({ "items": [], "next": null }));
        assert!(body.items.is_empty());
        assert_eq!(body.next, None);
    }
}
