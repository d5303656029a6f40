//! Raccolta test utilities.
//!
//! Helpers for integration testing: record fixtures, caller permissions,
//! collection definitions, and JSON assertion utilities.

use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

/// Create a test record with default values.
pub fn test_record(subtype: &str, title: &str) -> TestRecord {
    TestRecord {
        id: Uuid::now_v7().to_string(),
        subtype: subtype.to_string(),
        title: title.to_string(),
        status: 1,
        created: 0,
        fields: Map::new(),
    }
}

/// Create `count` published room records with ids `1..=count`.
///
/// Record `n` is titled `Room n` and created at `n`, so sorting by
/// `created` keeps id order.
pub fn rooms(count: usize) -> Vec<TestRecord> {
    (1..=count)
        .map(|n| {
            test_record("room", &format!("Room {n}"))
                .with_id(&n.to_string())
                .created_at(n as i64)
        })
        .collect()
}

/// A test record builder for dataset fixtures.
#[derive(Debug, Clone)]
pub struct TestRecord {
    pub id: String,
    pub subtype: String,
    pub title: String,
    pub status: i64,
    pub created: i64,
    pub fields: Map<String, JsonValue>,
}

impl TestRecord {
    /// Set a custom ID.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Set as unpublished.
    pub fn unpublished(mut self) -> Self {
        self.status = 0;
        self
    }

    /// Set as published.
    pub fn published(mut self) -> Self {
        self.status = 1;
        self
    }

    /// Set the creation timestamp.
    pub fn created_at(mut self, created: i64) -> Self {
        self.created = created;
        self
    }

    /// Add a single field.
    pub fn with_field(mut self, name: &str, value: JsonValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Flat record as stored in a dataset table.
    pub fn into_json(self) -> JsonValue {
        let mut record = Map::new();
        record.insert("id".to_string(), JsonValue::String(self.id));
        record.insert("type".to_string(), JsonValue::String(self.subtype));
        record.insert("title".to_string(), JsonValue::String(self.title));
        record.insert("status".to_string(), self.status.into());
        record.insert("created".to_string(), self.created.into());
        record.extend(self.fields);
        JsonValue::Object(record)
    }
}

/// Build a dataset document holding `records` in `table`.
///
/// JSON is valid YAML, so the serialized value loads as a dataset file.
pub fn dataset(table: &str, records: Vec<TestRecord>) -> JsonValue {
    let rows: Vec<JsonValue> = records.into_iter().map(TestRecord::into_json).collect();
    let mut tables = Map::new();
    tables.insert(table.to_string(), JsonValue::Array(rows));
    serde_json::json!({ "tables": tables })
}

/// Create a test caller with the given permissions.
pub fn test_user(permissions: &[&str]) -> TestUser {
    TestUser {
        id: Uuid::now_v7(),
        permissions: permissions.iter().map(|s| s.to_string()).collect(),
    }
}

/// Create an anonymous caller holding only `access content`.
pub fn anonymous_user() -> TestUser {
    TestUser {
        id: Uuid::nil(),
        permissions: vec!["access content".to_string()],
    }
}

/// Create an editor caller.
pub fn editor_user() -> TestUser {
    TestUser {
        id: Uuid::now_v7(),
        permissions: vec![
            "access content".to_string(),
            "administer content".to_string(),
        ],
    }
}

/// A test caller builder.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub permissions: Vec<String>,
}

impl TestUser {
    /// Add a permission.
    pub fn with_permission(mut self, perm: &str) -> Self {
        self.permissions.push(perm.to_string());
        self
    }

    /// Check if the caller has a permission.
    pub fn has_permission(&self, perm: &str) -> bool {
        self.permissions.iter().any(|p| p == perm)
    }
}

/// Assertion helpers for JSON content.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{}', got: {}",
            key,
            value
        );
    }

    /// Assert that a JSON value does not have a specific key.
    pub fn lacks_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_none(),
            "Expected JSON to NOT have key '{}', got: {}",
            key,
            value
        );
    }

    /// Assert that a JSON value equals expected.
    pub fn json_eq(actual: &Value, expected: &Value) {
        assert_eq!(
            actual,
            expected,
            "JSON mismatch:\nactual: {}\nexpected: {}",
            serde_json::to_string_pretty(actual).unwrap_or_default(),
            serde_json::to_string_pretty(expected).unwrap_or_default()
        );
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{}'\nActual: {}",
            needle,
            haystack
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{}'\nActual: {}",
            needle,
            haystack
        );
    }

    /// Ids of a collection document's `data` array, in order.
    pub fn data_ids(document: &Value) -> Vec<String> {
        document["data"]
            .as_array()
            .unwrap_or_else(|| panic!("Expected `data` array, got: {document}"))
            .iter()
            .map(|r| r["id"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

/// Collection definition builders for testing.
pub mod collections {
    use serde_json::json;

    /// A `rooms` collection over `item` rows of subtype `room`.
    ///
    /// Displays:
    /// - `page`: 5 per page, full pager, public
    /// - `mini`: 5 per page, mini pager, public
    /// - `block`: first 3 rows, no pager, public
    /// - `all`: every row, public
    /// - `admin`: requires `administer content`
    pub fn rooms_config() -> serde_json::Value {
        json!({
            "resource_types": { "node": ["room", "location"] },
            "collections": [
                {
                    "name": "rooms",
                    "label": "Rooms",
                    "entity_kind": "node",
                    "conditions": [
                        { "field": "type", "operator": "equals", "value": "room" }
                    ],
                    "filters": [
                        {
                            "name": "status",
                            "shape": { "type": "enum", "values": ["0", "1"] },
                            "default": "1"
                        },
                        {
                            "name": "title",
                            "operator": "contains",
                            "shape": { "type": "string", "max_length": 64 }
                        }
                    ],
                    "sorts": [{ "field": "created", "direction": "asc" }],
                    "displays": [
                        { "name": "page", "items_per_page": 5, "cache_max_age": 60 },
                        {
                            "name": "mini",
                            "items_per_page": 5,
                            "pager": { "style": "mini" }
                        },
                        {
                            "name": "block",
                            "items_per_page": 3,
                            "pager": { "enabled": false }
                        },
                        { "name": "all", "items_per_page": 0 },
                        {
                            "name": "admin",
                            "items_per_page": 5,
                            "access": { "type": "permission", "permission": "administer content" }
                        }
                    ]
                },
                {
                    "name": "accounts",
                    "entity_kind": "user",
                    "displays": [{ "name": "page" }]
                }
            ]
        })
    }
}
