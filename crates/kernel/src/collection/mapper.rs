//! Result rows to JSON:API resource objects.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::types::ExecutionResult;
use crate::error::CollectionError;

/// Resolves the resource type of an entity kind and subtype.
pub trait ResourceTypeResolver: Send + Sync {
    /// Resource type name, or `None` when the pair is unmappable.
    fn resolve(&self, entity_kind: &str, subtype: &str) -> Option<String>;

    /// Every resource type of an entity kind.
    fn resource_types(&self, entity_kind: &str) -> Vec<String>;
}

/// Resolver backed by a declared entity kind → subtypes table.
///
/// Type names follow the `{entity_kind}--{subtype}` convention.
#[derive(Debug, Clone, Default)]
pub struct BundleResourceTypeResolver {
    bundles: BTreeMap<String, BTreeSet<String>>,
}

impl BundleResourceTypeResolver {
    pub fn new(bundles: &BTreeMap<String, Vec<String>>) -> Self {
        Self {
            bundles: bundles
                .iter()
                .map(|(kind, subtypes)| (kind.clone(), subtypes.iter().cloned().collect()))
                .collect(),
        }
    }
}

impl ResourceTypeResolver for BundleResourceTypeResolver {
    fn resolve(&self, entity_kind: &str, subtype: &str) -> Option<String> {
        self.bundles
            .get(entity_kind)
            .filter(|subtypes| subtypes.contains(subtype))
            .map(|_| format!("{entity_kind}--{subtype}"))
    }

    fn resource_types(&self, entity_kind: &str) -> Vec<String> {
        self.bundles
            .get(entity_kind)
            .map(|subtypes| {
                subtypes
                    .iter()
                    .map(|subtype| format!("{entity_kind}--{subtype}"))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A mapped result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceObject {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Map every row to a resource object, preserving row order.
///
/// A row whose subtype has no resource type fails the whole mapping.
pub fn map_rows(
    result: ExecutionResult,
    resolver: &dyn ResourceTypeResolver,
) -> Result<Vec<ResourceObject>, CollectionError> {
    result
        .rows
        .into_iter()
        .map(|row| {
            let resource_type = row
                .subtype
                .as_deref()
                .and_then(|subtype| resolver.resolve(&row.entity_kind, subtype))
                .ok_or_else(|| CollectionError::UnmappableRow {
                    row_id: row.id.clone(),
                    entity_kind: row.entity_kind.clone(),
                    subtype: row.subtype.clone().unwrap_or_default(),
                })?;

            Ok(ResourceObject {
                id: row.id,
                resource_type,
                attributes: row.attributes,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::collection::types::ExecutionRow;

    fn resolver() -> BundleResourceTypeResolver {
        let mut bundles = BTreeMap::new();
        bundles.insert(
            "node".to_string(),
            vec!["room".to_string(), "location".to_string()],
        );
        BundleResourceTypeResolver::new(&bundles)
    }

    fn row(id: &str, subtype: Option<&str>) -> ExecutionRow {
        let mut attributes = serde_json::Map::new();
        attributes.insert("title".to_string(), serde_json::json!(format!("Title {id}")));
        ExecutionRow {
            id: id.to_string(),
            entity_kind: "node".to_string(),
            subtype: subtype.map(str::to_string),
            attributes,
        }
    }

    #[test]
    fn resolves_known_subtypes() {
        let resolver = resolver();
        assert_eq!(resolver.resolve("node", "room"), Some("node--room".to_string()));
        assert_eq!(resolver.resolve("node", "article"), None);
        assert_eq!(resolver.resolve("user", "user"), None);
        assert_eq!(
            resolver.resource_types("node"),
            vec!["node--location".to_string(), "node--room".to_string()]
        );
        assert!(resolver.resource_types("user").is_empty());
    }

    #[test]
    fn mapping_preserves_order() {
        let result = ExecutionResult {
            rows: vec![
                row("c", Some("room")),
                row("a", Some("location")),
                row("b", Some("room")),
            ],
            total: Some(3),
            page: 0,
        };

        let mapped = map_rows(result, &resolver()).unwrap();
        let ids: Vec<&str> = mapped.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(mapped[1].resource_type, "node--location");
        assert_eq!(mapped[0].attributes["title"], "Title c");
    }

    #[test]
    fn unknown_subtype_is_an_error() {
        let result = ExecutionResult {
            rows: vec![row("a", Some("room")), row("b", Some("article"))],
            total: Some(2),
            page: 0,
        };

        match map_rows(result, &resolver()) {
            Err(CollectionError::UnmappableRow {
                row_id, subtype, ..
            }) => {
                assert_eq!(row_id, "b");
                assert_eq!(subtype, "article");
            }
            other => panic!("expected UnmappableRow, got {other:?}"),
        }
    }

    #[test]
    fn missing_subtype_is_an_error() {
        let result = ExecutionResult {
            rows: vec![row("a", None)],
            total: Some(1),
            page: 0,
        };
        assert!(matches!(
            map_rows(result, &resolver()),
            Err(CollectionError::UnmappableRow { .. })
        ));
    }

    #[test]
    fn resource_object_serializes_type_key() {
        let object = ResourceObject {
            id: "1".to_string(),
            resource_type: "node--room".to_string(),
            attributes: serde_json::Map::new(),
        };
        let json = serde_json::to_value(&object).unwrap();
        assert_eq!(json["type"], "node--room");
        assert_eq!(json["id"], "1");
    }
}
