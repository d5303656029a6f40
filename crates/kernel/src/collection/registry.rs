//! Query registry.
//!
//! Flattens the collections file into one immutable [`QueryDefinition`] per
//! (collection, display) pair. Built once at startup; request handlers only
//! read from it.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use super::filter::PAGE_PARAM;
use super::links::normalize_base_path;
use super::mapper::ResourceTypeResolver;
use super::pager::MAX_ITEMS_PER_PAGE;
use super::types::{CollectionConfig, CollectionsConfig, DisplayConfig, QueryDefinition};
use crate::error::{CollectionError, RegistryError};

/// Validate that a name is a safe SQL identifier.
///
/// Matches `[A-Za-z_][A-Za-z0-9_]*` up to 63 characters, the PostgreSQL
/// identifier limit.
pub fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
}

/// A route derived from a registered display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRoute {
    /// Route name, `collections.{collection}.{display}`.
    pub name: String,
    /// Request path.
    pub path: String,
}

/// Read-only lookup of registered query definitions.
#[derive(Debug, Clone, Default)]
pub struct QueryRegistry {
    definitions: BTreeMap<String, BTreeMap<String, Arc<QueryDefinition>>>,
}

impl QueryRegistry {
    /// Build the registry from configuration.
    ///
    /// Only collections whose entity kind maps to at least one resource type
    /// are registered.
    pub fn from_config(
        config: &CollectionsConfig,
        resolver: &dyn ResourceTypeResolver,
    ) -> Result<Self, RegistryError> {
        let mut definitions: BTreeMap<String, BTreeMap<String, Arc<QueryDefinition>>> =
            BTreeMap::new();
        let mut seen = HashSet::new();

        for collection in &config.collections {
            if !seen.insert(collection.name.as_str()) {
                return Err(RegistryError::DuplicateCollection {
                    collection: collection.name.clone(),
                });
            }

            if !collection.enabled {
                debug!(collection = %collection.name, "skipping disabled collection");
                continue;
            }

            validate_collection(collection)?;

            if resolver.resource_types(&collection.entity_kind).is_empty() {
                warn!(
                    collection = %collection.name,
                    entity_kind = %collection.entity_kind,
                    "entity kind has no resource type, collection not registered"
                );
                continue;
            }

            let displays = definitions.entry(collection.name.clone()).or_default();
            for display in &collection.displays {
                if !is_safe_identifier(&display.name) {
                    return Err(RegistryError::UnsafeIdentifier {
                        what: "display name",
                        value: display.name.clone(),
                    });
                }
                if displays.contains_key(&display.name) {
                    return Err(RegistryError::DuplicateDisplay {
                        collection: collection.name.clone(),
                        display: display.name.clone(),
                    });
                }

                let definition = flatten(collection, display)?;
                displays.insert(display.name.clone(), Arc::new(definition));
            }

            if displays.is_empty() {
                warn!(collection = %collection.name, "collection has no displays");
                definitions.remove(&collection.name);
            }
        }

        Ok(Self { definitions })
    }

    /// Look up the definition of a collection display.
    pub fn resolve(
        &self,
        collection: &str,
        display: &str,
    ) -> Result<Arc<QueryDefinition>, CollectionError> {
        self.definitions
            .get(collection)
            .and_then(|displays| displays.get(display))
            .cloned()
            .ok_or_else(|| CollectionError::NotFound {
                collection: collection.to_string(),
                display: display.to_string(),
            })
    }

    /// Every registered definition, ordered by collection then display.
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<QueryDefinition>> {
        self.definitions.values().flat_map(|displays| displays.values())
    }

    /// Number of registered (collection, display) pairs.
    pub fn len(&self) -> usize {
        self.definitions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Routes for every registered display under `base_path`.
    pub fn routes(&self, base_path: &str) -> Vec<CollectionRoute> {
        let base_path = normalize_base_path(base_path);
        self.definitions()
            .map(|def| CollectionRoute {
                name: format!("collections.{}.{}", def.collection, def.display),
                path: format!("{base_path}/{}/{}", def.collection, def.display),
            })
            .collect()
    }
}

fn validate_collection(collection: &CollectionConfig) -> Result<(), RegistryError> {
    let identifiers = [
        ("collection name", collection.name.as_str()),
        ("base table", collection.base_table.as_str()),
        ("id field", collection.id_field.as_str()),
        ("subtype field", collection.subtype_field.as_str()),
    ];
    for (what, value) in identifiers {
        check_identifier(what, value)?;
    }

    for field in &collection.fields {
        check_identifier("field", field)?;
    }
    for condition in &collection.conditions {
        check_identifier("condition field", &condition.field)?;
    }
    for sort in &collection.sorts {
        check_identifier("sort field", &sort.field)?;
    }

    let mut names = HashSet::new();
    for filter in &collection.filters {
        check_identifier("filter name", &filter.name)?;
        check_identifier("filter field", filter.field())?;

        if filter.name == PAGE_PARAM {
            return Err(RegistryError::ReservedFilterName {
                collection: collection.name.clone(),
                filter: filter.name.clone(),
            });
        }
        if !names.insert(filter.name.as_str()) {
            return Err(RegistryError::DuplicateFilter {
                collection: collection.name.clone(),
                filter: filter.name.clone(),
            });
        }
        if let Some(default) = &filter.default {
            filter
                .shape
                .parse(default)
                .map_err(|reason| RegistryError::InvalidDefault {
                    collection: collection.name.clone(),
                    filter: filter.name.clone(),
                    reason,
                })?;
        }
    }

    Ok(())
}

fn check_identifier(what: &'static str, value: &str) -> Result<(), RegistryError> {
    if is_safe_identifier(value) {
        Ok(())
    } else {
        Err(RegistryError::UnsafeIdentifier {
            what,
            value: value.to_string(),
        })
    }
}

fn flatten(
    collection: &CollectionConfig,
    display: &DisplayConfig,
) -> Result<QueryDefinition, RegistryError> {
    for condition in &display.conditions {
        check_identifier("condition field", &condition.field)?;
    }
    for sort in &display.sorts {
        check_identifier("sort field", &sort.field)?;
    }

    let items_per_page = if display.items_per_page > MAX_ITEMS_PER_PAGE {
        let display_name = &display.name;
        let requested = display.items_per_page;
        warn!(
            collection = %collection.name,
            display = %display_name,
            requested,
            capped = MAX_ITEMS_PER_PAGE,
            "items_per_page exceeds maximum, capping"
        );
        MAX_ITEMS_PER_PAGE
    } else {
        display.items_per_page
    };

    let mut conditions = collection.conditions.clone();
    conditions.extend(display.conditions.iter().cloned());

    let sorts = if display.sorts.is_empty() {
        collection.sorts.clone()
    } else {
        display.sorts.clone()
    };

    let label = display
        .label
        .clone()
        .or_else(|| collection.label.clone())
        .unwrap_or_else(|| collection.name.clone());

    Ok(QueryDefinition {
        collection: collection.name.clone(),
        display: display.name.clone(),
        label,
        entity_kind: collection.entity_kind.clone(),
        base_table: collection.base_table.clone(),
        id_field: collection.id_field.clone(),
        subtype_field: collection.subtype_field.clone(),
        fields: collection.fields.clone(),
        conditions,
        filters: collection.filters.clone(),
        sorts,
        items_per_page,
        pager: display.pager.clone(),
        access: display.access.clone(),
        cache_max_age: display.cache_max_age,
    })
}
