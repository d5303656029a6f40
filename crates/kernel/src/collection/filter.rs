//! Exposed filter binding.
//!
//! Turns caller-supplied query parameters into validated filter values.
//! The declared filters of a definition are a closed set: anything else is
//! rejected here and never reaches a query engine.

use super::types::{FilterOperator, FilterValue, QueryDefinition};
use crate::error::ValidationError;

/// Query-string key carrying the page number.
pub const PAGE_PARAM: &str = "page";

/// One validated filter, resolved against its declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundFilter {
    pub name: String,
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

/// Validated filter values, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundFilters(Vec<BoundFilter>);

impl BoundFilters {
    /// Value bound to a parameter, if any.
    pub fn get(&self, name: &str) -> Option<&FilterValue> {
        self.0.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundFilter> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Extract exposed filter input from raw query pairs.
///
/// Recognizes `filter[name]`, the legacy `views-filter[name]`, and bare
/// `name` keys. The page key is not filter input and is dropped.
pub fn exposed_input(params: &[(String, String)]) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(key, _)| key != PAGE_PARAM)
        .map(|(key, value)| (filter_name(key).to_string(), value.clone()))
        .collect()
}

fn filter_name(key: &str) -> &str {
    ["filter[", "views-filter["]
        .iter()
        .find_map(|prefix| key.strip_prefix(prefix)?.strip_suffix(']'))
        .unwrap_or(key)
}

/// Bind raw filter input against a definition's declared parameters.
///
/// Unknown names fail with `UnknownParameter`, values that do not fit the
/// declared shape fail with `InvalidValue`. Unsupplied (or empty) parameters
/// take their declared default; parameters without a default stay unbound.
/// When a name is supplied more than once, the last value wins.
pub fn bind(
    definition: &QueryDefinition,
    raw: &[(String, String)],
) -> Result<BoundFilters, ValidationError> {
    if let Some((name, _)) = raw.iter().find(|(name, _)| definition.filter(name).is_none()) {
        return Err(ValidationError::UnknownParameter(name.clone()));
    }

    let mut bound = Vec::with_capacity(definition.filters.len());

    for param in &definition.filters {
        let supplied = raw
            .iter()
            .rev()
            .find(|(name, value)| name == &param.name && !value.is_empty())
            .map(|(_, value)| value.as_str());

        let Some(text) = supplied.or(param.default.as_deref()) else {
            continue;
        };

        let value = param
            .shape
            .parse(text)
            .map_err(|reason| ValidationError::InvalidValue {
                parameter: param.name.clone(),
                reason,
            })?;

        bound.push(BoundFilter {
            name: param.name.clone(),
            field: param.field().to_string(),
            operator: param.operator,
            value,
        });
    }

    Ok(BoundFilters(bound))
}
