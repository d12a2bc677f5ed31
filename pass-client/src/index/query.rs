//! Search values, criteria and the query document sent to `_search`.

use crate::error::{ClientError, ClientResult};
use pass_model::{BASE_ENTITY_TYPE, Url};
use serde_json::{Value, json};

/// A value to match exactly. `null` matches documents where the attribute is
/// missing or null.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchValue(Value);

impl SearchValue {
    pub fn null() -> Self {
        SearchValue(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<&str> for SearchValue {
    fn from(value: &str) -> Self {
        SearchValue(Value::String(value.to_string()))
    }
}

impl From<String> for SearchValue {
    fn from(value: String) -> Self {
        SearchValue(Value::String(value))
    }
}

impl From<&Url> for SearchValue {
    fn from(value: &Url) -> Self {
        SearchValue(Value::String(value.to_string()))
    }
}

impl From<Url> for SearchValue {
    fn from(value: Url) -> Self {
        SearchValue(Value::String(value.into()))
    }
}

impl From<i64> for SearchValue {
    fn from(value: i64) -> Self {
        SearchValue(Value::from(value))
    }
}

impl From<bool> for SearchValue {
    fn from(value: bool) -> Self {
        SearchValue(Value::Bool(value))
    }
}

impl From<Value> for SearchValue {
    fn from(value: Value) -> Self {
        SearchValue(value)
    }
}

impl<T: Into<SearchValue>> From<Option<T>> for SearchValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_else(SearchValue::null)
    }
}

/// Attribute/value pairs that must all match, with optional paging.
///
/// Setting an attribute twice replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    terms: Vec<(String, SearchValue)>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<SearchValue>) -> Self {
        self.insert(attribute, value);
        self
    }

    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<SearchValue>) {
        let attribute = attribute.into();
        let value = value.into();
        match self.terms.iter_mut().find(|(a, _)| *a == attribute) {
            Some(existing) => existing.1 = value,
            None => self.terms.push((attribute, value)),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn terms(&self) -> &[(String, SearchValue)] {
        &self.terms
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

pub(crate) fn validate_type(entity_type: &str) -> ClientResult<()> {
    if entity_type.trim().is_empty() {
        return Err(ClientError::Validation(
            "entity type cannot be null".to_string(),
        ));
    }
    if entity_type == BASE_ENTITY_TYPE {
        return Err(ClientError::Validation(format!(
            "entity type cannot be the abstract {BASE_ENTITY_TYPE}, use a concrete type"
        )));
    }
    Ok(())
}

pub(crate) fn validate_term(attribute: &str, value: &SearchValue) -> ClientResult<()> {
    if attribute.trim().is_empty() {
        return Err(ClientError::Validation(
            "attribute cannot be null".to_string(),
        ));
    }
    if value.0.is_array() || value.0.is_object() {
        return Err(ClientError::Validation(format!(
            "value of {attribute} cannot be a collection"
        )));
    }
    Ok(())
}

/// Validates the inputs and builds the `_search` request body.
pub(crate) fn build_query(
    entity_type: &str,
    criteria: &SearchCriteria,
    from: usize,
    size: usize,
) -> ClientResult<Value> {
    validate_type(entity_type)?;
    if criteria.is_empty() {
        return Err(ClientError::Validation(
            "at least one attribute is required".to_string(),
        ));
    }

    let mut filters = vec![json!({"term": {"@type": entity_type}})];
    for (attribute, value) in criteria.terms() {
        validate_term(attribute, value)?;
        filters.push(term_filter(attribute, value));
    }

    Ok(json!({
        "from": from,
        "size": size,
        "_source": ["@id"],
        "query": {"bool": {"filter": filters}},
    }))
}

fn term_filter(attribute: &str, value: &SearchValue) -> Value {
    match &value.0 {
        Value::Null => json!({"bool": {"must_not": {"exists": {"field": attribute}}}}),
        Value::String(s) => {
            json!({"term": {attribute: {"value": s, "case_insensitive": true}}})
        }
        other => json!({"term": {attribute: {"value": other}}}),
    }
}
