//! Read-only views over the hits of one search response.
//! Response shape: `https://www.elastic.co/guide/en/elasticsearch/reference/7.10/search-search.html#search-api-response-body`

use serde::de::DeserializeOwned;

/// Hits of a single search response.
/// Documents are views into the already-fetched hit array;
/// iterating again starts over and never re-fetches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultCollection {
    took: Option<u64>,
    total: u64,
    max_score: Option<f64>,
    hits: Vec<serde_json::Value>,
    facets: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

impl ResultCollection {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Empty collection standing in for a search that reported an error
    #[must_use]
    pub fn failed(error: serde_json::Value) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Takes apart a decoded search response.
    /// Missing pieces are treated as absent rather than as errors.
    #[must_use]
    pub fn from_response(mut response: serde_json::Value) -> Self {
        let took = response.get("took").and_then(serde_json::Value::as_u64);
        let facets = response.get_mut("facets").map(serde_json::Value::take);

        let mut hits_object = response
            .get_mut("hits")
            .map(serde_json::Value::take)
            .unwrap_or_default();
        let hits = match hits_object.get_mut("hits").map(serde_json::Value::take) {
            Some(serde_json::Value::Array(hits)) => hits,
            _ => Vec::new(),
        };
        let total = hits_object
            .get("total")
            .and_then(parse_total)
            .unwrap_or(hits.len() as u64);
        let max_score = hits_object
            .get("max_score")
            .and_then(serde_json::Value::as_f64);

        Self {
            took,
            total,
            max_score,
            hits,
            facets,
            error: None,
        }
    }

    #[must_use]
    pub const fn took(&self) -> Option<u64> {
        self.took
    }

    /// Total number of matching documents, which can exceed the number of hits returned
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub const fn max_score(&self) -> Option<f64> {
        self.max_score
    }

    #[must_use]
    pub const fn facets(&self) -> Option<&serde_json::Value> {
        self.facets.as_ref()
    }

    #[must_use]
    pub fn facet(&self, name: &str) -> Option<&serde_json::Value> {
        self.facets.as_ref().and_then(|facets| facets.get(name))
    }

    /// The error reported for this search, if it failed inside a multi-search
    #[must_use]
    pub const fn error(&self) -> Option<&serde_json::Value> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<Document<'_>> {
        self.hits.get(position).map(|hit| self.view(hit))
    }

    #[must_use]
    pub fn first(&self) -> Option<Document<'_>> {
        self.get(0)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Document<'_>> + '_ {
        self.hits.iter().map(move |hit| self.view(hit))
    }

    const fn view<'a>(&self, hit: &'a serde_json::Value) -> Document<'a> {
        Document {
            hit,
            total: self.total,
        }
    }
}

impl<'a> IntoIterator for &'a ResultCollection {
    type Item = Document<'a>;
    type IntoIter = Box<dyn ExactSizeIterator<Item = Document<'a>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Both `"total": 12` and `"total": {"value": 12, "relation": "eq"}` are accepted
fn parse_total(total: &serde_json::Value) -> Option<u64> {
    total
        .as_u64()
        .or_else(|| total.get("value").and_then(serde_json::Value::as_u64))
}

/// A single hit
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    hit: &'a serde_json::Value,
    total: u64,
}

impl<'a> Document<'a> {
    #[must_use]
    pub fn id(&self) -> Option<&'a str> {
        self.hit.get("_id").and_then(serde_json::Value::as_str)
    }

    #[must_use]
    pub fn index(&self) -> Option<&'a str> {
        self.hit.get("_index").and_then(serde_json::Value::as_str)
    }

    #[must_use]
    pub fn doc_type(&self) -> Option<&'a str> {
        self.hit.get("_type").and_then(serde_json::Value::as_str)
    }

    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.hit.get("_score").and_then(serde_json::Value::as_f64)
    }

    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.hit.get("_version").and_then(serde_json::Value::as_u64)
    }

    /// Total hits of the search this document came from
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Looks the field up in `_source`, then in the requested `fields`
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&'a serde_json::Value> {
        self.hit
            .get("_source")
            .and_then(|source| source.get(field))
            .or_else(|| self.hit.get("fields").and_then(|fields| fields.get(field)))
    }

    #[must_use]
    pub fn source(&self) -> Option<&'a serde_json::Map<String, serde_json::Value>> {
        self.hit.get("_source").and_then(serde_json::Value::as_object)
    }

    /// Highlighted fragments for the field
    #[must_use]
    pub fn highlight(&self, field: &str) -> Option<&'a serde_json::Value> {
        self.hit.get("highlight").and_then(|highlight| highlight.get(field))
    }

    #[must_use]
    pub fn sort_values(&self) -> Option<&'a [serde_json::Value]> {
        self.hit
            .get("sort")
            .and_then(serde_json::Value::as_array)
            .map(Vec::as_slice)
    }

    #[must_use]
    pub const fn raw(&self) -> &'a serde_json::Value {
        self.hit
    }

    /// Decodes `_source` (or `fields` when no source was returned) into `T`
    pub fn deserialize<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        let body = self
            .hit
            .get("_source")
            .or_else(|| self.hit.get("fields"))
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        serde_json::from_value(body)
    }
}
