//! Sort clauses for the `sort` param in the ES Query DSL:
//! `https://www.elastic.co/guide/en/elasticsearch/reference/7.10/sort-search-results.html`

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
enum SortEntry {
    Field(String),
    Directed(String, Direction),
    GeoDistance(serde_json::Value),
}

impl SortEntry {
    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Field(name) => serde_json::Value::String(name.clone()),
            Self::Directed(name, direction) => serde_json::json!({ name.clone(): direction }),
            Self::GeoDistance(location) => serde_json::json!({
                "_geo_distance": {
                    "location": location,
                    "order": "asc",
                    "unit": "km",
                }
            }),
        }
    }
}

/// Ordered list of sort criteria.
/// Entries are emitted in exactly the order they were added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sort {
    entries: Vec<SortEntry>,
}

impl Sort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts by the given field.
    /// Without a direction the bare field name is emitted
    /// and Elasticsearch picks the default order for it.
    #[must_use]
    pub fn by(mut self, field: impl Into<String>, direction: impl Into<Option<Direction>>) -> Self {
        let field = field.into();
        let entry = match direction.into() {
            Some(direction) => SortEntry::Directed(field, direction),
            None => SortEntry::Field(field),
        };
        self.entries.push(entry);
        self
    }

    /// Sorts by distance from the given location, nearest first, in kilometers
    #[must_use]
    pub fn geo(mut self, location: impl Into<serde_json::Value>) -> Self {
        self.entries.push(SortEntry::GeoDistance(location.into()));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.entries.iter().map(SortEntry::to_json).collect())
    }
}

impl Serialize for Sort {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}
