//! Scoring query tree, serialized under the `query` key of the search body.
//! See `https://www.elastic.co/guide/en/elasticsearch/reference/current/query-dsl.html`

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// `https://www.elastic.co/guide/en/elasticsearch/reference/current/query-dsl-query-string-query.html`
    String {
        query: String,
        default_field: Option<String>,
        default_operator: Option<String>,
    },
    Term {
        field: String,
        value: serde_json::Value,
    },
    Terms {
        field: String,
        values: Vec<serde_json::Value>,
        minimum_match: Option<u32>,
    },
    /// Bounds are passed through as-is (`gt`, `gte`, `lt`, `lte`, ...)
    Range {
        field: String,
        bounds: serde_json::Value,
    },
    Prefix {
        field: String,
        value: String,
    },
    Ids {
        values: Vec<String>,
        doc_type: Option<String>,
    },
    All,
    Boolean(BooleanQuery),
}

impl Query {
    pub fn string(query: impl Into<String>) -> Self {
        Self::String {
            query: query.into(),
            default_field: None,
            default_operator: None,
        }
    }

    /// Query string search that targets a single field
    /// when the query itself names none
    pub fn string_in(query: impl Into<String>, default_field: impl Into<String>) -> Self {
        Self::String {
            query: query.into(),
            default_field: Some(default_field.into()),
            default_operator: None,
        }
    }

    pub fn term(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        Self::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
            minimum_match: None,
        }
    }

    pub fn range(field: impl Into<String>, bounds: serde_json::Value) -> Self {
        Self::Range {
            field: field.into(),
            bounds,
        }
    }

    pub fn prefix(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Prefix {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn ids<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ids {
            values: values.into_iter().map(Into::into).collect(),
            doc_type: None,
        }
    }

    pub const fn all() -> Self {
        Self::All
    }

    /// Builds a boolean combination of other queries
    /// by running `build` against an empty [`BooleanQuery`]
    pub fn boolean(build: impl FnOnce(BooleanQuery) -> BooleanQuery) -> Self {
        Self::Boolean(build(BooleanQuery::default()))
    }

    /// Sets `minimum_match` on a terms query; other query types are left unchanged
    #[must_use]
    pub fn minimum_match(mut self, minimum: u32) -> Self {
        if let Self::Terms {
            ref mut minimum_match,
            ..
        } = self
        {
            *minimum_match = Some(minimum);
        }
        self
    }

    /// Sets `default_operator` on a query string query; other query types are left unchanged
    #[must_use]
    pub fn default_operator(mut self, operator: impl Into<String>) -> Self {
        if let Self::String {
            ref mut default_operator,
            ..
        } = self
        {
            *default_operator = Some(operator.into());
        }
        self
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String {
                query,
                default_field,
                default_operator,
            } => {
                let mut inner = serde_json::Map::new();
                inner.insert(String::from("query"), query.clone().into());
                if let Some(field) = default_field {
                    inner.insert(String::from("default_field"), field.clone().into());
                }
                if let Some(operator) = default_operator {
                    inner.insert(String::from("default_operator"), operator.clone().into());
                }
                serde_json::json!({ "query_string": inner })
            }
            Self::Term { field, value } => serde_json::json!({
                "term": { field.clone(): value }
            }),
            Self::Terms {
                field,
                values,
                minimum_match,
            } => {
                let mut inner = serde_json::Map::new();
                inner.insert(field.clone(), serde_json::Value::Array(values.clone()));
                if let Some(minimum) = minimum_match {
                    inner.insert(String::from("minimum_match"), (*minimum).into());
                }
                serde_json::json!({ "terms": inner })
            }
            Self::Range { field, bounds } => serde_json::json!({
                "range": { field.clone(): bounds }
            }),
            Self::Prefix { field, value } => serde_json::json!({
                "prefix": { field.clone(): value }
            }),
            Self::Ids { values, doc_type } => match doc_type {
                Some(doc_type) => serde_json::json!({
                    "ids": { "values": values, "type": doc_type }
                }),
                None => serde_json::json!({ "ids": { "values": values } }),
            },
            Self::All => serde_json::json!({ "match_all": {} }),
            Self::Boolean(boolean) => serde_json::json!({ "bool": boolean.to_json() }),
        }
    }
}

impl Serialize for Query {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

/// Builder for the Bool query:
/// `https://www.elastic.co/guide/en/elasticsearch/reference/current/query-dsl-bool-query.html`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BooleanQuery {
    must: Vec<Query>,
    should: Vec<Query>,
    must_not: Vec<Query>,
    minimum_number_should_match: Option<u32>,
    boost: Option<f64>,
}

impl BooleanQuery {
    #[must_use]
    pub fn must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    #[must_use]
    pub fn should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    #[must_use]
    pub fn must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    #[must_use]
    pub fn minimum_number_should_match(mut self, minimum: u32) -> Self {
        self.minimum_number_should_match = Some(minimum);
        self
    }

    #[must_use]
    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    fn to_json(&self) -> serde_json::Value {
        let mut inner = serde_json::Map::new();
        let clauses = [
            ("must", &self.must),
            ("should", &self.should),
            ("must_not", &self.must_not),
        ];
        for (key, queries) in clauses {
            if !queries.is_empty() {
                let values = queries.iter().map(Query::to_json).collect::<Vec<_>>();
                inner.insert(String::from(key), serde_json::Value::Array(values));
            }
        }
        if let Some(minimum) = self.minimum_number_should_match {
            inner.insert(
                String::from("minimum_number_should_match"),
                minimum.into(),
            );
        }
        if let Some(boost) = self.boost {
            inner.insert(String::from("boost"), boost.into());
        }
        serde_json::Value::Object(inner)
    }
}
