//! Facet definitions requested alongside a search

use crate::search::query::Query;
use serde::{Serialize, Serializer};

const DEFAULT_TERMS_SIZE: u32 = 10;
const DEFAULT_DATE_INTERVAL: &str = "day";

/// Options that apply to the facet as a whole rather than to its kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetOptions {
    /// Computes the facet over every document in the index,
    /// ignoring the search query
    pub global: bool,
    pub facet_filter: Option<serde_json::Value>,
}

impl FacetOptions {
    #[must_use]
    pub fn global() -> Self {
        Self {
            global: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermsFacet {
    pub size: u32,
    pub all_terms: bool,
    /// One of `count`, `term`, `reverse_count`, `reverse_term`
    pub order: Option<String>,
}

impl Default for TermsFacet {
    fn default() -> Self {
        Self {
            size: DEFAULT_TERMS_SIZE,
            all_terms: false,
            order: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FacetKind {
    Terms { field: String, terms: TermsFacet },
    DateHistogram { field: String, interval: String },
    Range { field: String, ranges: Vec<serde_json::Value> },
    Histogram { field: String, interval: u64 },
    Statistical { field: String },
    TermsStats { key_field: String, value_field: String },
    Query(Query),
    Filter(serde_json::Value),
}

impl FacetKind {
    fn name_and_body(&self) -> (&'static str, serde_json::Value) {
        match self {
            Self::Terms { field, terms } => {
                let mut body = serde_json::json!({
                    "field": field,
                    "size": terms.size,
                    "all_terms": terms.all_terms,
                });
                if let (Some(order), Some(map)) = (&terms.order, body.as_object_mut()) {
                    map.insert(String::from("order"), order.clone().into());
                }
                ("terms", body)
            }
            Self::DateHistogram { field, interval } => (
                "date_histogram",
                serde_json::json!({ "field": field, "interval": interval }),
            ),
            Self::Range { field, ranges } => (
                "range",
                serde_json::json!({ "field": field, "ranges": ranges }),
            ),
            Self::Histogram { field, interval } => (
                "histogram",
                serde_json::json!({ "field": field, "interval": interval }),
            ),
            Self::Statistical { field } => ("statistical", serde_json::json!({ "field": field })),
            Self::TermsStats {
                key_field,
                value_field,
            } => (
                "terms_stats",
                serde_json::json!({ "key_field": key_field, "value_field": value_field }),
            ),
            Self::Query(query) => ("query", query.to_json()),
            Self::Filter(filter) => ("filter", filter.clone()),
        }
    }
}

/// A single facet definition, as stored under its name in the `facets` object
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    kind: FacetKind,
    options: FacetOptions,
}

impl Facet {
    #[must_use]
    pub const fn options(&self) -> &FacetOptions {
        &self.options
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let (name, body) = self.kind.name_and_body();
        let mut definition = serde_json::Map::new();
        definition.insert(String::from(name), body);
        if self.options.global {
            definition.insert(String::from("global"), true.into());
        }
        if let Some(facet_filter) = &self.options.facet_filter {
            definition.insert(String::from("facet_filter"), facet_filter.clone());
        }
        serde_json::Value::Object(definition)
    }
}

impl Serialize for Facet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

/// Handed to the facet configuration function;
/// each method finishes the definition with one facet kind
#[derive(Debug, Clone, Default)]
pub struct FacetBuilder {
    options: FacetOptions,
}

impl FacetBuilder {
    pub(crate) fn new(options: FacetOptions) -> Self {
        Self { options }
    }

    fn finish(self, kind: FacetKind) -> Facet {
        Facet {
            kind,
            options: self.options,
        }
    }

    pub fn terms(self, field: impl Into<String>) -> Facet {
        self.terms_with(field, TermsFacet::default())
    }

    pub fn terms_with(self, field: impl Into<String>, terms: TermsFacet) -> Facet {
        self.finish(FacetKind::Terms {
            field: field.into(),
            terms,
        })
    }

    pub fn date(self, field: impl Into<String>) -> Facet {
        self.date_with(field, DEFAULT_DATE_INTERVAL)
    }

    pub fn date_with(self, field: impl Into<String>, interval: impl Into<String>) -> Facet {
        self.finish(FacetKind::DateHistogram {
            field: field.into(),
            interval: interval.into(),
        })
    }

    /// Each range is passed through as-is, e.g. `{"from": 10, "to": 20}`
    pub fn range(self, field: impl Into<String>, ranges: Vec<serde_json::Value>) -> Facet {
        self.finish(FacetKind::Range {
            field: field.into(),
            ranges,
        })
    }

    pub fn histogram(self, field: impl Into<String>, interval: u64) -> Facet {
        self.finish(FacetKind::Histogram {
            field: field.into(),
            interval,
        })
    }

    pub fn statistical(self, field: impl Into<String>) -> Facet {
        self.finish(FacetKind::Statistical {
            field: field.into(),
        })
    }

    pub fn terms_stats(self, key_field: impl Into<String>, value_field: impl Into<String>) -> Facet {
        self.finish(FacetKind::TermsStats {
            key_field: key_field.into(),
            value_field: value_field.into(),
        })
    }

    pub fn query(self, query: Query) -> Facet {
        self.finish(FacetKind::Query(query))
    }

    pub fn filter(self, kind: impl Into<String>, body: serde_json::Value) -> Facet {
        let mut filter = serde_json::Map::new();
        filter.insert(kind.into(), body);
        self.finish(FacetKind::Filter(serde_json::Value::Object(filter)))
    }
}
