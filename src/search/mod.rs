//! Describes a single search and converts it into the Elasticsearch wire format

pub mod facet;
pub mod highlight;
pub mod query;
pub mod sort;

use crate::search::facet::{Facet, FacetBuilder, FacetOptions};
use crate::search::highlight::Highlight;
use crate::search::query::Query;
use crate::search::sort::Sort;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use url::Url;

/// Options that are not part of the query tree itself.
/// `routing` and `timeout` travel in the URL query string;
/// the rest are emitted in the search body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub routing: Option<String>,
    pub timeout: Option<String>,
    /// Document type to limit the search to (the `type` option)
    pub doc_type: Option<String>,
    pub size: Option<u64>,
    pub from: Option<u64>,
    pub fields: Option<Vec<String>>,
    pub version: bool,
    pub explain: bool,
    pub group_field: Option<String>,
}

/// A composable description of one search.
/// Nothing is cached: the body is rebuilt on every call to [`SearchRequest::to_json`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    indices: Vec<String>,
    query: Option<Query>,
    filters: Vec<serde_json::Value>,
    facets: Vec<(String, Facet)>,
    sort: Sort,
    highlight: Option<Highlight>,
    options: SearchOptions,
}

/// The body sent to `_search`, borrowing from its [`SearchRequest`].
/// Keys are only present when they differ from Elasticsearch's defaults.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct QueryDocument<'a> {
    query: Option<&'a Query>,
    filter: Option<FilterClause<'a>>,
    facets: Option<OrderedFacets<'a>>,
    sort: Option<&'a Sort>,
    highlight: Option<&'a Highlight>,
    size: Option<u64>,
    from: Option<u64>,
    fields: Option<&'a [String]>,
    version: Option<bool>,
    explain: Option<bool>,
    #[serde(rename = "groupField")]
    group_field: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum FilterClause<'a> {
    Single(&'a serde_json::Value),
    And { and: &'a [serde_json::Value] },
}

/// Serializes the facets as a map, in the order they were first added
#[derive(Debug)]
struct OrderedFacets<'a>(&'a [(String, Facet)]);

impl Serialize for OrderedFacets<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, facet) in self.0 {
            map.serialize_entry(name, facet)?;
        }
        map.end()
    }
}

impl SearchRequest {
    /// Creates a search over the given indices.
    /// Duplicate index names are dropped, keeping the first occurrence;
    /// an empty list searches every index.
    pub fn new<I, S>(indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_options(indices, SearchOptions::default())
    }

    pub fn with_options<I, S>(indices: I, options: SearchOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique = Vec::<String>::new();
        for index in indices {
            let index = index.into();
            if !index.is_empty() && !unique.contains(&index) {
                unique.push(index);
            }
        }

        Self {
            indices: unique,
            options,
            ..Self::default()
        }
    }

    /// Creates a search across every index
    #[must_use]
    pub fn all_indices() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    /// Adds a non-scoring filter clause of the given type, e.g. `filter("term", json!({"tag": "x"}))`
    #[must_use]
    pub fn filter(mut self, kind: impl Into<String>, body: serde_json::Value) -> Self {
        let mut clause = serde_json::Map::new();
        clause.insert(kind.into(), body);
        self.filters.push(serde_json::Value::Object(clause));
        self
    }

    /// Adds a facet under `name`.
    /// Reusing a name replaces the earlier definition.
    #[must_use]
    pub fn facet(self, name: impl Into<String>, build: impl FnOnce(FacetBuilder) -> Facet) -> Self {
        self.facet_with(name, FacetOptions::default(), build)
    }

    #[must_use]
    pub fn facet_with(
        mut self,
        name: impl Into<String>,
        options: FacetOptions,
        build: impl FnOnce(FacetBuilder) -> Facet,
    ) -> Self {
        let name = name.into();
        let facet = build(FacetBuilder::new(options));
        match self.facets.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing_facet)) => *existing_facet = facet,
            None => self.facets.push((name, facet)),
        }
        self
    }

    /// Replaces the sort criteria with the ones added by `build`
    #[must_use]
    pub fn sort(mut self, build: impl FnOnce(Sort) -> Sort) -> Self {
        self.sort = build(Sort::new());
        self
    }

    #[must_use]
    pub fn highlight(mut self, highlight: Highlight) -> Self {
        self.highlight = Some(highlight);
        self
    }

    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.options.size = Some(size);
        self
    }

    #[must_use]
    pub fn from(mut self, from: u64) -> Self {
        self.options.from = Some(from);
        self
    }

    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn version(mut self, version: bool) -> Self {
        self.options.version = version;
        self
    }

    #[must_use]
    pub fn explain(mut self, explain: bool) -> Self {
        self.options.explain = explain;
        self
    }

    #[must_use]
    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.options.doc_type = Some(doc_type.into());
        self
    }

    #[must_use]
    pub fn routing(mut self, routing: impl Into<String>) -> Self {
        self.options.routing = Some(routing.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: impl Into<String>) -> Self {
        self.options.timeout = Some(timeout.into());
        self
    }

    #[must_use]
    pub fn group_field(mut self, group_field: impl Into<String>) -> Self {
        self.options.group_field = Some(group_field.into());
        self
    }

    #[must_use]
    pub fn indices(&self) -> &[String] {
        &self.indices
    }

    #[must_use]
    pub const fn options(&self) -> &SearchOptions {
        &self.options
    }

    #[must_use]
    pub fn filters(&self) -> &[serde_json::Value] {
        &self.filters
    }

    #[must_use]
    pub fn facets(&self) -> &[(String, Facet)] {
        &self.facets
    }

    #[must_use]
    pub fn facet_named(&self, name: &str) -> Option<&Facet> {
        self.facets
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, facet)| facet)
    }

    #[must_use]
    pub const fn sort_criteria(&self) -> &Sort {
        &self.sort
    }

    #[must_use]
    pub const fn highlighting(&self) -> Option<&Highlight> {
        self.highlight.as_ref()
    }

    #[must_use]
    pub fn to_query_document(&self) -> QueryDocument<'_> {
        let filter = match self.filters.as_slice() {
            [] => None,
            [single] => Some(FilterClause::Single(single)),
            all => Some(FilterClause::And { and: all }),
        };

        QueryDocument {
            query: self.query.as_ref(),
            filter,
            facets: Some(OrderedFacets(&self.facets)).filter(|facets| !facets.0.is_empty()),
            sort: Some(&self.sort).filter(|sort| !sort.is_empty()),
            highlight: self.highlight.as_ref(),
            size: self.options.size,
            from: self.options.from,
            fields: self.options.fields.as_deref(),
            version: self.options.version.then_some(true),
            explain: self.options.explain.then_some(true),
            group_field: self.options.group_field.as_deref(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_query_document())
    }

    /// `{base}/{indices}/{type}/_search`, leaving out the segments that are not set
    #[must_use]
    pub fn url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.set_query(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            if !self.indices.is_empty() {
                segments.push(&self.indices.join(","));
            }
            if let Some(doc_type) = &self.options.doc_type {
                segments.push(doc_type);
            }
            segments.push("_search");
        }
        url
    }

    /// URL-encoded query string (including the leading `?`),
    /// or an empty string if no URL params are set
    #[must_use]
    pub fn params(&self) -> String {
        let pairs = self.param_pairs();
        if pairs.is_empty() {
            return String::new();
        }

        let mut serializer = url::form_urlencoded::Serializer::new(String::from("?"));
        serializer.extend_pairs(pairs);
        serializer.finish()
    }

    fn param_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(routing) = &self.options.routing {
            pairs.push(("routing", routing.as_str()));
        }
        if let Some(timeout) = &self.options.timeout {
            pairs.push(("timeout", timeout.as_str()));
        }
        pairs
    }

    /// The URL the search is actually sent to ([`SearchRequest::url`] plus the params)
    #[must_use]
    pub fn request_url(&self, base: &Url) -> Url {
        let mut url = self.url(base);
        let pairs = self.param_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        url
    }

    /// Equivalent command line call, for diagnostics only
    pub fn to_curl(&self, base: &Url) -> Result<String, serde_json::Error> {
        let params = self.params();
        let separator = if params.is_empty() {
            String::from("?")
        } else {
            params + "&"
        };
        Ok(format!(
            "curl -X POST \"{}{}pretty=true\" -d '{}'",
            self.url(base),
            separator,
            self.to_json()?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::highlight::HighlightField;
    use crate::search::sort::Direction;
    use serde_json::json;

    fn base() -> Url {
        Url::parse("http://localhost:9200").unwrap()
    }

    fn body(request: &SearchRequest) -> serde_json::Value {
        serde_json::from_str(&request.to_json().unwrap()).unwrap()
    }

    #[test]
    fn url_with_single_index() {
        let request = SearchRequest::new(["index"]).query(Query::string("foo"));
        assert_eq!(
            request.url(&base()).as_str(),
            "http://localhost:9200/index/_search"
        );
    }

    #[test]
    fn url_with_multiple_indices() {
        let request = SearchRequest::new(["index1", "index2"]);
        assert_eq!(
            request.url(&base()).as_str(),
            "http://localhost:9200/index1,index2/_search"
        );

        let request = SearchRequest::new(["index1,index2,index3"]);
        assert!(request
            .url(&base())
            .as_str()
            .ends_with("/index1,index2,index3/_search"));
    }

    #[test]
    fn url_without_indices_searches_everything() {
        let request = SearchRequest::all_indices().query(Query::string("foo"));
        assert_eq!(request.url(&base()).as_str(), "http://localhost:9200/_search");
        assert!(request.indices().is_empty());
    }

    #[test]
    fn url_with_document_type() {
        let request = SearchRequest::new(["index"]).doc_type("bar");
        assert!(request.url(&base()).as_str().ends_with("/index/bar/_search"));
    }

    #[test]
    fn url_escapes_namespaced_document_type() {
        let request = SearchRequest::new(["index"]).doc_type("my_application/article");
        assert!(request
            .url(&base())
            .as_str()
            .ends_with("/index/my_application%2Farticle/_search"));
        assert!(request
            .to_curl(&base())
            .unwrap()
            .contains("/index/my_application%2Farticle/_search"));
    }

    #[test]
    fn url_uses_configured_server() {
        let base = Url::parse("http://es1.example.com").unwrap();
        let request = SearchRequest::new(["indexA"]);
        assert_eq!(
            request.request_url(&base).as_str(),
            "http://es1.example.com/indexA/_search"
        );
    }

    #[test]
    fn indices_are_unique_and_ordered() {
        let request = SearchRequest::new(["index1", "index2", "index1"]);
        assert_eq!(request.indices(), ["index1", "index2"]);
    }

    #[test]
    fn params() {
        let request = SearchRequest::new(["index"]).routing("123").timeout("1");
        assert_eq!(request.params(), "?routing=123&timeout=1");
        assert_eq!(
            request.request_url(&base()).as_str(),
            "http://localhost:9200/index/_search?routing=123&timeout=1"
        );
    }

    #[test]
    fn missing_params_are_an_empty_string() {
        let request = SearchRequest::new(["index"]).query(Query::string("foo"));
        assert_eq!(request.params(), "");
        let url = request.request_url(&base());
        assert!(!url.as_str().contains('?'));
        assert!(!url.as_str().contains('&'));
    }

    #[test]
    fn curl_snippet() {
        let request = SearchRequest::new(["index"]).query(Query::string("title:foo"));
        assert_eq!(
            request.to_curl(&base()).unwrap(),
            r#"curl -X POST "http://localhost:9200/index/_search?pretty=true" -d '{"query":{"query_string":{"query":"title:foo"}}}'"#
        );

        let request = SearchRequest::new(["index_1", "index_2"]).routing("7");
        let curl = request.to_curl(&base()).unwrap();
        assert!(curl.contains("index_1,index_2"));
        assert!(curl.contains("_search?routing=7&pretty=true"));
    }

    #[test]
    fn query_document() {
        let request = SearchRequest::new(["index"]).query(Query::string("title:foo"));
        assert_eq!(
            body(&request),
            json!({"query": {"query_string": {"query": "title:foo"}}})
        );
    }

    #[test]
    fn empty_request_has_no_keys() {
        assert_eq!(request_json(&SearchRequest::new(["index"])), "{}");
    }

    fn request_json(request: &SearchRequest) -> String {
        request.to_json().unwrap()
    }

    #[test]
    fn single_filter_is_emitted_directly() {
        let request = SearchRequest::new(["index"]).filter("terms", json!({"tags": ["foo"]}));
        assert_eq!(request.filters().len(), 1);
        assert_eq!(body(&request)["filter"], json!({"terms": {"tags": ["foo"]}}));
    }

    #[test]
    fn multiple_filters_are_and_wrapped_in_order() {
        let request = SearchRequest::new(["index"])
            .filter("terms", json!({"tags": ["foo"]}))
            .filter("term", json!({"words": 125}));
        assert_eq!(request.filters().len(), 2);
        assert_eq!(
            request_json(&request),
            r#"{"filter":{"and":[{"terms":{"tags":["foo"]}},{"term":{"words":125}}]}}"#
        );
    }

    #[test]
    fn filters_can_be_added_after_construction() {
        let request = SearchRequest::new(["index"]).query(Query::string("foo"));
        assert!(request.filters().is_empty());
        let request = request.filter("term", json!({"other_field": "bar"}));
        assert_eq!(request.filters().len(), 1);
        assert!(body(&request).get("filter").is_some());
    }

    #[test]
    fn facets_are_keyed_by_name() {
        let request = SearchRequest::new(["index"])
            .facet("foo1", |f| f.terms("bar"))
            .facet_with("foo2", FacetOptions::global(), |f| f.terms("bar"))
            .facet("foo3", |f| f.terms("baz"))
            .facet("date", |f| f.date("published_on"));
        assert_eq!(request.facets().len(), 4);
        assert!(request.facet_named("foo2").unwrap().options().global);
        assert!(request.facet_named("missing").is_none());
        assert_eq!(
            body(&request)["facets"]["foo3"],
            json!({"terms": {"field": "baz", "size": 10, "all_terms": false}})
        );
    }

    #[test]
    fn reused_facet_name_keeps_last_definition() {
        let request = SearchRequest::new(["index"])
            .facet("tags", |f| f.terms("tags"))
            .facet("tags", |f| f.statistical("words"));
        assert_eq!(request.facets().len(), 1);
        assert_eq!(
            body(&request)["facets"]["tags"],
            json!({"statistical": {"field": "words"}})
        );
    }

    #[test]
    fn facets_keep_insertion_order() {
        let request = SearchRequest::new(["index"])
            .facet("zeta", |f| f.terms("a"))
            .facet("alpha", |f| f.date("published_on"))
            .facet("zeta", |f| f.terms("b"));
        assert_eq!(
            request_json(&request),
            concat!(
                r#"{"facets":{"zeta":{"terms":{"field":"b","size":10,"all_terms":false}},"#,
                r#""alpha":{"date_histogram":{"field":"published_on","interval":"day"}}}}"#,
            )
        );
    }

    #[test]
    fn nested_objects_keep_key_order() {
        let request = SearchRequest::new(["index"])
            .query(Query::string_in("foo", "title").default_operator("AND"))
            .facet_with("tags", FacetOptions::global(), |f| f.terms("tags"));
        assert_eq!(
            request_json(&request),
            concat!(
                r#"{"query":{"query_string":{"query":"foo","default_field":"title","default_operator":"AND"}},"#,
                r#""facets":{"tags":{"terms":{"field":"tags","size":10,"all_terms":false},"global":true}}}"#,
            )
        );
    }

    #[test]
    fn sort_by_multiple_fields() {
        let request = SearchRequest::new(["index"])
            .sort(|s| s.by("title", Direction::Desc).by("_score", None));
        assert_eq!(body(&request)["sort"], json!([{"title": "desc"}, "_score"]));
    }

    #[test]
    fn sort_by_geo_location() {
        let request = SearchRequest::new(["index"]).sort(|s| s.geo("geohash"));
        let sort = &body(&request)["sort"];
        assert_eq!(sort.as_array().unwrap().len(), 1);
        let geo = &sort[0]["_geo_distance"];
        assert_eq!(geo["location"], json!("geohash"));
        assert!(geo.get("order").is_some());
        assert!(geo.get("unit").is_some());
    }

    #[test]
    fn chaining_replaces_sort() {
        let request = SearchRequest::new(["index"])
            .query(Query::all())
            .sort(|s| s.by("title", Direction::Desc))
            .size(5)
            .sort(|s| s.by("name", Direction::Asc))
            .from(1);
        let value = body(&request);
        assert_eq!(value["sort"], json!([{"name": "asc"}]));
        assert_eq!(value["size"], json!(5));
        assert_eq!(value["from"], json!(1));
    }

    #[test]
    fn highlight() {
        let request = SearchRequest::new(["index"]).highlight(
            Highlight::fields(["body"]).field_with(
                "title",
                HighlightField {
                    fragment_size: Some(150),
                    number_of_fragments: Some(3),
                },
            ),
        );
        assert!(request.highlighting().is_some());
        assert_eq!(
            body(&request)["highlight"],
            json!({"fields": {"body": {}, "title": {"fragment_size": 150, "number_of_fragments": 3}}})
        );
    }

    #[test]
    fn size_and_from() {
        let request = SearchRequest::new(["index"]).size(5).from(3);
        let value = body(&request);
        assert_eq!(value["size"], json!(5));
        assert_eq!(value["from"], json!(3));
        assert_eq!(request.options().size, Some(5));
        assert_eq!(request.options().from, Some(3));
    }

    #[test]
    fn fields() {
        let request = SearchRequest::new(["index"]).fields(["title"]);
        assert_eq!(body(&request)["fields"], json!(["title"]));

        let request = SearchRequest::new(["index"]).fields(vec!["title", "tags"]);
        assert_eq!(body(&request)["fields"], json!(["title", "tags"]));
    }

    #[test]
    fn version_and_explain_only_when_true() {
        let value = body(&SearchRequest::new(["index"]).version(true).explain(true));
        assert_eq!(value["version"], json!(true));
        assert_eq!(value["explain"], json!(true));

        let value = body(&SearchRequest::new(["index"]).version(false).explain(false));
        assert!(value.get("version").is_none());
        assert!(value.get("explain").is_none());
    }

    #[test]
    fn group_field() {
        assert!(body(&SearchRequest::new(["index"])).get("groupField").is_none());

        let options = SearchOptions {
            group_field: Some(String::from("foo")),
            ..SearchOptions::default()
        };
        let request = SearchRequest::with_options(["index"], options);
        assert_eq!(body(&request)["groupField"], json!("foo"));
        assert_eq!(request.options().group_field.as_deref(), Some("foo"));
    }

    #[test]
    fn key_order_is_stable() {
        let request = SearchRequest::new(["index"])
            .explain(true)
            .size(10)
            .sort(|s| s.by("_score", None))
            .filter("term", json!({"a": 1}))
            .query(Query::all());
        assert_eq!(
            request_json(&request),
            r#"{"query":{"match_all":{}},"filter":{"term":{"a":1}},"sort":["_score"],"size":10,"explain":true}"#
        );
    }
}
