//! `https://www.elastic.co/guide/en/elasticsearch/reference/7.10/highlighting.html`

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HighlightField {
    pub fragment_size: Option<u32>,
    pub number_of_fragments: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Highlight {
    fields: Vec<(String, HighlightField)>,
    pre_tags: Vec<String>,
    post_tags: Vec<String>,
}

impl Highlight {
    /// Highlights each of the given fields with the default fragment options
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fields
            .into_iter()
            .fold(Self::default(), |highlight, field| highlight.field(field))
    }

    #[must_use]
    pub fn field(self, name: impl Into<String>) -> Self {
        self.field_with(name, HighlightField::default())
    }

    /// Adds a highlighted field.
    /// Adding the same field twice replaces its options but keeps its position.
    #[must_use]
    pub fn field_with(mut self, name: impl Into<String>, options: HighlightField) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing_options)) => *existing_options = options,
            None => self.fields.push((name, options)),
        }
        self
    }

    #[must_use]
    pub fn tags(mut self, pre: impl Into<String>, post: impl Into<String>) -> Self {
        self.pre_tags.push(pre.into());
        self.post_tags.push(post.into());
        self
    }

    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Serializes the field list as a map, keeping insertion order
struct OrderedFields<'a>(&'a [(String, HighlightField)]);

impl Serialize for OrderedFields<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, options) in self.0 {
            map.serialize_entry(name, options)?;
        }
        map.end()
    }
}

impl Serialize for Highlight {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let has_tags = !self.pre_tags.is_empty();
        let mut map = serializer.serialize_map(Some(if has_tags { 3 } else { 1 }))?;
        map.serialize_entry("fields", &OrderedFields(&self.fields))?;
        if has_tags {
            map.serialize_entry("pre_tags", &self.pre_tags)?;
            map.serialize_entry("post_tags", &self.post_tags)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_field() {
        let highlight = Highlight::fields(["body"]);
        assert_eq!(
            serde_json::to_string(&highlight).unwrap(),
            r#"{"fields":{"body":{}}}"#
        );
    }

    #[test]
    fn fields_keep_order_and_options() {
        let highlight = Highlight::fields(["title"]).field("body").field_with(
            "title",
            HighlightField {
                fragment_size: Some(150),
                number_of_fragments: Some(3),
            },
        );
        assert_eq!(highlight.field_names(), vec!["title", "body"]);
        assert_eq!(
            serde_json::to_string(&highlight).unwrap(),
            r#"{"fields":{"title":{"fragment_size":150,"number_of_fragments":3},"body":{}}}"#
        );
    }

    #[test]
    fn tags() {
        let highlight = Highlight::fields(["body"]).tags("<em>", "</em>");
        assert_eq!(
            serde_json::to_string(&highlight).unwrap(),
            r#"{"fields":{"body":{}},"pre_tags":["<em>"],"post_tags":["</em>"]}"#
        );
    }
}
