use serde::{Deserialize, Deserializer, Serialize};

/// A retrieved chunk of legal text.
///
/// Rows are owned by the document store; the pipeline only reads them for
/// the duration of one request. Columns that are null upstream come back as
/// empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRow {
    #[serde(deserialize_with = "loose_string")]
    pub id: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub title: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub chapter: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub section: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub content: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub filename: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub page: String,
    /// Jurisdiction label as stored upstream
    #[serde(rename = "county", default, deserialize_with = "loose_string")]
    pub jurisdiction: String,
    /// Similarity to the query; higher is more relevant. Zero for rows fetched by id.
    #[serde(default)]
    pub similarity: f32,
}

impl DocumentRow {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = jurisdiction.into();
        self
    }

    pub fn with_citation(
        mut self,
        title: impl Into<String>,
        chapter: impl Into<String>,
        section: impl Into<String>,
    ) -> Self {
        self.title = title.into();
        self.chapter = chapter.into();
        self.section = section.into();
        self
    }

    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = similarity;
        self
    }
}

/// Parameters of one similarity search.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub embedding: Vec<f32>,
    /// Minimum similarity for a row to be returned
    pub threshold: f32,
    pub limit: usize,
    /// Exact jurisdiction label to filter on, if any
    pub jurisdiction: Option<String>,
}

/// Accepts strings, numbers, booleans and null, since ids and page
/// references are typed differently across tables.
fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_tolerates_nulls_and_numbers() {
        let row: DocumentRow = serde_json::from_value(json!({
            "id": 42,
            "title": "6",
            "chapter": null,
            "section": "6.04.010",
            "content": "No person shall make loud noise.",
            "page": 12,
            "county": "Alameda County",
            "similarity": 0.82
        }))
        .unwrap();

        assert_eq!(row.id, "42");
        assert_eq!(row.chapter, "");
        assert_eq!(row.page, "12");
        assert_eq!(row.filename, "");
        assert_eq!(row.jurisdiction, "Alameda County");
        assert!((row.similarity - 0.82).abs() < f32::EPSILON);
    }

    #[test]
    fn test_row_without_similarity() {
        let row: DocumentRow = serde_json::from_value(json!({
            "id": "b7c1",
            "content": "text"
        }))
        .unwrap();
        assert_eq!(row.similarity, 0.0);
        assert_eq!(row.jurisdiction, "");
    }
}
