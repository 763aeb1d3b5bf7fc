//! Thin proxy to the external book catalog.
//!
//! Queries a Google-Books-shaped volumes API and reshapes the response into
//! the flat book records the client consumes. Upstream failures surface as a
//! single generic error; nothing from the upstream payload beyond the mapped
//! fields is passed through.

use serde::{Deserialize, Serialize};

use crate::config::CatalogConfig;

/// A normalized catalog search result. `id` is the catalog's own volume id,
/// which becomes `catalog_id` when the book is saved locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogBook {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub cover_image_url: Option<String>,
    pub description: String,
}

// Upstream wire shapes. Only the fields we map are declared.

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    id: String,
    #[serde(rename = "volumeInfo")]
    volume_info: VolumeInfo,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct VolumeInfo {
    title: Option<String>,
    authors: Vec<String>,
    #[serde(rename = "imageLinks")]
    image_links: Option<ImageLinks>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageLinks {
    thumbnail: Option<String>,
}

#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    max_results: u32,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            max_results: config.max_results,
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<CatalogBook>, reqwest::Error> {
        let max_results = self.max_results.to_string();
        let response: VolumesResponse = self
            .http
            .get(&self.base_url)
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(normalize(response))
    }
}

fn normalize(response: VolumesResponse) -> Vec<CatalogBook> {
    response
        .items
        .into_iter()
        .map(|item| {
            let info = item.volume_info;
            CatalogBook {
                id: item.id,
                title: info.title.unwrap_or_default(),
                authors: info.authors,
                cover_image_url: info.image_links.and_then(|l| l.thumbnail),
                description: info.description.unwrap_or_default(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_maps_full_volume() {
        let raw = r#"{
            "items": [{
                "id": "abc123",
                "volumeInfo": {
                    "title": "Dune",
                    "authors": ["Frank Herbert"],
                    "imageLinks": { "thumbnail": "http://img/dune.jpg" },
                    "description": "Desert planet."
                }
            }]
        }"#;
        let response: VolumesResponse = serde_json::from_str(raw).unwrap();
        let books = normalize(response);

        assert_eq!(books.len(), 1);
        assert_eq!(books[0].id, "abc123");
        assert_eq!(books[0].title, "Dune");
        assert_eq!(books[0].authors, vec!["Frank Herbert"]);
        assert_eq!(
            books[0].cover_image_url.as_deref(),
            Some("http://img/dune.jpg")
        );
        assert_eq!(books[0].description, "Desert planet.");
    }

    #[test]
    fn normalize_defaults_missing_fields() {
        let raw = r#"{
            "items": [{
                "id": "xyz",
                "volumeInfo": { "title": "Untitled" }
            }]
        }"#;
        let response: VolumesResponse = serde_json::from_str(raw).unwrap();
        let books = normalize(response);

        assert_eq!(books[0].authors, Vec::<String>::new());
        assert!(books[0].cover_image_url.is_none());
        assert_eq!(books[0].description, "");
    }

    #[test]
    fn normalize_handles_empty_result_set() {
        let response: VolumesResponse = serde_json::from_str("{}").unwrap();
        assert!(normalize(response).is_empty());
    }

    #[test]
    fn catalog_book_serializes_for_client() {
        let book = CatalogBook {
            id: "abc".into(),
            title: "Dune".into(),
            authors: vec!["Frank Herbert".into()],
            cover_image_url: None,
            description: "".into(),
        };
        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["cover_image_url"], serde_json::Value::Null);
    }
}
