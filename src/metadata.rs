//! 外部书目元数据（Open Library）
//!
//! 只读、尽力而为：查询失败时调用方保留已知字段。

use blablabook_shared::Book;
use serde::Deserialize;

use crate::api::ApiGateway;
use crate::error::ApiResult;
use crate::request::HttpClient;

/// 只取前几个主题作为体裁
const MAX_GENRES: usize = 5;

/// `description` 可能是纯字符串，也可能是 `{ "type": .., "value": .. }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextValue {
    Plain(String),
    Typed { value: String },
}

impl TextValue {
    fn into_text(self) -> String {
        match self {
            TextValue::Plain(text) | TextValue::Typed { value: text } => text,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<TextValue>,
    #[serde(default)]
    covers: Vec<i64>,
    #[serde(default)]
    subjects: Vec<String>,
}

/// 作品详情
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub subjects: Vec<String>,
}

impl WorkDetails {
    /// 用查询结果补全书目，没有值的字段保持原样
    pub fn enrich(&self, book: &mut Book) {
        if let Some(description) = &self.description {
            book.summary = Some(description.clone());
        }
        if let Some(cover) = &self.cover_url {
            book.cover_url = Some(cover.clone());
        }
        if book.genres.is_empty() {
            book.genres = self.subjects.iter().take(MAX_GENRES).cloned().collect();
        }
    }
}

/// 规范化作品标识：`/works/OL45883W` -> `OL45883W`
pub fn normalize_work_key(key: &str) -> Option<&str> {
    let key = key.trim().trim_start_matches("/works/").trim_matches('/');
    if key.is_empty() { None } else { Some(key) }
}

pub async fn fetch_work<C: HttpClient + 'static>(
    gateway: &ApiGateway<C>,
    work_key: &str,
) -> ApiResult<WorkDetails> {
    let url = gateway.config().work_url(work_key);
    tracing::debug!(work_key, "查询外部书目元数据");
    let response = gateway.fetch_external(&url).await?;
    let record: WorkRecord = response
        .json()
        .map_err(|e| e.in_op_with("metadata.work", work_key))?;

    // Open Library 用负数表示无封面
    let cover_url = record
        .covers
        .iter()
        .find(|id| **id > 0)
        .map(|id| gateway.config().cover_url(*id));

    Ok(WorkDetails {
        title: record.title,
        description: record
            .description
            .map(TextValue::into_text)
            .filter(|d| !d.trim().is_empty()),
        cover_url,
        subjects: record.subjects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorKind;
    use crate::request::HttpMethod;
    use crate::test_support::{Harness, book};
    use serde_json::json;

    #[test]
    fn test_normalize_work_key() {
        assert_eq!(normalize_work_key("/works/OL45883W"), Some("OL45883W"));
        assert_eq!(normalize_work_key("OL45883W"), Some("OL45883W"));
        assert_eq!(normalize_work_key("  "), None);
    }

    #[tokio::test]
    async fn test_typed_description_and_first_real_cover() {
        let h = Harness::new();
        h.client().mock_response(
            HttpMethod::Get,
            "http://meta.local/works/OL1W.json",
            200,
            json!({
                "title": "Dune",
                "description": {"type": "/type/text", "value": "Sur Arrakis..."},
                "covers": [-1, 8231856],
                "subjects": ["Science fiction", "Déserts"]
            }),
        );

        let details = fetch_work(&h.gateway, "OL1W").await.unwrap();

        assert_eq!(details.description.as_deref(), Some("Sur Arrakis..."));
        assert_eq!(
            details.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/8231856-L.jpg")
        );

        let mut dune = book(1, "Dune", "Frank Herbert", None);
        dune.summary = Some("ancien résumé".to_string());
        details.enrich(&mut dune);
        assert_eq!(dune.summary.as_deref(), Some("Sur Arrakis..."));
        assert_eq!(dune.genres, vec!["Science fiction", "Déserts"]);
    }

    #[tokio::test]
    async fn test_missing_fields_keep_known_values() {
        let h = Harness::new();
        h.client().mock_response(
            HttpMethod::Get,
            "http://meta.local/works/OL2W.json",
            200,
            json!({"description": "Court", "covers": []}),
        );

        let details = fetch_work(&h.gateway, "OL2W").await.unwrap();
        let mut book = book(2, "Fondation", "Isaac Asimov", None);
        book.cover_url = Some("https://exemple.fr/c.jpg".to_string());
        details.enrich(&mut book);

        assert_eq!(book.summary.as_deref(), Some("Court"));
        assert_eq!(book.cover_url.as_deref(), Some("https://exemple.fr/c.jpg"));
    }

    #[tokio::test]
    async fn test_external_failure_does_not_touch_session() {
        let h = Harness::signed_in(crate::test_support::profile(1, &[]));
        h.client()
            .mock_response(HttpMethod::Get, "http://meta.local/works/OL3W.json", 401, json!({}));

        let err = fetch_work(&h.gateway, "OL3W").await.unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::Auth);
        assert!(h.gateway.session().is_authenticated());
        assert_eq!(h.redirects(), 0);
    }
}
