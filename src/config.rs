//! 客户端配置
//!
//! 默认值面向同源部署（前端与 API 由同一主机提供）。

use blablabook_shared::protocol::endpoints;

// =========================================================
// 默认值 (Defaults)
// =========================================================

pub const DEFAULT_API_BASE: &str = "/api";
pub const DEFAULT_CSRF_PATH: &str = endpoints::CSRF_TOKEN;
pub const DEFAULT_SESSION_STORAGE_KEY: &str = "blablabook-auth";
pub const DEFAULT_THEME_STORAGE_KEY: &str = "blablabook-theme";
pub const DEFAULT_METADATA_BASE: &str = "https://openlibrary.org";
pub const DEFAULT_COVER_BASE: &str = "https://covers.openlibrary.org/b/id";

/// 运行时配置
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// API 根路径，可以是相对路径（浏览器）或绝对 URL（原生平台）
    pub api_base: String,
    pub csrf_path: String,
    pub session_storage_key: String,
    pub theme_storage_key: String,
    /// 外部书目元数据服务（Open Library）
    pub metadata_base: String,
    pub cover_base: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            csrf_path: DEFAULT_CSRF_PATH.to_string(),
            session_storage_key: DEFAULT_SESSION_STORAGE_KEY.to_string(),
            theme_storage_key: DEFAULT_THEME_STORAGE_KEY.to_string(),
            metadata_base: DEFAULT_METADATA_BASE.to_string(),
            cover_base: DEFAULT_COVER_BASE.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self::default().with_api_base(api_base)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_metadata_base(mut self, metadata_base: impl Into<String>) -> Self {
        self.metadata_base = metadata_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_storage_keys(mut self, session: impl Into<String>, theme: impl Into<String>) -> Self {
        self.session_storage_key = session.into();
        self.theme_storage_key = theme.into();
        self
    }

    /// 拼接 API 路径
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.api_base, path)
        } else {
            format!("{}/{}", self.api_base, path)
        }
    }

    pub fn csrf_url(&self) -> String {
        self.url(&self.csrf_path)
    }

    pub fn work_url(&self, work_key: &str) -> String {
        format!("{}/works/{}.json", self.metadata_base, work_key)
    }

    pub fn cover_url(&self, cover_id: i64) -> String {
        format!("{}/{}-L.jpg", self.cover_base, cover_id)
    }
}
