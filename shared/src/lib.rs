use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod protocol;

// =========================================================
// 常量定义 (Constants)
// =========================================================

pub const HEADER_CSRF_TOKEN: &str = "X-CSRF-Token";
pub const HEADER_REQUEST_ID: &str = "X-Request-Id";
pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_USER: &str = "USER";

pub type UserId = i64;
pub type BookId = i64;
pub type LibraryId = i64;
pub type ReadingListId = i64;
pub type RatingId = i64;
pub type ReviewId = i64;

// =========================================================
// 用户与权限 (Identity)
// =========================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub action: String,
    pub resource: String,
}

impl Permission {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
        }
    }
}

/// 已认证用户的资料
///
/// 角色与权限集合的顺序没有意义，只做成员判断。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// 展示用全名，缺失时回退到用户名
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.username.clone(),
        }
    }
}

// =========================================================
// 书目 (Catalog)
// =========================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub isbn: Option<String>,
    /// Open Library 作品标识，如 `OL45883W`
    #[serde(default)]
    pub open_library_key: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub owner_id: Option<UserId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Book {
    pub fn author_names(&self) -> String {
        self.authors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn identifiers(&self) -> String {
        [self.isbn.as_deref(), self.open_library_key.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// =========================================================
// 书架与阅读清单 (Shelves)
// =========================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub id: LibraryId,
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub book_count: Option<u32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingList {
    pub id: ReadingListId,
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub book_count: Option<u32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// 书籍归属关系（书在书架/阅读清单中）
///
/// 后端分别以 `library_id` / `reading_list_id` 命名所属集合。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    #[serde(alias = "library_id", alias = "reading_list_id")]
    pub collection_id: i64,
    pub book_id: BookId,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub book: Option<Book>,
}

impl Membership {
    /// 由两端 id 派生的复合标识
    pub fn id(&self) -> String {
        format!("{}:{}", self.collection_id, self.book_id)
    }
}

// =========================================================
// 评分与书评 (Ratings & Reviews)
// =========================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: RatingId,
    pub user_id: UserId,
    pub book_id: BookId,
    #[serde(alias = "value")]
    pub rating: u8,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub book_id: BookId,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub is_spoiler: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub book_title: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// =========================================================
// 界面偏好 (UI Preferences)
// =========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_accepts_both_owner_field_names() {
        let in_library: Membership =
            serde_json::from_str(r#"{"library_id": 3, "book_id": 9}"#).unwrap();
        let in_list: Membership =
            serde_json::from_str(r#"{"reading_list_id": 3, "book_id": 9}"#).unwrap();

        assert_eq!(in_library.id(), "3:9");
        assert_eq!(in_library.id(), in_list.id());
    }

    #[test]
    fn rating_accepts_value_alias() {
        let rating: Rating =
            serde_json::from_str(r#"{"id": 1, "user_id": 2, "book_id": 3, "value": 4}"#).unwrap();
        assert_eq!(rating.rating, 4);
    }

    #[test]
    fn book_joins_authors_and_identifiers() {
        let book: Book = serde_json::from_str(
            r#"{"id": 1, "title": "Dune",
                "authors": [{"name": "Frank Herbert"}, {"name": "Brian Herbert"}],
                "isbn": "9780441013593", "open_library_key": "OL893415W"}"#,
        )
        .unwrap();

        assert_eq!(book.author_names(), "Frank Herbert, Brian Herbert");
        assert_eq!(book.identifiers(), "9780441013593 OL893415W");
    }

    #[test]
    fn theme_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"dark\"");
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
    }
}
