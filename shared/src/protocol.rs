use crate::{BookId, ReviewId, UserId, UserProfile};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// HTTP Methods for API Requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Mutating verbs must carry the anti-forgery token.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

/// A trait that defines the request-response relationship and metadata for an API endpoint.
///
/// Path parameters live on the request struct as `#[serde(skip)]` fields so that
/// only the body is serialized.
pub trait ApiRequest: Serialize {
    /// The response type returned by this request.
    type Response: DeserializeOwned;
    /// The HTTP method.
    const METHOD: HttpMethod;
    /// The URL path, relative to the API base.
    fn path(&self) -> String;
}

// =========================================================
// Endpoints
// =========================================================

pub mod endpoints {
    use super::*;

    pub const CSRF_TOKEN: &str = "/csrf-token";
    pub const AUTH_LOGIN: &str = "/auth/login";
    pub const AUTH_REGISTER: &str = "/auth/register";
    pub const AUTH_LOGOUT: &str = "/auth/logout";
    pub const AUTH_ME: &str = "/auth/me";

    pub const BOOKS: &str = "/books";
    pub const BOOKS_TRENDING: &str = "/books/trending";
    pub const BOOKS_SEARCH: &str = "/books/search";
    pub const LIBRARIES: &str = "/libraries";
    pub const READING_LISTS: &str = "/reading-lists";
    pub const ADMIN_USERS: &str = "/admin/users";
    pub const ADMIN_REVIEWS: &str = "/admin/reviews";

    pub fn book(id: BookId) -> String {
        format!("{}/{}", BOOKS, id)
    }

    pub fn user_books(user_id: UserId) -> String {
        format!("/users/{}/books", user_id)
    }

    pub fn user_libraries(user_id: UserId) -> String {
        format!("/users/{}{}", user_id, LIBRARIES)
    }

    pub fn user_reading_lists(user_id: UserId) -> String {
        format!("/users/{}{}", user_id, READING_LISTS)
    }

    pub fn user_reviews(user_id: UserId) -> String {
        format!("/users/{}/reviews", user_id)
    }

    pub fn book_ratings(book_id: BookId) -> String {
        format!("{}/{}/ratings", BOOKS, book_id)
    }

    pub fn book_reviews(book_id: BookId) -> String {
        format!("{}/{}/reviews", BOOKS, book_id)
    }

    pub fn review(id: ReviewId) -> String {
        format!("/reviews/{}", id)
    }

    pub fn user_roles(user_id: UserId) -> String {
        format!("/users/{}/roles", user_id)
    }

    pub fn user_role(user_id: UserId, role: &str) -> String {
        format!("/users/{}/roles/{}", user_id, role)
    }

    pub fn admin_user(user_id: UserId) -> String {
        format!("{}/{}", ADMIN_USERS, user_id)
    }
}

// =========================================================
// Envelopes
// =========================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfTokenResponse {
    #[serde(rename = "csrfToken")]
    pub csrf_token: String,
}

/// Conventional error body: `{ "error": .. }` or `{ "message": .. }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorEnvelope {
    /// Prefers `error`, then `message`; blank strings count as absent.
    pub fn into_message(self) -> Option<String> {
        self.error
            .into_iter()
            .chain(self.message)
            .find(|m| !m.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserProfile,
}

// =========================================================
// Request Definitions
// =========================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl ApiRequest for LoginRequest {
    type Response = AuthResponse;
    const METHOD: HttpMethod = HttpMethod::Post;
    fn path(&self) -> String {
        endpoints::AUTH_LOGIN.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl ApiRequest for RegisterRequest {
    type Response = AuthResponse;
    const METHOD: HttpMethod = HttpMethod::Post;
    fn path(&self) -> String {
        endpoints::AUTH_REGISTER.to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_library_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
}

/// Shared by libraries and reading lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateShelfRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// Add a book to a library or reading list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddBookRequest {
    pub book_id: BookId,
}

/// Upsert the caller's rating of a book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertRatingRequest {
    #[serde(skip)]
    pub book_id: BookId,
    pub rating: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateReviewRequest {
    #[serde(skip)]
    pub book_id: BookId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub is_spoiler: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRoleRequest {
    pub role: String,
}

/// Path helpers for the two shelf kinds.
pub fn shelf_members_path(base: &str, id: i64) -> String {
    format!("{}/{}/books", base, id)
}

pub fn shelf_member_path(base: &str, id: i64, book_id: BookId) -> String {
    format!("{}/{}/books/{}", base, id, book_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_prefers_error_over_message() {
        let env: ErrorEnvelope =
            serde_json::from_str(r#"{"error": "Titre requis", "message": "Bad Request"}"#).unwrap();
        assert_eq!(env.into_message().as_deref(), Some("Titre requis"));

        let env: ErrorEnvelope = serde_json::from_str(r#"{"error": "  ", "message": "x"}"#).unwrap();
        assert_eq!(env.into_message().as_deref(), Some("x"));
    }

    #[test]
    fn path_parameters_are_not_serialized() {
        let req = UpsertRatingRequest {
            book_id: 7,
            rating: 4,
        };
        assert_eq!(serde_json::to_value(&req).unwrap(), serde_json::json!({"rating": 4}));
    }

    #[test]
    fn only_get_is_safe() {
        assert!(!HttpMethod::Get.is_mutating());
        assert!(HttpMethod::Patch.is_mutating());
        assert!(HttpMethod::Delete.is_mutating());
    }
}
