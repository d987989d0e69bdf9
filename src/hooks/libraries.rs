//! 书架 (Library)

use std::borrow::Cow;
use std::cmp::Ordering;

use blablabook_shared::protocol::endpoints;
use blablabook_shared::{Library, LibraryId, UserId};
use chrono::{DateTime, Utc};

use crate::collection::Entity;
use crate::hooks::shelf::{Shelf, ShelfHook, ShelfSort, compare_shelves};

pub type LibrariesHook<C> = ShelfHook<Library, C>;

impl Entity for Library {
    type Id = LibraryId;
    type Sort = ShelfSort;
    const COLLECTION: &'static str = "libraries";
    const SINGULAR: &'static str = "library";

    fn id(&self) -> LibraryId {
        self.id
    }

    fn item_path(&self) -> String {
        format!("{}/{}", endpoints::LIBRARIES, self.id)
    }

    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.name.as_str()),
            Cow::Borrowed(self.description.as_deref().unwrap_or_default()),
        ]
    }

    fn compare(a: &Self, b: &Self, criterion: ShelfSort) -> Ordering {
        compare_shelves(a, b, criterion)
    }
}

impl Shelf for Library {
    const BASE: &'static str = endpoints::LIBRARIES;
    const LABEL: &'static str = "书架";

    fn user_path(user_id: UserId) -> String {
        endpoints::user_libraries(user_id)
    }

    fn owner_id(&self) -> UserId {
        self.user_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn book_count(&self) -> Option<u32> {
        self.book_count
    }

    fn set_book_count(&mut self, count: u32) {
        self.book_count = Some(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Operation;
    use crate::error::ApiErrorKind;
    use crate::request::{HttpMethod, MockHttpClient};
    use crate::test_support::{Harness, profile, url};
    use blablabook_shared::protocol::CreateShelfRequest;
    use serde_json::json;
    use std::rc::Rc;

    fn libraries() -> serde_json::Value {
        json!({"libraries": [
            {"id": 1, "user_id": 7, "name": "Salon", "book_count": 2},
            {"id": 2, "user_id": 7, "name": "à lire", "description": "Été 2024", "book_count": 0}
        ]})
    }

    fn setup() -> (Harness, LibrariesHook<MockHttpClient>) {
        let h = Harness::signed_in(profile(7, &["USER"]));
        h.mock(HttpMethod::Get, "/libraries", 200, libraries());
        let hook = LibrariesHook::new(Rc::clone(&h.gateway));
        (h, hook)
    }

    #[tokio::test]
    async fn test_fetch_mine_requires_session() {
        let h = Harness::new();
        let hook: LibrariesHook<MockHttpClient> = LibrariesHook::new(Rc::clone(&h.gateway));

        let err = hook.fetch_mine().await.unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::LocalPrecondition);
        assert_eq!(h.client().total(), 0);
    }

    #[tokio::test]
    async fn test_search_and_sort_by_name() {
        let (_h, hook) = setup();
        hook.fetch_mine().await.unwrap();

        hook.search("été");
        assert_eq!(hook.projected().len(), 1);

        hook.search("");
        hook.sort(ShelfSort::NameAsc);
        let names: Vec<String> = hook.projected().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["à lire", "Salon"]);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let (h, hook) = setup();

        let err = hook
            .create_shelf(&CreateShelfRequest {
                name: "  ".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.message(), "书架名称不能为空");
        assert_eq!(h.client().total(), 0);
    }

    #[tokio::test]
    async fn test_create_and_rename() {
        let (h, hook) = setup();
        hook.fetch_mine().await.unwrap();
        h.mock(
            HttpMethod::Post,
            "/libraries",
            201,
            json!({"library": {"id": 3, "user_id": 7, "name": "Polars"}}),
        );
        h.mock(HttpMethod::Patch, "/libraries/3", 200, json!({"message": "ok"}));

        let created = hook
            .create_shelf(&CreateShelfRequest {
                name: "Polars".to_string(),
                description: None,
                is_public: true,
            })
            .await
            .unwrap();
        assert_eq!(created.id, 3);
        let sent = h.client().last(HttpMethod::Post, &url("/libraries")).unwrap();
        assert_eq!(sent.json_body(), json!({"name": "Polars", "is_public": true}));

        let renamed = hook.rename(3, " Romans noirs ").await.unwrap();
        assert_eq!(renamed.name, "Romans noirs");
        assert_eq!(renamed.user_id, 7);
        assert_eq!(hook.len(), 3);
    }

    #[tokio::test]
    async fn test_membership_add_and_remove_keep_count_in_sync() {
        let (h, hook) = setup();
        hook.fetch_mine().await.unwrap();
        h.mock(
            HttpMethod::Get,
            "/libraries/1/books",
            200,
            json!({"books": [
                {"id": 10, "title": "Dune"},
                {"library_id": 1, "book_id": 11, "added_at": "2024-05-01T10:00:00Z"}
            ]}),
        );
        h.mock(HttpMethod::Post, "/libraries/1/books", 201, serde_json::Value::Null);
        h.mock(HttpMethod::Delete, "/libraries/1/books/10", 204, serde_json::Value::Null);

        let members = hook.fetch_members(1).await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].id(), "1:10");
        assert!(hook.contains_book(1, 11));

        let added = hook.add_book(1, 12).await.unwrap();
        assert_eq!(added.id(), "1:12");
        assert!(added.added_at.is_some());
        assert_eq!(hook.get(&1).unwrap().book_count, Some(3));
        let sent = h.client().last(HttpMethod::Post, &url("/libraries/1/books")).unwrap();
        assert_eq!(sent.json_body(), json!({"book_id": 12}));

        hook.remove_book(1, 10).await.unwrap();
        assert!(!hook.contains_book(1, 10));
        assert_eq!(hook.get(&1).unwrap().book_count, Some(2));
    }

    #[tokio::test]
    async fn test_duplicate_membership_is_rejected_locally() {
        let (h, hook) = setup();
        hook.fetch_mine().await.unwrap();
        h.mock(HttpMethod::Get, "/libraries/1/books", 200, json!([{"id": 10, "title": "Dune"}]));
        hook.fetch_members(1).await.unwrap();
        let before = h.client().total();

        let err = hook.add_book(1, 10).await.unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::LocalPrecondition);
        assert_eq!(h.client().total(), before);
        assert!(hook.error(Operation::AddMember).is_some());
    }

    #[tokio::test]
    async fn test_unloaded_members_adjust_count_by_delta() {
        let (h, hook) = setup();
        hook.fetch_mine().await.unwrap();
        h.mock(HttpMethod::Post, "/libraries/2/books", 201, json!({"message": "ajouté"}));

        hook.add_book(2, 5).await.unwrap();

        assert_eq!(hook.get(&2).unwrap().book_count, Some(1));
        assert!(!hook.members_loaded(2));
    }

    #[tokio::test]
    async fn test_malformed_membership_response_is_a_decode_error() {
        let (h, hook) = setup();
        hook.fetch_mine().await.unwrap();
        h.mock(HttpMethod::Get, "/libraries/1/books", 200, json!([]));
        hook.fetch_members(1).await.unwrap();
        h.mock(
            HttpMethod::Post,
            "/libraries/1/books",
            201,
            json!({"membership": {"library_id": 1, "book_id": "douze"}}),
        );

        let err = hook.add_book(1, 12).await.unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::Decode);
        assert!(hook.error(Operation::AddMember).is_some());
        assert!(!hook.contains_book(1, 12));
        assert_eq!(hook.get(&1).unwrap().book_count, Some(0));
    }

    #[tokio::test]
    async fn test_delete_shelf_forgets_members() {
        let (h, hook) = setup();
        hook.fetch_mine().await.unwrap();
        h.mock(HttpMethod::Get, "/libraries/1/books", 200, json!([]));
        h.mock(HttpMethod::Delete, "/libraries/1", 204, serde_json::Value::Null);
        hook.fetch_members(1).await.unwrap();

        hook.delete_shelf(1).await.unwrap();

        assert!(hook.get(&1).is_none());
        assert!(!hook.members_loaded(1));
    }
}
