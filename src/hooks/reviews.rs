//! 书评 hook
//!
//! 同一用户对同一本书能否写多篇书评由后端决定，本地不做唯一性约束；
//! [`ReviewsHook::my_review`] 只是从已加载集合中挑出当前用户的第一篇。

use std::borrow::Cow;
use std::cmp::Ordering;
use std::ops::Deref;
use std::rc::Rc;

use blablabook_shared::protocol::{CreateReviewRequest, endpoints};
use blablabook_shared::{BookId, Review, ReviewId, UserId};
use futures::future::join_all;
use serde_json::Value;

use crate::api::ApiGateway;
use crate::collection::{Collection, Entity, Operation, Scope, collate, compare_missing_low, directed};
use crate::error::{ApiError, ApiResult};
use crate::request::HttpClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewSort {
    Recent,
    Oldest,
    BookTitleAsc,
    AuthorAsc,
}

impl Entity for Review {
    type Id = ReviewId;
    type Sort = ReviewSort;
    const COLLECTION: &'static str = "reviews";
    const SINGULAR: &'static str = "review";

    fn id(&self) -> ReviewId {
        self.id
    }

    fn item_path(&self) -> String {
        endpoints::review(self.id)
    }

    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.title.as_deref().unwrap_or_default()),
            Cow::Borrowed(self.content.as_str()),
            Cow::Borrowed(self.username.as_deref().unwrap_or_default()),
            Cow::Borrowed(self.book_title.as_deref().unwrap_or_default()),
        ]
    }

    fn compare(a: &Self, b: &Self, criterion: ReviewSort) -> Ordering {
        match criterion {
            ReviewSort::Recent => directed(compare_missing_low(a.created_at, b.created_at), true),
            ReviewSort::Oldest => compare_missing_low(a.created_at, b.created_at),
            ReviewSort::BookTitleAsc => collate(
                a.book_title.as_deref().unwrap_or_default(),
                b.book_title.as_deref().unwrap_or_default(),
            ),
            ReviewSort::AuthorAsc => collate(
                a.username.as_deref().unwrap_or_default(),
                b.username.as_deref().unwrap_or_default(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewScope {
    Book(BookId),
    User(UserId),
    /// 管理后台：全部书评
    All,
}

impl Scope for ReviewScope {
    fn path(&self) -> String {
        match self {
            ReviewScope::Book(id) => endpoints::book_reviews(*id),
            ReviewScope::User(id) => endpoints::user_reviews(*id),
            ReviewScope::All => endpoints::ADMIN_REVIEWS.to_string(),
        }
    }
}

/// 批量删除的结果，各条目互不影响，失败的不会回滚成功的
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub deleted: Vec<ReviewId>,
    pub failed: Vec<(ReviewId, ApiError)>,
}

impl BulkOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ReviewsHook<C: HttpClient> {
    reviews: Collection<Review, C>,
}

impl<C: HttpClient> Clone for ReviewsHook<C> {
    fn clone(&self) -> Self {
        Self {
            reviews: self.reviews.clone(),
        }
    }
}

impl<C: HttpClient> Deref for ReviewsHook<C> {
    type Target = Collection<Review, C>;

    fn deref(&self) -> &Self::Target {
        &self.reviews
    }
}

impl<C: HttpClient + 'static> ReviewsHook<C> {
    pub fn new(gateway: Rc<ApiGateway<C>>) -> Self {
        Self {
            reviews: Collection::new(gateway),
        }
    }

    pub async fn fetch_for_book(&self, book_id: BookId) -> ApiResult<()> {
        self.fetch_all(&ReviewScope::Book(book_id)).await
    }

    pub async fn fetch_for_user(&self, user_id: UserId) -> ApiResult<()> {
        self.fetch_all(&ReviewScope::User(user_id)).await
    }

    /// 管理后台列表，非管理员在本地被拒绝
    pub async fn fetch_moderation_queue(&self) -> ApiResult<()> {
        self.session()
            .require_admin()
            .map_err(|e| self.reject(Operation::Fetch, e))?;
        self.fetch_all(&ReviewScope::All).await
    }

    pub async fn create_review(&self, req: &CreateReviewRequest) -> ApiResult<Review> {
        if req.content.trim().is_empty() {
            return Err(self.reject(Operation::Create, ApiError::local_precondition("书评内容不能为空")));
        }
        self.create(&endpoints::book_reviews(req.book_id), req).await
    }

    pub async fn update_review(&self, id: ReviewId, patch: Value) -> ApiResult<Review> {
        let blank_content = patch
            .get("content")
            .and_then(Value::as_str)
            .is_some_and(|c| c.trim().is_empty());
        if blank_content {
            return Err(self.reject(Operation::Update, ApiError::local_precondition("书评内容不能为空")));
        }
        self.update(&id, patch).await
    }

    pub async fn delete_review(&self, id: ReviewId) -> ApiResult<()> {
        self.delete(&id).await
    }

    /// 并发删除多篇书评
    ///
    /// 每条删除独立成败；若有失败，操作错误记录为第一条失败的原因。
    pub async fn delete_reviews(&self, ids: &[ReviewId]) -> BulkOutcome {
        let results = join_all(ids.iter().map(|id| async move { (*id, self.delete(id).await) })).await;

        let mut outcome = BulkOutcome::default();
        for (id, result) in results {
            match result {
                Ok(()) => outcome.deleted.push(id),
                Err(e) => outcome.failed.push((id, e)),
            }
        }
        if let Some((_, first)) = outcome.failed.first() {
            tracing::warn!(
                deleted = outcome.deleted.len(),
                failed = outcome.failed.len(),
                "批量删除书评部分失败"
            );
            self.reject(Operation::Delete, first.clone());
        }
        outcome
    }

    /// 当前用户对该书的第一篇书评
    pub fn my_review(&self, book_id: BookId) -> Option<Review> {
        let user_id = self.session().user_id()?;
        self.find(|r| r.user_id == user_id && r.book_id == book_id)
    }

    /// 作者本人或管理员可编辑、删除
    pub fn can_moderate(&self, review: &Review) -> bool {
        let session = self.session();
        session.is_admin() || session.user_id() == Some(review.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorKind;
    use crate::request::{HttpMethod, MockHttpClient};
    use crate::test_support::{Harness, profile, url};
    use serde_json::json;

    fn reviews() -> Value {
        json!({"reviews": [
            {"id": 1, "user_id": 2, "book_id": 10, "content": "Un classique", "username": "zoé",
             "book_title": "Dune", "created_at": "2024-01-05T10:00:00Z"},
            {"id": 2, "user_id": 5, "book_id": 10, "title": "Trop long", "content": "Lent au début",
             "username": "Émile", "book_title": "Dune", "created_at": "2024-03-01T10:00:00Z"},
            {"id": 3, "user_id": 2, "book_id": 10, "content": "Relu, toujours bien", "username": "zoé",
             "book_title": "Dune"}
        ]})
    }

    fn hook(h: &Harness) -> ReviewsHook<MockHttpClient> {
        ReviewsHook::new(Rc::clone(&h.gateway))
    }

    #[tokio::test]
    async fn test_my_review_is_first_authored_by_session_user() {
        let h = Harness::signed_in(profile(2, &["USER"]));
        h.mock(HttpMethod::Get, "/books/10/reviews", 200, reviews());
        let reviews = hook(&h);

        reviews.fetch_for_book(10).await.unwrap();

        assert_eq!(reviews.len(), 3);
        assert_eq!(reviews.my_review(10).map(|r| r.id), Some(1));
        assert!(reviews.my_review(11).is_none());
    }

    #[tokio::test]
    async fn test_sort_recent_puts_undated_last() {
        let h = Harness::new();
        h.mock(HttpMethod::Get, "/books/10/reviews", 200, reviews());
        let reviews = hook(&h);
        reviews.fetch_for_book(10).await.unwrap();

        reviews.sort(ReviewSort::Recent);
        let order: Vec<ReviewId> = reviews.projected().iter().map(|r| r.id).collect();
        assert_eq!(order, vec![2, 1, 3]);

        reviews.sort(ReviewSort::AuthorAsc);
        let order: Vec<ReviewId> = reviews.projected().iter().map(|r| r.id).collect();
        assert_eq!(order, vec![2, 1, 3]);

        reviews.search("lent");
        let order: Vec<ReviewId> = reviews.projected().iter().map(|r| r.id).collect();
        assert_eq!(order, vec![2]);
    }

    #[tokio::test]
    async fn test_moderation_queue_requires_admin() {
        let h = Harness::signed_in(profile(2, &["USER"]));
        let reviews = hook(&h);

        let err = reviews.fetch_moderation_queue().await.unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::LocalPrecondition);
        assert_eq!(h.client().total(), 0);
        assert_eq!(reviews.error(Operation::Fetch).as_deref(), Some("需要管理员权限"));
    }

    #[tokio::test]
    async fn test_admin_lists_all_reviews() {
        let h = Harness::signed_in(profile(1, &["ADMIN"]));
        h.mock(HttpMethod::Get, "/admin/reviews", 200, reviews());
        let reviews = hook(&h);

        reviews.fetch_moderation_queue().await.unwrap();

        assert_eq!(reviews.len(), 3);
        assert!(reviews.can_moderate(&reviews.get(&2).unwrap()));
    }

    #[tokio::test]
    async fn test_create_review_posts_to_book() {
        let h = Harness::signed_in(profile(2, &["USER"]));
        h.mock(
            HttpMethod::Post,
            "/books/10/reviews",
            201,
            json!({"review": {"id": 9, "user_id": 2, "book_id": 10, "content": "Magistral"}}),
        );
        let reviews = hook(&h);

        let created = reviews
            .create_review(&CreateReviewRequest {
                book_id: 10,
                content: "Magistral".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(created.id, 9);
        let sent = h.client().last(HttpMethod::Post, &url("/books/10/reviews")).unwrap();
        assert_eq!(sent.json_body(), json!({"content": "Magistral", "is_spoiler": false}));
        assert_eq!(reviews.my_review(10).map(|r| r.id), Some(9));
    }

    #[tokio::test]
    async fn test_blank_content_is_rejected_locally() {
        let h = Harness::signed_in(profile(2, &["USER"]));
        let reviews = hook(&h);

        let err = reviews
            .create_review(&CreateReviewRequest {
                book_id: 10,
                content: "   ".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::LocalPrecondition);

        let err = reviews.update_review(1, json!({"content": ""})).await.unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::LocalPrecondition);
        assert_eq!(h.client().total(), 0);
    }

    #[tokio::test]
    async fn test_update_review_merges_patch() {
        let h = Harness::signed_in(profile(2, &["USER"]));
        h.mock(HttpMethod::Get, "/books/10/reviews", 200, reviews());
        h.mock(HttpMethod::Patch, "/reviews/1", 200, json!({"message": "Avis mis à jour"}));
        let reviews = hook(&h);
        reviews.fetch_for_book(10).await.unwrap();

        let updated = reviews
            .update_review(1, json!({"content": "Un chef-d'œuvre", "is_spoiler": true}))
            .await
            .unwrap();

        assert_eq!(updated.content, "Un chef-d'œuvre");
        assert!(updated.is_spoiler);
        assert_eq!(updated.book_title.as_deref(), Some("Dune"));
    }

    #[tokio::test]
    async fn test_bulk_delete_reports_each_outcome() {
        let h = Harness::signed_in(profile(1, &["ADMIN"]));
        h.mock(HttpMethod::Get, "/admin/reviews", 200, reviews());
        h.mock(HttpMethod::Delete, "/reviews/1", 204, Value::Null);
        h.mock(HttpMethod::Delete, "/reviews/2", 500, json!({"error": "Erreur interne"}));
        h.mock(HttpMethod::Delete, "/reviews/3", 204, Value::Null);
        let reviews = hook(&h);
        reviews.fetch_moderation_queue().await.unwrap();

        let outcome = reviews.delete_reviews(&[1, 2, 3]).await;

        assert!(!outcome.is_complete());
        assert_eq!(outcome.deleted, vec![1, 3]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, 2);
        assert_eq!(outcome.failed[0].1.kind(), ApiErrorKind::Server);

        let remaining: Vec<ReviewId> = reviews.canonical().iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec![2]);
        assert_eq!(reviews.error(Operation::Delete).as_deref(), Some("Erreur interne"));
        assert!(!reviews.is_pending(Operation::Delete));
        assert_eq!(h.count(HttpMethod::Get, "/csrf-token"), 1);
    }
}
