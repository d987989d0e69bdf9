//! 评分 hook
//!
//! 每个 (用户, 书目) 至多一条评分，重复提交覆盖原值。
//! 平均分与总数以后端给出的聚合为准，只有后端未提供时才由已加载的评分计算。

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::ops::Deref;
use std::rc::Rc;

use blablabook_shared::protocol::{HttpMethod, UpsertRatingRequest, endpoints};
use blablabook_shared::{BookId, Rating, RatingId};
use serde::Deserialize;
use serde_json::Value;

use crate::api::{ApiGateway, CollectionPayload, decode_entity_value};
use crate::collection::{Collection, Entity, Operation, compare_missing_low, directed};
use crate::error::{ApiError, ApiResult};
use crate::request::HttpClient;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingSort {
    ValueDesc,
    ValueAsc,
    Recent,
}

impl Entity for Rating {
    type Id = RatingId;
    type Sort = RatingSort;
    const COLLECTION: &'static str = "ratings";
    const SINGULAR: &'static str = "rating";

    fn id(&self) -> RatingId {
        self.id
    }

    /// 评分按书目寻址，删除的是当前用户对该书的评分
    fn item_path(&self) -> String {
        endpoints::book_ratings(self.book_id)
    }

    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![Cow::Borrowed(self.username.as_deref().unwrap_or_default())]
    }

    fn compare(a: &Self, b: &Self, criterion: RatingSort) -> Ordering {
        match criterion {
            RatingSort::ValueDesc => a.rating.cmp(&b.rating).reverse(),
            RatingSort::ValueAsc => a.rating.cmp(&b.rating),
            RatingSort::Recent => directed(compare_missing_low(a.updated_at, b.updated_at), true),
        }
    }
}

/// 后端提供的聚合值
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct RatingAggregate {
    #[serde(default, alias = "averageRating")]
    pub average_rating: Option<f64>,
    #[serde(default, alias = "totalRatings")]
    pub total_ratings: Option<u32>,
}

impl RatingAggregate {
    fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value::<Self>(value.clone())
            .ok()
            .filter(|a| a.average_rating.is_some() || a.total_ratings.is_some())
    }
}

/// 评分列表响应：集合加可选的聚合
fn decode_ratings(body: &str) -> ApiResult<(Vec<Rating>, Option<RatingAggregate>)> {
    let value: Value = serde_json::from_str(body)?;
    let aggregate = RatingAggregate::from_value(&value);
    let items = CollectionPayload::classify(value, Rating::COLLECTION)?.into_items()?;
    Ok((items, aggregate))
}

/// 单条评分响应：`{"rating": {..}, "average_rating": ..}` 或评分本身
fn decode_upsert(body: &str) -> ApiResult<(Rating, Option<RatingAggregate>)> {
    let value: Value = serde_json::from_str(body)?;
    let aggregate = RatingAggregate::from_value(&value);
    let rating = decode_entity_value::<Rating>(value, &[Rating::SINGULAR])?;
    Ok((rating, aggregate))
}

pub struct RatingsHook<C: HttpClient> {
    ratings: Collection<Rating, C>,
    aggregate: Rc<Cell<Option<RatingAggregate>>>,
    book: Rc<RefCell<Option<BookId>>>,
}

impl<C: HttpClient> Clone for RatingsHook<C> {
    fn clone(&self) -> Self {
        Self {
            ratings: self.ratings.clone(),
            aggregate: Rc::clone(&self.aggregate),
            book: Rc::clone(&self.book),
        }
    }
}

impl<C: HttpClient> Deref for RatingsHook<C> {
    type Target = Collection<Rating, C>;

    fn deref(&self) -> &Self::Target {
        &self.ratings
    }
}

impl<C: HttpClient + 'static> RatingsHook<C> {
    pub fn new(gateway: Rc<ApiGateway<C>>) -> Self {
        Self {
            ratings: Collection::new(gateway),
            aggregate: Rc::new(Cell::new(None)),
            book: Rc::new(RefCell::new(None)),
        }
    }

    pub async fn fetch_for_book(&self, book_id: BookId) -> ApiResult<()> {
        let path = endpoints::book_ratings(book_id);
        let gateway = self.gateway();
        let applied = self
            .load_with(async {
                let response = gateway.request(HttpMethod::Get, &path, None, &[]).await?;
                decode_ratings(&response.body).map_err(|e| e.in_op_with("ratings.fetch", &path))
            })
            .await?;
        if let Some(aggregate) = applied {
            self.aggregate.set(aggregate);
            *self.book.borrow_mut() = Some(book_id);
            self.notify();
        }
        Ok(())
    }

    pub fn book_id(&self) -> Option<BookId> {
        *self.book.borrow()
    }

    pub fn aggregate(&self) -> Option<RatingAggregate> {
        self.aggregate.get()
    }

    /// 当前用户在已加载集合中的评分
    pub fn user_rating(&self) -> Option<Rating> {
        let user_id = self.session().user_id()?;
        let book_id = self.book_id();
        self.find(|r| r.user_id == user_id && book_id.is_none_or(|b| r.book_id == b))
    }

    pub fn average_rating(&self) -> Option<f64> {
        if let Some(average) = self.aggregate().and_then(|a| a.average_rating) {
            return Some(average);
        }
        let ratings = self.canonical();
        if ratings.is_empty() {
            return None;
        }
        let sum: u32 = ratings.iter().map(|r| u32::from(r.rating)).sum();
        Some(f64::from(sum) / ratings.len() as f64)
    }

    pub fn total_ratings(&self) -> u32 {
        self.aggregate()
            .and_then(|a| a.total_ratings)
            .unwrap_or(self.len() as u32)
    }

    /// 提交评分（插入或覆盖）
    ///
    /// 越界的值在本地拒绝，不发请求。
    pub async fn submit_rating(&self, book_id: BookId, value: u8) -> ApiResult<Rating> {
        let user = self.authorize(Operation::Submit)?;
        if !(MIN_RATING..=MAX_RATING).contains(&value) {
            return Err(self.reject(
                Operation::Submit,
                ApiError::local_precondition(format!(
                    "评分必须在 {} 到 {} 之间",
                    MIN_RATING, MAX_RATING
                )),
            ));
        }

        let path = endpoints::book_ratings(book_id);
        let request = UpsertRatingRequest {
            book_id,
            rating: value,
        };
        let (rating, aggregate) = self
            .run(Operation::Submit, async {
                let response = self.gateway().send_json(HttpMethod::Put, &path, &request).await?;
                decode_upsert(&response.body)
            })
            .await?;

        self.apply(|state| {
            // 同一 (用户, 书目) 只保留一条
            let stale: Vec<RatingId> = state
                .items()
                .iter()
                .filter(|r| r.user_id == user.id && r.book_id == book_id && r.id != rating.id)
                .map(|r| r.id)
                .collect();
            for id in stale {
                state.remove(&id);
            }
            state.upsert(rating.clone());
        });
        self.refresh_aggregate(aggregate);
        Ok(rating)
    }

    pub async fn delete_my_rating(&self, book_id: BookId) -> ApiResult<()> {
        let user = self.authorize(Operation::Delete)?;
        let path = endpoints::book_ratings(book_id);
        let response = self
            .run(
                Operation::Delete,
                self.gateway().request(HttpMethod::Delete, &path, None, &[]),
            )
            .await?;

        let aggregate = serde_json::from_str::<Value>(&response.body)
            .ok()
            .and_then(|v| RatingAggregate::from_value(&v));
        self.apply(|state| {
            let mine: Vec<RatingId> = state
                .items()
                .iter()
                .filter(|r| r.user_id == user.id && r.book_id == book_id)
                .map(|r| r.id)
                .collect();
            for id in mine {
                state.remove(&id);
            }
        });
        self.refresh_aggregate(aggregate);
        Ok(())
    }

    /// 按 id 删除评分
    ///
    /// 后端只提供"删除我对该书的评分"，所以只接受当前用户自己的评分。
    pub async fn delete(&self, id: &RatingId) -> ApiResult<()> {
        let user = self.authorize(Operation::Delete)?;
        let Some(rating) = self.get(id) else {
            return Err(self.reject(
                Operation::Delete,
                ApiError::local_precondition(format!("评分 {} 尚未加载", id)),
            ));
        };
        if rating.user_id != user.id {
            return Err(self.reject(
                Operation::Delete,
                ApiError::local_precondition("只能删除自己的评分"),
            ));
        }
        self.delete_my_rating(rating.book_id).await
    }

    /// 评分没有局部更新端点，修改请重新提交
    pub async fn update(&self, id: &RatingId, _patch: Value) -> ApiResult<Rating> {
        Err(self.reject(
            Operation::Update,
            ApiError::local_precondition(format!("评分 {} 不支持局部更新，请重新提交", id)),
        ))
    }

    /// 变更后：有新的聚合就采用，否则丢弃旧聚合改由已加载集合计算
    fn refresh_aggregate(&self, aggregate: Option<RatingAggregate>) {
        if self.is_active() {
            self.aggregate.set(aggregate);
            self.notify();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorKind;
    use crate::request::MockHttpClient;
    use crate::test_support::{Harness, profile, url};
    use serde_json::json;

    fn hook(h: &Harness) -> RatingsHook<MockHttpClient> {
        RatingsHook::new(Rc::clone(&h.gateway))
    }

    #[tokio::test]
    async fn test_out_of_range_value_is_rejected_locally() {
        let h = Harness::signed_in(profile(1, &["USER"]));
        let ratings = hook(&h);

        for value in [0, 6] {
            let err = ratings.submit_rating(3, value).await.unwrap_err();
            assert_eq!(err.kind(), ApiErrorKind::LocalPrecondition);
        }

        assert_eq!(h.client().total(), 0);
        assert_eq!(
            ratings.error(Operation::Submit).as_deref(),
            Some("评分必须在 1 到 5 之间")
        );
    }

    #[tokio::test]
    async fn test_backend_aggregate_is_not_recomputed() {
        let h = Harness::new();
        h.mock(
            HttpMethod::Get,
            "/books/3/ratings",
            200,
            json!({
                "ratings": [
                    {"id": 1, "user_id": 1, "book_id": 3, "rating": 5},
                    {"id": 2, "user_id": 2, "book_id": 3, "rating": 1}
                ],
                "average_rating": 4.1,
                "total_ratings": 57
            }),
        );
        let ratings = hook(&h);

        ratings.fetch_for_book(3).await.unwrap();

        assert_eq!(ratings.average_rating(), Some(4.1));
        assert_eq!(ratings.total_ratings(), 57);
    }

    #[tokio::test]
    async fn test_missing_aggregate_falls_back_to_loaded_set() {
        let h = Harness::new();
        h.mock(
            HttpMethod::Get,
            "/books/3/ratings",
            200,
            json!([
                {"id": 1, "user_id": 1, "book_id": 3, "rating": 5},
                {"id": 2, "user_id": 2, "book_id": 3, "value": 2}
            ]),
        );
        let ratings = hook(&h);

        ratings.fetch_for_book(3).await.unwrap();

        assert_eq!(ratings.average_rating(), Some(3.5));
        assert_eq!(ratings.total_ratings(), 2);
    }

    #[tokio::test]
    async fn test_first_rating_then_refetch_shows_single_row() {
        let h = Harness::signed_in(profile(4, &["USER"]));
        h.mock(HttpMethod::Get, "/books/8/ratings", 200, json!({"ratings": []}));
        h.mock(
            HttpMethod::Get,
            "/books/8/ratings",
            200,
            json!({"ratings": [{"id": 31, "user_id": 4, "book_id": 8, "rating": 4}]}),
        );
        h.mock(
            HttpMethod::Put,
            "/books/8/ratings",
            200,
            json!({"rating": {"id": 31, "user_id": 4, "book_id": 8, "rating": 4}}),
        );
        let ratings = hook(&h);
        ratings.fetch_for_book(8).await.unwrap();
        assert!(ratings.user_rating().is_none());

        let rating = ratings.submit_rating(8, 4).await.unwrap();
        assert_eq!(rating.rating, 4);
        let sent = h.client().last(HttpMethod::Put, &url("/books/8/ratings")).unwrap();
        assert_eq!(sent.json_body(), json!({"rating": 4}));
        assert_eq!(ratings.len(), 1);

        ratings.fetch_for_book(8).await.unwrap();

        let mine: Vec<Rating> = ratings
            .canonical()
            .into_iter()
            .filter(|r| r.user_id == 4 && r.book_id == 8)
            .collect();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].rating, 4);
        assert_eq!(ratings.user_rating().map(|r| r.rating), Some(4));
    }

    #[tokio::test]
    async fn test_resubmission_overwrites_and_uses_response_aggregate() {
        let h = Harness::signed_in(profile(4, &["USER"]));
        h.mock(
            HttpMethod::Get,
            "/books/8/ratings",
            200,
            json!({
                "ratings": [
                    {"id": 30, "user_id": 4, "book_id": 8, "rating": 2},
                    {"id": 12, "user_id": 9, "book_id": 8, "rating": 4}
                ],
                "average_rating": 3.0,
                "total_ratings": 2
            }),
        );
        h.mock(
            HttpMethod::Put,
            "/books/8/ratings",
            200,
            json!({
                "rating": {"id": 33, "user_id": 4, "book_id": 8, "rating": 5},
                "average_rating": 4.5,
                "total_ratings": 2
            }),
        );
        let ratings = hook(&h);
        ratings.fetch_for_book(8).await.unwrap();

        ratings.submit_rating(8, 5).await.unwrap();

        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings.user_rating().map(|r| r.id), Some(33));
        assert_eq!(ratings.average_rating(), Some(4.5));
    }

    #[tokio::test]
    async fn test_delete_my_rating_recomputes_without_aggregate() {
        let h = Harness::signed_in(profile(4, &["USER"]));
        h.mock(
            HttpMethod::Get,
            "/books/8/ratings",
            200,
            json!({
                "ratings": [
                    {"id": 30, "user_id": 4, "book_id": 8, "rating": 2},
                    {"id": 12, "user_id": 9, "book_id": 8, "rating": 4}
                ],
                "average_rating": 3.0
            }),
        );
        h.mock(HttpMethod::Delete, "/books/8/ratings", 204, serde_json::Value::Null);
        let ratings = hook(&h);
        ratings.fetch_for_book(8).await.unwrap();

        ratings.delete_my_rating(8).await.unwrap();

        assert!(ratings.user_rating().is_none());
        assert_eq!(ratings.average_rating(), Some(4.0));
        assert_eq!(ratings.total_ratings(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_id_only_targets_own_rating() {
        let h = Harness::signed_in(profile(1, &["ADMIN"]));
        h.mock(
            HttpMethod::Get,
            "/books/8/ratings",
            200,
            json!({
                "ratings": [
                    {"id": 30, "user_id": 1, "book_id": 8, "rating": 2},
                    {"id": 12, "user_id": 9, "book_id": 8, "rating": 4}
                ]
            }),
        );
        h.mock(HttpMethod::Delete, "/books/8/ratings", 204, serde_json::Value::Null);
        let ratings = hook(&h);
        ratings.fetch_for_book(8).await.unwrap();

        let err = ratings.delete(&12).await.unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::LocalPrecondition);
        assert_eq!(h.count(HttpMethod::Delete, "/books/8/ratings"), 0);
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings.error(Operation::Delete).as_deref(), Some("只能删除自己的评分"));

        ratings.delete(&30).await.unwrap();

        assert_eq!(h.count(HttpMethod::Delete, "/books/8/ratings"), 1);
        let left: Vec<RatingId> = ratings.canonical().iter().map(|r| r.id).collect();
        assert_eq!(left, vec![12]);
        assert!(ratings.user_rating().is_none());
    }

    #[tokio::test]
    async fn test_partial_update_is_refused() {
        let h = Harness::signed_in(profile(1, &["USER"]));
        h.mock(
            HttpMethod::Get,
            "/books/8/ratings",
            200,
            json!([{"id": 30, "user_id": 1, "book_id": 8, "rating": 2}]),
        );
        let ratings = hook(&h);
        ratings.fetch_for_book(8).await.unwrap();
        let before = h.client().total();

        let err = ratings.update(&30, json!({"rating": 5})).await.unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::LocalPrecondition);
        assert_eq!(h.client().total(), before);
        assert_eq!(ratings.user_rating().map(|r| r.rating), Some(2));
    }

    #[tokio::test]
    async fn test_sort_by_value() {
        let h = Harness::new();
        h.mock(
            HttpMethod::Get,
            "/books/1/ratings",
            200,
            json!([
                {"id": 1, "user_id": 1, "book_id": 1, "rating": 3},
                {"id": 2, "user_id": 2, "book_id": 1, "rating": 5},
                {"id": 3, "user_id": 3, "book_id": 1, "rating": 1}
            ]),
        );
        let ratings = hook(&h);
        ratings.fetch_for_book(1).await.unwrap();

        ratings.sort(RatingSort::ValueDesc);

        let values: Vec<u8> = ratings.projected().iter().map(|r| r.rating).collect();
        assert_eq!(values, vec![5, 3, 1]);
    }
}
