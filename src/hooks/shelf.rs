//! 书架与阅读清单共用的 hook
//!
//! 两者结构相同：属于某个用户的命名集合，通过显式的添加/移除维护书籍归属。

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Deref;
use std::rc::Rc;

use blablabook_shared::protocol::{
    AddBookRequest, CreateShelfRequest, HttpMethod, shelf_member_path, shelf_members_path,
};
use blablabook_shared::{Book, BookId, Membership, UserId};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::{ApiGateway, decode_entity_value};
use crate::collection::{
    Collection, Endpoint, Entity, Operation, collate, compare_missing_low, directed,
};
use crate::error::{ApiError, ApiResult};
use crate::request::HttpClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelfSort {
    NameAsc,
    NameDesc,
    Recent,
    BookCountDesc,
}

/// 书架类实体
pub trait Shelf: Entity<Id = i64, Sort = ShelfSort> {
    /// 资源根路径，如 `/libraries`
    const BASE: &'static str;
    /// 面向用户的名称
    const LABEL: &'static str;

    fn user_path(user_id: UserId) -> String;
    fn owner_id(&self) -> UserId;
    fn name(&self) -> &str;
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn book_count(&self) -> Option<u32>;
    fn set_book_count(&mut self, count: u32);
}

/// 书架排序的公共实现
pub(crate) fn compare_shelves<S: Shelf>(a: &S, b: &S, criterion: ShelfSort) -> Ordering {
    match criterion {
        ShelfSort::NameAsc => collate(a.name(), b.name()),
        ShelfSort::NameDesc => collate(a.name(), b.name()).reverse(),
        ShelfSort::Recent => directed(compare_missing_low(a.created_at(), b.created_at()), true),
        ShelfSort::BookCountDesc => directed(compare_missing_low(a.book_count(), b.book_count()), true),
    }
}

/// 解析添加书籍的响应
///
/// 空响应体或不含归属记录的信封（如 `{"message": ..}`）由请求内容补全；
/// 带有归属记录却无法解析的响应是解码错误。
fn returned_membership(body: &str, shelf_id: i64, book_id: BookId) -> ApiResult<Membership> {
    let synthesized = || Membership {
        collection_id: shelf_id,
        book_id,
        added_at: Some(Utc::now()),
        book: None,
    };
    if body.trim().is_empty() {
        return Ok(synthesized());
    }
    let value: Value = serde_json::from_str(body)?;
    let Value::Object(map) = &value else {
        return Err(ApiError::decode("添加响应不是对象"));
    };
    if !map.contains_key("membership") && !map.contains_key("book_id") {
        return Ok(synthesized());
    }
    decode_entity_value(value, &["membership"])
}

/// 成员端点可能返回归属记录，也可能直接返回书目
#[derive(Deserialize)]
#[serde(untagged)]
enum MemberPayload {
    Membership(Membership),
    Book(Book),
}

impl MemberPayload {
    fn into_membership(self, shelf_id: i64) -> Membership {
        match self {
            MemberPayload::Membership(m) => m,
            MemberPayload::Book(book) => Membership {
                collection_id: shelf_id,
                book_id: book.id,
                added_at: None,
                book: Some(book),
            },
        }
    }
}

pub struct ShelfHook<S: Shelf, C: HttpClient> {
    shelves: Collection<S, C>,
    /// 已加载的书籍归属，按书架 id 索引
    members: Rc<RefCell<HashMap<i64, Vec<Membership>>>>,
}

impl<S: Shelf, C: HttpClient> Clone for ShelfHook<S, C> {
    fn clone(&self) -> Self {
        Self {
            shelves: self.shelves.clone(),
            members: Rc::clone(&self.members),
        }
    }
}

impl<S: Shelf, C: HttpClient> Deref for ShelfHook<S, C> {
    type Target = Collection<S, C>;

    fn deref(&self) -> &Self::Target {
        &self.shelves
    }
}

impl<S: Shelf, C: HttpClient + 'static> ShelfHook<S, C> {
    pub fn new(gateway: Rc<ApiGateway<C>>) -> Self {
        Self {
            shelves: Collection::new(gateway),
            members: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// 当前用户的全部书架
    pub async fn fetch_mine(&self) -> ApiResult<()> {
        self.authorize(Operation::Fetch)?;
        self.fetch_all(&Endpoint(S::BASE.to_string())).await
    }

    /// 某个用户的书架（公开部分由后端过滤）
    pub async fn fetch_for_user(&self, user_id: UserId) -> ApiResult<()> {
        self.fetch_all(&Endpoint(S::user_path(user_id))).await
    }

    pub fn owned_by(&self, user_id: UserId) -> Vec<S> {
        self.canonical()
            .into_iter()
            .filter(|s| s.owner_id() == user_id)
            .collect()
    }

    pub async fn create_shelf(&self, req: &CreateShelfRequest) -> ApiResult<S> {
        if req.name.trim().is_empty() {
            return Err(self.reject(
                Operation::Create,
                ApiError::local_precondition(format!("{}名称不能为空", S::LABEL)),
            ));
        }
        self.create(S::BASE, req).await
    }

    pub async fn rename(&self, id: i64, name: &str) -> ApiResult<S> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.reject(
                Operation::Update,
                ApiError::local_precondition(format!("{}名称不能为空", S::LABEL)),
            ));
        }
        self.update(&id, json!({ "name": name })).await
    }

    pub async fn update_shelf(&self, id: i64, patch: Value) -> ApiResult<S> {
        self.update(&id, patch).await
    }

    pub async fn delete_shelf(&self, id: i64) -> ApiResult<()> {
        self.delete(&id).await?;
        self.members.borrow_mut().remove(&id);
        Ok(())
    }

    // --- 书籍归属 ---

    pub async fn fetch_members(&self, id: i64) -> ApiResult<Vec<Membership>> {
        let path = shelf_members_path(S::BASE, id);
        let payload = self
            .run(
                Operation::Fetch,
                self.gateway()
                    .get_collection::<MemberPayload>(&path, &[], Book::COLLECTION),
            )
            .await?;
        let members: Vec<Membership> = payload.into_iter().map(|p| p.into_membership(id)).collect();

        if self.is_active() {
            self.members.borrow_mut().insert(id, members.clone());
            self.sync_count(id);
        }
        Ok(members)
    }

    /// 已加载的归属；未加载时为空
    pub fn members(&self, id: i64) -> Vec<Membership> {
        self.members.borrow().get(&id).cloned().unwrap_or_default()
    }

    pub fn members_loaded(&self, id: i64) -> bool {
        self.members.borrow().contains_key(&id)
    }

    /// 书籍是否在书架中（仅依据已加载的归属）
    pub fn contains_book(&self, id: i64, book_id: BookId) -> bool {
        self.members
            .borrow()
            .get(&id)
            .is_some_and(|list| list.iter().any(|m| m.book_id == book_id))
    }

    pub async fn add_book(&self, id: i64, book_id: BookId) -> ApiResult<Membership> {
        self.authorize(Operation::AddMember)?;
        if self.contains_book(id, book_id) {
            return Err(self.reject(
                Operation::AddMember,
                ApiError::local_precondition(format!("这本书已在该{}中", S::LABEL)),
            ));
        }

        let path = shelf_members_path(S::BASE, id);
        let response = self
            .run(
                Operation::AddMember,
                self.gateway()
                    .send_json(HttpMethod::Post, &path, &AddBookRequest { book_id }),
            )
            .await?;

        let membership = match returned_membership(&response.body, id, book_id) {
            Ok(membership) => membership,
            Err(e) => {
                tracing::warn!(shelf_id = id, book_id, error = %e, "添加响应无法解析");
                return Err(self.reject(Operation::AddMember, e.in_op_with("shelf.add_book", &path)));
            }
        };
        if !self.is_active() {
            return Ok(membership);
        }

        let loaded = {
            let mut members = self.members.borrow_mut();
            match members.get_mut(&id) {
                Some(list) => {
                    list.push(membership.clone());
                    true
                }
                None => false,
            }
        };
        if loaded {
            self.sync_count(id);
        } else {
            self.adjust_count(id, 1);
        }
        Ok(membership)
    }

    pub async fn remove_book(&self, id: i64, book_id: BookId) -> ApiResult<()> {
        self.authorize(Operation::RemoveMember)?;
        let path = shelf_member_path(S::BASE, id, book_id);
        self.run(Operation::RemoveMember, self.gateway().delete(&path))
            .await?;
        if !self.is_active() {
            return Ok(());
        }

        let loaded = {
            let mut members = self.members.borrow_mut();
            match members.get_mut(&id) {
                Some(list) => {
                    list.retain(|m| m.book_id != book_id);
                    true
                }
                None => false,
            }
        };
        if loaded {
            self.sync_count(id);
        } else {
            self.adjust_count(id, -1);
        }
        Ok(())
    }

    /// 以已加载的归属数量为准
    fn sync_count(&self, id: i64) {
        let count = self.members.borrow().get(&id).map(|list| list.len() as u32);
        if let Some(count) = count {
            self.apply(|state| state.modify(&id, |shelf| shelf.set_book_count(count)));
        }
    }

    /// 归属未加载时按增量修正计数
    fn adjust_count(&self, id: i64, delta: i32) {
        self.apply(|state| {
            state.modify(&id, |shelf| {
                if let Some(count) = shelf.book_count() {
                    shelf.set_book_count(count.saturating_add_signed(delta));
                }
            })
        });
    }
}
