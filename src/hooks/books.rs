//! 书目 hook

use std::borrow::Cow;
use std::cmp::Ordering;
use std::ops::Deref;
use std::rc::Rc;
use std::str::FromStr;

use blablabook_shared::protocol::{CreateBookRequest, HttpMethod, endpoints};
use blablabook_shared::{Book, BookId, UserId};
use serde_json::Value;

use crate::api::{ApiGateway, decode_entity};
use crate::collection::{
    Collection, Entity, Operation, Scope, collate, compare_missing_low, directed,
};
use crate::error::{ApiError, ApiResult};
use crate::metadata::{self, normalize_work_key};
use crate::request::HttpClient;

// =========================================================
// 排序准则
// =========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSort {
    TitleAsc,
    TitleDesc,
    AuthorAsc,
    AuthorDesc,
    RatingDesc,
    RatingAsc,
    YearDesc,
    YearAsc,
    /// 最近加入的在前
    Recent,
}

impl BookSort {
    pub const ALL: [BookSort; 9] = [
        BookSort::TitleAsc,
        BookSort::TitleDesc,
        BookSort::AuthorAsc,
        BookSort::AuthorDesc,
        BookSort::RatingDesc,
        BookSort::RatingAsc,
        BookSort::YearDesc,
        BookSort::YearAsc,
        BookSort::Recent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookSort::TitleAsc => "title-asc",
            BookSort::TitleDesc => "title-desc",
            BookSort::AuthorAsc => "author-asc",
            BookSort::AuthorDesc => "author-desc",
            BookSort::RatingDesc => "rating-desc",
            BookSort::RatingAsc => "rating-asc",
            BookSort::YearDesc => "year-desc",
            BookSort::YearAsc => "year-asc",
            BookSort::Recent => "recent",
        }
    }
}

impl FromStr for BookSort {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookSort::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ApiError::local_precondition(format!("未知的排序方式: {}", s)))
    }
}

impl Entity for Book {
    type Id = BookId;
    type Sort = BookSort;
    const COLLECTION: &'static str = "books";
    const SINGULAR: &'static str = "book";

    fn id(&self) -> BookId {
        self.id
    }

    fn item_path(&self) -> String {
        endpoints::book(self.id)
    }

    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.title.as_str()),
            Cow::Owned(self.author_names()),
            Cow::Owned(self.identifiers()),
        ]
    }

    fn compare(a: &Self, b: &Self, criterion: BookSort) -> Ordering {
        match criterion {
            BookSort::TitleAsc => collate(&a.title, &b.title),
            BookSort::TitleDesc => collate(&a.title, &b.title).reverse(),
            BookSort::AuthorAsc => collate(&a.author_names(), &b.author_names()),
            BookSort::AuthorDesc => collate(&a.author_names(), &b.author_names()).reverse(),
            BookSort::RatingDesc => directed(compare_missing_low(a.average_rating, b.average_rating), true),
            BookSort::RatingAsc => compare_missing_low(a.average_rating, b.average_rating),
            BookSort::YearDesc => directed(compare_missing_low(a.publication_year, b.publication_year), true),
            BookSort::YearAsc => compare_missing_low(a.publication_year, b.publication_year),
            BookSort::Recent => directed(compare_missing_low(a.created_at, b.created_at), true),
        }
    }
}

// =========================================================
// 范围
// =========================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BookScope {
    /// 全部书目
    All,
    /// 某个用户收藏的书目
    User(UserId),
    Trending,
    /// 服务端搜索
    Search(String),
}

impl Scope for BookScope {
    fn path(&self) -> String {
        match self {
            BookScope::All => endpoints::BOOKS.to_string(),
            BookScope::User(id) => endpoints::user_books(*id),
            BookScope::Trending => endpoints::BOOKS_TRENDING.to_string(),
            BookScope::Search(_) => endpoints::BOOKS_SEARCH.to_string(),
        }
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            BookScope::Search(q) => vec![("q", q.clone())],
            _ => Vec::new(),
        }
    }
}

// =========================================================
// Hook
// =========================================================

pub struct BooksHook<C: HttpClient> {
    books: Collection<Book, C>,
}

impl<C: HttpClient> Clone for BooksHook<C> {
    fn clone(&self) -> Self {
        Self {
            books: self.books.clone(),
        }
    }
}

impl<C: HttpClient> Deref for BooksHook<C> {
    type Target = Collection<Book, C>;

    fn deref(&self) -> &Self::Target {
        &self.books
    }
}

impl<C: HttpClient + 'static> BooksHook<C> {
    pub fn new(gateway: Rc<ApiGateway<C>>) -> Self {
        Self {
            books: Collection::new(gateway),
        }
    }

    /// 管理员与访客看全部书目，普通用户看自己的书目
    pub fn default_scope(&self) -> BookScope {
        let session = self.session();
        match session.user_id() {
            Some(_) if session.is_admin() => BookScope::All,
            Some(id) => BookScope::User(id),
            None => BookScope::All,
        }
    }

    pub async fn fetch_default(&self) -> ApiResult<()> {
        let scope = self.default_scope();
        self.fetch_all(&scope).await
    }

    pub async fn fetch_trending(&self) -> ApiResult<()> {
        self.fetch_all(&BookScope::Trending).await
    }

    /// 服务端搜索；空白查询回到默认范围
    pub async fn search_remote(&self, query: &str) -> ApiResult<()> {
        let query = query.trim();
        if query.is_empty() {
            return self.fetch_default().await;
        }
        self.fetch_all(&BookScope::Search(query.to_string())).await
    }

    /// 获取单本书并合并到本地集合
    pub async fn fetch_one(&self, id: BookId) -> ApiResult<Book> {
        let path = endpoints::book(id);
        let book = self
            .run(Operation::Fetch, async {
                let response = self.gateway().request(HttpMethod::Get, &path, None, &[]).await?;
                decode_entity::<Book>(&response.body, &[Book::SINGULAR])
            })
            .await?;
        self.apply(|state| state.upsert(book.clone()));
        Ok(book)
    }

    pub async fn create_book(&self, req: &CreateBookRequest) -> ApiResult<Book> {
        if req.title.trim().is_empty() {
            return Err(self.reject(Operation::Create, ApiError::local_precondition("书名不能为空")));
        }
        self.create(endpoints::BOOKS, req).await
    }

    pub async fn update_book(&self, id: BookId, patch: Value) -> ApiResult<Book> {
        self.update(&id, patch).await
    }

    pub async fn delete_book(&self, id: BookId) -> ApiResult<()> {
        self.delete(&id).await
    }

    /// 管理员或书目所有者可编辑、删除
    pub fn can_manage(&self, book: &Book) -> bool {
        let session = self.session();
        match session.user_id() {
            Some(_) if session.is_admin() => true,
            Some(id) => book.owner_id == Some(id),
            None => false,
        }
    }

    /// 用外部元数据补全简介与封面
    ///
    /// 查询失败不是致命错误：记录错误并返回原有数据。
    pub async fn enrich(&self, id: BookId) -> ApiResult<Book> {
        let Some(book) = self.get(&id) else {
            return Err(self.reject(
                Operation::Enrich,
                ApiError::local_precondition(format!("书目 {} 尚未加载", id)),
            ));
        };
        let Some(key) = book.open_library_key.as_deref().and_then(normalize_work_key) else {
            return Ok(book);
        };

        let lookup = self
            .run(Operation::Enrich, metadata::fetch_work(self.gateway(), key))
            .await;
        match lookup {
            Ok(details) => {
                let enriched = self
                    .apply(|state| {
                        state.modify(&id, |b| details.enrich(b));
                    })
                    .and_then(|_| self.get(&id));
                Ok(enriched.unwrap_or(book))
            }
            Err(e) => {
                tracing::warn!(book_id = id, error = %e, "外部元数据不可用，保留已知字段");
                Ok(book)
            }
        }
    }
}
