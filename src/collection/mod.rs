//! 通用集合 hook
//!
//! 每个 hook 持有两份列表：
//! - `canonical`: 后端针对当前范围最近一次返回的完整集合
//! - `projected`: 由 `canonical` 经当前查询过滤、再按当前排序派生的视图
//!
//! `projected` 从不单独修改，任何改变 `canonical` 的操作都会在同一次借用内重建它。
//! 各领域 hook（书目、书架、评分、书评、用户）只在此之上添加领域操作。

mod query;

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::rc::Rc;

use blablabook_shared::protocol::HttpMethod;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::api::{ApiGateway, decode_entity};
use crate::error::{ApiError, ApiResult};
use crate::request::HttpClient;
use crate::session::SessionStore;
use crate::store::{Listeners, SubscriptionId};

pub use query::{collate, compare_missing_low, directed, matches_query};

// =========================================================
// 实体与范围 (Entity & Scope)
// =========================================================

/// 可放入集合 hook 的实体
pub trait Entity: Clone + Serialize + DeserializeOwned + 'static {
    type Id: Clone + PartialEq + Display + Debug + 'static;
    /// 排序准则表
    type Sort: Copy + PartialEq + Debug + 'static;

    /// 集合响应中的键名，如 `books`
    const COLLECTION: &'static str;
    /// 单个实体响应中的键名，如 `book`
    const SINGULAR: &'static str;

    fn id(&self) -> Self::Id;

    /// 实体的资源路径（更新、删除）
    fn item_path(&self) -> String;

    /// 参与搜索的文本字段
    fn search_fields(&self) -> Vec<Cow<'_, str>>;

    fn compare(a: &Self, b: &Self, criterion: Self::Sort) -> Ordering;
}

/// 获取范围：选择 `fetch_all` 访问的端点
pub trait Scope {
    fn path(&self) -> String;

    fn query(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// 固定路径的范围
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint(pub String);

impl Scope for Endpoint {
    fn path(&self) -> String {
        self.0.clone()
    }
}

// =========================================================
// 状态 (State)
// =========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// 被单独跟踪的操作种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    Create,
    Update,
    Delete,
    AddMember,
    RemoveMember,
    Submit,
    Enrich,
    AssignRole,
}

impl Operation {
    /// 后端没有给出消息时展示的默认文案
    pub fn fallback_message(&self) -> &'static str {
        match self {
            Operation::Fetch => "加载失败，请稍后重试",
            Operation::Create => "创建失败",
            Operation::Update => "更新失败",
            Operation::Delete => "删除失败",
            Operation::AddMember => "添加书籍失败",
            Operation::RemoveMember => "移除书籍失败",
            Operation::Submit => "提交失败",
            Operation::Enrich => "获取书目详情失败",
            Operation::AssignRole => "修改角色失败",
        }
    }
}

pub(crate) struct CollectionState<E: Entity> {
    canonical: Vec<E>,
    projected: Vec<E>,
    query: String,
    sort: Option<E::Sort>,
    load_state: LoadState,
    pending: HashMap<Operation, usize>,
    errors: HashMap<Operation, String>,
    /// 最近一次发起的 `fetch_all` 编号
    generation: u64,
}

impl<E: Entity> Default for CollectionState<E> {
    fn default() -> Self {
        Self {
            canonical: Vec::new(),
            projected: Vec::new(),
            query: String::new(),
            sort: None,
            load_state: LoadState::Idle,
            pending: HashMap::new(),
            errors: HashMap::new(),
            generation: 0,
        }
    }
}

impl<E: Entity> CollectionState<E> {
    /// `projected = sort(filter(canonical))`
    fn reproject(&mut self) {
        let needle = self.query.to_lowercase();
        let mut projected: Vec<E> = self
            .canonical
            .iter()
            .filter(|item| needle.is_empty() || matches_query(&item.search_fields(), &needle))
            .cloned()
            .collect();
        if let Some(criterion) = self.sort {
            // 稳定排序：比较相等时保持 canonical 中的顺序
            projected.sort_by(|a, b| E::compare(a, b, criterion));
        }
        self.projected = projected;
    }

    pub(crate) fn position(&self, id: &E::Id) -> Option<usize> {
        self.canonical.iter().position(|item| item.id() == *id)
    }

    pub(crate) fn upsert(&mut self, entity: E) {
        match self.position(&entity.id()) {
            Some(index) => self.canonical[index] = entity,
            None => self.canonical.push(entity),
        }
    }

    pub(crate) fn remove(&mut self, id: &E::Id) -> Option<E> {
        self.position(id).map(|index| self.canonical.remove(index))
    }

    pub(crate) fn modify(&mut self, id: &E::Id, f: impl FnOnce(&mut E)) -> bool {
        match self.position(id) {
            Some(index) => {
                f(&mut self.canonical[index]);
                true
            }
            None => false,
        }
    }

    pub(crate) fn items(&self) -> &[E] {
        &self.canonical
    }
}

// =========================================================
// 集合 Hook (Collection)
// =========================================================

pub struct Collection<E: Entity, C: HttpClient> {
    gateway: Rc<ApiGateway<C>>,
    state: Rc<RefCell<CollectionState<E>>>,
    listeners: Rc<Listeners<()>>,
    active: Rc<Cell<bool>>,
}

impl<E: Entity, C: HttpClient> Clone for Collection<E, C> {
    fn clone(&self) -> Self {
        Self {
            gateway: Rc::clone(&self.gateway),
            state: Rc::clone(&self.state),
            listeners: Rc::clone(&self.listeners),
            active: Rc::clone(&self.active),
        }
    }
}

impl<E: Entity, C: HttpClient + 'static> Collection<E, C> {
    pub fn new(gateway: Rc<ApiGateway<C>>) -> Self {
        Self {
            gateway,
            state: Rc::new(RefCell::new(CollectionState::default())),
            listeners: Rc::new(Listeners::new()),
            active: Rc::new(Cell::new(true)),
        }
    }

    pub fn gateway(&self) -> &ApiGateway<C> {
        &self.gateway
    }

    pub fn session(&self) -> &SessionStore {
        self.gateway.session()
    }

    // --- 读取 ---

    pub fn canonical(&self) -> Vec<E> {
        self.state.borrow().canonical.clone()
    }

    pub fn projected(&self) -> Vec<E> {
        self.state.borrow().projected.clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().canonical.is_empty()
    }

    pub fn get(&self, id: &E::Id) -> Option<E> {
        let state = self.state.borrow();
        state.position(id).map(|index| state.canonical[index].clone())
    }

    pub fn find(&self, predicate: impl Fn(&E) -> bool) -> Option<E> {
        self.state.borrow().canonical.iter().find(|item| predicate(item)).cloned()
    }

    pub fn load_state(&self) -> LoadState {
        self.state.borrow().load_state
    }

    /// 当前查询（已去除首尾空白）
    pub fn query(&self) -> String {
        self.state.borrow().query.clone()
    }

    pub fn sort_criterion(&self) -> Option<E::Sort> {
        self.state.borrow().sort
    }

    pub fn is_loading(&self) -> bool {
        self.is_pending(Operation::Fetch)
    }

    pub fn is_pending(&self, op: Operation) -> bool {
        self.state.borrow().pending.get(&op).is_some_and(|n| *n > 0)
    }

    /// 是否有任何操作在进行中
    pub fn is_busy(&self) -> bool {
        self.state.borrow().pending.values().any(|n| *n > 0)
    }

    pub fn error(&self, op: Operation) -> Option<String> {
        self.state.borrow().errors.get(&op).cloned()
    }

    pub fn clear_error(&self, op: Operation) {
        let removed = self.state.borrow_mut().errors.remove(&op).is_some();
        if removed {
            self.notify();
        }
    }

    // --- 订阅与生命周期 ---

    pub fn subscribe(&self, listener: impl Fn() + 'static) -> SubscriptionId {
        self.listeners.add(move |_| listener())
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.remove(id)
    }

    /// 宿主组件卸载后调用：之后到达的响应不再写入状态
    pub fn dispose(&self) {
        self.active.set(false);
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn notify(&self) {
        self.listeners.notify(&());
    }

    // --- 本地投影 ---

    /// 不区分大小写的子串搜索，空白查询恢复完整集合
    pub fn search(&self, query: &str) {
        {
            let mut state = self.state.borrow_mut();
            state.query = query.trim().to_string();
            state.reproject();
        }
        self.notify();
    }

    /// 按准则排序，与当前搜索组合
    pub fn sort(&self, criterion: E::Sort) {
        {
            let mut state = self.state.borrow_mut();
            state.sort = Some(criterion);
            state.reproject();
        }
        self.notify();
    }

    pub fn clear_filters(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.query.clear();
            state.sort = None;
            state.reproject();
        }
        self.notify();
    }

    // --- 远程操作 ---

    /// 获取范围内的完整集合
    ///
    /// 成功时替换 canonical 并清空查询与排序；失败时保留已加载的数据。
    pub async fn fetch_all<S: Scope>(&self, scope: &S) -> ApiResult<()> {
        let path = scope.path();
        let query = scope.query();
        let pairs: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let gateway = &self.gateway;
        self.load_with(async {
            let items = gateway.get_collection::<E>(&path, &pairs, E::COLLECTION).await?;
            Ok((items, ()))
        })
        .await
        .map(|_| ())
    }

    /// 带代次保护的加载
    ///
    /// 只有最近一次发起的加载可以写入状态。返回 `Ok(None)` 表示响应已过期
    /// 或 hook 已释放，数据未被采用。
    pub(crate) async fn load_with<X, F>(&self, fut: F) -> ApiResult<Option<X>>
    where
        F: Future<Output = ApiResult<(Vec<E>, X)>>,
    {
        let generation = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.load_state = LoadState::Loading;
            *state.pending.entry(Operation::Fetch).or_default() += 1;
            state.generation
        };
        self.notify();

        let result = fut.await;

        if !self.is_active() {
            tracing::debug!(collection = E::COLLECTION, "hook 已释放，忽略响应");
            return result.map(|_| None);
        }

        let outcome = {
            let mut state = self.state.borrow_mut();
            if let Some(n) = state.pending.get_mut(&Operation::Fetch) {
                *n = n.saturating_sub(1);
            }
            if generation != state.generation {
                tracing::debug!(
                    collection = E::COLLECTION,
                    generation,
                    latest = state.generation,
                    "丢弃过期的加载结果"
                );
                result.map(|_| None)
            } else {
                match result {
                    Ok((items, extra)) => {
                        state.canonical = items;
                        state.query.clear();
                        state.sort = None;
                        state.reproject();
                        state.load_state = LoadState::Ready;
                        state.errors.remove(&Operation::Fetch);
                        Ok(Some(extra))
                    }
                    Err(e) => {
                        state.load_state = LoadState::Failed;
                        state
                            .errors
                            .insert(Operation::Fetch, e.user_message(Operation::Fetch.fallback_message()));
                        Err(e.in_op_with("collection.fetch", E::COLLECTION))
                    }
                }
            }
        };
        self.notify();
        outcome
    }

    /// 删除实体，成功后同时从 canonical 与 projected 中移除
    pub async fn delete(&self, id: &E::Id) -> ApiResult<()> {
        self.authorize(Operation::Delete)?;
        let path = self.resource_path(Operation::Delete, id)?;
        self.run(Operation::Delete, self.gateway.delete(&path)).await?;
        self.apply(|state| {
            state.remove(id);
        });
        Ok(())
    }

    /// 更新实体
    ///
    /// 后端确认后，依次把 patch 与返回的字段浅合并到本地副本上，
    /// 两者都没有的字段保持原值。
    pub async fn update(&self, id: &E::Id, patch: Value) -> ApiResult<E> {
        self.authorize(Operation::Update)?;
        let path = self.resource_path(Operation::Update, id)?;
        let merged = self
            .run(Operation::Update, async {
                let response = self
                    .gateway
                    .request(HttpMethod::Patch, &path, Some(patch.clone()), &[])
                    .await?;
                let returned = returned_fields(&response.body, E::SINGULAR)?;
                merge_entity(self.get(id).as_ref(), &patch, returned)
            })
            .await?;
        self.apply(|state| state.upsert(merged.clone()));
        Ok(merged)
    }

    /// 创建实体并追加到 canonical
    pub async fn create<B: Serialize>(&self, path: &str, body: &B) -> ApiResult<E> {
        self.authorize(Operation::Create)?;
        let created = self
            .run(Operation::Create, async {
                let response = self.gateway.send_json(HttpMethod::Post, path, body).await?;
                decode_entity::<E>(&response.body, &[E::SINGULAR])
            })
            .await?;
        self.apply(|state| state.upsert(created.clone()));
        Ok(created)
    }

    // --- 供领域 hook 使用 ---

    /// 变更前置检查：必须已登录，否则记录错误且不发请求
    pub(crate) fn authorize(&self, op: Operation) -> ApiResult<blablabook_shared::UserProfile> {
        self.session().require_user().map_err(|e| self.record(op, e))
    }

    /// 只对已加载的实体发起变更
    fn resource_path(&self, op: Operation, id: &E::Id) -> ApiResult<String> {
        match self.get(id) {
            Some(entity) => Ok(entity.item_path()),
            None => Err(self.record(
                op,
                ApiError::local_precondition(format!("条目 {} 尚未加载", id)),
            )),
        }
    }

    /// 在本地记录一个不经过网络的失败
    pub(crate) fn reject(&self, op: Operation, error: ApiError) -> ApiError {
        self.record(op, error)
    }

    fn record(&self, op: Operation, error: ApiError) -> ApiError {
        if self.is_active() {
            self.state
                .borrow_mut()
                .errors
                .insert(op, error.user_message(op.fallback_message()));
            self.notify();
        }
        error
    }

    /// 执行一次变更请求并维护该操作的进行中计数与错误信息
    pub(crate) async fn run<T, F>(&self, op: Operation, fut: F) -> ApiResult<T>
    where
        F: Future<Output = ApiResult<T>>,
    {
        self.mark_pending(op, true);
        let result = fut.await;
        if !self.is_active() {
            return result;
        }
        self.mark_pending(op, false);
        match result {
            Ok(value) => {
                let cleared = self.state.borrow_mut().errors.remove(&op).is_some();
                if cleared {
                    self.notify();
                }
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(collection = E::COLLECTION, operation = ?op, error = %e, "操作失败");
                Err(self.record(op, e))
            }
        }
    }

    fn mark_pending(&self, op: Operation, started: bool) {
        if !self.is_active() {
            return;
        }
        {
            let mut state = self.state.borrow_mut();
            let counter = state.pending.entry(op).or_default();
            *counter = if started { *counter + 1 } else { counter.saturating_sub(1) };
        }
        self.notify();
    }

    /// 修改 canonical 并重建 projected
    pub(crate) fn apply<R>(&self, f: impl FnOnce(&mut CollectionState<E>) -> R) -> Option<R> {
        if !self.is_active() {
            return None;
        }
        let result = {
            let mut state = self.state.borrow_mut();
            let result = f(&mut state);
            state.reproject();
            result
        };
        self.notify();
        Some(result)
    }
}

// =========================================================
// 合并 (Merge)
// =========================================================

/// 解析更新响应中的实体字段；空响应体返回 `None`
fn returned_fields(body: &str, singular: &str) -> ApiResult<Option<Value>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(body)?;
    match value {
        Value::Object(mut map) => match map.remove(singular) {
            Some(inner @ Value::Object(_)) => Ok(Some(inner)),
            Some(other) => {
                map.insert(singular.to_string(), other);
                Ok(Some(Value::Object(map)))
            }
            None => Ok(Some(Value::Object(map))),
        },
        _ => Ok(None),
    }
}

/// 右偏浅合并：`overlay` 的顶层字段覆盖 `base`
pub(crate) fn shallow_merge(base: &mut Value, overlay: &Value) {
    if let (Value::Object(base), Value::Object(overlay)) = (base, overlay) {
        for (key, value) in overlay {
            base.insert(key.clone(), value.clone());
        }
    }
}

fn merge_entity<E: Entity>(local: Option<&E>, patch: &Value, returned: Option<Value>) -> ApiResult<E> {
    let mut merged = match local {
        Some(entity) => serde_json::to_value(entity)?,
        None => Value::Object(Default::default()),
    };
    shallow_merge(&mut merged, patch);
    if let Some(returned) = returned {
        shallow_merge(&mut merged, &returned);
    }
    serde_json::from_value(merged).map_err(|e| ApiError::from(e).in_op("collection.merge"))
}
