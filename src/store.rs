//! 持久化状态容器
//!
//! 会话与主题偏好共用同一套模式：整体替换写入、每次变化落盘、
//! 启动时从存储恢复、变化后通知订阅者。

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::storage::StorageAdapter;

pub type SubscriptionId = u64;

// =========================================================
// 订阅者列表
// =========================================================

pub(crate) struct Listeners<T> {
    next_id: Cell<SubscriptionId>,
    entries: RefCell<Vec<(SubscriptionId, Rc<dyn Fn(&T)>)>>,
}

impl<T: 'static> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            entries: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, listener: impl Fn(&T) + 'static) -> SubscriptionId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// 先复制订阅者列表再调用，回调内可以安全地订阅/退订或读取 store
    pub(crate) fn notify(&self, value: &T) {
        let snapshot: Vec<Rc<dyn Fn(&T)>> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(value);
        }
    }
}

// =========================================================
// 可持久化状态
// =========================================================

/// 可以放入 [`PersistedStore`] 的状态
pub trait Persisted: Clone + Default + Serialize + DeserializeOwned + 'static {
    /// 存储格式版本，版本不一致的数据在恢复时被丢弃
    const VERSION: u32;

    /// 恢复后的修正钩子，用于重建派生字段
    fn rehydrated(self) -> Self {
        self
    }
}

/// 存储中的信封格式：`{ "state": .., "version": N }`
#[derive(Serialize, Deserialize)]
struct Envelope<S> {
    state: S,
    version: u32,
}

struct Inner<T: Persisted> {
    key: String,
    storage: Rc<dyn StorageAdapter>,
    state: RefCell<T>,
    listeners: Listeners<T>,
}

/// 持久化 store 句柄，克隆后共享同一份状态
pub struct PersistedStore<T: Persisted> {
    inner: Rc<Inner<T>>,
}

impl<T: Persisted> Clone for PersistedStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Persisted> PersistedStore<T> {
    /// 打开 store 并从存储恢复状态
    pub fn open(storage: Rc<dyn StorageAdapter>, key: impl Into<String>) -> Self {
        let key = key.into();
        let state = rehydrate::<T>(storage.as_ref(), &key);
        Self {
            inner: Rc::new(Inner {
                key,
                storage,
                state: RefCell::new(state),
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn get(&self) -> T {
        self.inner.state.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    /// 整体替换状态
    pub fn set(&self, value: T) {
        *self.inner.state.borrow_mut() = value;
        self.commit();
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.state.borrow_mut());
        self.commit();
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> SubscriptionId {
        self.inner.listeners.add(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// 清除存储并回到默认状态（测试或切换账户时使用）
    pub fn reset(&self) {
        self.inner.storage.delete(&self.inner.key);
        *self.inner.state.borrow_mut() = T::default();
        let snapshot = self.get();
        self.inner.listeners.notify(&snapshot);
    }

    fn commit(&self) {
        let snapshot = self.get();
        self.persist(&snapshot);
        self.inner.listeners.notify(&snapshot);
    }

    fn persist(&self, state: &T) {
        let envelope = Envelope {
            state,
            version: T::VERSION,
        };
        match serde_json::to_string(&envelope) {
            Ok(raw) => {
                if !self.inner.storage.set(&self.inner.key, &raw) {
                    tracing::warn!(key = %self.inner.key, "持久化写入失败");
                }
            }
            Err(e) => tracing::error!(key = %self.inner.key, error = %e, "状态序列化失败"),
        }
    }
}

fn rehydrate<T: Persisted>(storage: &dyn StorageAdapter, key: &str) -> T {
    let Some(raw) = storage.get(key) else {
        return T::default();
    };
    match serde_json::from_str::<Envelope<T>>(&raw) {
        Ok(envelope) if envelope.version == T::VERSION => envelope.state.rehydrated(),
        Ok(envelope) => {
            tracing::warn!(key, found = envelope.version, expected = T::VERSION, "存储版本不匹配，使用默认状态");
            T::default()
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "存储内容无法解析，使用默认状态");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u32,
        #[serde(default)]
        doubled: u32,
    }

    impl Persisted for Counter {
        const VERSION: u32 = 2;

        fn rehydrated(mut self) -> Self {
            self.doubled = self.value * 2;
            self
        }
    }

    fn open(storage: &MemoryStorage) -> PersistedStore<Counter> {
        PersistedStore::open(Rc::new(storage.clone()), "counter")
    }

    #[test]
    fn test_every_change_is_persisted_and_rehydrated() {
        let storage = MemoryStorage::new();
        let store = open(&storage);
        store.set(Counter { value: 3, doubled: 0 });

        let raw = storage.get("counter").unwrap();
        assert_eq!(raw, r#"{"state":{"value":3,"doubled":0},"version":2}"#);

        let reopened = open(&storage);
        assert_eq!(reopened.get(), Counter { value: 3, doubled: 6 });
    }

    #[test]
    fn test_version_mismatch_falls_back_to_default() {
        let storage = MemoryStorage::new();
        storage.set("counter", r#"{"state":{"value":9},"version":1}"#);
        assert_eq!(open(&storage).get(), Counter::default());

        storage.set("counter", "not json");
        assert_eq!(open(&storage).get(), Counter::default());
    }

    #[test]
    fn test_listeners_see_new_state_and_can_unsubscribe() {
        let storage = MemoryStorage::new();
        let store = open(&storage);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        let reader = store.clone();
        let id = store.subscribe(move |c| {
            // 回调内读取 store 不会触发重复借用
            assert_eq!(reader.get().value, c.value);
            sink.borrow_mut().push(c.value);
        });

        store.update(|c| c.value = 1);
        store.set(Counter { value: 5, doubled: 0 });
        assert!(store.unsubscribe(id));
        store.update(|c| c.value = 7);

        assert_eq!(*seen.borrow(), vec![1, 5]);
    }

    #[test]
    fn test_reset_clears_storage() {
        let storage = MemoryStorage::new();
        let store = open(&storage);
        store.set(Counter { value: 4, doubled: 0 });

        store.reset();

        assert_eq!(store.get(), Counter::default());
        assert!(storage.get("counter").is_none());
    }
}
