//! 持久化存储端口
//!
//! 与浏览器 LocalStorage 的字符串键值语义一致。浏览器实现位于 frontend，
//! 这里提供内存实现，用于测试以及没有持久化介质的宿主。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// 抽象存储接口：负责字符串键值的持久化
pub trait StorageAdapter {
    /// 获取存储的字符串值，键不存在或读取失败时返回 `None`
    fn get(&self, key: &str) -> Option<String>;
    /// 设置存储值，返回操作是否成功
    fn set(&self, key: &str, value: &str) -> bool;
    /// 删除键值对，返回操作是否成功
    fn delete(&self, key: &str) -> bool;
}

/// 内存存储
///
/// 克隆共享同一份数据，测试可以在 store 持有一份的同时检查内容。
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    map: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }
}

impl StorageAdapter for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.map.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        self.map
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        true
    }

    fn delete(&self, key: &str) -> bool {
        self.map.borrow_mut().remove(key);
        true
    }
}
