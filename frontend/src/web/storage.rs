//! LocalStorage 封装模块
//!
//! 基于 `gloo-storage` 的原始 `web_sys::Storage` 句柄实现核心的 [`StorageAdapter`]，
//! 值按原样以字符串保存，版本信封由核心负责。

use blablabook::StorageAdapter;
use gloo_storage::{LocalStorage, Storage};

#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStorage;

impl StorageAdapter for BrowserStorage {
    fn get(&self, key: &str) -> Option<String> {
        LocalStorage::raw().get_item(key).ok()?
    }

    fn set(&self, key: &str, value: &str) -> bool {
        LocalStorage::raw().set_item(key, value).is_ok()
    }

    fn delete(&self, key: &str) -> bool {
        LocalStorage::raw().remove_item(key).is_ok()
    }
}
