//! CSRF 令牌缓存
//!
//! 令牌只保存在内存中，一次只有一个值。首次需要时惰性获取，
//! 并发的调用方共享同一个进行中的请求，每个令牌生命周期内最多一次往返。

use std::cell::{Cell, RefCell};
use std::future::Future;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};

use crate::error::ApiResult;

type TokenFuture = Shared<LocalBoxFuture<'static, ApiResult<String>>>;

#[derive(Default)]
pub struct CsrfCache {
    token: RefCell<Option<String>>,
    in_flight: RefCell<Option<TokenFuture>>,
    fetches: Cell<u64>,
}

impl CsrfCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    /// 已发起的令牌请求次数
    pub fn fetch_count(&self) -> u64 {
        self.fetches.get()
    }

    pub fn set(&self, token: String) {
        *self.token.borrow_mut() = Some(token);
    }

    /// 丢弃当前令牌，下一次变更请求会重新获取
    pub fn invalidate(&self) {
        self.token.borrow_mut().take();
    }

    /// 返回缓存的令牌，缺失时通过 `fetch` 获取
    ///
    /// 已有进行中的请求时不会调用 `fetch`，而是等待同一个结果。
    /// 失败的结果不会被缓存。
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> ApiResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<String>> + 'static,
    {
        if let Some(token) = self.current() {
            return Ok(token);
        }

        let shared = {
            let mut slot = self.in_flight.borrow_mut();
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    self.fetches.set(self.fetches.get() + 1);
                    let pending = fetch().boxed_local().shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        let result = shared.clone().await;

        // 只有仍登记在槽中的那次请求负责落地结果
        let mut slot = self.in_flight.borrow_mut();
        if slot.as_ref().is_some_and(|pending| pending.ptr_eq(&shared)) {
            slot.take();
            if let Ok(token) = &result {
                self.set(token.clone());
            }
        }
        result
    }
}
