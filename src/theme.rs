//! 主题偏好 Store，与会话相互独立

use std::rc::Rc;

use blablabook_shared::Theme;

use crate::config::ClientConfig;
use crate::storage::StorageAdapter;
use crate::store::{Persisted, PersistedStore, SubscriptionId};

impl Persisted for Theme {
    const VERSION: u32 = 1;
}

#[derive(Clone)]
pub struct ThemeStore {
    store: PersistedStore<Theme>,
}

impl ThemeStore {
    pub fn open(storage: Rc<dyn StorageAdapter>, config: &ClientConfig) -> Self {
        Self {
            store: PersistedStore::open(storage, config.theme_storage_key.clone()),
        }
    }

    pub fn theme(&self) -> Theme {
        self.store.get()
    }

    pub fn set_theme(&self, theme: Theme) {
        if self.theme() != theme {
            self.store.set(theme);
        }
    }

    pub fn toggle(&self) -> Theme {
        let next = self.theme().toggled();
        self.store.set(next);
        next
    }

    pub fn subscribe(&self, listener: impl Fn(&Theme) + 'static) -> SubscriptionId {
        self.store.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    pub fn reset(&self) {
        self.store.reset();
    }
}
