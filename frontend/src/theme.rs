//! 主题上下文：把核心的主题 Store 同步到 `<html data-theme>`

use blablabook::ThemeStore;
use blablabook_shared::Theme;
use leptos::prelude::*;

#[derive(Clone, Copy)]
pub struct ThemeContext {
    store: StoredValue<ThemeStore, LocalStorage>,
    theme: RwSignal<Theme>,
}

impl ThemeContext {
    pub fn new(store: ThemeStore) -> Self {
        let theme = RwSignal::new(store.theme());
        store.subscribe(move |t| {
            theme.try_set(*t);
        });
        Effect::new(move |_| apply(theme.get()));

        Self {
            store: StoredValue::new_local(store),
            theme,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme.get()
    }

    pub fn toggle(&self) {
        self.store.with_value(|store| {
            store.toggle();
        });
    }
}

fn apply(theme: Theme) {
    let root = document().document_element();
    if let Some(root) = root {
        let _ = root.set_attribute("data-theme", theme.as_str());
    }
}

pub fn use_theme() -> ThemeContext {
    use_context::<ThemeContext>().expect("ThemeContext should be provided")
}
