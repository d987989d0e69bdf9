//! 把核心的集合 hook 挂到组件生命周期上

use std::ops::Deref;

use blablabook::{Collection, Entity};
use leptos::prelude::*;

use crate::web::BrowserHttpClient;

/// 订阅 hook 的变化并在组件卸载时释放
///
/// 返回的版本号信号在每次状态变化时递增，视图读取它以重新渲染。
pub fn use_collection<H, E>(hook: H) -> (StoredValue<H, LocalStorage>, ReadSignal<u64>)
where
    H: Deref<Target = Collection<E, BrowserHttpClient>> + 'static,
    E: Entity,
{
    let (version, set_version) = signal(0u64);
    hook.subscribe(move || {
        set_version.try_update(|v| *v += 1);
    });

    let stored = StoredValue::new_local(hook);
    on_cleanup(move || {
        stored.try_with_value(|hook| hook.dispose());
    });
    (stored, version)
}
