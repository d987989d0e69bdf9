//! 书架与阅读清单页面
//!
//! 两类集合共用同一套视图，只在 hook 与路由上区分。

use blablabook::hooks::{Shelf, ShelfHook};
use blablabook::{AppRoute, Operation};
use blablabook_shared::protocol::CreateShelfRequest;
use blablabook_shared::{Library, ReadingList};
use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::auth::use_auth;
use crate::components::login::ErrorAlert;
use crate::hooks::use_collection;
use crate::web::BrowserHttpClient;
use crate::web::router::Link;

type Store<S> = StoredValue<ShelfHook<S, BrowserHttpClient>, LocalStorage>;

#[component]
pub fn LibrariesPage() -> impl IntoView {
    let hook = use_auth().services().libraries();
    shelf_list::<Library>(hook, AppRoute::LibraryDetail)
}

#[component]
pub fn LibraryDetailPage(id: i64) -> impl IntoView {
    let hook = use_auth().services().libraries();
    shelf_detail::<Library>(hook, id)
}

#[component]
pub fn ReadingListsPage() -> impl IntoView {
    let hook = use_auth().services().reading_lists();
    shelf_list::<ReadingList>(hook, AppRoute::ReadingListDetail)
}

#[component]
pub fn ReadingListDetailPage(id: i64) -> impl IntoView {
    let hook = use_auth().services().reading_lists();
    shelf_detail::<ReadingList>(hook, id)
}

// =========================================================
// 列表
// =========================================================

fn shelf_list<S: Shelf>(hook: ShelfHook<S, BrowserHttpClient>, detail: fn(i64) -> AppRoute) -> AnyView {
    let (shelves, version): (Store<S>, _) = use_collection(hook);

    let initial = shelves.get_value();
    spawn_local(async move {
        let _ = initial.fetch_mine().await;
    });

    let (name, set_name) = signal(String::new());
    let (error_msg, set_error_msg) = signal(Option::<String>::None);

    let on_create = move |ev: leptos::web_sys::SubmitEvent| {
        ev.prevent_default();
        set_error_msg.set(None);
        let hook = shelves.get_value();
        let req = CreateShelfRequest {
            name: name.get_untracked(),
            description: None,
            is_public: false,
        };
        spawn_local(async move {
            match hook.create_shelf(&req).await {
                Ok(_) => set_name.set(String::new()),
                Err(e) => set_error_msg.set(Some(e.user_message("创建失败"))),
            }
        });
    };

    let delete_shelf = move |id: i64, label: String| {
        let message = format!("确定要删除{}「{}」吗？", S::LABEL, label);
        if !window().confirm_with_message(&message).unwrap_or(false) {
            return;
        }
        let hook = shelves.get_value();
        spawn_local(async move {
            let _ = hook.delete_shelf(id).await;
        });
    };

    view! {
        <div class="container mx-auto p-4 space-y-4">
            <h1 class="text-2xl font-bold">{S::LABEL}</h1>
            <form class="flex gap-2" on:submit=on_create>
                <input
                    type="text"
                    class="input input-bordered flex-1"
                    placeholder=format!("新{}名称", S::LABEL)
                    on:input=move |ev| set_name.set(event_target_value(&ev))
                    prop:value=name
                />
                <button class="btn btn-primary">"创建"</button>
            </form>
            <ErrorAlert message=error_msg />

            {move || {
                version.track();
                let (error, items) = shelves.with_value(|h| {
                    (h.error(Operation::Fetch).or_else(|| h.error(Operation::Delete)), h.projected())
                });
                view! {
                    {error.map(|text| view! { <div role="alert" class="alert alert-error">{text}</div> })}
                    <ul class="menu bg-base-100 rounded-box shadow">
                        {items
                            .into_iter()
                            .map(|shelf| {
                                let id = shelf.id();
                                let label = shelf.name().to_string();
                                let link_label = label.clone();
                                let count = shelf.book_count().unwrap_or(0);
                                view! {
                                    <li class="flex flex-row justify-between">
                                        <Link to=detail(id)>{link_label}</Link>
                                        <span class="badge">{count}</span>
                                        <button
                                            class="btn btn-ghost btn-xs text-error"
                                            on:click=move |_| delete_shelf(id, label.clone())
                                        >
                                            "删除"
                                        </button>
                                    </li>
                                }
                            })
                            .collect_view()}
                    </ul>
                }
            }}
        </div>
    }
    .into_any()
}

// =========================================================
// 详情：书籍归属
// =========================================================

fn shelf_detail<S: Shelf>(hook: ShelfHook<S, BrowserHttpClient>, id: i64) -> AnyView {
    let (shelves, version): (Store<S>, _) = use_collection(hook);

    let initial = shelves.get_value();
    spawn_local(async move {
        let _ = initial.fetch_mine().await;
        let _ = initial.fetch_members(id).await;
    });

    let remove = move |book_id| {
        let hook = shelves.get_value();
        spawn_local(async move {
            let _ = hook.remove_book(id, book_id).await;
        });
    };

    view! {
        <div class="container mx-auto p-4 space-y-4">
            {move || {
                version.track();
                let (title, members, error) = shelves.with_value(|h| {
                    let title = h.get(&id).map(|s| s.name().to_string()).unwrap_or_default();
                    let error = h.error(Operation::RemoveMember).or_else(|| h.error(Operation::Fetch));
                    (title, h.members(id), error)
                });
                view! {
                    <h1 class="text-2xl font-bold">{title}</h1>
                    {error.map(|text| view! { <div role="alert" class="alert alert-error">{text}</div> })}
                    <ul class="space-y-2">
                        {members
                            .into_iter()
                            .map(|member| {
                                let book_id = member.book_id;
                                let title = member
                                    .book
                                    .map(|b| b.title)
                                    .unwrap_or_else(|| format!("#{}", book_id));
                                view! {
                                    <li class="flex justify-between items-center">
                                        <Link to=AppRoute::BookDetail(book_id)>{title}</Link>
                                        <button class="btn btn-ghost btn-xs" on:click=move |_| remove(book_id)>
                                            "移除"
                                        </button>
                                    </li>
                                }
                            })
                            .collect_view()}
                    </ul>
                }
            }}
        </div>
    }
    .into_any()
}
