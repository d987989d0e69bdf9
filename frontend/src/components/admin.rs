use std::collections::HashSet;

use blablabook::{AppRoute, Operation};
use blablabook_shared::{ROLE_ADMIN, ReviewId};
use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::auth::use_auth;
use crate::hooks::use_collection;
use crate::web::router::Link;

#[component]
pub fn AdminHomePage() -> impl IntoView {
    view! {
        <div class="container mx-auto p-4 flex gap-4">
            <Link to=AppRoute::AdminUsers class="btn btn-lg">"用户管理"</Link>
            <Link to=AppRoute::AdminReviews class="btn btn-lg">"书评审核"</Link>
        </div>
    }
}

// =========================================================
// 用户管理
// =========================================================

#[component]
pub fn AdminUsersPage() -> impl IntoView {
    let (users, version) = use_collection(use_auth().services().users());

    let initial = users.get_value();
    spawn_local(async move {
        let _ = initial.fetch_users().await;
    });

    let toggle_admin = move |user_id, is_admin: bool| {
        let hook = users.get_value();
        spawn_local(async move {
            let _ = if is_admin {
                hook.unassign_role(user_id, ROLE_ADMIN).await
            } else {
                hook.assign_role(user_id, ROLE_ADMIN).await
            };
        });
    };

    let delete_user = move |user_id| {
        if !window().confirm_with_message("确定要删除该用户吗？").unwrap_or(false) {
            return;
        }
        let hook = users.get_value();
        spawn_local(async move {
            let _ = hook.delete_user(user_id).await;
        });
    };

    view! {
        <div class="container mx-auto p-4 space-y-4">
            <input
                type="search"
                class="input input-bordered w-full"
                placeholder="搜索用户名或邮箱"
                on:input=move |ev| users.with_value(|h| h.search(&event_target_value(&ev)))
            />
            {move || {
                version.track();
                let (error, rows) = users.with_value(|h| {
                    let error = [Operation::Fetch, Operation::AssignRole, Operation::Delete]
                        .into_iter()
                        .find_map(|op| h.error(op));
                    (error, h.projected())
                });
                view! {
                    {error.map(|text| view! { <div role="alert" class="alert alert-error">{text}</div> })}
                    <table class="table">
                        <thead>
                            <tr><th>"用户名"</th><th>"邮箱"</th><th>"角色"</th><th></th></tr>
                        </thead>
                        <tbody>
                            {rows
                                .into_iter()
                                .map(|user| {
                                    let id = user.id;
                                    let is_admin = user.roles.iter().any(|r| r.name.eq_ignore_ascii_case(ROLE_ADMIN));
                                    let roles = user.roles.iter().map(|r| r.name.as_str()).collect::<Vec<_>>().join(", ");
                                    view! {
                                        <tr>
                                            <td>{user.username.clone()}</td>
                                            <td>{user.email.clone()}</td>
                                            <td>{roles}</td>
                                            <td class="flex gap-1">
                                                <button class="btn btn-xs" on:click=move |_| toggle_admin(id, is_admin)>
                                                    {if is_admin { "撤销管理员" } else { "设为管理员" }}
                                                </button>
                                                <button class="btn btn-xs btn-error" on:click=move |_| delete_user(id)>
                                                    "删除"
                                                </button>
                                            </td>
                                        </tr>
                                    }
                                })
                                .collect_view()}
                        </tbody>
                    </table>
                }
            }}
        </div>
    }
}

// =========================================================
// 书评审核
// =========================================================

#[component]
pub fn AdminReviewsPage() -> impl IntoView {
    let (reviews, version) = use_collection(use_auth().services().reviews());
    let selected = RwSignal::new(HashSet::<ReviewId>::new());
    let (summary, set_summary) = signal(Option::<String>::None);

    let initial = reviews.get_value();
    spawn_local(async move {
        let _ = initial.fetch_moderation_queue().await;
    });

    let toggle = move |id: ReviewId| {
        selected.update(|set| {
            if !set.remove(&id) {
                set.insert(id);
            }
        });
    };

    let delete_selected = move |_: leptos::web_sys::MouseEvent| {
        let ids: Vec<ReviewId> = selected.get_untracked().into_iter().collect();
        if ids.is_empty() {
            return;
        }
        let hook = reviews.get_value();
        spawn_local(async move {
            let outcome = hook.delete_reviews(&ids).await;
            selected.try_update(|set| set.retain(|id| outcome.failed.iter().any(|(f, _)| f == id)));
            let text = if outcome.is_complete() {
                format!("已删除 {} 条书评", outcome.deleted.len())
            } else {
                format!("已删除 {} 条，{} 条失败", outcome.deleted.len(), outcome.failed.len())
            };
            set_summary.try_set(Some(text));
        });
    };

    view! {
        <div class="container mx-auto p-4 space-y-4">
            <div class="flex gap-2 items-center">
                <button
                    class="btn btn-error btn-sm"
                    disabled=move || selected.with(|s| s.is_empty())
                    on:click=delete_selected
                >
                    "删除所选"
                </button>
                {move || summary.get().map(|text| view! { <span class="text-sm">{text}</span> })}
            </div>
            {move || {
                version.track();
                let (error, items) = reviews.with_value(|h| (h.error(Operation::Fetch), h.projected()));
                view! {
                    {error.map(|text| view! { <div role="alert" class="alert alert-error">{text}</div> })}
                    <ul class="space-y-2">
                        {items
                            .into_iter()
                            .map(|review| {
                                let id = review.id;
                                view! {
                                    <li class="card bg-base-100 shadow-sm p-3 flex flex-row gap-3">
                                        <input
                                            type="checkbox"
                                            class="checkbox"
                                            prop:checked=move || selected.with(|s| s.contains(&id))
                                            on:change=move |_| toggle(id)
                                        />
                                        <div>
                                            <p class="text-sm opacity-70">
                                                {format!(
                                                    "{} · {}",
                                                    review.username.clone().unwrap_or_default(),
                                                    review.book_title.clone().unwrap_or_default(),
                                                )}
                                            </p>
                                            <p>{review.content.clone()}</p>
                                        </div>
                                    </li>
                                }
                            })
                            .collect_view()}
                    </ul>
                }
            }}
        </div>
    }
}
