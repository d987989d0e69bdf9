//! 阅读清单 (Reading List)

use std::borrow::Cow;
use std::cmp::Ordering;

use blablabook_shared::protocol::endpoints;
use blablabook_shared::{ReadingList, ReadingListId, UserId};
use chrono::{DateTime, Utc};

use crate::collection::Entity;
use crate::hooks::shelf::{Shelf, ShelfHook, ShelfSort, compare_shelves};

pub type ReadingListsHook<C> = ShelfHook<ReadingList, C>;

impl Entity for ReadingList {
    type Id = ReadingListId;
    type Sort = ShelfSort;
    const COLLECTION: &'static str = "reading_lists";
    const SINGULAR: &'static str = "reading_list";

    fn id(&self) -> ReadingListId {
        self.id
    }

    fn item_path(&self) -> String {
        format!("{}/{}", endpoints::READING_LISTS, self.id)
    }

    fn search_fields(&self) -> Vec<Cow<'_, str>> {
        vec![
            Cow::Borrowed(self.name.as_str()),
            Cow::Borrowed(self.description.as_deref().unwrap_or_default()),
        ]
    }

    fn compare(a: &Self, b: &Self, criterion: ShelfSort) -> Ordering {
        compare_shelves(a, b, criterion)
    }
}

impl Shelf for ReadingList {
    const BASE: &'static str = endpoints::READING_LISTS;
    const LABEL: &'static str = "阅读清单";

    fn user_path(user_id: UserId) -> String {
        endpoints::user_reading_lists(user_id)
    }

    fn owner_id(&self) -> UserId {
        self.user_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn book_count(&self) -> Option<u32> {
        self.book_count
    }

    fn set_book_count(&mut self, count: u32) {
        self.book_count = Some(count);
    }
}
