//! 各领域的集合 hook
//!
//! 全部建立在 [`crate::collection::Collection`] 之上，只添加领域操作。

pub mod books;
pub mod libraries;
pub mod ratings;
pub mod reading_lists;
pub mod reviews;
pub mod shelf;
pub mod users;

pub use books::{BookScope, BookSort, BooksHook};
pub use libraries::LibrariesHook;
pub use ratings::{RatingAggregate, RatingSort, RatingsHook};
pub use reading_lists::ReadingListsHook;
pub use reviews::{BulkOutcome, ReviewScope, ReviewSort, ReviewsHook};
pub use shelf::{Shelf, ShelfHook, ShelfSort};
pub use users::{UserSort, UsersHook};
