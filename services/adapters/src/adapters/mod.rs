//! Domain adapters, one per bounded context
//!
//! Every public operation of every adapter is a single call into
//! [`BaseAdapter`](crate::common::BaseAdapter); input validation, data access
//! and output validation happen inside the wrapped closure. Data access goes
//! through a store trait so the relational backend stays outside this crate.

pub mod employee;
pub mod recognition;
pub mod social;

pub use employee::{
    CreateEmployeeInput, Employee, EmployeeAdapter, EmployeePatch, EmployeeStore,
    InMemoryEmployeeStore, NewEmployee, UpdateEmployeeInput,
};
pub use recognition::{
    CreateRecognitionInput, InMemoryRecognitionStore, NewRecognition, Recognition,
    RecognitionAdapter, RecognitionStore, RecognitionSummary, RecipientTotal,
};
pub use social::{
    AddCommentInput, Comment, CreatePostInput, InMemorySocialStore, NewComment, NewPost, Post,
    PostType, SocialAdapter, SocialStore,
};

use engage_types::{Page, PaginationParams, SortOrder};
use std::cmp::Ordering;

/// Sort, then cut one page out of an in-memory row set
pub(crate) fn page_of<T, F>(mut rows: Vec<T>, params: &PaginationParams, compare: F) -> Page<T>
where
    F: Fn(&T, &T) -> Ordering,
{
    rows.sort_by(|a, b| match params.sort_order {
        SortOrder::Asc => compare(a, b),
        SortOrder::Desc => compare(b, a),
    });

    let total_count = rows.len() as u64;
    let offset = usize::try_from(params.offset()).unwrap_or(usize::MAX);
    let items = rows
        .into_iter()
        .skip(offset)
        .take(params.limit as usize)
        .collect();

    Page::new(items, total_count)
}
