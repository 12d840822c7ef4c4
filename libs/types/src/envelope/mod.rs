//! Request context and result envelope shared by adapters and their callers

pub mod context;
pub mod pagination;
pub mod result;
