//! # Engage Types
//!
//! Shared types for the Engage adapter layer and the route handlers that call
//! into it.
//!
//! ## Contents
//!
//! - **Typed identifiers**: `UserId`, `OrganizationId`, `EmployeeId`, ... so ids
//!   from different tables cannot be mixed up
//! - **AdapterContext**: per-request data used for feature-flag evaluation and
//!   log correlation
//! - **AdapterResult / PaginatedResult**: the uniform envelope every adapter
//!   operation returns, with execution metadata
//!
//! ## Usage
//!
//! ```rust
//! use engage_types::{AdapterContext, AdapterResult, OrganizationId, UserId};
//!
//! let ctx = AdapterContext::for_user(UserId::new(7), OrganizationId::new(42));
//! assert!(ctx.request_id.starts_with("req_"));
//!
//! let result = AdapterResult::ok("done");
//! assert!(result.is_success());
//! ```

pub mod common;
pub mod envelope;

pub use common::errors::ValidationError;
pub use common::identifiers::{
    positive_id, CommentId, EmployeeId, OrganizationId, PostId, RecognitionId, UserId,
};
pub use envelope::context::{generate_request_id, AdapterContext};
pub use envelope::pagination::{
    Page, PaginatedResult, Pagination, PaginationParams, SortOrder, DEFAULT_LIMIT, DEFAULT_PAGE,
    MAX_LIMIT,
};
pub use envelope::result::{AdapterResult, ErrorInfo, ResultMetadata};
