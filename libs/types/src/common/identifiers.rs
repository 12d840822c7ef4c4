//! # Typed Identifiers
//!
//! Zero-cost wrappers for the `u64` database identifiers that flow through the
//! adapter layer. Every entity gets its own type so that a user id can never
//! be passed where an organization id is expected.
//!
//! ```rust
//! use engage_types::{EmployeeId, OrganizationId};
//!
//! fn transfer(employee: EmployeeId, to: OrganizationId) { /* ... */ }
//!
//! let employee = EmployeeId::new(12);
//! let org = OrganizationId::new(42);
//! transfer(employee, org);
//! // transfer(org, employee); // compile error
//! ```
//!
//! Raw ids usually arrive from route parameters as signed integers;
//! [`positive_id`] rejects zero and negative values before a typed id is built.

use crate::common::errors::ValidationError;

/// Macro for generating typed `u64` identifier wrappers
///
/// Generated types serialize transparently as the raw number, display as
/// `Name(123)` for logging, and convert to and from `u64`.
#[macro_export]
macro_rules! define_typed_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create a new typed ID
            #[inline(always)]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Extract the inner u64 value
            #[inline(always)]
            pub const fn inner(&self) -> u64 {
                self.0
            }

            /// Check if this is a null/zero ID
            #[inline(always)]
            pub fn is_null(&self) -> bool {
                self.0 == 0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<u64> for $name {
            #[inline(always)]
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            #[inline(always)]
            fn from(id: $name) -> u64 {
                id.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                u64::deserialize(deserializer).map(Self)
            }
        }
    };
}

define_typed_id!(
    /// Authenticated user performing a request
    UserId
);

define_typed_id!(
    /// Tenant organization; feature-flag overrides are scoped by it
    OrganizationId
);

define_typed_id!(
    /// Employee record
    EmployeeId
);

define_typed_id!(
    /// Peer recognition record
    RecognitionId
);

define_typed_id!(
    /// Social feed post
    PostId
);

define_typed_id!(
    /// Comment on a social feed post
    CommentId
);

/// Parse a raw id, used by validation schemas that accept either signed or
/// unsigned inputs.
pub fn positive_id(raw: i64) -> Result<u64, ValidationError> {
    if raw <= 0 {
        if raw == 0 {
            return Err(ValidationError::NullId);
        }
        return Err(ValidationError::Negative { value: raw });
    }
    Ok(raw as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_ids_display_and_convert() {
        let org = OrganizationId::new(42);
        assert_eq!(org.to_string(), "OrganizationId(42)");
        assert_eq!(u64::from(org), 42);
        assert_eq!(OrganizationId::from(42), org);
    }

    #[test]
    fn test_transparent_serde() {
        let id = PostId::new(9);
        assert_eq!(serde_json::to_string(&id).unwrap(), "9");
        let back: PostId = serde_json::from_str("9").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_positive_id() {
        assert_eq!(positive_id(5), Ok(5));
        assert_eq!(positive_id(0), Err(ValidationError::NullId));
        assert_eq!(positive_id(-3), Err(ValidationError::Negative { value: -3 }));
    }
}
