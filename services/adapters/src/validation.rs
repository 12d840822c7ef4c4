//! # Adapter Validation
//!
//! Schema-based validation for adapter inputs and outputs. A [`Schema`] turns
//! raw input into a validated (and possibly defaulted / normalized) value or
//! reports every violation it found. [`AdapterValidator`] converts violations
//! into [`AdapterError::Validation`], whose message reads
//! `Validation failed: <path>: <message>; ...`.
//!
//! ```rust
//! use adapter_service::validation::{AdapterValidator, EmailSchema};
//!
//! let email = AdapterValidator::validate(&EmailSchema, " Ada@Example.COM ").unwrap();
//! assert_eq!(email, "ada@example.com");
//!
//! let err = AdapterValidator::validate(&EmailSchema, "nope").unwrap_err();
//! assert!(err.to_string().starts_with("Validation failed: "));
//! ```
//!
//! Reusable constraints live here (ids, emails, bounded text, pagination);
//! entity schemas live next to the adapter that owns the entity and are built
//! from a [`ViolationCollector`].

use engage_types::{
    positive_id, PaginationParams, SortOrder, DEFAULT_LIMIT, DEFAULT_PAGE, MAX_LIMIT,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{AdapterError, Result};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// A single failed constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Field path, e.g. `email` or `pagination.limit`
    pub path: String,
    /// What was wrong
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// All violations reported by one schema run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolations(pub Vec<SchemaViolation>);

impl fmt::Display for SchemaViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join("; "))
    }
}

impl std::error::Error for SchemaViolations {}

impl SchemaViolations {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![SchemaViolation {
            path: path.into(),
            message: message.into(),
        }])
    }
}

/// Validation schema from raw input `I` to a validated output
pub trait Schema<I> {
    /// Parsed / coerced value
    type Output;

    /// Validate `input`, reporting every violation found
    fn parse(&self, input: I) -> std::result::Result<Self::Output, SchemaViolations>;
}

/// Entry point used by every adapter operation
pub struct AdapterValidator;

impl AdapterValidator {
    /// Run `schema` over `data`
    pub fn validate<S, I>(schema: &S, data: I) -> Result<S::Output>
    where
        S: Schema<I>,
    {
        schema
            .parse(data)
            .map_err(|violations| AdapterError::Validation(violations.to_string()))
    }

    /// `None` passes through without running the schema
    pub fn optional<S, I>(schema: &S, data: Option<I>) -> Result<Option<S::Output>>
    where
        S: Schema<I>,
    {
        match data {
            None => Ok(None),
            Some(value) => Self::validate(schema, value).map(Some),
        }
    }
}

/// Inclusive character-length bounds for text fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextBounds {
    pub min: usize,
    pub max: usize,
}

impl TextBounds {
    /// Names: 1 to 100 characters
    pub const NAME: TextBounds = TextBounds { min: 1, max: 100 };
    /// Titles and job titles: 1 to 200 characters
    pub const TITLE: TextBounds = TextBounds { min: 1, max: 200 };
    /// Free-form descriptions: up to 1000 characters
    pub const DESCRIPTION: TextBounds = TextBounds { min: 0, max: 1000 };
    /// Post and comment bodies: 1 to 5000 characters
    pub const BODY: TextBounds = TextBounds { min: 1, max: 5000 };
}

/// Accumulates violations while an entity schema checks its fields
#[derive(Debug, Default)]
pub struct ViolationCollector {
    violations: Vec<SchemaViolation>,
}

impl ViolationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation
    pub fn push(&mut self, path: &str, message: impl Into<String>) {
        self.violations.push(SchemaViolation {
            path: path.to_string(),
            message: message.into(),
        });
    }

    /// Record a violation unless `condition` holds
    pub fn ensure(&mut self, condition: bool, path: &str, message: impl Into<String>) {
        if !condition {
            self.push(path, message);
        }
    }

    /// Positive-integer id
    pub fn id<T: From<u64>>(&mut self, path: &str, raw: i64) -> T {
        match positive_id(raw) {
            Ok(id) => T::from(id),
            Err(_) => {
                self.push(path, format!("must be a positive integer (got {})", raw));
                T::from(0)
            }
        }
    }

    /// Trimmed text within `bounds`
    pub fn text(&mut self, path: &str, raw: &str, bounds: TextBounds) -> String {
        let trimmed = raw.trim();
        let len = trimmed.chars().count();
        if len < bounds.min {
            if bounds.min == 1 {
                self.push(path, "is required");
            } else {
                self.push(path, format!("must be at least {} characters", bounds.min));
            }
        } else if len > bounds.max {
            self.push(path, format!("must be at most {} characters", bounds.max));
        }
        trimmed.to_string()
    }

    /// Optional trimmed text; empty strings collapse to `None`
    pub fn optional_text(
        &mut self,
        path: &str,
        raw: Option<&str>,
        bounds: TextBounds,
    ) -> Option<String> {
        let raw = raw?;
        if raw.trim().is_empty() {
            return None;
        }
        Some(self.text(path, raw, bounds))
    }

    /// Lowercased, trimmed email address
    pub fn email(&mut self, path: &str, raw: &str) -> String {
        let normalized = raw.trim().to_lowercase();
        if normalized.chars().count() > 254 || !EMAIL_PATTERN.is_match(&normalized) {
            self.push(path, "must be a valid email address");
        }
        normalized
    }

    /// Integer within an inclusive range
    pub fn range(&mut self, path: &str, value: i64, min: i64, max: i64) -> i64 {
        if value < min || value > max {
            self.push(path, format!("must be between {} and {} (got {})", min, max, value));
        }
        value
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Return `value` if nothing was recorded, otherwise every violation
    pub fn finish<T>(self, value: T) -> std::result::Result<T, SchemaViolations> {
        if self.violations.is_empty() {
            Ok(value)
        } else {
            Err(SchemaViolations(self.violations))
        }
    }
}

/// Positive-integer id, typed on output
pub struct IdSchema<T> {
    path: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> IdSchema<T> {
    pub const fn new(path: &'static str) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }
}

impl<T: From<u64>> Schema<i64> for IdSchema<T> {
    type Output = T;

    fn parse(&self, input: i64) -> std::result::Result<T, SchemaViolations> {
        let mut v = ViolationCollector::new();
        let id = v.id(self.path, input);
        v.finish(id)
    }
}

impl<T: From<u64>> Schema<u64> for IdSchema<T> {
    type Output = T;

    fn parse(&self, input: u64) -> std::result::Result<T, SchemaViolations> {
        if input == 0 {
            return Err(SchemaViolations::single(self.path, "must be a positive integer (got 0)"));
        }
        Ok(T::from(input))
    }
}

/// Email address
pub struct EmailSchema;

impl Schema<&str> for EmailSchema {
    type Output = String;

    fn parse(&self, input: &str) -> std::result::Result<String, SchemaViolations> {
        let mut v = ViolationCollector::new();
        let email = v.email("email", input);
        v.finish(email)
    }
}

/// Bounded-length text field
pub struct TextSchema {
    pub path: &'static str,
    pub bounds: TextBounds,
}

impl Schema<&str> for TextSchema {
    type Output = String;

    fn parse(&self, input: &str) -> std::result::Result<String, SchemaViolations> {
        let mut v = ViolationCollector::new();
        let text = v.text(self.path, input, self.bounds);
        v.finish(text)
    }
}

/// Raw pagination parameters as received from a query string
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInput {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Pagination with defaults `page=1`, `limit=50` (max 100), `sort_order=desc`
pub struct PaginationSchema;

impl Schema<PaginationInput> for PaginationSchema {
    type Output = PaginationParams;

    fn parse(
        &self,
        input: PaginationInput,
    ) -> std::result::Result<PaginationParams, SchemaViolations> {
        let mut v = ViolationCollector::new();

        let page = input.page.unwrap_or(i64::from(DEFAULT_PAGE));
        v.ensure(page >= 1, "page", format!("must be at least 1 (got {})", page));
        v.ensure(
            page <= i64::from(u32::MAX),
            "page",
            format!("must be at most {} (got {})", u32::MAX, page),
        );

        let limit = input.limit.unwrap_or(i64::from(DEFAULT_LIMIT));
        v.range("limit", limit, 1, i64::from(MAX_LIMIT));

        let sort_order = match input.sort_order.as_deref().map(str::to_ascii_lowercase) {
            None => SortOrder::Desc,
            Some(ref s) if s == "asc" => SortOrder::Asc,
            Some(ref s) if s == "desc" => SortOrder::Desc,
            Some(other) => {
                v.push("sortOrder", format!("must be 'asc' or 'desc' (got '{}')", other));
                SortOrder::Desc
            }
        };

        let sort_by = input
            .sort_by
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        // Out-of-range values were recorded above; `finish` discards these defaults
        v.finish(PaginationParams {
            page: u32::try_from(page).unwrap_or(DEFAULT_PAGE),
            limit: u32::try_from(limit).unwrap_or(DEFAULT_LIMIT),
            sort_by,
            sort_order,
        })
    }
}

/// Reject a `sort_by` the operation does not know how to order by
pub fn validate_sort_field(params: &PaginationParams, allowed: &[&str]) -> Result<()> {
    match params.sort_by.as_deref() {
        Some(field) if !allowed.contains(&field) => Err(AdapterError::Validation(format!(
            "sortBy: must be one of {} (got '{}')",
            allowed.join(", "),
            field
        ))),
        _ => Ok(()),
    }
}
