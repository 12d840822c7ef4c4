//! Identifier types shared by every adapter and collaborator

pub mod errors;
pub mod identifiers;
