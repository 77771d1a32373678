//! Record schema declarations: key templates, per-record metadata, and the
//! registration machinery that validates and finalizes them.

/// Key definitions and scalar type coercion.
pub mod key;

/// Finalized per-record metadata resolved at registration time.
pub mod metadata;

/// Record type registration, validation, and inheritance.
pub mod registry;

/// Key template parsing, substitution, and inverse parsing.
pub mod template;
