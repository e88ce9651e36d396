//! Utility functions for common operations.
//!
//! This module provides reusable helpers for:
//!
//! - **Text processing**: whitespace normalization, CJK-aware word counting,
//!   and summary extraction
//! - **Date parsing**: permissive parsing of the timestamp formats feeds
//!   actually emit
//!
//! # Examples
//!
//! ```
//! use pulsefeed::util::{clean_text, count_words};
//!
//! assert_eq!(clean_text("  spaced   out \n title "), "spaced out title");
//! assert_eq!(count_words("hello 世界"), 3); // 1 token + 2 ideographs
//! ```

mod text;

pub use text::{clean_text, count_words, parse_date, summarize};
