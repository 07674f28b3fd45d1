//! Common utilities and types shared across the drivepicker crates.
//!
//! This module provides the error taxonomy used by every layer and the
//! breadcrumb path type that decides which listing runs next.

pub mod error;
pub mod types;

pub use error::{AuthError, DownloadError, Error, ListError, Result};
pub use types::{NavigationPath, PathEntry, View};
