//! Headless file picker for drivepicker.
//!
//! Drives which listing runs next from the user's navigation and turns a
//! selected file into a local-file descriptor. Rendering is left to the
//! caller, which receives plain rows.

pub mod entry;
pub mod format;
pub mod picker;
pub mod source;

pub use entry::{LocalFile, PickerEntry, Row, RowIcon, GO_UP_ID};
pub use format::{format_modified, format_size};
pub use picker::{Picker, Selection};
pub use source::FileSource;
