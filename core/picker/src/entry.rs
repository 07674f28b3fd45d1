//! Picker entries and the descriptor handed back to the caller.

use serde::{Deserialize, Serialize};

use drivepicker_storage::FileRecord;

use crate::format::{format_modified, format_size};

/// Reserved id of the "go up" entry.
pub const GO_UP_ID: &str = "PREVIOUS";

/// One entry in the current listing.
#[derive(Debug, Clone, PartialEq)]
pub enum PickerEntry {
    /// Synthetic entry that navigates to the parent folder.
    GoUp,
    /// A real remote file or folder.
    File(FileRecord),
}

impl PickerEntry {
    pub fn id(&self) -> &str {
        match self {
            PickerEntry::GoUp => GO_UP_ID,
            PickerEntry::File(file) => &file.id,
        }
    }

    pub fn is_go_up(&self) -> bool {
        matches!(self, PickerEntry::GoUp)
    }

    pub fn is_folder(&self) -> bool {
        match self {
            PickerEntry::GoUp => false,
            PickerEntry::File(file) => file.is_folder(),
        }
    }

    /// Presentation-neutral row for this entry.
    pub fn row(&self) -> Row {
        match self {
            PickerEntry::GoUp => Row {
                icon: RowIcon::Folder,
                title: "..".to_string(),
                subtitle: String::new(),
            },
            PickerEntry::File(file) => {
                let time = format_modified(file.modified_time);
                if file.is_folder() {
                    Row {
                        icon: RowIcon::Folder,
                        title: file.name.clone(),
                        subtitle: time,
                    }
                } else {
                    Row {
                        icon: RowIcon::File,
                        title: file.name.clone(),
                        subtitle: format!("{} | {}", time, format_size(file.size)),
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowIcon {
    Folder,
    File,
}

/// Display data for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub icon: RowIcon,
    pub title: String,
    pub subtitle: String,
}

/// A picked file, available in local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFile {
    /// Location identifier returned by the download facility.
    pub location: String,
    pub display_name: String,
    pub mime_type: String,
    pub size_bytes: Option<u64>,
}

impl LocalFile {
    pub fn from_record(location: String, file: &FileRecord) -> Self {
        Self {
            location,
            display_name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size_bytes: file.size,
        }
    }
}
