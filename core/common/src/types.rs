//! Navigation types shared by the client and the picker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level listing view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum View {
    /// Items owned by the caller at the root of their drive.
    MyDrive,
    /// Items other users shared with the caller.
    Shared,
}

impl View {
    /// Breadcrumb label for the view.
    pub fn label(&self) -> &'static str {
        match self {
            View::MyDrive => "My Drive",
            View::Shared => "Shared",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One breadcrumb: either a view marker or a folder id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathEntry {
    View(View),
    Folder(String),
}

impl PathEntry {
    /// Whether this entry is one of the two top-level views.
    pub fn is_view(&self) -> bool {
        matches!(self, PathEntry::View(_))
    }
}

impl fmt::Display for PathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathEntry::View(view) => write!(f, "{}", view),
            PathEntry::Folder(id) => write!(f, "{}", id),
        }
    }
}

/// Breadcrumb stack of visited folders.
///
/// The first entry is always a view marker and the path is never empty:
/// popping the last remaining entry is a no-op. Serialized as the plain
/// list of entries; deserializing checks the same rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<PathEntry>", into = "Vec<PathEntry>")]
pub struct NavigationPath {
    entries: Vec<PathEntry>,
}

impl NavigationPath {
    /// Create a path positioned at the given view.
    pub fn new(view: View) -> Self {
        Self {
            entries: vec![PathEntry::View(view)],
        }
    }

    /// Path positioned at "My Drive".
    pub fn my_drive() -> Self {
        Self::new(View::MyDrive)
    }

    /// Descend into a folder.
    ///
    /// # Errors
    /// - Returns error if `folder_id` is empty
    pub fn push_folder(&mut self, folder_id: impl Into<String>) -> crate::Result<()> {
        let folder_id = folder_id.into();
        if folder_id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Folder id cannot be empty".to_string(),
            ));
        }
        self.entries.push(PathEntry::Folder(folder_id));
        Ok(())
    }

    /// Go up one level.
    ///
    /// Returns the removed entry, or `None` when already at the top.
    pub fn pop(&mut self) -> Option<PathEntry> {
        if self.entries.len() > 1 {
            self.entries.pop()
        } else {
            None
        }
    }

    /// Replace the whole path with a single view marker.
    pub fn reset(&mut self, view: View) {
        self.entries.clear();
        self.entries.push(PathEntry::View(view));
    }

    /// The entry that decides which listing runs next.
    pub fn tail(&self) -> &PathEntry {
        // Never empty: constructed with one entry and pop keeps one.
        &self.entries[self.entries.len() - 1]
    }

    /// The view this path started from.
    pub fn view(&self) -> View {
        match &self.entries[0] {
            PathEntry::View(view) => *view,
            PathEntry::Folder(_) => View::MyDrive,
        }
    }

    /// Whether the tail is a top-level view.
    pub fn is_top_level(&self) -> bool {
        self.tail().is_view()
    }

    /// Number of entries, always at least one.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// All entries, root first.
    pub fn entries(&self) -> &[PathEntry] {
        &self.entries
    }
}

impl TryFrom<Vec<PathEntry>> for NavigationPath {
    type Error = crate::Error;

    fn try_from(entries: Vec<PathEntry>) -> crate::Result<Self> {
        match entries.first() {
            Some(PathEntry::View(_)) => {}
            Some(PathEntry::Folder(_)) => {
                return Err(crate::Error::InvalidInput(
                    "Path must start with a view".to_string(),
                ))
            }
            None => {
                return Err(crate::Error::InvalidInput(
                    "Path cannot be empty".to_string(),
                ))
            }
        }
        if entries[1..].iter().any(|e| match e {
            PathEntry::View(_) => true,
            PathEntry::Folder(id) => id.is_empty(),
        }) {
            return Err(crate::Error::InvalidInput(
                "Only the first entry may be a view and folder ids cannot be empty".to_string(),
            ));
        }
        Ok(Self { entries })
    }
}

impl From<NavigationPath> for Vec<PathEntry> {
    fn from(path: NavigationPath) -> Self {
        path.entries
    }
}

impl Default for NavigationPath {
    fn default() -> Self {
        Self::my_drive()
    }
}

impl fmt::Display for NavigationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.entries.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", labels.join(" / "))
    }
}
