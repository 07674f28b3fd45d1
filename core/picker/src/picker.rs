//! Folder navigation state machine.
//!
//! The breadcrumb tail decides the next listing: "My Drive" lists the
//! caller's root, "Shared" lists what was shared with them, and a folder
//! id lists that folder's children behind a "go up" entry.

use tracing::{debug, info};

use drivepicker_common::{Error, NavigationPath, PathEntry, Result, View};
use drivepicker_storage::FileRecord;

use crate::entry::{LocalFile, PickerEntry, Row};
use crate::source::FileSource;

/// Result of pressing an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The path changed and the new listing is loaded.
    Navigated,
    /// A file was downloaded. Ends the picking session.
    Picked(LocalFile),
}

/// Headless navigation controller.
pub struct Picker<S> {
    source: S,
    path: NavigationPath,
    entries: Vec<PickerEntry>,
    loading: bool,
}

impl<S: FileSource> Picker<S> {
    /// Picker positioned at "My Drive". Nothing is loaded until `load`.
    pub fn new(source: S) -> Self {
        Self::with_view(source, View::MyDrive)
    }

    pub fn with_view(source: S, view: View) -> Self {
        Self {
            source,
            path: NavigationPath::new(view),
            entries: Vec::new(),
            loading: false,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn path(&self) -> &NavigationPath {
        &self.path
    }

    pub fn entries(&self) -> &[PickerEntry] {
        &self.entries
    }

    /// Whether a request is outstanding; callers should block input meanwhile.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Display rows for the current entries.
    pub fn rows(&self) -> Vec<Row> {
        self.entries.iter().map(PickerEntry::row).collect()
    }

    /// Labels for the current path, root first.
    pub fn breadcrumbs(&self) -> Vec<String> {
        self.path.entries().iter().map(|e| e.to_string()).collect()
    }

    /// Load the listing for the current path tail.
    ///
    /// On failure the previous entries are kept.
    pub async fn load(&mut self) -> Result<&[PickerEntry]> {
        self.loading = true;
        let fetched = self.fetch().await;
        self.loading = false;

        self.entries = fetched?;
        debug!("Loaded {} entries for {}", self.entries.len(), self.path);
        Ok(&self.entries)
    }

    async fn fetch(&self) -> Result<Vec<PickerEntry>> {
        let entries: Vec<PickerEntry> = match self.path.tail() {
            PathEntry::View(View::MyDrive) => self
                .source
                .list_root_owned()
                .await?
                .map(PickerEntry::File)
                .collect(),
            PathEntry::View(View::Shared) => self
                .source
                .list_shared_with_me()
                .await?
                .map(PickerEntry::File)
                .collect(),
            PathEntry::Folder(id) => {
                let listing = self.source.list_children(id).await?;
                let mut entries = Vec::with_capacity(listing.len() + 1);
                entries.push(PickerEntry::GoUp);
                entries.extend(listing.map(PickerEntry::File));
                entries
            }
        };
        Ok(entries)
    }

    /// Press the entry at `index` in the current listing.
    ///
    /// # Errors
    /// - `InvalidInput` when `index` is out of range
    /// - Listing or download failures, unchanged
    pub async fn press(&mut self, index: usize) -> Result<Selection> {
        let entry = self.entries.get(index).cloned().ok_or_else(|| {
            Error::InvalidInput(format!(
                "No entry {} (listing has {})",
                index,
                self.entries.len()
            ))
        })?;
        self.activate(&entry).await
    }

    /// Act on an entry: go up, open a folder or pick a file.
    pub async fn activate(&mut self, entry: &PickerEntry) -> Result<Selection> {
        match entry {
            PickerEntry::GoUp => {
                let mut path = self.path.clone();
                path.pop();
                self.navigate(path).await?;
                Ok(Selection::Navigated)
            }
            PickerEntry::File(file) if file.is_folder() => {
                let mut path = self.path.clone();
                path.push_folder(file.id.clone())?;
                self.navigate(path).await?;
                Ok(Selection::Navigated)
            }
            PickerEntry::File(file) => self.pick(file).await.map(Selection::Picked),
        }
    }

    async fn pick(&mut self, file: &FileRecord) -> Result<LocalFile> {
        self.loading = true;
        let downloaded = self.source.download_file(file).await;
        self.loading = false;

        let location = downloaded?;
        info!("Picked {} at {}", file.name, location);
        Ok(LocalFile::from_record(location, file))
    }

    /// Jump to a top-level view and load it.
    pub async fn switch_view(&mut self, view: View) -> Result<&[PickerEntry]> {
        let mut path = self.path.clone();
        path.reset(view);
        self.navigate(path).await?;
        Ok(&self.entries)
    }

    /// Move to `path` and load it. On failure both the path and the
    /// entries stay as they were.
    async fn navigate(&mut self, path: NavigationPath) -> Result<()> {
        let previous = std::mem::replace(&mut self.path, path);
        let loaded = self.load().await.map(|_| ());
        if loaded.is_err() {
            self.path = previous;
        }
        loaded
    }
}
