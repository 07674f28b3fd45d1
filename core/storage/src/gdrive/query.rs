//! Listing query construction.
//!
//! Every view is one `ListQuery` built from a set of conditions. The
//! mimetype filter, field projection, ordering and page size are fixed.

use drivepicker_common::{PathEntry, View};

/// Reserved MIME type identifying a folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
/// The only non-folder type a listing returns.
pub const PDF_MIME_TYPE: &str = "application/pdf";
/// Single page, no cursor tracking.
pub const PAGE_SIZE: u32 = 100;
/// Field projection requested for every listing.
pub const LIST_FIELDS: &str =
    "nextPageToken,files(mimeType,id,name,webContentLink,trashed,modifiedTime,size)";

/// One clause of the `q` predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    /// `'me' in owners`
    OwnedByMe,
    /// `'root' in parents`
    InRoot,
    /// `sharedWithMe`
    SharedWithMe,
    /// `'<id>' in parents`
    InFolder(String),
}

impl Condition {
    /// Render the clause in Drive query syntax.
    pub fn to_clause(&self) -> String {
        match self {
            Condition::OwnedByMe => "'me' in owners".to_string(),
            Condition::InRoot => "'root' in parents".to_string(),
            Condition::SharedWithMe => "sharedWithMe".to_string(),
            Condition::InFolder(id) => format!("'{}' in parents", escape_literal(id)),
        }
    }
}

/// Escape a value for use inside a single-quoted query literal.
fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// The fixed folder-or-PDF restriction.
pub fn mime_filter() -> String {
    format!(
        "(mimeType='{}' or mimeType='{}')",
        PDF_MIME_TYPE, FOLDER_MIME_TYPE
    )
}

/// A parameterised listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    conditions: Vec<Condition>,
}

impl ListQuery {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    /// Direct children of the drive root owned by the caller.
    pub fn root_owned() -> Self {
        Self::new(vec![Condition::OwnedByMe, Condition::InRoot])
    }

    /// Everything shared with the caller, any location.
    pub fn shared_with_me() -> Self {
        Self::new(vec![Condition::SharedWithMe])
    }

    /// Direct children of `folder_id`.
    pub fn children(folder_id: impl Into<String>) -> Self {
        Self::new(vec![Condition::InFolder(folder_id.into())])
    }

    /// Query selected by a breadcrumb tail.
    pub fn for_entry(entry: &PathEntry) -> Self {
        match entry {
            PathEntry::View(View::MyDrive) => Self::root_owned(),
            PathEntry::View(View::Shared) => Self::shared_with_me(),
            PathEntry::Folder(id) => Self::children(id.clone()),
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// The `q` predicate: view conditions ANDed together, then ANDed with
    /// the mimetype filter.
    pub fn filter(&self) -> String {
        let mut clauses: Vec<String> = self.conditions.iter().map(Condition::to_clause).collect();
        clauses.push(mime_filter());
        clauses.join(" and ")
    }

    /// Query-string parameters for the listing request.
    pub fn params(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("key", api_key.to_string()),
            ("pageSize", PAGE_SIZE.to_string()),
            ("spaces", "drive".to_string()),
            ("orderBy", "folder".to_string()),
            ("fields", LIST_FIELDS.to_string()),
            ("q", self.filter()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MIME_FILTER: &str =
        "(mimeType='application/pdf' or mimeType='application/vnd.google-apps.folder')";

    fn param<'a>(params: &'a [(&'static str, String)], name: &str) -> &'a str {
        params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
            .unwrap()
    }

    #[test]
    fn test_root_owned_filter() {
        assert_eq!(
            ListQuery::root_owned().filter(),
            format!("'me' in owners and 'root' in parents and {}", MIME_FILTER)
        );
    }

    #[test]
    fn test_shared_filter() {
        assert_eq!(
            ListQuery::shared_with_me().filter(),
            format!("sharedWithMe and {}", MIME_FILTER)
        );
    }

    #[test]
    fn test_children_filter() {
        assert_eq!(
            ListQuery::children("F1").filter(),
            format!("'F1' in parents and {}", MIME_FILTER)
        );
    }

    #[test]
    fn test_children_escapes_quotes() {
        let filter = ListQuery::children("it's").filter();
        assert!(filter.starts_with("'it\\'s' in parents"));
    }

    #[test]
    fn test_fixed_params() {
        let params = ListQuery::root_owned().params("my-key");
        let names: Vec<&str> = params.iter().map(|(k, _)| *k).collect();
        assert_eq!(names, ["key", "pageSize", "spaces", "orderBy", "fields", "q"]);
        assert_eq!(param(&params, "key"), "my-key");
        assert_eq!(param(&params, "pageSize"), "100");
        assert_eq!(param(&params, "spaces"), "drive");
        assert_eq!(param(&params, "orderBy"), "folder");
        assert_eq!(param(&params, "fields"), LIST_FIELDS);
    }

    #[test]
    fn test_for_entry_dispatch() {
        assert_eq!(
            ListQuery::for_entry(&PathEntry::View(View::MyDrive)),
            ListQuery::root_owned()
        );
        assert_eq!(
            ListQuery::for_entry(&PathEntry::View(View::Shared)),
            ListQuery::shared_with_me()
        );
        assert_eq!(
            ListQuery::for_entry(&PathEntry::Folder("abc".to_string())),
            ListQuery::children("abc")
        );
    }

    fn entry() -> impl Strategy<Value = PathEntry> {
        prop_oneof![
            Just(PathEntry::View(View::MyDrive)),
            Just(PathEntry::View(View::Shared)),
            ".{1,40}".prop_map(PathEntry::Folder),
        ]
    }

    proptest! {
        #[test]
        fn prop_every_query_is_restricted(entry in entry(), key in "[A-Za-z0-9]{0,20}") {
            let params = ListQuery::for_entry(&entry).params(&key);
            prop_assert_eq!(param(&params, "fields"), LIST_FIELDS);
            let q = param(&params, "q");
            let suffix = format!(" and {}", MIME_FILTER);
            prop_assert!(q.ends_with(&suffix));
        }
    }
}
