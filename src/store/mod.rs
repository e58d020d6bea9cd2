//! In-memory hierarchical record store.
//!
//! Groups and records live in flat arenas and refer to each other by
//! [`GroupId`]/[`RecordId`]. The store is built once (from code or a
//! [`GroupSnapshot`]) and is never mutated while a scan reads it, so it is
//! shared with scan tasks behind an `Arc` without any locking.

mod snapshot;

pub use snapshot::{GroupSnapshot, RecordSnapshot};

use crate::error::{StoreError, StoreResult};
use crate::types::{GroupId, RecordId};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

pub const TITLE_FIELD: &str = "Title";
pub const USER_NAME_FIELD: &str = "UserName";
pub const PASSWORD_FIELD: &str = "Password";
pub const URL_FIELD: &str = "URL";
pub const NOTES_FIELD: &str = "Notes";

/// Separator placed between ancestor names in a group path.
pub const GROUP_PATH_SEPARATOR: char = '\\';

/// Classification of a field name into the standard fields and the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Title,
    UserName,
    Password,
    Url,
    Notes,
    /// Any custom field.
    Other,
}

impl FieldKind {
    #[must_use]
    pub fn of(name: &str) -> Self {
        match name {
            TITLE_FIELD => Self::Title,
            USER_NAME_FIELD => Self::UserName,
            PASSWORD_FIELD => Self::Password,
            URL_FIELD => Self::Url,
            NOTES_FIELD => Self::Notes,
            _ => Self::Other,
        }
    }
}

/// Per-group search setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchEnabled {
    Enabled,
    Disabled,
    /// Defer to the parent group; the root defaults to enabled.
    #[default]
    Inherit,
}

impl SearchEnabled {
    /// Effective setting of a group whose parent resolved to `parent_enabled`.
    #[must_use]
    pub fn resolve(self, parent_enabled: bool) -> bool {
        match self {
            Self::Enabled => true,
            Self::Disabled => false,
            Self::Inherit => parent_enabled,
        }
    }
}

impl From<Option<bool>> for SearchEnabled {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Enabled,
            Some(false) => Self::Disabled,
            None => Self::Inherit,
        }
    }
}

/// One entry of the store.
#[derive(Debug, Clone)]
pub struct Record {
    id: RecordId,
    parent: GroupId,
    fields: Vec<(String, String)>,
    tags: Vec<String>,
    expires: bool,
    expiry_time: Option<DateTime<Utc>>,
}

impl Record {
    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    #[must_use]
    pub fn parent(&self) -> GroupId {
        self.parent
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.field(TITLE_FIELD).unwrap_or_default()
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn expires(&self) -> bool {
        self.expires
    }

    #[must_use]
    pub fn expiry_time(&self) -> Option<DateTime<Utc>> {
        self.expiry_time
    }

    /// True when the record is marked as expiring and `now` is past its expiry.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires && self.expiry_time.is_some_and(|t| now > t)
    }
}

/// Builder for records added through [`RecordStore::add_record`].
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    fields: Vec<(String, String)>,
    tags: Vec<String>,
    expires: bool,
    expiry_time: Option<DateTime<Utc>>,
}

impl NewRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing an earlier value with the same name.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    #[must_use]
    pub fn title(self, value: impl Into<String>) -> Self {
        self.field(TITLE_FIELD, value)
    }

    #[must_use]
    pub fn user_name(self, value: impl Into<String>) -> Self {
        self.field(USER_NAME_FIELD, value)
    }

    #[must_use]
    pub fn password(self, value: impl Into<String>) -> Self {
        self.field(PASSWORD_FIELD, value)
    }

    #[must_use]
    pub fn url(self, value: impl Into<String>) -> Self {
        self.field(URL_FIELD, value)
    }

    #[must_use]
    pub fn notes(self, value: impl Into<String>) -> Self {
        self.field(NOTES_FIELD, value)
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Marks the record as expiring at `at`.
    #[must_use]
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires = true;
        self.expiry_time = Some(at);
        self
    }

    /// Overrides the expiry flag while keeping any timestamp.
    #[must_use]
    pub fn expires(mut self, expires: bool) -> Self {
        self.expires = expires;
        self
    }
}

/// Node of the group hierarchy.
#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    name: String,
    search_enabled: SearchEnabled,
    parent: Option<GroupId>,
    groups: Vec<GroupId>,
    records: Vec<RecordId>,
}

impl Group {
    #[must_use]
    pub fn id(&self) -> GroupId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn search_enabled(&self) -> SearchEnabled {
        self.search_enabled
    }

    #[must_use]
    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    #[must_use]
    pub fn groups(&self) -> &[GroupId] {
        &self.groups
    }

    #[must_use]
    pub fn records(&self) -> &[RecordId] {
        &self.records
    }
}

/// Arena-backed tree of groups and records.
#[derive(Debug, Clone)]
pub struct RecordStore {
    groups: Vec<Group>,
    records: Vec<Record>,
}

impl RecordStore {
    /// Creates a store holding only a root group.
    #[must_use]
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            groups: vec![Group {
                id: GroupId::new(0),
                name: root_name.into(),
                search_enabled: SearchEnabled::Inherit,
                parent: None,
                groups: Vec::new(),
                records: Vec::new(),
            }],
            records: Vec::new(),
        }
    }

    #[must_use]
    pub fn root(&self) -> GroupId {
        GroupId::new(0)
    }

    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.index())
    }

    #[must_use]
    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.get(id.index())
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Adds a child group under `parent`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownGroup` if `parent` is not in this store.
    pub fn add_group(&mut self, parent: GroupId, name: impl Into<String>) -> StoreResult<GroupId> {
        self.group(parent).ok_or(StoreError::UnknownGroup(parent))?;
        let id = GroupId::new(self.next_group_slot()?);
        self.groups.push(Group {
            id,
            name: name.into(),
            search_enabled: SearchEnabled::Inherit,
            parent: Some(parent),
            groups: Vec::new(),
            records: Vec::new(),
        });
        self.groups[parent.index()].groups.push(id);
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns `StoreError::UnknownGroup` if `group` is not in this store.
    pub fn set_search_enabled(
        &mut self,
        group: GroupId,
        value: SearchEnabled,
    ) -> StoreResult<()> {
        let slot = self
            .groups
            .get_mut(group.index())
            .ok_or(StoreError::UnknownGroup(group))?;
        slot.search_enabled = value;
        Ok(())
    }

    /// Adds a record to `group`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UnknownGroup` if `group` is not in this store.
    pub fn add_record(&mut self, group: GroupId, record: NewRecord) -> StoreResult<RecordId> {
        self.group(group).ok_or(StoreError::UnknownGroup(group))?;
        let slot = u32::try_from(self.records.len())
            .map_err(|_| StoreError::InvalidSnapshot("too many records".to_string()))?;
        let id = RecordId::new(slot);
        self.records.push(Record {
            id,
            parent: group,
            fields: record.fields,
            tags: record.tags,
            expires: record.expires,
            expiry_time: record.expiry_time,
        });
        self.groups[group.index()].records.push(id);
        Ok(id)
    }

    fn next_group_slot(&self) -> StoreResult<u32> {
        u32::try_from(self.groups.len())
            .map_err(|_| StoreError::InvalidSnapshot("too many groups".to_string()))
    }

    /// Builds the searchable path string of `group`.
    ///
    /// With `full == false` this is just the group's own name. Otherwise every
    /// ancestor name (root included) is prepended, separated by
    /// [`GROUP_PATH_SEPARATOR`].
    #[must_use]
    pub fn group_path(&self, group: GroupId, full: bool) -> String {
        let Some(start) = self.group(group) else {
            return String::new();
        };
        let mut path = start.name.clone();
        if !full {
            return path;
        }
        let mut current = start.parent.and_then(|p| self.group(p));
        while let Some(g) = current {
            path.insert(0, GROUP_PATH_SEPARATOR);
            path.insert_str(0, &g.name);
            current = g.parent.and_then(|p| self.group(p));
        }
        path
    }

    /// Lists every record, group by group in breadth-first order.
    ///
    /// Group search settings are ignored: this is the unfiltered list shown
    /// when no search is active.
    #[must_use]
    pub fn all_records_breadth_first(&self) -> Vec<RecordId> {
        let mut out = Vec::with_capacity(self.records.len());
        let mut queue = VecDeque::from([self.root()]);
        while let Some(id) = queue.pop_front() {
            if let Some(group) = self.group(id) {
                queue.extend(group.groups.iter().copied());
                out.extend(group.records.iter().copied());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn nested() -> (RecordStore, GroupId, GroupId, GroupId) {
        let mut store = RecordStore::new("Root");
        let a = store.add_group(store.root(), "Work").unwrap();
        let b = store.add_group(a, "Servers").unwrap();
        let c = store.add_group(b, "Linux").unwrap();
        (store, a, b, c)
    }

    #[test]
    fn test_field_kind() {
        assert_eq!(FieldKind::of("Title"), FieldKind::Title);
        assert_eq!(FieldKind::of("URL"), FieldKind::Url);
        assert_eq!(FieldKind::of("title"), FieldKind::Other);
        assert_eq!(FieldKind::of("PIN"), FieldKind::Other);
    }

    #[test]
    fn test_group_path() {
        let (store, a, _, c) = nested();
        assert_eq!(store.group_path(c, false), "Linux");
        assert_eq!(store.group_path(c, true), "Root\\Work\\Servers\\Linux");
        assert_eq!(store.group_path(a, true), "Root\\Work");
        assert_eq!(store.group_path(store.root(), true), "Root");
    }

    #[test]
    fn test_search_enabled_resolves_against_parent() {
        assert!(SearchEnabled::Enabled.resolve(false));
        assert!(!SearchEnabled::Disabled.resolve(true));
        assert!(SearchEnabled::Inherit.resolve(true));
        assert!(!SearchEnabled::Inherit.resolve(false));

        let (mut store, a, _, c) = nested();
        store.set_search_enabled(a, SearchEnabled::Disabled).unwrap();
        assert_eq!(store.group(a).unwrap().search_enabled(), SearchEnabled::Disabled);
        assert_eq!(store.group(c).unwrap().search_enabled(), SearchEnabled::Inherit);
    }

    #[test]
    fn test_breadth_first_listing() {
        let (mut store, a, b, _) = nested();
        let deep = store.add_record(b, NewRecord::new().title("deep")).unwrap();
        let top = store.add_record(store.root(), NewRecord::new().title("top")).unwrap();
        let mid = store.add_record(a, NewRecord::new().title("mid")).unwrap();

        assert_eq!(store.all_records_breadth_first(), vec![top, mid, deep]);
    }

    #[test]
    fn test_unknown_group_rejected() {
        let mut store = RecordStore::new("Root");
        let err = store.add_group(GroupId::new(42), "x").unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_GROUP");
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let mut store = RecordStore::new("Root");
        let past = store
            .add_record(store.root(), NewRecord::new().expires_at(now - Duration::days(1)))
            .unwrap();
        let future = store
            .add_record(store.root(), NewRecord::new().expires_at(now + Duration::days(1)))
            .unwrap();
        let never = store.add_record(store.root(), NewRecord::new()).unwrap();

        assert!(store.record(past).unwrap().is_expired_at(now));
        assert!(!store.record(future).unwrap().is_expired_at(now));
        assert!(!store.record(never).unwrap().is_expired_at(now));
    }

    #[test]
    fn test_field_replaced_on_duplicate_name() {
        let mut store = RecordStore::new("Root");
        let id = store
            .add_record(store.root(), NewRecord::new().title("a").title("b"))
            .unwrap();
        let record = store.record(id).unwrap();
        assert_eq!(record.title(), "b");
        assert_eq!(record.fields().count(), 1);
    }
}
