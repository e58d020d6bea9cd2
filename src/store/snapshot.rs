//! JSON snapshot format for loading a store from disk.
//!
//! ```json
//! {
//!   "name": "Root",
//!   "groups": [
//!     { "name": "Email", "search_enabled": false, "records": [] }
//!   ],
//!   "records": [
//!     { "fields": { "Title": "中国银行", "UserName": "li" }, "tags": ["bank"] }
//!   ]
//! }
//! ```

use super::{NewRecord, RecordStore, SearchEnabled};
use crate::error::{QuickSearchError, StoreResult};
use crate::types::GroupId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Serialized form of a group and everything below it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub name: String,
    /// `None` inherits from the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_enabled: Option<bool>,
    #[serde(default)]
    pub groups: Vec<GroupSnapshot>,
    #[serde(default)]
    pub records: Vec<RecordSnapshot>,
}

/// Serialized form of one record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSnapshot {
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub expires: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<DateTime<Utc>>,
}

impl RecordStore {
    /// Builds a store from a snapshot tree. The snapshot root becomes the root group.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidSnapshot` if the tree exceeds the id space.
    pub fn from_snapshot(root: &GroupSnapshot) -> StoreResult<Self> {
        let mut store = Self::new(root.name.clone());
        let root_id = store.root();
        store.set_search_enabled(root_id, SearchEnabled::from(root.search_enabled))?;
        store.load_group_contents(root_id, root)?;
        Ok(store)
    }

    fn load_group_contents(&mut self, id: GroupId, snapshot: &GroupSnapshot) -> StoreResult<()> {
        for record in &snapshot.records {
            let mut new = NewRecord::new();
            for (name, value) in &record.fields {
                new = new.field(name.clone(), value.clone());
            }
            for tag in &record.tags {
                new = new.tag(tag.clone());
            }
            if let Some(at) = record.expiry_time {
                new = new.expires_at(at);
            }
            self.add_record(id, new.expires(record.expires))?;
        }
        for child in &snapshot.groups {
            let child_id = self.add_group(id, child.name.clone())?;
            self.set_search_enabled(child_id, SearchEnabled::from(child.search_enabled))?;
            self.load_group_contents(child_id, child)?;
        }
        Ok(())
    }

    /// Reads a JSON snapshot file and builds a store from it.
    ///
    /// # Errors
    ///
    /// Returns `QuickSearchError::Io` if the file cannot be read,
    /// `QuickSearchError::Json` if it is not a valid snapshot.
    pub fn load_json(path: &Path) -> Result<Self, QuickSearchError> {
        let text = std::fs::read_to_string(path)?;
        let snapshot: GroupSnapshot = serde_json::from_str(&text)?;
        Ok(Self::from_snapshot(&snapshot)?)
    }
}
