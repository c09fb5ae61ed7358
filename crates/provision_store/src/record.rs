use serde::{Deserialize, Serialize};

/// Opaque tenant identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u32);

impl UserId {
    /// Creates a user id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for UserId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted resource instance.
///
/// `data` is the encoded payload of the resource; the store never looks
/// inside it. `masters` lists the ids of objects that use this one, kept
/// sorted and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Object id, unique within its space.
    pub id: String,
    /// Revision counter, bumped on every payload write.
    pub version: u64,
    /// Registered resource type name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Encoded payload.
    pub data: Vec<u8>,
    /// Ids of the objects that depend on this one.
    pub masters: Vec<String>,
}

impl Record {
    /// Creates a record at version 1 with no masters.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            version: 1,
            kind: kind.into(),
            data,
            masters: Vec::new(),
        }
    }

    /// Returns whether any other object depends on this one.
    #[must_use]
    pub fn in_use(&self) -> bool {
        !self.masters.is_empty()
    }

    /// Returns whether `master` is one of this record's masters.
    #[must_use]
    pub fn has_master(&self, master: &str) -> bool {
        self.masters.binary_search_by(|m| m.as_str().cmp(master)).is_ok()
    }

    /// Inserts `master`, keeping the set sorted. Returns `false` if it was
    /// already present.
    pub fn add_master(&mut self, master: &str) -> bool {
        match self.masters.binary_search_by(|m| m.as_str().cmp(master)) {
            Ok(_) => false,
            Err(at) => {
                self.masters.insert(at, master.to_owned());
                true
            }
        }
    }

    /// Removes `master`. Returns `false` if it was not present.
    pub fn remove_master(&mut self, master: &str) -> bool {
        match self.masters.binary_search_by(|m| m.as_str().cmp(master)) {
            Ok(at) => {
                self.masters.remove(at);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masters_stay_sorted_and_unique() {
        let mut record = Record::new("disk0", "Disk", Vec::new());
        assert!(record.add_master("vm1"));
        assert!(record.add_master("vm0"));
        assert!(!record.add_master("vm1"));

        assert_eq!(record.masters, vec!["vm0", "vm1"]);
        assert!(record.has_master("vm0"));
        assert!(record.in_use());

        assert!(record.remove_master("vm0"));
        assert!(!record.remove_master("vm0"));
        assert_eq!(record.masters, vec!["vm1"]);
    }

    #[test]
    fn record_serializes_type_tag() {
        let record = Record::new("vm0", "VM", b"{}".to_vec());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "VM");
        assert_eq!(json["version"], 1);
    }

    #[test]
    fn user_id_is_transparent() {
        let user: UserId = serde_json::from_str("7").unwrap();
        assert_eq!(user, UserId::new(7));
        assert_eq!(user.to_string(), "7");
    }
}
