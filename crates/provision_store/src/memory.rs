use crate::error::StoreError;
use crate::record::{Record, UserId};
use crate::store::Store;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Objects of a single space, ordered by id.
#[derive(Debug, Default)]
struct SpaceBucket {
    objects: BTreeMap<String, Record>,
}

/// In-memory [`Store`].
///
/// All state lives behind a single [`RwLock`], so every call observes a
/// consistent snapshot. Listings are returned in ascending order.
#[derive(Debug, Default)]
pub struct MemStore {
    users: RwLock<HashMap<UserId, BTreeMap<String, SpaceBucket>>>,
}

impl MemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against a space, failing if it does not exist.
    fn with_space<T>(
        &self,
        user: UserId,
        space: &str,
        f: impl FnOnce(&SpaceBucket) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let users = self.users.read();
        let bucket = users
            .get(&user)
            .and_then(|spaces| spaces.get(space))
            .ok_or_else(|| StoreError::space_not_found(user, space))?;
        f(bucket)
    }

    /// Runs `f` against a mutable space, failing if it does not exist.
    fn with_space_mut<T>(
        &self,
        user: UserId,
        space: &str,
        f: impl FnOnce(&mut SpaceBucket) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut users = self.users.write();
        let bucket = users
            .get_mut(&user)
            .and_then(|spaces| spaces.get_mut(space))
            .ok_or_else(|| StoreError::space_not_found(user, space))?;
        f(bucket)
    }
}

impl Store for MemStore {
    fn space_create(&self, user: UserId, name: &str) -> Result<(), StoreError> {
        let mut users = self.users.write();
        let spaces = users.entry(user).or_default();
        if spaces.contains_key(name) {
            return Err(StoreError::SpaceExists {
                user,
                space: name.to_owned(),
            });
        }
        spaces.insert(name.to_owned(), SpaceBucket::default());
        tracing::debug!(%user, space = name, "space created");
        Ok(())
    }

    fn space_delete(&self, user: UserId, name: &str) -> Result<(), StoreError> {
        let mut users = self.users.write();
        if let Some(spaces) = users.get_mut(&user)
            && spaces.remove(name).is_some()
        {
            tracing::debug!(%user, space = name, "space deleted");
        }
        Ok(())
    }

    fn space_list(&self, user: UserId) -> Result<Vec<String>, StoreError> {
        let users = self.users.read();
        Ok(users
            .get(&user)
            .map(|spaces| spaces.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn space_exists(&self, user: UserId, name: &str) -> Result<bool, StoreError> {
        let users = self.users.read();
        Ok(users
            .get(&user)
            .is_some_and(|spaces| spaces.contains_key(name)))
    }

    fn resource_set(
        &self,
        user: UserId,
        space: &str,
        id: &str,
        kind: &str,
        payload: Vec<u8>,
    ) -> Result<(), StoreError> {
        self.with_space_mut(user, space, |bucket| {
            match bucket.objects.get_mut(id) {
                Some(record) if record.kind != kind => Err(StoreError::InvalidType {
                    id: id.to_owned(),
                    expected: kind.to_owned(),
                    found: record.kind.clone(),
                }),
                Some(record) => {
                    record.data = payload;
                    record.version += 1;
                    Ok(())
                }
                None => {
                    bucket
                        .objects
                        .insert(id.to_owned(), Record::new(id, kind, payload));
                    Ok(())
                }
            }
        })
    }

    fn resource_get(&self, user: UserId, space: &str, id: &str) -> Result<Record, StoreError> {
        self.with_space(user, space, |bucket| {
            bucket
                .objects
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::ObjectNotFound(id.to_owned()))
        })
    }

    fn resource_exists(
        &self,
        user: UserId,
        space: &str,
        id: &str,
    ) -> Result<Option<String>, StoreError> {
        self.with_space(user, space, |bucket| {
            Ok(bucket.objects.get(id).map(|record| record.kind.clone()))
        })
    }

    fn resource_list(&self, user: UserId, space: &str) -> Result<Vec<String>, StoreError> {
        self.with_space(user, space, |bucket| {
            Ok(bucket.objects.keys().cloned().collect())
        })
    }

    fn resource_slaves(
        &self,
        user: UserId,
        space: &str,
        master: &str,
    ) -> Result<Vec<String>, StoreError> {
        self.with_space(user, space, |bucket| {
            Ok(bucket
                .objects
                .values()
                .filter(|record| record.has_master(master))
                .map(|record| record.id.clone())
                .collect())
        })
    }

    fn resource_delete(&self, user: UserId, space: &str, id: &str) -> Result<(), StoreError> {
        self.with_space_mut(user, space, |bucket| {
            if let Some(record) = bucket.objects.get(id)
                && record.in_use()
            {
                return Err(StoreError::ObjectInUse(id.to_owned()));
            }
            bucket.objects.remove(id);
            Ok(())
        })
    }

    fn dependency_add(
        &self,
        user: UserId,
        space: &str,
        id: &str,
        master: &str,
        exclusive: bool,
    ) -> Result<(), StoreError> {
        self.with_space_mut(user, space, |bucket| {
            let record = bucket
                .objects
                .get_mut(id)
                .ok_or_else(|| StoreError::ObjectNotFound(id.to_owned()))?;

            if record.has_master(master) {
                return Ok(());
            }
            if exclusive && record.in_use() {
                return Err(StoreError::ObjectInUse(id.to_owned()));
            }

            record.add_master(master);
            tracing::trace!(slave = id, master, "dependency added");
            Ok(())
        })
    }

    fn dependency_remove(
        &self,
        user: UserId,
        space: &str,
        id: &str,
        master: &str,
    ) -> Result<(), StoreError> {
        self.with_space_mut(user, space, |bucket| {
            let record = bucket
                .objects
                .get_mut(id)
                .ok_or_else(|| StoreError::ObjectNotFound(id.to_owned()))?;

            if record.remove_master(master) {
                tracing::trace!(slave = id, master, "dependency removed");
            }
            Ok(())
        })
    }
}
