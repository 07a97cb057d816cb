//! Game entity system with strongly-typed integer IDs

use crate::EngineError;
use crate::Result;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Strongly-typed integer ID for game entities
///
/// Uses phantom types to distinguish between different kinds of entities
/// (Players, CardInstances, ...) at compile time, while keeping the same
/// efficient integer representation at runtime.
///
/// IDs are contiguous and stable for the lifetime of the entity they name.
/// A card instance that changes identity (e.g. a permanent leaving the
/// battlefield) is assigned a fresh ID rather than mutating the old one.
pub struct EntityId<T> {
    id: u32,
    _phantom: PhantomData<T>,
}

// Manual trait implementations that don't require T to have these traits
impl<T> Clone for EntityId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EntityId<T> {}

impl<T> PartialEq for EntityId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for EntityId<T> {}

impl<T> PartialOrd for EntityId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for EntityId<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T> std::hash::Hash for EntityId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> EntityId<T> {
    pub fn new(id: u32) -> Self {
        EntityId {
            id,
            _phantom: PhantomData,
        }
    }

    pub fn as_u32(&self) -> u32 {
        self.id
    }
}

// Custom Debug implementation to print just the ID number
impl<T> fmt::Debug for EntityId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> fmt::Display for EntityId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

// Manual Serialize/Deserialize implementations to handle PhantomData
impl<T> Serialize for EntityId<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.id.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for EntityId<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = u32::deserialize(deserializer)?;
        Ok(EntityId::new(id))
    }
}

/// Central storage for all game entities of a specific type
///
/// Provides fast lookup by EntityId. Uses FxHashMap for fast hashing of
/// integer keys. The type parameter T ensures type safety - EntityId<T>
/// can only look up entities of type T.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityStore<T>
where
    T: Clone,
{
    entities: FxHashMap<u32, T>,
}

impl<T> EntityStore<T>
where
    T: Clone,
{
    pub fn new() -> Self {
        EntityStore {
            entities: FxHashMap::default(),
        }
    }

    /// Insert an entity with a specific ID
    pub fn insert(&mut self, id: EntityId<T>, entity: T) {
        self.entities.insert(id.as_u32(), entity);
    }

    /// Get an entity by ID
    pub fn get(&self, id: EntityId<T>) -> Result<&T> {
        self.entities
            .get(&id.as_u32())
            .ok_or_else(|| EngineError::UnknownObject(format!("entity {}", id)))
    }

    /// Get a mutable reference to an entity
    pub fn get_mut(&mut self, id: EntityId<T>) -> Result<&mut T> {
        self.entities
            .get_mut(&id.as_u32())
            .ok_or_else(|| EngineError::UnknownObject(format!("entity {}", id)))
    }

    /// Check if an entity exists
    pub fn contains(&self, id: EntityId<T>) -> bool {
        self.entities.contains_key(&id.as_u32())
    }

    /// Remove an entity
    pub fn remove(&mut self, id: EntityId<T>) -> Option<T> {
        self.entities.remove(&id.as_u32())
    }

    /// Iterate over all entities
    pub fn iter(&self) -> impl Iterator<Item = (EntityId<T>, &T)> {
        self.entities.iter().map(|(k, v)| (EntityId::new(*k), v))
    }

    /// Get count of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<T> Default for EntityStore<T>
where
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct TestEntity {
        name: String,
    }

    #[test]
    fn test_entity_store() {
        let mut store: EntityStore<TestEntity> = EntityStore::new();
        let id1 = EntityId::new(0);
        let id2 = EntityId::new(1);

        store.insert(
            id1,
            TestEntity {
                name: "Test1".to_string(),
            },
        );
        store.insert(
            id2,
            TestEntity {
                name: "Test2".to_string(),
            },
        );

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(id1).unwrap().name, "Test1");
        assert_eq!(store.get(id2).unwrap().name, "Test2");
        assert!(store.get(EntityId::new(999)).is_err());

        store.remove(id1);
        assert!(!store.contains(id1));
        assert!(store.contains(id2));
    }

    #[test]
    fn test_entity_id_ordering() {
        let a: EntityId<TestEntity> = EntityId::new(3);
        let b: EntityId<TestEntity> = EntityId::new(7);
        assert!(a < b);
        assert_eq!(a, EntityId::new(3));
    }
}
