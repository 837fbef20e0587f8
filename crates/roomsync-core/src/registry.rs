//! Item registry
//!
//! The registry belongs to the scene. The sync engine and local input are
//! handed a reference and only read or update records that already exist.

use crate::identity::ItemId;
use crate::item::ItemRecord;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Lookup of scene items by id
pub trait ItemRegistry {
    /// Add an item, returning the record it replaced
    fn register(&mut self, record: ItemRecord) -> Option<ItemRecord>;

    fn lookup(&self, id: &ItemId) -> Option<&ItemRecord>;

    fn lookup_mut(&mut self, id: &ItemId) -> Option<&mut ItemRecord>;

    /// Remove an item when it leaves the scene
    fn unregister(&mut self, id: &ItemId) -> Option<ItemRecord>;

    /// All registered ids, in registration order
    fn ids(&self) -> Vec<ItemId>;
}

/// Insertion-ordered in-memory registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneItems {
    items: IndexMap<ItemId, ItemRecord>,
}

impl SceneItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemRecord> {
        self.items.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ItemRecord> {
        self.items.values_mut()
    }
}

impl ItemRegistry for SceneItems {
    fn register(&mut self, record: ItemRecord) -> Option<ItemRecord> {
        self.items.insert(record.id().clone(), record)
    }

    fn lookup(&self, id: &ItemId) -> Option<&ItemRecord> {
        self.items.get(id)
    }

    fn lookup_mut(&mut self, id: &ItemId) -> Option<&mut ItemRecord> {
        self.items.get_mut(id)
    }

    fn unregister(&mut self, id: &ItemId) -> Option<ItemRecord> {
        self.items.shift_remove(id)
    }

    fn ids(&self) -> Vec<ItemId> {
        self.items.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_register_lookup_unregister() {
        let mut items = SceneItems::new();
        assert!(items.register(ItemRecord::new("sword1", Vec3::ZERO)).is_none());
        items.register(ItemRecord::new("cup", Vec3::ONE));
        assert_eq!(items.len(), 2);

        let id = ItemId::new("cup");
        assert_eq!(items.lookup(&id).unwrap().position(), Vec3::ONE);
        assert_eq!(items.ids(), vec![ItemId::new("sword1"), ItemId::new("cup")]);

        assert!(items.unregister(&id).is_some());
        assert!(items.lookup(&id).is_none());
        assert_eq!(items.ids(), vec![ItemId::new("sword1")]);
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut items = SceneItems::new();
        items.register(ItemRecord::new("a", Vec3::ZERO));
        let old = items.register(ItemRecord::new("a", Vec3::ONE)).unwrap();
        assert_eq!(old.position(), Vec3::ZERO);
        assert_eq!(items.len(), 1);
    }
}
