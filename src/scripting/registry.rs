//! 带代数的槽位注册表
//!
//! 每个上下文用它跟踪所有尚未释放的包装值。释放槽位时代数加一，
//! 因此旧的 [`ValueId`] 不会误指向后来复用该槽位的新值。

/// 注册表中一个槽位的标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId {
    index: u32,
    generation: u32,
}

impl ValueId {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

struct Slot<T> {
    generation: u32,
    entry: Option<T>,
}

pub(crate) struct ValueRegistry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> ValueRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn insert(&mut self, entry: T) -> ValueId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return ValueId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        ValueId {
            index,
            generation: 0,
        }
    }

    pub(crate) fn get(&self, id: ValueId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    pub(crate) fn contains(&self, id: ValueId) -> bool {
        self.get(id).is_some()
    }

    /// 取出条目；对已释放或过期的标识返回 `None`
    ///
    /// 条目在注册表借用之外析构，调用方负责在释放借用后再丢弃返回值。
    pub(crate) fn remove(&mut self, id: ValueId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(entry)
    }

    /// 取出全部条目，所有现存标识随之失效
    pub(crate) fn drain(&mut self) -> Vec<T> {
        let mut entries = Vec::with_capacity(self.live);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(entry) = slot.entry.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                entries.push(entry);
            }
        }
        self.live = 0;
        entries
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl<T> Default for ValueRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_insert_get_remove() {
        let mut registry = ValueRegistry::new();
        let a = registry.insert("a");
        let b = registry.insert("b");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(a), Some(&"a"));
        assert_eq!(registry.remove(a), Some("a"));
        assert_eq!(registry.get(a), None);
        assert_eq!(registry.get(b), Some(&"b"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = ValueRegistry::new();
        let id = registry.insert(1);
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_id_does_not_alias_reused_slot() {
        let mut registry = ValueRegistry::new();
        let old = registry.insert(1);
        registry.remove(old);
        let new = registry.insert(2);
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert_eq!(registry.get(old), None);
        assert!(registry.remove(old).is_none());
        assert_eq!(registry.get(new), Some(&2));
    }

    #[test]
    fn test_drain_invalidates_everything() {
        let mut registry = ValueRegistry::new();
        let ids: Vec<_> = (0..5).map(|i| registry.insert(i)).collect();
        let drained = registry.drain();
        assert_eq!(drained.len(), 5);
        assert!(registry.is_empty());
        assert!(ids.iter().all(|id| !registry.contains(*id)));
    }

    proptest! {
        #[test]
        fn test_live_count_tracks_operations(ops in prop::collection::vec(any::<bool>(), 0..64)) {
            let mut registry = ValueRegistry::new();
            let mut ids = Vec::new();
            for insert in ops {
                if insert || ids.is_empty() {
                    ids.push(registry.insert(()));
                } else {
                    let id = ids.remove(0);
                    prop_assert!(registry.remove(id).is_some());
                }
                prop_assert_eq!(registry.len(), ids.len());
            }
        }
    }
}
