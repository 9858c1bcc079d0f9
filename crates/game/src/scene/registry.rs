use glam::Vec2;
use parking_lot::Mutex;

use super::entity::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    index: u32,
    generation: u32,
}

impl EntityHandle {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// Handles of every live entity able to destroy a ship.
#[derive(Debug, Default)]
pub struct KillerSet {
    handles: Mutex<Vec<EntityHandle>>,
}

impl KillerSet {
    fn insert(&self, handle: EntityHandle) {
        let mut handles = self.handles.lock();
        if !handles.contains(&handle) {
            handles.push(handle);
        }
    }

    fn remove(&self, handle: EntityHandle) {
        self.handles.lock().retain(|h| *h != handle);
    }

    pub fn clear(&self) {
        self.handles.lock().clear();
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.handles.lock().contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<EntityHandle> {
        self.handles.lock().clone()
    }
}

/// Generational arena owning every entity in the scene.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
    killers: KillerSet,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, entity: Entity) -> EntityHandle {
        let can_kill = entity.can_kill();
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entity = Some(entity);
                EntityHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entity: Some(entity),
                });
                EntityHandle {
                    index,
                    generation: 0,
                }
            }
        };

        self.len += 1;
        if can_kill {
            self.killers.insert(handle);
        }
        handle
    }

    pub fn despawn(&mut self, handle: EntityHandle) -> Option<Entity> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let entity = slot.entity.take()?;

        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        self.killers.remove(handle);
        Some(entity)
    }

    pub fn get(&self, handle: EntityHandle) -> Option<&Entity> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entity.as_ref())
    }

    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entity.as_mut())
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Live handles in slot order.
    pub fn handles(&self) -> Vec<EntityHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.entity.is_some())
            .map(|(index, slot)| EntityHandle {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &Entity)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entity.as_ref().map(|entity| {
                (
                    EntityHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    entity,
                )
            })
        })
    }

    /// Removes every entity flagged as finished and returns their handles.
    pub fn remove_finished(&mut self) -> Vec<EntityHandle> {
        let finished: Vec<EntityHandle> = self
            .iter()
            .filter(|(_, entity)| entity.is_finished())
            .map(|(handle, _)| handle)
            .collect();
        for handle in &finished {
            self.despawn(*handle);
        }
        finished
    }

    pub fn killers(&self) -> &KillerSet {
        &self.killers
    }

    /// Drops every projectile from the kill-capable set; they stay in the
    /// scene but can no longer destroy a ship.
    pub fn clear_killers(&self) {
        self.killers.clear();
    }

    pub fn killer_positions(&self) -> Vec<Vec2> {
        self.killers
            .snapshot()
            .into_iter()
            .filter_map(|handle| self.get(handle))
            .map(|entity| entity.body.position)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.entity.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.len = 0;
        self.killers.clear();
    }
}
