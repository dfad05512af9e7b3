use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::creature::{Creature, CreatureId};
use crate::rng::WorldRng;
use crate::settings::SizeSelection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Links {
    prev: Option<CreatureId>,
    next: Option<CreatureId>,
}

/// Round-robin scheduler over live creatures.
///
/// The ring keeps insertion order, head to tail; `advance` wraps from the
/// tail back to the head, which marks one full pass of the slicer. Removing
/// the current creature moves the pointer to its successor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlicer {
    links: BTreeMap<CreatureId, Links>,
    head: Option<CreatureId>,
    tail: Option<CreatureId>,
    current: Option<CreatureId>,
    instructions_executed: u64,
    default_slice_size: u32,
}

impl Default for TimeSlicer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSlicer {
    pub fn new() -> Self {
        Self {
            links: BTreeMap::new(),
            head: None,
            tail: None,
            current: None,
            instructions_executed: 0,
            default_slice_size: 20,
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn contains(&self, id: CreatureId) -> bool {
        self.links.contains_key(&id)
    }

    pub fn current(&self) -> Option<CreatureId> {
        self.current
    }

    /// Total instructions executed by all creatures over the world's life
    pub fn instructions_executed(&self) -> u64 {
        self.instructions_executed
    }

    pub fn executed_instruction(&mut self) {
        self.instructions_executed += 1;
    }

    pub fn default_slice_size(&self) -> u32 {
        self.default_slice_size
    }

    pub fn set_default_slice_size(&mut self, size: u32) {
        self.default_slice_size = size.max(1);
    }

    /// Append at the tail of the ring. The first creature becomes current.
    pub fn insert_creature(&mut self, id: CreatureId) {
        debug_assert!(!self.contains(id), "creature {id} already in slicer");
        let links = Links {
            prev: self.tail,
            next: None,
        };
        if let Some(tail) = self.tail {
            self.links.get_mut(&tail).unwrap().next = Some(id);
        } else {
            self.head = Some(id);
            self.current = Some(id);
        }
        self.tail = Some(id);
        self.links.insert(id, links);
    }

    /// Unlink a creature; removing the current one advances the pointer
    pub fn remove_creature(&mut self, id: CreatureId) -> bool {
        let Some(links) = self.links.remove(&id) else {
            return false;
        };
        match links.prev {
            Some(prev) => self.links.get_mut(&prev).unwrap().next = links.next,
            None => self.head = links.next,
        }
        match links.next {
            Some(next) => self.links.get_mut(&next).unwrap().prev = links.prev,
            None => self.tail = links.prev,
        }
        if self.current == Some(id) {
            self.current = links.next.or(self.head);
        }
        if self.links.is_empty() {
            self.current = None;
        }
        true
    }

    /// Move to the next creature. Returns true when the ring wrapped back to
    /// the head, completing one slicer pass.
    pub fn advance(&mut self) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        match self.links[&current].next {
            Some(next) => {
                self.current = Some(next);
                false
            }
            None => {
                self.current = self.head;
                true
            }
        }
    }

    /// Starting slice for a newly born creature
    pub fn initial_slice_size(&self, creature: &Creature, selection: SizeSelection) -> u32 {
        let size = match selection {
            SizeSelection::Constant => self.default_slice_size,
            SizeSelection::Proportional => creature.length(),
            SizeSelection::Power { exponent } => {
                (f64::from(creature.length())).powf(exponent).round() as u32
            }
        };
        size.max(1)
    }

    /// Slice for one turn: the creature's slice size, jittered by a bounded
    /// uniform factor when `variance` is non-zero
    pub fn size_for_this_slice(
        &self,
        creature: &Creature,
        variance: f64,
        rng: &mut WorldRng,
    ) -> u32 {
        let base = creature.slice_size().max(1);
        if variance <= 0.0 {
            return base;
        }
        let factor = 1.0 + rng.uniform(-variance, variance);
        ((f64::from(base) * factor).round() as u32).max(1)
    }

    /// Walk the ring once, head to tail
    pub fn iter(&self) -> SlicerIter<'_> {
        SlicerIter {
            slicer: self,
            cursor: self.head,
        }
    }
}

pub struct SlicerIter<'a> {
    slicer: &'a TimeSlicer,
    cursor: Option<CreatureId>,
}

impl Iterator for SlicerIter<'_> {
    type Item = CreatureId;

    fn next(&mut self) -> Option<CreatureId> {
        let id = self.cursor?;
        self.cursor = self.slicer.links[&id].next;
        Some(id)
    }
}
