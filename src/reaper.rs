use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::creature::CreatureId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Links {
    prev: Option<CreatureId>,
    next: Option<CreatureId>,
}

/// Doubly-linked total order over live creatures; the head is the next to
/// die.
///
/// Creatures drift toward the head one neighbour swap at a time as they
/// accumulate errors, and back toward the tail when they allocate or divide.
/// Single-step swaps keep selection pressure on reaper rank smooth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaper {
    links: BTreeMap<CreatureId, Links>,
    head: Option<CreatureId>,
    tail: Option<CreatureId>,
}

impl Default for Reaper {
    fn default() -> Self {
        Self::new()
    }
}

impl Reaper {
    pub fn new() -> Self {
        Self {
            links: BTreeMap::new(),
            head: None,
            tail: None,
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

    /// The next creature to die
    pub fn head(&self) -> Option<CreatureId> {
        self.head
    }

    /// Append at the tail, the youngest position
    pub fn add_creature(&mut self, id: CreatureId) {
        debug_assert!(!self.contains(id), "creature {id} already in reaper");
        let links = Links {
            prev: self.tail,
            next: None,
        };
        if let Some(tail) = self.tail {
            self.links.get_mut(&tail).unwrap().next = Some(id);
        } else {
            self.head = Some(id);
        }
        self.tail = Some(id);
        self.links.insert(id, links);
    }

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
        true
    }

    /// Swap one position toward the head, if not already there
    pub fn conditional_move_up(&mut self, id: CreatureId) {
        if let Some(prev) = self.links.get(&id).and_then(|links| links.prev) {
            self.swap_neighbours(prev, id);
        }
    }

    /// Swap one position toward the tail, if not already there
    pub fn conditional_move_down(&mut self, id: CreatureId) {
        if let Some(next) = self.links.get(&id).and_then(|links| links.next) {
            self.swap_neighbours(id, next);
        }
    }

    /// Exchange two adjacent entries, `first` immediately before `second`
    fn swap_neighbours(&mut self, first: CreatureId, second: CreatureId) {
        let outer_prev = self.links[&first].prev;
        let outer_next = self.links[&second].next;
        debug_assert_eq!(self.links[&first].next, Some(second));

        match outer_prev {
            Some(prev) => self.links.get_mut(&prev).unwrap().next = Some(second),
            None => self.head = Some(second),
        }
        match outer_next {
            Some(next) => self.links.get_mut(&next).unwrap().prev = Some(first),
            None => self.tail = Some(first),
        }
        *self.links.get_mut(&second).unwrap() = Links {
            prev: outer_prev,
            next: Some(first),
        };
        *self.links.get_mut(&first).unwrap() = Links {
            prev: Some(second),
            next: outer_next,
        };
    }

    /// Walk the order from head to tail
    pub fn iter(&self) -> ReaperIter<'_> {
        ReaperIter {
            reaper: self,
            cursor: self.head,
        }
    }
}

pub struct ReaperIter<'a> {
    reaper: &'a Reaper,
    cursor: Option<CreatureId>,
}

impl Iterator for ReaperIter<'_> {
    type Item = CreatureId;

    fn next(&mut self) -> Option<CreatureId> {
        let id = self.cursor?;
        self.cursor = self.reaper.links[&id].next;
        Some(id)
    }
}
