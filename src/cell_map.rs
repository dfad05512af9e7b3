use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::creature::CreatureId;

/// Direction for an outward space search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Upward,
    Downward,
    Bothways,
}

/// One occupied region of the soup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellEntry {
    pub length: u32,
    pub creature_id: CreatureId,
}

/// Occupancy index over the soup.
///
/// Regions are keyed by start address, are disjoint, and never wrap across
/// address zero: a creature's span is a single contiguous run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellMap {
    soup_size: u32,
    cells: BTreeMap<u32, CellEntry>,
    occupied: u64,
}

impl CellMap {
    pub fn new(soup_size: u32) -> Self {
        Self {
            soup_size,
            cells: BTreeMap::new(),
            occupied: 0,
        }
    }

    pub fn soup_size(&self) -> u32 {
        self.soup_size
    }

    pub fn num_regions(&self) -> usize {
        self.cells.len()
    }

    /// Iterate occupied regions in address order
    pub fn regions(&self) -> impl Iterator<Item = (u32, &CellEntry)> {
        self.cells.iter().map(|(&start, entry)| (start, entry))
    }

    pub fn region_at(&self, addr: u32) -> Option<(u32, CellEntry)> {
        self.cells
            .range(..=addr)
            .next_back()
            .filter(|(&start, entry)| start + entry.length > addr)
            .map(|(&start, &entry)| (start, entry))
    }

    /// True if `[addr, addr + length)` lies in the soup without wrapping and
    /// is disjoint from every stored region.
    pub fn space_at(&self, addr: u32, length: u32) -> bool {
        if length == 0 || addr >= self.soup_size || self.soup_size - addr < length {
            return false;
        }
        // the region starting at or before addr must end at or before addr
        if let Some((&start, entry)) = self.cells.range(..=addr).next_back() {
            if start + entry.length > addr {
                return false;
            }
        }
        // and nothing may start inside the candidate span
        self.cells.range(addr..addr + length).next().is_none()
    }

    /// Register a creature's region. Fails on any overlap.
    pub fn insert_creature(&mut self, id: CreatureId, location: u32, length: u32) -> bool {
        if !self.space_at(location, length) {
            return false;
        }
        self.cells.insert(
            location,
            CellEntry {
                length,
                creature_id: id,
            },
        );
        self.occupied += u64::from(length);
        true
    }

    /// Remove the region registered for a creature
    pub fn remove_creature(&mut self, id: CreatureId, location: u32) -> bool {
        match self.cells.get(&location) {
            Some(entry) if entry.creature_id == id => {
                let length = entry.length;
                self.cells.remove(&location);
                self.occupied -= u64::from(length);
                true
            }
            _ => false,
        }
    }

    /// Scan outward from `origin` for a free span of `length` instructions.
    ///
    /// Offsets run 0, ±1, ±2, … up to `max_range` in the requested direction;
    /// for `Bothways` a tie at the same distance goes to the lower address.
    pub fn search_for_space(
        &self,
        origin: u32,
        length: u32,
        max_range: u32,
        direction: SearchDirection,
    ) -> Option<u32> {
        let origin = origin % self.soup_size;
        for offset in 0..=max_range {
            let up = (origin + offset) % self.soup_size;
            let down = (origin + self.soup_size - offset % self.soup_size) % self.soup_size;
            let candidate = match direction {
                SearchDirection::Upward => self.space_at(up, length).then_some(up),
                SearchDirection::Downward => self.space_at(down, length).then_some(down),
                SearchDirection::Bothways => {
                    match (self.space_at(up, length), self.space_at(down, length)) {
                        (true, true) => Some(up.min(down)),
                        (true, false) => Some(up),
                        (false, true) => Some(down),
                        (false, false) => None,
                    }
                }
            };
            if candidate.is_some() {
                return candidate;
            }
        }
        None
    }

    /// Occupied fraction of the soup, in `[0, 1]`
    pub fn fullness(&self) -> f64 {
        if self.soup_size == 0 {
            return 0.0;
        }
        self.occupied as f64 / self.soup_size as f64
    }

    pub fn occupied_size(&self) -> u64 {
        self.occupied
    }
}
