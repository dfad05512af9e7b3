use serde::{Deserialize, Serialize};

use crate::instruction::Instruction;

/// The memory "soup" where creatures live.
///
/// A fixed-size ring of instructions: reads and writes wrap modulo the soup
/// size. Occupancy is tracked separately by the cell map; the soup itself is
/// just the flat array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Soup {
    data: Vec<Instruction>,
}

impl Soup {
    /// Create a new soup of the given size, filled with Nop0
    pub fn new(size: u32) -> Self {
        Self {
            data: vec![Instruction::Nop0; size as usize],
        }
    }

    /// Get the size of the soup
    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    /// Normalize an address to be within bounds
    pub fn normalize_addr(&self, addr: u32) -> u32 {
        addr % self.size()
    }

    /// Read the instruction at an address (wraps around)
    pub fn read(&self, addr: u32) -> Instruction {
        self.data[(addr % self.size()) as usize]
    }

    /// Write an instruction at an address (wraps around)
    pub fn write(&mut self, addr: u32, inst: Instruction) {
        let size = self.size();
        self.data[(addr % size) as usize] = inst;
    }

    /// Bulk write, used to seed an ancestor
    pub fn inject(&mut self, addr: u32, instructions: &[Instruction]) {
        for (i, &inst) in instructions.iter().enumerate() {
            self.write(addr + i as u32, inst);
        }
    }

    /// Copy out `len` instructions starting at `start` (wrapping)
    pub fn slice(&self, start: u32, len: u32) -> Vec<Instruction> {
        (0..len).map(|i| self.read(start + i)).collect()
    }

    fn matches_at(&self, addr: u32, pattern: &[Instruction]) -> bool {
        pattern
            .iter()
            .enumerate()
            .all(|(i, &inst)| self.read(addr + i as u32) == inst)
    }

    /// Find the complement of `template` scanning forward from `start`.
    /// Returns the address just past the matched run.
    pub fn find_template_forward(
        &self,
        start: u32,
        template: &[Instruction],
        max_search: u32,
    ) -> Option<u32> {
        let complement = complement_of(template)?;
        for offset in 1..=max_search {
            let addr = self.normalize_addr(start + offset);
            if self.matches_at(addr, &complement) {
                return Some(self.normalize_addr(addr + complement.len() as u32));
            }
        }
        None
    }

    /// Find the complement of `template` scanning backward from `start`.
    /// Returns the address just past the matched run.
    pub fn find_template_backward(
        &self,
        start: u32,
        template: &[Instruction],
        max_search: u32,
    ) -> Option<u32> {
        let complement = complement_of(template)?;
        let size = self.size();
        for offset in 1..=max_search {
            let addr = (start + size - offset % size) % size;
            if self.matches_at(addr, &complement) {
                return Some(self.normalize_addr(addr + complement.len() as u32));
            }
        }
        None
    }

    /// Find the nearest complement of `template` in either direction,
    /// preferring the forward match when both lie at the same distance.
    pub fn find_template_nearest(
        &self,
        start: u32,
        template: &[Instruction],
        max_search: u32,
    ) -> Option<u32> {
        let complement = complement_of(template)?;
        let size = self.size();
        for offset in 1..=max_search {
            let forward = self.normalize_addr(start + offset);
            if self.matches_at(forward, &complement) {
                return Some(self.normalize_addr(forward + complement.len() as u32));
            }
            let backward = (start + size - offset % size) % size;
            if self.matches_at(backward, &complement) {
                return Some(self.normalize_addr(backward + complement.len() as u32));
            }
        }
        None
    }
}

/// Complement a template run. Empty templates (or runs holding a non-nop,
/// which cannot happen for templates read off the soup) yield None.
fn complement_of(template: &[Instruction]) -> Option<Vec<Instruction>> {
    if template.is_empty() {
        return None;
    }
    let complement: Vec<Instruction> = template
        .iter()
        .filter_map(|inst| inst.complement())
        .collect();
    (complement.len() == template.len()).then_some(complement)
}
