use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instruction::Instruction;

/// Index of a genotype in the inventory arena. Genotypes are never deleted,
/// so ids stay valid for the life of the world.
pub type GenotypeId = u32;

/// An immutable byte sequence: a creature's code at a reference moment
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Genome(Vec<Instruction>);

impl Genome {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self(instructions)
    }

    pub fn len(&self) -> u32 {
        self.0.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.0
    }
}

impl fmt::Display for Genome {
    /// Compact rendering, one base-32 digit per instruction
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for inst in &self.0 {
            let digit = inst.to_u8();
            let c = if digit < 10 {
                (b'0' + digit) as char
            } else {
                (b'a' + digit - 10) as char
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// A canonical genome plus population statistics.
///
/// `num_alive` counts the divergence-0 creatures currently pointing at this
/// genotype; `num_ever_lived` only ever grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryGenotype {
    name: String,
    genome: Genome,
    num_alive: u32,
    num_ever_lived: u32,
    origin_instructions: u64,
    origin_generations: u32,
}

impl InventoryGenotype {
    pub fn new(name: String, genome: Genome) -> Self {
        Self {
            name,
            genome,
            num_alive: 0,
            num_ever_lived: 0,
            origin_instructions: 0,
            origin_generations: 0,
        }
    }

    /// Identifier of the form `<length>-<serial>`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn num_alive(&self) -> u32 {
        self.num_alive
    }

    pub fn num_ever_lived(&self) -> u32 {
        self.num_ever_lived
    }

    /// World instruction count when this genotype was first observed
    pub fn origin_instructions(&self) -> u64 {
        self.origin_instructions
    }

    pub fn set_origin_instructions(&mut self, instructions: u64) {
        self.origin_instructions = instructions;
    }

    pub fn origin_generations(&self) -> u32 {
        self.origin_generations
    }

    pub fn set_origin_generations(&mut self, generations: u32) {
        self.origin_generations = generations;
    }

    pub(crate) fn creature_born(&mut self) {
        self.num_alive += 1;
        self.num_ever_lived += 1;
    }

    pub(crate) fn creature_died(&mut self) {
        assert!(self.num_alive > 0, "alive count underflow for {}", self.name);
        self.num_alive -= 1;
    }
}
