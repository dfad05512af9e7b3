use serde::{Deserialize, Serialize};

use crate::genotype::{Genome, GenotypeId};
use crate::instruction::Instruction;
use crate::soup::Soup;

pub type CreatureId = u64;

/// Depth of the per-creature CPU stack
pub const CPU_STACK_DEPTH: usize = 10;

/// Register state of one virtual CPU.
///
/// Four general-purpose registers, a bounded stack that drops its oldest
/// entry when full, an instruction pointer and a one-bit error flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    pub ax: i32,
    pub bx: i32,
    pub cx: i32,
    pub dx: i32,
    stack: Vec<i32>,
    pub ip: u32,
    pub flag: bool,
}

impl Cpu {
    pub fn new(ip: u32) -> Self {
        Self {
            ax: 0,
            bx: 0,
            cx: 0,
            dx: 0,
            stack: Vec::with_capacity(CPU_STACK_DEPTH),
            ip,
            flag: false,
        }
    }

    /// Push a value, dropping the oldest entry when the stack is full
    pub fn push(&mut self, value: i32) {
        if self.stack.len() == CPU_STACK_DEPTH {
            self.stack.remove(0);
        }
        self.stack.push(value);
    }

    /// Pop the newest value, or None when the stack is empty
    pub fn pop(&mut self) -> Option<i32> {
        self.stack.pop()
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }
}

/// One virtual-machine process executing code in the soup.
///
/// A creature occupies a single contiguous, non-wrapping span of the soup.
/// Between `mal` and `divide` it owns an in-progress daughter, which is
/// registered in the cell map but in none of the scheduler queues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    id: CreatureId,
    location: u32,
    length: u32,
    pub cpu: Cpu,
    last_instruction: Instruction,
    slice_size: u32,
    genotype: Option<GenotypeId>,
    genotype_divergence: u32,
    daughter: Option<Box<Creature>>,
    num_errors: u32,
    num_moves: u32,
    num_offspring: u32,
    generation: u32,
    parent_id: Option<CreatureId>,
    origin_instructions: u64,
}

impl Creature {
    pub fn new(id: CreatureId, location: u32, length: u32) -> Self {
        Self {
            id,
            location,
            length,
            cpu: Cpu::new(location),
            last_instruction: Instruction::Nop0,
            slice_size: 0,
            genotype: None,
            genotype_divergence: 0,
            daughter: None,
            num_errors: 0,
            num_moves: 0,
            num_offspring: 0,
            generation: 0,
            parent_id: None,
            origin_instructions: 0,
        }
    }

    pub fn id(&self) -> CreatureId {
        self.id
    }

    pub fn location(&self) -> u32 {
        self.location
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    /// Absolute soup address at `offset` from this creature's origin
    pub fn address_from_offset(&self, offset: i32, soup_size: u32) -> u32 {
        (i64::from(self.location) + i64::from(offset)).rem_euclid(i64::from(soup_size)) as u32
    }

    /// The byte sequence currently occupying this creature's span
    pub fn genome_data(&self, soup: &Soup) -> Genome {
        Genome::new(soup.slice(self.location, self.length))
    }

    pub fn last_instruction(&self) -> Instruction {
        self.last_instruction
    }

    pub fn set_last_instruction(&mut self, inst: Instruction) {
        self.last_instruction = inst;
    }

    pub fn slice_size(&self) -> u32 {
        self.slice_size
    }

    pub fn set_slice_size(&mut self, size: u32) {
        self.slice_size = size;
    }

    pub fn genotype(&self) -> Option<GenotypeId> {
        self.genotype
    }

    pub fn set_genotype(&mut self, genotype: GenotypeId) {
        self.genotype = Some(genotype);
    }

    /// Count of uncertified mutations since this creature was last associated
    /// with its genotype's genome
    pub fn genotype_divergence(&self) -> u32 {
        self.genotype_divergence
    }

    pub fn set_genotype_divergence(&mut self, divergence: u32) {
        self.genotype_divergence = divergence;
    }

    pub fn is_dividing(&self) -> bool {
        self.daughter.is_some()
    }

    pub fn daughter(&self) -> Option<&Creature> {
        self.daughter.as_deref()
    }

    pub fn set_daughter(&mut self, daughter: Creature) {
        self.daughter = Some(Box::new(daughter));
    }

    pub fn take_daughter(&mut self) -> Option<Creature> {
        self.daughter.take().map(|boxed| *boxed)
    }

    pub fn num_errors(&self) -> u32 {
        self.num_errors
    }

    pub fn note_error(&mut self) {
        self.cpu.flag = true;
        self.num_errors += 1;
    }

    /// MovIab executions since the last divide; a daughter is only viable
    /// once at least one instruction has been copied
    pub fn num_moves(&self) -> u32 {
        self.num_moves
    }

    pub fn note_move(&mut self) {
        self.num_moves += 1;
    }

    pub fn num_offspring(&self) -> u32 {
        self.num_offspring
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn set_generation(&mut self, generation: u32) {
        self.generation = generation;
    }

    pub fn parent_id(&self) -> Option<CreatureId> {
        self.parent_id
    }

    pub fn set_parent_id(&mut self, parent: CreatureId) {
        self.parent_id = Some(parent);
    }

    /// Instruction count of the world at this creature's birth
    pub fn origin_instructions(&self) -> u64 {
        self.origin_instructions
    }

    pub fn set_origin_instructions(&mut self, instructions: u64) {
        self.origin_instructions = instructions;
    }

    /// Called at a successful divide. Updates offspring bookkeeping and
    /// reports whether the child bred true: the parent has not diverged and
    /// the child's genome matches the parent's current genome exactly.
    pub fn gave_birth(&mut self, child: &Creature, soup: &Soup) -> bool {
        self.num_offspring += 1;
        self.num_moves = 0;
        self.genotype_divergence == 0 && child.genome_data(soup) == self.genome_data(soup)
    }

    /// Zero this creature's span (used when reaped creatures are cleared)
    pub fn clear_space(&self, soup: &mut Soup) {
        for i in 0..self.length {
            soup.write(self.location + i, Instruction::Nop0);
        }
    }
}
