use serde::{Deserialize, Serialize};

/// Number of opcodes in the instruction set. Soup cells never hold a value
/// outside `[0, INSTRUCTION_SET_SIZE)`.
pub const INSTRUCTION_SET_SIZE: u8 = 32;

/// Maximum number of nops read as a template after a control instruction.
pub const MAX_TEMPLATE_LENGTH: usize = 10;

/// Tierra instruction set - simplified assembly-like operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Instruction {
    // Template markers
    Nop0 = 0,      // No operation, also used for templates
    Nop1 = 1,      // No operation, also used for templates

    // CX bit twiddling
    Or1 = 2,       // CX |= 1
    Shl = 3,       // CX <<= 1
    Zero = 4,      // CX = 0

    // Conditional
    IfCz = 5,      // If CX is zero, execute next instruction, else skip it

    // Arithmetic
    SubAb = 6,     // CX = AX - BX
    SubAc = 7,     // AX = AX - CX
    IncA = 8,      // AX += 1
    IncB = 9,      // BX += 1
    IncC = 10,     // CX += 1
    DecC = 11,     // CX -= 1

    // Stack operations
    PushAx = 12,   // Push AX to stack
    PushBx = 13,   // Push BX to stack
    PushCx = 14,   // Push CX to stack
    PushDx = 15,   // Push DX to stack
    PopAx = 16,    // Pop from stack to AX
    PopBx = 17,    // Pop from stack to BX
    PopCx = 18,    // Pop from stack to CX
    PopDx = 19,    // Pop from stack to DX

    // Flow control (each reads the template that follows it)
    Jmp = 20,      // Jump to complement template, nearest in either direction
    Jmpb = 21,     // Jump backward to complement template
    Call = 22,     // Push return address, then jump like Jmp
    Ret = 23,      // Return to popped address

    // Data movement
    MovCd = 24,    // DX = CX
    MovAb = 25,    // BX = AX
    MovIab = 26,   // Copy the instruction at [BX] to [AX]

    // Template addressing
    Adr = 27,      // AX = address past complement template, either direction
    Adrb = 28,     // AX = address past complement template, backward
    Adrf = 29,     // AX = address past complement template, forward

    // Reproduction
    Mal = 30,      // Allocate CX instructions for a daughter, address in AX
    Divide = 31,   // Detach the daughter as a new creature
}

impl Instruction {
    /// Convert a u8 to an instruction, with out-of-range values becoming Nop0
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0 => Instruction::Nop0,
            1 => Instruction::Nop1,
            2 => Instruction::Or1,
            3 => Instruction::Shl,
            4 => Instruction::Zero,
            5 => Instruction::IfCz,
            6 => Instruction::SubAb,
            7 => Instruction::SubAc,
            8 => Instruction::IncA,
            9 => Instruction::IncB,
            10 => Instruction::IncC,
            11 => Instruction::DecC,
            12 => Instruction::PushAx,
            13 => Instruction::PushBx,
            14 => Instruction::PushCx,
            15 => Instruction::PushDx,
            16 => Instruction::PopAx,
            17 => Instruction::PopBx,
            18 => Instruction::PopCx,
            19 => Instruction::PopDx,
            20 => Instruction::Jmp,
            21 => Instruction::Jmpb,
            22 => Instruction::Call,
            23 => Instruction::Ret,
            24 => Instruction::MovCd,
            25 => Instruction::MovAb,
            26 => Instruction::MovIab,
            27 => Instruction::Adr,
            28 => Instruction::Adrb,
            29 => Instruction::Adrf,
            30 => Instruction::Mal,
            31 => Instruction::Divide,
            _ => Instruction::Nop0,
        }
    }

    /// Convert instruction to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Check if this instruction is a template marker (Nop0 or Nop1)
    pub fn is_template(&self) -> bool {
        matches!(self, Instruction::Nop0 | Instruction::Nop1)
    }

    /// Get the complement of a template instruction
    pub fn complement(&self) -> Option<Self> {
        match self {
            Instruction::Nop0 => Some(Instruction::Nop1),
            Instruction::Nop1 => Some(Instruction::Nop0),
            _ => None,
        }
    }
}

impl Default for Instruction {
    fn default() -> Self {
        Instruction::Nop0
    }
}
