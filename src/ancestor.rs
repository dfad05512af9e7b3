use crate::instruction::Instruction;

/// Length of the canonical ancestor
pub const ANCESTOR_LENGTH: u32 = 80;

/// The canonical 80-instruction self-replicating ancestor.
///
/// Self-examination first: the creature locates its own start (backward to
/// the start marker) and end (forward to the end marker) and subtracts to
/// get its length. The reproduction loop then allocates a daughter, calls
/// the copy procedure and divides. The copy procedure saves its registers,
/// copies one instruction per pass and restores the registers on exit, so
/// the loop can run forever.
pub fn ancestor_genome() -> Vec<Instruction> {
    use Instruction::*;

    let mut genome = Vec::with_capacity(ANCESTOR_LENGTH as usize);

    // start marker: 1111
    genome.extend_from_slice(&[Nop1, Nop1, Nop1, Nop1]);

    // self-exam: cx = 4 (template size), saved in dx
    genome.extend_from_slice(&[Zero, Or1, Shl, Shl, MovCd]);

    // ax = address past the start marker, minus template size = own start
    genome.extend_from_slice(&[Adrb, Nop0, Nop0, Nop0, Nop0, SubAc]);

    // bx = own start; ax = one past the end marker; cx = own length
    genome.extend_from_slice(&[MovAb, Adrf, Nop0, Nop0, Nop0, Nop1, IncA, SubAb]);

    // reproduction loop: 1101
    genome.extend_from_slice(&[Nop1, Nop1, Nop0, Nop1]);
    genome.extend_from_slice(&[Mal]);
    genome.extend_from_slice(&[Call, Nop0, Nop0, Nop1, Nop1]);
    genome.extend_from_slice(&[Divide]);
    genome.extend_from_slice(&[Jmp, Nop0, Nop0, Nop1, Nop0, IfCz]);

    // copy procedure: 1100; save the registers the loop clobbers
    genome.extend_from_slice(&[Nop1, Nop1, Nop0, Nop0]);
    genome.extend_from_slice(&[PushAx, PushBx, PushCx]);

    // copy loop: 1010; one instruction per pass, counted down in cx
    genome.extend_from_slice(&[Nop1, Nop0, Nop1, Nop0]);
    genome.extend_from_slice(&[MovIab, DecC, IfCz]);
    genome.extend_from_slice(&[Jmp, Nop0, Nop1, Nop0, Nop0]);
    genome.extend_from_slice(&[IncA, IncB]);
    genome.extend_from_slice(&[Jmp, Nop0, Nop1, Nop0, Nop1, IfCz]);

    // copy done: 1011; restore and return to the caller
    genome.extend_from_slice(&[Nop1, Nop0, Nop1, Nop1]);
    genome.extend_from_slice(&[PopCx, PopBx, PopAx, Ret]);

    // end marker: 1110
    genome.extend_from_slice(&[Nop1, Nop1, Nop1, Nop0, IfCz]);

    debug_assert_eq!(genome.len(), ANCESTOR_LENGTH as usize);
    genome
}
