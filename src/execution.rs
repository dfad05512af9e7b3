use serde::{Deserialize, Serialize};

use crate::creature::Creature;
use crate::instruction::{Instruction, INSTRUCTION_SET_SIZE, MAX_TEMPLATE_LENGTH};
use crate::soup::Soup;
use crate::world::World;

/// One cycle of the virtual CPU.
///
/// `execute` performs exactly the instruction under the creature's IP,
/// advances the IP (mod soup size), and returns a newly detached daughter
/// when the instruction was a successful `divide`. A non-zero `flaw`
/// perturbs the result of arithmetic and transfer instructions by one.
pub trait ExecutionUnit {
    fn execute(&self, creature: &mut Creature, world: &mut World, flaw: i32) -> Option<Creature>;
}

/// Tagged set of execution units. The world resolves its unit once per
/// `iterate` call, so the hot loop dispatches on a copied enum rather than
/// through a vtable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionModel {
    Unit0(ExecutionUnit0),
}

impl Default for ExecutionModel {
    fn default() -> Self {
        ExecutionModel::Unit0(ExecutionUnit0)
    }
}

impl ExecutionUnit for ExecutionModel {
    fn execute(&self, creature: &mut Creature, world: &mut World, flaw: i32) -> Option<Creature> {
        match self {
            ExecutionModel::Unit0(unit) => unit.execute(creature, world, flaw),
        }
    }
}

/// The original instruction-set semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionUnit0;

/// Reduce a register value to a soup address
fn soup_addr(register: i32, soup_size: u32) -> u32 {
    (i64::from(register)).rem_euclid(i64::from(soup_size)) as u32
}

/// Read the run of nops following `addr`, up to the template length cap
fn read_template(soup: &Soup, addr: u32) -> Vec<Instruction> {
    let mut template = Vec::new();
    let mut pos = addr;
    for _ in 0..MAX_TEMPLATE_LENGTH {
        let inst = soup.read(pos);
        if !inst.is_template() {
            break;
        }
        template.push(inst);
        pos = soup.normalize_addr(pos + 1);
    }
    template
}

/// Perturb an instruction value by the flaw, wrapping within the set
fn flawed_instruction(inst: Instruction, flaw: i32) -> Instruction {
    let value = (i32::from(inst.to_u8()) + flaw).rem_euclid(i32::from(INSTRUCTION_SET_SIZE));
    Instruction::from_u8(value as u8)
}

impl ExecutionUnit for ExecutionUnit0 {
    fn execute(&self, creature: &mut Creature, world: &mut World, flaw: i32) -> Option<Creature> {
        let soup_size = world.soup_size();
        let window = world.settings().template_search_window();
        let ip = creature.cpu.ip;
        let inst = world.soup().read(ip);

        creature.set_last_instruction(inst);
        creature.cpu.flag = false;

        let mut next_ip = (ip + 1) % soup_size;
        let mut daughter = None;

        match inst {
            Instruction::Nop0 | Instruction::Nop1 => {}

            Instruction::Or1 => {
                creature.cpu.cx = (creature.cpu.cx | 1).wrapping_add(flaw);
            }

            Instruction::Shl => {
                creature.cpu.cx = creature.cpu.cx.wrapping_shl(1).wrapping_add(flaw);
            }

            Instruction::Zero => {
                creature.cpu.cx = flaw;
            }

            Instruction::IfCz => {
                // execute the next instruction only when CX is zero
                if creature.cpu.cx != 0 {
                    next_ip = (ip + 2) % soup_size;
                }
            }

            Instruction::SubAb => {
                creature.cpu.cx = creature
                    .cpu
                    .ax
                    .wrapping_sub(creature.cpu.bx)
                    .wrapping_add(flaw);
            }

            Instruction::SubAc => {
                creature.cpu.ax = creature
                    .cpu
                    .ax
                    .wrapping_sub(creature.cpu.cx)
                    .wrapping_add(flaw);
            }

            Instruction::IncA => {
                creature.cpu.ax = creature.cpu.ax.wrapping_add(1).wrapping_add(flaw);
            }
            Instruction::IncB => {
                creature.cpu.bx = creature.cpu.bx.wrapping_add(1).wrapping_add(flaw);
            }
            Instruction::IncC => {
                creature.cpu.cx = creature.cpu.cx.wrapping_add(1).wrapping_add(flaw);
            }
            Instruction::DecC => {
                creature.cpu.cx = creature.cpu.cx.wrapping_sub(1).wrapping_add(flaw);
            }

            Instruction::PushAx => creature.cpu.push(creature.cpu.ax.wrapping_add(flaw)),
            Instruction::PushBx => creature.cpu.push(creature.cpu.bx.wrapping_add(flaw)),
            Instruction::PushCx => creature.cpu.push(creature.cpu.cx.wrapping_add(flaw)),
            Instruction::PushDx => creature.cpu.push(creature.cpu.dx.wrapping_add(flaw)),

            Instruction::PopAx => match creature.cpu.pop() {
                Some(value) => creature.cpu.ax = value.wrapping_add(flaw),
                None => creature.note_error(),
            },
            Instruction::PopBx => match creature.cpu.pop() {
                Some(value) => creature.cpu.bx = value.wrapping_add(flaw),
                None => creature.note_error(),
            },
            Instruction::PopCx => match creature.cpu.pop() {
                Some(value) => creature.cpu.cx = value.wrapping_add(flaw),
                None => creature.note_error(),
            },
            Instruction::PopDx => match creature.cpu.pop() {
                Some(value) => creature.cpu.dx = value.wrapping_add(flaw),
                None => creature.note_error(),
            },

            Instruction::Jmp => {
                let template = read_template(world.soup(), next_ip);
                let origin = (next_ip + template.len() as u32) % soup_size;
                match world.soup().find_template_nearest(origin, &template, window) {
                    Some(target) => next_ip = target,
                    None => creature.note_error(),
                }
            }

            Instruction::Jmpb => {
                let template = read_template(world.soup(), next_ip);
                let origin = (next_ip + template.len() as u32) % soup_size;
                match world.soup().find_template_backward(origin, &template, window) {
                    Some(target) => next_ip = target,
                    None => creature.note_error(),
                }
            }

            Instruction::Call => {
                let template = read_template(world.soup(), next_ip);
                let origin = (next_ip + template.len() as u32) % soup_size;
                match world.soup().find_template_nearest(origin, &template, window) {
                    Some(target) => {
                        creature.cpu.push(origin as i32);
                        next_ip = target;
                    }
                    None => creature.note_error(),
                }
            }

            Instruction::Ret => match creature.cpu.pop() {
                Some(addr) => next_ip = soup_addr(addr, soup_size),
                None => creature.note_error(),
            },

            Instruction::MovCd => {
                creature.cpu.dx = creature.cpu.cx.wrapping_add(flaw);
            }

            Instruction::MovAb => {
                creature.cpu.bx = creature.cpu.ax.wrapping_add(flaw);
            }

            Instruction::MovIab => {
                let dest = soup_addr(creature.cpu.ax, soup_size);
                let src = soup_addr(creature.cpu.bx, soup_size);
                let mut copied = world.soup().read(src);
                if world.copy_error_pending() {
                    copied = world.mutate_instruction(copied);
                }
                if flaw != 0 {
                    copied = flawed_instruction(copied, flaw);
                }
                world.soup_mut().write(dest, copied);
                creature.note_move();
            }

            Instruction::Adr => {
                let template = read_template(world.soup(), next_ip);
                let origin = (next_ip + template.len() as u32) % soup_size;
                match world.soup().find_template_nearest(origin, &template, window) {
                    Some(target) => creature.cpu.ax = target as i32,
                    None => creature.note_error(),
                }
            }

            Instruction::Adrb => {
                let template = read_template(world.soup(), next_ip);
                let origin = (next_ip + template.len() as u32) % soup_size;
                match world.soup().find_template_backward(origin, &template, window) {
                    Some(target) => creature.cpu.ax = target as i32,
                    None => creature.note_error(),
                }
            }

            Instruction::Adrf => {
                let template = read_template(world.soup(), next_ip);
                let origin = (next_ip + template.len() as u32) % soup_size;
                match world.soup().find_template_forward(origin, &template, window) {
                    Some(target) => creature.cpu.ax = target as i32,
                    None => creature.note_error(),
                }
            }

            Instruction::Mal => {
                if creature.cpu.cx <= 0 {
                    creature.note_error();
                } else {
                    let length = creature.cpu.cx as u32;
                    // a second mal abandons the unfinished daughter
                    if creature.is_dividing() {
                        world.discard_daughter(creature);
                    }
                    match world.allocate_space_for_offspring(creature, length) {
                        Some(child) => {
                            creature.cpu.ax = child.location() as i32;
                            creature.set_daughter(child);
                        }
                        None => creature.note_error(),
                    }
                }
            }

            Instruction::Divide => {
                // a daughter is only viable once something was copied into it
                if creature.is_dividing() && creature.num_moves() > 0 {
                    daughter = creature.take_daughter();
                } else {
                    creature.note_error();
                }
            }
        }

        creature.cpu.ip = next_ip;
        daughter
    }
}
