use std::io::{self, Write};

use crate::instruction::Instruction;
use crate::keyboard::Keyboard;
use crate::memory::Memory;
use crate::registers::{Reg, Registers};
use crate::trap::TrapVector;
use crate::word::sign_extend;

// RTI and RES are reserved and have no recovery path; the driver reports the PC and
// offending word and aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalOpcode {
    pub pc: u16,
    pub instruction: u16,
}

impl std::fmt::Display for IllegalOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "illegal opcode {:#06x} at {:#06x}",
            self.instruction, self.pc
        )
    }
}

impl std::error::Error for IllegalOpcode {}

pub struct Machine {
    registers: Registers,
    memory: Memory,
    running: bool,
}

impl Machine {
    pub fn new(keyboard: Box<dyn Keyboard>) -> Self {
        Self {
            registers: Registers::new(),
            memory: Memory::new(keyboard),
            running: true,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    // PC is incremented before the instruction runs, so every PC-relative offset below is
    // relative to the address immediately following the instruction being executed.
    pub fn step(&mut self) -> Result<(), IllegalOpcode> {
        let pc = self.registers.pc();
        let instruction = self.memory.read(pc);
        self.registers.set_pc(pc.wrapping_add(1));

        self.execute(Instruction::decode(instruction))
            .map_err(|()| IllegalOpcode { pc, instruction })
    }

    pub fn run(&mut self) -> Result<(), IllegalOpcode> {
        while self.running {
            self.step()?;
        }
        Ok(())
    }

    fn execute(&mut self, instruction: Instruction) -> Result<(), ()> {
        match instruction {
            // BR - Conditional Branch
            //
            // The condition codes named by the mask are tested against COND. If any named flag
            // is currently set, PC is advanced by the sign-extended PCoffset9. An all-clear mask
            // never branches; an all-set mask always branches (BRnzp, i.e. unconditional BR).
            Instruction::Br(mask, pc_offset) => {
                use crate::registers::Condition::*;
                let taken = match self.registers.condition() {
                    Neg => mask.n,
                    Zro => mask.z,
                    Pos => mask.p,
                };
                if taken {
                    self.branch(pc_offset, 9);
                }
            }

            // ADD - Addition (register mode): DR <- SR1 + SR2, flags set on DR.
            Instruction::Add(dr, sr1, sr2) => {
                let value = self
                    .registers
                    .read(sr1)
                    .wrapping_add(self.registers.read(sr2));
                self.registers.write_and_set_flags(dr, value);
            }
            // ADD - Addition (immediate mode): DR <- SR1 + sign_extend(imm5), flags set on DR.
            Instruction::AddImm(dr, sr1, imm5) => {
                let value = self.registers.read(sr1).wrapping_add(imm5);
                self.registers.write_and_set_flags(dr, value);
            }

            // LD - PC-relative Load: DR <- mem[PC + PCoffset9], flags set on DR.
            Instruction::Ld(dr, pc_offset) => {
                let address = self.registers.pc().wrapping_add(sign_extend(pc_offset, 9));
                let value = self.memory.read(address);
                self.registers.write_and_set_flags(dr, value);
            }

            // ST - PC-relative Store: mem[PC + PCoffset9] <- SR. Flags unchanged.
            Instruction::St(sr, pc_offset) => {
                let address = self.registers.pc().wrapping_add(sign_extend(pc_offset, 9));
                self.memory.write(address, self.registers.read(sr));
            }

            // JSR - Jump to Subroutine (PC-relative form).
            //
            // The incremented PC is saved into R7 *before* PC is overwritten, because JSRR's
            // BaseR may itself be R7; here there is no BaseR so the ordering is moot,
            // but both arms share this discipline for consistency with JSRR below.
            Instruction::Jsr(pc_offset) => {
                let link = self.registers.pc();
                self.registers.write(Reg::R7, link);
                self.registers
                    .set_pc(link.wrapping_add(sign_extend(pc_offset, 11)));
            }
            // JSRR - Jump to Subroutine (register form): PC <- BaseR, R7 <- old PC.
            Instruction::Jsrr(base) => {
                let link = self.registers.pc();
                let target = self.registers.read(base);
                self.registers.write(Reg::R7, link);
                self.registers.set_pc(target);
            }

            // AND - Bitwise AND (register mode): DR <- SR1 & SR2, flags set on DR.
            Instruction::And(dr, sr1, sr2) => {
                let value = self.registers.read(sr1) & self.registers.read(sr2);
                self.registers.write_and_set_flags(dr, value);
            }
            // AND - Bitwise AND (immediate mode): DR <- SR1 & sign_extend(imm5), flags set on DR.
            Instruction::AndImm(dr, sr1, imm5) => {
                let value = self.registers.read(sr1) & imm5;
                self.registers.write_and_set_flags(dr, value);
            }

            // LDR - Base+offset Load: DR <- mem[BaseR + offset6], flags set on DR.
            Instruction::Ldr(dr, base, offset) => {
                let address = self.registers.read(base).wrapping_add(sign_extend(offset, 6));
                let value = self.memory.read(address);
                self.registers.write_and_set_flags(dr, value);
            }

            // STR - Base+offset Store: mem[BaseR + offset6] <- SR. Flags unchanged.
            Instruction::Str(sr, base, offset) => {
                let address = self.registers.read(base).wrapping_add(sign_extend(offset, 6));
                self.memory.write(address, self.registers.read(sr));
            }

            // RTI - reserved for interrupt return, never generated by user programs. Fatal.
            Instruction::Unused => return Err(()),

            // NOT - Bitwise Complement: DR <- !SR, flags set on DR.
            Instruction::Not(dr, sr) => {
                let value = !self.registers.read(sr);
                self.registers.write_and_set_flags(dr, value);
            }

            // LDI - Load Indirect: DR <- mem[mem[PC + PCoffset9]], flags set on DR.
            Instruction::Ldi(dr, pc_offset) => {
                let pointer = self.registers.pc().wrapping_add(sign_extend(pc_offset, 9));
                let address = self.memory.read(pointer);
                let value = self.memory.read(address);
                self.registers.write_and_set_flags(dr, value);
            }

            // STI - Store Indirect: mem[mem[PC + PCoffset9]] <- SR. Flags unchanged.
            Instruction::Sti(sr, pc_offset) => {
                let pointer = self.registers.pc().wrapping_add(sign_extend(pc_offset, 9));
                let address = self.memory.read(pointer);
                self.memory.write(address, self.registers.read(sr));
            }

            // JMP / RET - Jump: PC <- BaseR. RET is simply JMP R7. Flags unchanged.
            Instruction::Jmp(base) => {
                self.registers.set_pc(self.registers.read(base));
            }

            // RES - reserved, never a legal opcode. Fatal.
            Instruction::Reserved => return Err(()),

            // LEA - Load Effective Address: DR <- PC + PCoffset9.
            //
            // No memory access: the computed address itself is the value loaded. This preserves
            // the legacy (pre-2019) behavior of also setting the condition codes.
            Instruction::Lea(dr, pc_offset) => {
                let address = self.registers.pc().wrapping_add(sign_extend(pc_offset, 9));
                self.registers.write_and_set_flags(dr, address);
            }

            // TRAP - System Call: dispatch to one of the six service routines. This
            // design does not save R7 on TRAP entry, matching the unmodified reference behavior.
            Instruction::Trap(trap_vector) => self.execute_trap(trap_vector),
        }

        Ok(())
    }

    fn branch(&mut self, offset: u16, width: u32) {
        let pc = self.registers.pc();
        self.registers.set_pc(pc.wrapping_add(sign_extend(offset, width)));
    }

    fn execute_trap(&mut self, trap_vector: TrapVector) {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();

        match trap_vector {
            // GETC - read one character from the keyboard, unechoed, zero-extended into R0.
            // Flags unchanged. EOF yields a zero character.
            TrapVector::Getc => {
                let byte = self.memory.read_blocking_char().unwrap_or(0);
                self.registers.write(Reg::R0, u16::from(byte));
            }

            // OUT - write R0's low byte to stdout and flush.
            TrapVector::Out => {
                let byte = self.registers.read(Reg::R0) as u8;
                let _ = stdout.write_all(&[byte]);
                let _ = stdout.flush();
            }

            // PUTS - print the NUL-terminated string of one-character-per-word starting at R0.
            TrapVector::Puts => {
                let mut address = self.registers.read(Reg::R0);
                loop {
                    let word = self.memory.read(address);
                    if word == 0 {
                        break;
                    }
                    let _ = stdout.write_all(&[word as u8]);
                    address = address.wrapping_add(1);
                }
                let _ = stdout.flush();
            }

            // IN - prompt, read and echo one character, zero-extend it into R0.
            TrapVector::In => {
                let _ = stdout.write_all(b"Enter a character: ");
                let _ = stdout.flush();
                let byte = self.memory.read_blocking_char().unwrap_or(0);
                let _ = stdout.write_all(&[byte]);
                let _ = stdout.flush();
                self.registers.write(Reg::R0, u16::from(byte));
            }

            // PUTSP - print two characters per word (low byte first, then high byte if
            // nonzero), starting at R0, until a zero word is seen.
            TrapVector::Putsp => {
                let mut address = self.registers.read(Reg::R0);
                loop {
                    let word = self.memory.read(address);
                    if word == 0 {
                        break;
                    }
                    let low = (word & 0xFF) as u8;
                    let _ = stdout.write_all(&[low]);
                    let high = (word >> 8) as u8;
                    if high != 0 {
                        let _ = stdout.write_all(&[high]);
                    }
                    address = address.wrapping_add(1);
                }
                let _ = stdout.flush();
            }

            // HALT - announce and clear the running flag.
            TrapVector::Halt => {
                let _ = stdout.write_all(b"HALT\n");
                let _ = stdout.flush();
                self.running = false;
            }

            // Any vector outside the six defined ones is a no-op, not a fault.
            TrapVector::Unknown(_) => {}
        }
    }
}
