//! Closed enumerations shared by the translator and the simulator: opcodes,
//! register names, operand types, and the operand-arity table that both
//! sides consult.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The number of interrupt-capable devices this toolchain supports. Fixed
/// at 1: data cell 0 is the sole interrupt vector.
pub const DEVICE_COUNT: usize = 1;

/// Every mnemonic the translator and simulator know about, including the
/// `int` pseudo-op that only ever appears in `section data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    Add,
    Sub,
    Div,
    Mod,
    Mul,
    Cmp,
    Je,
    Jne,
    Jmp,
    Out,
    In,
    Ld,
    Sv,
    Iret,
    Sti,
    Cli,
    Halt,
    Int,
}

impl Opcode {
    /// Parse a mnemonic as it appears in source text (case-sensitive,
    /// lowercase only; this ISA has no uppercase convention).
    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        use Opcode::*;
        Some(match mnemonic {
            "add" => Add,
            "sub" => Sub,
            "div" => Div,
            "mod" => Mod,
            "mul" => Mul,
            "cmp" => Cmp,
            "je" => Je,
            "jne" => Jne,
            "jmp" => Jmp,
            "out" => Out,
            "in" => In,
            "ld" => Ld,
            "sv" => Sv,
            "iret" => Iret,
            "sti" => Sti,
            "cli" => Cli,
            "halt" => Halt,
            "int" => Int,
            _ => return None,
        })
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Add => "add",
            Sub => "sub",
            Div => "div",
            Mod => "mod",
            Mul => "mul",
            Cmp => "cmp",
            Je => "je",
            Jne => "jne",
            Jmp => "jmp",
            Out => "out",
            In => "in",
            Ld => "ld",
            Sv => "sv",
            Iret => "iret",
            Sti => "sti",
            Cli => "cli",
            Halt => "halt",
            Int => "int",
        }
    }

    /// The fixed operand shape for this opcode, per the arity table in §6.
    /// `Int` has no shape here: it is a data-section declaration, not an
    /// instruction, and is handled entirely by the parser/translator.
    pub fn shape(self) -> Option<Shape> {
        use Opcode::*;
        Some(match self {
            Add | Sub | Div | Mod | Mul | Cmp => Shape {
                out: true,
                arg1: true,
                arg2: true,
            },
            Je | Jne => Shape {
                out: false,
                arg1: true,
                arg2: true,
            },
            Jmp => Shape {
                out: false,
                arg1: false,
                arg2: true,
            },
            Ld => Shape {
                out: true,
                arg1: false,
                arg2: true,
            },
            Sv => Shape {
                out: false,
                arg1: true,
                arg2: true,
            },
            In => Shape {
                out: true,
                arg1: false,
                arg2: false,
            },
            Out => Shape {
                out: false,
                arg1: false,
                arg2: true,
            },
            Sti | Cli | Halt | Iret => Shape {
                out: false,
                arg1: false,
                arg2: false,
            },
            Int => return None,
        })
    }

    /// Base tick cost of the instruction. `je`/`jne` add one more tick when
    /// the branch is taken; that adjustment lives in the control unit, not
    /// here, since it depends on runtime register state.
    pub fn base_ticks(self) -> u64 {
        match self {
            Opcode::Iret => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// Which operand slots an opcode uses, and whether they are present at all.
/// Every present slot's *kind* (register-only vs register-or-const) is
/// fixed by the opcode family, not recorded here: `out`/`arg1` are always
/// register-only, `arg2` is always register-or-const, when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub out: bool,
    pub arg1: bool,
    pub arg2: bool,
}

/// The seven architectural registers. `R0` is hardwired to zero on read and
/// discards writes; `Pc` is writable only through CU-driven control paths
/// (jumps, `iret`, fetch increment), never as an instruction's `out` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    Sp,
    Pc,
}

impl Register {
    pub fn from_name(name: &str) -> Option<Register> {
        use Register::*;
        Some(match name {
            "r0" => R0,
            "r1" => R1,
            "r2" => R2,
            "r3" => R3,
            "r4" => R4,
            "sp" => Sp,
            "pc" => Pc,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use Register::*;
        match self {
            R0 => "r0",
            R1 => "r1",
            R2 => "r2",
            R3 => "r3",
            R4 => "r4",
            Sp => "sp",
            Pc => "pc",
        }
    }

    /// Registers an instruction may target as `out`: everything but `r0`
    /// (reads-as-zero, writes discarded) and `pc` (CU-only write paths).
    pub fn is_writable_by_instruction(self) -> bool {
        matches!(
            self,
            Register::R1 | Register::R2 | Register::R3 | Register::R4 | Register::Sp
        )
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Tags whether an `arg2`/`val` operand carries a register or an immediate.
/// Present in the artifact only alongside a present `arg2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperandType {
    Register,
    Const,
}

/// A resolved `arg2`/`val` operand: either a register to read, or an
/// immediate baked in at translation time (a label reference or a
/// character literal resolves to this).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Register(Register),
    Const(i32),
}

impl Operand {
    pub fn operand_type(self) -> OperandType {
        match self {
            Operand::Register(_) => OperandType::Register,
            Operand::Const(_) => OperandType::Const,
        }
    }
}
