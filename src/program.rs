//! The machine-code artifact: one instruction record per opcode family,
//! plus the data image (interrupt vector table, `word` declarations, and
//! uninitialised stack/general memory beyond them).
//!
//! This is the only externally-visible shape (§6 of the spec): the
//! translator produces it, `serde_json` serializes it to a `.bin` file,
//! and the simulator deserializes the same bytes back into this type.

use crate::isa::{Opcode, Operand, OperandType, Register};
use serde::{Deserialize, Serialize};

/// One instruction, in the externally-visible JSON shape: a field is
/// present only when the opcode's arity (§6) calls for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub out: Option<Register>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub arg1: Option<Register>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub arg2: Option<Operand>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub arg2_type: Option<OperandType>,
}

impl Instruction {
    pub fn new(opcode: Opcode, out: Option<Register>, arg1: Option<Register>, arg2: Option<Operand>) -> Instruction {
        Instruction {
            opcode,
            out,
            arg1,
            arg2,
            arg2_type: arg2.map(Operand::operand_type),
        }
    }
}

/// The complete artifact a translator run produces and a simulator run
/// loads: `code` is the instruction memory, `data` is the data memory
/// (vector table followed by declared `word` cells followed by
/// zero-filled stack/general memory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub code: Vec<Instruction>,
    pub data: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg2_type_always_mirrors_arg2_presence() {
        let instr = Instruction::new(Opcode::Add, Some(Register::R1), Some(Register::R2), Some(Operand::Const(5)));
        assert_eq!(instr.arg2_type, Some(OperandType::Const));

        let instr = Instruction::new(Opcode::Halt, None, None, None);
        assert_eq!(instr.arg2_type, None);
    }

    #[test]
    fn json_round_trip_preserves_omitted_fields() {
        let program = Program {
            code: vec![
                Instruction::new(Opcode::Ld, Some(Register::R1), None, Some(Operand::Const(3))),
                Instruction::new(Opcode::Halt, None, None, None),
            ],
            data: vec![0, 65, 66],
        };
        let json = serde_json::to_string(&program).unwrap();
        assert!(!json.contains("arg1"));
        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(back, program);
    }
}
