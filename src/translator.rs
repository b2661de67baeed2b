//! The multi-pass resolver: source text in, a [`Program`] artifact out.
//! `translate` is a pure, total function of its input for a fixed device
//! count (§4.2 of the spec). No partial state escapes a failed run.

use crate::errors::{LinkError, ParseError, ShapeError, SourceLocation, TranslatorError};
use crate::isa::{Opcode, Operand, Register, DEVICE_COUNT};
use crate::lexer::{self, RawValue, Term};
use crate::program::{Instruction, Program};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Text,
    Data,
}

struct Labels {
    map: HashMap<String, (i32, SourceLocation)>,
}

impl Labels {
    fn new() -> Labels {
        Labels { map: HashMap::new() }
    }

    fn define(&mut self, name: &str, addr: i32, at: &SourceLocation) -> Result<(), LinkError> {
        if let Some((_, first_at)) = self.map.get(name) {
            return Err(LinkError::DuplicateLabel {
                name: name.to_string(),
                first_at: first_at.clone(),
                second_at: at.clone(),
            });
        }
        self.map.insert(name.to_string(), (addr, at.clone()));
        Ok(())
    }

    fn resolve(&self, name: &str, at: &SourceLocation) -> Result<i32, LinkError> {
        self.map
            .get(name)
            .map(|(addr, _)| *addr)
            .ok_or_else(|| LinkError::UndefinedLabel { name: name.to_string(), at: at.clone() })
    }
}

/// Translate a complete source file into a machine-code artifact.
pub fn translate(source: &str) -> Result<Program, TranslatorError> {
    let terms = lexer::tokenize(source)?;

    let mut labels = Labels::new();
    let mut text_instrs: Vec<(String, Vec<RawValue>, SourceLocation)> = Vec::new();
    let mut word_decls: Vec<(RawValue, SourceLocation)> = Vec::new();
    let mut vector_writes: Vec<(RawValue, RawValue, SourceLocation)> = Vec::new();

    let mut section: Option<Section> = None;
    let mut text_addr: i32 = 0;
    let mut data_addr: i32 = DEVICE_COUNT as i32;

    for tagged in &terms {
        let at = SourceLocation::new(tagged.line_number, tagged.line.clone());
        match &tagged.term {
            Term::SectionText => section = Some(Section::Text),
            Term::SectionData => section = Some(Section::Data),
            Term::Label(name) => match section {
                Some(Section::Text) => {
                    labels.define(name, text_addr, &at)?;
                }
                Some(Section::Data) => {
                    labels.define(name, data_addr, &at)?;
                }
                None => return Err(ParseError::ContentBeforeSection { at }.into()),
            },
            Term::WordDecl(value) => match section {
                Some(Section::Data) => {
                    word_decls.push((value.clone(), at));
                    data_addr += 1;
                }
                Some(Section::Text) => {
                    return Err(ParseError::MisplacedTerm { what: "word declaration", section: "text", at }.into());
                }
                None => return Err(ParseError::ContentBeforeSection { at }.into()),
            },
            Term::IntVectorDecl(vector_index, target) => match section {
                Some(Section::Data) => {
                    vector_writes.push((vector_index.clone(), target.clone(), at));
                }
                Some(Section::Text) => {
                    return Err(ParseError::MisplacedTerm {
                        what: "interrupt vector declaration",
                        section: "text",
                        at,
                    }
                    .into());
                }
                None => return Err(ParseError::ContentBeforeSection { at }.into()),
            },
            Term::Instr(mnemonic, operands) => match section {
                Some(Section::Text) => {
                    text_instrs.push((mnemonic.clone(), operands.clone(), at));
                    text_addr += 1;
                }
                Some(Section::Data) => {
                    return Err(ParseError::MisplacedTerm { what: "instruction", section: "data", at }.into());
                }
                None => return Err(ParseError::ContentBeforeSection { at }.into()),
            },
        }
    }

    let mut data = vec![0i32; DEVICE_COUNT];
    for (vector_index_raw, target_raw, at) in &vector_writes {
        let index = resolve_plain_value(vector_index_raw, &labels, at)?;
        let target = resolve_plain_value(target_raw, &labels, at)?;
        if index < 0 || index as usize >= DEVICE_COUNT {
            return Err(ShapeError::VectorIndexOutOfRange { index, device_count: DEVICE_COUNT, at: at.clone() }.into());
        }
        data[index as usize] = target;
    }
    for (raw, at) in &word_decls {
        data.push(resolve_plain_value(raw, &labels, at)?);
    }

    let mut code = Vec::with_capacity(text_instrs.len());
    for (mnemonic, operands, at) in &text_instrs {
        code.push(validate_and_resolve_instruction(mnemonic, operands, at, &labels)?);
    }

    Ok(Program { code, data })
}

fn validate_and_resolve_instruction(
    mnemonic: &str,
    raw_operands: &[RawValue],
    at: &SourceLocation,
    labels: &Labels,
) -> Result<Instruction, TranslatorError> {
    let opcode = Opcode::from_mnemonic(mnemonic).expect("lexer already validated this mnemonic");
    let shape = opcode
        .shape()
        .ok_or_else(|| ShapeError::NotAnInstruction { mnemonic: mnemonic.to_string(), at: at.clone() })?;

    let slots: Vec<&'static str> = [("out", shape.out), ("arg1", shape.arg1), ("arg2", shape.arg2)]
        .into_iter()
        .filter(|(_, present)| *present)
        .map(|(name, _)| name)
        .collect();

    if raw_operands.len() != slots.len() {
        return Err(ShapeError::WrongArity {
            mnemonic: mnemonic.to_string(),
            expected: if slots.is_empty() { "no operands".to_string() } else { slots.join(", ") },
            found: raw_operands.len(),
            at: at.clone(),
        }
        .into());
    }

    let mut out = None;
    let mut arg1 = None;
    let mut arg2 = None;

    for (slot, raw) in slots.iter().zip(raw_operands.iter()) {
        match *slot {
            "out" => {
                let reg = resolve_register_operand(raw, mnemonic, "out", at)?;
                if !reg.is_writable_by_instruction() {
                    return Err(ShapeError::NotAWritableRegister {
                        mnemonic: mnemonic.to_string(),
                        register: reg.name().to_string(),
                        at: at.clone(),
                    }
                    .into());
                }
                out = Some(reg);
            }
            "arg1" => arg1 = Some(resolve_register_operand(raw, mnemonic, "arg1", at)?),
            "arg2" => arg2 = Some(resolve_value_operand(raw, labels, at)?),
            _ => unreachable!("slots are built from a fixed three-element list"),
        }
    }

    Ok(Instruction::new(opcode, out, arg1, arg2))
}

fn resolve_register_operand(
    raw: &RawValue,
    mnemonic: &str,
    slot: &'static str,
    at: &SourceLocation,
) -> Result<Register, ShapeError> {
    match raw {
        RawValue::Ident(name) => Register::from_name(name).ok_or_else(|| ShapeError::NotARegister {
            mnemonic: mnemonic.to_string(),
            slot,
            found: name.clone(),
            at: at.clone(),
        }),
        RawValue::Number(_) | RawValue::Char(_) => {
            Err(ShapeError::ConstInRegisterOnlySlot { mnemonic: mnemonic.to_string(), slot, at: at.clone() })
        }
    }
}

fn resolve_value_operand(raw: &RawValue, labels: &Labels, at: &SourceLocation) -> Result<Operand, LinkError> {
    match raw {
        RawValue::Number(n) => Ok(Operand::Const(*n)),
        RawValue::Char(c) => Ok(Operand::Const(*c as i32)),
        RawValue::Ident(name) => match Register::from_name(name) {
            Some(reg) => Ok(Operand::Register(reg)),
            None => labels.resolve(name, at).map(Operand::Const),
        },
    }
}

fn resolve_plain_value(raw: &RawValue, labels: &Labels, at: &SourceLocation) -> Result<i32, LinkError> {
    match raw {
        RawValue::Number(n) => Ok(*n),
        RawValue::Char(c) => Ok(*c as i32),
        RawValue::Ident(name) => labels.resolve(name, at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::OperandType;

    #[test]
    fn resolves_forward_label_references() {
        let source = "section text\n  jmp done\n  halt\ndone:\n  halt\n";
        let program = translate(source).unwrap();
        assert_eq!(program.code.len(), 3);
        assert_eq!(program.code[0].opcode, Opcode::Jmp);
        assert_eq!(program.code[0].arg2, Some(Operand::Const(2)));
        assert_eq!(program.code[0].arg2_type, Some(OperandType::Const));
    }

    #[test]
    fn duplicate_label_is_a_link_error() {
        let source = "section text\nfoo:\n  halt\nfoo:\n  halt\n";
        let err = translate(source).unwrap_err();
        assert!(matches!(err, TranslatorError::Link(LinkError::DuplicateLabel { .. })));
    }

    #[test]
    fn undefined_label_is_a_link_error() {
        let source = "section text\n  jmp nowhere\n";
        let err = translate(source).unwrap_err();
        assert!(matches!(err, TranslatorError::Link(LinkError::UndefinedLabel { .. })));
    }

    #[test]
    fn const_as_write_target_is_a_shape_error() {
        let source = "section text\n  add 5 r1 r2\n";
        let err = translate(source).unwrap_err();
        assert!(matches!(err, TranslatorError::Shape(ShapeError::ConstInRegisterOnlySlot { .. })));
    }

    #[test]
    fn r0_cannot_be_a_write_target() {
        let source = "section text\n  add r0 r1 r2\n";
        let err = translate(source).unwrap_err();
        assert!(matches!(err, TranslatorError::Shape(ShapeError::NotAWritableRegister { .. })));
    }

    #[test]
    fn data_section_populates_vector_table_then_words() {
        let source = "section data\n  int 0 handler\n  word 65\n  word 66\nsection text\nhandler:\n  halt\n";
        let program = translate(source).unwrap();
        assert_eq!(program.data, vec![0, 65, 66]);
    }

    #[test]
    fn word_value_can_reference_a_label() {
        let source = "section data\nval:\n  word 10\n  word val\nsection text\n  halt\n";
        let program = translate(source).unwrap();
        assert_eq!(program.data, vec![0, 10, 1]);
    }

    #[test]
    fn char_literal_resolves_to_its_codepoint() {
        let source = "section text\n  out 'A'\n  halt\n";
        let program = translate(source).unwrap();
        assert_eq!(program.code[0].arg2, Some(Operand::Const('A' as i32)));
    }
}
