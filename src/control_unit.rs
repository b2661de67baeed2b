//! The fetch/decode/execute loop, program-counter management, and
//! interrupt micro-sequencing. The control unit never touches memory or
//! registers directly; it drives the [`DataPath`] one signal at a time,
//! the same way the datapath's own doc comments describe.

use crate::datapath::{AluOp, DataPath};
use crate::errors::SimError;
use crate::isa::{Opcode, Operand, Register};
use crate::program::Instruction;

/// What a single `step` produced, so the driver can decide whether to keep
/// going. Mirrors the spec's explicit redesign away from exceptions: a
/// step never unwinds, it reports its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Halted,
    Error(SimError),
}

/// One retired cycle, for post-hoc inspection. `opcode` is `None` for a
/// cycle that was entirely consumed by interrupt entry (no user
/// instruction executes in that cycle).
#[derive(Debug, Clone)]
pub struct JournalRecord {
    pub pc: i32,
    pub opcode: Option<Opcode>,
    pub tick_after: u64,
    pub instr_counter_after: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Fallthrough,
    Jumped,
    Halted,
}

pub struct ControlUnit {
    tick: u64,
    instr_counter: u64,
    interrupts_enabled: bool,
    in_interrupt: bool,
}

impl ControlUnit {
    pub fn new() -> ControlUnit {
        ControlUnit { tick: 0, instr_counter: 0, interrupts_enabled: false, in_interrupt: false }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn instr_counter(&self) -> u64 {
        self.instr_counter
    }

    pub fn in_interrupt(&self) -> bool {
        self.in_interrupt
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    /// Runs one instruction cycle: interrupt check, fetch, decode/execute,
    /// pc update, bookkeeping. Returns the outcome and the journal record
    /// for the cycle, if one was retired (a cycle always retires exactly
    /// one record, whether that's interrupt entry or a user instruction).
    pub fn step(&mut self, dp: &mut DataPath, code: &[Instruction]) -> (StepOutcome, Option<JournalRecord>) {
        if self.in_interrupt {
            // No queueing, no pending bit: entries that arrive while the
            // handler is running are lost, not delivered on return.
            while dp.next_schedule_tick().is_some_and(|t| t <= self.tick) {
                dp.drop_next_scheduled_input();
            }
        } else if self.interrupts_enabled && dp.next_schedule_tick().is_some_and(|t| t <= self.tick) {
            return match self.enter_interrupt(dp) {
                Ok(()) => {
                    self.tick += 4;
                    self.instr_counter += 1;
                    let record = JournalRecord {
                        pc: dp.pc(),
                        opcode: None,
                        tick_after: self.tick,
                        instr_counter_after: self.instr_counter,
                    };
                    (StepOutcome::Continue, Some(record))
                }
                Err(e) => (StepOutcome::Error(e), None),
            };
        }

        let pc = dp.pc();
        let instr = match code.get(pc as usize) {
            Some(instr) => *instr,
            None => return (StepOutcome::Error(SimError::MemoryError { address: pc as i64 }), None),
        };

        let effect = match self.execute(dp, &instr) {
            Ok(effect) => effect,
            Err(e) => return (StepOutcome::Error(e), None),
        };

        let ticks = match (instr.opcode, effect) {
            (Opcode::Je, Effect::Jumped) | (Opcode::Jne, Effect::Jumped) => 2,
            _ => instr.opcode.base_ticks(),
        };
        if effect == Effect::Fallthrough {
            dp.set_pc(pc + 1);
        }
        self.tick += ticks;
        self.instr_counter += 1;

        let record = JournalRecord {
            pc,
            opcode: Some(instr.opcode),
            tick_after: self.tick,
            instr_counter_after: self.instr_counter,
        };
        if effect == Effect::Halted {
            (StepOutcome::Halted, Some(record))
        } else {
            (StepOutcome::Continue, Some(record))
        }
    }

    fn execute(&mut self, dp: &mut DataPath, instr: &Instruction) -> Result<Effect, SimError> {
        use Opcode::*;
        match instr.opcode {
            Add | Sub | Div | Mod | Mul | Cmp => {
                let arg1 = instr.arg1.expect("arity table guarantees arg1 for arithmetic opcodes");
                let out = instr.out.expect("arity table guarantees out for arithmetic opcodes");
                let arg2 = instr.arg2.expect("arity table guarantees arg2 for arithmetic opcodes");
                dp.select_operands(arg1, operand_register(arg2), Some(out));
                dp.latch_alu(operand_const(arg2));
                dp.execute_alu(alu_op_for(instr.opcode))?;
                dp.latch_output();
                Ok(Effect::Fallthrough)
            }
            Je | Jne => {
                let arg1 = instr.arg1.expect("arity table guarantees arg1 for je/jne");
                let val = instr.arg2.expect("arity table guarantees arg2 for je/jne");
                dp.select_operands(arg1, None, None);
                dp.latch_alu(Some(0));
                dp.execute_alu(AluOp::Cmp).expect("comparing against zero never divides");
                let zero = dp.zero_flag();
                let taken = if instr.opcode == Je { zero } else { !zero };
                if taken {
                    resolve_to_bus(dp, val);
                    dp.select_operands(Register::R0, None, Some(Register::Pc));
                    dp.latch_output();
                    Ok(Effect::Jumped)
                } else {
                    Ok(Effect::Fallthrough)
                }
            }
            Jmp => {
                let val = instr.arg2.expect("arity table guarantees arg2 for jmp");
                resolve_to_bus(dp, val);
                dp.select_operands(Register::R0, None, Some(Register::Pc));
                dp.latch_output();
                Ok(Effect::Jumped)
            }
            Ld => {
                let val = instr.arg2.expect("arity table guarantees arg2 for ld");
                let out = instr.out.expect("arity table guarantees out for ld");
                resolve_to_bus(dp, val);
                dp.read_memory()?;
                dp.select_operands(Register::R0, None, Some(out));
                dp.latch_output();
                Ok(Effect::Fallthrough)
            }
            Sv => {
                let arg1 = instr.arg1.expect("arity table guarantees arg1 for sv");
                let val = instr.arg2.expect("arity table guarantees arg2 for sv");
                let value = dp.read_register(arg1);
                resolve_to_bus(dp, val);
                dp.write_memory(value)?;
                Ok(Effect::Fallthrough)
            }
            In => {
                let out = instr.out.expect("arity table guarantees out for in");
                match dp.take_interrupt_char() {
                    Some(ch) => {
                        dp.input_from_device(ch);
                        dp.select_operands(Register::R0, None, Some(out));
                        dp.latch_output();
                        Ok(Effect::Fallthrough)
                    }
                    None => Err(SimError::IOError),
                }
            }
            Out => {
                let val = instr.arg2.expect("arity table guarantees arg2 for out");
                resolve_to_bus(dp, val);
                dp.print_to_device();
                Ok(Effect::Fallthrough)
            }
            Iret => {
                self.execute_iret(dp)?;
                Ok(Effect::Jumped)
            }
            Sti => {
                self.interrupts_enabled = true;
                Ok(Effect::Fallthrough)
            }
            Cli => {
                self.interrupts_enabled = false;
                Ok(Effect::Fallthrough)
            }
            Halt => Ok(Effect::Halted),
            Int => unreachable!("int is a data-section pseudo-op; the translator never emits it as code"),
        }
    }

    /// 4 ticks: push `pc`, load the vector cell into `pc`, latch the
    /// pending character, disable interrupts for the handler prologue.
    fn enter_interrupt(&mut self, dp: &mut DataPath) -> Result<(), SimError> {
        dp.select_operands(Register::Sp, None, Some(Register::Sp));
        dp.execute_alu(AluOp::Dec).expect("decrementing sp never divides");
        dp.latch_output();

        let pc = dp.pc();
        dp.select_operands(Register::Sp, None, None);
        dp.execute_alu(AluOp::Left).expect("LEFT pass-through never divides");
        dp.write_memory(pc)?;

        dp.select_operands(Register::R0, None, Some(Register::Pc));
        dp.latch_alu(Some(0));
        dp.execute_alu(AluOp::Right).expect("RIGHT pass-through never divides");
        dp.read_memory()?;
        dp.latch_output();

        dp.deliver_next_scheduled_input();
        self.in_interrupt = true;
        self.interrupts_enabled = false;
        Ok(())
    }

    /// 2 ticks: pop `pc` off the stack, re-arm interrupts. Reads the
    /// pushed return address at the current `sp` before restoring `sp`,
    /// so the address read here is exactly the one `enter_interrupt`
    /// wrote to; this is the invariant the stack-discipline property depends on.
    fn execute_iret(&mut self, dp: &mut DataPath) -> Result<(), SimError> {
        dp.select_operands(Register::Sp, None, Some(Register::Pc));
        dp.execute_alu(AluOp::Left).expect("LEFT pass-through never divides");
        dp.read_memory()?;
        dp.latch_output();

        dp.select_operands(Register::Sp, None, Some(Register::Sp));
        dp.execute_alu(AluOp::Inc).expect("incrementing sp never divides");
        dp.latch_output();

        self.in_interrupt = false;
        self.interrupts_enabled = true;
        Ok(())
    }
}

impl Default for ControlUnit {
    fn default() -> ControlUnit {
        ControlUnit::new()
    }
}

fn operand_register(operand: Operand) -> Option<Register> {
    match operand {
        Operand::Register(r) => Some(r),
        Operand::Const(_) => None,
    }
}

fn operand_const(operand: Operand) -> Option<i32> {
    match operand {
        Operand::Const(c) => Some(c),
        Operand::Register(_) => None,
    }
}

fn alu_op_for(opcode: Opcode) -> AluOp {
    match opcode {
        Opcode::Add => AluOp::Add,
        Opcode::Sub => AluOp::Sub,
        Opcode::Div => AluOp::Div,
        Opcode::Mod => AluOp::Mod,
        Opcode::Mul => AluOp::Mul,
        Opcode::Cmp => AluOp::Cmp,
        other => unreachable!("{other} is not an arithmetic opcode"),
    }
}

/// Stages a resolved `arg2`/`val` operand onto the ALU bus without
/// performing arithmetic: a register is passed through via `LEFT`, an
/// immediate via `RIGHT` after being latched.
fn resolve_to_bus(dp: &mut DataPath, operand: Operand) {
    match operand {
        Operand::Register(r) => {
            dp.select_operands(r, None, None);
            dp.execute_alu(AluOp::Left).expect("LEFT pass-through never divides");
        }
        Operand::Const(c) => {
            dp.select_operands(Register::R0, None, None);
            dp.latch_alu(Some(c));
            dp.execute_alu(AluOp::Right).expect("RIGHT pass-through never divides");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::Opcode as Op;
    use crate::program::Instruction;

    fn code(instrs: Vec<Instruction>) -> Vec<Instruction> {
        instrs
    }

    #[test]
    fn halt_stops_the_loop_on_the_first_cycle() {
        let mut dp = DataPath::new(vec![0], vec![]);
        let mut cu = ControlUnit::new();
        let code = code(vec![Instruction::new(Op::Halt, None, None, None)]);
        let (outcome, record) = cu.step(&mut dp, &code);
        assert_eq!(outcome, StepOutcome::Halted);
        assert_eq!(record.unwrap().instr_counter_after, 1);
    }

    #[test]
    fn jmp_sets_pc_without_the_fallthrough_increment() {
        let mut dp = DataPath::new(vec![0], vec![]);
        let mut cu = ControlUnit::new();
        let code = code(vec![
            Instruction::new(Op::Jmp, None, None, Some(Operand::Const(2))),
            Instruction::new(Op::Halt, None, None, None),
            Instruction::new(Op::Halt, None, None, None),
        ]);
        cu.step(&mut dp, &code);
        assert_eq!(dp.pc(), 2);
    }

    #[test]
    fn je_costs_one_tick_not_taken_two_taken() {
        let mut dp = DataPath::new(vec![0], vec![]);
        dp.write_register(Register::R1, 1);
        let mut cu = ControlUnit::new();
        let code = code(vec![Instruction::new(Op::Je, None, Some(Register::R1), Some(Operand::Const(5)))]);
        cu.step(&mut dp, &code);
        assert_eq!(cu.tick(), 1);
        assert_eq!(dp.pc(), 1);

        let mut dp2 = DataPath::new(vec![0], vec![]);
        let mut cu2 = ControlUnit::new();
        cu2.step(&mut dp2, &code);
        assert_eq!(cu2.tick(), 2);
        assert_eq!(dp2.pc(), 5);
    }

    #[test]
    fn interrupt_entry_costs_four_ticks_and_preserves_stack_discipline() {
        let mut dp = DataPath::new(vec![7, 0, 0], vec![(0, 'x')]);
        let mut cu = ControlUnit::new();
        cu.interrupts_enabled = true;
        let code = code(vec![Instruction::new(Op::Sti, None, None, None)]);

        let (outcome, record) = cu.step(&mut dp, &code);
        assert_eq!(outcome, StepOutcome::Continue);
        assert_eq!(record.unwrap().tick_after, 4);
        assert!(cu.in_interrupt());
        assert_eq!(dp.pc(), 7);
        let saved_pc = dp.data_memory()[dp.read_register(Register::Sp) as usize];
        assert_eq!(saved_pc, 0);

        cu.execute_iret(&mut dp).unwrap();
        assert_eq!(dp.pc(), saved_pc);
        assert!(!cu.in_interrupt());
        assert!(cu.interrupts_enabled());
    }

    #[test]
    fn in_with_no_pending_character_is_an_io_error() {
        let mut dp = DataPath::new(vec![0], vec![]);
        let mut cu = ControlUnit::new();
        let code = code(vec![Instruction::new(Op::In, Some(Register::R1), None, None)]);
        let (outcome, _) = cu.step(&mut dp, &code);
        assert_eq!(outcome, StepOutcome::Error(SimError::IOError));
    }

    #[test]
    fn out_appends_to_the_output_buffer() {
        let mut dp = DataPath::new(vec![0], vec![]);
        let mut cu = ControlUnit::new();
        let code = code(vec![Instruction::new(Op::Out, None, None, Some(Operand::Const('A' as i32)))]);
        cu.step(&mut dp, &code);
        assert_eq!(dp.output(), "A");
    }

    #[test]
    fn interrupts_arriving_mid_handler_are_dropped_not_queued() {
        // Two scheduled entries both fall due before the handler returns;
        // only the first is ever delivered, and the second is discarded
        // rather than firing right after `iret`.
        let mut dp = DataPath::new(vec![1, 0, 0, 0], vec![(0, 'a'), (0, 'b')]);
        let mut cu = ControlUnit::new();
        cu.interrupts_enabled = true;
        let handler_code = code(vec![
            Instruction::new(Op::Halt, None, None, None),
            Instruction::new(Op::Iret, None, None, None),
        ]);

        let (outcome, _) = cu.step(&mut dp, &handler_code);
        assert_eq!(outcome, StepOutcome::Continue);
        assert!(cu.in_interrupt());
        assert_eq!(dp.pc(), 1);

        // The handler's `iret` runs next cycle; the second entry (due since
        // before this cycle began) is discarded rather than queued, and
        // returns pc to the pre-interrupt value.
        let (outcome, _) = cu.step(&mut dp, &handler_code);
        assert_eq!(outcome, StepOutcome::Continue);
        assert!(!cu.in_interrupt());
        assert_eq!(dp.pc(), 0);

        // No entries remain: a further cycle must not re-trigger on the
        // dropped second entry.
        let (outcome, _) = cu.step(&mut dp, &handler_code);
        assert_eq!(outcome, StepOutcome::Halted);
    }
}
