//! The bounded driver: wires a [`Program`] and an input schedule into a
//! fresh [`DataPath`]/[`ControlUnit`] pair, then reduces over `step()`
//! until a terminal outcome or the tick budget is spent.

use crate::control_unit::{ControlUnit, JournalRecord, StepOutcome};
use crate::datapath::DataPath;
use crate::errors::SimError;
use crate::program::Program;

/// Guards against runaway programs in tests and on the CLI; overridable
/// per-run, never silently disabled.
pub const DEFAULT_TICK_BUDGET: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Halted,
    Error(SimError),
}

/// Everything a caller might want to inspect about a completed run,
/// independent of how it terminated.
pub struct SimulationReport {
    pub output: String,
    pub instr_counter: u64,
    pub ticks: u64,
    pub journal: Vec<JournalRecord>,
    pub outcome: Outcome,
}

/// Run `program` against `input_schedule` to completion or exhaustion of
/// `tick_budget`, whichever comes first.
pub fn run(program: &Program, input_schedule: Vec<(u64, char)>, tick_budget: u64) -> SimulationReport {
    let mut dp = DataPath::new(program.data.clone(), input_schedule);
    let mut cu = ControlUnit::new();
    let mut journal = Vec::new();

    loop {
        if cu.tick() >= tick_budget {
            let outcome = Outcome::Error(SimError::BudgetError { budget: tick_budget });
            return SimulationReport {
                output: dp.output().to_string(),
                instr_counter: cu.instr_counter(),
                ticks: cu.tick(),
                journal,
                outcome,
            };
        }

        let (outcome, record) = cu.step(&mut dp, &program.code);
        if let Some(record) = record {
            journal.push(record);
        }

        match outcome {
            StepOutcome::Continue => continue,
            StepOutcome::Halted => {
                return SimulationReport {
                    output: dp.output().to_string(),
                    instr_counter: cu.instr_counter(),
                    ticks: cu.tick(),
                    journal,
                    outcome: Outcome::Halted,
                };
            }
            StepOutcome::Error(e) => {
                return SimulationReport {
                    output: dp.output().to_string(),
                    instr_counter: cu.instr_counter(),
                    ticks: cu.tick(),
                    journal,
                    outcome: Outcome::Error(e),
                };
            }
        }
    }
}

/// Convenience entry point using the default tick budget.
pub fn run_with_default_budget(program: &Program, input_schedule: Vec<(u64, char)>) -> SimulationReport {
    run(program, input_schedule, DEFAULT_TICK_BUDGET)
}
