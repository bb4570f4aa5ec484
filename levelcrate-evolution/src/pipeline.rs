//! Driver loop
//!
//! Runs a whole evolution: preparation, seeding, iterations until a terminal
//! status, then the result. An abort callback is polled after every
//! iteration so hosts can cancel between steps.

use crate::session::{EvolutionInputs, EvolutionResult, IterationReport, IterationStatus, LevelSet};
use levelcrate_core::{LevelSetConfig, Result};
use log::info;

/// Evolve until convergence, the iteration cap, an empty band, or `abort`
/// returning true
pub fn evolve<F>(config: &LevelSetConfig, inputs: EvolutionInputs<'_>, mut abort: F) -> Result<EvolutionResult>
where
    F: FnMut(&IterationReport) -> bool,
{
    let mut evolution = LevelSet::init_param(config, inputs)?.init_evolution()?;

    loop {
        let status = evolution.iterate()?;
        if status.is_terminal() {
            break;
        }
        if let Some(report) = evolution.reports().last() {
            if abort(report) {
                info!("evolution aborted by the caller at step {}", report.step);
                evolution.abort();
                break;
            }
        }
    }
    evolution.end_evolution()
}

/// Evolve without cancellation
pub fn segment(config: &LevelSetConfig, inputs: EvolutionInputs<'_>) -> Result<EvolutionResult> {
    evolve(config, inputs, |_| false)
}

/// True when the run stopped on its own rather than by the caller
pub fn finished_naturally(result: &EvolutionResult) -> bool {
    matches!(
        result.status,
        IterationStatus::Converged | IterationStatus::IterationLimit | IterationStatus::EmptyBand
    )
}
