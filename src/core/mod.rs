mod engine;
mod montecarlo;
mod rmd;
mod tax;
mod types;

pub use engine::run_simulation;
pub use montecarlo::{
    MonteCarloInputs, PathOutcome, PercentileOutcome, Rng, compute_percentiles, run_paths,
    sample_return,
};
pub use rmd::{rmd, rmd_factor};
pub use tax::{
    BracketRoom, TaxBracket, bracket_room_breakdown, brackets, marginal_rate, marginal_tax,
    optimal_conversion_amount, standard_deduction, total_tax,
};
pub use types::{ConversionStrategy, FilingStatus, Inputs, YearResult};
