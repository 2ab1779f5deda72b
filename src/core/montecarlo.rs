use std::f64::consts::PI;

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct MonteCarloInputs {
    pub initial_traditional: f64,
    pub initial_roth: f64,
    pub years: u32,
    pub mean_return: f64,
    pub volatility: f64,
    pub paths: u32,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathOutcome {
    pub traditional: f64,
    pub roth: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileOutcome {
    pub percentile: f64,
    pub traditional: f64,
    pub roth: f64,
    pub total: f64,
}

// Log-normal annual return: the gross return is exp(ln(1 + mean) + vol * z),
// so a zero-volatility draw is exactly the mean rate and a sampled path can
// never lose more than the full balance.
pub fn sample_return(rng: &mut Rng, mean: f64, std_dev: f64) -> f64 {
    let z = rng.standard_normal();
    let log_mean = (1.0 + mean).max(1e-9).ln();
    (log_mean + std_dev.max(0.0) * z).exp() - 1.0
}

pub fn run_paths(inputs: &MonteCarloInputs) -> Vec<PathOutcome> {
    let mut outcomes = Vec::with_capacity(inputs.paths as usize);

    for path_id in 0..inputs.paths {
        let mut rng = Rng::new(derive_seed(inputs.seed, path_id));
        let mut traditional = inputs.initial_traditional.max(0.0);
        let mut roth = inputs.initial_roth.max(0.0);

        for _ in 0..inputs.years {
            // Both accounts compound the same draw: correlated market
            // exposure, not independent asset classes.
            let rate = sample_return(&mut rng, inputs.mean_return, inputs.volatility);
            traditional *= 1.0 + rate;
            roth *= 1.0 + rate;
        }

        outcomes.push(PathOutcome {
            traditional,
            roth,
            total: traditional + roth,
        });
    }

    outcomes
}

// Nearest-rank percentiles over final path totals, no interpolation.
pub fn compute_percentiles(paths: &mut [PathOutcome], requested: &[f64]) -> Vec<PercentileOutcome> {
    if paths.is_empty() {
        return Vec::new();
    }

    paths.sort_by(|a, b| a.total.total_cmp(&b.total));
    let n = paths.len();

    requested
        .iter()
        .map(|&percentile| {
            let rank = ((percentile / 100.0).clamp(0.0, 1.0) * (n as f64 - 1.0)).floor() as usize;
            let outcome = paths[rank.min(n - 1)];
            PercentileOutcome {
                percentile,
                traditional: outcome.traditional,
                roth: outcome.roth,
                total: outcome.total,
            }
        })
        .collect()
}

fn derive_seed(base_seed: u64, path_id: u32) -> u64 {
    splitmix64(base_seed ^ ((path_id as u64) << 32) ^ path_id as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

pub struct Rng {
    state: u64,
    cached_normal: Option<f64>,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self {
            state,
            cached_normal: None,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    fn next_f64(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        let v = self.next_u64() >> 11;
        ((v as f64) + 0.5) / DENOM
    }

    // Box-Muller from two uniform draws; the second normal is cached.
    pub fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.cached_normal.take() {
            return z;
        }

        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;

        let z0 = r * theta.cos();
        let z1 = r * theta.sin();
        self.cached_normal = Some(z1);
        z0
    }
}
