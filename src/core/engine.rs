use super::rmd::{FIRST_RMD_AGE, rmd};
use super::tax::{marginal_rate, optimal_conversion_amount, total_tax};
use super::types::{ConversionStrategy, FilingStatus, Inputs, YearResult};

const MAX_EXPLICIT_INCOME_YEARS: usize = 10;

// One balance-state type advanced by the same step code for both the live
// track and the shadow no-conversion baseline.
#[derive(Debug, Clone, Copy)]
struct AccountState {
    traditional: f64,
    roth: f64,
    taxable: Option<f64>,
}

impl AccountState {
    fn from_inputs(inputs: &Inputs) -> Self {
        Self {
            traditional: inputs.traditional_start.max(0.0),
            roth: inputs.roth_start.max(0.0),
            taxable: inputs.taxable_start.map(|balance| balance.max(0.0)),
        }
    }

    fn convert(&mut self, amount: f64, tax: f64) {
        self.traditional -= amount;
        self.roth += amount;
        self.debit_taxable(tax);
    }

    // Tax debits may push the taxable account negative; the deficit persists
    // and is only floored when summing wealth.
    fn debit_taxable(&mut self, amount: f64) {
        if let Some(balance) = self.taxable.as_mut() {
            *balance -= amount;
        }
    }

    fn total_wealth(&self) -> f64 {
        self.traditional + self.roth + self.taxable.map_or(0.0, |balance| balance.max(0.0))
    }
}

#[derive(Debug, Clone, Copy)]
struct RmdOutcome {
    amount: f64,
    tax: f64,
}

pub fn run_simulation(inputs: &Inputs) -> Vec<YearResult> {
    let mut live = AccountState::from_inputs(inputs);
    let mut shadow = live;
    let mut cumulative_tax = 0.0;
    let mut one_time_converted = false;
    let mut results = Vec::with_capacity(inputs.simulation_years as usize);

    for year in 1..=inputs.simulation_years {
        let age = inputs.current_age + year;
        let spouse_age = inputs.spouse_age.map(|spouse| spouse + year);
        let retired = age >= inputs.retirement_age;
        let income = income_for_year(inputs, year, retired);

        let conversion_amount =
            conversion_for_year(inputs, &live, income, retired, &mut one_time_converted);
        // Bracket placement considers income plus conversion, while the tax
        // owed is computed on the conversion amount in isolation.
        let marginal_rate_applied =
            marginal_rate(income + conversion_amount, inputs.filing_status);
        let conversion_tax = if conversion_amount > 0.0 {
            total_tax(conversion_amount, inputs.filing_status, inputs.state_tax_rate)
        } else {
            0.0
        };
        live.convert(conversion_amount, conversion_tax);

        let rmd_outcome = apply_rmd(&mut live, inputs, age, retired);
        apply_growth(&mut live, inputs);

        apply_rmd(&mut shadow, inputs, age, retired);
        apply_growth(&mut shadow, inputs);

        cumulative_tax += conversion_tax + rmd_outcome.tax;

        let total_wealth = live.total_wealth();
        let no_conversion_wealth = shadow.total_wealth();

        results.push(YearResult {
            year,
            age,
            spouse_age,
            traditional_balance: live.traditional,
            roth_balance: live.roth,
            taxable_balance: live.taxable,
            conversion_amount,
            conversion_tax,
            marginal_rate: marginal_rate_applied,
            rmd_amount: rmd_outcome.amount,
            rmd_tax: rmd_outcome.tax,
            cumulative_tax,
            total_wealth,
            no_conversion_wealth,
            break_even: total_wealth > no_conversion_wealth,
            retired,
        });
    }

    results
}

fn income_for_year(inputs: &Inputs, year: u32, retired: bool) -> f64 {
    if retired {
        return inputs.retirement_income.max(0.0);
    }

    let index = (year - 1) as usize;
    if index < MAX_EXPLICIT_INCOME_YEARS {
        if let Some(Some(income)) = inputs.yearly_incomes.get(index) {
            return income.max(0.0);
        }
        return inputs.annual_income.max(0.0);
    }

    last_explicit_income(inputs)
}

fn last_explicit_income(inputs: &Inputs) -> f64 {
    inputs
        .yearly_incomes
        .iter()
        .take(MAX_EXPLICIT_INCOME_YEARS)
        .rev()
        .find_map(|income| *income)
        .unwrap_or(inputs.annual_income)
        .max(0.0)
}

fn conversion_for_year(
    inputs: &Inputs,
    state: &AccountState,
    income: f64,
    retired: bool,
    one_time_converted: &mut bool,
) -> f64 {
    let available = state.traditional.max(0.0);

    match inputs.strategy {
        ConversionStrategy::OneTime { amount } => {
            if *one_time_converted {
                return 0.0;
            }
            *one_time_converted = true;
            amount.max(0.0).min(available)
        }
        ConversionStrategy::Annual {
            amount,
            percent_of_balance,
        } => amount
            .max(0.0)
            .min(percent_of_balance.max(0.0) * available)
            .min(available),
        ConversionStrategy::BracketOptimization { target_rate } => {
            if retired {
                return 0.0;
            }
            optimal_conversion_amount(income, available, inputs.filing_status, target_rate)
                .min(available)
        }
    }
}

fn apply_rmd(state: &mut AccountState, inputs: &Inputs, age: u32, retired: bool) -> RmdOutcome {
    if !retired || age < FIRST_RMD_AGE || state.traditional <= 0.0 {
        return RmdOutcome {
            amount: 0.0,
            tax: 0.0,
        };
    }

    let amount = rmd(state.traditional, age).min(state.traditional);
    let tax = total_tax(amount, inputs.filing_status, inputs.state_tax_rate);
    state.traditional -= amount;
    state.debit_taxable(tax);

    RmdOutcome { amount, tax }
}

fn apply_growth(state: &mut AccountState, inputs: &Inputs) {
    // An absent return skips growth entirely; Some(0.0) is a distinct input
    // that happens to leave balances unchanged as well.
    if let Some(rate) = inputs.investment_return {
        if rate > 0.0 {
            state.traditional *= 1.0 + rate;
            state.roth *= 1.0 + rate;
        }
    }

    if let (Some(yield_rate), Some(balance)) = (inputs.taxable_yield, state.taxable.as_mut()) {
        *balance *= 1.0 + yield_rate;
    }
}
