use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FilingStatus {
    Single,
    MarriedFilingJointly,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConversionStrategy {
    OneTime { amount: f64 },
    Annual { amount: f64, percent_of_balance: f64 },
    BracketOptimization { target_rate: f64 },
}

#[derive(Debug, Clone)]
pub struct Inputs {
    pub current_age: u32,
    pub spouse_age: Option<u32>,
    pub filing_status: FilingStatus,
    pub retirement_age: u32,
    pub traditional_start: f64,
    pub roth_start: f64,
    pub taxable_start: Option<f64>,
    pub strategy: ConversionStrategy,
    pub annual_income: f64,
    pub yearly_incomes: Vec<Option<f64>>,
    pub retirement_income: f64,
    pub investment_return: Option<f64>,
    pub taxable_yield: Option<f64>,
    pub simulation_years: u32,
    pub state_tax_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearResult {
    pub year: u32,
    pub age: u32,
    pub spouse_age: Option<u32>,
    pub traditional_balance: f64,
    pub roth_balance: f64,
    pub taxable_balance: Option<f64>,
    pub conversion_amount: f64,
    pub conversion_tax: f64,
    pub marginal_rate: f64,
    pub rmd_amount: f64,
    pub rmd_tax: f64,
    pub cumulative_tax: f64,
    pub total_wealth: f64,
    pub no_conversion_wealth: f64,
    pub break_even: bool,
    pub retired: bool,
}
