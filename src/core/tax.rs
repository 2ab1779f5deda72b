use serde::Serialize;

use super::types::FilingStatus;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    pub rate: f64,
    pub cap: Option<f64>,
    pub label: &'static str,
}

// 2023 federal brackets. Caps are taxable-income upper bounds; the final
// bracket is unbounded.
const SINGLE_BRACKETS: [TaxBracket; 7] = [
    TaxBracket {
        rate: 0.10,
        cap: Some(11_000.0),
        label: "10%",
    },
    TaxBracket {
        rate: 0.12,
        cap: Some(44_725.0),
        label: "12%",
    },
    TaxBracket {
        rate: 0.22,
        cap: Some(95_375.0),
        label: "22%",
    },
    TaxBracket {
        rate: 0.24,
        cap: Some(182_100.0),
        label: "24%",
    },
    TaxBracket {
        rate: 0.32,
        cap: Some(231_250.0),
        label: "32%",
    },
    TaxBracket {
        rate: 0.35,
        cap: Some(578_125.0),
        label: "35%",
    },
    TaxBracket {
        rate: 0.37,
        cap: None,
        label: "37%",
    },
];

const MARRIED_FILING_JOINTLY_BRACKETS: [TaxBracket; 7] = [
    TaxBracket {
        rate: 0.10,
        cap: Some(22_000.0),
        label: "10%",
    },
    TaxBracket {
        rate: 0.12,
        cap: Some(89_450.0),
        label: "12%",
    },
    TaxBracket {
        rate: 0.22,
        cap: Some(190_750.0),
        label: "22%",
    },
    TaxBracket {
        rate: 0.24,
        cap: Some(364_200.0),
        label: "24%",
    },
    TaxBracket {
        rate: 0.32,
        cap: Some(462_500.0),
        label: "32%",
    },
    TaxBracket {
        rate: 0.35,
        cap: Some(693_750.0),
        label: "35%",
    },
    TaxBracket {
        rate: 0.37,
        cap: None,
        label: "37%",
    },
];

const SINGLE_STANDARD_DEDUCTION: f64 = 13_850.0;
const MARRIED_FILING_JOINTLY_STANDARD_DEDUCTION: f64 = 27_700.0;

const FALLBACK_BALANCE_SHARE: f64 = 0.10;
const FALLBACK_CONVERSION_CAP: f64 = 50_000.0;

pub fn brackets(filing_status: FilingStatus) -> &'static [TaxBracket] {
    match filing_status {
        FilingStatus::Single => &SINGLE_BRACKETS,
        FilingStatus::MarriedFilingJointly => &MARRIED_FILING_JOINTLY_BRACKETS,
    }
}

pub fn standard_deduction(filing_status: FilingStatus) -> f64 {
    match filing_status {
        FilingStatus::Single => SINGLE_STANDARD_DEDUCTION,
        FilingStatus::MarriedFilingJointly => MARRIED_FILING_JOINTLY_STANDARD_DEDUCTION,
    }
}

pub fn marginal_tax(income: f64, brackets: &[TaxBracket]) -> f64 {
    let income = income.max(0.0);
    let mut tax = 0.0;
    let mut lower = 0.0;

    for bracket in brackets {
        match bracket.cap {
            // Cap comparison is inclusive: income exactly at a cap is taxed
            // entirely within that bracket.
            Some(cap) if income <= cap => {
                tax += (income - lower) * bracket.rate;
                return tax;
            }
            Some(cap) => {
                tax += (cap - lower) * bracket.rate;
                lower = cap;
            }
            None => {
                tax += (income - lower) * bracket.rate;
                return tax;
            }
        }
    }

    tax
}

pub fn marginal_rate(income: f64, filing_status: FilingStatus) -> f64 {
    let taxable = (income - standard_deduction(filing_status)).max(0.0);
    let table = brackets(filing_status);

    for bracket in table {
        match bracket.cap {
            Some(cap) if taxable <= cap => return bracket.rate,
            Some(_) => {}
            None => return bracket.rate,
        }
    }

    table[table.len() - 1].rate
}

// State tax applies to gross income while federal tax applies to income net
// of the standard deduction.
pub fn total_tax(income: f64, filing_status: FilingStatus, state_rate: Option<f64>) -> f64 {
    let federal_taxable = (income - standard_deduction(filing_status)).max(0.0);
    let federal = marginal_tax(federal_taxable, brackets(filing_status));
    let state = state_rate.unwrap_or(0.0).max(0.0) * income.max(0.0);
    federal + state
}

pub fn optimal_conversion_amount(
    current_income: f64,
    traditional_balance: f64,
    filing_status: FilingStatus,
    target_rate: f64,
) -> f64 {
    let balance = traditional_balance.max(0.0);
    if balance <= 0.0 {
        return 0.0;
    }

    let table = brackets(filing_status);
    let deduction = standard_deduction(filing_status);
    let current_rate = marginal_rate(current_income, filing_status);

    if current_rate <= target_rate {
        let fallback = (balance * FALLBACK_BALANCE_SHARE).min(FALLBACK_CONVERSION_CAP);
        return match table.iter().find(|b| b.rate == target_rate) {
            Some(TaxBracket { cap: Some(cap), .. }) => {
                (cap - current_income).max(0.0).min(balance)
            }
            _ => fallback,
        };
    }

    // Already above the target bracket: sum the gross room of every bracket
    // at or below the target rate, advancing an income cursor as each
    // bracket fills.
    let mut room = 0.0;
    let mut cursor = current_income;
    for bracket in table.iter().filter(|b| b.rate <= target_rate) {
        let Some(cap) = bracket.cap else {
            continue;
        };
        let bracket_room = (cap + deduction - cursor).max(0.0);
        room += bracket_room;
        cursor += bracket_room;
    }

    room.min(balance)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketRoom {
    pub bracket_index: usize,
    pub rate: f64,
    pub label: &'static str,
    pub upper_bound: Option<f64>,
    pub room_remaining: Option<f64>,
    pub suggested_conversion: Option<f64>,
}

pub fn bracket_room_breakdown(income: f64, filing_status: FilingStatus) -> Vec<BracketRoom> {
    let taxable = (income - standard_deduction(filing_status)).max(0.0);
    let mut lower = 0.0;

    brackets(filing_status)
        .iter()
        .enumerate()
        .map(|(bracket_index, bracket)| {
            let row = match bracket.cap {
                Some(cap) => BracketRoom {
                    bracket_index,
                    rate: bracket.rate,
                    label: bracket.label,
                    upper_bound: Some(cap),
                    room_remaining: Some((cap - taxable.max(lower)).max(0.0)),
                    suggested_conversion: Some((cap - taxable).max(0.0)),
                },
                None => BracketRoom {
                    bracket_index,
                    rate: bracket.rate,
                    label: bracket.label,
                    upper_bound: None,
                    room_remaining: None,
                    suggested_conversion: None,
                },
            };
            if let Some(cap) = bracket.cap {
                lower = cap;
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    // Integrates rate * width over every bracket slice below the income,
    // without the early-exit accumulation structure.
    fn reference_marginal_tax(income: f64, brackets: &[TaxBracket]) -> f64 {
        let income = income.max(0.0);
        let mut tax = 0.0;
        let mut lower = 0.0;
        for bracket in brackets {
            let upper = bracket.cap.unwrap_or(f64::INFINITY);
            let width = (income.min(upper) - lower).max(0.0);
            tax += width * bracket.rate;
            lower = upper;
        }
        tax
    }

    #[test]
    fn marginal_tax_is_zero_for_zero_and_negative_income() {
        assert_approx(marginal_tax(0.0, brackets(FilingStatus::Single)), 0.0);
        assert_approx(marginal_tax(-5_000.0, brackets(FilingStatus::Single)), 0.0);
    }

    #[test]
    fn marginal_tax_first_bracket_is_proportional() {
        let table = brackets(FilingStatus::Single);
        assert_approx(marginal_tax(10_000.0, table), 1_000.0);
    }

    #[test]
    fn marginal_tax_spans_brackets_progressively() {
        let table = brackets(FilingStatus::Single);
        // 11,000 * 10% + (44,725 - 11,000) * 12% + (50,000 - 44,725) * 22%
        assert_approx(marginal_tax(50_000.0, table), 1_100.0 + 4_047.0 + 1_160.5);
    }

    #[test]
    fn marginal_tax_at_exact_cap_matches_full_bracket_width() {
        let table = brackets(FilingStatus::Single);
        assert_approx(marginal_tax(11_000.0, table), 1_100.0);
        assert_approx(marginal_tax(44_725.0, table), 1_100.0 + 4_047.0);
        assert_approx(marginal_tax(95_375.0, table), 1_100.0 + 4_047.0 + 11_143.0);
    }

    #[test]
    fn marginal_tax_matches_reference_at_cap_boundaries() {
        for filing in [FilingStatus::Single, FilingStatus::MarriedFilingJointly] {
            let table = brackets(filing);
            for bracket in table {
                if let Some(cap) = bracket.cap {
                    assert_approx(marginal_tax(cap, table), reference_marginal_tax(cap, table));
                    assert_approx(
                        marginal_tax(cap + 1.0, table),
                        reference_marginal_tax(cap + 1.0, table),
                    );
                }
            }
        }
    }

    #[test]
    fn marginal_rate_applies_standard_deduction() {
        // 50,000 - 13,850 = 36,150 taxable, inside the 12% bracket.
        assert_approx(marginal_rate(50_000.0, FilingStatus::Single), 0.12);
        // Without the deduction 50,000 would sit in the 22% bracket.
        assert_approx(marginal_rate(64_000.0, FilingStatus::Single), 0.22);
    }

    #[test]
    fn marginal_rate_floors_taxable_income_at_zero() {
        assert_approx(marginal_rate(0.0, FilingStatus::Single), 0.10);
        assert_approx(marginal_rate(10_000.0, FilingStatus::Single), 0.10);
    }

    #[test]
    fn marginal_rate_reaches_top_bracket() {
        assert_approx(marginal_rate(700_000.0, FilingStatus::Single), 0.37);
        assert_approx(
            marginal_rate(800_000.0, FilingStatus::MarriedFilingJointly),
            0.37,
        );
    }

    #[test]
    fn total_tax_charges_state_on_gross_income() {
        let income = 50_000.0;
        let federal = marginal_tax(
            income - SINGLE_STANDARD_DEDUCTION,
            brackets(FilingStatus::Single),
        );
        let total = total_tax(income, FilingStatus::Single, Some(0.05));
        assert_approx(total, federal + income * 0.05);
    }

    #[test]
    fn total_tax_without_state_rate_is_federal_only() {
        let income = 50_000.0;
        let federal = marginal_tax(
            income - SINGLE_STANDARD_DEDUCTION,
            brackets(FilingStatus::Single),
        );
        assert_approx(total_tax(income, FilingStatus::Single, None), federal);
    }

    #[test]
    fn total_tax_is_zero_below_standard_deduction_without_state() {
        assert_approx(total_tax(10_000.0, FilingStatus::Single, None), 0.0);
    }

    #[test]
    fn optimal_conversion_at_bracket_cap_has_no_room() {
        let amount =
            optimal_conversion_amount(95_375.0, 1_000_000.0, FilingStatus::Single, 0.22);
        assert_approx(amount, 0.0);
    }

    #[test]
    fn optimal_conversion_fills_target_bracket_from_below() {
        let amount = optimal_conversion_amount(50_000.0, 1_000_000.0, FilingStatus::Single, 0.22);
        assert_approx(amount, 95_375.0 - 50_000.0);
    }

    #[test]
    fn optimal_conversion_is_capped_by_traditional_balance() {
        let amount = optimal_conversion_amount(50_000.0, 20_000.0, FilingStatus::Single, 0.22);
        assert_approx(amount, 20_000.0);
    }

    #[test]
    fn optimal_conversion_unmatched_target_falls_back_to_balance_share() {
        let amount = optimal_conversion_amount(50_000.0, 100_000.0, FilingStatus::Single, 0.15);
        assert_approx(amount, 10_000.0);
    }

    #[test]
    fn optimal_conversion_fallback_is_capped_at_fixed_ceiling() {
        let amount = optimal_conversion_amount(50_000.0, 900_000.0, FilingStatus::Single, 0.15);
        assert_approx(amount, 50_000.0);
    }

    #[test]
    fn optimal_conversion_above_target_exhausts_lower_brackets() {
        // Income past the target cap plus deduction leaves no room in any
        // bracket at or below the target rate.
        // 250,000 single: taxable 236,150 sits in the 35% bracket; every cap
        // at or below 24% plus the 13,850 deduction is under 250,000.
        let amount = optimal_conversion_amount(250_000.0, 1_000_000.0, FilingStatus::Single, 0.24);
        assert_approx(amount, 0.0);

        // MFJ 200,000: taxable 172,300 is in the 22% bracket, target 12%.
        let amount =
            optimal_conversion_amount(200_000.0, 500_000.0, FilingStatus::MarriedFilingJointly, 0.12);
        assert_approx(amount, 0.0);
    }

    #[test]
    fn optimal_conversion_with_zero_balance_is_zero() {
        assert_approx(
            optimal_conversion_amount(50_000.0, 0.0, FilingStatus::Single, 0.22),
            0.0,
        );
    }

    #[test]
    fn bracket_room_breakdown_reports_partial_and_full_brackets() {
        // 50,000 single: taxable 36,150 inside the 12% bracket.
        let rows = bracket_room_breakdown(50_000.0, FilingStatus::Single);
        assert_eq!(rows.len(), 7);

        assert_approx(rows[0].room_remaining.unwrap(), 0.0);
        assert_approx(rows[1].room_remaining.unwrap(), 44_725.0 - 36_150.0);
        assert_approx(rows[2].room_remaining.unwrap(), 95_375.0 - 44_725.0);
        assert_approx(rows[1].suggested_conversion.unwrap(), 44_725.0 - 36_150.0);
        assert_approx(rows[2].suggested_conversion.unwrap(), 95_375.0 - 36_150.0);
    }

    #[test]
    fn bracket_room_breakdown_top_bracket_is_unbounded() {
        let rows = bracket_room_breakdown(50_000.0, FilingStatus::Single);
        let top = rows.last().unwrap();
        assert!(top.upper_bound.is_none());
        assert!(top.room_remaining.is_none());
        assert!(top.suggested_conversion.is_none());
    }

    #[test]
    fn bracket_tables_are_well_formed() {
        for filing in [FilingStatus::Single, FilingStatus::MarriedFilingJointly] {
            let table = brackets(filing);
            assert!(table.last().unwrap().cap.is_none());
            for pair in table.windows(2) {
                assert!(pair[0].rate < pair[1].rate);
                if let (Some(a), Some(b)) = (pair[0].cap, pair[1].cap) {
                    assert!(a < b);
                }
            }
        }
    }

    proptest! {
        #[test]
        fn prop_marginal_tax_matches_reference(income in 0.0f64..1_000_000.0) {
            for filing in [FilingStatus::Single, FilingStatus::MarriedFilingJointly] {
                let table = brackets(filing);
                let direct = marginal_tax(income, table);
                let reference = reference_marginal_tax(income, table);
                prop_assert!((direct - reference).abs() <= 1e-6);
            }
        }

        #[test]
        fn prop_marginal_tax_is_non_decreasing(
            income in 0.0f64..1_000_000.0,
            delta in 0.0f64..50_000.0
        ) {
            let table = brackets(FilingStatus::Single);
            prop_assert!(marginal_tax(income + delta, table) + 1e-9 >= marginal_tax(income, table));
        }

        #[test]
        fn prop_marginal_tax_slope_is_active_bracket_rate(income in 0.0f64..900_000.0) {
            // Piecewise linearity: a small step away from cap boundaries is
            // taxed at exactly the active bracket's rate.
            let table = brackets(FilingStatus::Single);
            let on_boundary = table.iter().any(|b| {
                b.cap
                    .is_some_and(|cap| (income - cap).abs() < 1.0 || (income + 1.0 - cap).abs() < 1.0)
            });
            if !on_boundary {
                let rate = table
                    .iter()
                    .find(|b| b.cap.is_none_or(|cap| income + 1.0 <= cap))
                    .unwrap()
                    .rate;
                let slope = marginal_tax(income + 1.0, table) - marginal_tax(income, table);
                prop_assert!((slope - rate).abs() <= 1e-6);
            }
        }

        #[test]
        fn prop_optimal_conversion_never_exceeds_balance(
            income in 0.0f64..600_000.0,
            balance in 0.0f64..2_000_000.0,
            target_index in 0usize..7
        ) {
            let table = brackets(FilingStatus::Single);
            let target_rate = table[target_index].rate;
            let amount =
                optimal_conversion_amount(income, balance, FilingStatus::Single, target_rate);
            prop_assert!(amount >= 0.0);
            prop_assert!(amount <= balance + 1e-9);
        }
    }
}
