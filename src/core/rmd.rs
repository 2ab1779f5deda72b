pub(crate) const FIRST_RMD_AGE: u32 = 72;

// IRS uniform lifetime table, ages 72 through 120.
const UNIFORM_LIFETIME_TABLE: [f64; 49] = [
    27.4, 26.5, 25.5, 24.6, 23.7, 22.9, 22.0, 21.1, 20.2, 19.4, // 72-81
    18.5, 17.7, 16.8, 16.0, 15.2, 14.4, 13.7, 12.9, 12.2, 11.5, // 82-91
    10.8, 10.1, 9.5, 8.9, 8.4, 7.8, 7.3, 6.8, 6.4, 6.0, // 92-101
    5.6, 5.2, 4.9, 4.6, 4.3, 4.1, 3.9, 3.7, 3.5, 3.4, // 102-111
    3.3, 3.1, 3.0, 2.9, 2.8, 2.7, 2.5, 2.3, 2.0, // 112-120
];

// Ages outside the table use divisor 1.0: the entire balance is due.
pub fn rmd_factor(age: u32) -> f64 {
    if age < FIRST_RMD_AGE {
        return 1.0;
    }

    let index = (age - FIRST_RMD_AGE) as usize;
    match UNIFORM_LIFETIME_TABLE.get(index) {
        Some(divisor) => *divisor,
        None => 1.0,
    }
}

pub fn rmd(balance: f64, age: u32) -> f64 {
    balance.max(0.0) / rmd_factor(age)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn factor_at_first_rmd_age() {
        assert_approx_tol(rmd_factor(72), 27.4, 1e-9);
    }

    #[test]
    fn factor_at_last_tabled_age() {
        assert_approx_tol(rmd_factor(120), 2.0, 1e-9);
    }

    #[test]
    fn ages_outside_table_require_full_depletion() {
        assert_approx_tol(rmd_factor(71), 1.0, 1e-9);
        assert_approx_tol(rmd_factor(121), 1.0, 1e-9);
        assert_approx_tol(rmd(250_000.0, 121), 250_000.0, 1e-9);
    }

    #[test]
    fn rmd_divides_balance_by_factor() {
        assert_approx_tol(rmd(1_000_000.0, 72), 36_496.35, 0.01);
        assert_approx_tol(rmd(500_000.0, 80), 500_000.0 / 20.2, 1e-6);
    }

    #[test]
    fn rmd_clamps_negative_balance() {
        assert_approx_tol(rmd(-10_000.0, 75), 0.0, 1e-9);
    }

    #[test]
    fn factors_decrease_with_age() {
        for age in FIRST_RMD_AGE..120 {
            assert!(rmd_factor(age) > rmd_factor(age + 1));
        }
    }

    #[test]
    fn rmd_never_exceeds_balance_within_table() {
        for age in FIRST_RMD_AGE..=120 {
            assert!(rmd(100_000.0, age) <= 100_000.0);
        }
    }
}
