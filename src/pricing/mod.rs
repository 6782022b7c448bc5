//! Loan pricing arithmetic
//!
//! Reducing-balance EMI and its inverse. Pure functions, rounded to paise.
//!
//! EMI = P × r × (1 + r)^n / [(1 + r)^n - 1], with r = annual_rate_pct / 1200

/// Round to two decimal places (currency minor unit).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn monthly_rate(annual_rate_pct: f64) -> f64 {
    annual_rate_pct / 1200.0
}

/// Equated monthly instalment for `principal` at `annual_rate_pct` over `tenure_months`.
///
/// A zero rate amortises straight-line.
///
/// # Panics
/// If `tenure_months` is zero. Callers validate tenure before pricing.
pub fn emi(principal: f64, annual_rate_pct: f64, tenure_months: u32) -> f64 {
    assert!(tenure_months > 0, "tenure must be positive");

    let n = tenure_months as i32;
    let r = monthly_rate(annual_rate_pct);

    if r == 0.0 {
        return round2(principal / tenure_months as f64);
    }

    let factor = (1.0 + r).powi(n);
    round2(principal * r * factor / (factor - 1.0))
}

/// Largest principal a monthly `payment` can service. Inverse of [`emi`].
///
/// # Panics
/// If `tenure_months` is zero.
pub fn max_principal_from_payment(payment: f64, annual_rate_pct: f64, tenure_months: u32) -> f64 {
    assert!(tenure_months > 0, "tenure must be positive");

    let n = tenure_months as i32;
    let r = monthly_rate(annual_rate_pct);

    if r == 0.0 {
        return round2(payment * tenure_months as f64);
    }

    let factor = (1.0 + r).powi(n);
    round2(payment * (factor - 1.0) / (r * factor))
}

/// Rupees with Indian digit grouping: 4000000 -> "₹40,00,000".
pub fn format_inr(amount: u64) -> String {
    let digits = amount.to_string();
    if digits.len() <= 3 {
        return format!("₹{}", digits);
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 2 {
        groups.push(&head[end - 2..end]);
        end -= 2;
    }
    groups.push(&head[..end]);
    groups.reverse();

    format!("₹{},{}", groups.join(","), tail)
}

/// Rupees and paise: 23303.5 -> "₹23,303.50".
pub fn format_rupees(amount: f64) -> String {
    let amount = round2(amount.max(0.0));
    let whole = amount.trunc() as u64;
    let paise = ((amount - amount.trunc()) * 100.0).round() as u64;
    format!("{}.{:02}", format_inr(whole), paise.min(99))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emi_known_value() {
        // 1 lakh at 12% for 12 months
        assert_eq!(emi(100_000.0, 12.0, 12), 8884.88);
    }

    #[test]
    fn test_zero_rate_is_straight_line() {
        assert_eq!(emi(120_000.0, 0.0, 12), 10_000.0);
        assert_eq!(max_principal_from_payment(10_000.0, 0.0, 12), 120_000.0);
    }

    #[test]
    #[should_panic(expected = "tenure must be positive")]
    fn test_zero_tenure_is_rejected() {
        emi(100_000.0, 12.0, 0);
    }

    #[test]
    fn test_emi_monotonic_in_rate_and_principal() {
        let principals = [50_000.0, 250_000.0, 1_000_000.0, 4_000_000.0];
        let rates = [0.0, 6.5, 10.99, 12.0, 18.0, 24.0];
        let tenures = [6, 24, 60];

        for &t in &tenures {
            for &p in &principals {
                let mut previous = 0.0;
                for &r in &rates {
                    let current = emi(p, r, t);
                    assert!(current > 0.0);
                    assert!(current > previous, "emi should rise with rate");
                    previous = current;
                }
            }
            for &r in &rates {
                let mut previous = 0.0;
                for &p in &principals {
                    let current = emi(p, r, t);
                    assert!(current > previous, "emi should rise with principal");
                    previous = current;
                }
            }
        }
    }

    #[test]
    fn test_inverse_recovers_principal() {
        for &p in &[50_000.0, 500_000.0, 3_750_000.0] {
            for &r in &[0.0, 10.99, 12.0, 15.5] {
                for &t in &[6, 24, 36, 60] {
                    let recovered = max_principal_from_payment(emi(p, r, t), r, t);
                    assert!(
                        (recovered - p).abs() < 0.5,
                        "p={} r={} t={} recovered={}",
                        p,
                        r,
                        t,
                        recovered
                    );
                }
            }
        }
    }

    #[test]
    fn test_format_inr_groups_lakhs() {
        assert_eq!(format_inr(4_000_000), "₹40,00,000");
        assert_eq!(format_inr(50_000), "₹50,000");
        assert_eq!(format_inr(999), "₹999");
        assert_eq!(format_inr(123_456_789), "₹12,34,56,789");
    }

    #[test]
    fn test_format_rupees() {
        assert_eq!(format_rupees(23_303.5), "₹23,303.50");
        assert_eq!(format_rupees(500_000.0), "₹5,00,000.00");
    }
}
