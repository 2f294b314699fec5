use serde::Serialize;

use super::types::Summary;

const NOT_AVAILABLE: &str = "N/A";

/// The six headline metrics as display strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedSummary {
    pub total_investment: String,
    pub current_value: String,
    pub profit_loss: String,
    pub total_return: String,
    pub annualized_return: String,
    pub total_fees: String,
}

impl From<&Summary> for FormattedSummary {
    fn from(summary: &Summary) -> Self {
        Self {
            total_investment: format_currency(summary.total_investment),
            current_value: format_currency(summary.current_value),
            profit_loss: format_currency(summary.profit_loss),
            total_return: format_percentage(summary.total_return),
            annualized_return: summary
                .annualized_return
                .map_or_else(|| NOT_AVAILABLE.to_string(), format_percentage),
            total_fees: format_currency(summary.total_fees),
        }
    }
}

/// Formats `amount` as US dollars, e.g. `$1,234.57` or `-$12.00`.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return NOT_AVAILABLE.to_string();
    }
    let (sign, digits) = signed_fixed(amount);
    format!("{sign}${digits}")
}

/// Formats a ratio as a percentage with two decimals, e.g. `0.1234` as `12.34%`.
pub fn format_percentage(ratio: f64) -> String {
    if !ratio.is_finite() {
        return NOT_AVAILABLE.to_string();
    }
    let (sign, digits) = signed_fixed(ratio * 100.0);
    format!("{sign}{digits}%")
}

fn signed_fixed(value: f64) -> (&'static str, String) {
    let fixed = format!("{:.2}", value.abs());
    let is_zero = fixed.bytes().all(|b| b == b'0' || b == b'.');
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };
    (sign, group_thousands(&fixed))
}

fn group_thousands(fixed: &str) -> String {
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed, ""));
    let mut grouped = String::with_capacity(fixed.len() + integer.len() / 3);
    for (idx, ch) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if !fraction.is_empty() {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_uses_dollar_sign_grouping_and_cents() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(7.5), "$7.50");
        assert_eq!(format_currency(999.999), "$1,000.00");
        assert_eq!(format_currency(1234.567), "$1,234.57");
        assert_eq!(format_currency(1_000_000.0), "$1,000,000.00");
        assert_eq!(format_currency(123_456_789.1), "$123,456,789.10");
    }

    #[test]
    fn currency_puts_minus_before_symbol() {
        assert_eq!(format_currency(-12.0), "-$12.00");
        assert_eq!(format_currency(-2500.25), "-$2,500.25");
    }

    #[test]
    fn values_rounding_to_zero_have_no_sign() {
        assert_eq!(format_currency(-0.001), "$0.00");
        assert_eq!(format_currency(-0.0), "$0.00");
        assert_eq!(format_percentage(-0.00001), "0.00%");
    }

    #[test]
    fn percentage_has_two_decimals() {
        assert_eq!(format_percentage(0.0), "0.00%");
        assert_eq!(format_percentage(0.1234), "12.34%");
        assert_eq!(format_percentage(-0.05), "-5.00%");
        assert_eq!(format_percentage(1.0), "100.00%");
        assert_eq!(format_percentage(25.0), "2,500.00%");
    }

    #[test]
    fn summary_formats_every_metric() {
        let summary = Summary {
            total_investment: 3000.0,
            current_value: 3456.789,
            profit_loss: 456.789,
            total_return: 0.152263,
            annualized_return: None,
            total_fees: 3.0,
            total_shares: 4.5,
            average_cost: 666.67,
        };
        let formatted = FormattedSummary::from(&summary);
        assert_eq!(formatted.total_investment, "$3,000.00");
        assert_eq!(formatted.current_value, "$3,456.79");
        assert_eq!(formatted.profit_loss, "$456.79");
        assert_eq!(formatted.total_return, "15.23%");
        assert_eq!(formatted.annualized_return, "N/A");
        assert_eq!(formatted.total_fees, "$3.00");
    }

    #[test]
    fn non_finite_values_are_not_available() {
        assert_eq!(format_currency(f64::NAN), "N/A");
        assert_eq!(format_currency(f64::INFINITY), "N/A");
        assert_eq!(format_percentage(f64::NEG_INFINITY), "N/A");
    }
}
