use chrono::{Months, NaiveDate};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Deserializer};

use crate::core::{InvestmentPlan, MissedDayPolicy, parse_iso_date};
use crate::data::clamp_end_date;

const DEFAULT_LOOKBACK_MONTHS: u32 = 60;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliMissedDayPolicy {
    Skip,
    RollForward,
}

impl From<CliMissedDayPolicy> for MissedDayPolicy {
    fn from(value: CliMissedDayPolicy) -> Self {
        match value {
            CliMissedDayPolicy::Skip => MissedDayPolicy::Skip,
            CliMissedDayPolicy::RollForward => MissedDayPolicy::RollForward,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiMissedDayPolicy {
    Skip,
    #[serde(alias = "rollForward")]
    RollForward,
}

impl From<ApiMissedDayPolicy> for CliMissedDayPolicy {
    fn from(value: ApiMissedDayPolicy) -> Self {
        match value {
            ApiMissedDayPolicy::Skip => CliMissedDayPolicy::Skip,
            ApiMissedDayPolicy::RollForward => CliMissedDayPolicy::RollForward,
        }
    }
}

/// Investment days as a JSON array or a comma-separated query value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum DayList {
    Many(Vec<u32>),
    Csv(String),
}

impl DayList {
    fn into_days(self) -> Result<Vec<u32>, String> {
        match self {
            DayList::Many(days) => Ok(days),
            DayList::Csv(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| {
                    part.parse::<u32>()
                        .map_err(|_| format!("investmentDays contains '{part}', expected 1-31"))
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct BacktestPayload {
    symbol: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    #[serde(deserialize_with = "present")]
    monthly_investment: Option<f64>,
    #[serde(deserialize_with = "present")]
    fee_rate: Option<f64>,
    investment_days: Option<DayList>,
    missed_day_policy: Option<ApiMissedDayPolicy>,
}

/// Absent keys fall back to defaults; an explicit `null` is rejected.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Args, Debug, Clone)]
pub struct BacktestArgs {
    #[arg(long, help = "Symbol from companies.json; defaults to the first listed company")]
    pub symbol: Option<String>,
    #[arg(
        long,
        help = "First day of the backtest (YYYY-MM-DD); defaults to five years before --end"
    )]
    pub start: Option<String>,
    #[arg(
        long,
        help = "Last day of the backtest (YYYY-MM-DD); defaults to today, later dates are clamped"
    )]
    pub end: Option<String>,
    #[arg(long, default_value_t = 1000.0, help = "Amount invested each month")]
    pub amount: f64,
    #[arg(
        long,
        default_value_t = 0.1,
        help = "Transaction fee in percent of each purchase"
    )]
    pub fee_rate: f64,
    #[arg(
        long = "day",
        value_delimiter = ',',
        help = "Day of month to invest on (1-31); repeat or comma-separate for several"
    )]
    pub days: Vec<u32>,
    #[arg(
        long,
        value_enum,
        default_value_t = CliMissedDayPolicy::Skip,
        help = "What happens to days that never fire within their month"
    )]
    pub missed_days: CliMissedDayPolicy,
}

impl Default for BacktestArgs {
    fn default() -> Self {
        Self {
            symbol: None,
            start: None,
            end: None,
            amount: 1000.0,
            fee_rate: 0.1,
            days: Vec::new(),
            missed_days: CliMissedDayPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRequest {
    pub symbol: Option<String>,
    pub plan: InvestmentPlan,
}

pub fn build_request(args: BacktestArgs, today: NaiveDate) -> Result<BacktestRequest, String> {
    if !args.amount.is_finite() || args.amount <= 0.0 {
        return Err("--amount must be > 0".to_string());
    }

    if !(0.0..100.0).contains(&args.fee_rate) {
        return Err("--fee-rate must be >= 0 and < 100 percent".to_string());
    }

    let end_date = match args.end.as_deref() {
        Some(raw) => clamp_end_date(parse_iso_date(raw).map_err(|e| e.to_string())?, today),
        None => today,
    };
    let start_date = match args.start.as_deref() {
        Some(raw) => parse_iso_date(raw).map_err(|e| e.to_string())?,
        None => end_date
            .checked_sub_months(Months::new(DEFAULT_LOOKBACK_MONTHS))
            .unwrap_or(end_date),
    };

    if start_date > end_date {
        return Err(format!(
            "--start ({start_date}) must not be after --end ({end_date})"
        ));
    }

    let symbol = args
        .symbol
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(BacktestRequest {
        symbol,
        plan: InvestmentPlan {
            start_date,
            end_date,
            monthly_amount: args.amount,
            fee_rate: args.fee_rate / 100.0,
            investment_days: args.days.into_iter().collect(),
            missed_day_policy: args.missed_days.into(),
        },
    })
}

#[cfg(test)]
pub(super) fn api_request_from_json(
    json: &str,
    today: NaiveDate,
) -> Result<BacktestRequest, String> {
    let payload = serde_json::from_str::<BacktestPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload, today)
}

pub(super) fn api_request_from_payload(
    payload: BacktestPayload,
    today: NaiveDate,
) -> Result<BacktestRequest, String> {
    let mut args = BacktestArgs::default();

    if let Some(v) = payload.symbol {
        args.symbol = Some(v);
    }
    if let Some(v) = payload.start_date {
        args.start = Some(v);
    }
    if let Some(v) = payload.end_date {
        args.end = Some(v);
    }
    if let Some(v) = payload.monthly_investment {
        args.amount = v;
    }
    if let Some(v) = payload.fee_rate {
        args.fee_rate = v;
    }
    if let Some(v) = payload.investment_days {
        args.days = v.into_days()?;
    }
    if let Some(v) = payload.missed_day_policy {
        args.missed_days = v.into();
    }

    build_request(args, today)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn date(value: &str) -> NaiveDate {
        parse_iso_date(value).expect("valid test date")
    }

    fn today() -> NaiveDate {
        date("2024-06-30")
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
          "symbol": "2330",
          "startDate": "2020-01-01",
          "endDate": "2023-12-31",
          "monthlyInvestment": 5000,
          "feeRate": 0.1425,
          "investmentDays": [6, 16, 26],
          "missedDayPolicy": "roll-forward"
        }"#;
        let request = api_request_from_json(json, today()).expect("json should parse");
        let plan = request.plan;

        assert_eq!(request.symbol.as_deref(), Some("2330"));
        assert_eq!(plan.start_date, date("2020-01-01"));
        assert_eq!(plan.end_date, date("2023-12-31"));
        assert_approx(plan.monthly_amount, 5000.0);
        assert_approx(plan.fee_rate, 0.001425);
        assert_eq!(plan.investment_days.into_iter().collect::<Vec<_>>(), vec![6, 16, 26]);
        assert_eq!(plan.missed_day_policy, MissedDayPolicy::RollForward);
    }

    #[test]
    fn empty_payload_uses_form_defaults() {
        let request = api_request_from_json("{}", today()).expect("defaults are valid");
        let plan = request.plan;

        assert_eq!(request.symbol, None);
        assert_eq!(plan.end_date, today());
        assert_eq!(plan.start_date, date("2019-06-30"));
        assert_approx(plan.monthly_amount, 1000.0);
        assert_approx(plan.fee_rate, 0.001);
        assert!(plan.investment_days.is_empty());
        assert_eq!(plan.missed_day_policy, MissedDayPolicy::Skip);
    }

    #[test]
    fn comma_separated_days_are_accepted() {
        let json = r#"{"investmentDays": "1, 15,28"}"#;
        let request = api_request_from_json(json, today()).expect("csv days parse");
        assert_eq!(
            request.plan.investment_days.into_iter().collect::<Vec<_>>(),
            vec![1, 15, 28]
        );

        let err = api_request_from_json(r#"{"investmentDays": "1,x"}"#, today())
            .expect_err("non-numeric day must fail");
        assert!(err.contains("investmentDays"));
    }

    #[test]
    fn duplicate_days_collapse_to_a_set() {
        let request = api_request_from_json(r#"{"investmentDays": [15, 1, 15]}"#, today())
            .expect("duplicates are allowed");
        assert_eq!(request.plan.investment_days.len(), 2);
    }

    #[test]
    fn future_end_date_is_clamped_to_today() {
        let request = api_request_from_json(
            r#"{"startDate": "2024-01-01", "endDate": "2030-01-01"}"#,
            today(),
        )
        .expect("future end is clamped");
        assert_eq!(request.plan.end_date, today());
    }

    #[test]
    fn build_request_rejects_invalid_amount_and_fee() {
        let mut args = BacktestArgs::default();
        args.amount = 0.0;
        let err = build_request(args, today()).expect_err("zero amount");
        assert!(err.contains("--amount"));

        let mut args = BacktestArgs::default();
        args.fee_rate = 100.0;
        let err = build_request(args, today()).expect_err("100% fee");
        assert!(err.contains("--fee-rate"));
    }

    #[test]
    fn build_request_rejects_malformed_and_reversed_dates() {
        let mut args = BacktestArgs::default();
        args.start = Some("2024/01/01".to_string());
        let err = build_request(args, today()).expect_err("slash date");
        assert!(err.contains("malformed date"));

        let mut args = BacktestArgs::default();
        args.start = Some("2024-05-01".to_string());
        args.end = Some("2024-04-01".to_string());
        let err = build_request(args, today()).expect_err("reversed range");
        assert!(err.contains("--start"));
    }

    #[test]
    fn null_amount_or_fee_is_rejected_not_defaulted() {
        for json in [
            r#"{"monthlyInvestment": null, "investmentDays": [1]}"#,
            r#"{"feeRate": null, "investmentDays": [1]}"#,
        ] {
            let err = api_request_from_json(json, today()).expect_err("null rejected");
            assert!(err.contains("invalid type: null"), "{err}");
        }

        let request = api_request_from_json(r#"{"investmentDays": [1]}"#, today())
            .expect("absent keys use defaults");
        assert_approx(request.plan.monthly_amount, 1000.0);
        assert_approx(request.plan.fee_rate, 0.001);
    }

    #[test]
    fn blank_symbol_is_treated_as_absent() {
        let request =
            api_request_from_json(r#"{"symbol": "  "}"#, today()).expect("blank symbol");
        assert_eq!(request.symbol, None);
    }

    #[test]
    fn missed_day_policy_accepts_kebab_and_camel_case() {
        for raw in ["roll-forward", "rollForward"] {
            let json = format!(r#"{{"missedDayPolicy": "{raw}"}}"#);
            let request = api_request_from_json(&json, today()).expect("policy parses");
            assert_eq!(request.plan.missed_day_policy, MissedDayPolicy::RollForward);
        }

        for raw in ["next", "drop", "carry", "roll_forward"] {
            let json = format!(r#"{{"missedDayPolicy": "{raw}"}}"#);
            let err = api_request_from_json(&json, today()).expect_err("unknown policy");
            assert!(err.contains("unknown variant"), "{err}");
        }
    }
}
