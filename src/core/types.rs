use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::SimulationError;

/// Closing prices keyed by trading day, always held in date order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSeries(BTreeMap<NaiveDate, f64>);

impl PriceSeries {
    pub fn new(prices: BTreeMap<NaiveDate, f64>) -> Self {
        Self(prices)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.0.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.0.keys().next_back().copied()
    }

    pub fn range(
        &self,
        dates: RangeInclusive<NaiveDate>,
    ) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.0.range(dates).map(|(date, price)| (*date, *price))
    }
}

impl FromIterator<(NaiveDate, f64)> for PriceSeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissedDayPolicy {
    /// Pending days are reset every month; a day that never fires is dropped.
    #[default]
    Skip,
    /// Days left pending at month end fire on the next month's first trading day.
    RollForward,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvestmentPlan {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_amount: f64,
    pub fee_rate: f64,
    pub investment_days: BTreeSet<u32>,
    pub missed_day_policy: MissedDayPolicy,
}

impl InvestmentPlan {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.start_date > self.end_date {
            return Err(SimulationError::InvalidPlan(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }

        if !self.monthly_amount.is_finite() || self.monthly_amount <= 0.0 {
            return Err(SimulationError::InvalidPlan(
                "monthly amount must be > 0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(SimulationError::InvalidPlan(
                "fee rate must be in [0, 1)".to_string(),
            ));
        }

        if self.investment_days.is_empty() {
            return Err(SimulationError::NoInvestmentDays);
        }

        if let Some(day) = self
            .investment_days
            .iter()
            .find(|day| !(1..=31).contains(*day))
        {
            return Err(SimulationError::InvalidPlan(format!(
                "investment day {day} is outside 1-31"
            )));
        }

        Ok(())
    }

    pub fn per_day_amount(&self) -> f64 {
        self.monthly_amount / self.investment_days.len() as f64
    }

    /// Calendar span of the plan in 365-day years.
    pub fn years(&self) -> f64 {
        (self.end_date - self.start_date).num_days() as f64 / 365.0
    }
}

/// Parses a `YYYY-MM-DD` date, reporting failures as a plan error.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate, SimulationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| SimulationError::InvalidPlan(format!("malformed date '{value}'")))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationEvent {
    pub date: NaiveDate,
    pub price: f64,
    pub triggered_days: Vec<u32>,
    pub daily_investment: f64,
    pub daily_fees: f64,
    pub daily_shares: f64,
    pub total_investment: f64,
    pub total_fees: f64,
    pub total_shares: f64,
    pub current_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_investment: f64,
    pub current_value: f64,
    pub profit_loss: f64,
    pub total_return: f64,
    pub annualized_return: Option<f64>,
    pub total_fees: f64,
    pub total_shares: f64,
    pub average_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub events: Vec<SimulationEvent>,
    pub summary: Summary,
}
