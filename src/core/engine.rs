use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use super::error::SimulationError;
use super::types::{
    InvestmentPlan, MissedDayPolicy, PriceSeries, SimulationEvent, SimulationResult, Summary,
};

/// Money in, fees paid and shares bought, for one day or the whole run.
#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    investment: f64,
    fees: f64,
    shares: f64,
}

impl Totals {
    fn add(&mut self, other: Totals) {
        self.investment += other.investment;
        self.fees += other.fees;
        self.shares += other.shares;
    }
}

/// Investment days still waiting to fire.
#[derive(Debug, Default)]
struct PendingDays {
    month: Option<(i32, u32)>,
    carried: Vec<u32>,
    current: BTreeSet<u32>,
}

impl PendingDays {
    fn enter(&mut self, date: NaiveDate, plan: &InvestmentPlan) {
        let month = (date.year(), date.month());
        if self.month == Some(month) {
            return;
        }
        self.month = Some(month);
        let leftover = std::mem::replace(&mut self.current, plan.investment_days.clone());
        self.carried = match plan.missed_day_policy {
            MissedDayPolicy::Skip => Vec::new(),
            MissedDayPolicy::RollForward => leftover.into_iter().collect(),
        };
    }

    fn take_due(&mut self, day_of_month: u32) -> Vec<u32> {
        let mut due = std::mem::take(&mut self.carried);
        let today: Vec<u32> = self
            .current
            .iter()
            .copied()
            .take_while(|day| *day <= day_of_month)
            .collect();
        for day in &today {
            self.current.remove(day);
        }
        due.extend(today);
        due
    }
}

fn buy(amount: f64, fee_rate: f64, price: f64) -> Totals {
    let fee = amount * fee_rate;
    Totals {
        investment: amount,
        fees: fee,
        shares: (amount - fee) / price,
    }
}

/// Replays `prices` against `plan`, producing one event per trading day on
/// which at least one investment day fires.
pub fn simulate(
    prices: &PriceSeries,
    plan: &InvestmentPlan,
) -> Result<SimulationResult, SimulationError> {
    plan.validate()?;

    let per_day_amount = plan.per_day_amount();
    let mut pending = PendingDays::default();
    let mut ledger = Totals::default();
    let mut events = Vec::new();
    let mut trading_days = 0usize;

    for (date, price) in prices.range(plan.start_date..=plan.end_date) {
        if !price.is_finite() || price <= 0.0 {
            return Err(SimulationError::InvalidPrice { date, price });
        }
        trading_days += 1;

        pending.enter(date, plan);
        let triggered_days = pending.take_due(date.day());
        if triggered_days.is_empty() {
            continue;
        }

        let mut daily = Totals::default();
        for _ in &triggered_days {
            daily.add(buy(per_day_amount, plan.fee_rate, price));
        }

        ledger.add(daily);

        events.push(SimulationEvent {
            date,
            price,
            triggered_days,
            daily_investment: daily.investment,
            daily_fees: daily.fees,
            daily_shares: daily.shares,
            total_investment: ledger.investment,
            total_fees: ledger.fees,
            total_shares: ledger.shares,
            current_value: ledger.shares * price,
        });
    }

    debug!(
        trading_days,
        events = events.len(),
        start = %plan.start_date,
        end = %plan.end_date,
        "backtest replay finished"
    );

    let summary = summarize(&events, plan)?;
    Ok(SimulationResult { events, summary })
}

fn summarize(
    events: &[SimulationEvent],
    plan: &InvestmentPlan,
) -> Result<Summary, SimulationError> {
    let last = events.last().ok_or(SimulationError::EmptyRange)?;

    let current_value = last.total_shares * last.price;
    let profit_loss = current_value - last.total_investment;
    let total_return = profit_loss / last.total_investment;

    Ok(Summary {
        total_investment: last.total_investment,
        current_value,
        profit_loss,
        total_return,
        annualized_return: annualized_return(total_return, plan.years()),
        total_fees: last.total_fees,
        total_shares: last.total_shares,
        average_cost: last.total_investment / last.total_shares,
    })
}

/// Compound annual growth rate for `total_return` earned over `years`.
///
/// Returns `None` for spans of zero or negative length, where the rate is
/// undefined.
pub fn annualized_return(total_return: f64, years: f64) -> Option<f64> {
    if years.is_nan() || years <= 0.0 {
        return None;
    }
    let exponent = 1.0 / years;
    if exponent == 1.0 {
        // (1 + r)^1 - 1 loses the low bits of r in floating point.
        return Some(total_return);
    }
    Some((1.0 + total_return).powf(exponent) - 1.0)
}
