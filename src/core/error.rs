use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("no trading day in the selected range triggered an investment")]
    EmptyRange,

    #[error("at least one investment day of month must be selected")]
    NoInvestmentDays,

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("invalid price {price} on {date}")]
    InvalidPrice { date: NaiveDate, price: f64 },
}
