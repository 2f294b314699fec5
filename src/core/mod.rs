mod engine;
mod error;
mod format;
mod types;

pub use engine::{annualized_return, simulate};
pub use error::SimulationError;
pub use format::{FormattedSummary, format_currency, format_percentage};
pub use types::{
    InvestmentPlan, MissedDayPolicy, PriceSeries, SimulationEvent, SimulationResult, Summary,
    parse_iso_date,
};
