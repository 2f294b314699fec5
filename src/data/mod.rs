mod catalog;
mod error;
mod store;

pub use catalog::{ALL_INDUSTRIES, Catalog, Company, Listing, clamp_end_date};
pub use error::DataError;
pub use store::{DateRange, PriceStore, StockDataFile};
