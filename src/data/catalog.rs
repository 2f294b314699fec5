use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::DataError;

const COMPANY_SUFFIX: &str = "股份有限公司";

/// Filter value that matches every industry.
pub const ALL_INDUSTRIES: &str = "all";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub chinese_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub industry: String,
    pub ipo_date: Option<NaiveDate>,
    pub headquarters: Option<String>,
    pub key_products: Option<Vec<String>>,
    pub key_services: Option<Vec<String>>,
}

impl Company {
    /// Name without the trailing company-form suffix.
    pub fn display_name(&self) -> &str {
        self.chinese_name
            .strip_suffix(COMPANY_SUFFIX)
            .unwrap_or(&self.chinese_name)
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("chinese_name", &self.chinese_name),
            ("description", &self.description),
            ("sector", &self.sector),
            ("industry", &self.industry),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub symbol: String,
    pub company: Company,
}

impl Listing {
    fn matches_search(&self, needle: &str) -> bool {
        let sector_line = format!("{} | {}", self.company.sector, self.company.industry);
        [
            self.symbol.as_str(),
            self.company.display_name(),
            sector_line.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
    }

    fn matches_industry(&self, industry: &str) -> bool {
        industry == ALL_INDUSTRIES || self.company.industry == industry
    }

    /// Rejects start dates before the company's listing date.
    pub fn check_start_date(&self, start: NaiveDate) -> Result<(), DataError> {
        match self.company.ipo_date {
            Some(ipo_date) if start < ipo_date => Err(DataError::BeforeListing {
                symbol: self.symbol.clone(),
                ipo_date,
            }),
            _ => Ok(()),
        }
    }
}

/// Companies in the order they appear in `companies.json`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    listings: Vec<Listing>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let json = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let raw: Map<String, Value> =
            serde_json::from_str(json).map_err(|source| DataError::Json {
                context: "company catalog".to_string(),
                source,
            })?;

        let listings = raw
            .into_iter()
            .map(|(symbol, value)| {
                let company =
                    serde_json::from_value(value).map_err(|source| DataError::Json {
                        context: format!("company {symbol}"),
                        source,
                    })?;
                Ok(Listing { symbol, company })
            })
            .collect::<Result<Vec<_>, DataError>>()?;

        Ok(Self { listings })
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Listing> {
        self.listings.iter()
    }

    pub fn first(&self) -> Option<&Listing> {
        self.listings.first()
    }

    pub fn get(&self, symbol: &str) -> Option<&Listing> {
        self.listings.iter().find(|listing| listing.symbol == symbol)
    }

    /// Looks up a company and checks it carries every required field.
    pub fn select(&self, symbol: &str) -> Result<&Listing, DataError> {
        let listing = self
            .get(symbol)
            .ok_or_else(|| DataError::UnknownSymbol(symbol.to_string()))?;
        let missing = listing.company.missing_fields();
        if !missing.is_empty() {
            return Err(DataError::IncompleteCompany {
                symbol: symbol.to_string(),
                missing,
            });
        }
        Ok(listing)
    }

    pub fn industries(&self) -> Vec<&str> {
        self.listings
            .iter()
            .map(|listing| listing.company.industry.as_str())
            .filter(|industry| !industry.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn filter_by_industry<'a>(&'a self, industry: &'a str) -> impl Iterator<Item = &'a Listing> {
        self.listings
            .iter()
            .filter(move |listing| listing.matches_industry(industry))
    }

    /// Case-insensitive match on symbol, display name and "sector | industry".
    pub fn search(&self, term: &str) -> impl Iterator<Item = &Listing> {
        let needle = term.trim().to_lowercase();
        self.listings
            .iter()
            .filter(move |listing| listing.matches_search(&needle))
    }

    /// Applies the optional search term and industry filter together.
    pub fn listings(&self, search: Option<&str>, industry: Option<&str>) -> Vec<&Listing> {
        let needle = search.map(|term| term.trim().to_lowercase());
        let industry = industry.unwrap_or(ALL_INDUSTRIES);
        self.listings
            .iter()
            .filter(|listing| listing.matches_industry(industry))
            .filter(|listing| {
                needle
                    .as_deref()
                    .is_none_or(|needle| listing.matches_search(needle))
            })
            .collect()
    }
}

/// End dates in the future are pulled back to `today`.
pub fn clamp_end_date(end: NaiveDate, today: NaiveDate) -> NaiveDate {
    end.min(today)
}
