use serde::{Deserialize, Serialize};

use super::domain::PriceType;
use super::repository::{EnrollmentStore, RepositoryError};

pub const DEFAULT_FULL_PRICE: u32 = 4000;
pub const DEFAULT_SIBLING_DISCOUNT_PRICE: u32 = 3600;
pub const DEFAULT_EARLY_BIRD_PRICE: u32 = 3400;

/// Compiled-in amounts used whenever no override row exists for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTable {
    pub full_price: u32,
    pub sibling_discount: u32,
    pub early_bird: u32,
}

impl PriceTable {
    pub const fn amount(&self, price_type: PriceType) -> u32 {
        match price_type {
            PriceType::FullPrice => self.full_price,
            PriceType::SiblingDiscount => self.sibling_discount,
            PriceType::EarlyBird => self.early_bird,
        }
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            full_price: DEFAULT_FULL_PRICE,
            sibling_discount: DEFAULT_SIBLING_DISCOUNT_PRICE,
            early_bird: DEFAULT_EARLY_BIRD_PRICE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Default,
    Override,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price_type: PriceType,
    pub amount: u32,
    pub source: PriceSource,
}

/// Maps a tier to its current amount: admin override first, compiled default otherwise.
#[derive(Debug, Clone, Default)]
pub struct PricingResolver {
    defaults: PriceTable,
}

impl PricingResolver {
    pub fn new(defaults: PriceTable) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &PriceTable {
        &self.defaults
    }

    pub fn quote(
        &self,
        store: &dyn EnrollmentStore,
        price_type: PriceType,
    ) -> Result<PriceQuote, RepositoryError> {
        let quote = match store.price_override(price_type)? {
            Some(amount) => PriceQuote {
                price_type,
                amount,
                source: PriceSource::Override,
            },
            None => PriceQuote {
                price_type,
                amount: self.defaults.amount(price_type),
                source: PriceSource::Default,
            },
        };
        Ok(quote)
    }

    pub fn amount_for(
        &self,
        store: &dyn EnrollmentStore,
        price_type: PriceType,
    ) -> Result<u32, RepositoryError> {
        self.quote(store, price_type).map(|quote| quote.amount)
    }

    pub fn table(&self, store: &dyn EnrollmentStore) -> Result<Vec<PriceQuote>, RepositoryError> {
        PriceType::ALL
            .into_iter()
            .map(|price_type| self.quote(store, price_type))
            .collect()
    }
}
