use crate::types::advice::{Advice, MagnitudeBand};

use serde::Deserialize;

const DEFAULT_CATALOG: &str = include_str!("../data/advices.toml");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid advice catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("advice catalog is empty")]
    Empty,
    #[error("band {0} is empty or not finite")]
    InvalidBand(MagnitudeBand),
    #[error("band {current} overlaps or precedes {previous}")]
    Unordered {
        previous: MagnitudeBand,
        current: MagnitudeBand,
    },
    #[error("only the last band may be closed, found {0}")]
    ClosedBeforeEnd(MagnitudeBand),
}

#[derive(Deserialize)]
struct CatalogFile {
    advice: Vec<Advice>,
}

/// Ordered advice records, one per magnitude band.
#[derive(Debug, Clone)]
pub struct AdviceCatalog {
    entries: Vec<Advice>,
}

impl AdviceCatalog {
    /// The catalog bundled with the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml(DEFAULT_CATALOG)
    }

    pub fn from_toml(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(raw)?;
        Self::new(file.advice)
    }

    pub fn new(entries: Vec<Advice>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }

        let last = entries.len() - 1;
        for (idx, entry) in entries.iter().enumerate() {
            let band = entry.band;
            if !band.min.is_finite() || !band.max.is_finite() || band.min >= band.max {
                return Err(CatalogError::InvalidBand(band));
            }
            if band.closed && idx != last {
                return Err(CatalogError::ClosedBeforeEnd(band));
            }
            if idx > 0 {
                let previous = entries[idx - 1].band;
                if band.min < previous.max {
                    return Err(CatalogError::Unordered {
                        previous,
                        current: band,
                    });
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[Advice] {
        &self.entries
    }

    /// Picks the advice whose band contains `magnitude`.
    ///
    /// Out-of-range values, NaN and values in a gap between bands select nothing.
    pub fn select(&self, magnitude: f64) -> Option<&Advice> {
        if magnitude.is_nan() {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| entry.band.contains(magnitude))
    }
}
