use serde::{Deserialize, Serialize};

/// A magnitude range. Lower bound inclusive; upper bound exclusive unless `closed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeBand {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub closed: bool,
}

impl MagnitudeBand {
    pub fn contains(&self, magnitude: f64) -> bool {
        if magnitude < self.min {
            return false;
        }
        if self.closed {
            magnitude <= self.max
        } else {
            magnitude < self.max
        }
    }
}

impl std::fmt::Display for MagnitudeBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let close = if self.closed { ']' } else { ')' };
        write!(f, "[{:.1}, {:.1}{close}", self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub band: MagnitudeBand,
    pub general: String,
    pub aftershock: String,
    pub impact: String,
    pub during: String,
    pub after: String,
    pub safety_tips: String,
}
