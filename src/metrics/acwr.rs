//! Acute:Chronic Workload Ratio calculations.
//!
//! Acute and chronic load are exponentially weighted moving averages of the
//! daily load, each parameterised by a half-life in days:
//!
//! `alpha = 1 - exp(ln(0.5) / half_life)`
//!
//! so a day's contribution halves every `half_life` days. The ratio of the
//! two is the ACWR; it is defined as `0.0` while chronic load is zero.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::AcwrError;
use crate::load::types::LoadSource;

/// Default acute half-life in days.
pub const DEFAULT_ACUTE_HALF_LIFE: f64 = 7.0;

/// Default chronic half-life in days.
pub const DEFAULT_CHRONIC_HALF_LIFE: f64 = 28.0;

/// Smoothing constant for a half-life in days.
pub fn alpha_from_half_life(half_life_days: f64) -> f64 {
    1.0 - (0.5_f64.ln() / half_life_days).exp()
}

/// One EWMA step.
pub fn ewma(prev: f64, value: f64, alpha: f64) -> f64 {
    alpha * value + (1.0 - alpha) * prev
}

/// Running acute/chronic pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AcwrState {
    pub acute: f64,
    pub chronic: f64,
}

impl AcwrState {
    /// Acute over chronic, `0.0` when chronic is not positive.
    pub fn ratio(&self) -> f64 {
        if self.chronic > 0.0 {
            self.acute / self.chronic
        } else {
            0.0
        }
    }
}

/// ACWR status thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcwrStatus {
    /// ACWR < 0.8: Undertrained (detraining risk).
    Undertrained,
    /// ACWR 0.8 - 1.3: Optimal training zone.
    Optimal,
    /// ACWR 1.3 - 1.5: Caution zone.
    Caution,
    /// ACWR > 1.5: High injury risk.
    HighRisk,
}

impl AcwrStatus {
    /// Classify a ratio.
    pub fn classify(ratio: f64) -> Self {
        if ratio < 0.8 {
            AcwrStatus::Undertrained
        } else if ratio <= 1.3 {
            AcwrStatus::Optimal
        } else if ratio <= 1.5 {
            AcwrStatus::Caution
        } else {
            AcwrStatus::HighRisk
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AcwrStatus::Undertrained => "undertrained",
            AcwrStatus::Optimal => "optimal",
            AcwrStatus::Caution => "caution",
            AcwrStatus::HighRisk => "high-risk",
        }
    }
}

/// Persisted ACWR values for one athlete, day and source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcwrSnapshot {
    pub athlete_id: Uuid,
    pub date: NaiveDate,
    pub source: LoadSource,
    pub acute: f64,
    pub chronic: f64,
    pub ratio: f64,
}

impl AcwrSnapshot {
    pub fn status(&self) -> AcwrStatus {
        AcwrStatus::classify(self.ratio)
    }
}

/// ACWR calculator.
#[derive(Debug, Clone, Copy)]
pub struct AcwrCalculator {
    acute_alpha: f64,
    chronic_alpha: f64,
}

impl AcwrCalculator {
    /// Create with default half-lives (7/28 day).
    pub fn new() -> Self {
        Self {
            acute_alpha: alpha_from_half_life(DEFAULT_ACUTE_HALF_LIFE),
            chronic_alpha: alpha_from_half_life(DEFAULT_CHRONIC_HALF_LIFE),
        }
    }

    /// Create with custom half-lives.
    pub fn with_half_lives(acute_days: f64, chronic_days: f64) -> Result<Self, AcwrError> {
        for half_life in [acute_days, chronic_days] {
            if !half_life.is_finite() || half_life <= 0.0 {
                return Err(AcwrError::InvalidHalfLife(half_life));
            }
        }

        Ok(Self {
            acute_alpha: alpha_from_half_life(acute_days),
            chronic_alpha: alpha_from_half_life(chronic_days),
        })
    }

    pub fn acute_alpha(&self) -> f64 {
        self.acute_alpha
    }

    pub fn chronic_alpha(&self) -> f64 {
        self.chronic_alpha
    }

    /// Fold one day's load into the running state.
    pub fn step(&self, prev: AcwrState, load: f64) -> AcwrState {
        AcwrState {
            acute: ewma(prev.acute, load, self.acute_alpha),
            chronic: ewma(prev.chronic, load, self.chronic_alpha),
        }
    }

    /// Run a gap-free daily series from a cold start.
    pub fn calculate_series(&self, daily_loads: &[f64]) -> Vec<AcwrState> {
        let mut state = AcwrState::default();
        daily_loads
            .iter()
            .map(|load| {
                state = self.step(state, *load);
                state
            })
            .collect()
    }
}

impl Default for AcwrCalculator {
    fn default() -> Self {
        Self::new()
    }
}
