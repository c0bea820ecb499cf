//! Load ledger data types.
//!
//! Training sessions as supplied by the scheduling system, session RPE
//! records, per-day roll-ups and external load samples.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::ValidationError;

/// Longest accepted session duration: one calendar day.
pub const MAX_DURATION_MIN: u32 = 24 * 60;

/// Highest exertion score in tenths (10.0).
const MAX_EXERTION_TENTHS: u8 = 100;

/// Kind of training session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    Recovery,
    Strength,
    Conditioning,
    #[default]
    Technical,
    Tactical,
    Match,
}

impl SessionType {
    /// Column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Recovery => "RECOVERY",
            SessionType::Strength => "STRENGTH",
            SessionType::Conditioning => "CONDITIONING",
            SessionType::Technical => "TECHNICAL",
            SessionType::Tactical => "TACTICAL",
            SessionType::Match => "MATCH",
        }
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RECOVERY" => Ok(SessionType::Recovery),
            "STRENGTH" => Ok(SessionType::Strength),
            "CONDITIONING" => Ok(SessionType::Conditioning),
            "TECHNICAL" => Ok(SessionType::Technical),
            "TACTICAL" => Ok(SessionType::Tactical),
            "MATCH" => Ok(SessionType::Match),
            other => Err(format!("Unknown session type: {}", other)),
        }
    }
}

/// A scheduled training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSession {
    pub id: Uuid,
    #[serde(default)]
    pub session_type: SessionType,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
}

impl TrainingSession {
    /// Create a session with a fresh id.
    pub fn new(title: impl Into<String>, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_type: SessionType::default(),
            title: title.into(),
            starts_at,
            ends_at,
            location: None,
        }
    }

    /// Calendar date the session's loads are booked to.
    pub fn date(&self) -> NaiveDate {
        self.starts_at.date_naive()
    }

    /// Scheduled length in whole minutes.
    pub fn scheduled_minutes(&self) -> i64 {
        (self.ends_at - self.starts_at).num_minutes()
    }

    /// Check the session is well-formed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ends_at < self.starts_at {
            return Err(ValidationError::SessionEndsBeforeStart(self.id));
        }
        Ok(())
    }
}

/// Rating of perceived exertion, 0.0 to 10.0 with one decimal.
///
/// Held as integer tenths so that session load rounding is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Exertion(u8);

impl Exertion {
    /// Validate a score. Scores with a second decimal place are rejected.
    pub fn new(score: f32) -> Result<Self, ValidationError> {
        if !score.is_finite() || !(0.0..=10.0).contains(&score) {
            return Err(ValidationError::ExertionOutOfRange(score));
        }

        // f32 cannot hold most tenths exactly
        let tenths = (score * 10.0).round();
        if (score * 10.0 - tenths).abs() > 1e-3 {
            return Err(ValidationError::ExertionPrecision(score));
        }
        Ok(Self(tenths as u8))
    }

    /// Build from a stored tenths value.
    pub fn from_tenths(tenths: u8) -> Result<Self, ValidationError> {
        if tenths > MAX_EXERTION_TENTHS {
            return Err(ValidationError::ExertionOutOfRange(tenths as f32 / 10.0));
        }
        Ok(Self(tenths))
    }

    pub fn tenths(&self) -> u8 {
        self.0
    }

    pub fn value(&self) -> f32 {
        self.0 as f32 / 10.0
    }
}

impl fmt::Display for Exertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

/// Validate a session duration in minutes.
pub fn validate_duration(minutes: i64) -> Result<u32, ValidationError> {
    if minutes <= 0 || minutes > MAX_DURATION_MIN as i64 {
        return Err(ValidationError::InvalidDuration {
            got: minutes,
            max: MAX_DURATION_MIN,
        });
    }
    Ok(minutes as u32)
}

/// Session RPE load: `round(exertion × duration)`, halves rounded up.
pub fn srpe_load(exertion: Exertion, duration_min: u32) -> u32 {
    (exertion.tenths() as u32 * duration_min + 5) / 10
}

/// One athlete's internal load for one training session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLoad {
    pub athlete_id: Uuid,
    pub session_id: Uuid,
    /// Date of the owning session.
    pub session_date: NaiveDate,
    pub exertion: Exertion,
    pub duration_min: u32,
    pub load: u32,
}

impl SessionLoad {
    pub fn new(
        athlete_id: Uuid,
        session: &TrainingSession,
        exertion: Exertion,
        duration_min: u32,
    ) -> Self {
        Self {
            athlete_id,
            session_id: session.id,
            session_date: session.date(),
            exertion,
            duration_min,
            load: srpe_load(exertion, duration_min),
        }
    }
}

/// Which daily load column feeds the ACWR calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoadSource {
    /// Session RPE totals.
    #[default]
    Internal,
    /// Wearable-provided totals.
    External,
}

impl LoadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadSource::Internal => "INTERNAL",
            LoadSource::External => "EXTERNAL",
        }
    }
}

impl fmt::Display for LoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INTERNAL" => Ok(LoadSource::Internal),
            "EXTERNAL" => Ok(LoadSource::External),
            other => Err(format!("Unknown load source: {}", other)),
        }
    }
}

/// Per-athlete, per-date load totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLoad {
    pub athlete_id: Uuid,
    pub date: NaiveDate,
    /// Sum of session RPE loads for the date.
    pub internal_load: u32,
    /// Rounded sum of external samples for the date.
    pub external_load: u32,
}

impl DailyLoad {
    /// Value for the given source.
    pub fn value(&self, source: LoadSource) -> u32 {
        match source {
            LoadSource::Internal => self.internal_load,
            LoadSource::External => self.external_load,
        }
    }
}

/// Wearable provider of external load samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExternalProvider {
    Whoop,
    Oura,
    Catapult,
    Statsports,
    Veo,
}

impl ExternalProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalProvider::Whoop => "WHOOP",
            ExternalProvider::Oura => "OURA",
            ExternalProvider::Catapult => "CATAPULT",
            ExternalProvider::Statsports => "STATSPORTS",
            ExternalProvider::Veo => "VEO",
        }
    }
}

impl FromStr for ExternalProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WHOOP" => Ok(ExternalProvider::Whoop),
            "OURA" => Ok(ExternalProvider::Oura),
            "CATAPULT" => Ok(ExternalProvider::Catapult),
            "STATSPORTS" => Ok(ExternalProvider::Statsports),
            "VEO" => Ok(ExternalProvider::Veo),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// One provider's external load for an athlete on a date (e.g. PlayerLoad).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExternalLoadSample {
    pub athlete_id: Uuid,
    pub date: NaiveDate,
    pub provider: ExternalProvider,
    pub value: f64,
}

impl ExternalLoadSample {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(ValidationError::NegativeExternalLoad(self.value));
        }
        Ok(())
    }
}

/// Ledger mutation as delivered by the scheduling system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum SessionLoadEvent {
    /// Create or correct a record.
    Upsert {
        athlete_id: Uuid,
        session_id: Uuid,
        exertion: f32,
        /// Falls back to the session's scheduled length when absent.
        #[serde(default)]
        duration_min: Option<i64>,
    },
    /// Remove a record.
    Delete { athlete_id: Uuid, session_id: Uuid },
}
