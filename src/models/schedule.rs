use std::sync::LazyLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::errors::ClientError;
use super::requests::Validate;

static TIME_OF_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-1]?[0-9]|2[0-3]):([0-5][0-9])$").expect("time-of-day pattern"));

/// Cron placeholder for a scan that should start right away.
pub const RUN_IMMEDIATELY: &str = "run-immediately";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleFrequency {
    #[default]
    Once,
    Daily,
    Weekly,
    Monthly,
}

/// When a scan against one target should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSchedule {
    pub frequency: ScheduleFrequency,
    /// Local time of day, `HH:MM`.
    pub time: String,
    /// 0 = Sunday .. 6 = Saturday. Weekly only, defaults to Monday.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u8>,
    /// 1..=31. Monthly only, defaults to the 1st.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
}

impl Default for ScanSchedule {
    fn default() -> Self {
        Self {
            frequency: ScheduleFrequency::Once,
            time: "09:00".to_string(),
            day_of_week: None,
            day_of_month: None,
        }
    }
}

impl ScanSchedule {
    pub fn once() -> Self {
        Self::default()
    }

    pub fn daily(time: impl Into<String>) -> Self {
        Self { frequency: ScheduleFrequency::Daily, time: time.into(), ..Default::default() }
    }

    pub fn weekly(time: impl Into<String>, day_of_week: u8) -> Self {
        Self {
            frequency: ScheduleFrequency::Weekly,
            time: time.into(),
            day_of_week: Some(day_of_week),
            ..Default::default()
        }
    }

    pub fn monthly(time: impl Into<String>, day_of_month: u8) -> Self {
        Self {
            frequency: ScheduleFrequency::Monthly,
            time: time.into(),
            day_of_month: Some(day_of_month),
            ..Default::default()
        }
    }

    pub fn runs_immediately(&self) -> bool {
        self.frequency == ScheduleFrequency::Once
    }

    fn hour_minute(&self) -> Result<(u8, u8), ClientError> {
        let invalid = || ClientError::Validation("Time must be in HH:MM format".into());
        let caps = TIME_OF_DAY.captures(self.time.trim()).ok_or_else(invalid)?;
        let hour = caps[1].parse::<u8>().map_err(|_| invalid())?;
        let minute = caps[2].parse::<u8>().map_err(|_| invalid())?;
        Ok((hour, minute))
    }

    /// Cron expression for this schedule, or [`RUN_IMMEDIATELY`] for a
    /// one-off scan.
    pub fn cron_expression(&self) -> Result<String, ClientError> {
        self.validate()?;
        let (hour, minute) = self.hour_minute()?;
        let cron = match self.frequency {
            ScheduleFrequency::Once => RUN_IMMEDIATELY.to_string(),
            ScheduleFrequency::Daily => format!("{} {} * * *", minute, hour),
            ScheduleFrequency::Weekly => {
                format!("{} {} * * {}", minute, hour, self.day_of_week.unwrap_or(1))
            }
            ScheduleFrequency::Monthly => {
                format!("{} {} {} * *", minute, hour, self.day_of_month.unwrap_or(1))
            }
        };
        Ok(cron)
    }
}

impl Validate for ScanSchedule {
    fn validate(&self) -> Result<(), ClientError> {
        self.hour_minute()?;
        if let Some(day) = self.day_of_week {
            if day > 6 {
                return Err(ClientError::Validation("Day of week must be between 0 and 6".into()));
            }
        }
        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(ClientError::Validation("Day of month must be between 1 and 31".into()));
            }
        }
        Ok(())
    }
}
