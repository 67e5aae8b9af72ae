use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{Program, ProgramType};
use crate::config::EnrollmentSettings;

pub const DEFAULT_WEEKEND_CLUB_WINDOW_DAYS: i64 = 28;
pub const DEFAULT_HOLIDAY_CAMP_WINDOW_DAYS: i64 = 5;

/// Outcome of a program-level sign-up window check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_passed: Option<i64>,
    pub limit_days: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Decides whether a program still accepts new program-level enrollments.
///
/// Only consulted at sign-up; class assignment for an existing enrollment ignores the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentWindowPolicy {
    weekend_club_days: i64,
    holiday_camp_days: i64,
}

impl EnrollmentWindowPolicy {
    pub fn new(weekend_club_days: i64, holiday_camp_days: i64) -> Self {
        let weekend_club_days = if weekend_club_days >= 0 {
            weekend_club_days
        } else {
            DEFAULT_WEEKEND_CLUB_WINDOW_DAYS
        };
        let holiday_camp_days = if holiday_camp_days >= 0 {
            holiday_camp_days
        } else {
            DEFAULT_HOLIDAY_CAMP_WINDOW_DAYS
        };

        Self {
            weekend_club_days,
            holiday_camp_days,
        }
    }

    pub fn limit_for(&self, program_type: ProgramType) -> i64 {
        match program_type {
            ProgramType::WeekendClub => self.weekend_club_days,
            ProgramType::HolidayCamp => self.holiday_camp_days,
        }
    }

    pub fn can_enroll(&self, program: &Program, today: NaiveDate) -> WindowDecision {
        let limit_days = self.limit_for(program.program_type);

        let Some(start_date) = program.start_date else {
            return WindowDecision {
                allowed: false,
                days_passed: None,
                limit_days,
                reason: Some(format!("{} has no start date on record", program.name)),
            };
        };

        let days_passed = today.signed_duration_since(start_date).num_days();
        if days_passed <= limit_days {
            return WindowDecision {
                allowed: true,
                days_passed: Some(days_passed),
                limit_days,
                reason: None,
            };
        }

        WindowDecision {
            allowed: false,
            days_passed: Some(days_passed),
            limit_days,
            reason: Some(format!(
                "{} enrollment closed {} day(s) after start; {} day(s) have passed",
                program.program_type.label(),
                limit_days,
                days_passed
            )),
        }
    }
}

impl Default for EnrollmentWindowPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_WEEKEND_CLUB_WINDOW_DAYS,
            DEFAULT_HOLIDAY_CAMP_WINDOW_DAYS,
        )
    }
}

impl From<&EnrollmentSettings> for EnrollmentWindowPolicy {
    fn from(settings: &EnrollmentSettings) -> Self {
        Self::new(
            settings.weekend_club_window_days,
            settings.holiday_camp_window_days,
        )
    }
}
