use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Anything shown in a list view or dropdown: a stable id and a display name.
pub trait Named {
    fn id(&self) -> i64;
    fn display_name(&self) -> Cow<'_, str>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaritalStatus {
    Single,
    #[serde(rename = "Married - Church")]
    MarriedChurch,
    #[serde(rename = "Married - Civil")]
    MarriedCivil,
    Union,
    Divorced,
    Widowed,
}

impl MaritalStatus {
    pub const ALL: [MaritalStatus; 6] = [
        MaritalStatus::Single,
        MaritalStatus::MarriedChurch,
        MaritalStatus::MarriedCivil,
        MaritalStatus::Union,
        MaritalStatus::Divorced,
        MaritalStatus::Widowed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaritalStatus::Single => "Single",
            MaritalStatus::MarriedChurch => "Married - Church",
            MaritalStatus::MarriedCivil => "Married - Civil",
            MaritalStatus::Union => "Union",
            MaritalStatus::Divorced => "Divorced",
            MaritalStatus::Widowed => "Widowed",
        }
    }
}

impl fmt::Display for MaritalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaritalStatus {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        let wanted = normalize_choice(value);
        Self::ALL
            .into_iter()
            .find(|status| normalize_choice(status.as_str()) == wanted)
            .ok_or_else(|| AppError::Validation(format!("unknown marital status: {value}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sunday,
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "Sunday",
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        let wanted = normalize_choice(value);
        Self::ALL
            .into_iter()
            .find(|day| {
                let name = normalize_choice(day.as_str());
                name == wanted || (wanted.len() == 3 && name.starts_with(&wanted))
            })
            .ok_or_else(|| AppError::Validation(format!("unknown day of the week: {value}")))
    }
}

fn normalize_choice(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

// ===================================================================
// Participants
// ===================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: i64,
    pub full_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub marital_status: String,
    #[serde(default)]
    pub father_name: Option<String>,
    #[serde(default)]
    pub mother_name: Option<String>,
    #[serde(default)]
    pub baptism_church: Option<String>,
    #[serde(default)]
    pub communion_church: Option<String>,
    pub creation_date: DateTime<Utc>,
    #[serde(default)]
    pub current_group_id: Option<i64>,
    #[serde(default)]
    pub current_group_module: Option<i16>,
    #[serde(default)]
    pub current_group_start_date: Option<NaiveDate>,
}

impl Participant {
    /// Label of the current group, `None` when unassigned.
    pub fn current_group_label(&self) -> Option<String> {
        match (self.current_group_id, self.current_group_start_date) {
            (Some(_), Some(start)) => Some(group_label(start)),
            _ => None,
        }
    }
}

impl Named for Participant {
    fn id(&self) -> i64 {
        self.id
    }

    fn display_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.full_name)
    }
}

/// Body of `POST /api/confirmands` and `PUT /api/confirmands/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantForm {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub birth_date: NaiveDate,
    pub address: String,
    pub marital_status: MaritalStatus,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub baptism_church: Option<String>,
    pub communion_church: Option<String>,
}

impl ParticipantForm {
    /// Prefills an edit form from an existing record.
    pub fn from_participant(participant: &Participant) -> AppResult<Self> {
        let birth_date = participant.birth_date.ok_or_else(|| {
            AppError::Validation(format!("{} has no birth date on record", participant.full_name))
        })?;
        Ok(Self {
            full_name: participant.full_name.clone(),
            email: participant.email.clone(),
            phone_number: participant.phone_number.clone(),
            birth_date,
            address: participant.address.clone(),
            marital_status: participant
                .marital_status
                .parse()
                .unwrap_or(MaritalStatus::Single),
            father_name: participant.father_name.clone(),
            mother_name: participant.mother_name.clone(),
            baptism_church: participant.baptism_church.clone(),
            communion_church: participant.communion_church.clone(),
        })
    }

    /// Trims every field, turns blank optional fields into `None` and
    /// rejects blank required fields.
    pub fn validate(mut self) -> AppResult<Self> {
        for (label, value) in [
            ("Full name", &mut self.full_name),
            ("Email", &mut self.email),
            ("Phone number", &mut self.phone_number),
            ("Address", &mut self.address),
        ] {
            *value = value.trim().to_string();
            if value.is_empty() {
                return Err(AppError::Validation(format!("{label} is required.")));
            }
        }
        if !self.email.contains('@') {
            return Err(AppError::Validation(format!(
                "{} is not a valid email address.",
                self.email
            )));
        }
        for field in [
            &mut self.father_name,
            &mut self.mother_name,
            &mut self.baptism_church,
            &mut self.communion_church,
        ] {
            *field = field
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantDetails {
    #[serde(flatten)]
    pub participant: Participant,
    #[serde(default)]
    pub sacraments: Vec<Sacrament>,
    #[serde(default)]
    pub group_history: Vec<GroupSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sacrament {
    pub id: i64,
    pub name: String,
}

impl Named for Sacrament {
    fn id(&self) -> i64 {
        self.id
    }

    fn display_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AddSacrament {
    pub sacrament_id: i64,
}

// ===================================================================
// Catechists
// ===================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catechist {
    pub id: i64,
    pub full_name: String,
    pub currently_active: bool,
    #[serde(default)]
    pub latest_group_id: Option<i64>,
    #[serde(default)]
    pub latest_group_module: Option<i16>,
    #[serde(default)]
    pub latest_group_start_date: Option<NaiveDate>,
}

impl Named for Catechist {
    fn id(&self) -> i64 {
        self.id
    }

    fn display_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.full_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCatechist {
    pub full_name: String,
    pub currently_active: bool,
}

impl NewCatechist {
    pub fn validate(mut self) -> AppResult<Self> {
        self.full_name = self.full_name.trim().to_string();
        if self.full_name.is_empty() {
            return Err(AppError::Validation("Full name is required.".into()));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatechistDetails {
    #[serde(flatten)]
    pub catechist: Catechist,
    #[serde(default)]
    pub group_history: Vec<GroupSummary>,
}

// ===================================================================
// Groups
// ===================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: i64,
    pub module: i16,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub catechist_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub module: i16,
    #[serde(default)]
    pub catechist_id: Option<i64>,
    #[serde(default)]
    pub catechist_name: Option<String>,
    pub day_of_the_week: String,
    #[serde(default)]
    pub group_link: Option<String>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl Named for Group {
    fn id(&self) -> i64 {
        self.id
    }

    fn display_name(&self) -> Cow<'_, str> {
        Cow::Owned(format!(
            "{} - Module {}",
            group_label(self.start_date),
            self.module
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewGroup {
    pub module: i16,
    pub catechist_id: Option<i64>,
    pub day_of_the_week: DayOfWeek,
    pub group_link: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl NewGroup {
    pub fn validate(self) -> AppResult<Self> {
        if self.module < 1 {
            return Err(AppError::Validation("Module must be 1 or greater.".into()));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(AppError::Validation(
                    "End date cannot be before the start date.".into(),
                ));
            }
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDetails {
    pub id: i64,
    pub module: i16,
    #[serde(default)]
    pub catechist_name: Option<String>,
    pub day_of_the_week: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub members: Vec<Participant>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AddMember {
    pub confirmand_id: i64,
}

// ===================================================================
// Dashboard and import
// ===================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub participant_count: u64,
    pub catechist_count: u64,
    pub active_group_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub new_participants_imported: u64,
    pub rows_skipped: u64,
    #[serde(default)]
    pub imported_records: Vec<Participant>,
}

/// Semester label for a group starting on `start_date`; January to June is
/// the 1st semester.
pub fn group_label(start_date: NaiveDate) -> String {
    let semester = if start_date.month() <= 6 { "1st" } else { "2nd" };
    format!("{} {} Semester", start_date.year(), semester)
}
