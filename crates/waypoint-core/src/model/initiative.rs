use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

use super::period::Period;

/// First month of a quarter, relative to the quarter.
pub const FIRST_MONTH: u8 = 1;
/// Last month of a quarter, relative to the quarter.
pub const LAST_MONTH: u8 = 3;
/// Upper bound for `progress`.
pub const MAX_PROGRESS: u8 = 100;

/// Swimlane an initiative belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Engineering,
    Design,
    Marketing,
    Product,
    Operations,
}

impl Team {
    /// Every team, in swimlane order.
    pub const ALL: [Self; 5] = [
        Self::Engineering,
        Self::Design,
        Self::Marketing,
        Self::Product,
        Self::Operations,
    ];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Engineering => "engineering",
            Self::Design => "design",
            Self::Marketing => "marketing",
            Self::Product => "product",
            Self::Operations => "operations",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// The three lifecycle states shown as status dots on a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    NotStarted,
    InProgress,
    Completed,
}

impl Status {
    const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }
}

/// Opaque identifier assigned by the remote store on first persist.
///
/// Hosted tables hand out either text (uuid) or integer keys; both are held
/// as text so the rest of the crate never cares which.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct InitiativeId(String);

impl InitiativeId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for InitiativeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for InitiativeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for InitiativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for InitiativeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Number(number) => Self(number.to_string()),
        })
    }
}

/// Every field of an initiative except its id.
///
/// Doubles as the draft submitted to `create` and as the patch submitted to
/// `update`, which replaces all mutable fields at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeFields {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub team: Team,
    pub priority: Priority,
    pub status: Status,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub assignee: Option<String>,
    pub start_month: u8,
    pub end_month: u8,
    pub quarter: u8,
    pub year: i32,
}

impl InitiativeFields {
    /// Check the record invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        for month in [self.start_month, self.end_month] {
            if !(FIRST_MONTH..=LAST_MONTH).contains(&month) {
                return Err(ValidationError::MonthOutOfRange(month));
            }
        }
        if self.end_month < self.start_month {
            return Err(ValidationError::EndBeforeStart {
                start: self.start_month,
                end: self.end_month,
            });
        }
        if self.progress > MAX_PROGRESS {
            return Err(ValidationError::ProgressOutOfRange(self.progress));
        }
        if !(1..=4).contains(&self.quarter) {
            return Err(ValidationError::QuarterOutOfRange(self.quarter));
        }
        Ok(())
    }

    /// The quarter/year this initiative is scheduled in.
    #[must_use]
    pub const fn period(&self) -> Period {
        Period::new(self.quarter, self.year)
    }

    /// Number of months spanned beyond the start month.
    #[must_use]
    pub const fn duration(&self) -> u8 {
        self.end_month.saturating_sub(self.start_month)
    }

    /// Fields after dropping the card on another lane/month cell.
    ///
    /// Team and start month change together; the end month keeps the
    /// original duration but is clamped to the last month of the quarter,
    /// so a long initiative dropped late in the quarter gets shorter.
    #[must_use]
    pub fn reassigned(&self, team: Team, start_month: u8) -> Self {
        let end_month = start_month.saturating_add(self.duration()).min(LAST_MONTH);
        Self {
            team,
            start_month,
            end_month,
            ..self.clone()
        }
    }
}

/// A persisted initiative: fields plus the remote-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initiative {
    pub id: InitiativeId,
    #[serde(flatten)]
    pub fields: InitiativeFields,
}

impl Initiative {
    #[must_use]
    pub const fn from_fields(id: InitiativeId, fields: InitiativeFields) -> Self {
        Self { id, fields }
    }
}

/// Why a set of fields was rejected before reaching the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("month {0} is outside the quarter (expected 1-3)")]
    MonthOutOfRange(u8),
    #[error("end month {end} is before start month {start}")]
    EndBeforeStart { start: u8, end: u8 },
    #[error("progress {0} exceeds 100")]
    ProgressOutOfRange(u8),
    #[error("quarter {0} is outside 1-4")]
    QuarterOutOfRange(u8),
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

impl FromStr for Team {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "engineering" => Ok(Self::Engineering),
            "design" => Ok(Self::Design),
            "marketing" => Ok(Self::Marketing),
            "product" => Ok(Self::Product),
            "operations" => Ok(Self::Operations),
            _ => Err(ParseEnumError {
                expected: "team",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "not-started" | "not_started" | "todo" => Ok(Self::NotStarted),
            "in-progress" | "in_progress" | "doing" => Ok(Self::InProgress),
            "completed" | "done" => Ok(Self::Completed),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Initiative, InitiativeFields, InitiativeId, Priority, Status, Team, ValidationError,
    };
    use std::str::FromStr;

    fn fields() -> InitiativeFields {
        InitiativeFields {
            title: "API Performance Optimization".into(),
            description: Some("Reduce response times".into()),
            team: Team::Engineering,
            priority: Priority::High,
            status: Status::InProgress,
            progress: 30,
            assignee: Some("TK".into()),
            start_month: 2,
            end_month: 3,
            quarter: 1,
            year: 2026,
        }
    }

    #[test]
    fn enum_json_roundtrips() {
        assert_eq!(
            serde_json::to_string(&Team::Operations).unwrap(),
            "\"operations\""
        );
        assert_eq!(serde_json::to_string(&Priority::Low).unwrap(), "\"low\"");
        assert_eq!(
            serde_json::to_string(&Status::NotStarted).unwrap(),
            "\"not-started\""
        );

        assert_eq!(
            serde_json::from_str::<Status>("\"in-progress\"").unwrap(),
            Status::InProgress
        );
        assert_eq!(
            serde_json::from_str::<Team>("\"design\"").unwrap(),
            Team::Design
        );
    }

    #[test]
    fn display_parse_roundtrips() {
        for value in Team::ALL {
            assert_eq!(Team::from_str(&value.to_string()).unwrap(), value);
        }
        for value in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(Priority::from_str(&value.to_string()).unwrap(), value);
        }
        for value in [Status::NotStarted, Status::InProgress, Status::Completed] {
            assert_eq!(Status::from_str(&value.to_string()).unwrap(), value);
        }
    }

    #[test]
    fn parse_accepts_loose_spellings() {
        assert_eq!(Status::from_str(" Done ").unwrap(), Status::Completed);
        assert_eq!(Status::from_str("in_progress").unwrap(), Status::InProgress);
        assert_eq!(Team::from_str("DESIGN").unwrap(), Team::Design);
    }

    #[test]
    fn parse_rejects_unknown_values() {
        assert!(Team::from_str("finance").is_err());
        assert!(Priority::from_str("urgent").is_err());
        let err = Status::from_str("blocked").unwrap_err();
        assert_eq!(err.to_string(), "invalid status: 'blocked'");
    }

    #[test]
    fn id_accepts_text_and_integer_keys() {
        let text: InitiativeId = serde_json::from_str("\"7f3c\"").unwrap();
        let number: InitiativeId = serde_json::from_str("42").unwrap();
        assert_eq!(text.as_str(), "7f3c");
        assert_eq!(number.as_str(), "42");
        assert_eq!(serde_json::to_string(&number).unwrap(), "\"42\"");
    }

    #[test]
    fn valid_fields_pass() {
        assert_eq!(fields().validate(), Ok(()));
    }

    #[test]
    fn validation_rejects_each_broken_invariant() {
        let mut f = fields();
        f.title = "   ".into();
        assert_eq!(f.validate(), Err(ValidationError::EmptyTitle));

        let mut f = fields();
        f.start_month = 3;
        f.end_month = 2;
        assert_eq!(
            f.validate(),
            Err(ValidationError::EndBeforeStart { start: 3, end: 2 })
        );

        let mut f = fields();
        f.end_month = 4;
        assert_eq!(f.validate(), Err(ValidationError::MonthOutOfRange(4)));

        let mut f = fields();
        f.start_month = 0;
        assert_eq!(f.validate(), Err(ValidationError::MonthOutOfRange(0)));

        let mut f = fields();
        f.progress = 101;
        assert_eq!(f.validate(), Err(ValidationError::ProgressOutOfRange(101)));

        let mut f = fields();
        f.quarter = 5;
        assert_eq!(f.validate(), Err(ValidationError::QuarterOutOfRange(5)));
    }

    #[test]
    fn reassign_keeps_duration_inside_quarter() {
        let mut f = fields();
        f.start_month = 1;
        f.end_month = 2;

        let moved = f.reassigned(Team::Design, 2);
        assert_eq!(moved.team, Team::Design);
        assert_eq!((moved.start_month, moved.end_month), (2, 3));
        assert_eq!(moved.title, f.title);
        assert_eq!(moved.progress, f.progress);
    }

    #[test]
    fn reassign_clamps_end_to_last_month() {
        let mut f = fields();
        f.start_month = 1;
        f.end_month = 3;

        let moved = f.reassigned(Team::Engineering, 3);
        assert_eq!((moved.start_month, moved.end_month), (3, 3));
        assert_eq!(moved.validate(), Ok(()));
    }

    #[test]
    fn initiative_json_is_flat() {
        let record = Initiative::from_fields(InitiativeId::from("id-1"), fields());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "id-1");
        assert_eq!(json["start_month"], 2);
        let back: Initiative = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
