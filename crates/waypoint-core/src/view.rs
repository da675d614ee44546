//! Pure projection of the local collection into what the board shows.
//!
//! Nothing here mutates or performs I/O; [`View::compute`] is re-run after
//! every applied change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::{Initiative, Period, Priority, Status, Team};
use crate::store::LocalStore;

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// A categorical filter: everything, or exactly one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Selector<T> {
    #[default]
    All,
    Only(T),
}

impl<T: PartialEq> Selector<T> {
    /// Whether `value` passes the filter.
    pub fn admits(&self, value: &T) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == value,
        }
    }

    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl<T: fmt::Display> fmt::Display for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(value) => value.fmt(f),
        }
    }
}

impl<T: FromStr> FromStr for Selector<T> {
    type Err = T::Err;

    /// `all` (any case) or an empty string selects everything.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        trimmed.parse().map(Self::Only)
    }
}

impl<T: fmt::Display> Serialize for Selector<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, T> Deserialize<'de> for Selector<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Active board filters. All criteria must hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewFilter {
    pub period: Period,
    #[serde(default)]
    pub team: Selector<Team>,
    #[serde(default)]
    pub priority: Selector<Priority>,
    #[serde(default)]
    pub status: Selector<Status>,
    /// Case-insensitive substring of title or description. Empty matches all.
    #[serde(default)]
    pub search: String,
}

impl ViewFilter {
    /// Filter showing everything in `period`.
    #[must_use]
    pub fn new(period: Period) -> Self {
        Self {
            period,
            team: Selector::All,
            priority: Selector::All,
            status: Selector::All,
            search: String::new(),
        }
    }

    #[must_use]
    pub const fn with_team(mut self, team: Selector<Team>) -> Self {
        self.team = team;
        self
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: Selector<Priority>) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn with_status(mut self, status: Selector<Status>) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Whether `record` passes every criterion.
    #[must_use]
    pub fn matches(&self, record: &Initiative) -> bool {
        let f = &record.fields;
        f.period() == self.period
            && self.team.admits(&f.team)
            && self.priority.admits(&f.priority)
            && self.status.admits(&f.status)
            && self.matches_search(record)
    }

    fn matches_search(&self, record: &Initiative) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        record.fields.title.to_lowercase().contains(&needle)
            || record
                .fields
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }
}

/// Records passing `filter`, in store order.
pub fn project<'a>(
    records: impl IntoIterator<Item = &'a Initiative>,
    filter: &ViewFilter,
) -> Vec<&'a Initiative> {
    records.into_iter().filter(|r| filter.matches(r)).collect()
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Mean progress rounded half up; zero for no records.
fn mean_progress<'a>(records: impl IntoIterator<Item = &'a Initiative>) -> u8 {
    let (sum, n) = records
        .into_iter()
        .fold((0u64, 0u64), |(sum, n), r| (sum + u64::from(r.fields.progress), n + 1));
    if n == 0 {
        return 0;
    }
    let mean = (2 * sum + n) / (2 * n);
    u8::try_from(mean).unwrap_or(u8::MAX)
}

/// Headline counts over a record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub high_priority: usize,
    pub completed: usize,
    pub mean_progress: u8,
}

impl Summary {
    #[must_use]
    pub fn of(records: &[&Initiative]) -> Self {
        Self {
            total: records.len(),
            high_priority: records
                .iter()
                .filter(|r| r.fields.priority == Priority::High)
                .count(),
            completed: records
                .iter()
                .filter(|r| r.fields.status == Status::Completed)
                .count(),
            mean_progress: mean_progress(records.iter().copied()),
        }
    }
}

/// Per-team lane header numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub team: Team,
    pub count: usize,
    pub completed: usize,
    pub mean_progress: u8,
}

/// One summary per team, scoped to `period` only.
pub fn team_summaries<'a>(
    records: impl IntoIterator<Item = &'a Initiative>,
    period: Period,
) -> Vec<TeamSummary> {
    let scoped: Vec<&Initiative> = records
        .into_iter()
        .filter(|r| r.fields.period() == period)
        .collect();
    Team::ALL
        .iter()
        .map(|&team| {
            let lane: Vec<&Initiative> = scoped
                .iter()
                .copied()
                .filter(|r| r.fields.team == team)
                .collect();
            TeamSummary {
                team,
                count: lane.len(),
                completed: lane
                    .iter()
                    .filter(|r| r.fields.status == Status::Completed)
                    .count(),
                mean_progress: mean_progress(lane.iter().copied()),
            }
        })
        .collect()
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub filter: ViewFilter,
    pub visible: Vec<Initiative>,
    pub summary: Summary,
    pub teams: Vec<TeamSummary>,
}

impl View {
    #[must_use]
    pub fn compute(store: &LocalStore, filter: &ViewFilter) -> Self {
        let visible = project(store.iter(), filter);
        Self {
            filter: filter.clone(),
            summary: Summary::of(&visible),
            teams: team_summaries(store.iter(), filter.period),
            visible: visible.into_iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Selector, Summary, View, ViewFilter, project, team_summaries};
    use crate::model::{
        Initiative, InitiativeId, Period, Priority, Status, Team, starter_initiatives,
    };
    use crate::store::LocalStore;
    use proptest::prelude::*;

    fn record(id: &str, team: Team, status: Status, progress: u8) -> Initiative {
        let mut fields = starter_initiatives().remove(0);
        fields.team = team;
        fields.status = status;
        fields.progress = progress;
        Initiative::from_fields(InitiativeId::from(id), fields)
    }

    #[test]
    fn two_record_scenario() {
        let records = [
            record("1", Team::Engineering, Status::Completed, 100),
            record("2", Team::Design, Status::InProgress, 40),
        ];
        let filter = ViewFilter::new(Period::new(1, 2026));
        let visible = project(&records, &filter);
        assert_eq!(visible.len(), 2);

        let summary = Summary::of(&visible);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.mean_progress, 70);
    }

    #[test]
    fn mean_rounds_half_up_and_empty_is_zero() {
        let records = [
            record("1", Team::Design, Status::InProgress, 1),
            record("2", Team::Design, Status::InProgress, 2),
        ];
        let visible: Vec<_> = records.iter().collect();
        assert_eq!(Summary::of(&visible).mean_progress, 2);
        assert_eq!(Summary::of(&[]), Summary::default());
    }

    #[test]
    fn search_matches_title_or_description_case_insensitively() {
        let records = [record("1", Team::Engineering, Status::InProgress, 0)];
        let by_title = ViewFilter::new(Period::new(1, 2026)).with_search("DASHBOARD");
        let by_description = ViewFilter::new(Period::new(1, 2026)).with_search("real-time");
        let miss = ViewFilter::new(Period::new(1, 2026)).with_search("payroll");
        assert_eq!(project(&records, &by_title).len(), 1);
        assert_eq!(project(&records, &by_description).len(), 1);
        assert!(project(&records, &miss).is_empty());
    }

    #[test]
    fn other_periods_are_excluded() {
        let records = [record("1", Team::Engineering, Status::InProgress, 0)];
        assert!(project(&records, &ViewFilter::new(Period::new(2, 2026))).is_empty());
        assert!(project(&records, &ViewFilter::new(Period::new(1, 2027))).is_empty());
    }

    #[test]
    fn team_summaries_ignore_categorical_filters() {
        let store = LocalStore::from_records([
            record("1", Team::Engineering, Status::Completed, 100),
            record("2", Team::Engineering, Status::InProgress, 50),
            record("3", Team::Design, Status::InProgress, 40),
        ]);
        let filter = ViewFilter::new(Period::new(1, 2026))
            .with_team(Selector::Only(Team::Design))
            .with_search("nothing matches this");
        let view = View::compute(&store, &filter);

        assert!(view.visible.is_empty());
        assert_eq!(view.teams.len(), 5);
        let eng = view.teams[0];
        assert_eq!((eng.team, eng.count, eng.completed, eng.mean_progress), (Team::Engineering, 2, 1, 75));
        assert_eq!(team_summaries(store.iter(), Period::new(3, 2026))[0].count, 0);
    }

    #[test]
    fn selector_parses_all_and_values() {
        assert_eq!("all".parse::<Selector<Team>>(), Ok(Selector::All));
        assert_eq!("".parse::<Selector<Team>>(), Ok(Selector::All));
        assert_eq!(
            "Design".parse::<Selector<Team>>(),
            Ok(Selector::Only(Team::Design))
        );
        assert!("finance".parse::<Selector<Team>>().is_err());
        assert_eq!(Selector::Only(Status::InProgress).to_string(), "in-progress");
    }

    fn arb_record() -> impl Strategy<Value = Initiative> {
        (
            0usize..6,
            prop::sample::select(Team::ALL.to_vec()),
            prop::sample::select(vec![Priority::Low, Priority::Medium, Priority::High]),
            prop::sample::select(vec![Status::NotStarted, Status::InProgress, Status::Completed]),
            1u8..=2,
            2026i32..=2027,
            "[a-z]{1,8}",
        )
            .prop_map(|(seed, team, priority, status, quarter, year, id)| {
                let mut fields = starter_initiatives().remove(seed);
                fields.team = team;
                fields.priority = priority;
                fields.status = status;
                fields.quarter = quarter;
                fields.year = year;
                Initiative::from_fields(InitiativeId::from(id), fields)
            })
    }

    fn arb_filter() -> impl Strategy<Value = ViewFilter> {
        (
            1u8..=2,
            2026i32..=2027,
            prop::option::of(prop::sample::select(Team::ALL.to_vec())),
            prop::option::of(prop::sample::select(vec![Priority::Low, Priority::High])),
            prop::option::of(prop::sample::select(vec![Status::InProgress, Status::Completed])),
            prop::sample::select(vec!["", "design", "LAUNCH", "zzz"]),
        )
            .prop_map(|(q, y, team, priority, status, search)| {
                ViewFilter::new(Period::new(q, y))
                    .with_team(team.map_or(Selector::All, Selector::Only))
                    .with_priority(priority.map_or(Selector::All, Selector::Only))
                    .with_status(status.map_or(Selector::All, Selector::Only))
                    .with_search(search)
            })
    }

    proptest! {
        #[test]
        fn projection_is_the_conjunction_of_criteria(
            records in prop::collection::vec(arb_record(), 0..20),
            filter in arb_filter(),
        ) {
            let visible = project(&records, &filter);
            let needle = filter.search.to_lowercase();
            let expected: Vec<&Initiative> = records
                .iter()
                .filter(|r| {
                    let f = &r.fields;
                    let text_hit = needle.is_empty()
                        || f.title.to_lowercase().contains(&needle)
                        || f.description.as_deref().unwrap_or("").to_lowercase().contains(&needle);
                    f.quarter == filter.period.quarter
                        && f.year == filter.period.year
                        && filter.team.admits(&f.team)
                        && filter.priority.admits(&f.priority)
                        && filter.status.admits(&f.status)
                        && text_hit
                })
                .collect();
            prop_assert_eq!(visible, expected);
        }
    }
}
