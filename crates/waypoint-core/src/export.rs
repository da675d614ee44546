//! CSV export of a filtered record set.

use crate::model::{Initiative, Period};

/// Column header line.
pub const CSV_HEADER: [&str; 9] = [
    "Title",
    "Team",
    "Priority",
    "Status",
    "Progress",
    "Assignee",
    "Start Month",
    "End Month",
    "Description",
];

/// Quote `value` when it contains a delimiter, a quote or a line break.
#[must_use]
pub fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn month_column(record: &Initiative, month: u8) -> String {
    record
        .fields
        .period()
        .month_name(month)
        .map_or_else(|| month.to_string(), str::to_string)
}

fn csv_row(record: &Initiative) -> String {
    let f = &record.fields;
    let cells = [
        escape_field(&f.title),
        f.team.to_string(),
        f.priority.to_string(),
        f.status.to_string(),
        f.progress.to_string(),
        escape_field(f.assignee.as_deref().unwrap_or("")),
        month_column(record, f.start_month),
        month_column(record, f.end_month),
        escape_field(f.description.as_deref().unwrap_or("")),
    ];
    cells.join(",")
}

/// Render `records` as CSV, header first, one line per record in order.
#[must_use]
pub fn to_csv<'a>(records: impl IntoIterator<Item = &'a Initiative>) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push('\n');
    for record in records {
        out.push_str(&csv_row(record));
        out.push('\n');
    }
    out
}

/// Suggested download name for `period`, e.g. `roadmap_Q1_2026.csv`.
#[must_use]
pub fn export_file_name(period: Period) -> String {
    format!("roadmap_Q{}_{}.csv", period.quarter, period.year)
}

#[cfg(test)]
mod tests {
    use super::{escape_field, export_file_name, to_csv};
    use crate::model::{Initiative, InitiativeId, Period, starter_initiatives};

    #[test]
    fn escapes_only_when_needed() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a, b"), "\"a, b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn renders_header_and_month_names() {
        let record = Initiative::from_fields(InitiativeId::from("1"), starter_initiatives().remove(0));
        let csv = to_csv([&record]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Title,Team,Priority,Status,Progress,Assignee,Start Month,End Month,Description")
        );
        assert_eq!(
            lines.next(),
            Some(
                "New Dashboard Release,engineering,high,in-progress,65,JD,January,February,\
                 Complete redesign of the analytics dashboard with real-time metrics"
            )
        );
        assert!(csv.ends_with('\n'));
    }

    #[test]
    fn months_follow_the_records_quarter() {
        let mut fields = starter_initiatives().remove(1);
        fields.quarter = 3;
        fields.description = None;
        fields.assignee = None;
        let record = Initiative::from_fields(InitiativeId::from("1"), fields);
        let csv = to_csv([&record]);
        assert!(csv.lines().nth(1).unwrap().ends_with(",,July,July,"));
    }

    #[test]
    fn empty_set_is_header_only() {
        assert_eq!(to_csv([]).lines().count(), 1);
    }

    #[test]
    fn file_name_includes_period() {
        assert_eq!(export_file_name(Period::new(2, 2026)), "roadmap_Q2_2026.csv");
    }
}
