//! Starter dataset written to an empty remote table on first load.

use super::initiative::{InitiativeFields, Priority, Status, Team};

#[allow(clippy::too_many_arguments)]
fn starter(
    title: &str,
    description: &str,
    team: Team,
    priority: Priority,
    status: Status,
    progress: u8,
    assignee: &str,
    months: (u8, u8),
) -> InitiativeFields {
    InitiativeFields {
        title: title.to_string(),
        description: Some(description.to_string()),
        team,
        priority,
        status,
        progress,
        assignee: Some(assignee.to_string()),
        start_month: months.0,
        end_month: months.1,
        quarter: 1,
        year: 2026,
    }
}

/// Six sample initiatives spread across every team in Q1 2026.
#[must_use]
pub fn starter_initiatives() -> Vec<InitiativeFields> {
    vec![
        starter(
            "New Dashboard Release",
            "Complete redesign of the analytics dashboard with real-time metrics",
            Team::Engineering,
            Priority::High,
            Status::InProgress,
            65,
            "JD",
            (1, 2),
        ),
        starter(
            "Design System v3.0",
            "Refresh component library with new brand guidelines",
            Team::Design,
            Priority::Medium,
            Status::InProgress,
            40,
            "SK",
            (1, 1),
        ),
        starter(
            "Q1 Marketing Campaign",
            "Launch integrated campaign across digital channels",
            Team::Marketing,
            Priority::High,
            Status::NotStarted,
            0,
            "MR",
            (2, 3),
        ),
        starter(
            "User Research Sprint",
            "Conduct interviews and usability testing with 50+ users",
            Team::Product,
            Priority::Medium,
            Status::Completed,
            100,
            "AL",
            (1, 1),
        ),
        starter(
            "API Performance Optimization",
            "Reduce response times by 50% and improve caching",
            Team::Engineering,
            Priority::High,
            Status::InProgress,
            30,
            "TK",
            (2, 3),
        ),
        starter(
            "Process Automation",
            "Automate repetitive operational workflows",
            Team::Operations,
            Priority::Low,
            Status::NotStarted,
            0,
            "RB",
            (3, 3),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::starter_initiatives;
    use crate::model::Team;

    #[test]
    fn starter_set_is_valid_and_covers_every_team() {
        let seed = starter_initiatives();
        assert_eq!(seed.len(), 6);
        for fields in &seed {
            assert_eq!(fields.validate(), Ok(()), "{}", fields.title);
        }
        for team in Team::ALL {
            assert!(seed.iter().any(|f| f.team == team), "no starter for {team}");
        }
    }
}
