//! Plain-text rendering of rosters for the terminal.

use crate::models::*;

const FULL: char = '●';
const OPEN: char = '○';

fn status_symbol(group: &Group) -> char {
    if group.is_full() {
        FULL
    } else {
        OPEN
    }
}

fn status_text(group: &Group) -> String {
    match group.capacity_remaining {
        0 => "full".to_string(),
        n => format!("{n} spot(s) left"),
    }
}

/// Render a group header followed by its members as branches.
///
/// Example output:
/// ```text
/// ○ Group 3f2a9c1e-7b4d-4c1a-9e52-0d8f6a1b2c3d (2 spot(s) left)
/// ├── Ada (S1)
/// └── Bob (S2)
/// ```
pub fn render_group(group: &Group) -> String {
    let mut output = String::new();
    output.push(status_symbol(group));
    output.push_str(&format!(" Group {} ({})\n", group.id, status_text(group)));

    for (i, member) in group.members.iter().enumerate() {
        let is_last = i == group.members.len() - 1;
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(branch);
        output.push_str(&format!("{} ({})\n", member.name, member.student_id));
    }
    output
}

pub fn render_groups(groups: &[Group]) -> String {
    if groups.is_empty() {
        return "No groups.\n".to_string();
    }
    groups.iter().map(render_group).collect()
}

pub fn render_individual(individual: &Individual) -> String {
    format!(
        "{} ({}) - {}\n",
        individual.name, individual.student_id, individual.email
    )
}

pub fn render_individuals(individuals: &[Individual]) -> String {
    if individuals.is_empty() {
        return "No individuals currently looking for groups.\n".to_string();
    }
    individuals.iter().map(render_individual).collect()
}

pub fn render_dashboard(dashboard: &Dashboard) -> String {
    let mut output = String::from("== Groups\n");
    output.push_str(&render_groups(&dashboard.groups));
    output.push_str("\n== Partial groups (open for members)\n");
    if dashboard.partial_groups.is_empty() {
        output.push_str("No partial groups available.\n");
    } else {
        output.push_str(&render_groups(&dashboard.partial_groups));
    }
    output.push_str("\n== Individuals looking for groups\n");
    output.push_str(&render_individuals(&dashboard.individuals));
    output
}

pub fn render_search(results: &SearchResults) -> String {
    if results.is_empty() {
        return "No matches.\n".to_string();
    }
    let mut output = String::new();
    if !results.groups.is_empty() {
        output.push_str("Groups found:\n");
        output.push_str(&render_groups(&results.groups));
    }
    if !results.individuals.is_empty() {
        output.push_str("Individuals found:\n");
        output.push_str(&render_individuals(&results.individuals));
    }
    output
}

pub fn render_summary(summary: &RosterSummary) -> String {
    format!(
        "Total groups: {}\nFull groups: {}\nOpen seats: {}\nIndividuals looking for groups: {}\n",
        summary.total_groups, summary.full_groups, summary.open_seats, summary.total_individuals
    )
}

pub fn render_state(state: &StudentState) -> String {
    match state {
        StudentState::Unregistered => "Not registered.\n".to_string(),
        StudentState::Individual { individual } => {
            format!("Looking for a group: {}", render_individual(individual))
        }
        StudentState::Grouped { group, member } => {
            format!("{} is in:\n{}", member.name, render_group(group))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn make_group(members: &[(&str, &str)]) -> Group {
        let members: Vec<Member> = members.iter().map(|(n, s)| Member::new(*n, *s)).collect();
        Group {
            id: Uuid::nil(),
            capacity_remaining: capacity_for(members.len()),
            members,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_open_group() {
        let output = render_group(&make_group(&[("Ada", "S1"), ("Bob", "S2")]));
        assert_eq!(
            output,
            "○ Group 00000000-0000-0000-0000-000000000000 (2 spot(s) left)\n├── Ada (S1)\n└── Bob (S2)\n"
        );
    }

    #[test]
    fn test_full_group() {
        let output = render_group(&make_group(&[
            ("A", "1"),
            ("B", "2"),
            ("C", "3"),
            ("D", "4"),
        ]));
        assert!(output.starts_with("● Group"));
        assert!(output.contains("(full)"));
        assert!(output.ends_with("└── D (4)\n"));
    }

    #[test]
    fn test_empty_search() {
        assert_eq!(render_search(&SearchResults::default()), "No matches.\n");
    }
}
