use super::enums::{Column, TaskSize};
use super::project::Project;
use super::task::Task;
use chrono::NaiveDate;
use uuid::Uuid;

/// Which project the board is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectSelection {
    All,
    Project(Uuid),
}

impl Default for ProjectSelection {
    fn default() -> Self {
        Self::All
    }
}

/// Active board filters. Filter types compose as a conjunction; the values
/// within one type are a disjunction. An empty value set bypasses that type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub selection: ProjectSelection,
    pub labels: Vec<String>,
    pub sizes: Vec<TaskSize>,
    pub active_only: bool,
}

/// Apply the board filters in fixed order: project, labels, size, active-only.
/// Relative task order is preserved.
pub fn filtered_tasks<'a>(tasks: &'a [Task], filters: &Filters) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| match filters.selection {
            ProjectSelection::All => true,
            ProjectSelection::Project(id) => task.project_id == Some(id),
        })
        .filter(|task| {
            filters.labels.is_empty()
                || filters.labels.iter().any(|label| task.labels.contains(label))
        })
        .filter(|task| {
            filters.sizes.is_empty()
                || task
                    .timing()
                    .map(|timing| filters.sizes.contains(&timing.size))
                    .unwrap_or(false)
        })
        .filter(|task| !filters.active_only || task.column != Column::Done)
        .collect()
}

/// Today's time aggregates. Grouping vectors keep discovery order;
/// display code sorts by descending minutes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodayStats {
    pub total_minutes: u32,
    pub estimate_minutes: u32,
    pub by_label: Vec<(String, u32)>,
    pub by_project: Vec<(String, u32)>,
}

/// Lifetime estimate/actual totals for one project
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProjectStats {
    pub total_estimate: u32,
    pub total_actual: u32,
}

fn bump(groups: &mut Vec<(String, u32)>, key: &str, minutes: u32) {
    match groups.iter_mut().find(|(name, _)| name.as_str() == key) {
        Some((_, total)) => *total += minutes,
        None => groups.push((key.to_string(), minutes)),
    }
}

/// Aggregate time entries that fall on `today` (local calendar day).
/// Prompt tasks never contribute. The task's estimate is added once per
/// qualifying entry.
pub fn today_stats(tasks: &[Task], projects: &[Project], today: NaiveDate) -> TodayStats {
    let mut stats = TodayStats::default();

    for task in tasks {
        let Some(timing) = task.timing() else { continue };

        for entry in &timing.time_entries {
            if entry.at.date_naive() != today {
                continue;
            }

            stats.total_minutes += entry.minutes;
            stats.estimate_minutes += timing.estimate_minutes;

            for label in &task.labels {
                bump(&mut stats.by_label, label, entry.minutes);
            }

            if let Some(project_id) = task.project_id {
                if let Some(project) = projects.iter().find(|p| p.id == project_id) {
                    bump(&mut stats.by_project, &project.name, entry.minutes);
                }
            }
        }
    }

    stats
}

/// Lifetime estimate/actual totals across a project's timed tasks
pub fn project_stats(tasks: &[Task], project_id: Uuid) -> ProjectStats {
    let mut stats = ProjectStats::default();

    for task in tasks {
        if task.project_id != Some(project_id) {
            continue;
        }
        if let Some(timing) = task.timing() {
            stats.total_estimate += timing.estimate_minutes;
            stats.total_actual += timing.actual_minutes;
        }
    }

    stats
}

/// Format a minute count as "2h 5m", "2h", "45m"; zero is "0m"
pub fn format_minutes(minutes: u32) -> String {
    if minutes == 0 {
        return "0m".to_string();
    }
    let hours = minutes / 60;
    let mins = minutes % 60;
    if hours > 0 {
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    } else {
        format!("{}m", mins)
    }
}

/// Format elapsed seconds as a ticking "MM:SS" clock
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::{TaskKind, TimeEntry, Timing};
    use chrono::{Duration, Local};
    use pretty_assertions::assert_eq;

    fn timed_task(title: &str) -> Task {
        Task::new(
            title.to_string(),
            None,
            Column::Backlog,
            TaskKind::Timed(Timing::default()),
        )
    }

    fn prompt_task(title: &str) -> Task {
        Task::new(
            title.to_string(),
            None,
            Column::Backlog,
            TaskKind::Prompt { text: String::new() },
        )
    }

    #[test]
    fn test_no_filters_returns_all_in_order() {
        let tasks = vec![timed_task("a"), prompt_task("b"), timed_task("c")];
        let filters = Filters::default();
        let filtered = filtered_tasks(&tasks, &filters);
        let titles: Vec<&str> = filtered.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_project_filter() {
        let project_id = Uuid::new_v4();
        let mut linked = timed_task("linked");
        linked.project_id = Some(project_id);
        let tasks = vec![linked, timed_task("unlinked")];

        let filters = Filters {
            selection: ProjectSelection::Project(project_id),
            ..Filters::default()
        };
        let filtered = filtered_tasks(&tasks, &filters);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "linked");
    }

    #[test]
    fn test_label_filter_is_disjunction() {
        let mut a = timed_task("a");
        a.labels = vec!["CRM".to_string()];
        let mut b = timed_task("b");
        b.labels = vec!["Music".to_string()];
        let c = timed_task("c");
        let tasks = vec![a, b, c];

        let filters = Filters {
            labels: vec!["CRM".to_string(), "Music".to_string()],
            ..Filters::default()
        };
        let filtered = filtered_tasks(&tasks, &filters);
        let titles: Vec<&str> = filtered.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[test]
    fn test_size_filter_excludes_prompt_tasks() {
        let mut big = timed_task("big");
        big.kind = TaskKind::Timed(Timing::with_size(TaskSize::Thirty));
        let tasks = vec![big, timed_task("small"), prompt_task("prompt")];

        let filters = Filters {
            sizes: vec![TaskSize::Thirty],
            ..Filters::default()
        };
        let filtered = filtered_tasks(&tasks, &filters);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "big");
    }

    #[test]
    fn test_active_only_excludes_done() {
        let mut done = timed_task("done");
        done.column = Column::Done;
        let tasks = vec![done, timed_task("open")];

        let filters = Filters {
            active_only: true,
            ..Filters::default()
        };
        let filtered = filtered_tasks(&tasks, &filters);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "open");
    }

    #[test]
    fn test_today_stats_excludes_other_days() {
        let project = Project::new(
            "Acme".to_string(),
            "#fff".to_string(),
            String::new(),
            None,
        );
        let now = Local::now();

        let mut today_task = timed_task("today");
        today_task.project_id = Some(project.id);
        today_task.labels = vec!["CRM".to_string()];
        today_task
            .timing_mut()
            .unwrap()
            .time_entries
            .push(TimeEntry { at: now, minutes: 30 });

        let mut yesterday_task = timed_task("yesterday");
        yesterday_task.timing_mut().unwrap().time_entries.push(TimeEntry {
            at: now - Duration::days(1),
            minutes: 20,
        });

        let tasks = vec![today_task, yesterday_task];
        let stats = today_stats(&tasks, std::slice::from_ref(&project), now.date_naive());

        assert_eq!(stats.total_minutes, 30);
        assert_eq!(stats.by_label, vec![("CRM".to_string(), 30)]);
        assert_eq!(stats.by_project, vec![("Acme".to_string(), 30)]);
    }

    #[test]
    fn test_today_stats_estimate_added_per_entry() {
        let now = Local::now();
        let mut task = timed_task("t");
        {
            let timing = task.timing_mut().unwrap();
            timing.estimate_minutes = 15;
            timing.time_entries.push(TimeEntry { at: now, minutes: 10 });
            timing.time_entries.push(TimeEntry { at: now, minutes: 5 });
        }

        let stats = today_stats(std::slice::from_ref(&task), &[], now.date_naive());
        assert_eq!(stats.total_minutes, 15);
        assert_eq!(stats.estimate_minutes, 30);
    }

    #[test]
    fn test_today_stats_skips_prompt_tasks() {
        let task = prompt_task("p");
        let stats = today_stats(std::slice::from_ref(&task), &[], Local::now().date_naive());
        assert_eq!(stats, TodayStats::default());
    }

    #[test]
    fn test_project_stats_lifetime_totals() {
        let project_id = Uuid::new_v4();

        let mut a = timed_task("a");
        a.project_id = Some(project_id);
        {
            let timing = a.timing_mut().unwrap();
            timing.estimate_minutes = 15;
            timing.actual_minutes = 20;
        }

        let mut b = timed_task("b");
        b.project_id = Some(project_id);

        let mut prompt = prompt_task("p");
        prompt.project_id = Some(project_id);

        let other = timed_task("other");

        let tasks = vec![a, b, prompt, other];
        let stats = project_stats(&tasks, project_id);
        assert_eq!(stats.total_estimate, 20); // 15 + default 5
        assert_eq!(stats.total_actual, 20);
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(0), "0m");
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(60), "1h");
        assert_eq!(format_minutes(90), "1h 30m");
        assert_eq!(format_minutes(125), "2h 5m");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(600), "10:00");
    }
}
