use crate::domain::{Column, TaskKind, TaskSize, Timing};
use crate::store::{Store, TaskPatch};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum ImportError {
    #[error("CSV must have at least a header and one data row")]
    MissingRows,
    #[error("CSV header must be: Title,Focus,Size,Column (optional: Type)")]
    MissingColumns,
}

/// Outcome of a CSV import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        let mut message = format!(
            "Imported {} task{}",
            self.imported,
            if self.imported == 1 { "" } else { "s" }
        );
        if self.skipped > 0 {
            message.push_str(&format!(", {} skipped", self.skipped));
        }
        message
    }
}

/// Split one CSV line on commas, honoring double-quoted fields (a quote
/// toggles literal-comma mode; there is no escaped-quote syntax). Fields
/// come back trimmed, quotes stripped.
fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// First run of digits in the text, e.g. "15m" or "about 15" parse as 15
fn first_number(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Import tasks from CSV text into the board. The header row must name
/// Title, Focus, Size and Column (any order, case-insensitive); a Type
/// column of "prompt" marks prompt tasks. Rows with a blank title are
/// skipped and counted. All created tasks link to `project_id`.
pub fn import_tasks(
    store: &mut Store,
    text: &str,
    project_id: Option<Uuid>,
) -> Result<ImportReport, ImportError> {
    let lines: Vec<&str> = text
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(ImportError::MissingRows);
    }

    let header: Vec<String> = parse_csv_line(lines[0])
        .iter()
        .map(|h| h.to_lowercase())
        .collect();
    let position = |name: &str| header.iter().position(|h| h == name);

    let (Some(title_idx), Some(focus_idx), Some(size_idx), Some(column_idx)) = (
        position("title"),
        position("focus"),
        position("size"),
        position("column"),
    ) else {
        return Err(ImportError::MissingColumns);
    };
    let type_idx = position("type");

    let mut imported = 0;
    let mut skipped = 0;

    for line in &lines[1..] {
        let values = parse_csv_line(line);
        let field = |idx: usize| values.get(idx).map(|v| v.trim()).unwrap_or("");

        let title = field(title_idx);
        if title.is_empty() {
            skipped += 1;
            continue;
        }

        let focus = field(focus_idx);
        let size_text = field(size_idx).to_lowercase();
        let column_text = field(column_idx).to_lowercase();
        let type_text = type_idx.map(|idx| field(idx).to_lowercase()).unwrap_or_default();

        let is_prompt = type_text == "prompt";

        let kind = if is_prompt {
            TaskKind::Prompt { text: String::new() }
        } else {
            let size = first_number(&size_text)
                .and_then(TaskSize::from_minutes)
                .unwrap_or_default();
            TaskKind::Timed(Timing::with_size(size))
        };

        let column = Column::from_import_word(&column_text).unwrap_or(Column::Backlog);

        let task = match store.create_task(title, project_id, column, kind) {
            Ok(task) => task,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };

        if !focus.is_empty() {
            // The patch also folds an unseen focus into the global set
            store.update_task(
                task.id,
                TaskPatch {
                    labels: Some(vec![focus.to_string()]),
                    ..TaskPatch::default()
                },
            );
        }

        imported += 1;
    }

    Ok(ImportReport { imported, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Board;
    use pretty_assertions::assert_eq;

    fn store() -> Store {
        Store::new(Board::new(Vec::new()))
    }

    #[test]
    fn test_rejects_missing_rows_and_columns() {
        let mut store = store();
        assert_eq!(
            import_tasks(&mut store, "Title,Focus,Size,Column", None),
            Err(ImportError::MissingRows)
        );
        assert_eq!(
            import_tasks(&mut store, "Title,Size,Column\nWrite docs,5,Next", None),
            Err(ImportError::MissingColumns)
        );
        assert!(store.board().tasks.is_empty());
    }

    #[test]
    fn test_imports_basic_row() {
        let mut store = store();
        let report = import_tasks(
            &mut store,
            "Title,Focus,Size,Column\nWrite docs,CRM,15m,Next",
            None,
        )
        .unwrap();

        assert_eq!(report, ImportReport { imported: 1, skipped: 0 });
        assert_eq!(report.summary(), "Imported 1 task");

        let task = &store.board().tasks[0];
        assert_eq!(task.title, "Write docs");
        assert_eq!(task.labels, vec!["CRM".to_string()]);
        assert_eq!(task.column, Column::Ready);
        assert!(!task.is_prompt());
        let timing = task.timing().unwrap();
        assert_eq!(timing.size, TaskSize::Fifteen);
        assert_eq!(timing.estimate_minutes, 15);

        // The focus joined the global set
        assert_eq!(store.board().labels, vec!["CRM".to_string()]);
    }

    #[test]
    fn test_header_order_is_free() {
        let mut store = store();
        import_tasks(
            &mut store,
            "Column,Size,Focus,Title\nNow,30,Music,Practice scales",
            None,
        )
        .unwrap();

        let task = &store.board().tasks[0];
        assert_eq!(task.title, "Practice scales");
        assert_eq!(task.column, Column::Doing);
        assert_eq!(task.timing().unwrap().size, TaskSize::Thirty);
    }

    #[test]
    fn test_blank_title_rows_are_skipped() {
        let mut store = store();
        let report = import_tasks(
            &mut store,
            "Title,Focus,Size,Column\n  ,CRM,5,Next\nReal task,,5,Later",
            None,
        )
        .unwrap();

        assert_eq!(report, ImportReport { imported: 1, skipped: 1 });
        assert_eq!(report.summary(), "Imported 1 task, 1 skipped");
        assert_eq!(store.board().tasks.len(), 1);
    }

    #[test]
    fn test_quoted_fields_keep_commas() {
        let mut store = store();
        import_tasks(
            &mut store,
            "Title,Focus,Size,Column\n\"Plan, then build\",CRM,5,Later",
            None,
        )
        .unwrap();
        assert_eq!(store.board().tasks[0].title, "Plan, then build");
    }

    #[test]
    fn test_prompt_type_suppresses_size() {
        let mut store = store();
        import_tasks(
            &mut store,
            "Title,Focus,Size,Column,Type\nDraft outreach email,CRM,15,Next,Prompt",
            None,
        )
        .unwrap();

        let task = &store.board().tasks[0];
        assert!(task.is_prompt());
        assert!(task.timing().is_none());
    }

    #[test]
    fn test_unknown_size_and_column_fall_back() {
        let mut store = store();
        import_tasks(
            &mut store,
            "Title,Focus,Size,Column\nOdd row,,45m,someday",
            None,
        )
        .unwrap();

        let task = &store.board().tasks[0];
        assert_eq!(task.column, Column::Backlog);
        assert_eq!(task.timing().unwrap().size, TaskSize::Five);
    }

    #[test]
    fn test_imported_tasks_link_to_project() {
        let mut store = store();
        let project = store.create_project("Acme", None, "", None).unwrap();
        import_tasks(
            &mut store,
            "Title,Focus,Size,Column\nWrite docs,,5,Later",
            Some(project.id),
        )
        .unwrap();
        assert_eq!(store.board().tasks[0].project_id, Some(project.id));
    }

    #[test]
    fn test_report_summary_plural() {
        let report = ImportReport { imported: 3, skipped: 2 };
        assert_eq!(report.summary(), "Imported 3 tasks, 2 skipped");
        let report = ImportReport { imported: 0, skipped: 0 };
        assert_eq!(report.summary(), "Imported 0 tasks");
    }
}
