use chrono::NaiveDateTime;
use ratatui::widgets::TableState;
use tracing::debug;

use crate::commands::{cmd_add, cmd_complete, cmd_edit, cmd_remove, cmd_spawn, sorted_by_due};
use crate::error::Result;
use crate::materialize::{Completion, Spawn};
use crate::models::Task;
use crate::parser::{self, ParsedDate};
use crate::storage::TaskStore;

#[derive(Debug, PartialEq)]
pub enum InputMode {
    Normal,
    Editing,
    Adding,
}

#[derive(Debug, PartialEq)]
pub enum ViewMode {
    Tasks,
    Recurring,
}

#[derive(Debug, PartialEq)]
pub enum InputField {
    None,
    Title,
    Due,
}

/// State for the two-step "Add Task" wizard.
#[derive(Default)]
pub struct AddState {
    pub title: String,
    pub step: usize, // 0: Title, 1: Due
}

pub struct App {
    store: TaskStore,
    pub now: NaiveDateTime,
    pub tasks: Vec<Task>,
    pub state: TableState,
    pub view_mode: ViewMode,
    pub input_mode: InputMode,
    pub input_field: InputField,
    pub input_buffer: String,
    pub target_id: Option<u64>,
    pub add_state: AddState,
    pub show_completed: bool,
    /// Live parse of the due-date buffer.
    pub preview: Option<ParsedDate>,
    /// Last error or confirmation, shown in the help bar.
    pub status: Option<String>,
}

impl App {
    /// Creates a new App instance and loads initial data.
    pub fn new(store: TaskStore, now: NaiveDateTime) -> App {
        let mut app = App {
            store,
            now,
            tasks: Vec::new(),
            state: TableState::default(),
            view_mode: ViewMode::Tasks,
            input_mode: InputMode::Normal,
            input_field: InputField::None,
            input_buffer: String::new(),
            target_id: None,
            add_state: AddState::default(),
            show_completed: false,
            preview: None,
            status: None,
        };
        app.reload();
        app
    }

    /// Selects the next item in the current list.
    pub fn next(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < self.tasks.len() => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    /// Selects the previous item in the current list.
    pub fn previous(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => self.tasks.len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.state.selected().and_then(|i| self.tasks.get(i))
    }

    fn selected_id(&self) -> Option<u64> {
        self.selected_task().map(|t| t.id)
    }

    /// Records the outcome of a command in the status line.
    fn report<T>(&mut self, result: Result<T>, describe: impl FnOnce(T) -> String) {
        self.status = Some(match result {
            Ok(value) => describe(value),
            Err(e) => e.to_string(),
        });
        self.reload();
    }

    /// Marks the currently selected task as complete.
    pub fn complete_selected(&mut self) {
        let Some(id) = self.selected_id() else { return };
        let result = cmd_complete(&self.store, id, self.now, true);
        self.report(result, |outcome| match outcome {
            Completion::RolledForward { .. } => format!("Task {} moved to its next occurrence", id),
            Completion::AlreadyCompleted => format!("Task {} was already complete", id),
            _ => format!("Task {} completed", id),
        });
    }

    /// Generates the next instance of the selected recurring task.
    pub fn spawn_selected(&mut self) {
        let Some(id) = self.selected_id() else { return };
        let result = cmd_spawn(&self.store, id, self.now, true);
        self.report(result, |outcome| match outcome {
            Spawn::Created { id, .. } => format!("Created task {}", id),
            Spawn::AlreadyExists { id } => format!("Task {} already covers the next occurrence", id),
            Spawn::Exhausted => "Recurrence has ended".to_string(),
        });
    }

    /// Deletes the currently selected task.
    pub fn delete_selected(&mut self) {
        let Some(id) = self.selected_id() else { return };
        let result = cmd_remove(&self.store, id, true);
        self.report(result, |_| format!("Task {} removed", id));
    }

    /// Drops the recurrence rule of the selected task.
    pub fn stop_recurring_selected(&mut self) {
        let Some(id) = self.selected_id() else { return };
        let result = cmd_edit(&self.store, id, None, None, None, None, None, true, self.now, true);
        self.report(result, |_| format!("Task {} no longer repeats", id));
    }

    /// Reloads tasks from storage and refreshes the display list.
    pub fn reload(&mut self) {
        let mut tasks = match self.store.load_tasks() {
            Ok(tasks) => tasks,
            Err(e) => {
                self.status = Some(e.to_string());
                Vec::new()
            }
        };
        if !self.show_completed {
            tasks.retain(|t| !t.completed);
        }
        if self.view_mode == ViewMode::Recurring {
            tasks.retain(Task::is_recurring);
        }
        self.tasks = sorted_by_due(tasks);

        if self.tasks.is_empty() {
            self.state.select(None);
        } else if let Some(i) = self.state.selected() {
            if i >= self.tasks.len() {
                self.state.select(Some(self.tasks.len() - 1));
            }
        } else {
            self.state.select(Some(0));
        }
    }

    /// Toggles the visibility of completed tasks.
    pub fn toggle_completed(&mut self) {
        self.show_completed = !self.show_completed;
        self.reload();
    }

    /// Toggles between all tasks and recurring templates.
    pub fn toggle_view(&mut self) {
        self.view_mode = match self.view_mode {
            ViewMode::Tasks => ViewMode::Recurring,
            ViewMode::Recurring => ViewMode::Tasks,
        };
        self.reload();
    }

    /// Initiates the "Add Task" wizard.
    pub fn start_add(&mut self) {
        self.input_mode = InputMode::Adding;
        self.input_field = InputField::Title;
        self.add_state = AddState::default();
        self.input_buffer.clear();
        self.preview = None;
    }

    /// Initiates editing of a specific field for the selected task.
    pub fn start_edit(&mut self, field: InputField) {
        let Some((id, title)) = self.selected_task().map(|t| (t.id, t.title.clone())) else {
            return;
        };
        self.target_id = Some(id);
        self.input_buffer = match field {
            InputField::Title => title,
            _ => String::new(),
        };
        self.input_mode = InputMode::Editing;
        self.input_field = field;
        self.preview = None;
    }

    /// True while the buffer holds a date phrase.
    pub fn editing_date(&self) -> bool {
        self.input_field == InputField::Due
    }

    pub fn push_char(&mut self, c: char) {
        self.input_buffer.push(c);
        self.update_preview();
    }

    pub fn pop_char(&mut self) {
        self.input_buffer.pop();
        self.update_preview();
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input_field = InputField::None;
        self.input_buffer.clear();
        self.preview = None;
    }

    /// Re-parses the buffer so the popup shows what the phrase means.
    fn update_preview(&mut self) {
        self.preview = if self.editing_date() && !self.input_buffer.trim().is_empty() {
            Some(parser::parse(&self.input_buffer, self.now))
        } else {
            None
        };
    }

    /// Checks the date buffer before it is applied.
    ///
    /// A phrase the parser could not understand leaves the task's date as it
    /// was and keeps the popup open with the error.
    fn accept_date(&mut self) -> bool {
        self.update_preview();
        match &self.preview {
            Some(parsed) if !parsed.is_confident() => {
                let reason = parsed.error.clone().unwrap_or_else(|| "Unrecognized date".to_string());
                debug!(input = %self.input_buffer, %reason, "date not applied");
                self.status = Some(reason);
                false
            }
            _ => true,
        }
    }

    /// Handles text input based on the current mode.
    pub fn handle_input(&mut self) {
        match self.input_mode {
            InputMode::Adding => self.handle_adding_input(),
            InputMode::Editing => self.handle_editing_input(),
            InputMode::Normal => {}
        }
    }

    /// Handles input for the "Add Task" wizard.
    fn handle_adding_input(&mut self) {
        match self.add_state.step {
            0 => {
                if !self.input_buffer.trim().is_empty() {
                    self.add_state.title = self.input_buffer.trim().to_string();
                    self.add_state.step += 1;
                    self.input_field = InputField::Due;
                    self.input_buffer.clear();
                }
            }
            1 => {
                if !self.accept_date() {
                    return;
                }
                let due = Some(self.input_buffer.trim().to_string()).filter(|s| !s.is_empty());
                let title = std::mem::take(&mut self.add_state.title);
                let result = cmd_add(&self.store, title, due, None, None, None, self.now, true);
                self.cancel_input();
                self.report(result, |id| format!("Task {} added", id));
            }
            _ => {}
        }
    }

    /// Handles input for the "Edit Task" mode.
    fn handle_editing_input(&mut self) {
        let Some(id) = self.target_id else {
            self.cancel_input();
            return;
        };
        let result = match self.input_field {
            InputField::Title => {
                let title = self.input_buffer.trim().to_string();
                if title.is_empty() {
                    return;
                }
                cmd_edit(&self.store, id, Some(title), None, None, None, None, false, self.now, true)
            }
            InputField::Due => {
                if self.input_buffer.trim().is_empty() || !self.accept_date() {
                    return;
                }
                let due = Some(self.input_buffer.trim().to_string());
                cmd_edit(&self.store, id, None, due, None, None, None, false, self.now, true)
            }
            InputField::None => Ok(()),
        };
        if result.is_err() {
            // Leave the popup up so the phrase can be corrected.
            self.report(result, |_| String::new());
            return;
        }
        self.cancel_input();
        self.report(result, |_| format!("Task {} updated", id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn now() -> NaiveDateTime {
        // Tuesday
        NaiveDate::from_ymd_opt(2025, 3, 11).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn app(dir: &TempDir) -> App {
        App::new(TaskStore::new(dir.path().join("tasks.json")), now())
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            app.push_char(c);
        }
    }

    fn add(app: &mut App, title: &str, due: &str) {
        app.start_add();
        type_str(app, title);
        app.handle_input();
        type_str(app, due);
        app.handle_input();
    }

    #[test]
    fn test_add_wizard_creates_task() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        add(&mut app, "Water plants", "friday");

        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.tasks.len(), 1);
        assert_eq!(app.tasks[0].title, "Water plants");
        assert_eq!(app.tasks[0].due_day(), NaiveDate::from_ymd_opt(2025, 3, 14));
    }

    #[test]
    fn test_preview_follows_typing() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        app.start_add();
        type_str(&mut app, "Call mom");
        assert!(app.preview.is_none());
        app.handle_input();

        type_str(&mut app, "tomorrow");
        let preview = app.preview.clone().unwrap();
        assert_eq!(preview.display_text.as_deref(), Some("Tomorrow"));

        for _ in 0.."tomorrow".len() {
            app.pop_char();
        }
        assert!(app.preview.is_none());
    }

    #[test]
    fn test_unparseable_due_keeps_previous_date() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        add(&mut app, "Dentist", "march 20");
        let before = app.tasks[0].due_date;

        app.start_edit(InputField::Due);
        type_str(&mut app, "someday soon");
        app.handle_input();

        assert_eq!(app.input_mode, InputMode::Editing);
        assert!(app.status.is_some());
        app.cancel_input();
        app.reload();
        assert_eq!(app.tasks[0].due_date, before);
    }

    #[test]
    fn test_edit_due_to_recurring() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        add(&mut app, "Standup", "tomorrow");

        app.start_edit(InputField::Due);
        type_str(&mut app, "every monday");
        app.handle_input();

        assert_eq!(app.input_mode, InputMode::Normal);
        let task = &app.tasks[0];
        assert!(task.is_recurring());
        assert_eq!(task.due_day(), NaiveDate::from_ymd_opt(2025, 3, 17));
    }

    #[test]
    fn test_complete_recurring_rolls_forward() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        add(&mut app, "Journal", "every day");

        app.complete_selected();
        assert_eq!(app.tasks.len(), 1);
        assert!(!app.tasks[0].completed);
        assert_eq!(app.tasks[0].due_day(), NaiveDate::from_ymd_opt(2025, 3, 12));
    }

    #[test]
    fn test_recurring_view_filters() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        add(&mut app, "Once", "friday");
        add(&mut app, "Weekly", "every friday");
        assert_eq!(app.tasks.len(), 2);

        app.toggle_view();
        assert_eq!(app.tasks.len(), 1);
        assert_eq!(app.tasks[0].title, "Weekly");

        app.stop_recurring_selected();
        assert!(app.tasks.is_empty());
    }

    #[test]
    fn test_edit_title_prefills_buffer() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        add(&mut app, "Draft", "friday");

        app.start_edit(InputField::Title);
        assert_eq!(app.input_buffer, "Draft");
        assert_eq!(app.target_id, Some(app.tasks[0].id));
        type_str(&mut app, " v2");
        app.handle_input();
        assert_eq!(app.tasks[0].title, "Draft v2");
    }

    #[test]
    fn test_selection_wraps() {
        let dir = TempDir::new().unwrap();
        let mut app = app(&dir);
        add(&mut app, "A", "today");
        add(&mut app, "B", "tomorrow");
        assert_eq!(app.state.selected(), Some(0));
        app.previous();
        assert_eq!(app.state.selected(), Some(1));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
    }
}
