//! Task list → email rendering.

use crate::database::TaskListItem;

pub const TASK_LIST_SUBJECT: &str = "Your task list";
pub const UNSUBSCRIBED_SUBJECT: &str = "You have been unsubscribed from reminders";
pub const UNSUBSCRIBED_BODY: &str = "Your task list is empty, so reminders are paused. \
    Add new tasks and subscribe again to resume them.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub subject: String,
    pub body: String,
    /// Set when the list was empty: the recipient must be unsubscribed.
    pub unsubscribe: bool,
}

/// Numbered list, one task per line: `1. buy milk`.
pub fn render_task_list(items: &[TaskListItem]) -> Reminder {
    if items.is_empty() {
        return Reminder {
            subject: UNSUBSCRIBED_SUBJECT.to_string(),
            body: UNSUBSCRIBED_BODY.to_string(),
            unsubscribe: true,
        };
    }

    let body = items
        .iter()
        .map(|item| format!("{}. {}", item.position, item.value))
        .collect::<Vec<_>>()
        .join("\n");

    Reminder {
        subject: TASK_LIST_SUBJECT.to_string(),
        body,
        unsubscribe: false,
    }
}
