//! # Reminders Feature
//!
//! Periodic task-list emails to subscribed users, with auto-unsubscribe for
//! users whose list is empty.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod render;
pub mod scheduler;

pub use render::{render_task_list, Reminder};
pub use scheduler::{ReminderScheduler, TickReport};
