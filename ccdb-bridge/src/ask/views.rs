//! Interactive-question UI: component rows and custom-id routing.
//!
//! 2–4 options render as buttons; more than 4 options or any multi-select
//! question renders as a select menu. An "✏️ Other" button that opens a
//! free-text modal is always present.
//!
//! Button clicks only carry their custom id, so the live option labels are
//! kept in an in-process registry keyed by thread id. After a restart the
//! registry is empty and clicks resolve to a graceful "session has ended"
//! reply instead of a dead interaction.

use std::collections::HashMap;

use parking_lot::Mutex;

use ccdb_runner::AskQuestion;

use crate::gateway::{Button, ButtonKind, ComponentRow, SelectOption};

const PREFIX: &str = "ccdb:ask:";

/// Parsed ask-component custom id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskComponent {
    /// A numbered option button
    Option { thread_id: i64, index: usize },
    /// The select menu (values carry the labels directly)
    Select { thread_id: i64 },
    /// The "Other" button opening the free-text modal
    Other { thread_id: i64 },
    /// The free-text modal submit
    Modal { thread_id: i64 },
}

impl AskComponent {
    pub fn option_id(thread_id: i64, index: usize) -> String {
        format!("{PREFIX}{thread_id}:opt:{index}")
    }

    pub fn select_id(thread_id: i64) -> String {
        format!("{PREFIX}{thread_id}:select")
    }

    pub fn other_id(thread_id: i64) -> String {
        format!("{PREFIX}{thread_id}:other")
    }

    pub fn modal_id(thread_id: i64) -> String {
        format!("{PREFIX}{thread_id}:modal")
    }

    /// Parse any ask custom id.
    pub fn parse(custom_id: &str) -> Option<Self> {
        let rest = custom_id.strip_prefix(PREFIX)?;
        let (thread_part, kind) = rest.split_once(':')?;
        let thread_id: i64 = thread_part.parse().ok()?;
        match kind {
            "select" => Some(Self::Select { thread_id }),
            "other" => Some(Self::Other { thread_id }),
            "modal" => Some(Self::Modal { thread_id }),
            _ => {
                let index = kind.strip_prefix("opt:")?.parse().ok()?;
                Some(Self::Option { thread_id, index })
            },
        }
    }
}

/// Option labels of the question currently shown in each thread.
#[derive(Default)]
pub struct AskViewRegistry {
    views: Mutex<HashMap<i64, Vec<String>>>,
}

impl AskViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, thread_id: i64, labels: Vec<String>) {
        self.views.lock().insert(thread_id, labels);
    }

    pub fn remove(&self, thread_id: i64) {
        self.views.lock().remove(&thread_id);
    }

    /// Resolve a button index back to its option label.
    pub fn label_for(&self, thread_id: i64, index: usize) -> Option<String> {
        self.views.lock().get(&thread_id)?.get(index).cloned()
    }
}

/// Build the component rows for one question.
pub fn ask_components(thread_id: i64, question: &AskQuestion) -> Vec<ComponentRow> {
    let mut rows = Vec::new();
    let options = &question.options;
    let use_select = question.multi_select || options.len() > 4;

    if use_select && !options.is_empty() {
        let max_values = if question.multi_select {
            options.len().min(25)
        } else {
            1
        };
        rows.push(ComponentRow::Select {
            custom_id: AskComponent::select_id(thread_id),
            placeholder: if question.header.is_empty() {
                "Choose an option...".to_string()
            } else {
                question.header.clone()
            },
            min_values: 1,
            max_values: max_values as u8,
            options: options
                .iter()
                .take(25)
                .map(|opt| SelectOption {
                    label: clamp(&opt.label, 100),
                    value: clamp(&opt.label, 100),
                    description: if opt.description.is_empty() {
                        None
                    } else {
                        Some(clamp(&opt.description, 100))
                    },
                })
                .collect(),
        });
    } else if !options.is_empty() {
        rows.push(ComponentRow::Buttons(
            options
                .iter()
                .take(4)
                .enumerate()
                .map(|(index, opt)| Button {
                    custom_id: AskComponent::option_id(thread_id, index),
                    label: clamp(&opt.label, 80),
                    style: ButtonKind::Primary,
                    disabled: false,
                })
                .collect(),
        ));
    }

    // Free-text escape hatch, always available on its own row.
    rows.push(ComponentRow::Buttons(vec![Button {
        custom_id: AskComponent::other_id(thread_id),
        label: "✏️ Other".into(),
        style: ButtonKind::Secondary,
        disabled: false,
    }]));

    rows
}

fn clamp(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
