//! Operator notifications.
//!
//! Managers queue these as side information for the human operator; the
//! shell decides how to render them.

use serde::Serialize;

/// How prominently a notification should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Warning,
    /// Multi-line block, e.g. a phase header with its focus text.
    Panel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: Option<String>,
    pub body: String,
}

impl Notification {
    pub fn info(body: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            title: None,
            body: body.into(),
        }
    }

    pub fn warning(body: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Warning,
            title: None,
            body: body.into(),
        }
    }

    pub fn panel(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Panel,
            title: Some(title.into()),
            body: body.into(),
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.kind, &self.title) {
            (NotificationKind::Panel, Some(title)) => {
                let rule = "=".repeat(title.chars().count().max(20));
                write!(f, "{rule}\n{title}\n{rule}\n{}", self.body)
            }
            (NotificationKind::Warning, _) => write!(f, "warning: {}", self.body),
            _ => write!(f, "{}", self.body),
        }
    }
}
