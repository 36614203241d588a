//! User-facing notifications raised by the admin lists.

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, warn};

use super::list::{
    error::SourceError,
    types::{MutationId, MutationKind},
};

const DEFAULT_HISTORY: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum ListEvent {
    FetchFailed {
        list: String,
        cause: SourceError,
    },
    MutationFailed {
        list: String,
        kind: MutationKind,
        target_id: String,
        cause: SourceError,
    },
    RollbackTargetMissing {
        list: String,
        mutation_id: MutationId,
        target_id: String,
    },
}

impl ListEvent {
    pub fn list(&self) -> &str {
        match self {
            Self::FetchFailed { list, .. }
            | Self::MutationFailed { list, .. }
            | Self::RollbackTargetMissing { list, .. } => list,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::FetchFailed { .. } => "Could not load rows",
            Self::MutationFailed { .. } => "Change not saved",
            Self::RollbackTargetMissing { .. } => "Row changed elsewhere",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::FetchFailed { list, cause } => format!("Loading {list} failed: {cause}"),
            Self::MutationFailed {
                list,
                kind,
                target_id,
                cause,
            } => format!("The {kind} of {list} row {target_id} was reverted: {cause}"),
            Self::RollbackTargetMissing {
                list, target_id, ..
            } => format!("{list} row {target_id} was removed before it could be restored"),
        }
    }
}

/// Receives list failures for display (toasts, error banners)
#[async_trait]
pub trait ListNotifier: Send + Sync {
    async fn notify(&self, event: ListEvent);
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub event: ListEvent,
    pub raised_at: DateTime<Utc>,
}

/// Logs every event and keeps a bounded feed of recent notifications for the UI
#[derive(Clone)]
pub struct NotificationService {
    recent: Arc<RwLock<VecDeque<Notification>>>,
    capacity: usize,
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl NotificationService {
    pub fn new(capacity: usize) -> Self {
        Self {
            recent: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    /// Most recent notifications, newest last
    pub async fn recent(&self) -> Vec<Notification> {
        self.recent.read().await.iter().cloned().collect()
    }

    pub async fn clear(&self) {
        self.recent.write().await.clear();
    }
}

#[async_trait]
impl ListNotifier for NotificationService {
    async fn notify(&self, event: ListEvent) {
        match &event {
            ListEvent::RollbackTargetMissing { .. } => {
                warn!(list = %event.list(), "{}", event.message())
            }
            _ => error!(list = %event.list(), "{}", event.message()),
        }

        let notification = Notification {
            title: event.title().to_string(),
            message: event.message(),
            event,
            raised_at: Utc::now(),
        };

        let mut recent = self.recent.write().await;
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(notification);
    }
}
