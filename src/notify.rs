//! User notification channel
//!
//! Every mutation reports its outcome here as a short message a UI can show
//! as a toast. Delivery is fire-and-forget.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);

    fn success(&self, message: &str) {
        self.notify(NoticeLevel::Success, message);
    }

    fn error(&self, message: &str) {
        self.notify(NoticeLevel::Error, message);
    }
}

/// Writes notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Success => log::info!("✓ {}", message),
            NoticeLevel::Error => log::warn!("✗ {}", message),
        }
    }
}

/// Fans notices out to subscribers and keeps the most recent ones.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notice>,
    recent: Mutex<VecDeque<Notice>>,
    capacity: usize,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }

    /// Newest last
    pub fn recent(&self) -> Vec<Notice> {
        match self.recent.lock() {
            Ok(recent) => recent.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        LogNotifier.notify(level, message);

        let notice = Notice {
            level,
            message: message.to_string(),
            at: Utc::now(),
        };

        {
            let mut recent = match self.recent.lock() {
                Ok(recent) => recent,
                Err(poisoned) => poisoned.into_inner(),
            };
            if recent.len() == self.capacity {
                recent.pop_front();
            }
            recent.push_back(notice.clone());
        }

        // No subscribers is fine
        let _ = self.sender.send(notice);
    }
}
