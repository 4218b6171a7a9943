//! Single-slot transient notification ("toast").

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPhase {
    Entering,
    Visible,
    Exiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifierTimings {
    pub entry_delay: Duration,
    /// Measured from creation; the exit starts when it elapses.
    pub display_duration: Duration,
    pub exit_delay: Duration,
}

impl Default for NotifierTimings {
    fn default() -> Self {
        Self {
            entry_delay: Duration::from_millis(100),
            display_duration: Duration::from_millis(3000),
            exit_delay: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: Instant,
}

impl Notification {
    /// `None` once the notification has left the visual tree.
    pub fn phase_at(&self, now: Instant, timings: &NotifierTimings) -> Option<NotificationPhase> {
        let elapsed = now.saturating_duration_since(self.created_at);
        if elapsed < timings.entry_delay {
            Some(NotificationPhase::Entering)
        } else if elapsed < timings.display_duration {
            Some(NotificationPhase::Visible)
        } else if elapsed < timings.display_duration + timings.exit_delay {
            Some(NotificationPhase::Exiting)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct Notifier {
    current: Option<Notification>,
    next_id: u64,
    timings: NotifierTimings,
}

impl Notifier {
    pub fn new(timings: NotifierTimings) -> Self {
        Self {
            current: None,
            next_id: 0,
            timings,
        }
    }

    pub fn timings(&self) -> &NotifierTimings {
        &self.timings
    }

    /// Removes whatever is displayed and shows `message` instead.
    pub fn notify(&mut self, message: impl Into<String>, kind: NotificationKind, now: Instant) -> u64 {
        self.next_id += 1;
        let notification = Notification {
            id: self.next_id,
            message: message.into(),
            kind,
            created_at: now,
        };
        tracing::debug!(
            id = notification.id,
            kind = ?kind,
            message = %notification.message,
            "notification shown"
        );
        self.current = Some(notification);
        self.next_id
    }

    /// Drops the notification once its exit delay has run out.
    pub fn prune(&mut self, now: Instant) {
        let expired = self
            .current
            .as_ref()
            .is_some_and(|n| n.phase_at(now, &self.timings).is_none());
        if expired {
            self.current = None;
        }
    }

    pub fn current(&self, now: Instant) -> Option<(&Notification, NotificationPhase)> {
        let notification = self.current.as_ref()?;
        let phase = notification.phase_at(now, &self.timings)?;
        Some((notification, phase))
    }
}
