use std::sync::Mutex;
use std::time::Duration;

use chrono::FixedOffset;
use tokio::sync::Notify;

use board_types::api::BoardView;

use crate::board::Surface;
use crate::render::{ClockStyle, TimeLabel};

/// Surface that remembers every paint and alert.
#[derive(Default)]
pub(crate) struct RecordingSurface {
    views: Mutex<Vec<BoardView>>,
    alerts: Mutex<Vec<String>>,
    changed: Notify,
}

impl RecordingSurface {
    pub(crate) fn views(&self) -> Vec<BoardView> {
        self.views.lock().unwrap().clone()
    }

    pub(crate) fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }

    /// Wait for a painted view matching `pred`, newest first.
    pub(crate) async fn wait_for(&self, pred: impl Fn(&BoardView) -> bool) -> BoardView {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let changed = self.changed.notified();
            if let Some(view) = self.views().into_iter().rev().find(|v| pred(v)) {
                return view;
            }
            tokio::time::timeout_at(deadline, changed)
                .await
                .expect("timed out waiting for a matching view");
        }
    }
}

impl Surface for RecordingSurface {
    fn paint(&self, view: &BoardView) {
        self.views.lock().unwrap().push(view.clone());
        self.changed.notify_waiters();
    }

    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
        self.changed.notify_waiters();
    }
}

pub(crate) fn utc_time() -> TimeLabel {
    TimeLabel::fixed(FixedOffset::east_opt(0).unwrap(), ClockStyle::TwentyFourHour)
}
