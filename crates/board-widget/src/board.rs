use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use board_types::api::{BoardView, FormView};
use board_types::models::Comment;

use crate::render::{TimeLabel, render};

pub const SUBMIT_LABEL: &str = "Post";
pub const BUSY_LABEL: &str = "Posting...";
pub const SUBMIT_FAILED_ALERT: &str = "Could not post your comment. Please try again.";

/// The page: the only place board output goes.
///
/// `paint` is called while the board is locked so views arrive in order;
/// implementations must not block or call back into the board.
pub trait Surface: Send + Sync + 'static {
    fn paint(&self, view: &BoardView);
    fn alert(&self, message: &str);
}

/// Transient projection of store state plus local form state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    pub comments: Vec<Comment>,
    pub viewer_count: Option<usize>,
    pub form: FormView,
    pub submitting: bool,
    /// A comment snapshot has been applied at least once
    pub loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Full ordered comment snapshot; replaces the list
    Snapshot(Vec<Comment>),
    ViewerCount(usize),
    SubmitStarted { author: String, body: String },
    SubmitSucceeded,
    SubmitFailed,
}

impl BoardState {
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::Snapshot(comments) => {
                self.comments = comments;
                self.loaded = true;
            }
            Action::ViewerCount(n) => self.viewer_count = Some(n),
            Action::SubmitStarted { author, body } => {
                self.form = FormView { author, body };
                self.submitting = true;
            }
            Action::SubmitSucceeded => {
                self.form.body.clear();
                self.submitting = false;
            }
            Action::SubmitFailed => self.submitting = false,
        }
    }
}

/// Shared board: state, surface and time formatting.
#[derive(Clone)]
pub struct Board {
    inner: Arc<BoardInner>,
}

struct BoardInner {
    state: Mutex<BoardState>,
    surface: Arc<dyn Surface>,
    time: TimeLabel,
    hold_until_loaded: bool,
}

impl Board {
    pub fn new(surface: Arc<dyn Surface>, time: TimeLabel) -> Self {
        Self::build(surface, time, false)
    }

    /// A board that keeps the page as it is until the first comment snapshot
    /// arrives, so a server-rendered page is never painted over with an
    /// empty list.
    pub fn after_first_snapshot(surface: Arc<dyn Surface>, time: TimeLabel) -> Self {
        Self::build(surface, time, true)
    }

    fn build(surface: Arc<dyn Surface>, time: TimeLabel, hold_until_loaded: bool) -> Self {
        Self {
            inner: Arc::new(BoardInner {
                state: Mutex::new(BoardState::default()),
                surface,
                time,
                hold_until_loaded,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply an action and repaint the whole board.
    pub fn dispatch(&self, action: Action) {
        let mut state = self.lock();
        state.apply(action);
        self.paint(&state);
    }

    /// Start a submission unless one is already in flight.
    pub(crate) fn begin_submit(&self, author: &str, body: &str) -> bool {
        let mut state = self.lock();
        if state.submitting {
            return false;
        }
        state.apply(Action::SubmitStarted {
            author: author.to_string(),
            body: body.to_string(),
        });
        self.paint(&state);
        true
    }

    fn paint(&self, state: &BoardState) {
        if self.inner.hold_until_loaded && !state.loaded {
            return;
        }
        self.inner.surface.paint(&render(state, &self.inner.time));
    }

    pub fn alert(&self, message: &str) {
        self.inner.surface.alert(message);
    }

    pub fn state(&self) -> BoardState {
        self.lock().clone()
    }
}

/// A running live subscription. Dropping it cancels the task and with it the
/// underlying gateway stream.
#[must_use = "dropping a subscription cancels it"]
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            task: tokio::spawn(future),
        }
    }

    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
