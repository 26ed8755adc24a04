use tracing::{debug, error, info};

use board_gateway::{GatewayError, StoreGateway};
use board_types::models::{Comment, DocId, Direction, NewComment, comment_fields};

use crate::board::{Action, Board, SUBMIT_FAILED_ALERT, Subscription};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Author or body was empty; nothing happened
    Ignored,
    /// Another submission from this board is still in flight
    Busy,
    Posted(DocId),
    Failed(GatewayError),
}

/// Keeps the board's comment list in step with the collection and appends
/// new comments.
#[derive(Clone)]
pub struct CommentFeed<G> {
    gateway: G,
    board: Board,
    collection: String,
}

impl<G: StoreGateway> CommentFeed<G> {
    pub fn new(gateway: G, board: Board, collection: impl Into<String>) -> Self {
        Self {
            gateway,
            board,
            collection: collection.into(),
        }
    }

    /// Follow the collection newest-first. Every snapshot replaces the whole
    /// rendered list.
    pub fn subscribe(&self) -> Subscription {
        let mut snapshots = self.gateway.open_ordered_collection_query(
            &self.collection,
            comment_fields::CREATED_AT,
            Direction::Descending,
        );
        let board = self.board.clone();
        let collection = self.collection.clone();
        info!("Subscribed to '{}'", collection);

        Subscription::spawn(async move {
            while let Some(snapshot) = snapshots.recv().await {
                debug!("'{}' snapshot with {} comments", collection, snapshot.len());
                let comments = snapshot.documents.iter().map(Comment::from_document).collect();
                board.dispatch(Action::Snapshot(comments));
            }
            debug!("'{}' live query ended", collection);
        })
    }

    /// Post a comment. Empty fields are ignored without touching the form; on
    /// failure the user is alerted and the form is left as it was.
    pub async fn submit(&self, author: &str, body: &str) -> SubmitOutcome {
        if author.is_empty() || body.is_empty() {
            return SubmitOutcome::Ignored;
        }
        if !self.board.begin_submit(author, body) {
            return SubmitOutcome::Busy;
        }

        let comment = NewComment {
            author: author.to_string(),
            body: body.to_string(),
        };
        match self
            .gateway
            .append_document(&self.collection, comment.into_fields())
            .await
        {
            Ok(id) => {
                debug!("Posted comment {} to '{}'", id, self.collection);
                self.board.dispatch(Action::SubmitSucceeded);
                SubmitOutcome::Posted(id)
            }
            Err(e) => {
                error!("Failed to post comment to '{}': {}", self.collection, e);
                self.board.alert(SUBMIT_FAILED_ALERT);
                self.board.dispatch(Action::SubmitFailed);
                SubmitOutcome::Failed(e)
            }
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    use board_gateway::{MemoryStore, StoreOptions};
    use chrono::{TimeZone, Utc};

    use crate::test_support::{RecordingSurface, utc_time};

    fn store() -> MemoryStore {
        let tick = Arc::new(AtomicI64::new(0));
        MemoryStore::with_options(StoreOptions {
            clock: Arc::new(move || {
                let n = tick.fetch_add(1, Ordering::SeqCst);
                Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap() + chrono::Duration::minutes(n)
            }),
            journal: None,
        })
    }

    fn feed(store: &MemoryStore) -> (CommentFeed<board_gateway::MemoryGateway>, Arc<RecordingSurface>) {
        let surface = Arc::new(RecordingSurface::default());
        let board = Board::new(surface.clone(), utc_time());
        (CommentFeed::new(store.open_session(), board, "comments"), surface)
    }

    #[tokio::test]
    async fn empty_fields_do_nothing() {
        let store = store();
        let (feed, surface) = feed(&store);

        assert_eq!(feed.submit("", "hola").await, SubmitOutcome::Ignored);
        assert_eq!(feed.submit("ana", "").await, SubmitOutcome::Ignored);

        assert!(store.snapshot("comments", comment_fields::CREATED_AT, Direction::Descending).is_empty());
        assert!(surface.views().is_empty());
        assert_eq!(feed.board().state(), Default::default());
    }

    #[tokio::test]
    async fn success_clears_body_and_keeps_author() {
        let store = store();
        let (feed, surface) = feed(&store);

        let outcome = feed.submit("ana", "hola").await;
        assert!(matches!(outcome, SubmitOutcome::Posted(_)));

        let views = surface.views();
        assert!(views[0].submit.disabled);
        let last = views.last().unwrap();
        assert!(!last.submit.disabled);
        assert_eq!(last.form.author, "ana");
        assert_eq!(last.form.body, "");
        assert!(surface.alerts().is_empty());
    }

    #[tokio::test]
    async fn failure_alerts_and_reenables() {
        let store = store();
        store.set_read_only("comments", true);
        let (feed, surface) = feed(&store);

        let outcome = feed.submit("ana", "hola").await;
        assert!(matches!(outcome, SubmitOutcome::Failed(GatewayError::PermissionDenied(_))));

        assert_eq!(surface.alerts(), vec![SUBMIT_FAILED_ALERT.to_string()]);
        let last = surface.views().pop().unwrap();
        assert!(!last.submit.disabled);
        assert_eq!(last.form.body, "hola");
    }

    #[tokio::test]
    async fn snapshots_render_newest_first() {
        let store = store();
        let (feed, surface) = feed(&store);
        let _sub = feed.subscribe();

        let writer = store.open_session();
        for body in ["t1", "t2", "t3"] {
            writer
                .append_document(
                    "comments",
                    NewComment {
                        author: "luis".into(),
                        body: body.into(),
                    }
                    .into_fields(),
                )
                .await
                .unwrap();
        }

        let view = surface.wait_for(|v| v.list_html.contains("t1") && v.list_html.contains("t3")).await;
        let html = &view.list_html;
        let (p3, p2, p1) = (html.find("t3").unwrap(), html.find("t2").unwrap(), html.find("t1").unwrap());
        assert!(p3 < p2 && p2 < p1);
        assert!(html.contains("18:02"));
    }

    #[tokio::test]
    async fn cancelled_subscription_stops_painting() {
        let store = store();
        let (feed, surface) = feed(&store);
        let sub = feed.subscribe();
        surface.wait_for(|_| true).await;
        assert_eq!(store.open_query_count(), 1);
        sub.cancel();
        tokio::task::yield_now().await;

        let before = surface.views().len();
        feed.submit("ana", "after cancel").await;
        // give a live snapshot task every chance to run
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // the submit itself paints twice; no snapshot paint follows
        assert_eq!(surface.views().len(), before + 2);
        assert!(!surface.views().iter().any(|v| v.list_html.contains("after cancel")));
        assert_eq!(store.open_query_count(), 0);
    }
}
