//! Live comment board and viewer counter, wired to a [`StoreGateway`].
//!
//! Data flows one way: gateway snapshots and form submissions become
//! [`board::Action`]s, [`board::BoardState`] folds them, [`render::render`]
//! turns the state into a [`BoardView`] and a [`board::Surface`] shows it.
//!
//! [`StoreGateway`]: board_gateway::StoreGateway
//! [`BoardView`]: board_types::api::BoardView

pub mod board;
pub mod boot;
pub mod error;
pub mod escape;
pub mod feed;
pub mod presence;
pub mod render;

#[cfg(test)]
pub(crate) mod test_support;

pub use board::{Action, Board, BoardState, Subscription, Surface};
pub use boot::{HttpConfigSource, StaticConfig, Widget, WidgetOptions, boot, start};
pub use error::WidgetError;
pub use escape::escape_html;
pub use feed::{CommentFeed, SubmitOutcome};
pub use presence::{PresenceCounter, PresenceHandle};
pub use render::{ClockStyle, TimeLabel, render};
