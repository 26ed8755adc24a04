use std::sync::Arc;

use tracing::{error, info};

use board_gateway::{ConfigSource, GatewayConnector, GatewayError, StoreGateway};
use board_types::api::InitConfig;

use crate::board::{Board, Subscription, Surface};
use crate::error::WidgetError;
use crate::feed::{CommentFeed, SubmitOutcome};
use crate::presence::{PresenceCounter, PresenceHandle};
use crate::render::TimeLabel;

/// Well-known path the host serves the init config on.
pub const INIT_CONFIG_PATH: &str = "/__/board/init.json";

/// Fetches the init config from the hosting origin.
#[derive(Debug, Clone)]
pub struct HttpConfigSource {
    client: reqwest::Client,
    url: String,
}

impl HttpConfigSource {
    pub fn new(origin: &str) -> Self {
        Self::with_client(reqwest::Client::new(), origin)
    }

    pub fn with_client(client: reqwest::Client, origin: &str) -> Self {
        Self {
            client,
            url: format!("{}{}", origin.trim_end_matches('/'), INIT_CONFIG_PATH),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ConfigSource for HttpConfigSource {
    async fn fetch_init_config(&self) -> Result<InitConfig, GatewayError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| GatewayError::Config(e.to_string()))
    }
}

/// A config known up front (the host's own).
#[derive(Debug, Clone)]
pub struct StaticConfig(pub InitConfig);

impl ConfigSource for StaticConfig {
    async fn fetch_init_config(&self) -> Result<InitConfig, GatewayError> {
        Ok(self.0.clone())
    }
}

pub struct WidgetOptions {
    /// Opaque descriptor written into this client's presence marker.
    pub client: String,
    pub time: TimeLabel,
}

/// A running board: feed and presence live until it is dropped.
pub struct Widget<G> {
    config: InitConfig,
    gateway: G,
    feed: CommentFeed<G>,
    _feed: Subscription,
    _presence: PresenceHandle,
}

impl<G: StoreGateway> Widget<G> {
    pub async fn submit(&self, author: &str, body: &str) -> SubmitOutcome {
        self.feed.submit(author, body).await
    }

    /// Shareable handle for issuing submissions from another task.
    pub fn feed(&self) -> CommentFeed<G> {
        self.feed.clone()
    }

    pub fn board(&self) -> &Board {
        self.feed.board()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn config(&self) -> &InitConfig {
        &self.config
    }
}

/// Load config, connect, and start both live loops.
pub async fn boot<S, C>(
    source: &S,
    connector: &C,
    surface: Arc<dyn Surface>,
    options: WidgetOptions,
) -> Result<Widget<C::Gateway>, WidgetError>
where
    S: ConfigSource,
    C: GatewayConnector,
{
    let config = source
        .fetch_init_config()
        .await
        .map_err(WidgetError::Config)?;
    let gateway = connector.connect(&config).map_err(WidgetError::Connect)?;

    let board = Board::after_first_snapshot(surface, options.time);

    let feed = CommentFeed::new(gateway.clone(), board.clone(), config.collection.clone());
    let feed_sub = feed.subscribe();
    let presence = PresenceCounter::new(
        gateway.clone(),
        board,
        config.presence_path.clone(),
        options.client,
    )
    .start();

    info!(
        "Board widget started for project '{}' (collection '{}', presence '{}')",
        config.project_id, config.collection, config.presence_path
    );

    Ok(Widget {
        config,
        gateway,
        feed,
        _feed: feed_sub,
        _presence: presence,
    })
}

/// `boot`, but an init failure is only logged and the widget stays inert.
pub async fn start<S, C>(
    source: &S,
    connector: &C,
    surface: Arc<dyn Surface>,
    options: WidgetOptions,
) -> Option<Widget<C::Gateway>>
where
    S: ConfigSource,
    C: GatewayConnector,
{
    match boot(source, connector, surface, options).await {
        Ok(widget) => Some(widget),
        Err(e) => {
            error!("Board widget failed to initialize: {}", e);
            None
        }
    }
}
