use board_gateway::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    #[error("failed to load init config: {0}")]
    Config(#[source] GatewayError),
    #[error("failed to connect to store: {0}")]
    Connect(#[source] GatewayError),
}
