//! Store Gateway: the capability boundary between the board widget and the
//! real-time store, plus an in-process store that implements it.

pub mod gateway;
pub mod memory;
pub mod stream;

pub use gateway::{ConfigSource, DocumentJournal, GatewayConnector, GatewayError, StoreGateway};
pub use memory::{Clock, MemoryGateway, MemoryStore, StoreOptions};
pub use stream::{LiveStream, Publisher};
