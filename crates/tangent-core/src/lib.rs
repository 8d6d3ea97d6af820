pub mod ai;
pub mod canvas;
pub mod catalog;
pub mod client;
pub mod config;
pub mod connector;
pub mod credentials;
pub mod geometry;
pub mod notes;
pub mod panel;
pub mod provider;
pub mod relay;
pub mod selection;
pub mod state;

// Re-export main types for convenience
pub use canvas::{Canvas, BRANCH_OFFSET};
pub use catalog::{ModelCatalog, ModelEntry};
pub use client::{HttpRelayClient, RelayClient, SendError};
pub use config::Config;
pub use connector::{derive_connectors, Connector, ConnectorStyle, Primitive, Stroke};
pub use credentials::{Credential, FileStorage, KeyStore, LocalStorage, MemoryStorage};
pub use geometry::{Point, Rect, Viewport};
pub use notes::{Note, Notebook};
pub use panel::{NewPanel, Panel, PanelId, PanelPatch, PanelStore, PendingSend};
pub use provider::Provider;
pub use relay::{ChatFailure, ChatReply, ChatRequest, Relay, RelayConfig, RelayError};
pub use selection::{PanelResolver, RawSelection, Selection, SelectionCapture};
pub use state::{ChatMessage, ChatRole};
