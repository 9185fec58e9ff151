pub use self::context::{RelayContext, ResolvedLink, WebhookCredentials};
pub use self::events::{GroupReply, GroupSender, InboundEvent};
pub use self::orchestrator::Orchestrator;
pub use self::suppressor::{SelfDeleteSuppressor, SuppressedId};

pub mod context;
pub mod delivery;
pub mod events;
pub mod filter;
pub mod orchestrator;
pub mod suppressor;
pub mod webhooks;
