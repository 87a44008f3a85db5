pub mod aggregate;
pub mod billing;
pub mod collaborator;
pub mod engine;
pub mod payload;
pub mod reconcile;
pub mod reference;
pub mod rules;
pub mod store;

pub use billing::{BillingService, ALLOWED_MIME_TYPES};
pub use collaborator::{BillExtractor, ConversationAgent, HttpCollaborator, UnavailableCollaborator};
pub use engine::{Analysis, DiscrepancyEngine};
pub use reference::ReferencePriceTable;
pub use store::{InMemorySessionStore, SessionStore};
