pub mod assessment;
pub mod bill;
pub mod coerce;
pub mod fee;
pub mod finding;
pub mod result;
pub mod session;

pub use assessment::{Assessment, Disposition};
pub use bill::{BillSnapshot, Category, LineItem};
pub use fee::FeeScheduleRow;
pub use finding::{Confidence, DiscrepancyType, Finding, PriceBand, Severity};
pub use result::{ChatReply, DisputeIssue, DisputePreview, FindingOutcome, ResultsSummary};
pub use session::{ChatTurn, ConversationState, Role, Session};
