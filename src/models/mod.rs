pub mod lead;
pub mod payload;

pub use lead::{LeadRow, LeadSubmission, ProcessingStatus};
pub use payload::WebhookPayload;
