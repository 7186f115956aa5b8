use serde::Serialize;

use super::LeadSubmission;

/// Body POSTed to the lead webhook.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub submission_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub business_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&LeadSubmission> for WebhookPayload {
    fn from(lead: &LeadSubmission) -> Self {
        WebhookPayload {
            submission_id: lead.id.clone(),
            full_name: lead.full_name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone().unwrap_or_default(),
            business_name: lead.business_name.clone(),
            website: lead.website.clone(),
            message: lead.message.clone(),
        }
    }
}
