//! Materializes part bodies that the message fetch left on the server.

use crate::gmail::client::GmailError;
use crate::gmail::types::{BodyRef, MessagePartBody};
use crate::service::MailService;
use tracing::debug;

/// Return the inline body for a matched part, fetching it by attachment id
/// when the message fetch omitted it. Fetch errors are returned as-is.
pub fn resolve_body<S: MailService + ?Sized>(
    service: &S,
    message_id: &str,
    body: &MessagePartBody,
) -> Result<MessagePartBody, GmailError> {
    match body.reference() {
        BodyRef::Remote(attachment_id) => {
            debug!("Requesting attachment {} of message {}", attachment_id, message_id);
            service.get_attachment(message_id, attachment_id)
        }
        BodyRef::Inline(_) => Ok(body.clone()),
    }
}
