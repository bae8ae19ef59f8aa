//! The mail-service capability the extraction pipeline runs against.

use crate::gmail::client::{GmailClient, GmailError};
use crate::gmail::types::{Message, MessagePartBody};

/// Remote mailbox operations used by [`crate::processor::Extractor`].
///
/// Implementations are used from a single thread for the length of one run.
pub trait MailService {
    /// Summaries of the messages matching `query` (mailbox search syntax),
    /// in listing order. Summaries usually carry no part tree.
    fn list_messages(&self, query: &str) -> Result<Vec<Message>, GmailError>;

    /// The full message, part tree included.
    fn get_message(&self, id: &str) -> Result<Message, GmailError>;

    /// A body that the message fetch omitted, in the same encoding as an
    /// inline body.
    fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<MessagePartBody, GmailError>;

    /// Remove the unread marker from all `ids` in one mutation.
    fn batch_mark_read(&self, ids: &[String]) -> Result<(), GmailError>;
}

impl MailService for GmailClient {
    fn list_messages(&self, query: &str) -> Result<Vec<Message>, GmailError> {
        GmailClient::list_messages(self, query)
    }

    fn get_message(&self, id: &str) -> Result<Message, GmailError> {
        GmailClient::get_message(self, id)
    }

    fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<MessagePartBody, GmailError> {
        GmailClient::get_attachment(self, message_id, attachment_id)
    }

    fn batch_mark_read(&self, ids: &[String]) -> Result<(), GmailError> {
        self.mark_messages_read(ids)
    }
}
