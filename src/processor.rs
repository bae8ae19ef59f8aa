//! Per-message extraction and the end-of-run mark-as-read commit.
//!
//! Attachment output is best effort per part: anything written before a
//! failure in the same message is kept. Marking read is all or nothing per
//! message: only messages whose every matched part was written are marked.

use tracing::{debug, info, warn};

use crate::attachment::{self, AttachmentError, ProcessedAttachment, ProcessedAttachments};
use crate::gmail::client::GmailError;
use crate::gmail::types::{Message, MessagePart};
use crate::resolver;
use crate::service::MailService;
use crate::sink::Sink;
use crate::walker;

pub const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

/// Everything a run needs besides the service and the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractConfig {
    /// Mailbox search expression passed to the listing call.
    pub query: String,
    /// MIME type of the parts to extract, matched exactly.
    pub content_type: String,
    /// Extension of synthesized filenames.
    pub extension: String,
    /// Issue the mark-as-read mutation at the end of the run.
    pub mark_read: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig {
            query: String::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            extension: attachment::DEFAULT_EXTENSION.to_string(),
            mark_read: true,
        }
    }
}

/// Terminal state of one message.
#[derive(Debug)]
pub enum MessageOutcome {
    /// Every matched part was written.
    Extracted { attachments: usize },
    /// A matched part failed; later parts of the message were not tried.
    Failed(AttachmentError),
    /// The full message could not be fetched; nothing was extracted.
    Skipped(GmailError),
}

/// Result of [`Extractor::extract`], consumed by [`Extractor::finalize`].
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub attachments: ProcessedAttachments,
    /// Ids of fully extracted messages, in listing order.
    pub extracted: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

/// Runs the extraction pipeline against one service. Messages are handled
/// one at a time, in listing order.
pub struct Extractor<'a, S: MailService + ?Sized> {
    service: &'a S,
    config: ExtractConfig,
}

impl<'a, S: MailService + ?Sized> Extractor<'a, S> {
    pub fn new(service: &'a S, config: ExtractConfig) -> Self {
        Extractor { service, config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// List the matching messages and extract attachments from each. Only a
    /// failed listing is an error; per-message failures are recorded in the
    /// outcome.
    pub fn extract<K: Sink + ?Sized>(&self, sink: &mut K) -> Result<RunOutcome, GmailError> {
        let messages = self.service.list_messages(&self.config.query)?;
        info!("Processing {} messages", messages.len());

        let mut outcome = RunOutcome::default();
        for message in messages {
            let id = message.id.clone();
            match self.process_message(message, sink, &mut outcome.attachments) {
                MessageOutcome::Extracted { attachments } => {
                    info!("Message {}: extracted {} attachments", id, attachments);
                    outcome.extracted.push(id);
                }
                MessageOutcome::Failed(e) => {
                    warn!("Message {}: extraction failed: {}", id, e);
                    outcome.failed.push(id);
                }
                MessageOutcome::Skipped(e) => {
                    warn!("Message {}: skipped, could not fetch message: {}", id, e);
                    outcome.skipped.push(id);
                }
            }
        }

        info!(
            "Run complete: {} attachments, {} messages extracted, {} failed, {} skipped",
            outcome.attachments.len(),
            outcome.extracted.len(),
            outcome.failed.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Hydrate `message` if needed, then write each matched part in walk
    /// order. Written attachments are appended to `attachments` even when a
    /// later part fails.
    pub fn process_message<K: Sink + ?Sized>(
        &self,
        message: Message,
        sink: &mut K,
        attachments: &mut ProcessedAttachments,
    ) -> MessageOutcome {
        info!("Message ID: {}", message.id);
        let message = match self.hydrate(message) {
            Ok(message) => message,
            Err(e) => return MessageOutcome::Skipped(e),
        };
        let Some(payload) = message.payload.as_ref() else {
            return MessageOutcome::Skipped(GmailError::Api(format!(
                "message {} has no payload",
                message.id
            )));
        };
        if let Some(snippet) = &message.snippet {
            debug!("Snippet: {}", snippet);
        }

        let parts = walker::find_parts(payload, walker::content_type_is(&self.config.content_type));
        debug!("Message {}: {} matching parts", message.id, parts.len());

        let mut written = 0;
        for part in parts {
            match self.extract_part(&message.id, part, sink) {
                Ok(attachment) => {
                    attachments.push(attachment);
                    written += 1;
                }
                Err(e) => return MessageOutcome::Failed(e),
            }
        }
        MessageOutcome::Extracted {
            attachments: written,
        }
    }

    /// Listing only returns summaries; fetch the full message unless the
    /// part tree is already present.
    fn hydrate(&self, message: Message) -> Result<Message, GmailError> {
        if message.payload.is_some() {
            return Ok(message);
        }
        self.service.get_message(&message.id)
    }

    fn extract_part<K: Sink + ?Sized>(
        &self,
        message_id: &str,
        part: &MessagePart,
        sink: &mut K,
    ) -> Result<ProcessedAttachment, AttachmentError> {
        let body = resolver::resolve_body(self.service, message_id, &part.body)?;
        attachment::store_attachment(sink, message_id, part, &body, &self.config.extension)
    }

    /// Mark every fully extracted message as read with a single mutation.
    /// Returns how many messages were marked.
    pub fn finalize(&self, outcome: &RunOutcome) -> Result<usize, GmailError> {
        if !self.config.mark_read {
            info!("Mark as read disabled, leaving {} messages unread", outcome.extracted.len());
            return Ok(0);
        }
        if outcome.extracted.is_empty() {
            debug!("No messages to mark as read");
            return Ok(0);
        }
        self.service.batch_mark_read(&outcome.extracted)?;
        info!("Marked {} messages as read", outcome.extracted.len());
        Ok(outcome.extracted.len())
    }
}
