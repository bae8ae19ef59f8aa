//! Extract attachments of one content type from Gmail messages and mark
//! fully processed messages as read.
//!
//! The pipeline lists messages through a [`service::MailService`], walks
//! each message's part tree ([`walker`]), fetches bodies the listing left
//! on the server ([`resolver`]), decodes them into a [`sink::Sink`]
//! ([`attachment`]) and finally marks the messages that were completely
//! extracted as read ([`processor::Extractor::finalize`]).

pub mod attachment;
pub mod config;
pub mod gmail;
pub mod log;
pub mod processor;
pub mod resolver;
pub mod service;
pub mod sink;
pub mod walker;

pub use attachment::{ProcessedAttachment, ProcessedAttachments};
pub use gmail::client::{GmailClient, GmailError};
pub use processor::{ExtractConfig, Extractor, RunOutcome};
pub use service::MailService;
pub use sink::{FileSink, MemorySink, Output, Sink};
