//! Decoding matched parts and writing them through a [`Sink`].

use base64::Engine;
use std::fmt;
use std::io::{self, Write};
use std::ops::Deref;
use thiserror::Error;
use tracing::{info, warn};

use crate::gmail::client::GmailError;
use crate::gmail::types::{MessagePart, MessagePartBody, MessagePartHeader};
use crate::sink::{Output, Sink};

pub const DEFAULT_EXTENSION: &str = "pdf";

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("failed to retrieve attachment: {0}")]
    Resolve(#[from] GmailError),
    #[error("failed to decode attachment data: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("failed to write {filename}: {source}")]
    Sink {
        filename: String,
        #[source]
        source: io::Error,
    },
}

/// Decode a body in the API's URL-safe base64 alphabet. Padding must be
/// present and canonical.
pub fn decode_body(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::URL_SAFE.decode(data)
}

/// `<part filename>-<message id>-<part id>.<extension>`. Path separators in
/// the part filename are replaced so the name stays inside the sink.
pub fn attachment_filename(part: &MessagePart, message_id: &str, extension: &str) -> String {
    let original: String = part
        .filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}-{}-{}.{}", original, message_id, part.part_id, extension)
}

/// A decoded attachment whose output is still open.
pub struct ProcessedAttachment {
    pub filename: String,
    pub original_name: String,
    pub message_id: String,
    pub part_id: String,
    pub headers: Vec<MessagePartHeader>,
    /// Decoded byte count.
    pub size: usize,
    pub output: Box<dyn Output>,
}

impl fmt::Debug for ProcessedAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessedAttachment")
            .field("filename", &self.filename)
            .field("original_name", &self.original_name)
            .field("message_id", &self.message_id)
            .field("part_id", &self.part_id)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Attachments produced by one run, in the order they were written.
#[derive(Debug, Default)]
pub struct ProcessedAttachments(Vec<ProcessedAttachment>);

impl ProcessedAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attachment: ProcessedAttachment) {
        self.0.push(attachment);
    }

    /// Close every output. All outputs are attempted; the first error is
    /// returned.
    pub fn close(&mut self) -> io::Result<()> {
        let mut first_err = None;
        for attachment in &mut self.0 {
            if let Err(e) = attachment.output.close() {
                warn!("Failed to close {}: {}", attachment.filename, e);
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn into_vec(self) -> Vec<ProcessedAttachment> {
        self.0
    }
}

impl Deref for ProcessedAttachments {
    type Target = [ProcessedAttachment];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a ProcessedAttachments {
    type Item = &'a ProcessedAttachment;
    type IntoIter = std::slice::Iter<'a, ProcessedAttachment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Decode `body` (already resolved for `part`) and write it to a new output
/// from `sink`. Nothing is requested from the sink when decoding fails.
pub fn store_attachment<K: Sink + ?Sized>(
    sink: &mut K,
    message_id: &str,
    part: &MessagePart,
    body: &MessagePartBody,
    extension: &str,
) -> Result<ProcessedAttachment, AttachmentError> {
    let content = decode_body(body.data.as_deref().unwrap_or(""))?;
    let filename = attachment_filename(part, message_id, extension);

    let sink_err = |source: io::Error| AttachmentError::Sink {
        filename: filename.clone(),
        source,
    };
    let mut output = sink.create(&filename).map_err(sink_err)?;
    output.write_all(&content).map_err(sink_err)?;
    output.flush().map_err(sink_err)?;

    info!("Successfully written file: {} ({} bytes)", filename, content.len());

    Ok(ProcessedAttachment {
        filename,
        original_name: part.filename.clone(),
        message_id: message_id.to_string(),
        part_id: part.part_id.clone(),
        headers: part.headers.clone(),
        size: content.len(),
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    fn pdf_part(part_id: &str, filename: &str) -> MessagePart {
        MessagePart {
            part_id: part_id.to_string(),
            mime_type: "application/pdf".to_string(),
            filename: filename.to_string(),
            headers: vec![MessagePartHeader {
                name: "Content-Disposition".to_string(),
                value: format!("attachment; filename=\"{}\"", filename),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_url_safe_alphabet() {
        assert_eq!(decode_body("SGVsbG8=").unwrap(), b"Hello");
        // 0xfb 0xff encodes to "-_8=" in the URL-safe alphabet.
        assert_eq!(decode_body("-_8=").unwrap(), vec![0xfbu8, 0xff]);
        assert_eq!(decode_body("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(decode_body("+/8=").is_err());
        assert!(decode_body("SGVsbG8").is_err());
        assert!(decode_body("not base64!").is_err());
    }

    #[test]
    fn test_filename_synthesis() {
        let part = pdf_part("1", "statement.pdf");
        assert_eq!(
            attachment_filename(&part, "M1", "pdf"),
            "statement.pdf-M1-1.pdf"
        );
        assert_eq!(attachment_filename(&pdf_part("0", ""), "M2", "pdf"), "-M2-0.pdf");
    }

    #[test]
    fn test_filename_strips_path_separators() {
        let part = pdf_part("2", "../../etc/passwd");
        assert_eq!(attachment_filename(&part, "M1", "pdf"), ".._.._etc_passwd-M1-2.pdf");
    }

    #[test]
    fn test_filenames_unique_when_originals_collide() {
        let pairs = [("M1", "1"), ("M1", "2"), ("M2", "1"), ("M2", "1.1")];
        let names: HashSet<String> = pairs
            .iter()
            .map(|(msg, part)| attachment_filename(&pdf_part(part, "same.pdf"), msg, "pdf"))
            .collect();
        assert_eq!(names.len(), pairs.len());
    }

    #[test]
    fn test_store_attachment_writes_decoded_bytes() {
        let memory = MemorySink::new();
        let mut sink = memory.clone();
        let part = pdf_part("1", "hello.pdf");
        let body = MessagePartBody::inline("SGVsbG8=");

        let att = store_attachment(&mut sink, "M1", &part, &body, "pdf").unwrap();

        assert_eq!(att.filename, "hello.pdf-M1-1.pdf");
        assert_eq!(att.original_name, "hello.pdf");
        assert_eq!(att.size, 5);
        assert_eq!(att.headers, part.headers);
        assert_eq!(memory.contents("hello.pdf-M1-1.pdf").unwrap(), b"Hello");
        assert!(!memory.is_closed("hello.pdf-M1-1.pdf"));
    }

    #[test]
    fn test_decode_failure_opens_nothing() {
        let memory = MemorySink::new();
        let mut sink = memory.clone();
        let err = store_attachment(
            &mut sink,
            "M1",
            &pdf_part("1", "bad.pdf"),
            &MessagePartBody::inline("%%%"),
            "pdf",
        )
        .unwrap_err();
        assert!(matches!(err, AttachmentError::Decode(_)));
        assert!(memory.filenames().is_empty());
    }

    #[test]
    fn test_sink_failure_reported_with_filename() {
        let mut sink = |_: &str| -> io::Result<Box<dyn Output>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        };
        let err = store_attachment(
            &mut sink,
            "M1",
            &pdf_part("1", "a.pdf"),
            &MessagePartBody::inline("SGVsbG8="),
            "pdf",
        )
        .unwrap_err();
        match err {
            AttachmentError::Sink { filename, .. } => assert_eq!(filename, "a.pdf-M1-1.pdf"),
            other => panic!("expected sink error, got {:?}", other),
        }
    }

    struct CountingOutput {
        closes: Rc<RefCell<Vec<String>>>,
        name: String,
        fail_with: Option<&'static str>,
    }

    impl Write for CountingOutput {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Output for CountingOutput {
        fn close(&mut self) -> io::Result<()> {
            self.closes.borrow_mut().push(self.name.clone());
            match self.fail_with {
                Some(msg) => Err(io::Error::new(io::ErrorKind::Other, msg)),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn test_bulk_close_visits_all_and_returns_first_error() {
        let closes = Rc::new(RefCell::new(Vec::new()));
        let mut attachments = ProcessedAttachments::new();
        for (name, fail_with) in [("a", None), ("b", Some("first")), ("c", Some("second")), ("d", None)] {
            attachments.push(ProcessedAttachment {
                filename: name.to_string(),
                original_name: String::new(),
                message_id: "M".to_string(),
                part_id: "0".to_string(),
                headers: Vec::new(),
                size: 0,
                output: Box::new(CountingOutput {
                    closes: closes.clone(),
                    name: name.to_string(),
                    fail_with,
                }),
            });
        }

        let err = attachments.close().unwrap_err();
        assert_eq!(err.to_string(), "first");
        assert_eq!(*closes.borrow(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_bulk_close_memory_outputs() {
        let memory = MemorySink::new();
        let mut sink = memory.clone();
        let mut attachments = ProcessedAttachments::new();
        for id in ["1", "2"] {
            attachments.push(
                store_attachment(
                    &mut sink,
                    "M1",
                    &pdf_part(id, "x.pdf"),
                    &MessagePartBody::inline("SGk="),
                    "pdf",
                )
                .unwrap(),
            );
        }
        assert_eq!(attachments.len(), 2);
        attachments.close().unwrap();
        attachments.close().unwrap();
        assert!(memory.is_closed("x.pdf-M1-1.pdf"));
        assert!(memory.is_closed("x.pdf-M1-2.pdf"));
    }
}
