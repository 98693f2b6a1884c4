use mail_parser::{MessageParser, MimeHeaders, PartType};

use super::types::{Attachment, EmailFlags};

/// Fields extracted from a raw RFC 5322 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub from_name: String,
    pub from_addr: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
    /// Unix timestamp from the Date header, if it had a usable one
    pub date: Option<i64>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no message headers found")]
    NoHeaders,
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Turns raw message bytes into structured fields.
pub trait MimeParser: Send + Sync {
    fn parse(&self, raw: &[u8]) -> Result<ParsedMessage, ParseError>;
}

/// `MimeParser` backed by the `mail-parser` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct MailParser;

impl MimeParser for MailParser {
    fn parse(&self, raw: &[u8]) -> Result<ParsedMessage, ParseError> {
        let message = MessageParser::default()
            .parse(raw)
            .ok_or(ParseError::NoHeaders)?;

        let (from_name, from_addr) = message
            .from()
            .and_then(|addrs| addrs.first())
            .map(|addr| {
                (
                    addr.name().unwrap_or_default().to_string(),
                    addr.address().unwrap_or_default().to_string(),
                )
            })
            .unwrap_or_default();

        let subject = message.subject().map(|s| s.to_string()).unwrap_or_default();
        let date = message.date().map(|d| d.to_timestamp());

        let html_body = extract_html_body(&message);
        let text_body = extract_text_body(&message)
            .or_else(|| html_body.as_deref().map(html_to_text))
            .unwrap_or_default();

        let attachments = parse_attachments(&message);

        Ok(ParsedMessage {
            from_name,
            from_addr,
            subject,
            text_body,
            html_body,
            date,
            attachments,
        })
    }
}

fn extract_text_body(message: &mail_parser::Message) -> Option<String> {
    // First try to get text body parts
    for part in message.text_bodies() {
        if let PartType::Text(text) = &part.body {
            return Some(text.to_string());
        }
    }

    // Fallback: try to extract from any part
    for part in message.parts.iter() {
        if let PartType::Text(text) = &part.body {
            let content_type = part.content_type();
            if content_type
                .map(|ct| ct.subtype() == Some("plain"))
                .unwrap_or(true)
            {
                return Some(text.to_string());
            }
        }
    }

    None
}

fn extract_html_body(message: &mail_parser::Message) -> Option<String> {
    for part in message.html_bodies() {
        if let PartType::Html(html) = &part.body {
            return Some(html.to_string());
        }
    }

    None
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 80).unwrap_or_else(|_| html.to_string())
}

fn parse_attachments(message: &mail_parser::Message) -> Vec<Attachment> {
    message
        .attachments()
        .enumerate()
        .map(|(index, part)| {
            let filename = part
                .attachment_name()
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("attachment-{}", index + 1));
            let content_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let data = part.contents().to_vec();

            Attachment {
                filename,
                content_type,
                size: data.len(),
                data,
            }
        })
        .collect()
}

pub fn parse_flags_from_imap(flags: &[async_imap::types::Flag<'_>]) -> EmailFlags {
    let mut result = EmailFlags::empty();

    for flag in flags {
        match flag {
            async_imap::types::Flag::Seen => result |= EmailFlags::SEEN,
            async_imap::types::Flag::Answered => result |= EmailFlags::ANSWERED,
            async_imap::types::Flag::Flagged => result |= EmailFlags::FLAGGED,
            async_imap::types::Flag::Deleted => result |= EmailFlags::DELETED,
            async_imap::types::Flag::Draft => result |= EmailFlags::DRAFT,
            _ => {}
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_email() {
        let raw = b"From: Sender Name <sender@example.com>\r\n\
                    To: recipient@example.com\r\n\
                    Subject: Test Email\r\n\
                    Date: Mon, 1 Jan 2024 12:00:00 +0000\r\n\
                    Message-ID: <test@example.com>\r\n\
                    \r\n\
                    Hello, this is a test email.";

        let parsed = MailParser.parse(raw).unwrap();
        assert_eq!(parsed.subject, "Test Email");
        assert_eq!(parsed.from_addr, "sender@example.com");
        assert_eq!(parsed.from_name, "Sender Name");
        assert_eq!(parsed.date, Some(1704110400));
        assert!(parsed.text_body.contains("Hello"));
        assert!(parsed.html_body.is_none());
        assert!(parsed.attachments.is_empty());
    }

    #[test]
    fn test_parse_missing_date_and_sender() {
        let raw = b"Subject: No date here\r\n\r\nBody text";

        let parsed = MailParser.parse(raw).unwrap();
        assert_eq!(parsed.subject, "No date here");
        assert_eq!(parsed.date, None);
        assert!(parsed.from_addr.is_empty());
    }

    #[test]
    fn test_parse_html_only_derives_plain_text() {
        let raw = b"From: a@example.com\r\n\
                    Subject: Html\r\n\
                    Content-Type: text/html; charset=utf-8\r\n\
                    \r\n\
                    <html><body><p>Hello <b>world</b></p></body></html>";

        let parsed = MailParser.parse(raw).unwrap();
        assert!(parsed.html_body.as_deref().unwrap().contains("<b>world</b>"));
        assert!(parsed.text_body.contains("Hello"));
        assert!(!parsed.text_body.contains("<b>"));
    }

    #[test]
    fn test_parse_attachment() {
        let raw = b"From: a@example.com\r\n\
                    Subject: With attachment\r\n\
                    MIME-Version: 1.0\r\n\
                    Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
                    \r\n\
                    --XYZ\r\n\
                    Content-Type: text/plain\r\n\
                    \r\n\
                    See attached.\r\n\
                    --XYZ\r\n\
                    Content-Type: application/pdf; name=\"report.pdf\"\r\n\
                    Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
                    Content-Transfer-Encoding: base64\r\n\
                    \r\n\
                    SGVsbG8=\r\n\
                    --XYZ--\r\n";

        let parsed = MailParser.parse(raw).unwrap();
        assert!(parsed.text_body.contains("See attached."));
        assert_eq!(parsed.attachments.len(), 1);
        let attachment = &parsed.attachments[0];
        assert_eq!(attachment.filename, "report.pdf");
        assert_eq!(attachment.content_type, "application/pdf");
        assert_eq!(attachment.data, b"Hello");
        assert_eq!(attachment.size, 5);
    }

    #[test]
    fn test_parse_flags() {
        use async_imap::types::Flag;

        let flags = parse_flags_from_imap(&[Flag::Seen, Flag::Flagged]);
        assert!(flags.contains(EmailFlags::SEEN));
        assert!(flags.contains(EmailFlags::FLAGGED));
        assert!(!flags.contains(EmailFlags::DELETED));
        assert_eq!(parse_flags_from_imap(&[]), EmailFlags::empty());
    }
}
