use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

use crate::core::config::{Config, EmailSettings};
use crate::core::error::{ConfigError, JeevesError, MailError};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Base64 body line length (RFC 2045).
const BODY_LINE_LEN: usize = 76;
/// Raw bytes per RFC 2047 encoded word, keeping each word under 75 chars.
const ENCODED_WORD_BYTES: usize = 45;

/// A rendered HTML email ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// The delivery capability used by the synthesizers.
pub trait Mailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Delivers mail over unauthenticated SMTP to a relay such as a local MTA.
pub struct SmtpMailer {
    host: String,
    port: u16,
    helo_name: String,
}

impl SmtpMailer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            helo_name: "localhost".to_string(),
        }
    }

    pub fn from_settings(settings: &EmailSettings) -> Self {
        Self::new(settings.smtp_host.clone(), settings.smtp_port)
    }

    fn connect(&self) -> Result<TcpStream, MailError> {
        let connect_err = |source: std::io::Error| MailError::Connect {
            host: self.host.clone(),
            port: self.port,
            source,
        };

        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(connect_err)?
            .next()
            .ok_or_else(|| {
                connect_err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "host did not resolve",
                ))
            })?;

        let stream = TcpStream::connect_timeout(&addr, SMTP_TIMEOUT).map_err(connect_err)?;
        stream.set_read_timeout(Some(SMTP_TIMEOUT))?;
        stream.set_write_timeout(Some(SMTP_TIMEOUT))?;
        Ok(stream)
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if message.to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let stream = self.connect()?;
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;

        deliver(&mut reader, &mut writer, &self.helo_name, message)?;
        info!(
            recipients = message.to.len(),
            host = %self.host,
            "email sent"
        );
        Ok(())
    }
}

/// Stands in when email is suppressed; delivers nothing.
pub struct NoopMailer;

impl Mailer for NoopMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        debug!(subject = %message.subject, "email suppressed");
        Ok(())
    }
}

/// Sends the rendered document once, to the test address when `test_email`
/// is set.
///
/// # Returns
/// The recipients the message was delivered to.
pub(crate) fn dispatch(
    config: &Config,
    default_subject: &str,
    html: &str,
    test_email: bool,
    mailer: &dyn Mailer,
) -> Result<Vec<String>, JeevesError> {
    let settings = config.email.as_ref().ok_or_else(|| {
        ConfigError::MissingFields(vec![
            "email_from".to_string(),
            "email_to".to_string(),
            "smtp_host".to_string(),
        ])
    })?;

    let subject = settings
        .subject
        .clone()
        .unwrap_or_else(|| default_subject.to_string());
    let message = EmailMessage {
        from: settings.from.clone(),
        to: settings.recipients(test_email),
        subject: if test_email {
            format!("[TEST] {subject}")
        } else {
            subject
        },
        html: html.to_string(),
    };

    mailer.send(&message)?;
    Ok(message.to)
}

/// Runs one SMTP transaction for `message` over an already open connection.
fn deliver<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    helo_name: &str,
    message: &EmailMessage,
) -> Result<(), MailError> {
    expect_reply(reader, "greeting", &[220])?;

    command(writer, &format!("EHLO {helo_name}"))?;
    match expect_reply(reader, "EHLO", &[250]) {
        Ok(()) => {}
        Err(MailError::Rejected { reply, .. }) => {
            debug!(reply = %reply, "EHLO refused, falling back to HELO");
            command(writer, &format!("HELO {helo_name}"))?;
            expect_reply(reader, "HELO", &[250])?;
        }
        Err(e) => return Err(e),
    }

    command(writer, &format!("MAIL FROM:<{}>", message.from))?;
    expect_reply(reader, "MAIL FROM", &[250])?;

    for recipient in &message.to {
        command(writer, &format!("RCPT TO:<{recipient}>"))?;
        expect_reply(reader, "RCPT TO", &[250, 251])?;
    }

    command(writer, "DATA")?;
    expect_reply(reader, "DATA", &[354])?;

    writer.write_all(format_message(message).as_bytes())?;
    writer.write_all(b".\r\n")?;
    writer.flush()?;
    expect_reply(reader, "message body", &[250])?;

    command(writer, "QUIT")?;
    // Some relays drop the connection straight after accepting QUIT.
    let _ = expect_reply(reader, "QUIT", &[221]);
    Ok(())
}

fn command<W: Write>(writer: &mut W, line: &str) -> Result<(), MailError> {
    debug!(command = line, "smtp");
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\r\n")?;
    writer.flush()?;
    Ok(())
}

/// Reads a possibly multi-line reply (`250-...` continuation lines) and
/// checks its code.
fn expect_reply<R: BufRead>(reader: &mut R, what: &str, accepted: &[u16]) -> Result<(), MailError> {
    let mut reply = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(MailError::Rejected {
                command: what.to_string(),
                reply: "connection closed".to_string(),
            });
        }
        reply.push_str(line.trim_end());
        if line.as_bytes().get(3) != Some(&b'-') {
            break;
        }
        reply.push(' ');
    }

    let code = reply.get(..3).and_then(|c| c.parse::<u16>().ok());
    match code {
        Some(code) if accepted.contains(&code) => Ok(()),
        _ => Err(MailError::Rejected {
            command: what.to_string(),
            reply,
        }),
    }
}

/// Builds the DATA payload: headers, a blank line, and the base64 body.
///
/// Every line is 7-bit ASCII and well under the SMTP line limit, so the
/// payload is valid whatever the relay advertises. Base64 lines never start
/// with `.`, so no dot-stuffing is needed.
fn format_message(message: &EmailMessage) -> String {
    let mut out = String::new();
    out.push_str(&format!("From: {}\r\n", header_value(&message.from)));
    out.push_str(&format!("To: {}\r\n", header_value(&message.to.join(", "))));
    out.push_str(&format!("Subject: {}\r\n", encode_header(&message.subject)));
    out.push_str(&format!("Date: {}\r\n", chrono::Local::now().to_rfc2822()));
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str("Content-Type: text/html; charset=utf-8\r\n");
    out.push_str("Content-Transfer-Encoding: base64\r\n");
    out.push_str("\r\n");

    let body = message.html.lines().collect::<Vec<_>>().join("\r\n");
    let encoded = STANDARD.encode(body.as_bytes());
    let mut rest = encoded.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(BODY_LINE_LEN));
        out.push_str(line);
        out.push_str("\r\n");
        rest = tail;
    }
    out
}

/// Folds CR and LF out of a header value.
fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Encodes a non-ASCII header value as folded RFC 2047 `B` encoded words.
fn encode_header(value: &str) -> String {
    let value = header_value(value);
    if value.is_ascii() {
        return value;
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in value.chars() {
        if chunk.len() + ch.len_utf8() > ENCODED_WORD_BYTES {
            words.push(encoded_word(&chunk));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(&chunk));
    }
    words.join("\r\n ")
}

fn encoded_word(text: &str) -> String {
    format!("=?UTF-8?B?{}?=", STANDARD.encode(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn message() -> EmailMessage {
        EmailMessage {
            from: "jeeves@example.com".into(),
            to: vec!["a@example.com".into(), "b@example.com".into()],
            subject: "Jeeves Jenkins Report - 2026-10-18".into(),
            html: "<p>ok</p>\n.hidden\n".into(),
        }
    }

    #[test]
    fn test_full_transaction() {
        let replies = "220 mail ready\r\n\
                       250-mail.example\r\n250 SIZE 1000\r\n\
                       250 ok\r\n\
                       250 ok\r\n251 forwarded\r\n\
                       354 go ahead\r\n\
                       250 queued\r\n\
                       221 bye\r\n";
        let mut reader = Cursor::new(replies.as_bytes());
        let mut written = Vec::new();

        deliver(&mut reader, &mut written, "localhost", &message()).unwrap();

        let sent = String::from_utf8(written).unwrap();
        assert!(sent.starts_with("EHLO localhost\r\nMAIL FROM:<jeeves@example.com>\r\n"));
        assert!(sent.contains("RCPT TO:<a@example.com>\r\nRCPT TO:<b@example.com>\r\nDATA\r\n"));
        assert!(sent.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(sent.contains("Content-Transfer-Encoding: base64\r\n"));
        let body = STANDARD.encode("<p>ok</p>\r\n.hidden");
        assert!(sent.contains(&format!("\r\n\r\n{body}\r\n.\r\nQUIT\r\n")));
    }

    #[test]
    fn test_falls_back_to_helo() {
        let replies = "220 ready\r\n502 not implemented\r\n250 hi\r\n\
                       250 ok\r\n250 ok\r\n250 ok\r\n354 go\r\n250 queued\r\n221 bye\r\n";
        let mut reader = Cursor::new(replies.as_bytes());
        let mut written = Vec::new();

        deliver(&mut reader, &mut written, "localhost", &message()).unwrap();

        let sent = String::from_utf8(written).unwrap();
        assert!(sent.starts_with("EHLO localhost\r\nHELO localhost\r\nMAIL FROM:"));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded() {
        let msg = EmailMessage {
            subject: "Rapport – état".into(),
            ..message()
        };
        let payload = format_message(&msg);

        assert!(payload.is_ascii());
        let expected = format!("Subject: =?UTF-8?B?{}?=\r\n", STANDARD.encode("Rapport – état"));
        assert!(payload.contains(&expected));
    }

    #[test]
    fn test_long_subject_and_body_lines_are_folded() {
        let msg = EmailMessage {
            subject: "é".repeat(100),
            html: format!("<p>{}</p>", "x".repeat(5000)),
            ..message()
        };
        let payload = format_message(&msg);

        assert!(payload.is_ascii());
        assert!(payload.split("\r\n").all(|line| line.len() <= 998));
        let (_, body) = payload.split_once("\r\n\r\n").unwrap();
        assert!(body.split("\r\n").all(|line| line.len() <= BODY_LINE_LEN));
        // 200 bytes of subject need five encoded words.
        assert_eq!(payload.matches("=?UTF-8?B?").count(), 5);
    }

    #[test]
    fn test_header_values_cannot_inject_lines() {
        let msg = EmailMessage {
            subject: "Report\r\nBcc: someone@example.com".into(),
            ..message()
        };
        let payload = format_message(&msg);
        assert!(!payload.contains("\r\nBcc:"));
    }

    #[test]
    fn test_rejected_recipient() {
        let replies = "220 ready\r\n250 hi\r\n250 ok\r\n550 no such user\r\n";
        let mut reader = Cursor::new(replies.as_bytes());
        let mut written = Vec::new();

        let err = deliver(&mut reader, &mut written, "localhost", &message()).unwrap_err();
        match err {
            MailError::Rejected { command, reply } => {
                assert_eq!(command, "RCPT TO");
                assert_eq!(reply, "550 no such user");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_closed_connection() {
        let mut reader = Cursor::new(&b""[..]);
        let mut written = Vec::new();
        let err = deliver(&mut reader, &mut written, "localhost", &message()).unwrap_err();
        assert!(matches!(err, MailError::Rejected { command, .. } if command == "greeting"));
    }

    #[test]
    fn test_no_recipients() {
        let mailer = SmtpMailer::new("127.0.0.1", 2525);
        let msg = EmailMessage {
            to: vec![],
            ..message()
        };
        assert!(matches!(mailer.send(&msg), Err(MailError::NoRecipients)));
    }
}
