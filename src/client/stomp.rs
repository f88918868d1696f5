//! STOMP 1.2 Frame Codec
//!
//! Encodes and decodes the text frames carried over the WebSocket. One
//! WebSocket message holds one frame; a message consisting only of end-of-line
//! characters is a heart-beat.
//!
//! ```text
//! COMMAND
//! header1:value1
//! header2:value2
//!
//! body^@
//! ```

use thiserror::Error;

/// Heart-beat payload
pub const HEARTBEAT: &str = "\n";

/// Frame commands used by the chat client and the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONNECT" => Some(Command::Connect),
            "STOMP" => Some(Command::Stomp),
            "CONNECTED" => Some(Command::Connected),
            "SEND" => Some(Command::Send),
            "SUBSCRIBE" => Some(Command::Subscribe),
            "UNSUBSCRIBE" => Some(Command::Unsubscribe),
            "DISCONNECT" => Some(Command::Disconnect),
            "MESSAGE" => Some(Command::Message),
            "RECEIPT" => Some(Command::Receipt),
            "ERROR" => Some(Command::Error),
            _ => None,
        }
    }

    /// CONNECT and CONNECTED headers are not escaped
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

/// Codec errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StompError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("malformed header line: {0}")]
    MalformedHeader(String),
    #[error("invalid escape sequence in: {0}")]
    BadEscape(String),
    #[error("invalid content-length: {0}")]
    ContentLength(String),
    #[error("frame is missing its NUL terminator")]
    MissingNul,
}

/// A single STOMP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header; repeated headers keep the first occurrence
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// CONNECT frame authenticating with a bearer token
    pub fn connect(host: &str, token: &str, heartbeat_ms: u64) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", format!("{},0", heartbeat_ms))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    /// SEND with a JSON body
    pub fn send_json(destination: &str, body: impl Into<String>) -> Self {
        Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json")
            .with_body(body)
    }

    pub fn disconnect(receipt: &str) -> Self {
        Frame::new(Command::Disconnect).header("receipt", receipt)
    }

    /// Serialize to wire text
    pub fn encode(&self) -> String {
        let escaping = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (key, value) in &self.headers {
            if escaping {
                out.push_str(&escape(key));
                out.push(':');
                out.push_str(&escape(value));
            } else {
                out.push_str(key);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get_header("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// Parse one frame. Returns `Ok(None)` for a heart-beat.
pub fn decode(input: &str) -> Result<Option<Frame>, StompError> {
    let input = input.trim_start_matches(['\r', '\n']);
    if input.is_empty() || input == "\0" {
        return Ok(None);
    }

    let (command_line, mut rest) = split_line(input).ok_or(StompError::MissingNul)?;
    let command =
        Command::parse(command_line).ok_or_else(|| StompError::UnknownCommand(command_line.to_string()))?;

    let mut headers = Vec::new();
    loop {
        let (line, remaining) = split_line(rest).ok_or(StompError::MissingNul)?;
        rest = remaining;
        if line.is_empty() {
            break;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| StompError::MalformedHeader(line.to_string()))?;
        if command.escapes_headers() {
            headers.push((unescape(key)?, unescape(value)?));
        } else {
            headers.push((key.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| StompError::ContentLength(v.clone()))
        })
        .transpose()?;

    let body = match content_length {
        Some(len) => {
            let body = rest
                .get(..len)
                .ok_or_else(|| StompError::ContentLength(len.to_string()))?;
            if rest.as_bytes().get(len) != Some(&0) {
                return Err(StompError::MissingNul);
            }
            body
        }
        None => {
            let nul = rest.find('\0').ok_or(StompError::MissingNul)?;
            &rest[..nul]
        }
    };

    Ok(Some(Frame {
        command,
        headers,
        body: body.to_string(),
    }))
}

/// Split off one line, accepting `\n` or `\r\n`
fn split_line(input: &str) -> Option<(&str, &str)> {
    let pos = input.find('\n')?;
    let line = input[..pos].strip_suffix('\r').unwrap_or(&input[..pos]);
    Some((line, &input[pos + 1..]))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(value: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(StompError::BadEscape(value.to_string())),
        }
    }
    Ok(out)
}
