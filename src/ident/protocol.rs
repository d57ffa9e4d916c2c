//! RFC 1413 request parsing and reply formatting.
//!
//! Everything here is pure: no I/O and no shared state.

use std::fmt;
use thiserror::Error;

/// Line terminator for every reply.
pub const CRLF: &str = "\r\n";

pub const ERROR_NO_USER: &str = "NO-USER";
pub const ERROR_HIDDEN_USER: &str = "HIDDEN-USER";
pub const ERROR_INVALID_PORT: &str = "INVALID-PORT";
pub const ERROR_UNKNOWN: &str = "UNKNOWN-ERROR";

/// Port pair from a request, in the querying server's frame of reference:
/// `local` is the port on this host, `remote` the port on the querying host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortPair {
    pub local: u16,
    pub remote: u16,
}

impl PortPair {
    pub fn new(local: u16, remote: u16) -> Self {
        Self { local, remote }
    }
}

impl fmt::Display for PortPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.local, self.remote)
    }
}

/// Why a request line could not be turned into a [`PortPair`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request has no port separator: '{raw}'")]
    MissingSeparator { raw: String },
    #[error("non-numeric port in request: '{local}', '{remote}'")]
    NotNumeric { local: String, remote: String },
    #[error("port out of range: {local}, {remote}")]
    OutOfRange { local: i64, remote: i64 },
}

/// RFC 1413 error tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoUser,
    HiddenUser,
    InvalidPort,
    UnknownError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoUser => ERROR_NO_USER,
            ErrorKind::HiddenUser => ERROR_HIDDEN_USER,
            ErrorKind::InvalidPort => ERROR_INVALID_PORT,
            ErrorKind::UnknownError => ERROR_UNKNOWN,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving a port pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentReply {
    UserId { system: String, user: String },
    Error(ErrorKind),
}

impl IdentReply {
    pub fn user_id(system: impl Into<String>, user: impl Into<String>) -> Self {
        IdentReply::UserId {
            system: system.into(),
            user: user.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, IdentReply::Error(_))
    }
}

/// Parse a request line of the form `<local-port> , <remote-port>`.
///
/// Escapes are removed and all whitespace is ignored before splitting on the
/// first comma. Ports must be integers in 1..=65535.
pub fn parse_request(line: &str) -> Result<PortPair, RequestError> {
    let compact: String = unescape(line)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let (local, remote) = match compact.split_once(',') {
        Some(parts) => parts,
        None => return Err(RequestError::MissingSeparator { raw: compact }),
    };

    let (local_num, remote_num) = match (local.parse::<i64>(), remote.parse::<i64>()) {
        (Ok(l), Ok(r)) => (l, r),
        _ => {
            return Err(RequestError::NotNumeric {
                local: local.to_string(),
                remote: remote.to_string(),
            })
        }
    };

    match (u16::try_from(local_num), u16::try_from(remote_num)) {
        (Ok(l), Ok(r)) if l != 0 && r != 0 => Ok(PortPair::new(l, r)),
        _ => Err(RequestError::OutOfRange {
            local: local_num,
            remote: remote_num,
        }),
    }
}

/// Render the reply line for a resolved request.
pub fn format_reply(ports: PortPair, reply: &IdentReply) -> String {
    match reply {
        IdentReply::UserId { system, user } => format!(
            "{} : USERID : {} : {}{}",
            ports,
            escape(system),
            escape(user),
            CRLF
        ),
        IdentReply::Error(kind) => format!("{} : ERROR : {}{}", ports, kind, CRLF),
    }
}

/// Render the reply line for a request that could not be parsed. The
/// ports are echoed the way the client sent them.
pub fn format_request_error(err: &RequestError) -> String {
    match err {
        RequestError::MissingSeparator { raw } => {
            format!("{} : ERROR : {}{}", escape(raw), ERROR_UNKNOWN, CRLF)
        }
        RequestError::NotNumeric { local, remote } => format!(
            "{}, {} : ERROR : {}{}",
            escape(local),
            escape(remote),
            ERROR_UNKNOWN,
            CRLF
        ),
        RequestError::OutOfRange { local, remote } => format!(
            "{}, {} : ERROR : {}{}",
            local, remote, ERROR_INVALID_PORT, CRLF
        ),
    }
}

/// Parse `line`, resolve it with `resolve` and format the reply.
pub fn respond<F>(line: &str, resolve: F) -> String
where
    F: FnOnce(PortPair) -> IdentReply,
{
    match parse_request(line) {
        Ok(ports) => format_reply(ports, &resolve(ports)),
        Err(e) => format_request_error(&e),
    }
}

/// Backslash-escape the characters RFC 1413 treats as token delimiters.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | ':' | ',' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Inverse of [`escape`]. A backslash before any other character is kept.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '\\' | ':' | ',' | ' ') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
