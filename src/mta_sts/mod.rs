pub mod lookup;
pub mod parse;
pub mod verify;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Mode {
    Enforce,
    Testing,
    None,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MxPattern {
    Equals(String),
    Wildcard(String),
}

#[derive(Debug, PartialEq, Eq)]
pub struct Policy {
    pub mode: Mode,
    pub max_age: u64,
    pub mx: Vec<MxPattern>,
}

/// The `(version, id)` pair published at `_mta-sts.<domain>`.
#[derive(Debug, PartialEq, Eq)]
pub struct DnsRecord {
    pub id: String,
}

#[derive(Debug)]
pub enum Error {
    MalformedRecord(String),
    MalformedPolicy(String),
    Http(reqwest::Error),
    UnexpectedStatus(u16),
    UnexpectedContentType(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MalformedRecord(reason) => write!(f, "malformed record: {reason}"),
            Error::MalformedPolicy(reason) => write!(f, "malformed policy: {reason}"),
            Error::Http(err) => write!(f, "policy fetch error: {err}"),
            Error::UnexpectedStatus(status) => write!(f, "policy fetch error: HTTP {status}"),
            Error::UnexpectedContentType(content_type) => {
                write!(f, "policy fetch error: unexpected content type {content_type:?}")
            }
        }
    }
}

impl std::error::Error for Error {}
