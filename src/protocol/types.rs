//! Frames exchanged with the remote store.

use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    /// Binary-safe payload; not required to be UTF-8.
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    /// Builds a request frame: the command name followed by its arguments,
    /// all sent as bulk strings.
    pub fn command<I, A>(name: &str, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        let mut parts = vec![Frame::Bulk(Bytes::copy_from_slice(name.as_bytes()))];
        parts.extend(args.into_iter().map(|arg| Frame::Bulk(arg.into())));
        Frame::Array(parts)
    }
}
