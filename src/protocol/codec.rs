//! Codec for the wire protocol spoken by the remote store.
//!
//! Every frame starts with a one-byte type marker and a CRLF-terminated
//! header line.
//!
//! # Frames
//!
//! - Simple string
//!     - `+$text\r\n`
//! - Error
//!     - `-$message\r\n`
//! - Integer
//!     - `:$number\r\n`
//! - Bulk string
//!     - `$$length\r\n$bytes\r\n`, or `$-1\r\n` for null
//! - Array
//!     - `*$count\r\n` followed by `$count` frames, or `*-1\r\n` for null
//!
//! Requests are arrays of bulk strings: `*2\r\n$7\r\nHGETALL\r\n$5\r\nusers\r\n`.

use super::types::Frame;
use anyhow::{bail, Context, Result};
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const CRLF: &[u8] = b"\r\n";
const MAX_DEPTH: usize = 32;
const MAX_PREALLOC: usize = 1024;
/// Largest bulk string the remote store accepts.
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

#[derive(Default, Debug)]
pub struct Codec {
    /// Bytes the buffered frame needs before parsing it again is worthwhile.
    needed: usize,
}

impl Decoder for Codec {
    type Item = Frame;

    type Error = anyhow::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < self.needed {
            return Ok(None);
        }

        match parse(&src[..], 0) {
            Ok(Progress::Done(frame, consumed)) => {
                self.needed = 0;
                src.advance(consumed);
                Ok(Some(frame))
            }
            Ok(Progress::Needs(needed)) => {
                self.needed = needed;
                Ok(None)
            }
            Err(e) => {
                // The stream cannot be resynchronized after a malformed frame.
                self.needed = 0;
                src.clear();
                Err(e.context("unable to decode frame"))
            }
        }
    }
}

impl Encoder<Frame> for Codec {
    type Error = anyhow::Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Frame::Simple(text) => header(dst, b'+', &text),
            Frame::Error(message) => header(dst, b'-', &message),
            Frame::Integer(number) => header(dst, b':', &number.to_string()),
            Frame::Bulk(bytes) => {
                header(dst, b'$', &bytes.len().to_string());
                dst.extend_from_slice(&bytes);
                dst.extend_from_slice(CRLF);
            }
            Frame::Null => dst.extend_from_slice(b"$-1\r\n"),
            Frame::Array(items) => {
                header(dst, b'*', &items.len().to_string());
                for item in items {
                    self.encode(item, dst)?;
                }
            }
        }
        Ok(())
    }
}

fn header(dst: &mut BytesMut, marker: u8, text: &str) {
    dst.reserve(1 + text.len() + CRLF.len());
    dst.extend_from_slice(&[marker]);
    dst.extend_from_slice(text.as_bytes());
    dst.extend_from_slice(CRLF);
}

enum Progress {
    /// A whole frame and how many bytes it spans.
    Done(Frame, usize),
    /// Only part of a frame is buffered; it spans at least this many bytes.
    Needs(usize),
}

/// Parses one frame from the front of `src`.
fn parse(src: &[u8], depth: usize) -> Result<Progress> {
    if depth > MAX_DEPTH {
        bail!("frame nesting exceeds {} levels", MAX_DEPTH);
    }

    let (line, mut consumed) = match line(src) {
        Some(line) => line,
        None => return Ok(Progress::Needs(src.len() + 1)),
    };

    let (marker, body) = line.split_first().context("missing frame type")?;

    let frame = match *marker {
        b'+' => Frame::Simple(text(body)?),
        b'-' => Frame::Error(text(body)?),
        b':' => Frame::Integer(number(body)?),
        b'$' => match usize::try_from(number(body)?) {
            Err(_) => Frame::Null,
            Ok(len) if len > MAX_BULK_LEN => {
                bail!("bulk string of {} bytes exceeds {} bytes", len, MAX_BULK_LEN)
            }
            Ok(len) => {
                let end = consumed + len + CRLF.len();
                if src.len() < end {
                    return Ok(Progress::Needs(end));
                }
                if &src[consumed + len..end] != CRLF {
                    bail!("bulk string is not terminated by CRLF");
                }
                let bulk = Bytes::copy_from_slice(&src[consumed..consumed + len]);
                consumed = end;
                Frame::Bulk(bulk)
            }
        },
        b'*' => match usize::try_from(number(body)?) {
            Err(_) => Frame::Null,
            Ok(count) => {
                let mut items = Vec::with_capacity(count.min(MAX_PREALLOC));
                for _ in 0..count {
                    match parse(&src[consumed..], depth + 1)? {
                        Progress::Done(item, used) => {
                            consumed += used;
                            items.push(item);
                        }
                        Progress::Needs(more) => return Ok(Progress::Needs(consumed + more)),
                    }
                }
                Frame::Array(items)
            }
        },
        other => bail!("unrecognized frame type: {:?}", other as char),
    };

    Ok(Progress::Done(frame, consumed))
}

fn line(src: &[u8]) -> Option<(&[u8], usize)> {
    src.windows(CRLF.len())
        .position(|window| window == CRLF)
        .map(|pos| (&src[..pos], pos + CRLF.len()))
}

fn text(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).context("frame is not valid UTF-8")
}

fn number(bytes: &[u8]) -> Result<i64> {
    std::str::from_utf8(bytes)
        .context("number is not valid UTF-8")?
        .parse()
        .context("malformed number")
}
