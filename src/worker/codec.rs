//! Line codec for the worker's three pipes.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so that
//! a shell printing an unterminated flood of bytes cannot exhaust memory.
//!
//! A framing error surfaced from a `FramedRead` makes the stream yield `None`
//! on the following poll, which is indistinguishable from EOF. Bad lines are
//! therefore dropped by the decoder itself instead of being returned.
//!
//! Use [`WorkerCodec`] with [`tokio_util::codec::FramedRead`] over the
//! worker's stdout and stderr, and with [`tokio_util::codec::FramedWrite`]
//! over its stdin.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};
use tracing::warn;

use crate::{AppError, Result};

/// Maximum line length accepted from the worker: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// UTF-8 line codec used on every worker pipe.
///
/// # Decoder
///
/// Yields each `\n`-terminated line without its terminator (a trailing `\r`
/// is dropped as well). Bytes after the last newline are held until more
/// data arrives or the stream ends. Lines longer than [`MAX_LINE_BYTES`] or
/// containing invalid UTF-8 are logged and skipped inside the decoder, so a
/// single bad line never ends the stream. Other I/O errors yield
/// [`AppError::Io`].
///
/// # Encoder
///
/// Encodes `item` as `item\n`.
#[derive(Debug)]
pub struct WorkerCodec(LinesCodec);

impl WorkerCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for WorkerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for WorkerCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.0.decode(src).map_err(map_codec_error) {
                Err(AppError::Framing(msg)) => warn!(error = %msg, "worker codec: skipping line"),
                other => return other,
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.0.decode_eof(src).map_err(map_codec_error) {
                Err(AppError::Framing(msg)) => warn!(error = %msg, "worker codec: skipping line"),
                other => return other,
            }
        }
    }
}

impl Encoder<String> for WorkerCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Framing(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(io_err) if io_err.kind() == std::io::ErrorKind::InvalidData => {
            AppError::Framing(format!("invalid utf-8: {io_err}"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
