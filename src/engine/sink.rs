//! Utilities for creating `rodio` sinks and sources from file paths.
//!
//! The helpers encapsulate opening/decoding a file and preparing a paused
//! `Sink` at the requested start position. Failures are returned, not
//! panicked: an unreadable file must never take the engine thread down.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use rodio::source::SkipDuration;
use rodio::{Decoder, OutputStream, Sink, Source};
use thiserror::Error;

#[derive(Debug, Error)]
pub(super) enum SinkError {
    #[error("could not open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("could not decode {path}: {source}")]
    Decode {
        path: String,
        source: rodio::decoder::DecoderError,
    },
}

pub(super) type FileSource = SkipDuration<Decoder<BufReader<File>>>;

/// Decode `path` into a playable source starting at `start_at`, along with
/// the track's total duration when the container reports one.
pub(super) fn open_source(
    path: &Path,
    start_at: Duration,
) -> Result<(FileSource, Option<Duration>), SinkError> {
    let file = File::open(path).map_err(|source| SinkError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|source| SinkError::Decode {
        path: path.display().to_string(),
        source,
    })?;
    let total = decoder.total_duration();
    // `skip_duration` is the seeking primitive; even Duration::ZERO is fine.
    Ok((decoder.skip_duration(start_at), total))
}

/// Create a paused `Sink` for `path` that starts playback at `start_at`.
pub(super) fn create_sink_at(
    handle: &OutputStream,
    path: &Path,
    start_at: Duration,
) -> Result<(Sink, Option<Duration>), SinkError> {
    let (source, total) = open_source(path, start_at)?;
    let sink = Sink::connect_new(handle.mixer());
    sink.append(source);
    sink.pause();
    Ok((sink, total))
}
