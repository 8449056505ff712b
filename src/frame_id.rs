//! Frame identifier encoding and decoding.
//!
//! Accepted frames are persisted as PNG files whose names carry everything
//! the curation tools later need: the UTC capture time, the predicted label,
//! and the classifier confidence, e.g.
//!
//! ```text
//! frame_time-utc-2024-10-02T15-54-54_prediction-cat_confidence-percent-97.png
//! ```
//!
//! Only the timestamp is load-bearing for decoding; label and confidence are
//! informational. A frame identifier without a parseable timestamp is a hard
//! error, never a skip: a defaulted timestamp would land the frame in the
//! wrong motion event.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// Marker that precedes the UTC timestamp inside a frame identifier.
const TIME_MARKER: &str = "time-utc-";

/// Timestamp layout inside a frame identifier. Second resolution; colons are
/// replaced with dashes so the identifier stays filesystem-safe.
const TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Encoded timestamp width in bytes (`2024-10-02T15-54-54`).
const TIME_WIDTH: usize = 19;

/// Errors that can occur while decoding a frame identifier.
#[derive(Debug, Error)]
pub enum FrameIdError {
    #[error("frame identifier carries no 'time-utc-' timestamp: {0}")]
    MissingTimestamp(String),

    #[error("frame identifier timestamp '{found}' does not parse: {source}")]
    InvalidTimestamp {
        found: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Extract the UTC capture time embedded in a frame identifier.
///
/// The `time-utc-` marker may sit anywhere in the identifier, so full paths
/// decode as well as bare file names.
pub fn decode(identifier: &str) -> Result<DateTime<Utc>, FrameIdError> {
    let start = identifier
        .find(TIME_MARKER)
        .map(|at| at + TIME_MARKER.len())
        .ok_or_else(|| FrameIdError::MissingTimestamp(identifier.to_string()))?;

    // Fixed-width ASCII timestamp follows the marker.
    let raw = identifier
        .get(start..start + TIME_WIDTH)
        .ok_or_else(|| FrameIdError::MissingTimestamp(identifier.to_string()))?;

    let naive =
        NaiveDateTime::parse_from_str(raw, TIME_FORMAT).map_err(|source| {
            FrameIdError::InvalidTimestamp {
                found: raw.to_string(),
                source,
            }
        })?;

    Ok(naive.and_utc())
}

/// Build a frame file name embedding capture time, predicted label, and an
/// integer confidence percentage (0–100).
///
/// `decode(encode(t, ..))` recovers `t` exactly. The label must be a single
/// token without underscores; underscores delimit the identifier's fields.
pub fn encode(timestamp: DateTime<Utc>, label: &str, confidence_percent: u8) -> String {
    format!(
        "frame_{}{}_prediction-{}_confidence-percent-{}.png",
        TIME_MARKER,
        timestamp.format(TIME_FORMAT),
        label,
        confidence_percent,
    )
}
