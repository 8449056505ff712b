//! Gap-based grouping of captured frames into motion events.
//!
//! The feeder camera only uploads frames while its motion sensor is active,
//! so a burst of frames close together in time is one animal visit. A frame
//! whose timestamp is within `max_gap` of the last accepted frame extends
//! the open event; a larger gap closes it and starts a new one.
//!
//! Grouping is deterministic in the input timestamps and `max_gap`:
//! timestamp ties only affect ordering within an event, never membership,
//! because the gap is measured from the last accepted frame.

use crate::frame_id::{self, FrameIdError};
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};

/// Default maximum spacing in seconds between consecutive frames of one
/// motion event.
pub const DEFAULT_MAX_GAP_SECS: i64 = 3;

/// A maximal run of frames whose consecutive timestamps are each within the
/// gap threshold of the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionEvent<T> {
    /// Frames in ascending timestamp order.
    pub frames: Vec<T>,
    /// Capture time of the first frame.
    pub started_at: DateTime<Utc>,
    /// Capture time of the last frame.
    pub ended_at: DateTime<Utc>,
}

impl<T> MotionEvent<T> {
    fn singleton(item: T, at: DateTime<Utc>) -> Self {
        Self {
            frames: vec![item],
            started_at: at,
            ended_at: at,
        }
    }
}

/// Group items into motion events by their timestamps.
///
/// Items arrive in any order; they are stable-sorted by timestamp first. Any
/// item whose timestamp cannot be extracted aborts the whole call; dropping
/// it would silently merge the events on either side of it.
///
/// Empty input yields no events; the trailing open event is always emitted,
/// including a trailing singleton.
pub fn group_into_events<T, F>(
    items: Vec<T>,
    max_gap: Duration,
    timestamp_of: F,
) -> Result<Vec<MotionEvent<T>>, FrameIdError>
where
    F: Fn(&T) -> Result<DateTime<Utc>, FrameIdError>,
{
    let mut stamped = Vec::with_capacity(items.len());
    for item in items {
        let at = timestamp_of(&item)?;
        stamped.push((at, item));
    }
    stamped.sort_by_key(|(at, _)| *at);

    let mut events: Vec<MotionEvent<T>> = Vec::new();
    let mut current: Option<MotionEvent<T>> = None;

    for (at, item) in stamped {
        match current.as_mut() {
            // Gap measured from the last accepted frame, not the event start.
            Some(event) if at - event.ended_at <= max_gap => {
                event.frames.push(item);
                event.ended_at = at;
            }
            _ => {
                if let Some(done) = current.take() {
                    events.push(done);
                }
                current = Some(MotionEvent::singleton(item, at));
            }
        }
    }
    if let Some(done) = current {
        events.push(done);
    }

    Ok(events)
}

/// Group frame files by the capture timestamps embedded in their names.
pub fn group_frame_files(
    files: Vec<PathBuf>,
    max_gap: Duration,
) -> Result<Vec<MotionEvent<PathBuf>>, FrameIdError> {
    group_into_events(files, max_gap, |path| frame_timestamp(path))
}

/// Decode the capture timestamp from a frame file path.
pub fn frame_timestamp(path: &Path) -> Result<DateTime<Utc>, FrameIdError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| FrameIdError::MissingTimestamp(path.display().to_string()))?;
    frame_id::decode(name)
}
