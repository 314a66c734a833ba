#![forbid(unsafe_code)]

//! Turns a fetched [`RawTable`] into enriched rows ready for persistence:
//! parsed publish timestamps, canonical watch links, the show id, the cast
//! list from the injected heuristic, and a capture timestamp.

use crate::cast::{CastError, CastExtractor};
use crate::youtube::{RawTable, VideoRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub const VIDEO_LINK_BASE: &str = "https://www.youtube.com/watch?v=";

/// One processed row. `link` is derived deterministically from the video id;
/// `update_at` reflects when the processing call ran, not when the video was
/// published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRecord {
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub link: String,
    pub show_id: String,
    pub comedians: Vec<String>,
    pub update_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum RowError {
    #[error("could not parse publish timestamp: {0}")]
    Timestamp(String),
    #[error(transparent)]
    Cast(#[from] CastError),
}

/// A row that could not be enriched, kept alongside the rows that could.
#[derive(Debug)]
pub struct RowFailure {
    pub video_id: String,
    pub error: RowError,
}

/// Result of one processing pass. Row failures are isolated: a malformed row
/// lands in `failures` without discarding the rest of the table.
#[derive(Debug, Default)]
pub struct ProcessOutcome {
    pub rows: Vec<EnrichedRecord>,
    pub failures: Vec<RowFailure>,
}

/// Platform-specific enrichment contract. One variant exists today; a second
/// platform would supply its own link scheme and cast heuristic behind the
/// same trait.
pub trait Enricher {
    fn process(&self, raw: &RawTable) -> ProcessOutcome;
}

pub struct YouTubeEnricher {
    show_id: String,
    extract_cast: CastExtractor,
}

impl YouTubeEnricher {
    pub fn new(show_id: impl Into<String>, extract_cast: CastExtractor) -> Self {
        Self {
            show_id: show_id.into(),
            extract_cast,
        }
    }

    fn enrich_row(
        &self,
        record: &VideoRecord,
        update_at: DateTime<Utc>,
    ) -> Result<EnrichedRecord, RowError> {
        let published_at = DateTime::parse_from_rfc3339(&record.published_at)
            .map_err(|err| RowError::Timestamp(format!("{:?}: {err}", record.published_at)))?
            .with_timezone(&Utc);
        let comedians = (self.extract_cast)(record)?;
        Ok(EnrichedRecord {
            title: record.title.clone(),
            published_at,
            view_count: record.view_count,
            like_count: record.like_count,
            comment_count: record.comment_count,
            link: format!("{VIDEO_LINK_BASE}{}", record.video_id),
            show_id: self.show_id.clone(),
            comedians,
            update_at,
        })
    }
}

impl Enricher for YouTubeEnricher {
    fn process(&self, raw: &RawTable) -> ProcessOutcome {
        // One capture timestamp per call so every row of a run agrees.
        let update_at = Utc::now();
        let mut outcome = ProcessOutcome::default();
        for record in raw.iter() {
            match self.enrich_row(record, update_at) {
                Ok(row) => outcome.rows.push(row),
                Err(error) => outcome.failures.push(RowFailure {
                    video_id: record.video_id.clone(),
                    error,
                }),
            }
        }
        outcome
    }
}
