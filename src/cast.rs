#![forbid(unsafe_code)]

//! Per-show cast-extraction heuristics. These are content-specific text rules
//! injected into the processor, not general parsing: each show gets its own
//! function keyed to how that show formats its titles and descriptions.

use crate::youtube::VideoRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CastError {
    #[error("no cast list found in title or description")]
    NoMatch,
}

/// Injected strategy mapping one raw record to its cast list.
pub type CastExtractor = Box<dyn Fn(&VideoRecord) -> Result<Vec<String>, CastError> + Send + Sync>;

// Phrases the overclocking show uses to introduce the lineup in descriptions.
static LINEUP_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new("Сегодня разгоняли|В этот раз собрались|Сегодня разгоняют|В пилоте снялись")
        .expect("lineup marker regex")
});
static NAME_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(",| и ").expect("separator regex"));

/// Cast rule for the overclocking show. Later episodes carry the lineup as a
/// bracketed list in the title; earlier ones only mention it in the
/// description after one of the fixed marker phrases, running up to the next
/// period.
pub fn overclocking_cast(record: &VideoRecord) -> Result<Vec<String>, CastError> {
    let raw = bracketed_title_lineup(&record.title)
        .or_else(|| description_lineup(&record.description))
        .ok_or(CastError::NoMatch)?;
    let members: Vec<String> = NAME_SEPARATOR
        .split(&raw)
        .map(|member| member.trim().to_string())
        .filter(|member| !member.is_empty())
        .collect();
    if members.is_empty() {
        return Err(CastError::NoMatch);
    }
    Ok(members)
}

fn bracketed_title_lineup(title: &str) -> Option<String> {
    let start = title.find('[')?;
    let rest = &title[start + 1..];
    let end = rest.find(']')?;
    Some(rest[..end].to_string())
}

fn description_lineup(description: &str) -> Option<String> {
    let marker = LINEUP_MARKER.find(description)?;
    let tail = &description[marker.end()..];
    Some(tail.split('.').next().unwrap_or(tail).to_string())
}
