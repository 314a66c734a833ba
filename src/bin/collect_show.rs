#![forbid(unsafe_code)]

//! Full collection pipeline for one show: fetch the playlist (or a single
//! video), enrich each row with the show's cast heuristic, and append the
//! result to the local SQLite database.

use anyhow::{Context, Result, bail};
use libsql::Value;
use showarchive_tools::cast::overclocking_cast;
use showarchive_tools::config::{RuntimeConfig, RuntimeOverrides, resolve_runtime_config};
use showarchive_tools::logger::ErrorLog;
use showarchive_tools::processor::{Enricher, EnrichedRecord, YouTubeEnricher};
use showarchive_tools::store::VideoStore;
use showarchive_tools::youtube::YouTubeClient;
use std::env;
use std::path::PathBuf;

const DEFAULT_PLAYLIST_ID: &str = "PLcQngyvNgfmK0mOFKfVdi2RNiaJTfuL5e";
const DEFAULT_SHOW_ID: &str = "overclocking";
const DB_SUBDIR: &str = "db";
const DB_FILE: &str = "shows.db";
const LOGS_SUBDIR: &str = "logs";
const LOG_FILE: &str = "collect_show.log";

const VIDEOS_TABLE: &str = "videos";
/// Declared column order; `rows_for_insert` must produce values in the same
/// order.
const VIDEOS_SCHEMA: &str = "title TEXT, published_at TEXT, view_count INTEGER, \
     like_count INTEGER, comment_count INTEGER, link TEXT, show_id TEXT, \
     comedians TEXT, update_at TEXT";

/// Command-line flags before configuration is resolved.
#[derive(Debug, Clone, Default)]
struct CollectFlags {
    playlist_id: Option<String>,
    video_id: Option<String>,
    show_id: Option<String>,
    data_root: Option<PathBuf>,
}

impl CollectFlags {
    #[cfg(test)]
    fn from_slice(values: &[&str]) -> Result<Self> {
        Self::from_iter(values.iter().map(|value| value.to_string()))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut playlist_id: Option<String> = None;
        let mut video_id: Option<String> = None;
        let mut show_id: Option<String> = None;
        let mut data_root_override: Option<PathBuf> = None;
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--playlist=") {
                playlist_id = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--video-id=") {
                video_id = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--show-id=") {
                show_id = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--data-root=") {
                data_root_override = Some(PathBuf::from(value));
                continue;
            }

            match arg.as_str() {
                "--playlist" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--playlist requires a value"))?;
                    playlist_id = Some(value);
                }
                "--video-id" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--video-id requires a value"))?;
                    video_id = Some(value);
                }
                "--show-id" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--show-id requires a value"))?;
                    show_id = Some(value);
                }
                "--data-root" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--data-root requires a value"))?;
                    data_root_override = Some(PathBuf::from(value));
                }
                _ => {
                    bail!("unknown argument: {arg}");
                }
            }
        }

        if playlist_id.is_some() && video_id.is_some() {
            bail!("--playlist and --video-id are mutually exclusive");
        }

        Ok(Self {
            playlist_id,
            video_id,
            show_id,
            data_root: data_root_override,
        })
    }
}

#[derive(Debug, Clone)]
struct CollectArgs {
    playlist_id: String,
    video_id: Option<String>,
    show_id: String,
    api_key: String,
    data_root: PathBuf,
}

impl CollectArgs {
    fn parse() -> Result<Self> {
        let flags = CollectFlags::from_iter(env::args().skip(1))?;
        let runtime = resolve_runtime_config(RuntimeOverrides {
            data_root: flags.data_root.clone(),
            ..RuntimeOverrides::default()
        })?;
        Ok(Self::assemble(flags, runtime))
    }

    fn assemble(flags: CollectFlags, runtime: RuntimeConfig) -> Self {
        Self {
            playlist_id: flags
                .playlist_id
                .unwrap_or_else(|| DEFAULT_PLAYLIST_ID.to_string()),
            video_id: flags.video_id,
            show_id: flags.show_id.unwrap_or_else(|| DEFAULT_SHOW_ID.to_string()),
            api_key: runtime.api_key,
            data_root: runtime.data_root,
        }
    }
}

/// Converts enriched rows into positional values matching [`VIDEOS_SCHEMA`].
/// The cast list is stored as a JSON array, timestamps as RFC 3339 text.
fn rows_for_insert(records: &[EnrichedRecord]) -> Result<Vec<Vec<Value>>> {
    records
        .iter()
        .map(|record| {
            let comedians =
                serde_json::to_string(&record.comedians).context("serializing cast list")?;
            Ok(vec![
                Value::Text(record.title.clone()),
                Value::Text(record.published_at.to_rfc3339()),
                Value::Integer(record.view_count),
                Value::Integer(record.like_count),
                Value::Integer(record.comment_count),
                Value::Text(record.link.clone()),
                Value::Text(record.show_id.clone()),
                Value::Text(comedians),
                Value::Text(record.update_at.to_rfc3339()),
            ])
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CollectArgs::parse()?;
    let log = ErrorLog::new(args.data_root.join(LOGS_SUBDIR).join(LOG_FILE));
    let client = YouTubeClient::new(&args.api_key);

    let raw = if let Some(video_id) = &args.video_id {
        println!("Fetching video {video_id}");
        match client.fetch_video(video_id) {
            Ok(table) => table,
            Err(err) => {
                log.error(&format!(
                    "An error occurred while retrieving video information: {err}"
                ));
                return Err(err).context("fetching video");
            }
        }
    } else {
        println!("Fetching playlist {}", args.playlist_id);
        match client.fetch_playlist(&args.playlist_id) {
            Ok(table) => table,
            Err(err) => {
                log.error(&format!(
                    "An error occurred while retrieving playlist videos: {err}"
                ));
                return Err(err).context("fetching playlist");
            }
        }
    };

    if raw.is_empty() {
        println!("No videos found; nothing to store.");
        return Ok(());
    }
    println!("Fetched {} video(s)", raw.len());

    let enricher = YouTubeEnricher::new(&args.show_id, Box::new(overclocking_cast));
    let outcome = enricher.process(&raw);
    for failure in &outcome.failures {
        log.error(&format!(
            "Could not enrich row {}: {}",
            failure.video_id, failure.error
        ));
    }
    if !outcome.failures.is_empty() {
        println!(
            "Skipped {} row(s) that could not be enriched (see {})",
            outcome.failures.len(),
            log.path().display()
        );
    }
    if outcome.rows.is_empty() {
        bail!("no rows survived enrichment");
    }

    let db_path = args.data_root.join(DB_SUBDIR).join(DB_FILE);
    let mut store = match VideoStore::open(&db_path).await {
        Ok(store) => store.with_error_log(log.clone()),
        Err(err) => {
            log.error(&format!("Error connecting to the database: {err}"));
            return Err(err).context("opening store");
        }
    };

    let result = persist(&store, &outcome.rows, &log).await;
    store.close();
    let stored_total = result?;

    println!(
        "Stored {} row(s) for show '{}'; table now holds {} row(s) ({})",
        outcome.rows.len(),
        args.show_id,
        stored_total,
        db_path.display()
    );
    Ok(())
}

async fn persist(store: &VideoStore, records: &[EnrichedRecord], log: &ErrorLog) -> Result<i64> {
    if let Err(err) = store.create_table(VIDEOS_TABLE, VIDEOS_SCHEMA).await {
        log.error(&format!("Error creating table: {err}"));
        return Err(err).context("creating table");
    }

    let rows = rows_for_insert(records)?;
    if let Err(err) = store.insert_rows(VIDEOS_TABLE, &rows).await {
        log.error(&format!("Error inserting data: {err}"));
        return Err(err).context("inserting rows");
    }

    let count = match store
        .query(&format!("SELECT COUNT(*) FROM {VIDEOS_TABLE}"))
        .await
    {
        Ok(table) => match table.rows.first().and_then(|row| row.first()) {
            Some(Value::Integer(count)) => *count,
            _ => 0,
        },
        Err(err) => {
            log.error(&format!("Error querying data: {err}"));
            return Err(err).context("counting rows");
        }
    };
    Ok(count)
}
