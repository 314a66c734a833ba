#![forbid(unsafe_code)]

//! Fetches every video of a show's playlist and writes the raw metadata CSV
//! under `<data_root>/raw_data/`. This is the collection half of the pipeline;
//! `collect_show` adds enrichment and persistence.

use anyhow::{Context, Result, bail};
use showarchive_tools::config::{RuntimeConfig, RuntimeOverrides, resolve_runtime_config};
use showarchive_tools::logger::ErrorLog;
use showarchive_tools::youtube::YouTubeClient;
use std::env;
use std::path::PathBuf;

const DEFAULT_PLAYLIST_ID: &str = "PLcQngyvNgfmK0mOFKfVdi2RNiaJTfuL5e";
const DEFAULT_SHOW_ID: &str = "overclocking";
const RAW_DATA_SUBDIR: &str = "raw_data";
const LOGS_SUBDIR: &str = "logs";
const LOG_FILE: &str = "youtube_fetcher.log";

/// Command-line flags before configuration is resolved; `None` means "use
/// the default or whatever the environment provides".
#[derive(Debug, Clone, Default)]
struct ExportFlags {
    playlist_id: Option<String>,
    show_id: Option<String>,
    data_root: Option<PathBuf>,
}

impl ExportFlags {
    #[cfg(test)]
    fn from_slice(values: &[&str]) -> Result<Self> {
        Self::from_iter(values.iter().map(|value| value.to_string()))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut playlist_id: Option<String> = None;
        let mut show_id: Option<String> = None;
        let mut data_root_override: Option<PathBuf> = None;
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--playlist=") {
                playlist_id = Some(value.to_string());
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

        Ok(Self {
            playlist_id,
            show_id,
            data_root: data_root_override,
        })
    }
}

#[derive(Debug, Clone)]
struct ExportArgs {
    playlist_id: String,
    show_id: String,
    api_key: String,
    data_root: PathBuf,
}

impl ExportArgs {
    fn parse() -> Result<Self> {
        let flags = ExportFlags::from_iter(env::args().skip(1))?;
        let runtime = resolve_runtime_config(RuntimeOverrides {
            data_root: flags.data_root.clone(),
            ..RuntimeOverrides::default()
        })?;
        Ok(Self::assemble(flags, runtime))
    }

    fn assemble(flags: ExportFlags, runtime: RuntimeConfig) -> Self {
        Self {
            playlist_id: flags
                .playlist_id
                .unwrap_or_else(|| DEFAULT_PLAYLIST_ID.to_string()),
            show_id: flags.show_id.unwrap_or_else(|| DEFAULT_SHOW_ID.to_string()),
            api_key: runtime.api_key,
            data_root: runtime.data_root,
        }
    }
}

fn main() -> Result<()> {
    let args = ExportArgs::parse()?;
    let log = ErrorLog::new(args.data_root.join(LOGS_SUBDIR).join(LOG_FILE));
    let client = YouTubeClient::new(&args.api_key);

    println!("Fetching playlist {}", args.playlist_id);
    let table = match client.fetch_playlist(&args.playlist_id) {
        Ok(table) => table,
        Err(err) => {
            log.error(&format!(
                "An error occurred while retrieving playlist videos: {err}"
            ));
            return Err(err).context("fetching playlist");
        }
    };

    if table.is_empty() {
        println!("Playlist {} has no videos; nothing written.", args.playlist_id);
        return Ok(());
    }

    let output = args
        .data_root
        .join(RAW_DATA_SUBDIR)
        .join(format!("info_{}.csv", args.show_id));
    table
        .write_csv(&output)
        .with_context(|| format!("writing {}", output.display()))?;

    println!("Wrote {} video(s) to {}", table.len(), output.display());
    Ok(())
}
