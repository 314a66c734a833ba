#![forbid(unsafe_code)]

//! Client for the YouTube Data API v3. Fetches snippet and statistics parts
//! for single videos or whole playlists and materializes them into the flat
//! [`RawTable`] the rest of the pipeline consumes.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const API_PARTS: &str = "snippet,statistics";
/// Page size for playlistItems.list and the documented ceiling on the number
/// of ids accepted by a single videos.list call.
pub const PAGE_SIZE: usize = 50;

/// Column order of [`RawTable`], also used as the CSV header.
pub const RAW_COLUMNS: [&str; 7] = [
    "video_id",
    "title",
    "published_at",
    "view_count",
    "like_count",
    "comment_count",
    "description",
];

/// What went wrong talking to the API. Quota exhaustion shows up as `Api`
/// with status 403, the same way the platform reports it.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed API response: {0}")]
    MalformedResponse(String),
}

/// One video's metadata as produced from a single API item. Immutable once
/// materialized; counts missing from the API (channels can disable likes or
/// comments) are stored as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub published_at: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub description: String,
}

/// Ordered collection of [`VideoRecord`]s with the fixed column set of
/// [`RAW_COLUMNS`]. Created per fetch call and replaced wholesale by each
/// pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub records: Vec<VideoRecord>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VideoRecord> {
        self.records.iter()
    }

    /// Renders the table as CSV with a header row. Cells containing commas,
    /// quotes, or newlines get minimal RFC 4180 quoting.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_csv_row(&mut out, RAW_COLUMNS.iter().copied());
        for record in &self.records {
            let view_count = record.view_count.to_string();
            let like_count = record.like_count.to_string();
            let comment_count = record.comment_count.to_string();
            push_csv_row(
                &mut out,
                [
                    record.video_id.as_str(),
                    record.title.as_str(),
                    record.published_at.as_str(),
                    view_count.as_str(),
                    like_count.as_str(),
                    comment_count.as_str(),
                    record.description.as_str(),
                ]
                .into_iter(),
            );
        }
        out
    }

    /// Writes the CSV artifact, creating the parent directory if needed.
    pub fn write_csv(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_csv())
    }
}

fn push_csv_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        let needs_quote = cell.contains(',')
            || cell.contains('"')
            || cell.contains('\n')
            || cell.contains('\r');
        if needs_quote {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}

// Wire models. Only the fields we read are declared; statistics counts come
// back as decimal strings and may be absent entirely.

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: Snippet,
    #[serde(default)]
    statistics: Statistics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    published_at: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    video_id: String,
}

fn parse_count(value: Option<String>) -> i64 {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(0)
}

fn records_from_items(items: Vec<VideoItem>) -> Vec<VideoRecord> {
    items
        .into_iter()
        .map(|item| VideoRecord {
            video_id: item.id,
            title: item.snippet.title,
            published_at: item.snippet.published_at,
            view_count: parse_count(item.statistics.view_count),
            like_count: parse_count(item.statistics.like_count),
            comment_count: parse_count(item.statistics.comment_count),
            description: item.snippet.description,
        })
        .collect()
}

/// Drives cursor pagination over playlistItems.list until no further page
/// token is returned, collecting video ids in playlist order. Factored over a
/// page-fetching closure so tests can feed canned pages.
fn collect_playlist_ids(
    mut fetch_page: impl FnMut(Option<&str>) -> Result<PlaylistItemsResponse, FetchError>,
) -> Result<Vec<String>, FetchError> {
    let mut ids = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = fetch_page(token.as_deref())?;
        ids.extend(
            page.items
                .into_iter()
                .map(|item| item.content_details.video_id),
        );
        match page.next_page_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => break,
        }
    }
    Ok(ids)
}

/// Issues one videos.list call per chunk of at most [`PAGE_SIZE`] ids and
/// concatenates the results in request order.
fn fetch_videos_chunked(
    ids: &[String],
    mut fetch_chunk: impl FnMut(&[String]) -> Result<Vec<VideoItem>, FetchError>,
) -> Result<Vec<VideoRecord>, FetchError> {
    let mut records = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(PAGE_SIZE) {
        records.extend(records_from_items(fetch_chunk(chunk)?));
    }
    Ok(records)
}

/// Blocking YouTube Data API client. One instance per run; holds the API key
/// and a reusable HTTP agent.
pub struct YouTubeClient {
    agent: ureq::Agent,
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, YOUTUBE_API_BASE)
    }

    /// Points the client at an alternative API root, e.g. a local fixture
    /// server.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            agent: ureq::agent(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Fetches metadata for one video. The result has exactly one row for a
    /// valid id; an unknown id yields an empty table because the API simply
    /// returns no items for it.
    pub fn fetch_video(&self, video_id: &str) -> Result<RawTable, FetchError> {
        self.fetch_videos(&[video_id.to_string()])
    }

    /// Fetches metadata for every item of a playlist, preserving playlist
    /// order across pages.
    pub fn fetch_playlist(&self, playlist_id: &str) -> Result<RawTable, FetchError> {
        let ids = collect_playlist_ids(|token| self.playlist_page(playlist_id, token))?;
        self.fetch_videos(&ids)
    }

    /// Batch metadata fetch, chunked at the per-request id ceiling.
    pub fn fetch_videos(&self, ids: &[String]) -> Result<RawTable, FetchError> {
        let records = fetch_videos_chunked(ids, |chunk| self.videos_page(chunk))?;
        Ok(RawTable { records })
    }

    fn videos_page(&self, ids: &[String]) -> Result<Vec<VideoItem>, FetchError> {
        let joined = ids.join(",");
        let response: VideoListResponse =
            self.get_json("videos", &[("part", API_PARTS), ("id", joined.as_str())])?;
        Ok(response.items)
    }

    fn playlist_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemsResponse, FetchError> {
        let max_results = PAGE_SIZE.to_string();
        let mut query = vec![
            ("part", "contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        self.get_json("playlistItems", &query)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self.agent.get(&url).query("key", &self.api_key);
        for (name, value) in query {
            request = request.query(name, value);
        }
        let response = request.call().map_err(|err| match err {
            ureq::Error::Status(status, response) => FetchError::Api {
                status,
                message: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(transport) => FetchError::Network(transport.to_string()),
        })?;
        response
            .into_json::<T>()
            .map_err(|err| FetchError::MalformedResponse(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn playlist_page_value(ids: &[&str], next: Option<&str>) -> serde_json::Value {
        let items: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| serde_json::json!({"contentDetails": {"videoId": id}}))
            .collect();
        let mut value = serde_json::json!({"items": items});
        if let Some(token) = next {
            value["nextPageToken"] = serde_json::json!(token);
        }
        value
    }

    fn playlist_page_json(ids: &[&str], next: Option<&str>) -> PlaylistItemsResponse {
        serde_json::from_value(playlist_page_value(ids, next)).unwrap()
    }

    fn video_item_value(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "snippet": {
                "title": format!("Episode {id}"),
                "publishedAt": "2023-03-01T12:00:00Z",
                "description": format!("About {id}")
            },
            "statistics": {
                "viewCount": "1000",
                "likeCount": "50",
                "commentCount": "7"
            }
        })
    }

    fn video_item_json(id: &str) -> VideoItem {
        serde_json::from_value(video_item_value(id)).unwrap()
    }

    /// One-shot HTTP fixture: serves the canned responses in order, one
    /// connection each, and hands back the request line every call produced.
    fn fixture_server(
        responses: Vec<(u16, String)>,
    ) -> (String, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut request_lines = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut raw = Vec::new();
                let mut byte = [0u8; 1];
                while !raw.ends_with(b"\r\n\r\n") {
                    if stream.read(&mut byte).unwrap() == 0 {
                        break;
                    }
                    raw.push(byte[0]);
                }
                let request = String::from_utf8_lossy(&raw);
                request_lines.push(request.lines().next().unwrap_or_default().to_string());

                let reason = match status {
                    200 => "OK",
                    403 => "Forbidden",
                    _ => "Error",
                };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
            request_lines
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn collect_playlist_ids_spans_pages_in_order() {
        // 3-item playlist split across two pages.
        let mut requested_tokens = Vec::new();
        let ids = collect_playlist_ids(|token| {
            requested_tokens.push(token.map(str::to_owned));
            Ok(match token {
                None => playlist_page_json(&["a", "b"], Some("page2")),
                Some("page2") => playlist_page_json(&["c"], None),
                Some(other) => panic!("unexpected token {other}"),
            })
        })
        .unwrap();

        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(requested_tokens, vec![None, Some("page2".to_string())]);
    }

    #[test]
    fn collect_playlist_ids_stops_on_empty_token() {
        let ids = collect_playlist_ids(|_| Ok(playlist_page_json(&["only"], Some("")))).unwrap();
        assert_eq!(ids, vec!["only"]);
    }

    #[test]
    fn collect_playlist_ids_propagates_page_errors() {
        let err = collect_playlist_ids(|_| {
            Err(FetchError::Api {
                status: 403,
                message: "quotaExceeded".into(),
            })
        })
        .unwrap_err();
        assert!(matches!(err, FetchError::Api { status: 403, .. }));
    }

    #[test]
    fn fetch_videos_chunked_splits_at_page_size() {
        let ids: Vec<String> = (0..120).map(|i| format!("vid{i}")).collect();
        let mut chunk_sizes = Vec::new();
        let records = fetch_videos_chunked(&ids, |chunk| {
            chunk_sizes.push(chunk.len());
            Ok(chunk.iter().map(|id| video_item_json(id)).collect())
        })
        .unwrap();

        assert_eq!(chunk_sizes, vec![50, 50, 20]);
        assert_eq!(records.len(), 120);
        assert_eq!(records[0].video_id, "vid0");
        assert_eq!(records[119].video_id, "vid119");
    }

    #[test]
    fn fetch_videos_chunked_empty_input_makes_no_requests() {
        let records = fetch_videos_chunked(&[], |_| panic!("should not be called")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn records_from_items_maps_every_column() {
        let records = records_from_items(vec![video_item_json("abc123")]);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.video_id, "abc123");
        assert_eq!(record.title, "Episode abc123");
        assert_eq!(record.published_at, "2023-03-01T12:00:00Z");
        assert_eq!(record.view_count, 1000);
        assert_eq!(record.like_count, 50);
        assert_eq!(record.comment_count, 7);
        assert_eq!(record.description, "About abc123");
    }

    #[test]
    fn records_from_items_defaults_missing_statistics() {
        // Channels can disable likes/comments; the API then omits the counts.
        let item: VideoItem = serde_json::from_value(serde_json::json!({
            "id": "bare",
            "snippet": {
                "title": "No stats",
                "publishedAt": "2020-01-01T00:00:00Z"
            }
        }))
        .unwrap();
        let records = records_from_items(vec![item]);
        assert_eq!(records[0].view_count, 0);
        assert_eq!(records[0].like_count, 0);
        assert_eq!(records[0].comment_count, 0);
        assert_eq!(records[0].description, "");
    }

    #[test]
    fn csv_output_has_header_and_escaping() {
        let table = RawTable {
            records: vec![VideoRecord {
                video_id: "x1".into(),
                title: "Pilot, with \"guests\"".into(),
                published_at: "2023-03-01T12:00:00Z".into(),
                view_count: 10,
                like_count: 2,
                comment_count: 1,
                description: "line one\nline two".into(),
            }],
        };
        let csv = table.to_csv();
        let mut lines = csv.splitn(2, '\n');
        assert_eq!(
            lines.next().unwrap(),
            "video_id,title,published_at,view_count,like_count,comment_count,description"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("\"Pilot, with \"\"guests\"\"\""));
        assert!(row.contains("\"line one\nline two\""));
    }

    #[test]
    fn write_csv_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw_data/info_show.csv");
        let table = RawTable::default();
        table.write_csv(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("video_id,"));
    }

    #[test]
    fn fetch_video_returns_one_row_matching_the_requested_id() {
        let body = serde_json::json!({"items": [video_item_value("abc123")]}).to_string();
        let (base_url, server) = fixture_server(vec![(200, body)]);
        let client = YouTubeClient::with_base_url("test-key", base_url);

        let table = client.fetch_video("abc123").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].video_id, "abc123");
        assert_eq!(table.records[0].view_count, 1000);

        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("GET /videos?"));
        assert!(requests[0].contains("key=test-key"));
        assert!(requests[0].contains("id=abc123"));
        assert!(requests[0].contains("part=snippet"));
    }

    #[test]
    fn fetch_playlist_drives_both_endpoints_in_order() {
        let page = playlist_page_value(&["a", "b"], None).to_string();
        let videos = serde_json::json!({
            "items": [video_item_value("a"), video_item_value("b")]
        })
        .to_string();
        let (base_url, server) = fixture_server(vec![(200, page), (200, videos)]);
        let client = YouTubeClient::with_base_url("k", base_url);

        let table = client.fetch_playlist("PLfixture").unwrap();
        let ids: Vec<&str> = table.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("GET /playlistItems?"));
        assert!(requests[0].contains("playlistId=PLfixture"));
        assert!(requests[0].contains("maxResults=50"));
        assert!(requests[1].starts_with("GET /videos?"));
    }

    #[test]
    fn non_success_status_surfaces_as_api_error_with_body() {
        let body = r#"{"error": {"message": "quotaExceeded"}}"#.to_string();
        let (base_url, server) = fixture_server(vec![(403, body)]);
        let client = YouTubeClient::with_base_url("k", base_url);

        let err = client.fetch_video("abc123").unwrap_err();
        match err {
            FetchError::Api { status, message } => {
                assert_eq!(status, 403);
                assert!(message.contains("quotaExceeded"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn undecodable_body_surfaces_as_malformed_response() {
        let (base_url, server) = fixture_server(vec![(200, "not json".to_string())]);
        let client = YouTubeClient::with_base_url("k", base_url);

        let err = client.fetch_video("abc123").unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
        server.join().unwrap();
    }
}
