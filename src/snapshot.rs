//! Snapshot reader for browser history databases.
//!
//! The live history file is held open (and sometimes locked) by the browser,
//! so it is never queried in place. [`FrozenCopy::create`] copies it, plus
//! its `-wal` sidecar when present, into a private temporary directory;
//! [`FrozenCopy::open`] opens the copy. The directory is removed when the
//! snapshot is dropped.
//!
//! | Browser | Query |
//! |---------|-------|
//! | Firefox | one row per `moz_historyvisits` entry joined to `moz_places` |
//! | Chrome / Chromium | one row per `urls` entry by `last_visit_time` (WebKit epoch) |

use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::Browser;
use crate::error::SyncError;
use crate::fingerprint::wal_sidecar;
use crate::models::RawRecord;

const FIREFOX_QUERY: &str = r#"
    SELECT strftime('%Y-%m-%dT%H:%M:%SZ', moz_historyvisits.visit_date / 1000000, 'unixepoch'),
           moz_places.url,
           moz_places.title
    FROM moz_places, moz_historyvisits
    WHERE moz_places.id = moz_historyvisits.place_id
    ORDER BY moz_historyvisits.visit_date DESC
"#;

// Chrome stores microseconds since 1601-01-01.
const CHROME_QUERY: &str = r#"
    SELECT strftime('%Y-%m-%dT%H:%M:%SZ', (last_visit_time / 1000000) - 11644473600, 'unixepoch'),
           url,
           title
    FROM urls
    ORDER BY last_visit_time DESC
"#;

fn query_for(browser: Browser) -> &'static str {
    match browser {
        Browser::Firefox => FIREFOX_QUERY,
        Browser::Chrome | Browser::Chromium => CHROME_QUERY,
    }
}

/// The history file and its `-wal` sidecar, copied into a private temporary
/// directory. Fingerprinted before it is opened, so the change check and the
/// read see the same bytes.
pub struct FrozenCopy {
    path: PathBuf,
    dir: TempDir,
}

impl FrozenCopy {
    /// Copy `source` (and `source-wal` when present).
    ///
    /// A missing or unreadable source is [`SyncError::SourceUnavailable`];
    /// any failure while copying is [`SyncError::SourceCopyFailed`].
    pub fn create(source: &Path) -> Result<Self, SyncError> {
        std::fs::metadata(source).map_err(|e| SyncError::SourceUnavailable {
            path: source.to_path_buf(),
            source: e,
        })?;
        let copy_failed = |source_err| SyncError::SourceCopyFailed {
            path: source.to_path_buf(),
            source: source_err,
        };

        let dir = tempfile::Builder::new()
            .prefix("hsync-")
            .tempdir()
            .map_err(copy_failed)?;

        let file_name = source
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "history.sqlite".into());
        let path = dir.path().join(&file_name);
        std::fs::copy(source, &path).map_err(copy_failed)?;

        let wal = wal_sidecar(source);
        if wal.is_file() {
            std::fs::copy(&wal, wal_sidecar(&path)).map_err(copy_failed)?;
        }

        Ok(Self { path, dir })
    }

    /// Main database file inside the copy.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the copy for querying. The temporary directory lives as long as
    /// the returned snapshot.
    pub async fn open(self, browser: Browser) -> Result<Snapshot, SyncError> {
        let conn = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(false)
            .connect()
            .await
            .map_err(SyncError::SourceQueryFailed)?;

        Ok(Snapshot {
            conn,
            browser,
            _dir: self.dir,
        })
    }
}

/// An isolated, read-only view of a history database.
pub struct Snapshot {
    conn: SqliteConnection,
    browser: Browser,
    _dir: TempDir,
}

impl Snapshot {
    /// Copy `source` into a temporary directory and open the copy.
    pub async fn open(source: &Path, browser: Browser) -> Result<Self, SyncError> {
        FrozenCopy::create(source)?.open(browser).await
    }

    /// Visit records, newest first, at most `max` of them.
    ///
    /// Rows without a visit time are skipped; a missing title becomes an
    /// empty label.
    pub fn records(&mut self, max: usize) -> BoxStream<'_, Result<RawRecord, SyncError>> {
        sqlx::query_as::<_, (Option<String>, String, Option<String>)>(query_for(self.browser))
            .fetch(&mut self.conn)
            .map_err(SyncError::SourceQueryFailed)
            .try_filter_map(|(timestamp, locator, title)| async move {
                Ok(timestamp.map(|timestamp| RawRecord {
                    timestamp,
                    locator,
                    label: title.unwrap_or_default(),
                }))
            })
            .take(max)
            .boxed()
    }

    pub async fn close(self) -> Result<(), SyncError> {
        self.conn
            .close()
            .await
            .map_err(SyncError::SourceQueryFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn firefox_history(path: &Path, visits: &[(i64, &str, Option<&str>)]) {
        let mut conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();
        sqlx::query("CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url TEXT, title TEXT)")
            .execute(&mut conn)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE moz_historyvisits (id INTEGER PRIMARY KEY, place_id INTEGER, visit_date INTEGER)",
        )
        .execute(&mut conn)
        .await
        .unwrap();
        for (i, (secs, url, title)) in visits.iter().enumerate() {
            sqlx::query("INSERT INTO moz_places (id, url, title) VALUES (?, ?, ?)")
                .bind(i as i64 + 1)
                .bind(url)
                .bind(title)
                .execute(&mut conn)
                .await
                .unwrap();
            sqlx::query("INSERT INTO moz_historyvisits (place_id, visit_date) VALUES (?, ?)")
                .bind(i as i64 + 1)
                .bind(secs * 1_000_000)
                .execute(&mut conn)
                .await
                .unwrap();
        }
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn firefox_newest_first_and_bounded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("places.sqlite");
        firefox_history(
            &path,
            &[
                (1_456_833_600, "http://a.com", Some("A")),
                (1_456_833_700, "http://b.com", None),
                (1_456_833_800, "http://c.com", Some("C")),
            ],
        )
        .await;

        let mut snap = Snapshot::open(&path, Browser::Firefox).await.unwrap();
        let records: Vec<RawRecord> = snap.records(2).try_collect().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].locator, "http://c.com");
        assert_eq!(records[0].timestamp, "2016-03-01T12:03:20Z");
        assert_eq!(records[1].locator, "http://b.com");
        assert_eq!(records[1].label, "");
        snap.close().await.unwrap();
    }

    #[tokio::test]
    async fn chrome_webkit_epoch() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("History");
        let mut conn = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();
        sqlx::query("CREATE TABLE urls (id INTEGER PRIMARY KEY, url TEXT, title TEXT, last_visit_time INTEGER)")
            .execute(&mut conn)
            .await
            .unwrap();
        sqlx::query("INSERT INTO urls (url, title, last_visit_time) VALUES (?, ?, ?)")
            .bind("https://rust-lang.org")
            .bind("Rust")
            .bind((1_456_833_600_i64 + 11_644_473_600) * 1_000_000)
            .execute(&mut conn)
            .await
            .unwrap();
        conn.close().await.unwrap();

        let mut snap = Snapshot::open(&path, Browser::Chrome).await.unwrap();
        let records: Vec<RawRecord> = snap.records(10).try_collect().await.unwrap();
        assert_eq!(
            records,
            vec![RawRecord {
                timestamp: "2016-03-01T12:00:00Z".into(),
                locator: "https://rust-lang.org".into(),
                label: "Rust".into(),
            }]
        );
    }

    #[tokio::test]
    async fn missing_source_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let err = Snapshot::open(&tmp.path().join("gone.sqlite"), Browser::Firefox)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SyncError::SourceUnavailable { .. }));
    }

    #[test]
    fn directory_source_is_copy_failure() {
        let tmp = TempDir::new().unwrap();
        let err = FrozenCopy::create(tmp.path()).err().unwrap();
        assert!(matches!(err, SyncError::SourceCopyFailed { .. }));
    }

    #[test]
    fn copy_includes_wal_sidecar() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("places.sqlite");
        std::fs::write(&path, b"main").unwrap();
        std::fs::write(wal_sidecar(&path), b"frames").unwrap();

        let frozen = FrozenCopy::create(&path).unwrap();
        assert_ne!(frozen.path(), path.as_path());
        assert_eq!(std::fs::read(frozen.path()).unwrap(), b"main");
        assert_eq!(std::fs::read(wal_sidecar(frozen.path())).unwrap(), b"frames");
    }

    #[tokio::test]
    async fn wrong_schema_is_query_failure() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("places.sqlite");
        firefox_history(&path, &[]).await;

        let mut snap = Snapshot::open(&path, Browser::Chrome).await.unwrap();
        let result: Result<Vec<RawRecord>, SyncError> = snap.records(10).try_collect().await;
        assert!(matches!(result, Err(SyncError::SourceQueryFailed(_))));
    }
}
