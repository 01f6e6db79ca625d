//! Loading recorded strokes from the history endpoint or a snapshot file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use inkshare_core::{StrokeTable, encode_history};
use url::Url;

use crate::app::AppError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the initial stroke history comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistorySource {
    Http(Url),
    File(PathBuf),
}

impl HistorySource {
    /// Interpret `source` as an http(s) URL, or as a file path otherwise.
    pub fn parse(source: &str) -> Result<Self, AppError> {
        match Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Http(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Self::File)
                .map_err(|_| AppError::InvalidHistorySource(source.to_string())),
            // Windows drive letters parse as one-letter schemes.
            Ok(url) if url.scheme().len() > 1 => {
                Err(AppError::InvalidHistorySource(source.to_string()))
            }
            _ => Ok(Self::File(PathBuf::from(source))),
        }
    }

    /// Read the raw history body.
    pub fn load(&self) -> Result<String, AppError> {
        match self {
            Self::Http(url) => fetch(url),
            Self::File(path) => read_file(path),
        }
    }
}

fn fetch(url: &Url) -> Result<String, AppError> {
    log::info!("Fetching stroke history from {}", url);
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()?;
    let response = client.get(url.clone()).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::HttpStatus(status));
    }
    Ok(response.text()?)
}

fn read_file(path: &Path) -> Result<String, AppError> {
    log::info!("Reading stroke history from {}", path.display());
    fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `table` as a history array that `HistorySource::File` can read back.
pub fn write_snapshot(path: &Path, table: &StrokeTable) -> Result<(), AppError> {
    let body = serde_json::to_string_pretty(&encode_history(table))?;
    fs::write(path, body).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Wrote {} strokes to {}", table.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkshare_core::{StrokeColor, decode_history};
    use kurbo::Point;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        });
        format!("http://{addr}/canvas/messages")
    }

    #[test]
    fn test_parse_source() {
        assert!(matches!(
            HistorySource::parse("http://localhost:3001/canvas/messages"),
            Ok(HistorySource::Http(_))
        ));
        assert_eq!(
            HistorySource::parse("saved/history.json").unwrap(),
            HistorySource::File(PathBuf::from("saved/history.json"))
        );
        assert!(matches!(
            HistorySource::parse("ftp://example.com/h.json"),
            Err(AppError::InvalidHistorySource(_))
        ));
    }

    #[test]
    fn test_fetch_over_http() {
        let body = r##"[{"user":"bob","id":0,"coords":[1,2,3,4],"color":"#00ff00"}]"##;
        let url = serve_once("200 OK", body);
        let loaded = HistorySource::parse(&url).unwrap().load().unwrap();
        assert_eq!(loaded, body);
    }

    #[test]
    fn test_fetch_error_status() {
        let url = serve_once("500 Internal Server Error", "oops");
        let result = HistorySource::parse(&url).unwrap().load();
        assert!(matches!(result, Err(AppError::HttpStatus(s)) if s.as_u16() == 500));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = HistorySource::File(dir.path().join("nope.json"));
        assert!(matches!(source.load(), Err(AppError::Io { .. })));
    }

    #[test]
    fn test_snapshot_reloads() {
        let mut table = StrokeTable::new();
        let color = StrokeColor::new(1, 2, 3);
        let stroke = table.get_or_create("alice", 2, color);
        stroke.push(Point::new(1.0, 1.0));
        stroke.push(Point::new(4.0, 5.0));
        table.get_or_create("bob", 0, color).push(Point::new(9.0, 9.0));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        write_snapshot(&path, &table).unwrap();

        let body = HistorySource::File(path).load().unwrap();
        let reloaded = StrokeTable::from_strokes(decode_history(&body).unwrap());
        assert_eq!(reloaded, table);
    }
}
