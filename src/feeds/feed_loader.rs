use crate::feeds::error::FeedError;
use crate::types::station::{FeedDocument, StationInformation, StationStatus};
use futures_util::TryStreamExt;
use log::{info, warn};
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tokio::task;
use tokio_util::io::StreamReader;

pub const DEFAULT_STATUS_URL: &str =
    "https://velib-metropole-opendata.smovengo.cloud/opendata/Velib_Metropole/station_status.json";
pub const DEFAULT_INFORMATION_URL: &str =
    "https://velib-metropole-opendata.smovengo.cloud/opendata/Velib_Metropole/station_information.json";

/// Where a GBFS document is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Http(String),
    File(PathBuf),
}

impl From<&str> for FeedSource {
    /// `http://` and `https://` locations are fetched, anything else is a local path.
    fn from(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            FeedSource::Http(location.to_string())
        } else {
            FeedSource::File(PathBuf::from(location))
        }
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Http(url) => write!(f, "{}", url),
            FeedSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Reads the two live station feeds.
#[derive(Debug, Clone)]
pub struct FeedLoader {
    client: Client,
    status: FeedSource,
    information: FeedSource,
}

impl FeedLoader {
    pub fn new(status: FeedSource, information: FeedSource) -> Self {
        Self::with_client(Client::new(), status, information)
    }

    /// Uses `client` for HTTP feeds, e.g. one with custom timeouts or proxies.
    pub fn with_client(client: Client, status: FeedSource, information: FeedSource) -> Self {
        Self {
            client,
            status,
            information,
        }
    }

    pub async fn fetch_station_status(&self) -> Result<Vec<StationStatus>, FeedError> {
        let bytes = self.fetch_bytes(&self.status).await?;
        let feed = self.status.to_string();
        let stations = task::spawn_blocking(move || {
            serde_json::from_slice::<FeedDocument<StationStatus>>(&bytes)
                .map(|document| document.data.stations)
                .map_err(|e| FeedError::Decode(feed, e))
        })
        .await??;
        info!("Loaded {} station status records", stations.len());
        Ok(stations)
    }

    pub async fn fetch_station_information(&self) -> Result<Vec<StationInformation>, FeedError> {
        let bytes = self.fetch_bytes(&self.information).await?;
        let feed = self.information.to_string();
        let stations = task::spawn_blocking(move || {
            let document = serde_json::from_slice::<FeedDocument<Value>>(&bytes)
                .map_err(|e| FeedError::Decode(feed.clone(), e))?;
            document
                .data
                .stations
                .into_iter()
                .enumerate()
                .map(|(index, record)| {
                    StationInformation::from_value(record).map_err(|source| {
                        FeedError::InvalidStation {
                            feed: feed.clone(),
                            index,
                            source,
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .await??;
        info!("Loaded {} station information records", stations.len());
        Ok(stations)
    }

    async fn fetch_bytes(&self, source: &FeedSource) -> Result<Vec<u8>, FeedError> {
        match source {
            FeedSource::Http(url) => self.download(url).await,
            FeedSource::File(path) => {
                info!("Reading feed from {}", path.display());
                tokio::fs::read(path)
                    .await
                    .map_err(|e| FeedError::FileRead(path.clone(), e))
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        info!("Downloading feed from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::NetworkRequest(url.to_string(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(match e.status() {
                    Some(status) => FeedError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    },
                    None => FeedError::NetworkRequest(url.to_string(), e),
                });
            }
        };

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let mut reader = StreamReader::new(stream);
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .await
            .map_err(|e| FeedError::DownloadIo(url.to_string(), e))?;
        info!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn write_feed(dir: &Path, name: &str, document: Value) -> FeedSource {
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();
        FeedSource::File(path)
    }

    /// Answers a single HTTP request on a local port and returns its URL.
    async fn serve_once(status_line: &'static str, body: String) -> FeedSource {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/station_status.json", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request: Vec<u8> = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        FeedSource::Http(url)
    }

    fn local_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    #[test]
    fn test_source_from_location() {
        assert_eq!(
            FeedSource::from("https://example.org/status.json"),
            FeedSource::Http("https://example.org/status.json".to_string())
        );
        assert_eq!(
            FeedSource::from("feeds/status.json"),
            FeedSource::File(PathBuf::from("feeds/status.json"))
        );
    }

    #[tokio::test]
    async fn test_fetch_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let status = write_feed(
            dir.path(),
            "status.json",
            json!({"lastUpdatedOther": 0, "data": {"stations": [{
                "station_id": 16107,
                "num_bikes_available": 3,
                "num_docks_available": 32,
                "num_bikes_available_types": [{"mechanical": 2}, {"ebike": 1}]
            }]}}),
        );
        let information = write_feed(
            dir.path(),
            "information.json",
            json!({"data": {"stations": [{
                "station_id": 16107,
                "name": "Benjamin Godard - Victor Hugo",
                "lat": 48.865983,
                "lon": 2.275725,
                "capacity": 35
            }]}}),
        );
        let loader = FeedLoader::new(status, information);

        let statuses = loader.fetch_station_status().await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].mechanical_count(), 2);

        let stations = loader.fetch_station_information().await.unwrap();
        assert_eq!(stations[0].station_id, 16107);
        assert_eq!(stations[0].base["capacity"], json!(35));
    }

    #[tokio::test]
    async fn test_http_status_feed() {
        let body = json!({"lastUpdatedOther": 0, "data": {"stations": [{
            "station_id": "213688169",
            "num_bikes_available": 5,
            "num_docks_available": 30,
            "num_bikes_available_types": [{"mechanical": 4}, {"ebike": 1}]
        }]}});
        let status = serve_once("200 OK", body.to_string()).await;
        let loader = FeedLoader::with_client(local_client(), status, FeedSource::from("unused"));

        let statuses = loader.fetch_station_status().await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].mechanical_count(), 4);
        assert_eq!(statuses[0].ebike_count(), 1);
    }

    #[tokio::test]
    async fn test_http_error_status_is_fetch_failure() {
        let status = serve_once("503 Service Unavailable", "{}".to_string()).await;
        let loader = FeedLoader::with_client(local_client(), status, FeedSource::from("unused"));

        let err = loader.fetch_station_status().await.unwrap_err();
        match &err {
            FeedError::HttpStatus { status, .. } => {
                assert_eq!(*status, reqwest::StatusCode::SERVICE_UNAVAILABLE)
            }
            other => panic!("expected an HTTP status error, got {other:?}"),
        }
        assert!(crate::error::VelostatError::from(err).is_fetch_failure());
    }

    #[tokio::test]
    async fn test_invalid_station_record() {
        let dir = tempfile::tempdir().unwrap();
        let information = write_feed(
            dir.path(),
            "information.json",
            json!({"data": {"stations": [
                {"station_id": 1, "lat": 48.8, "lon": 2.3},
                {"station_id": 2, "lat": "north"}
            ]}}),
        );
        let loader = FeedLoader::new(FeedSource::File(dir.path().join("unused")), information);
        let err = loader.fetch_station_information().await.unwrap_err();
        assert!(matches!(err, FeedError::InvalidStation { index: 1, .. }));
    }

    #[tokio::test]
    async fn test_missing_file_and_bad_document() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, b"{\"data\": []}").unwrap();
        let loader = FeedLoader::new(
            FeedSource::File(bad),
            FeedSource::File(dir.path().join("absent.json")),
        );
        assert!(matches!(
            loader.fetch_station_status().await.unwrap_err(),
            FeedError::Decode(..)
        ));
        assert!(matches!(
            loader.fetch_station_information().await.unwrap_err(),
            FeedError::FileRead(..)
        ));
    }
}
