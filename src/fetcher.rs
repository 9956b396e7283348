//! Reference-data fetcher: downloads the broker's public symbol-master files.
//!
//! Each source is fetched with one GET and written verbatim to
//! `dir/<file_name>`, overwriting any previous copy. The first failure stops
//! the run; files already written stay on disk.

use std::path::{Path, PathBuf};

use log::info;

/// Base URL of the broker's public symbol-master files.
pub const MASTER_BASE_URL: &str = "https://public.fyers.in/sym_details";

/// Master-file names published by the broker, one per exchange/segment.
pub const DEFAULT_SOURCE_NAMES: [&str; 7] = [
    "NSE_CM", "BSE_CM", "NSE_FO", "BSE_FO", "NSE_CD", "NSE_COM", "MCX_COM",
];

/// One file to download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Source {
    pub file_name: String,
    pub url: String,
}

impl Source {
    /// Source for a master name such as `NSE_CM` under `base_url`.
    pub fn master(base_url: &str, name: &str) -> Self {
        let file_name = format!("{name}_sym_master.json");
        let url = format!("{}/{}", base_url.trim_end_matches('/'), file_name);
        Self { file_name, url }
    }
}

/// All default sources.
pub fn default_sources() -> Vec<Source> {
    DEFAULT_SOURCE_NAMES
        .iter()
        .map(|name| Source::master(MASTER_BASE_URL, name))
        .collect()
}

/// Default sources restricted to `names` (case-insensitive). Unknown names are returned as `Err`.
pub fn select_sources(names: &[String]) -> Result<Vec<Source>, FetchError> {
    if names.is_empty() {
        return Ok(default_sources());
    }
    names
        .iter()
        .map(|requested| {
            DEFAULT_SOURCE_NAMES
                .iter()
                .find(|known| known.eq_ignore_ascii_case(requested))
                .map(|known| Source::master(MASTER_BASE_URL, known))
                .ok_or_else(|| FetchError::UnknownSource(requested.clone()))
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("unknown source {0:?}")]
    UnknownSource(String),
    #[error("GET {url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("GET {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("write {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Downloads every source into `dir`, creating it if needed. Returns the written paths in order.
pub async fn download_all(
    client: &reqwest::Client,
    dir: &Path,
    sources: &[Source],
) -> Result<Vec<PathBuf>, FetchError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| FetchError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let mut written = Vec::with_capacity(sources.len());
    for src in sources {
        let path = dir.join(&src.file_name);
        info!("downloading file={} url={}", src.file_name, src.url);
        let bytes = download_one(client, &src.url).await?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| FetchError::Io {
                path: path.clone(),
                source,
            })?;
        info!("downloaded file={} bytes={}", src.file_name, bytes.len());
        written.push(path);
    }
    info!("download finished files={}", written.len());
    Ok(written)
}

async fn download_one(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let http_err = |source: reqwest::Error| FetchError::Http {
        url: url.to_string(),
        source,
    };
    let response = client.get(url).send().await.map_err(http_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }
    let body = response.bytes().await.map_err(http_err)?;
    Ok(body.to_vec())
}
