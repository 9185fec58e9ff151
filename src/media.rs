use async_trait::async_trait;
use reqwest::{Client, Proxy};
use tracing::{debug, warn};

use crate::error::{RelayError, Result};

/// Byte download seam, so translators can be exercised without a network.
#[async_trait]
pub trait MediaFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Downloads attachment and avatar bytes from either platform's CDN.
pub struct MediaFetcher {
    client: Client,
}

impl MediaFetcher {
    pub fn new(proxy: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(proxy) = proxy {
            builder = builder.proxy(Proxy::all(proxy)?);
        }
        let client = builder
            .build()
            .map_err(|e| RelayError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Network(format!(
                "fetch {url} returned http {status}"
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl MediaFetch for MediaFetcher {
    /// Fetches a URL into memory. Some QQ media hosts present broken TLS
    /// certificates; those URLs are retried once over plain http.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!("fetch url={}", url);
        match self.get_bytes(url).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if is_tls_failure(&err) && url.starts_with("https://") => {
                let downgraded = format!("http://{}", &url["https://".len()..]);
                warn!("tls failure fetching {}, retrying over http", url);
                self.get_bytes(&downgraded).await
            }
            Err(err) => Err(err),
        }
    }
}

fn is_tls_failure(err: &RelayError) -> bool {
    let text = err.to_string().to_ascii_lowercase();
    text.contains("certificate") || text.contains("tls") || text.contains("ssl")
}

/// Identifies a payload by magic bytes, returning a file extension.
pub fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG") {
        Some("png")
    } else if bytes.starts_with(b"\xFF\xD8\xFF") {
        Some("jpg")
    } else if bytes.starts_with(b"GIF8") {
        Some("gif")
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WAVE" {
        Some("wav")
    } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        Some("mp4")
    } else if bytes.starts_with(b"\x1A\x45\xDF\xA3") {
        Some("webm")
    } else if bytes.starts_with(b"OggS") {
        Some("ogg")
    } else if bytes.starts_with(b"#!SILK_V3") || bytes.starts_with(b"\x02#!SILK_V3") {
        Some("silk")
    } else if bytes.starts_with(b"#!AMR") {
        Some("amr")
    } else if bytes.starts_with(b"ID3") || is_mpeg_frame(bytes) {
        Some("mp3")
    } else {
        None
    }
}

fn is_mpeg_frame(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0
}

/// Ensures a name has an extension so the receiving platform can pick a
/// renderer. Names that already carry one pass through unchanged.
pub fn guess_filename(name: &str, bytes: &[u8]) -> String {
    let has_extension = name
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty() && ext.len() <= 5);
    if has_extension {
        return name.to_string();
    }
    match sniff_extension(bytes) {
        Some(ext) => format!("{name}.{ext}"),
        None => name.to_string(),
    }
}

/// Voice payload conversion seam. Voice attachments go out to the group as
/// mp3 records; a real deployment plugs a codec in here.
#[async_trait]
pub trait AudioTranscoder: Send + Sync {
    async fn transcode(&self, bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Default transcoder: passes payloads already in an acceptable container
/// through untouched and rejects everything else, letting the caller
/// degrade to a file or placeholder.
pub struct PassthroughTranscoder;

#[async_trait]
impl AudioTranscoder for PassthroughTranscoder {
    async fn transcode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        match sniff_extension(bytes) {
            Some("mp3") | Some("wav") | Some("mp4") => Ok(bytes.to_vec()),
            detected => Err(RelayError::Unsupported(format!(
                "cannot convert {} audio without a codec",
                detected.unwrap_or("unknown")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AudioTranscoder, PassthroughTranscoder, guess_filename, sniff_extension};

    #[test]
    fn sniffs_common_containers() {
        assert_eq!(sniff_extension(b"\x89PNG\r\n\x1a\n"), Some("png"));
        assert_eq!(sniff_extension(b"\xFF\xD8\xFF\xE0rest"), Some("jpg"));
        assert_eq!(sniff_extension(b"RIFF\x00\x00\x00\x00WEBPVP8"), Some("webp"));
        assert_eq!(sniff_extension(b"\x00\x00\x00\x20ftypisom"), Some("mp4"));
        assert_eq!(sniff_extension(b"OggS\x00"), Some("ogg"));
        assert_eq!(sniff_extension(b"plain text"), None);
    }

    #[test]
    fn sniffs_silk_with_and_without_prefix_byte() {
        assert_eq!(sniff_extension(b"#!SILK_V3rest"), Some("silk"));
        assert_eq!(sniff_extension(b"\x02#!SILK_V3rest"), Some("silk"));
    }

    #[test]
    fn guess_filename_appends_only_when_missing() {
        assert_eq!(guess_filename("photo", b"\x89PNG\r\n"), "photo.png");
        assert_eq!(guess_filename("photo.png", b"\x89PNG\r\n"), "photo.png");
        assert_eq!(guess_filename("mystery", b"no magic here"), "mystery");
    }

    #[tokio::test]
    async fn passthrough_accepts_matching_container() {
        let out = PassthroughTranscoder
            .transcode(b"ID3\x04mp3data")
            .await
            .expect("mp3 passes");
        assert_eq!(out, b"ID3\x04mp3data");
    }

    #[tokio::test]
    async fn passthrough_rejects_silk() {
        let err = PassthroughTranscoder
            .transcode(b"\x02#!SILK_V3voice")
            .await
            .expect_err("silk needs a codec");
        assert!(!err.is_retryable());
    }
}
