use std::path::Path;

use crate::error::{RelayError, Result};
use crate::qq::{OneBotApi, VersionInfo};

/// How plain files reach the group, decided once per send by asking the
/// OneBot server what it is.
///
/// NapCat accepts inline `base64://` payloads in a file segment. Lagrange
/// cannot, so bytes are written to the shared cache directory and uploaded
/// by path. Anything else gets the save-then-reference path without the
/// explicit upload call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDelivery {
    Inline,
    ByPath { needs_upload: bool },
}

impl FileDelivery {
    pub async fn probe(api: &dyn OneBotApi) -> Result<Self> {
        Ok(Self::from_version(&api.get_version_info().await?))
    }

    pub fn from_version(version: &VersionInfo) -> Self {
        match version.app_name.as_str() {
            "NapCat.Onebot" => FileDelivery::Inline,
            "Lagrange.OneBot" => FileDelivery::ByPath { needs_upload: true },
            _ => FileDelivery::ByPath {
                needs_upload: false,
            },
        }
    }
}

/// Writes one outgoing file into the cache directory and returns the path
/// the OneBot server should read it from.
pub async fn save_to_cache(cache_dir: &Path, name: &str, bytes: &[u8]) -> Result<String> {
    tokio::fs::create_dir_all(cache_dir)
        .await
        .map_err(|e| RelayError::Unsupported(format!("cache dir unavailable: {e}")))?;
    let path = cache_dir.join(name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| RelayError::Unsupported(format!("cannot cache {name}: {e}")))?;
    Ok(path.to_string_lossy().into_owned())
}
