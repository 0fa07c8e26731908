// WarpSpeed Engine - metadata.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Where a resource can be fetched from. The engine never looks inside the URL;
/// only the [`Transport`](crate::transport::Transport) interprets it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocation {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ResourceLocation {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            login: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.password = Some(password.into());
        self
    }

    /// Builds a location list from raw URLs, as handed over by the CLI or an importer.
    pub fn from_urls<I, S>(urls: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter().map(Self::new).collect()
    }
}

impl fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Metadata resolved once per download, before segmentation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileInfo {
    pub file_size: u64,
    pub supports_ranges: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl RemoteFileInfo {
    pub fn new(file_size: u64, supports_ranges: bool) -> Self {
        Self {
            file_size,
            supports_ranges,
            etag: None,
            last_modified: None,
            mime_type: None,
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Checks that `current` still describes the resource the saved segments were cut from.
    /// An etag only counts when both sides know one.
    pub fn validate_resume(&self, current: &RemoteFileInfo) -> Result<()> {
        if self.file_size != current.file_size {
            return Err(EngineError::ResourceChanged(format!(
                "file size on server ({}) does not match the original ({})",
                current.file_size, self.file_size
            )));
        }
        if let (Some(expected), Some(found)) = (&self.etag, &current.etag) {
            if expected != found {
                return Err(EngineError::ResourceChanged(format!(
                    "etag on server ({found}) does not match the original ({expected})"
                )));
            }
        }
        Ok(())
    }
}
