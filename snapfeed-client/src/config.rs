use std::{path::Path, time::Duration};

use anyhow::Context;

use crate::RetryPolicy;

/// Tunables of the interaction controller
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientConfig {
    pub comment_fetch_limit: usize,
    pub post_fetch_limit: usize,

    #[serde(rename = "health-timeout-ms", with = "millis")]
    pub health_timeout: Duration,

    #[serde(rename = "probe-timeout-ms", with = "millis")]
    pub probe_timeout: Duration,

    pub media_retry: RetryPolicy,

    /// Display name used for comments written without a session
    pub author: String,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            comment_fetch_limit: 50,
            post_fetch_limit: 20,
            health_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
            media_retry: RetryPolicy::default(),
            author: String::from("you"),
        }
    }
}

impl ClientConfig {
    /// Reads a JSON configuration file, missing keys taking their default value
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<ClientConfig> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading client configuration {path:?}"))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing client configuration {path:?}"))
    }
}

pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
