#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Secrets {
    pub s3: S3,
    pub json: Json,
    pub pagerduty: PagerDuty,
    pub smtp: Smtp,
}

/// Remote object storage used by exile. Exile is disabled without an
/// endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct S3 {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub key: String,
    pub secret: String,
}

/// Basic auth for the JSON webhook.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Json {
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PagerDuty {
    /// Events API v2 routing key.
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Smtp {
    pub hostname: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
}

impl Default for Smtp {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            port: 587,
            user: String::new(),
            pass: String::new(),
        }
    }
}
