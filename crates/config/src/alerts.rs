use crate::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Alerts {
    /// Directory holding one TOML file per alert sender. A sender whose file
    /// is missing stays disabled.
    pub dir: PathBuf,
}

impl Default for Alerts {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/opt/malwatch/alerts"),
        }
    }
}

/// Settings of one alert sender, stored in its own file under
/// [`Alerts::dir`].
pub trait SenderConfig: DeserializeOwned + Default {
    const FILE: &'static str;

    /// Read the sender settings from `dir`. Returns `None` when the file does
    /// not exist.
    fn load(dir: &Path) -> Result<Option<Self>, Error> {
        let path = dir.join(Self::FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(toml_edit::de::from_str(&text)?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JsonAlert {
    pub endpoint: String,
}

impl Default for JsonAlert {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost".into(),
        }
    }
}

impl SenderConfig for JsonAlert {
    const FILE: &'static str = "json.toml";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PagerDutyAlert {
    pub endpoint: String,
    pub severity: String,
}

impl Default for PagerDutyAlert {
    fn default() -> Self {
        Self {
            endpoint: "https://events.pagerduty.com/v2/enqueue".into(),
            severity: "warning".into(),
        }
    }
}

impl SenderConfig for PagerDutyAlert {
    const FILE: &'static str = "pagerduty.toml";
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SmtpAlert {
    pub to: Vec<String>,
    pub from: String,
}

impl SenderConfig for SmtpAlert {
    const FILE: &'static str = "smtp.toml";
}
