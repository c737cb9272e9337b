#![forbid(unsafe_code)]

use super::{Sender, check_status, http_client};
use crate::act::Loaded;
use crate::domain::Report;
use crate::error::Error;
use async_trait::async_trait;
use config::{Config, JsonAlert, SenderConfig};
use reqwest::Client;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Serialize)]
struct Body<'a> {
    identifier: &'a str,
    payload: &'a Report<'a>,
}

/// POSTs the report as JSON to a webhook, with basic auth when a user is
/// configured.
pub struct JsonSender {
    identifier: String,
    dir: PathBuf,
    auth: config::Json,
    loaded: Option<(Client, JsonAlert)>,
}

impl JsonSender {
    pub fn new(config: &Config) -> Self {
        Self {
            identifier: config.identifier.clone(),
            dir: config.alerts.dir.clone(),
            auth: config.secrets.json.clone(),
            loaded: None,
        }
    }
}

#[async_trait]
impl Sender for JsonSender {
    fn name(&self) -> &'static str {
        "json"
    }

    fn config_path(&self) -> PathBuf {
        self.dir.join(JsonAlert::FILE)
    }

    async fn load(&mut self) -> Result<Loaded, Error> {
        let Some(alert) = JsonAlert::load(&self.dir)? else {
            return Ok(Loaded::Disabled);
        };
        if alert.endpoint.is_empty() {
            return Ok(Loaded::Disabled);
        }
        self.loaded = Some((http_client()?, alert));
        Ok(Loaded::Enabled)
    }

    async fn alert(&self, report: &Report<'_>) -> Result<(), Error> {
        let (client, alert) = self.loaded.as_ref().ok_or(Error::SenderNotLoaded("json"))?;
        let mut request = client.post(&alert.endpoint).json(&Body {
            identifier: &self.identifier,
            payload: report,
        });
        if !self.auth.user.is_empty() {
            request = request.basic_auth(&self.auth.user, Some(&self.auth.pass));
        }
        check_status(request.send().await?)?;
        debug!(endpoint = %alert.endpoint, target = report.target, "json alert sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScanResult;
    use crate::testing::hit;
    use config::Verb;
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::matchers::{basic_auth, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.identifier = "web01".into();
        config.alerts.dir = dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn disabled_without_settings_file() {
        let dir = tempdir().unwrap();
        let mut sender = JsonSender::new(&config(dir.path()));
        assert_eq!(sender.load().await.unwrap(), Loaded::Disabled);
        assert_eq!(sender.config_path(), dir.path().join("json.toml"));
    }

    #[tokio::test]
    async fn posts_report_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(basic_auth("malwatch", "hunter2"))
            .and(body_partial_json(json!({
                "identifier": "web01",
                "payload": { "target": "site" },
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("json.toml"),
            format!("endpoint = \"{}/hook\"\n", server.uri()),
        )
        .unwrap();
        let mut config = config(dir.path());
        config.secrets.json.user = "malwatch".into();
        config.secrets.json.pass = "hunter2".into();

        let mut sender = JsonSender::new(&config);
        assert_eq!(sender.load().await.unwrap(), Loaded::Enabled);

        let mut result = ScanResult::new("site");
        result.insert(hit("/var/www/site/x.php", &["eicar"], &[Verb::Alert]));
        let view = result.view(Verb::Alert);
        sender.alert(&view.report()).await.unwrap();
    }

    #[tokio::test]
    async fn error_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("json.toml"),
            format!("endpoint = \"{}\"\n", server.uri()),
        )
        .unwrap();
        let mut sender = JsonSender::new(&config(dir.path()));
        sender.load().await.unwrap();

        let mut result = ScanResult::new("site");
        result.insert(hit("/var/www/site/x.php", &["eicar"], &[Verb::Alert]));
        let view = result.view(Verb::Alert);
        let err = sender.alert(&view.report()).await.unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
    }
}
