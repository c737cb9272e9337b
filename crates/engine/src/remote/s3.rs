#![forbid(unsafe_code)]

use super::{ObjectStore, object_key};
use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Url};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";
const TIMEOUT: Duration = Duration::from_secs(30);

/// S3-compatible storage addressed path-style (`endpoint/bucket/key`) and
/// signed with AWS Signature Version 4.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    endpoint: Url,
    region: String,
    bucket: String,
    key: String,
    secret: String,
}

impl S3Store {
    /// An endpoint without a scheme is reached over https.
    pub fn new(config: &config::S3) -> Result<Self, Error> {
        let endpoint = if config.endpoint.contains("://") {
            config.endpoint.clone()
        } else {
            format!("https://{}", config.endpoint)
        };
        let endpoint =
            Url::parse(&endpoint).map_err(|_| Error::InvalidEndpoint(config.endpoint.clone()))?;
        if endpoint.host_str().is_none() {
            return Err(Error::InvalidEndpoint(config.endpoint.clone()));
        }
        let client = Client::builder().timeout(TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint,
            region: config.region.clone(),
            bucket: config.bucket.clone(),
            key: config.key.clone(),
            secret: config.secret.clone(),
        })
    }

    fn canonical_uri(&self, path: &Path) -> String {
        let key = object_key(path);
        let segments: Vec<_> = key.split('/').map(|s| urlencoding::encode(s)).collect();
        format!("/{}/{}", urlencoding::encode(&self.bucket), segments.join("/"))
    }

    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        }
    }

    /// Headers for a request, `Authorization` included.
    fn sign(
        &self,
        method: &Method,
        uri: &str,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<(&'static str, String)>, Error> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let host = self.host();

        let canonical = format!(
            "{method}\n{uri}\n\nhost:{host}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{payload_hash}"
        );
        let scope = format!("{date}/{}/{SERVICE}/aws4_request", self.region);
        let to_sign = format!("{ALGORITHM}\n{amz_date}\n{scope}\n{}", sha256_hex(canonical.as_bytes()));

        let key = signing_key(&self.secret, &date, &self.region, SERVICE)?;
        let signature = hex::encode(hmac(&key, to_sign.as_bytes())?);
        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            self.key
        );

        Ok(vec![
            ("x-amz-date", amz_date),
            ("x-amz-content-sha256", payload_hash.to_owned()),
            ("authorization", authorization),
        ])
    }

    async fn send(&self, method: Method, path: &Path, body: Vec<u8>) -> Result<reqwest::Response, Error> {
        let uri = self.canonical_uri(path);
        let payload_hash = sha256_hex(&body);
        let headers = self.sign(&method, &uri, &payload_hash, Utc::now())?;

        let mut url = self.endpoint.clone();
        url.set_path(&uri);
        let mut request = self.client.request(method, url.clone());
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request.body(body).send().await?;
        if !response.status().is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn upload(&self, path: &Path) -> Result<(), Error> {
        let body = tokio::fs::read(path).await.map_err(|err| Error::file(path, err))?;
        let size = body.len();
        self.send(Method::PUT, path, body).await?;
        info!(path = %path.display(), bucket = %self.bucket, size, "uploaded file");
        Ok(())
    }

    async fn download(&self, path: &Path, dst: &Path) -> Result<(), Error> {
        let body = self.send(Method::GET, path, Vec::new()).await?.bytes().await?;
        tokio::fs::write(dst, &body)
            .await
            .map_err(|err| Error::file(dst, err))?;
        debug!(path = %path.display(), dst = %dst.display(), size = body.len(), "downloaded file");
        Ok(())
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| Error::SigningKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>, Error> {
    let key = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let key = hmac(&key, region.as_bytes())?;
    let key = hmac(&key, service.as_bytes())?;
    hmac(&key, b"aws4_request")
}
