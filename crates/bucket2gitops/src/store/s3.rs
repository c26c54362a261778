//! S3-compatible backend (MinIO, AWS) over path-style HTTP requests.

use async_trait::async_trait;
use chrono::Utc;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, Url};
use secrecy::SecretString;
use std::time::Duration;

use super::error::{Result, StoreError};
use super::sigv4::{self, CanonicalRequest, Signer, EMPTY_PAYLOAD_SHA256};
use super::{ListPage, ObjectStore, ObjectSummary};
use crate::sanitize::redact_url;

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug)]
pub struct S3Settings {
    /// `host[:port]` or a full `http(s)://` URL.
    pub endpoint: String,
    /// Used when `endpoint` carries no scheme.
    pub secure: bool,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: SecretString,
    pub max_connections: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

pub struct S3Store {
    http: Client,
    base_url: String,
    host: String,
    bucket: String,
    signer: Signer,
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Splits an endpoint into the URL prefix used for requests and the `host`
/// header value reqwest will send.
fn parse_endpoint(endpoint: &str, secure: bool) -> Result<(String, String)> {
    let trimmed = endpoint.trim().trim_end_matches('/');
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        let scheme = if secure { "https" } else { "http" };
        format!("{}://{}", scheme, trimmed)
    };

    let shown = redact_url(&with_scheme);
    let url = Url::parse(&with_scheme)
        .map_err(|e| StoreError::ClientBuild(format!("Invalid endpoint '{}': {}", shown, e)))?;
    let host_name = url
        .host_str()
        .ok_or_else(|| StoreError::ClientBuild(format!("Endpoint '{}' has no host", shown)))?;
    let host = match url.port() {
        Some(port) => format!("{}:{}", host_name, port),
        None => host_name.to_string(),
    };
    Ok((format!("{}://{}", url.scheme(), host), host))
}

impl S3Store {
    pub fn new(settings: S3Settings) -> Result<Self> {
        let (base_url, host) = parse_endpoint(&settings.endpoint, settings.secure)?;

        let http = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .pool_max_idle_per_host(settings.max_connections.max(1))
            .build()
            .map_err(|e| StoreError::ClientBuild(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            host,
            signer: Signer::new(settings.access_key, settings.secret_key, settings.region),
            bucket: settings.bucket,
        })
    }

    fn bucket_uri(&self) -> String {
        format!("/{}", sigv4::uri_encode(&self.bucket, true))
    }

    fn object_uri(&self, key: &str) -> String {
        format!("{}/{}", self.bucket_uri(), sigv4::uri_encode(key, false))
    }

    /// Sends a signed GET and returns the body of a successful response.
    async fn signed_get(
        &self,
        canonical_uri: &str,
        query: &[(String, String)],
        key_for_errors: &str,
    ) -> Result<Vec<u8>> {
        let now = Utc::now();
        let amz_date = sigv4::amz_date(now);
        let headers = vec![
            ("host".to_string(), self.host.clone()),
            (
                "x-amz-content-sha256".to_string(),
                EMPTY_PAYLOAD_SHA256.to_string(),
            ),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        let authorization = self.signer.authorization(
            &CanonicalRequest {
                method: "GET",
                canonical_uri,
                query,
                headers: &headers,
                payload_hash: EMPTY_PAYLOAD_SHA256,
            },
            now,
        )?;

        let mut url = format!("{}{}", self.base_url, canonical_uri);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&sigv4::canonical_query(query));
        }

        let response = self
            .http
            .get(&url)
            .header("x-amz-content-sha256", EMPTY_PAYLOAD_SHA256)
            .header("x-amz-date", amz_date)
            .header("authorization", authorization)
            .send()
            .await
            .map_err(StoreError::from_reqwest)?;

        let status = response.status();
        let body = response.bytes().await.map_err(StoreError::from_reqwest)?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            return Err(StoreError::from_status(
                status.as_u16(),
                key_for_errors,
                &self.bucket,
                &text,
            ));
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn describe(&self) -> String {
        format!("s3 {}/{}", self.base_url, self.bucket)
    }

    async fn check_connectivity(&self) -> Result<()> {
        self.list_page("", None, 1).await.map(|_| ())
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> Result<ListPage> {
        let mut query = vec![
            ("list-type".to_string(), "2".to_string()),
            ("max-keys".to_string(), max_keys.max(1).to_string()),
            ("prefix".to_string(), prefix.to_string()),
        ];
        if let Some(token) = continuation {
            query.push(("continuation-token".to_string(), token));
        }

        let body = self.signed_get(&self.bucket_uri(), &query, prefix).await?;
        let xml = String::from_utf8(body).map_err(|e| StoreError::InvalidResponse {
            message: format!("Listing is not UTF-8: {}", e),
        })?;
        parse_list_response(&xml)
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        self.signed_get(&self.object_uri(key), &[], key).await
    }
}

fn xml_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::InvalidResponse {
        message: format!("XML parsing error: {}", e),
    }
}

/// Parses a `ListObjectsV2` response body.
pub fn parse_list_response(xml: &str) -> Result<ListPage> {
    let mut reader = Reader::from_str(xml);

    let mut page = ListPage::default();
    let mut truncated = false;
    let mut text = String::new();
    let mut in_contents = false;
    let mut key: Option<String> = None;
    let mut size: u64 = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                text.clear();
                if e.local_name().as_ref() == b"Contents" {
                    in_contents = true;
                    key = None;
                    size = 0;
                }
            }
            Ok(Event::Text(e)) => {
                let decoded = e.decode().map_err(xml_error)?;
                text.push_str(&decoded);
            }
            Ok(Event::GeneralRef(e)) => {
                let name = e.decode().map_err(xml_error)?;
                match e.resolve_char_ref().map_err(xml_error)? {
                    Some(ch) => text.push(ch),
                    None => {
                        let resolved = resolve_xml_entity(&name)
                            .ok_or_else(|| xml_error(format!("unknown entity '&{};'", name)))?;
                        text.push_str(resolved);
                    }
                }
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(ref e)) => {
                let local_name = e.local_name();
                match local_name.as_ref() {
                    b"Key" if in_contents => key = Some(std::mem::take(&mut text)),
                    b"Size" if in_contents => {
                        size = text.trim().parse().map_err(|_| StoreError::InvalidResponse {
                            message: format!("Invalid object size '{}'", text.trim()),
                        })?;
                    }
                    b"Contents" => {
                        in_contents = false;
                        let key = key.take().ok_or_else(|| StoreError::InvalidResponse {
                            message: "Listing entry without a key".to_string(),
                        })?;
                        page.objects.push(ObjectSummary { key, size });
                    }
                    b"IsTruncated" => truncated = text.trim() == "true",
                    b"NextContinuationToken" => {
                        page.next_continuation = Some(text.trim().to_string())
                    }
                    _ => {}
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }

    if !truncated {
        page.next_continuation = None;
    } else if page.next_continuation.is_none() {
        return Err(StoreError::InvalidResponse {
            message: "Truncated listing without a continuation token".to_string(),
        });
    }
    Ok(page)
}
