use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::prelude::{BASE64_STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response, StatusCode};
use sha2::Sha256;
use tracing::{debug, info};
use url::Url;

use super::connection_string::{ConnectionString, Credentials};
use super::{BlobStore, StorageError};

const API_VERSION: &str = "2021-08-06";
const BLOB_CONTENT_TYPE: &str = "application/octet-stream";

type HmacSha256 = Hmac<Sha256>;

/// Azure Blob Storage over the REST API, authenticated with Shared Key or SAS.
pub struct AzureBlobStore {
    client: Client,
    connection: ConnectionString,
}

impl AzureBlobStore {
    pub fn new(connection: ConnectionString) -> Result<Self, StorageError> {
        let client = Client::builder().build()?;
        info!(
            account = %connection.account_name,
            endpoint = %connection.blob_endpoint,
            "azure blob store configured"
        );
        Ok(Self { client, connection })
    }

    pub fn from_connection_string(raw: &str) -> Result<Self, StorageError> {
        let connection = raw
            .parse::<ConnectionString>()
            .map_err(|err| StorageError::Configuration(err.to_string()))?;
        Self::new(connection)
    }

    /// Public URL of a blob: the endpoint plus `container/name`, never carrying credentials.
    pub fn blob_url(&self, container: &str, name: &str) -> Result<Url, StorageError> {
        let mut url = self.connection.blob_endpoint.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| StorageError::Configuration("blob endpoint cannot be a base URL".into()))?
            .pop_if_empty()
            .push(container)
            .push(name);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        container: &str,
        name: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Response, StorageError> {
        let mut url = self.blob_url(container, name)?;
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();

        let mut ms_headers = vec![
            ("x-ms-date", date),
            ("x-ms-version", API_VERSION.to_string()),
        ];
        if body.is_some() {
            ms_headers.push(("x-ms-blob-type", "BlockBlob".to_string()));
        }

        let authorization = match &self.connection.credentials {
            Credentials::Sas(token) => {
                url.set_query(Some(token));
                None
            }
            Credentials::SharedKey { key } => {
                let content_length = body.as_ref().map_or(0, Vec::len);
                let content_type = if body.is_some() { BLOB_CONTENT_TYPE } else { "" };
                let to_sign = string_to_sign(
                    &method,
                    content_length,
                    content_type,
                    &ms_headers,
                    &self.connection.account_name,
                    &url,
                );
                Some(format!(
                    "SharedKey {}:{}",
                    self.connection.account_name,
                    sign(key, &to_sign)?
                ))
            }
        };

        let mut request = self.client.request(method, url);
        for (name, value) in &ms_headers {
            request = request.header(*name, value);
        }
        if let Some(authorization) = authorization {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }
        if let Some(bytes) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, BLOB_CONTENT_TYPE)
                .body(bytes);
        }

        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(status_error(response, container, name).await)
    }
}

async fn status_error(response: Response, container: &str, name: &str) -> StorageError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return StorageError::NotFound {
            container: container.to_string(),
            blob: name.to_string(),
        };
    }

    let code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("Unknown")
        .to_string();
    let body = response.text().await.unwrap_or_default();
    let message = xml_message(&body)
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    StorageError::Status {
        status: status.as_u16(),
        code,
        message,
    }
}

fn xml_message(body: &str) -> Option<&str> {
    let start = body.find("<Message>")? + "<Message>".len();
    let end = body[start..].find("</Message>")? + start;
    body[start..end].lines().next().map(str::trim)
}

/// Shared Key string-to-sign for the blob service.
fn string_to_sign(
    method: &Method,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(&str, String)],
    account: &str,
    url: &Url,
) -> String {
    let content_length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    // Content-Encoding, Content-Language, Content-Length, Content-MD5,
    // Content-Type, Date, If-Modified-Since, If-Match, If-None-Match,
    // If-Unmodified-Since, Range.
    let standard = [
        "",
        "",
        content_length.as_str(),
        "",
        content_type,
        "",
        "",
        "",
        "",
        "",
        "",
    ];

    let mut canonical_headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    canonical_headers.sort();

    let mut out = format!("{}\n", method.as_str());
    for field in standard {
        out.push_str(field);
        out.push('\n');
    }
    for (name, value) in canonical_headers {
        out.push_str(&format!("{name}:{value}\n"));
    }
    out.push_str(&canonical_resource(account, url));
    out
}

fn canonical_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{account}{}", url.path());

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        resource.push_str(&format!("\n{name}:{}", values.join(",")));
    }
    resource
}

fn sign(key: &[u8], to_sign: &str) -> Result<String, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|err| StorageError::Configuration(format!("invalid account key: {err}")))?;
    mac.update(to_sign.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn put(&self, container: &str, name: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let size = bytes.len();
        self.send(Method::PUT, container, name, Some(bytes)).await?;
        debug!(container, blob = name, size, "blob uploaded");
        Ok(self.blob_url(container, name)?.to_string())
    }

    async fn get(&self, container: &str, name: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.send(Method::GET, container, name, None).await?;
        let bytes = response.bytes().await?;
        debug!(container, blob = name, size = bytes.len(), "blob downloaded");
        Ok(bytes.to_vec())
    }
}
