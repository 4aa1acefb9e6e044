use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use base64::prelude::{BASE64_STANDARD, Engine as _};
use thiserror::Error;
use url::Url;

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";
const DEFAULT_PROTOCOL: &str = "https";

const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionStringError {
    #[error("malformed connection string segment '{0}'")]
    Malformed(String),
    #[error("connection string is missing {0}")]
    Missing(&'static str),
    #[error("AccountKey is not valid base64")]
    InvalidKey,
    #[error("invalid blob endpoint: {0}")]
    InvalidEndpoint(String),
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    SharedKey { key: Vec<u8> },
    /// SAS query string without the leading `?`.
    Sas(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::SharedKey { .. } => f.write_str("SharedKey(<redacted>)"),
            Credentials::Sas(_) => f.write_str("Sas(<redacted>)"),
        }
    }
}

/// Parsed Azure Storage connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub blob_endpoint: Url,
    pub credentials: Credentials,
}

impl FromStr for ConnectionString {
    type Err = ConnectionStringError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut pairs = HashMap::new();
        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| ConnectionStringError::Malformed(segment.to_string()))?;
            pairs.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let development = pairs
            .get("usedevelopmentstorage")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        if development {
            return Ok(Self {
                account_name: DEV_ACCOUNT_NAME.to_string(),
                blob_endpoint: parse_endpoint(DEV_BLOB_ENDPOINT)?,
                credentials: Credentials::SharedKey {
                    key: decode_key(DEV_ACCOUNT_KEY)?,
                },
            });
        }

        let account_name = pairs
            .get("accountname")
            .filter(|name| !name.is_empty())
            .cloned()
            .ok_or(ConnectionStringError::Missing("AccountName"))?;

        let blob_endpoint = match pairs.get("blobendpoint") {
            Some(endpoint) => parse_endpoint(endpoint)?,
            None => {
                let protocol = pairs
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_PROTOCOL);
                let suffix = pairs
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                parse_endpoint(&format!("{protocol}://{account_name}.blob.{suffix}"))?
            }
        };

        let credentials = if let Some(sas) = pairs.get("sharedaccesssignature") {
            Credentials::Sas(sas.trim_start_matches('?').to_string())
        } else if let Some(key) = pairs.get("accountkey") {
            Credentials::SharedKey {
                key: decode_key(key)?,
            }
        } else {
            return Err(ConnectionStringError::Missing(
                "AccountKey or SharedAccessSignature",
            ));
        };

        Ok(Self {
            account_name,
            blob_endpoint,
            credentials,
        })
    }
}

fn decode_key(key: &str) -> Result<Vec<u8>, ConnectionStringError> {
    BASE64_STANDARD
        .decode(key)
        .map_err(|_| ConnectionStringError::InvalidKey)
}

fn parse_endpoint(raw: &str) -> Result<Url, ConnectionStringError> {
    let url = Url::parse(raw).map_err(|err| ConnectionStringError::InvalidEndpoint(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConnectionStringError::InvalidEndpoint(raw.to_string()));
    }
    Ok(url)
}
