//! Resolution of the storage connection value.
//!
//! A deployment supplies one value for the storage account, either as a raw connection
//! string (`AccountName=...;AccountKey=...`) or as a blob service endpoint URL that is
//! combined with ambient managed-identity credentials. The sentinel
//! [`DEVELOPMENT_STORAGE_SENTINEL`] selects the local storage emulator.
//!
//! The value is looked up under the configured setting name and, when that is empty,
//! under the identity-based suffixes the Functions host uses (`__serviceUri`,
//! `__blobServiceUri`).

use std::fmt;

use tracing::{debug, error, info, warn};
use url::Url;

pub const DEVELOPMENT_STORAGE_SENTINEL: &str = "UseDevelopmentStorage=true";

/// Well-known account of the local storage emulator.
pub const EMULATOR_ACCOUNT: &str = "devstoreaccount1";
pub const EMULATOR_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

const IDENTITY_SUFFIXES: [&str; 2] = ["__serviceUri", "__blobServiceUri"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// None of the candidate settings held a value.
    Missing { setting: String },
    /// A connection string without `AccountName`.
    MissingAccount,
    InvalidEndpoint(String),
    Unrecognised,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Missing { setting } => write!(
                f,
                "storage connection not configured: set {setting} or {setting}__serviceUri"
            ),
            ConnectionError::MissingAccount => {
                write!(f, "storage connection string has no AccountName")
            }
            ConnectionError::InvalidEndpoint(e) => write!(f, "invalid storage endpoint: {e}"),
            ConnectionError::Unrecognised => write!(
                f,
                "storage connection value is neither a connection string nor an endpoint URL"
            ),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Parsed form of a `key=value;...` storage connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub account_key: Option<String>,
    pub blob_endpoint: Option<Url>,
    pub sas_token: Option<String>,
    pub protocol: String,
    pub endpoint_suffix: String,
}

// Keys and SAS tokens stay out of logs.
impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .field("blob_endpoint", &self.blob_endpoint.as_ref().map(Url::as_str))
            .field("sas_token", &self.sas_token.as_ref().map(|_| "<redacted>"))
            .field("protocol", &self.protocol)
            .field("endpoint_suffix", &self.endpoint_suffix)
            .finish()
    }
}

/// How the process reaches the storage account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConnection {
    /// Local emulator with its well-known development account.
    Emulator,
    ConnectionString(ConnectionString),
    /// Endpoint URL authenticated with ambient managed-identity credentials.
    ServiceEndpoint { account: String, endpoint: Url },
}

impl StorageConnection {
    /// Classify a raw connection value.
    pub fn resolve(raw: &str) -> Result<Self, ConnectionError> {
        let raw = raw.trim();
        if raw == DEVELOPMENT_STORAGE_SENTINEL {
            info!("Using local storage emulator connection");
            return Ok(StorageConnection::Emulator);
        }

        if raw.starts_with("http://") || raw.starts_with("https://") {
            let endpoint =
                Url::parse(raw).map_err(|e| ConnectionError::InvalidEndpoint(e.to_string()))?;
            let account = account_from_endpoint(&endpoint)?;
            info!(account = %account, endpoint = %endpoint, "Using service endpoint with managed identity");
            return Ok(StorageConnection::ServiceEndpoint { account, endpoint });
        }

        if raw.contains('=') {
            return parse_connection_string(raw);
        }

        error!("Storage connection value could not be classified");
        Err(ConnectionError::Unrecognised)
    }

    /// Look the connection value up by setting name and resolve it.
    ///
    /// `lookup` abstracts the environment so callers can supply any source of settings.
    pub fn from_setting<F>(setting: &str, lookup: F) -> Result<Self, ConnectionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = non_empty(lookup(setting)) {
            debug!(setting, "Found storage connection setting");
            return Self::resolve(&value);
        }

        warn!(setting, "Storage connection string not found, trying identity-based settings");
        for suffix in IDENTITY_SUFFIXES {
            let key = format!("{setting}{suffix}");
            if let Some(value) = non_empty(lookup(&key)) {
                debug!(setting = %key, "Found identity-based storage setting");
                return Self::resolve(&value);
            }
        }

        error!(setting, "No storage connection configured");
        Err(ConnectionError::Missing {
            setting: setting.to_string(),
        })
    }

    pub fn account(&self) -> &str {
        match self {
            StorageConnection::Emulator => EMULATOR_ACCOUNT,
            StorageConnection::ConnectionString(cs) => &cs.account_name,
            StorageConnection::ServiceEndpoint { account, .. } => account,
        }
    }

    /// The blob service endpoint requests are sent to.
    pub fn blob_endpoint(&self) -> Result<Url, ConnectionError> {
        let raw = match self {
            StorageConnection::Emulator => EMULATOR_BLOB_ENDPOINT.to_string(),
            StorageConnection::ConnectionString(cs) => match &cs.blob_endpoint {
                Some(url) => return Ok(url.clone()),
                None => format!(
                    "{}://{}.blob.{}",
                    cs.protocol, cs.account_name, cs.endpoint_suffix
                ),
            },
            StorageConnection::ServiceEndpoint { endpoint, .. } => return Ok(endpoint.clone()),
        };
        Url::parse(&raw).map_err(|e| ConnectionError::InvalidEndpoint(e.to_string()))
    }

    pub fn is_emulator(&self) -> bool {
        matches!(self, StorageConnection::Emulator)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_connection_string(raw: &str) -> Result<StorageConnection, ConnectionError> {
    let mut account_name = None;
    let mut account_key = None;
    let mut blob_endpoint = None;
    let mut sas_token = None;
    let mut protocol = "https".to_string();
    let mut endpoint_suffix = "core.windows.net".to_string();

    for pair in raw.split(';').filter(|p| !p.trim().is_empty()) {
        // Values such as base64 keys may contain '=' themselves.
        let Some((key, value)) = pair.split_once('=') else {
            warn!(segment = %pair, "Ignoring malformed connection string segment");
            continue;
        };
        match key.trim() {
            "UseDevelopmentStorage" if value.trim().eq_ignore_ascii_case("true") => {
                info!("Using local storage emulator connection");
                return Ok(StorageConnection::Emulator);
            }
            "AccountName" => account_name = Some(value.trim().to_string()),
            "AccountKey" => account_key = Some(value.trim().to_string()),
            "BlobEndpoint" => {
                let url = Url::parse(value.trim())
                    .map_err(|e| ConnectionError::InvalidEndpoint(e.to_string()))?;
                blob_endpoint = Some(url);
            }
            "SharedAccessSignature" => sas_token = Some(value.trim().to_string()),
            "DefaultEndpointsProtocol" => protocol = value.trim().to_string(),
            "EndpointSuffix" => endpoint_suffix = value.trim().to_string(),
            other => debug!(key = other, "Ignoring connection string key"),
        }
    }

    let account_name = match (account_name, &blob_endpoint) {
        (Some(name), _) => name,
        (None, Some(endpoint)) => account_from_endpoint(endpoint)?,
        (None, None) => return Err(ConnectionError::MissingAccount),
    };

    let cs = ConnectionString {
        account_name,
        account_key,
        blob_endpoint,
        sas_token,
        protocol,
        endpoint_suffix,
    };
    info!(account = %cs.account_name, "Using storage connection string");
    Ok(StorageConnection::ConnectionString(cs))
}

/// `https://<account>.blob.<suffix>` or a path-style `http://host:port/<account>`.
fn account_from_endpoint(endpoint: &Url) -> Result<String, ConnectionError> {
    let host = endpoint
        .host_str()
        .ok_or_else(|| ConnectionError::InvalidEndpoint(format!("{endpoint} has no host")))?;

    if let Some((account, rest)) = host.split_once('.') {
        if rest.starts_with("blob.") && !account.is_empty() {
            return Ok(account.to_string());
        }
    }

    endpoint
        .path_segments()
        .and_then(|mut segments| segments.next())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ConnectionError::InvalidEndpoint(format!("cannot derive account name from {endpoint}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn sentinel_selects_emulator_endpoint() {
        let conn = StorageConnection::resolve("UseDevelopmentStorage=true").unwrap();
        assert!(conn.is_emulator());
        assert_eq!(conn.account(), EMULATOR_ACCOUNT);
        let endpoint = conn.blob_endpoint().unwrap();
        assert_eq!(endpoint.host_str(), Some("127.0.0.1"));
        assert_eq!(endpoint.port(), Some(10000));
    }

    #[test]
    fn connection_string_is_parsed_with_default_endpoint() {
        let conn = StorageConnection::resolve(
            "DefaultEndpointsProtocol=https;AccountName=pdfstore;AccountKey=a2V5PT0=;EndpointSuffix=core.windows.net",
        )
        .unwrap();
        match &conn {
            StorageConnection::ConnectionString(cs) => {
                assert_eq!(cs.account_name, "pdfstore");
                assert_eq!(cs.account_key.as_deref(), Some("a2V5PT0="));
                assert!(cs.sas_token.is_none());
            }
            other => panic!("expected connection string, got {other:?}"),
        }
        assert_eq!(
            conn.blob_endpoint().unwrap().as_str(),
            "https://pdfstore.blob.core.windows.net/"
        );
    }

    #[test]
    fn connection_string_debug_hides_secrets() {
        let conn =
            StorageConnection::resolve("AccountName=pdfstore;AccountKey=c2VjcmV0").unwrap();
        let rendered = format!("{conn:?}");
        assert!(!rendered.contains("c2VjcmV0"), "key leaked: {rendered}");
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn connection_string_with_development_flag_is_emulator() {
        let conn = StorageConnection::resolve(
            "UseDevelopmentStorage=true;DevelopmentStorageProxyUri=http://127.0.0.1",
        )
        .unwrap();
        assert!(conn.is_emulator());
    }

    #[test]
    fn connection_string_without_account_is_rejected() {
        let err = StorageConnection::resolve("AccountKey=abc").unwrap_err();
        assert_eq!(err, ConnectionError::MissingAccount);
    }

    #[test]
    fn blob_endpoint_supplies_account_when_name_absent() {
        let conn = StorageConnection::resolve(
            "BlobEndpoint=https://pdfstore.blob.core.windows.net/;SharedAccessSignature=sv=2022&sig=x",
        )
        .unwrap();
        assert_eq!(conn.account(), "pdfstore");
        match conn {
            StorageConnection::ConnectionString(cs) => {
                assert_eq!(cs.sas_token.as_deref(), Some("sv=2022&sig=x"))
            }
            other => panic!("expected connection string, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_url_uses_managed_identity() {
        let conn = StorageConnection::resolve("https://pdfstore.blob.core.windows.net").unwrap();
        match &conn {
            StorageConnection::ServiceEndpoint { account, endpoint } => {
                assert_eq!(account, "pdfstore");
                assert_eq!(endpoint.host_str(), Some("pdfstore.blob.core.windows.net"));
            }
            other => panic!("expected service endpoint, got {other:?}"),
        }
        assert!(!conn.is_emulator());
    }

    #[test]
    fn path_style_endpoint_takes_account_from_path() {
        let conn = StorageConnection::resolve("http://localhost:10000/devstoreaccount1").unwrap();
        assert_eq!(conn.account(), "devstoreaccount1");
    }

    #[test]
    fn garbage_value_is_unrecognised() {
        assert_eq!(
            StorageConnection::resolve("not a connection").unwrap_err(),
            ConnectionError::Unrecognised
        );
    }

    #[test]
    fn primary_setting_wins_over_service_uri() {
        let lookup = lookup_from(&[
            ("PDFProcessorSTORAGE", "UseDevelopmentStorage=true"),
            ("PDFProcessorSTORAGE__serviceUri", "https://pdfstore.blob.core.windows.net"),
        ]);
        let conn = StorageConnection::from_setting("PDFProcessorSTORAGE", lookup).unwrap();
        assert!(conn.is_emulator());
    }

    #[test]
    fn empty_primary_setting_falls_back_to_service_uri() {
        let lookup = lookup_from(&[
            ("PDFProcessorSTORAGE", ""),
            ("PDFProcessorSTORAGE__serviceUri", "https://pdfstore.blob.core.windows.net"),
        ]);
        let conn = StorageConnection::from_setting("PDFProcessorSTORAGE", lookup).unwrap();
        assert_eq!(conn.account(), "pdfstore");
    }

    #[test]
    fn blob_service_uri_is_last_fallback() {
        let lookup = lookup_from(&[(
            "PDFProcessorSTORAGE__blobServiceUri",
            "https://other.blob.core.windows.net",
        )]);
        let conn = StorageConnection::from_setting("PDFProcessorSTORAGE", lookup).unwrap();
        assert_eq!(conn.account(), "other");
    }

    #[test]
    fn missing_setting_is_reported_by_name() {
        let err = StorageConnection::from_setting("PDFProcessorSTORAGE", |_| None).unwrap_err();
        assert_eq!(
            err,
            ConnectionError::Missing {
                setting: "PDFProcessorSTORAGE".into()
            }
        );
        assert!(err.to_string().contains("PDFProcessorSTORAGE__serviceUri"));
    }
}
