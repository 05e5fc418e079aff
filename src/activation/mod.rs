//! Client side of the push-MFA device activation handshake.
//!
//! The request mimics the Android app: a form-encoded POST carrying the
//! device profile, sent to the activation endpoint for the token. The
//! reply is JSON with a `stat` tag and, on success, a `response` object
//! holding the HOTP secret.

use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::form_urlencoded;

use crate::config::{ClientOptions, DeviceProfile, ProviderConfig};
use crate::errors::{ActivationError, TransportError};
use crate::link::ActivationToken;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; param=value";

/// The HOTP seed handed out by the provider. Never shown by `Debug`.
pub struct OtpSeed(SecretString);

impl OtpSeed {
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.expose().as_bytes()
    }
}

impl fmt::Debug for OtpSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OtpSeed({:?})", self.0)
    }
}

/// A fully built activation request.
#[derive(Debug, Clone)]
pub struct FormRequest {
    pub url: String,
    pub user_agent: String,
    pub content_type: &'static str,
    pub body: String,
}

/// Whatever came back, before any interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Sends a form request and returns the raw reply.
pub trait Transport {
    fn post_form(&self, request: &FormRequest) -> Result<RawResponse, TransportError>;
}

/// Blocking HTTPS transport.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_form(&self, request: &FormRequest) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .post(&request.url)
            .header(header::USER_AGENT, request.user_agent.as_str())
            .header(header::CONTENT_TYPE, request.content_type)
            .body(request.body.clone())
            .send()?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.to_string(),
                    v.to_str().unwrap_or("<non-ascii>").to_string(),
                )
            })
            .collect();
        let body = response.text()?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Top-level JSON reply. Failures carry `code` and `message` instead of
/// `response`.
#[derive(Debug, Deserialize)]
pub struct EnrollmentResponse {
    pub stat: String,
    #[serde(default)]
    pub response: Option<ActivationPayload>,
    #[serde(default)]
    pub code: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Metadata next to the secret. The provider may send `null` for any of
/// it, so every field is optional.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ActivationPayload {
    pub akey: Option<String>,
    pub customer_name: Option<String>,
    pub hotp_secret: Option<String>,
    pub reactivation_token: Option<String>,
    pub has_backup_restore: Option<bool>,
    pub has_bluetooth_approve: Option<bool>,
    pub has_device_insight: Option<bool>,
    pub has_trusted_endpoints: Option<bool>,
    pub is_fips_deployment: Option<bool>,
    pub security_checkup_enabled: Option<bool>,
}

// Secrets stay out of debug output.
impl fmt::Debug for ActivationPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationPayload")
            .field("akey", &self.akey)
            .field("customer_name", &self.customer_name)
            .field("has_hotp_secret", &self.hotp_secret.is_some())
            .field("has_reactivation_token", &self.reactivation_token.is_some())
            .field("has_backup_restore", &self.has_backup_restore)
            .field("has_bluetooth_approve", &self.has_bluetooth_approve)
            .field("has_device_insight", &self.has_device_insight)
            .field("has_trusted_endpoints", &self.has_trusted_endpoints)
            .field("is_fips_deployment", &self.is_fips_deployment)
            .field("security_checkup_enabled", &self.security_checkup_enabled)
            .finish()
    }
}

pub struct ActivationClient<T: Transport> {
    transport: T,
    provider: ProviderConfig,
    profile: DeviceProfile,
    options: ClientOptions,
}

impl ActivationClient<HttpTransport> {
    /// Client backed by a real HTTPS transport.
    pub fn connect(
        provider: ProviderConfig,
        profile: DeviceProfile,
        options: ClientOptions,
    ) -> Result<Self, ActivationError> {
        let transport = HttpTransport::new(options.timeout)?;
        Ok(Self::new(transport, provider, profile, options))
    }
}

impl<T: Transport> ActivationClient<T> {
    pub fn new(
        transport: T,
        provider: ProviderConfig,
        profile: DeviceProfile,
        options: ClientOptions,
    ) -> Self {
        Self {
            transport,
            provider,
            profile,
            options,
        }
    }

    /// Build the request the Android app would send for `token`.
    pub fn build_request(&self, token: &ActivationToken) -> FormRequest {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.profile.form_fields())
            .finish();

        FormRequest {
            url: self.provider.activation_url(token.as_str()),
            user_agent: self.profile.user_agent.clone(),
            content_type: FORM_CONTENT_TYPE,
            body,
        }
    }

    /// Register as a new device and return the HOTP seed. A token is only
    /// good for one attempt, so nothing here is retried.
    pub fn activate(&self, token: &ActivationToken) -> Result<OtpSeed, ActivationError> {
        let request = self.build_request(token);
        if self.options.diagnostics {
            debug!("activation request URL: {}", request.url);
        }

        let raw = self.transport.post_form(&request)?;
        if self.options.diagnostics {
            debug!("response status: {}", raw.status);
            debug!("response headers: {:?}", raw.headers);
            debug!("response body: {}", raw.body);
        }

        let seed = interpret(raw)?;
        if self.options.diagnostics {
            debug!("hotp secret: {}", seed.expose());
        }
        Ok(seed)
    }
}

/// Decode the reply and check both the HTTP and the application layer.
pub fn interpret(raw: RawResponse) -> Result<OtpSeed, ActivationError> {
    let decoded: EnrollmentResponse = match serde_json::from_str(&raw.body) {
        Ok(x) => x,
        Err(e) => {
            return Err(ActivationError::Decode {
                source: e,
                body: raw.body,
            })
        }
    };

    let rejected = |reason: String| ActivationError::Rejected {
        status: raw.status,
        stat: decoded.stat.clone(),
        reason,
    };

    if !(200..300).contains(&raw.status) || decoded.stat != "OK" {
        let reason = match (&decoded.code, &decoded.message) {
            (Some(code), Some(msg)) => format!("{} ({})", msg, code),
            (None, Some(msg)) => msg.clone(),
            (Some(code), None) => format!("error code {}", code),
            (None, None) => String::from("no reason given"),
        };
        return Err(rejected(reason));
    }

    let payload = match decoded.response {
        Some(ref p) => p,
        None => return Err(rejected(String::from("reply has no response object"))),
    };

    match payload.hotp_secret {
        Some(ref s) if !s.is_empty() => {
            match payload.customer_name {
                Some(ref name) if !name.is_empty() => info!("activated for customer {}", name),
                _ => {}
            }
            debug!("activation metadata: {:?}", payload);
            Ok(OtpSeed(SecretString::from(s.clone())))
        }
        _ => Err(rejected(String::from("reply carries no hotp_secret"))),
    }
}
