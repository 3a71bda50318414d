//! Outbound call trigger.
//!
//! Places one call through the telephony REST API. When the callee answers,
//! the provider fetches `{public_url}/voice`, which returns the TwiML that
//! opens the media stream.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Default telephony REST API base.
pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

static E164: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\+[1-9]\d{6,14}$").ok());

/// Errors returned by the call trigger.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Invalid phone number '{0}': expected E.164 format such as +14155550100")]
    InvalidNumber(String),

    #[error("Missing telephony setting: {0}")]
    MissingSetting(&'static str),

    #[error("Telephony request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telephony API error ({status}): {body}")]
    Api { status: u16, body: String },
}

pub type CallResult<T> = Result<T, CallError>;

/// Returns true for `+` followed by 7 to 15 digits without a leading zero.
pub fn is_e164(number: &str) -> bool {
    E164.as_ref().is_some_and(|re| re.is_match(number))
}

#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

/// A placed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedCall {
    pub sid: String,
    pub status: Option<String>,
}

/// Minimal telephony REST client for placing calls.
#[derive(Clone)]
pub struct TwilioCallClient {
    http: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
}

impl std::fmt::Debug for TwilioCallClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioCallClient")
            .field("api_base", &self.api_base)
            .field("account_sid", &self.account_sid)
            .finish_non_exhaustive()
    }
}

impl TwilioCallClient {
    pub fn new(
        api_base: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> CallResult<Self> {
        let account_sid = account_sid.into();
        let auth_token = auth_token.into();
        if account_sid.is_empty() {
            return Err(CallError::MissingSetting("TWILIO_ACCOUNT_SID"));
        }
        if auth_token.is_empty() {
            return Err(CallError::MissingSetting("TWILIO_AUTH_TOKEN"));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
        })
    }

    /// Place a call from `from` to `to`; the provider fetches `callback_url`
    /// for call instructions once answered.
    pub async fn place_call(&self, to: &str, from: &str, callback_url: &str) -> CallResult<PlacedCall> {
        for number in [to, from] {
            if !is_e164(number) {
                return Err(CallError::InvalidNumber(number.to_string()));
            }
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.api_base, self.account_sid
        );
        let params = [("To", to), ("From", from), ("Url", callback_url)];

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let call: CallResource = response.json().await?;
        info!(call_sid = %call.sid, to, "Outbound call placed");
        Ok(PlacedCall {
            sid: call.sid,
            status: call.status,
        })
    }
}
