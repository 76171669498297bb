//! Session acquisition against the VoipMonitor bypass login.
//!
//! A session is valid for exactly one collection cycle. It is never cached:
//! every scrape performs its own login and the token is dropped with the
//! cycle that created it.

use crate::upstream::SQL_ENDPOINT_PATH;
use serde::Deserialize;

/// An opaque session token obtained from the bypass login.
#[derive(Debug, Clone)]
pub struct Session {
    sid: String,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("login request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("login rejected with HTTP {0}")]
    UpstreamStatus(reqwest::StatusCode),
    #[error("login response could not be decoded: {0}")]
    MalformedResponse(#[source] reqwest::Error),
}

/// The upstream capitalizes the key as `SID`; be liberal about it.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(alias = "SID", alias = "Sid")]
    sid: String,
}

impl Session {
    /// Perform one bypass login. Empty credentials are passed through
    /// unchanged; the upstream is the authority on rejecting them.
    pub async fn authenticate(
        client: &reqwest::Client,
        endpoint: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, AuthError> {
        let response = client
            .post(format!("{endpoint}{SQL_ENDPOINT_PATH}"))
            .query(&[("module", "bypass_login"), ("user", username), ("pass", password)])
            .send()
            .await
            .map_err(AuthError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::UpstreamStatus(status));
        }

        let body: LoginResponse = response.json().await.map_err(AuthError::MalformedResponse)?;
        debug!("bypass login succeeded");

        Ok(Self { sid: body.sid })
    }

    /// The token presented to stats queries as a cookie credential.
    pub fn cookie_header(&self) -> String {
        format!("PHPSESSID={}", self.sid)
    }
}

#[cfg(test)]
impl Session {
    pub(crate) fn test_token(sid: impl ToString) -> Self {
        Self { sid: sid.to_string() }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn login_response_accepts_either_key_casing() {
        let lower: LoginResponse = serde_json::from_str(r#"{"sid": "abc"}"#).unwrap();
        assert_eq!(lower.sid, "abc");

        let upper: LoginResponse = serde_json::from_str(r#"{"SID": "def"}"#).unwrap();
        assert_eq!(upper.sid, "def");
    }

    #[test]
    fn cookie_header_carries_the_token() {
        let session = Session::test_token("tok1");
        assert_eq!(session.cookie_header(), "PHPSESSID=tok1");
    }
}
