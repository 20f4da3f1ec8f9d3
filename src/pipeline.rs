//! Operation pipeline
//!
//! The account bootstrap is a fixed sequence of named operations. Each one
//! runs as a single [`SessionCell::transition`]: take the published state,
//! build and execute its request against a private draft, derive the next
//! state, and publish it only if every step succeeded. A failure anywhere
//! leaves the previously published state untouched and stops the run.

use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use rmpv::Value;
use serde::Serialize;

use crate::client::{build_request, execute, Body, Response, Transport};
use crate::codec::map;
use crate::error::{ClientError, Result};
use crate::models::{NewUser, SystemInfo};
use crate::session::{AuthenticatedUser, SessionCell, SessionState};

/// Named steps of a bootstrap run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    /// Prime cookies at the signature service
    RefreshSignature,
    /// Fetch system info and advance client versions
    UpdateSystemInfo,
    /// Create a new account for this device
    RegisterNewUser,
    /// Accept the terms of service
    AgreeToRules,
    /// Authenticate the registered account
    Authenticate,
}

impl Operation {
    /// Execution order of a run
    pub const SEQUENCE: [Self; 5] = [
        Self::RefreshSignature,
        Self::UpdateSystemInfo,
        Self::RegisterNewUser,
        Self::AgreeToRules,
        Self::Authenticate,
    ];

    /// Display name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RefreshSignature => "RefreshSignature",
            Self::UpdateSystemInfo => "UpdateSystemInfo",
            Self::RegisterNewUser => "RegisterNewUser",
            Self::AgreeToRules => "AgreeToRules",
            Self::Authenticate => "Authenticate",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a full run produced
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Decoded system info
    pub system_info: Option<SystemInfo>,
    /// Registration result
    pub registration: Option<NewUser>,
    /// Rule agreement body, for the caller to persist
    pub rule_agreement: Option<Body>,
    /// Authentication body
    pub authentication: Option<Body>,
}

/// Game API client bound to one session
#[derive(Debug)]
pub struct GameClient<T> {
    transport: T,
    session: SessionCell,
}

impl<T: Transport> GameClient<T> {
    /// Bind a transport to an initial session state
    pub fn new(transport: T, state: SessionState) -> Self {
        Self {
            transport,
            session: SessionCell::new(state),
        }
    }

    /// The shared session cell
    pub const fn session(&self) -> &SessionCell {
        &self.session
    }

    /// The underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Latest published session state
    #[must_use]
    pub fn snapshot(&self) -> Arc<SessionState> {
        self.session.snapshot()
    }

    /// Run every operation in order, stopping at the first failure
    ///
    /// # Errors
    ///
    /// Returns the first failure wrapped with the operation it occurred in.
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::default();
        for operation in Operation::SEQUENCE {
            tracing::debug!(%operation, "starting operation");
            self.apply(operation, &mut report)
                .await
                .map_err(|e| e.in_operation(operation))?;
            tracing::info!(%operation, "operation complete");
        }
        Ok(report)
    }

    async fn apply(&self, operation: Operation, report: &mut RunReport) -> Result<()> {
        match operation {
            Operation::RefreshSignature => self.refresh_signature().await,
            Operation::UpdateSystemInfo => {
                report.system_info = Some(self.update_system_info().await?);
                Ok(())
            }
            Operation::RegisterNewUser => {
                report.registration = Some(self.register_new_user().await?);
                Ok(())
            }
            Operation::AgreeToRules => {
                report.rule_agreement = self.agree_to_rules().await?;
                Ok(())
            }
            Operation::Authenticate => {
                report.authentication = self.authenticate().await?;
                Ok(())
            }
        }
    }

    /// Build, send and decode one call against a draft state
    ///
    /// Cookies and any issued session token land in the draft; the caller
    /// decides whether the draft gets published.
    async fn exchange(
        &self,
        draft: &mut SessionState,
        method: Method,
        url: String,
        body: Option<&Value>,
    ) -> Result<Response> {
        let request = build_request(draft, method, url, body)?;
        let response = execute(&self.transport, &draft.cipher, &mut draft.cookies, request).await?;

        if let Some(token) = response.session_token() {
            draft.session_token = token.to_string();
        }

        response.ensure_success()
    }

    /// `POST /api/signature` with no body; only the cookies matter
    ///
    /// # Errors
    ///
    /// Fails on transport, crypto or status errors.
    pub async fn refresh_signature(&self) -> Result<()> {
        self.session
            .transition(|current| async move {
                let mut next = (*current).clone();
                let url = format!("{}/api/signature", next.domains.signature_base());
                let _ = self.exchange(&mut next, Method::POST, url, None).await?;
                Ok((next, ()))
            })
            .await
    }

    /// `GET /api/system`, advancing versions when the current app version is available
    ///
    /// # Errors
    ///
    /// Fails if the request fails or the body is not system info.
    pub async fn update_system_info(&self) -> Result<SystemInfo> {
        self.session
            .transition(|current| async move {
                let mut next = (*current).clone();
                let url = format!("{}/api/system", next.domains.api_base());
                let info: SystemInfo = self
                    .exchange(&mut next, Method::GET, url, None)
                    .await?
                    .decode_body("system info")?;

                match info.available_entry_for(&next.versions.app_version) {
                    Some(entry) => {
                        next.versions = next.versions.advanced(&entry.to_update());
                        tracing::info!(
                            app_version = %next.versions.app_version,
                            asset_version = %next.versions.asset_version,
                            "client versions updated"
                        );
                    }
                    None => tracing::warn!(
                        app_version = %next.versions.app_version,
                        "no available server entry for current app version"
                    ),
                }

                Ok((next, info))
            })
            .await
    }

    /// `POST /api/user` with the device descriptor; stores the new account
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::Precondition`] if a user is already
    /// registered, or if the request or decoding fails.
    pub async fn register_new_user(&self) -> Result<NewUser> {
        self.session
            .transition(|current| async move {
                if current.user.is_some() {
                    return Err(ClientError::Precondition {
                        operation: Operation::RegisterNewUser,
                        reason: "a user is already registered in this session",
                    });
                }

                let mut next = (*current).clone();
                let url = format!("{}/api/user", next.domains.api_base());
                let body = map([
                    ("platform", Value::from(next.device.platform.as_str())),
                    ("deviceModel", Value::from(next.device.device_model.as_str())),
                    (
                        "operatingSystem",
                        Value::from(next.device.operating_system.as_str()),
                    ),
                ]);

                let new_user: NewUser = self
                    .exchange(&mut next, Method::POST, url, Some(&body))
                    .await?
                    .decode_body("new user")?;

                next.user = Some(AuthenticatedUser {
                    user_id: new_user.user_registration.user_id,
                    credential: new_user.credential.clone(),
                });
                tracing::info!(user_id = new_user.user_registration.user_id, "user registered");

                Ok((next, new_user))
            })
            .await
    }

    /// `POST /api/user/{id}/rule-agreement`; returns the body untouched
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::Precondition`] before registration, or if the
    /// request fails.
    pub async fn agree_to_rules(&self) -> Result<Option<Body>> {
        self.session
            .transition(|current| async move {
                let user = registered_user(&current, Operation::AgreeToRules)?;

                let mut next = (*current).clone();
                let url = format!(
                    "{}/api/user/{}/rule-agreement",
                    next.domains.api_base(),
                    user.user_id
                );
                let body = map([
                    ("credential", Value::from(user.credential.as_str())),
                    ("userId", Value::from(0)),
                ]);

                let response = self.exchange(&mut next, Method::POST, url, Some(&body)).await?;
                Ok((next, response.body))
            })
            .await
    }

    /// `PUT /api/user/{id}/auth` with the stored credential
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::Precondition`] before registration, or if the
    /// request fails.
    pub async fn authenticate(&self) -> Result<Option<Body>> {
        self.session
            .transition(|current| async move {
                let user = registered_user(&current, Operation::Authenticate)?;

                let mut next = (*current).clone();
                let url = format!("{}/api/user/{}/auth", next.domains.api_base(), user.user_id);
                let body = map([("credential", Value::from(user.credential.as_str()))]);

                let response = self.exchange(&mut next, Method::PUT, url, Some(&body)).await?;
                Ok((next, response.body))
            })
            .await
    }
}

fn registered_user(state: &SessionState, operation: Operation) -> Result<AuthenticatedUser> {
    state.user.clone().ok_or(ClientError::Precondition {
        operation,
        reason: "no registered user in this session",
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::{ScriptedResponse, ScriptedTransport, WireRequest};
    use crate::codec;
    use crate::error::CryptoError;
    use crate::session::tests::sample_state;
    use reqwest::header::HeaderName;

    fn app_version(version: &str, asset: &str, status: &str) -> Value {
        map([
            ("systemProfile", Value::from("production")),
            ("appVersion", Value::from(version)),
            ("multiPlayVersion", Value::from(version)),
            ("assetVersion", Value::from(asset)),
            ("appVersionStatus", Value::from(status)),
        ])
    }

    fn system_info() -> Value {
        map([
            ("serverDate", Value::from(1_700_000_000_000_i64)),
            ("timezone", Value::from("Asia/Tokyo")),
            ("profile", Value::from("production")),
            ("maintenanceStatus", Value::from("maintenance_out")),
            (
                "appVersions",
                Value::Array(vec![
                    app_version("4.1.0", "4.1.0.31", "not_available"),
                    app_version("4.1.0", "4.1.0.40", "available"),
                    app_version("4.2.0", "4.2.0.10", "available"),
                ]),
            ),
        ])
    }

    fn new_user() -> Value {
        map([
            (
                "userRegistration",
                map([
                    ("userId", Value::from(123_456_789_u64)),
                    ("signature", Value::from("sig")),
                    ("platform", Value::from("iOS")),
                    ("deviceModel", Value::from("iPad12,1")),
                    ("operatingSystem", Value::from("iPadOS 17.0")),
                    ("registeredAt", Value::from(1_700_000_000_000_i64)),
                ]),
            ),
            ("credential", Value::from("cred-xyz")),
            ("updatedResources", map([("userGamedata", Value::Nil)])),
        ])
    }

    fn decrypt_body(state: &SessionState, request: &WireRequest) -> Value {
        codec::decode(&state.cipher.decrypt(&request.body).unwrap()).unwrap()
    }

    fn field<'a>(value: &'a Value, key: &str) -> &'a Value {
        value
            .as_map()
            .unwrap()
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
            .unwrap()
    }

    fn full_script(state: &SessionState) -> ScriptedTransport {
        ScriptedTransport::new(state.cipher.clone())
            .then(ScriptedResponse::empty().with_cookie("AWSALB=one; Path=/"))
            .then(
                ScriptedResponse::packed(&system_info())
                    .with_cookie("AWSALB=two; Path=/")
                    .with_cookie("AWSALBCORS=two; Path=/; Secure"),
            )
            .then(
                ScriptedResponse::packed(&new_user())
                    .with_cookie("session_hint=reg")
                    .with_header(HeaderName::from_static("x-session-token"), "T1"),
            )
            .then(
                ScriptedResponse::json(&serde_json::json!({"agreed": true}))
                    .with_cookie("AWSALB=four"),
            )
            .then(
                ScriptedResponse::packed(&map([("sessionToken", Value::from("T2"))]))
                    .with_cookie("last=5"),
            )
    }

    #[tokio::test]
    async fn test_full_run() {
        let state = sample_state();
        let client = GameClient::new(full_script(&state), state.clone());

        let report = client.run().await.unwrap();
        let final_state = client.snapshot();

        // authenticated user
        let user = final_state.user.as_ref().unwrap();
        assert_eq!(user.user_id, 123_456_789);
        assert_eq!(user.credential, "cred-xyz");

        // every cookie, last write wins
        let cookies: Vec<_> = final_state.cookies.iter().collect();
        assert_eq!(
            cookies,
            [
                ("AWSALB", "four"),
                ("AWSALBCORS", "two"),
                ("last", "5"),
                ("session_hint", "reg"),
            ]
        );

        // versions advanced from the first available 4.1.0 entry
        assert_eq!(final_state.versions.app_version, "4.1.0");
        assert_eq!(final_state.versions.asset_version, "4.1.0.40");
        assert_eq!(final_state.session_token, "T1");

        // report carries the pass-through bodies
        assert_eq!(
            report.rule_agreement,
            Some(Body::Json(serde_json::json!({"agreed": true})))
        );
        assert!(matches!(report.authentication, Some(Body::Packed(_))));
        assert_eq!(report.system_info.unwrap().app_versions.len(), 3);
        assert_eq!(
            report.registration.unwrap().user_registration.user_id,
            123_456_789
        );

        let sent = client.transport().sent();
        assert_eq!(sent.len(), 5);
        assert_eq!(client.transport().remaining(), 0);

        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(sent[0].url, "https://issue.example.test/api/signature");
        assert!(sent[0].body.is_empty());
        assert!(sent[0].header("cookie").is_none());

        assert_eq!(sent[1].method, Method::GET);
        assert_eq!(sent[1].url, "https://api.example.test/api/system");
        assert_eq!(sent[1].header("cookie"), Some("AWSALB=one"));

        assert_eq!(sent[2].url, "https://api.example.test/api/user");
        assert_eq!(sent[2].header("x-asset-version"), Some("4.1.0.40"));
        assert!(sent[2].header("x-session-token").is_none());
        let registration = decrypt_body(&state, &sent[2]);
        assert_eq!(field(&registration, "platform").as_str(), Some("iOS"));
        assert_eq!(field(&registration, "deviceModel").as_str(), Some("iPad12,1"));
        assert_eq!(
            field(&registration, "operatingSystem").as_str(),
            Some("iPadOS 17.0")
        );

        assert_eq!(
            sent[3].url,
            "https://api.example.test/api/user/123456789/rule-agreement"
        );
        assert_eq!(sent[3].header("x-session-token"), Some("T1"));
        let agreement = decrypt_body(&state, &sent[3]);
        assert_eq!(field(&agreement, "credential").as_str(), Some("cred-xyz"));

        assert_eq!(sent[4].method, Method::PUT);
        assert_eq!(sent[4].url, "https://api.example.test/api/user/123456789/auth");
        let auth = decrypt_body(&state, &sent[4]);
        assert_eq!(field(&auth, "credential").as_str(), Some("cred-xyz"));
    }

    #[tokio::test]
    async fn test_precondition_failures_leave_state_unchanged() {
        let state = sample_state();
        let client = GameClient::new(ScriptedTransport::new(state.cipher.clone()), state);
        let before = client.snapshot();

        let err = client.agree_to_rules().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Precondition {
                operation: Operation::AgreeToRules,
                ..
            }
        ));

        let err = client.authenticate().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Precondition {
                operation: Operation::Authenticate,
                ..
            }
        ));

        assert!(Arc::ptr_eq(&before, &client.snapshot()));
        assert!(client.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn test_second_registration_fails_fast() {
        let mut state = sample_state();
        state.user = Some(AuthenticatedUser {
            user_id: 1,
            credential: "existing".to_string(),
        });
        let client = GameClient::new(ScriptedTransport::new(state.cipher.clone()), state);

        let err = client.register_new_user().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Precondition {
                operation: Operation::RegisterNewUser,
                ..
            }
        ));
        assert_eq!(client.snapshot().user.as_ref().unwrap().credential, "existing");
        assert!(client.transport().sent().is_empty());
    }

    #[tokio::test]
    async fn test_version_scan_ignores_other_versions() {
        let mut state = sample_state();
        state.versions.app_version = "4.0.0".to_string();
        let transport =
            ScriptedTransport::new(state.cipher.clone()).then(ScriptedResponse::packed(&system_info()));
        let client = GameClient::new(transport, state);

        let _ = client.update_system_info().await.unwrap();
        let versions = &client.snapshot().versions;
        assert_eq!(versions.app_version, "4.0.0");
        assert_eq!(versions.asset_version, "4.1.0.30");
    }

    #[tokio::test]
    async fn test_malformed_system_info_is_fatal() {
        let state = sample_state();
        let transport = ScriptedTransport::new(state.cipher.clone()).then(
            ScriptedResponse::packed(&map([("appVersions", Value::from("nope"))]))
                .with_cookie("lost=1"),
        );
        let client = GameClient::new(transport, state);

        let err = client.update_system_info().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::DecodeValidation {
                record: "system info",
                ..
            }
        ));
        // the draft carrying the new cookie was never published
        assert!(client.snapshot().cookies.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_at_first_failure() {
        let state = sample_state();
        let transport = ScriptedTransport::new(state.cipher.clone())
            .then(ScriptedResponse::empty().with_cookie("first=1"))
            .then(ScriptedResponse::fail("connection reset"))
            .then(ScriptedResponse::packed(&new_user()));
        let client = GameClient::new(transport, state);

        let err = client.run().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Operation {
                operation: Operation::UpdateSystemInfo,
                ..
            }
        ));
        assert!(matches!(err.root(), ClientError::Transport { .. }));
        assert_eq!(err.exit_code(), 4);

        let final_state = client.snapshot();
        assert_eq!(final_state.cookies.get("first"), Some("1"));
        assert!(final_state.user.is_none());
        assert_eq!(client.transport().sent().len(), 2);
        assert_eq!(client.transport().remaining(), 1);
    }

    #[tokio::test]
    async fn test_error_status_aborts_operation() {
        let state = sample_state();
        let transport = ScriptedTransport::new(state.cipher.clone())
            .then(ScriptedResponse::empty().with_status(426));
        let client = GameClient::new(transport, state);

        let err = client.refresh_signature().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::ServerStatus {
                status: 426,
                class: crate::client::ApiStatus::UpgradeRequired
            }
        ));
    }

    #[tokio::test]
    async fn test_undecryptable_body_is_crypto_error() {
        let state = sample_state();
        let transport = ScriptedTransport::new(state.cipher.clone())
            .then(ScriptedResponse::raw(vec![0u8; 15]));
        let client = GameClient::new(transport, state);

        let err = client.refresh_signature().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Crypto(CryptoError::InvalidCiphertextLength(15))
        ));
    }

    #[test]
    fn test_sequence_order() {
        let names: Vec<_> = Operation::SEQUENCE.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            [
                "RefreshSignature",
                "UpdateSystemInfo",
                "RegisterNewUser",
                "AgreeToRules",
                "Authenticate"
            ]
        );
    }
}
