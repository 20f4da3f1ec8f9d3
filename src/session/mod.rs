//! Shared session state
//!
//! A [`SessionState`] is the one record every request is built from: device
//! identity, client versions, imported key material, the session token, the
//! cookie jar and the registered user. It is never mutated in place while
//! published. Operations take a snapshot, derive a complete replacement and
//! publish it through [`SessionCell::transition`], which serializes the whole
//! read-compute-replace cycle.

use std::cmp::Ordering;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::crypto::Cipher;
use crate::error::Result;

pub mod cookies;

pub use cookies::{CookieJar, CookieRecord};

/// Device descriptor sent with every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Platform name, e.g. `iOS`
    pub platform: String,
    /// Hardware model
    pub device_model: String,
    /// OS name and version
    pub operating_system: String,
    /// Engine version reported in `X-Unity-Version`
    pub unity_version: String,
    /// HTTP `User-Agent`
    #[serde(default = "crate::config::defaults::default_user_agent")]
    pub user_agent: String,
}

/// Hostnames of the two API surfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domains {
    /// Signature issuing service
    pub signature: String,
    /// Main game API
    pub api: String,
    /// URL scheme used for both
    #[serde(default = "crate::config::defaults::default_scheme")]
    pub scheme: String,
}

impl Domains {
    /// Base URL of the signature service
    #[must_use]
    pub fn signature_base(&self) -> String {
        format!("{}://{}", self.scheme, self.signature)
    }

    /// Base URL of the game API
    #[must_use]
    pub fn api_base(&self) -> String {
        format!("{}://{}", self.scheme, self.api)
    }
}

/// Client version numbers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versions {
    /// Application version, e.g. `4.1.0`
    pub app_version: String,
    /// Asset bundle version, e.g. `4.1.0.30`
    pub asset_version: String,
    /// Master data version
    pub data_version: String,
    /// Build hash of the application
    pub app_hash: String,
}

/// Server-reported version entry to advance to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionUpdate {
    /// Application version of the entry
    pub app_version: String,
    /// Asset version of the entry
    pub asset_version: String,
    /// Data version, when the server reports one
    pub data_version: Option<String>,
    /// App hash, when the server reports one
    pub app_hash: Option<String>,
}

impl Versions {
    /// Apply a server-reported entry, never moving any version backwards
    ///
    /// Fields the entry reports as older than the current value are kept.
    #[must_use]
    pub fn advanced(&self, update: &VersionUpdate) -> Self {
        let forward = |current: &str, offered: &str| {
            if compare_dotted(offered, current) == Ordering::Less {
                tracing::warn!(current, offered, "ignoring older server version");
                current.to_string()
            } else {
                offered.to_string()
            }
        };

        Self {
            app_version: forward(&self.app_version, &update.app_version),
            asset_version: forward(&self.asset_version, &update.asset_version),
            data_version: update
                .data_version
                .as_deref()
                .map_or_else(|| self.data_version.clone(), |v| forward(&self.data_version, v)),
            app_hash: update
                .app_hash
                .clone()
                .unwrap_or_else(|| self.app_hash.clone()),
        }
    }
}

/// Compare dotted version strings numerically, component by component
///
/// Missing components count as zero; non-numeric components compare as text.
#[must_use]
pub fn compare_dotted(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => {
                let l = l.unwrap_or("0");
                let r = r.unwrap_or("0");
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Registered account, set once by user registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Server-assigned user id
    pub user_id: u64,
    /// Credential returned at registration
    #[serde(skip_serializing)]
    pub credential: String,
}

/// Everything a request is built from
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    /// Device identity, fixed for the process lifetime
    pub device: Device,
    /// API hostnames
    pub domains: Domains,
    /// Client versions, advanced by system info
    pub versions: Versions,
    /// Installation id (`X-Install-Id`)
    pub install_id: String,
    /// Client id (`X-Kc`)
    pub client_id: String,
    /// Imported payload key and IV
    #[serde(skip)]
    pub cipher: Cipher,
    /// Server-issued session token; empty until one is supplied
    #[serde(skip_serializing)]
    pub session_token: String,
    /// Cookies merged from responses
    pub cookies: CookieJar,
    /// Registered account
    pub user: Option<AuthenticatedUser>,
}

impl SessionState {
    /// Build the initial state from configuration
    ///
    /// Missing identifiers are generated here, once.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or IV cannot be imported.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let cipher = Cipher::from_hex(&config.crypto.key, &config.crypto.iv)?;

        Ok(Self {
            device: config.device.clone(),
            domains: config.domains.clone(),
            versions: config.versions.clone(),
            install_id: config
                .install_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            client_id: config
                .client_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            cipher,
            session_token: config.session_token.clone().unwrap_or_default(),
            cookies: CookieJar::new(),
            user: None,
        })
    }

    /// Whether a session token must be attached to requests
    #[must_use]
    pub fn has_session_token(&self) -> bool {
        !self.session_token.is_empty()
    }
}

/// The single published session state
///
/// Readers get a consistent snapshot without waiting on writers; writers go
/// through [`transition`](Self::transition), which holds the writer lock for
/// the whole read-compute-replace cycle and publishes only on success.
#[derive(Debug)]
pub struct SessionCell {
    writer: Mutex<()>,
    current: RwLock<Arc<SessionState>>,
}

impl SessionCell {
    /// Publish the initial state
    #[must_use]
    pub fn new(state: SessionState) -> Self {
        Self {
            writer: Mutex::new(()),
            current: RwLock::new(Arc::new(state)),
        }
    }

    /// Latest published state
    ///
    /// Never blocks on an in-flight transition.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SessionState> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish(&self, next: SessionState) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    /// Run one transition against the current state
    ///
    /// `step` receives the published snapshot and returns the complete next
    /// state alongside its result. On error nothing is published and the
    /// previous state stays current.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `step`.
    pub async fn transition<F, Fut, R>(&self, step: F) -> Result<R>
    where
        F: FnOnce(Arc<SessionState>) -> Fut,
        Fut: Future<Output = Result<(SessionState, R)>>,
    {
        let _writer = self.writer.lock().await;
        let (next, output) = step(self.snapshot()).await?;
        self.publish(next);
        Ok(output)
    }

    /// Consume the cell and return the last published state
    #[must_use]
    pub fn into_inner(self) -> Arc<SessionState> {
        self.current
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
