//! Sign-in and the user identity that namespaces every store path.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const ANONYMOUS_FILE: &str = "anonymous.json";

/// How to sign in
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Anonymous,
    /// A token whose subject becomes the user id
    Token(String),
}

impl Credentials {
    /// Token sign-in when a non-blank token is given, anonymous otherwise
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => Credentials::Token(token.to_string()),
            None => Credentials::Anonymous,
        }
    }
}

/// A signed-in user of one application
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub app_id: String,
    pub user_id: String,
    pub anonymous: bool,
}

impl Identity {
    /// Directory holding this user's collections
    pub fn namespace_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir
            .join("artifacts")
            .join(&self.app_id)
            .join("users")
            .join(&self.user_id)
    }
}

#[derive(Serialize, Deserialize)]
struct AnonymousRecord {
    user_id: String,
}

fn is_path_safe(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 128
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Sign in to `app_id`.
///
/// Anonymous users keep the same id across runs: it is minted once and
/// stored next to the application's user directories.
pub fn sign_in(credentials: &Credentials, app_id: &str, data_dir: &Path) -> Result<Identity> {
    if !is_path_safe(app_id) {
        return Err(Error::Identity(format!("Invalid application id: {:?}", app_id)));
    }

    let identity = match credentials {
        Credentials::Token(token) => {
            if !is_path_safe(token) {
                return Err(Error::Identity(
                    "Token must be letters, digits, '-' or '_'".into(),
                ));
            }
            Identity {
                app_id: app_id.to_string(),
                user_id: token.clone(),
                anonymous: false,
            }
        }
        Credentials::Anonymous => Identity {
            app_id: app_id.to_string(),
            user_id: anonymous_user_id(&data_dir.join("artifacts").join(app_id))?,
            anonymous: true,
        },
    };

    tracing::info!(
        "Signed in as {} ({})",
        identity.user_id,
        if identity.anonymous { "anonymous" } else { "token" }
    );
    Ok(identity)
}

fn anonymous_user_id(app_dir: &Path) -> Result<String> {
    let path = app_dir.join(ANONYMOUS_FILE);
    if path.exists() {
        let contents = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<AnonymousRecord>(&contents) {
            Ok(record) if is_path_safe(&record.user_id) => return Ok(record.user_id),
            Ok(_) => tracing::warn!("Anonymous id in {:?} is unusable, minting a new one", path),
            Err(e) => tracing::warn!(
                "Failed to parse {:?}: {}. Minting a new anonymous id.",
                path,
                e
            ),
        }
    }

    let record = AnonymousRecord {
        user_id: Uuid::new_v4().to_string(),
    };
    std::fs::create_dir_all(app_dir)?;
    std::fs::write(&path, serde_json::to_string(&record)?)?;
    tracing::debug!("Minted anonymous user {}", record.user_id);
    Ok(record.user_id)
}
