use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CREDENTIALS_FILE: &str = "credentials.json";

/// The JMeter install path and OpenAI key sent along with every backend request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub jmeter_path: String,
    pub openai_key: String,
}

impl Credentials {
    pub fn new(jmeter_path: &str, openai_key: &str) -> Self {
        Self {
            jmeter_path: jmeter_path.trim().to_string(),
            openai_key: openai_key.trim().to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.jmeter_path.trim().is_empty() && !self.openai_key.trim().is_empty()
    }
}

// On-disk shape; either key may be missing in a hand-edited file.
#[derive(Deserialize)]
struct StoredCredentials {
    jmeter_path: Option<String>,
    openai_key: Option<String>,
}

/// Durable storage for [`Credentials`], one JSON file in the config directory.
///
/// The store does no validation of its own: whatever the validator accepted is
/// written as-is, and a file with a blank field reads back as "not configured".
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::at(dir.join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Option<Credentials> {
        if !self.path.exists() {
            return None;
        }

        let stored = match self.read() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable credentials file");
                return None;
            }
        };

        let credentials = Credentials::new(
            stored.jmeter_path.as_deref().unwrap_or_default(),
            stored.openai_key.as_deref().unwrap_or_default(),
        );
        credentials.is_complete().then_some(credentials)
    }

    fn read(&self) -> Result<StoredCredentials> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn has(&self) -> bool {
        self.get().is_some()
    }

    pub fn set(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(credentials)?;
        fs::write(&self.path, content)?;

        // The file holds an API key.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

/// Show only the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}
