//! Operator-facing credential record.
//!
//! Written once per successful build, owner-only, and never overwritten.
//! After it is written the file belongs to the operator.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::Zeroizing;

use super::{CredentialSet, Role};
use crate::common::write_new_file_mode;
use crate::config::Usernames;

/// On-disk form of the record.
#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub created: DateTime<Utc>,
    pub os_version: String,
    pub artifact: String,
    pub credentials: Vec<RecordEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordEntry {
    pub role: String,
    pub username: String,
    pub password: String,
    pub description: String,
}

/// `<dir>/<artifact>-credentials-<timestamp>.json`.
pub fn record_path(dir: &Path, artifact: &str, created: DateTime<Utc>) -> PathBuf {
    dir.join(format!(
        "{}-credentials-{}.json",
        crate::package::sanitize_name(artifact),
        created.format("%Y%m%dT%H%M%S")
    ))
}

/// Write the record into `dir`. Fails if a record with the same name exists.
pub fn persist(
    credentials: &CredentialSet,
    usernames: &Usernames,
    dir: &Path,
    os_version: &str,
    artifact: &str,
) -> Result<PathBuf> {
    let created = Utc::now();
    let record = CredentialRecord {
        created,
        os_version: os_version.to_string(),
        artifact: artifact.to_string(),
        credentials: credentials
            .iter()
            .map(|c| RecordEntry {
                role: c.role.as_str().to_string(),
                username: match c.role {
                    Role::Administrator => usernames.administrator.clone(),
                    Role::User => usernames.user.clone(),
                },
                password: c.secret.expose().to_string(),
                description: c.role.description().to_string(),
            })
            .collect(),
    };

    let path = record_path(dir, artifact, created);
    let json = Zeroizing::new(serde_json::to_string_pretty(&record)?);
    let result = write_new_file_mode(&path, json.as_bytes(), 0o600);
    scrub(record);
    result?;

    info!(path = %path.display(), "credential record written");
    Ok(path)
}

fn scrub(mut record: CredentialRecord) {
    use zeroize::Zeroize;
    for entry in &mut record.credentials {
        entry.password.zeroize();
    }
}
