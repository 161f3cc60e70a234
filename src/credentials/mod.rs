//! Per-build credential lifecycle.
//!
//! A [`CredentialSet`] is generated once per build attempt and is the only
//! source of every password that build embeds anywhere: the unattended
//! descriptor, the build engine's login, the box descriptor and the final
//! record. It is zeroed on [`CredentialSet::dispose`] and again on drop.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::{BuildError, BuildResult};
use crate::tools::SecretSource;

pub mod descriptor;
pub mod generator;
pub mod record;
pub mod secret;

pub use descriptor::embed;
pub use generator::PassphraseCommand;
pub use record::{persist, CredentialRecord};
pub use secret::{Credential, Role, Secret};

/// Every credential of one build attempt, from a single generation event.
#[derive(Debug)]
pub struct CredentialSet {
    generation: Uuid,
    generated_at: DateTime<Utc>,
    credentials: Vec<Credential>,
}

impl CredentialSet {
    /// Generate one fresh secret per [`Role`].
    ///
    /// Fails if the generator errors, returns an empty value, or returns the
    /// same value for two roles.
    pub fn generate(source: &dyn SecretSource) -> BuildResult<Self> {
        let generated_at = Utc::now();
        let mut credentials: Vec<Credential> = Vec::with_capacity(Role::ALL.len());

        for role in Role::ALL {
            let secret = source.generate().map_err(|e| {
                BuildError::generation(e.context(format!("generating {} password", role)))
            })?;
            if secret.is_empty() {
                return Err(BuildError::Generation(format!(
                    "generator returned an empty {} password",
                    role
                )));
            }
            if credentials.iter().any(|c| c.secret == secret) {
                return Err(BuildError::Generation(format!(
                    "generator returned a duplicate password for {}",
                    role
                )));
            }
            credentials.push(Credential {
                role,
                secret,
                generated_at,
            });
        }

        let set = Self {
            generation: Uuid::new_v4(),
            generated_at,
            credentials,
        };
        info!(generation = %set.generation, roles = set.credentials.len(), "generated build credentials");
        Ok(set)
    }

    /// Build a set from already-held secrets.
    pub fn from_secrets(secrets: Vec<(Role, Secret)>) -> Self {
        let generated_at = Utc::now();
        Self {
            generation: Uuid::new_v4(),
            generated_at,
            credentials: secrets
                .into_iter()
                .map(|(role, secret)| Credential {
                    role,
                    secret,
                    generated_at,
                })
                .collect(),
        }
    }

    /// Identifier of the generation event every secret came from.
    pub fn generation(&self) -> Uuid {
        self.generation
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn get(&self, role: Role) -> Option<&Secret> {
        self.credentials
            .iter()
            .find(|c| c.role == role)
            .map(|c| &c.secret)
    }

    /// Like [`get`](Self::get), but a missing role is a generation error.
    pub fn require(&self, role: Role) -> BuildResult<&Secret> {
        self.get(role).ok_or_else(|| {
            BuildError::Generation(format!("no {} credential in this build's set", role))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Zero and release every secret. Idempotent.
    pub fn dispose(&mut self) {
        for credential in &mut self.credentials {
            credential.secret.zeroize();
        }
        self.credentials.clear();
    }
}
