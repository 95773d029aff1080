/**
 * CREDENTIAL STORE - Liste ordonnée de credentials SNMP candidats
 *
 * RÔLE : Conserver les couples version/communauté essayés lors de la détection.
 * L'ordre d'insertion définit la précédence d'essai ; chaque détection repart
 * de la tête de liste.
 */

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Version du protocole d'accès.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnmpVersion {
    V1,
    V2c,
}

impl SnmpVersion {
    /// Valeur numérique telle qu'encodée sur le fil (CREDENTIALS <version> ...).
    pub fn wire_value(&self) -> u8 {
        match self {
            SnmpVersion::V1 => 1,
            SnmpVersion::V2c => 2,
        }
    }
}

/// Un credential candidat, immuable après chargement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub version: SnmpVersion,
    pub community: String,
}

/// Format du fichier de credentials (YAML).
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    credentials: Vec<Credential>,
}

/// Liste ordonnée, append-only.
#[derive(Debug, Default)]
pub struct CredentialStore {
    credentials: Vec<Credential>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self { credentials: Vec::new() }
    }

    pub fn add(&mut self, version: SnmpVersion, community: &str) {
        self.credentials.push(Credential {
            version,
            community: community.to_string(),
        });
    }

    /// Ajoute les credentials d'un fichier YAML à la suite des existants.
    /// Fichier illisible ou invalide : rien n'est chargé, diagnostic émis.
    pub async fn load_file<P: AsRef<Path>>(&mut self, path: P) {
        let path = path.as_ref();
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "cannot read credentials file");
                return;
            }
        };
        match serde_yaml::from_str::<CredentialsFile>(&content) {
            Ok(file) => {
                tracing::debug!(file = %path.display(), count = file.credentials.len(), "credentials loaded");
                self.credentials.extend(file.credentials);
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "invalid credentials file");
            }
        }
    }

    /// Itérateur avant sur la liste, repartant de la tête à chaque appel.
    pub fn iter(&self) -> std::slice::Iter<'_, Credential> {
        self.credentials.iter()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
