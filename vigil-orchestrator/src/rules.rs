/**
 * RULE STORE - Règles de matching et scripts d'évaluation
 *
 * RÔLE : Conserver l'ensemble des règles chargées. Une règle nomme les assets,
 * groupes et modèles auxquels elle s'applique, et embarque le source Lua que
 * le worker exécutera à chaque cycle de polling.
 *
 * FONCTIONNEMENT : Documents JSON (fichiers *.rule ou commande RULE du canal
 * de contrôle). Une règle est immuable une fois chargée ; le store est
 * append-only, sans déduplication ni suppression.
 */

use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// Extension reconnue pour les fichiers de règles.
pub const RULE_EXTENSION: &str = "rule";

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("invalid rule document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_polling() -> u32 {
    1
}

/// Une règle de monitoring, immuable après parsing.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    /// Nom unique côté humain (pas de contrainte d'unicité dans le store)
    pub name: String,
    /// Description human-readable
    #[serde(default)]
    pub description: Option<String>,
    /// Identifiants d'assets exacts auxquels la règle s'applique
    #[serde(default)]
    pub assets: Vec<String>,
    /// Groupes (valeurs des attributs group.N) auxquels la règle s'applique
    #[serde(default)]
    pub groups: Vec<String>,
    /// Modèles et références de pièces (attributs model / device.part)
    #[serde(default)]
    pub models: Vec<String>,
    /// Source Lua de la fonction d'évaluation, opaque pour l'orchestrateur
    pub evaluation: String,
    /// Multiplicateur de polling (1 = chaque cycle)
    #[serde(default = "default_polling")]
    pub polling: u32,
}

impl Rule {
    /// Parse un document JSON en règle.
    pub fn parse(json: &str) -> Result<Self, RuleError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Charge une règle depuis un fichier.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, RuleError> {
        let content = fs::read_to_string(path).await?;
        Self::parse(&content)
    }
}

/// Store append-only des règles, ordre d'insertion conservé.
#[derive(Debug, Default)]
pub struct RuleStore {
    rules: Vec<Rule>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Parse et ajoute un document JSON ; un document invalide est jeté avec
    /// un diagnostic, jamais remonté à l'appelant.
    pub fn parse_and_add(&mut self, json: &str) {
        match Rule::parse(json) {
            Ok(rule) => {
                tracing::debug!(rule = %rule.name, "rule added");
                self.rules.push(rule);
            }
            Err(e) => tracing::warn!(error = %e, "discarding invalid rule document"),
        }
    }

    /// Charge toutes les règles *.rule d'un dossier. Un fichier invalide est
    /// ignoré et le chargement continue ; un dossier illisible ne charge rien.
    pub async fn load_directory<P: AsRef<Path>>(&mut self, path: P) {
        let path = path.as_ref();
        let mut entries = match fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %path.display(), error = %e, "cannot open rules directory");
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let file = entry.path();
            if file.extension().and_then(|s| s.to_str()) != Some(RULE_EXTENSION) {
                continue;
            }
            match Rule::load(&file).await {
                Ok(rule) => {
                    tracing::debug!(rule = %rule.name, file = %file.display(), "rule loaded");
                    self.rules.push(rule);
                }
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "skipping rule file");
                }
            }
        }
    }

    /// Toutes les règles, dans l'ordre d'insertion.
    pub fn all(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULE_JSON: &str = r#"{
        "name": "testrule",
        "description": "Rule for testing",
        "assets": ["mydevice"],
        "groups": ["mygroup"],
        "evaluation": "function main (host) return { 'temperature', 10, 'C' } end"
    }"#;

    #[test]
    fn test_parse_defaults() {
        let rule = Rule::parse(RULE_JSON).unwrap();
        assert_eq!(rule.name, "testrule");
        assert_eq!(rule.assets, vec!["mydevice"]);
        assert_eq!(rule.groups, vec!["mygroup"]);
        assert!(rule.models.is_empty());
        assert_eq!(rule.polling, 1);
    }

    #[test]
    fn test_invalid_document_discarded() {
        let mut store = RuleStore::new();
        store.parse_and_add("{ not json");
        store.parse_and_add(r#"{"name": "incomplete"}"#); // evaluation manquante
        assert!(store.is_empty());
    }

    #[test]
    fn test_no_deduplication() {
        let mut store = RuleStore::new();
        store.parse_and_add(RULE_JSON);
        store.parse_and_add(RULE_JSON);
        assert_eq!(store.len(), 2);
        assert_eq!(store.all()[0].name, store.all()[1].name);
    }

    #[tokio::test]
    async fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.rule"), RULE_JSON).unwrap();
        std::fs::write(dir.path().join("broken.rule"), "{ oops").unwrap();
        std::fs::write(dir.path().join("ignored.json"), RULE_JSON).unwrap();

        let mut store = RuleStore::new();
        store.load_directory(dir.path()).await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.all()[0].name, "testrule");
    }

    #[tokio::test]
    async fn test_load_missing_directory() {
        let mut store = RuleStore::new();
        store.load_directory("/nonexistent/vigil-rules").await;
        assert!(store.is_empty());
    }
}
