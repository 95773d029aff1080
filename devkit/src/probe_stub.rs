/*!
Sonde de détection scriptée

Simule un agent SNMP sans réseau : la sonde répond seulement pour les
communautés configurées et journalise chaque tentative pour les assertions
de tests sur l'ordre de détection.
*/

use parking_lot::Mutex;
use vigil_orchestrator::credentials::Credential;
use vigil_orchestrator::detect::CredentialProbe;

/// Une tentative get-next enregistrée.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeAttempt {
    pub ip: String,
    pub start_oid: String,
    pub community: String,
}

/// Sonde qui répond pour un ensemble de communautés données.
pub struct ScriptedProbe {
    answers_for: Vec<String>,
    attempts: Mutex<Vec<ProbeAttempt>>,
}

impl ScriptedProbe {
    /// Sonde répondant à toutes les communautés listées.
    pub fn answering(communities: &[&str]) -> Self {
        Self {
            answers_for: communities.iter().map(|c| c.to_string()).collect(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Sonde muette : tout hôte paraît injoignable.
    pub fn silent() -> Self {
        Self::answering(&[])
    }

    /// Toutes les tentatives, dans l'ordre.
    pub fn attempts(&self) -> Vec<ProbeAttempt> {
        self.attempts.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }
}

impl CredentialProbe for ScriptedProbe {
    fn get_next(&self, ip: &str, start_oid: &str, credential: &Credential) -> Option<(String, String)> {
        self.attempts.lock().push(ProbeAttempt {
            ip: ip.to_string(),
            start_oid: start_oid.to_string(),
            community: credential.community.clone(),
        });
        if self.answers_for.iter().any(|c| c == &credential.community) {
            Some((".1.3.6.1.2.1.1.1.0".to_string(), "Vigil Mock Agent".to_string()))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_orchestrator::credentials::SnmpVersion;

    #[test]
    fn test_scripted_answers() {
        let probe = ScriptedProbe::answering(&["private"]);
        let public = Credential { version: SnmpVersion::V1, community: "public".into() };
        let private = Credential { version: SnmpVersion::V2c, community: "private".into() };

        assert!(probe.get_next("127.0.0.1", ".1", &public).is_none());
        assert!(probe.get_next("127.0.0.1", ".1", &private).is_some());
        assert_eq!(probe.attempt_count(), 2);
        assert_eq!(probe.attempts()[0].community, "public");
    }
}
