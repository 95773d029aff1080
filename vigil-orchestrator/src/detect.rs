/**
 * CREDENTIAL DETECTOR - Détection par essai-erreur des credentials d'un hôte
 *
 * RÔLE : Trouver, parmi les candidats du store, le premier credential auquel
 * l'hôte répond. Une sonde get-next par candidat, depuis un point de départ
 * bien connu. Pas de cache : chaque appel repart de la tête de liste.
 *
 * La sonde réseau est un collaborateur externe (transport SNMP côté
 * production) ; elle est bloquante et s'exécute dans la boucle de contrôle,
 * ce qui suspend l'orchestrateur le temps de la tournée — compromis assumé.
 */

use crate::credentials::{Credential, CredentialStore};

/// Point de départ bien connu des sondes get-next.
pub const PROBE_START_OID: &str = ".1";

/// Une requête get-next contre un hôte. `Some((oid, valeur))` si l'hôte
/// répond avec ce credential, `None` sinon (timeout du transport compris).
pub trait CredentialProbe: Send + Sync {
    fn get_next(&self, ip: &str, start_oid: &str, credential: &Credential) -> Option<(String, String)>;
}

/// Essaie les credentials du store dans l'ordre et retourne le premier qui
/// répond, ou `None` si aucun candidat ne donne de réponse.
pub fn detect_credentials(
    store: &CredentialStore,
    probe: &dyn CredentialProbe,
    ip: &str,
) -> Option<Credential> {
    for credential in store.iter() {
        tracing::debug!(ip, version = ?credential.version, "probing candidate credential");
        if probe.get_next(ip, PROBE_START_OID, credential).is_some() {
            tracing::debug!(ip, version = ?credential.version, "credential detected");
            return Some(credential.clone());
        }
    }
    None
}
