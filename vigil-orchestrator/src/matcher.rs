//! Prédicat pur : une règle s'applique-t-elle à un événement de découverte.

use crate::models::DiscoveryEvent;
use crate::rules::Rule;

/// Préfixe des attributs d'appartenance à un groupe (group.1, group.2, ...).
const GROUP_PREFIX: &str = "group.";

/// Vrai si la règle s'applique à l'asset décrit par l'événement.
/// Égalité stricte uniquement, évaluation court-circuit dans l'ordre :
/// asset exact, puis groupes, puis modèle, puis référence de pièce.
pub fn rule_matches(rule: &Rule, event: &DiscoveryEvent) -> bool {
    if rule.assets.iter().any(|a| a == &event.asset_id) {
        return true;
    }

    let group_hit = event.attributes.iter().any(|(key, value)| {
        key.starts_with(GROUP_PREFIX) && rule.groups.iter().any(|g| g == value)
    });
    if group_hit {
        return true;
    }

    for key in ["model", "device.part"] {
        if let Some(value) = event.attributes.get(key) {
            if rule.models.iter().any(|m| m == value) {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn rule() -> Rule {
        Rule::parse(
            r#"{
                "name": "r1",
                "assets": ["mydevice"],
                "groups": ["mygroup"],
                "models": ["XUPS-3000", "PN-778"],
                "evaluation": "function main (host) end"
            }"#,
        )
        .unwrap()
    }

    fn event(asset_id: &str, attributes: &[(&str, &str)]) -> DiscoveryEvent {
        DiscoveryEvent {
            asset_id: asset_id.to_string(),
            ts: 0,
            ttl: 3600,
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_match_by_asset_id() {
        assert!(rule_matches(&rule(), &event("mydevice", &[])));
        assert!(!rule_matches(&rule(), &event("otherdevice", &[])));
    }

    #[test]
    fn test_match_by_group_attribute() {
        assert!(rule_matches(
            &rule(),
            &event("somedev", &[("group.1", "mygroup")])
        ));
        assert!(rule_matches(
            &rule(),
            &event("somedev", &[("group.1", "other"), ("group.2", "mygroup")])
        ));
        assert!(!rule_matches(
            &rule(),
            &event("somedev", &[("group.1", "othergroup")])
        ));
        // la valeur doit venir d'un attribut group.N, pas d'une clé quelconque
        assert!(!rule_matches(
            &rule(),
            &event("somedev", &[("location", "mygroup")])
        ));
    }

    #[test]
    fn test_match_by_model() {
        assert!(rule_matches(
            &rule(),
            &event("somedev", &[("model", "XUPS-3000")])
        ));
        assert!(!rule_matches(
            &rule(),
            &event("somedev", &[("model", "XUPS-9000")])
        ));
    }

    #[test]
    fn test_match_by_device_part() {
        assert!(rule_matches(
            &rule(),
            &event("somedev", &[("device.part", "PN-778")])
        ));
        assert!(!rule_matches(
            &rule(),
            &event("somedev", &[("device.part", "PN-000")])
        ));
    }

    #[test]
    fn test_exact_equality_only() {
        assert!(!rule_matches(&rule(), &event("mydevice2", &[])));
        assert!(!rule_matches(&rule(), &event("MYDEVICE", &[])));
        assert!(!rule_matches(
            &rule(),
            &event("somedev", &[("group.1", "mygroup ")])
        ));
    }

    #[test]
    fn test_empty_rule_matches_nothing() {
        let empty = Rule::parse(r#"{"name": "none", "evaluation": ""}"#).unwrap();
        assert!(!rule_matches(
            &empty,
            &event("mydevice", &[("group.1", "mygroup"), ("model", "XUPS-3000")])
        ));
    }
}
