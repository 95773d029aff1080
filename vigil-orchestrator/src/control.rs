//! Canal de contrôle de l'orchestrateur.
//!
//! Les commandes arrivent en trames texte, premier jeton = nom de commande.
//! Le décodage produit un enum fermé ; une commande inconnue ou mal formée
//! donne `None` et est silencieusement ignorée par la boucle de contrôle.

use tokio::sync::mpsc;

/// Commande décodée du canal de contrôle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// BIND <endpoint> <identité> : connecte le client bus
    Bind { endpoint: String, identity: String },
    /// PRODUCER <stream> : enregistre le stream de publication
    Producer { stream: String },
    /// CONSUMER <stream> <pattern> : abonnement au stream devices
    Consumer { stream: String, pattern: String },
    /// LOADRULES <dossier>
    LoadRules { dir: String },
    /// LOADCREDENTIALS <fichier>
    LoadCredentials { file: String },
    /// TTL <entier> : nouvelle base de TTL
    Ttl { base: u32 },
    /// RULE <document json>
    Rule { document: String },
    /// WAKEUP : relayé à tous les workers vivants
    Wakeup,
    /// $TERM : arrêt immédiat de la boucle
    Terminate,
}

impl ControlCommand {
    /// Décode une trame. `None` = commande ignorée.
    pub fn decode(frames: &[String]) -> Option<Self> {
        let mut args = frames.iter();
        let name = args.next()?;
        match name.as_str() {
            "$TERM" => Some(Self::Terminate),
            "WAKEUP" => Some(Self::Wakeup),
            "BIND" => Some(Self::Bind {
                endpoint: args.next()?.clone(),
                identity: args.next()?.clone(),
            }),
            "PRODUCER" => Some(Self::Producer {
                stream: args.next()?.clone(),
            }),
            "CONSUMER" => Some(Self::Consumer {
                stream: args.next()?.clone(),
                pattern: args.next()?.clone(),
            }),
            "LOADRULES" => Some(Self::LoadRules {
                dir: args.next()?.clone(),
            }),
            "LOADCREDENTIALS" => Some(Self::LoadCredentials {
                file: args.next()?.clone(),
            }),
            "TTL" => args.next()?.parse().ok().map(|base| Self::Ttl { base }),
            "RULE" => Some(Self::Rule {
                document: args.next()?.clone(),
            }),
            _ => None,
        }
    }
}

/// Poignée de contrôle : côté émetteur du canal. Lâcher toutes les poignées
/// vaut signal d'arrêt pour la boucle.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<Vec<String>>,
}

impl ControlHandle {
    /// Envoie une trame brute. Une commande envoyée après l'arrêt de la
    /// boucle est perdue sans erreur.
    pub fn send(&self, frames: &[&str]) {
        let frames: Vec<String> = frames.iter().map(|s| s.to_string()).collect();
        let _ = self.tx.send(frames);
    }

    pub fn bind(&self, endpoint: &str, identity: &str) {
        self.send(&["BIND", endpoint, identity]);
    }

    pub fn producer(&self, stream: &str) {
        self.send(&["PRODUCER", stream]);
    }

    pub fn consumer(&self, stream: &str, pattern: &str) {
        self.send(&["CONSUMER", stream, pattern]);
    }

    pub fn load_rules(&self, dir: &str) {
        self.send(&["LOADRULES", dir]);
    }

    pub fn load_credentials(&self, file: &str) {
        self.send(&["LOADCREDENTIALS", file]);
    }

    pub fn ttl(&self, base: u32) {
        self.send(&["TTL", &base.to_string()]);
    }

    pub fn rule(&self, document: &str) {
        self.send(&["RULE", document]);
    }

    pub fn wakeup(&self) {
        self.send(&["WAKEUP"]);
    }

    pub fn terminate(&self) {
        self.send(&["$TERM"]);
    }
}

pub(crate) fn control_channel() -> (ControlHandle, mpsc::UnboundedReceiver<Vec<String>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControlHandle { tx }, rx)
}
