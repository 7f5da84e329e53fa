use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type VerbId = i32;

pub const VERB_WALKTO: VerbId = 1;
pub const VERB_LOOKAT: VerbId = 2;
pub const VERB_TALKTO: VerbId = 3;
pub const VERB_PICKUP: VerbId = 4;
pub const VERB_OPEN: VerbId = 5;
pub const VERB_CLOSE: VerbId = 6;
pub const VERB_PUSH: VerbId = 7;
pub const VERB_PULL: VerbId = 8;
pub const VERB_GIVE: VerbId = 9;
pub const VERB_USE: VerbId = 10;
pub const VERB_DIALOG: VerbId = 13;

/// Verb used when an entity does not declare `default_verb`.
pub const FALLBACK_DEFAULT_VERB: VerbId = VERB_LOOKAT;

/// Verbs that play a reach pose before their handler runs.
pub const REACH_VERBS: [VerbId; 6] = [
    VERB_PICKUP,
    VERB_OPEN,
    VERB_CLOSE,
    VERB_PUSH,
    VERB_PULL,
    VERB_USE,
];

/// Resolves a verb written as a number or a name such as `pickup` or `look_at`.
pub fn parse_verb(value: &str) -> Option<VerbId> {
    if let Ok(id) = value.trim().parse::<VerbId>() {
        return Some(id);
    }
    let normalized: String = value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    let id = match normalized.as_str() {
        "walkto" | "walk" => VERB_WALKTO,
        "lookat" | "look" => VERB_LOOKAT,
        "talkto" | "talk" => VERB_TALKTO,
        "pickup" => VERB_PICKUP,
        "open" => VERB_OPEN,
        "close" => VERB_CLOSE,
        "push" => VERB_PUSH,
        "pull" => VERB_PULL,
        "give" => VERB_GIVE,
        "use" => VERB_USE,
        "dialog" => VERB_DIALOG,
        _ => return None,
    };
    Some(id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbDescriptor {
    pub id: VerbId,
    /// Script function invoked on the target entity.
    pub func: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl VerbDescriptor {
    pub fn new(id: VerbId, func: &str) -> Self {
        Self {
            id,
            func: func.to_string(),
            text: None,
        }
    }

    pub fn plays_reach(&self) -> bool {
        REACH_VERBS.contains(&self.id)
    }
}

/// Fixed verb table consulted while resolving sentences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerbTable {
    verbs: BTreeMap<VerbId, VerbDescriptor>,
    default_verb: VerbId,
}

impl Default for VerbTable {
    fn default() -> Self {
        Self::from_descriptors([
            VerbDescriptor::new(VERB_WALKTO, "walkto"),
            VerbDescriptor::new(VERB_LOOKAT, "verbLookAt"),
            VerbDescriptor::new(VERB_TALKTO, "verbTalkTo"),
            VerbDescriptor::new(VERB_PICKUP, "verbPickUp"),
            VerbDescriptor::new(VERB_OPEN, "verbOpen"),
            VerbDescriptor::new(VERB_CLOSE, "verbClose"),
            VerbDescriptor::new(VERB_PUSH, "verbPush"),
            VerbDescriptor::new(VERB_PULL, "verbPull"),
            VerbDescriptor::new(VERB_GIVE, "verbGive"),
            VerbDescriptor::new(VERB_USE, "verbUse"),
        ])
    }
}

impl VerbTable {
    pub fn from_descriptors<I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = VerbDescriptor>,
    {
        let verbs = descriptors
            .into_iter()
            .map(|descriptor| (descriptor.id, descriptor))
            .collect();
        Self {
            verbs,
            default_verb: VERB_WALKTO,
        }
    }

    pub fn get(&self, id: VerbId) -> Option<&VerbDescriptor> {
        self.verbs.get(&id)
    }

    /// Verb the UI falls back to once a sentence finishes.
    pub fn default_verb(&self) -> VerbId {
        self.default_verb
    }

    pub fn len(&self) -> usize {
        self.verbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VerbDescriptor> {
        self.verbs.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_sentence_verbs() {
        let table = VerbTable::default();
        for id in [VERB_LOOKAT, VERB_PICKUP, VERB_GIVE, VERB_USE, VERB_TALKTO] {
            assert!(table.get(id).is_some(), "verb {id} missing");
        }
        assert!(table.get(VERB_DIALOG).is_none());
        assert_eq!(table.default_verb(), VERB_WALKTO);
        assert_eq!(table.get(VERB_OPEN).map(|v| v.func.as_str()), Some("verbOpen"));
    }

    #[test]
    fn reach_verbs_exclude_look_and_talk() {
        let table = VerbTable::default();
        let reach: Vec<VerbId> = table
            .iter()
            .filter(|verb| verb.plays_reach())
            .map(|verb| verb.id)
            .collect();
        assert_eq!(reach, REACH_VERBS.to_vec());
    }

    #[test]
    fn parses_verb_names_and_numbers() {
        assert_eq!(parse_verb("pickup"), Some(VERB_PICKUP));
        assert_eq!(parse_verb("Look_At"), Some(VERB_LOOKAT));
        assert_eq!(parse_verb("10"), Some(VERB_USE));
        assert_eq!(parse_verb("dance"), None);
    }
}
