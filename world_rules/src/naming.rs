//! Naming oracle - turns an entity type plus loose context into a display name.
//!
//! The simulation treats naming as an external collaborator. Any implementation
//! must tolerate missing context keys and always return a usable string.

use rand::Rng;
use std::collections::BTreeMap;

use crate::entities::EntityType;

/// String context passed to a naming oracle, e.g. `base_name`, `style`, `deity`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameContext {
    values: BTreeMap<String, String>,
}

impl NameContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set a context value.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value for `key`, or `fallback` when it is missing or blank.
    pub fn get_or<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
        self.get(key).filter(|v| !v.trim().is_empty()).unwrap_or(fallback)
    }
}

/// Produces names for new entities. Never fails.
pub trait NamingOracle {
    fn generate_name(&mut self, entity_type: EntityType, context: &NameContext) -> String;
}

/// Consonant and vowel sets for a naming style.
struct Phonemes {
    consonants: &'static [u8],
    vowels: &'static [u8],
}

const HARSH: Phonemes = Phonemes {
    consonants: b"zgkrstbh",
    vowels: b"auo",
};
const FLOWING: Phonemes = Phonemes {
    consonants: b"lmnrstvwy",
    vowels: b"aeio",
};
const PLAIN: Phonemes = Phonemes {
    consonants: b"bcdfghjklmnpqrstvwxz",
    vowels: b"aeiouy",
};

/// Procedural C-V syllable namer driven by an injected RNG.
pub struct SyllableNamer<R> {
    rng: R,
}

impl<R: Rng> SyllableNamer<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// A capitalised 2-3 syllable word in the given style.
    pub fn word(&mut self, style: &str) -> String {
        let phonemes = match style {
            "orc" | "beast" | "harsh" => &HARSH,
            "elf" | "spirit" | "flowing" => &FLOWING,
            _ => &PLAIN,
        };

        let syllables = self.rng.gen_range(2..=3);
        let mut word = String::new();
        for i in 0..syllables {
            let c = char::from(phonemes.consonants[self.rng.gen_range(0..phonemes.consonants.len())]);
            if i == 0 {
                word.push(c.to_ascii_uppercase());
            } else {
                word.push(c);
            }
            word.push(char::from(phonemes.vowels[self.rng.gen_range(0..phonemes.vowels.len())]));
        }
        if self.rng.gen_bool(0.5) {
            word.push(char::from(phonemes.consonants[self.rng.gen_range(0..phonemes.consonants.len())]));
        }
        word
    }
}

impl<R: Rng> NamingOracle for SyllableNamer<R> {
    fn generate_name(&mut self, entity_type: EntityType, context: &NameContext) -> String {
        let style = context.get_or("style", "plain").to_string();
        let root = self.word(&style);

        match entity_type {
            EntityType::Biome => format!("{root} {}", context.get_or("base_name", "Wilds")),
            EntityType::Location => format!("{root} {}", context.get_or("base_name", "Settlement")),
            EntityType::Resource => {
                format!("{} of {root}", context.get_or("name_key", "Deposit"))
            }
            EntityType::Faction => format!("{root} {}", context.get_or("group_noun", "Clan")),
            EntityType::Belief => {
                let deity = context.get("deity").map(str::to_string).unwrap_or(root);
                format!("{} of {deity}", context.get_or("base_name", "Cult"))
            }
            EntityType::Boss => context
                .get("name_template")
                .map(|t| t.replace("{name}", &root))
                .unwrap_or(root),
            _ => root,
        }
    }
}
