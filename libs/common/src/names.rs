//! Random "AdjectiveNoun" display names.

use std::path::Path;

use rand::seq::SliceRandom;
use serde::Deserialize;
use thiserror::Error;

const BUILTIN_ADJECTIVES: &[&str] = &[
    "silly", "brave", "quiet", "rapid", "fuzzy", "lucky", "sneaky", "jolly", "mellow", "shiny",
    "witty", "bouncy", "clever", "dizzy", "eager", "fancy", "gentle", "happy", "nimble", "plucky",
    "rusty", "sleepy", "spicy", "tiny", "wobbly", "zesty", "cosmic", "crispy", "daring", "grumpy",
];

const BUILTIN_NOUNS: &[&str] = &[
    "otter", "falcon", "badger", "pickle", "comet", "walrus", "noodle", "penguin", "cactus",
    "lobster", "mango", "panda", "raccoon", "turnip", "yak", "beetle", "goblin", "hamster",
    "kettle", "lemur", "muffin", "narwhal", "octopus", "pretzel", "quokka", "robot", "squid",
    "tiger", "waffle", "zebra",
];

#[derive(Debug, Error)]
pub enum NameError {
    #[error("failed to read word list {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse word list {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("word list has no {0}")]
    Empty(&'static str),
}

/// On-disk layout of a word list file.
#[derive(Debug, Deserialize)]
struct WordList {
    adjectives: Vec<String>,
    nouns: Vec<String>,
}

/// Generates display names like `SillyOtter`.
///
/// Built once at startup and shared; picking a phrase does not mutate it.
#[derive(Debug, Clone)]
pub struct NameGenerator {
    adjectives: Vec<String>,
    nouns: Vec<String>,
}

impl NameGenerator {
    pub fn new(adjectives: Vec<String>, nouns: Vec<String>) -> Result<Self, NameError> {
        let adjectives: Vec<String> = adjectives.into_iter().filter(|w| !w.trim().is_empty()).collect();
        let nouns: Vec<String> = nouns.into_iter().filter(|w| !w.trim().is_empty()).collect();
        if adjectives.is_empty() {
            return Err(NameError::Empty("adjectives"));
        }
        if nouns.is_empty() {
            return Err(NameError::Empty("nouns"));
        }
        Ok(Self { adjectives, nouns })
    }

    /// The compiled-in word list.
    pub fn builtin() -> Self {
        Self {
            adjectives: BUILTIN_ADJECTIVES.iter().map(|w| w.to_string()).collect(),
            nouns: BUILTIN_NOUNS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Load a `{ "adjectives": [...], "nouns": [...] }` JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, NameError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|source| NameError::Read {
            path: display.clone(),
            source,
        })?;
        let list: WordList = serde_json::from_slice(&bytes).map_err(|source| NameError::Parse {
            path: display,
            source,
        })?;
        Self::new(list.adjectives, list.nouns)
    }

    /// A random capitalized adjective followed by a capitalized noun.
    pub fn phrase(&self) -> String {
        let mut rng = rand::thread_rng();
        // Both lists are non-empty by construction.
        let adjective = self.adjectives.choose(&mut rng).map(String::as_str).unwrap_or_default();
        let noun = self.nouns.choose(&mut rng).map(String::as_str).unwrap_or_default();
        format!("{}{}", capitalize(adjective), capitalize(noun))
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::builtin()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
