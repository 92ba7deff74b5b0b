//! Display name generation
//!
//! Issues `"<Adjective> <Noun>"` names from two fixed word lists. The
//! sequence walks every adjective against a rotating noun offset, so one
//! full cycle yields `ADJECTIVES.len() * NOUNS.len()` distinct pairs before
//! anything repeats. Uniqueness among live sessions is enforced separately
//! through the in-use set.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::AppError;

/// Number of distinct names in one cycle of the generator
pub const NAME_CYCLE_LEN: usize = ADJECTIVES.len() * NOUNS.len();

/// Cursor state, advanced on every candidate
#[derive(Debug)]
struct Cursor {
    adj_idx: usize,
    adj_offset: usize,
    noun_idx: usize,
    perm_idx: usize,
    noun_offsets: Vec<usize>,
}

impl Cursor {
    fn next(&mut self) -> String {
        let adj = ADJECTIVES[(self.adj_idx + self.adj_offset) % ADJECTIVES.len()];
        let noun = NOUNS[(self.noun_idx + self.noun_offsets[self.perm_idx]) % NOUNS.len()];

        self.adj_idx = (self.adj_idx + 1) % ADJECTIVES.len();
        self.noun_idx = (self.noun_idx + 1) % NOUNS.len();
        if self.adj_idx == 0 {
            self.noun_idx = 0;
            self.perm_idx = (self.perm_idx + 1) % self.noun_offsets.len();
        }

        format!("{} {}", adj, noun)
    }
}

/// Collision-free display name generator
///
/// Safe to share between connection tasks behind an `Arc`; both the cursor
/// and the in-use set sit behind their own lock and are never held across
/// an `.await`.
#[derive(Debug)]
pub struct NameGenerator {
    cursor: Mutex<Cursor>,
    in_use: Mutex<HashSet<String>>,
}

impl NameGenerator {
    /// Create a generator with a random adjective offset and noun permutation
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let mut noun_offsets: Vec<usize> = (0..NOUNS.len()).collect();
        noun_offsets.shuffle(&mut rng);
        let adj_offset = rng.gen_range(0..ADJECTIVES.len());

        debug!("Name generator seeded with adjective offset {}", adj_offset);
        Self::with_offsets(adj_offset, noun_offsets)
    }

    /// Create a generator with fixed offsets
    ///
    /// `adj_offset` and each noun offset are taken modulo their list length.
    /// An empty permutation falls back to the identity.
    pub fn with_offsets(adj_offset: usize, noun_offsets: Vec<usize>) -> Self {
        let noun_offsets = if noun_offsets.is_empty() {
            (0..NOUNS.len()).collect()
        } else {
            noun_offsets.into_iter().map(|o| o % NOUNS.len()).collect()
        };

        Self {
            cursor: Mutex::new(Cursor {
                adj_idx: 0,
                adj_offset: adj_offset % ADJECTIVES.len(),
                noun_idx: 0,
                perm_idx: 0,
                noun_offsets,
            }),
            in_use: Mutex::new(HashSet::new()),
        }
    }

    /// Produce the next candidate name and advance the cursor
    ///
    /// The candidate is not reserved; pass it to `try_reserve`.
    pub fn next_candidate(&self) -> String {
        self.cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next()
    }

    /// Atomically mark `name` as in use
    ///
    /// Returns false if a live session already holds it.
    pub fn try_reserve(&self, name: &str) -> bool {
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        if in_use.contains(name) {
            return false;
        }
        in_use.insert(name.to_string());
        true
    }

    /// Return `name` to the pool
    pub fn release(&self, name: &str) {
        self.in_use
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    /// Whether a live session holds `name`
    pub fn is_in_use(&self, name: &str) -> bool {
        self.in_use
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    /// Draw candidates until one can be reserved
    ///
    /// Gives up after one full cycle of collisions.
    pub fn issue(&self) -> Result<String, AppError> {
        for _ in 0..NAME_CYCLE_LEN {
            let candidate = self.next_candidate();
            if self.try_reserve(&candidate) {
                return Ok(candidate);
            }
            debug!("Name '{}' already in use, drawing again", candidate);
        }

        warn!("Every generated name is in use");
        Err(AppError::NamesExhausted)
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::new()
    }
}

pub const ADJECTIVES: [&str; 100] = [
    "Happy", "Sad", "Angry", "Joyful", "Melancholic", "Bright", "Dark", "Gloomy", "Cheerful",
    "Calm", "Nervous", "Excited", "Anxious", "Serene", "Fierce", "Gentle", "Brave", "Cowardly",
    "Bold", "Timid", "Strong", "Weak", "Lively", "Dull", "Energetic", "Lethargic", "Optimistic",
    "Pessimistic", "Confident", "Insecure", "Friendly", "Hostile", "Kind", "Cruel", "Generous",
    "Selfish", "Humble", "Arrogant", "Polite", "Rude", "Grateful", "Ungrateful", "Patient",
    "Impatient", "Loyal", "Disloyal", "Trustworthy", "Untrustworthy", "Caring", "Indifferent",
    "Empathetic", "Apathetic", "Creative", "Unimaginative", "Intelligent", "Foolish", "Wise",
    "Naive", "Curious", "Spirited", "Hardworking", "Lazy", "Organized", "Messy", "Reliable",
    "Unreliable", "Honest", "Deceitful", "Thoughtful", "Thoughtless", "Considerate",
    "Inconsiderate", "Respectful", "Disrespectful", "Adaptable", "Rigid", "Ambitious",
    "Unambitious", "Assertive", "Passive", "Attentive", "Distracted", "Charming", "Repellent",
    "Compassionate", "Heartless", "Determined", "Indecisive", "Disciplined", "Enthusiastic",
    "Zealous", "Forgiving", "Vindictive", "Humorous", "Serious", "Imaginative", "Literal",
    "Loquacious", "Meticulous", "Careless",
];

pub const NOUNS: [&str; 100] = [
    "Apple", "Banana", "Cherry", "Fig", "Grape", "Jackfruit", "Lemon", "Mango", "Orange",
    "Quince", "Strawberry", "Ugli fruit", "Watermelon", "Apricot", "Coconut", "Olive", "Avocado",
    "Plum", "Dragonfruit", "Mandarin", "Dog", "Elephant", "Horse", "Iguana", "Kangaroo", "Newt",
    "Penguin", "Rabbit", "Tiger", "Vulture", "Xerus", "Yak", "Zebra", "Bear", "Dolphin", "Eagle",
    "Giraffe", "Hawk", "Insect", "Jaguar", "Monkey", "Nightingale", "Parrot", "Quail", "Raccoon",
    "Squirrel", "Tortoise", "Uakari", "Viper", "Walrus", "Wombat", "Zebu", "Bat", "Duck", "Emu",
    "Frog", "Goose", "Hamster", "Ibis", "Jellyfish", "Lion", "Mole", "Ostrich", "Peacock",
    "Quokka", "Rhinoceros", "Snake", "Toucan", "Urial", "Wolf", "Xenopus", "Yeti crab", "Okapi",
    "Cheetah", "Echidna", "Fennec", "Guinea pig", "Hedgehog", "Impala", "Jay", "Koala", "Lynx",
    "Narwhal", "Ocelot", "Panda", "Raven", "Sloth", "Tapir", "Urchin", "Badger", "Camel",
    "Donkey", "Ferret", "Gecko", "Heron", "Kiwi", "Lemur", "Marmot", "Otter", "Pelican",
];
