//! Random nickname generator.
//!
//! Produces nicknames in the format `AdjectiveNounNN` (e.g. `RedFox42`),
//! short enough for the 9-character limit of RFC 2812 servers.

use rand::RngExt;

const ADJECTIVES: &[&str] = &[
    "Red", "Neo", "Dark", "Odd", "Shy", "Sly", "Icy", "Hex", "Zen", "Wry", "Blue", "Grey", "Wild",
    "Fast", "Cold", "Lost",
];

const NOUNS: &[&str] = &[
    "Fox", "Owl", "Elk", "Yak", "Bat", "Ant", "Cat", "Eel", "Emu", "Jay", "Ram", "Cod", "Gnu",
    "Koi", "Pug", "Rat",
];

pub const MAX_NICK_LEN: usize = 9;

/// Generate a random nickname like `RedFox42`.
pub fn generate_nickname() -> String {
    let mut rng = rand::rng();
    let adj = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    let num: u8 = rng.random_range(0..100);
    format!("{}{}{}", adj, noun, num)
}
