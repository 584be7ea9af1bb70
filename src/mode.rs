//! Named build profiles ("modes"), each contributing extra command tokens
//! wherever an action says `$mode`.

use crate::command::Token;
use crate::smallmap::SmallMap;

pub const DEFAULT_MODE: &str = "debug";

pub struct ModeRegistry {
    modes: SmallMap<String, Vec<Token>>,
}

impl Default for ModeRegistry {
    /// `debug` and `release` always exist; manifests may redefine them.
    fn default() -> Self {
        let mut modes = SmallMap::default();
        modes.insert(DEFAULT_MODE.to_string(), Vec::new());
        modes.insert("release".to_string(), Vec::new());
        ModeRegistry { modes }
    }
}

impl ModeRegistry {
    pub fn register(&mut self, name: &str, tokens: Vec<Token>) {
        self.modes.insert(name.to_string(), tokens);
    }

    pub fn get(&self, name: &str) -> Option<&[Token]> {
        self.modes.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modes.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }
}
