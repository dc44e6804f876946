// Copyright 2018 Ian Johnson

// This file is part of Chip-8.

// Chip-8 is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Chip-8 is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Chip-8.  If not, see <http://www.gnu.org/licenses/>.

//! Mapping host keys to Chip-8 keys.
//!
//! A key configuration binds host key names (whatever the front end calls
//! its keys, such as `X` or `DIGIT1`) to actions on the Chip-8 keypad.  It is
//! stored as text:
//!
//! ```text
//! config{
//! DIGIT1 = 1
//! X = 0
//! }
//! ```
//!
//! Entries that cannot be understood are skipped, so a partly damaged file
//! still yields every binding that can be read.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use combine::Parser;
use failure::{Error, ResultExt};

use input::{Key, Keypad, UnknownKeyNameError};
use parse::binding;
use util::format_parse_error;

/// The default location of the key configuration file.
pub const DEFAULT_PATH: &str = "config/controls.dat";

/// The first line of a key configuration.
const HEADER: &str = "config{";
/// The last line of a key configuration.
const FOOTER: &str = "}";

/// An error resulting from text that is not a key configuration at all.
#[derive(Debug, Fail)]
#[fail(display = "not a key configuration: {}", _0)]
pub struct MalformedConfigurationError(String);

/// The name of a key on the host keyboard.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostKey(String);

impl HostKey {
    pub fn new<S: Into<String>>(name: S) -> Self {
        HostKey(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'a> From<&'a str> for HostKey {
    fn from(name: &'a str) -> Self {
        HostKey::new(name)
    }
}

/// What happens when a host key is pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Presses the given Chip-8 key.
    Press(Key),
    /// Does nothing.
    Nop,
}

impl KeyAction {
    /// Applies the action to the keypad.
    pub fn trigger(&self, keypad: &Keypad) {
        if let KeyAction::Press(key) = *self {
            keypad.press(key);
        }
    }

    /// Returns the Chip-8 key this action presses, if any.
    pub fn key(&self) -> Option<Key> {
        match *self {
            KeyAction::Press(key) => Some(key),
            KeyAction::Nop => None,
        }
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            KeyAction::Press(key) => write!(f, "{}", key),
            KeyAction::Nop => write!(f, "NOP"),
        }
    }
}

impl FromStr for KeyAction {
    type Err = UnknownKeyNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "NOP" {
            Ok(KeyAction::Nop)
        } else {
            s.parse().map(KeyAction::Press)
        }
    }
}

/// A set of host key bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConfiguration {
    bindings: BTreeMap<HostKey, KeyAction>,
}

impl KeyConfiguration {
    /// Returns the standard layout, which maps the left side of a QWERTY
    /// keyboard onto the Chip-8 keypad.
    pub fn new() -> Self {
        use input::Key::*;
        use self::KeyAction::Press;

        KeyConfiguration {
            bindings: btreemap!{
                HostKey::from("X") => Press(K0),
                HostKey::from("DIGIT1") => Press(K1),
                HostKey::from("DIGIT2") => Press(K2),
                HostKey::from("DIGIT3") => Press(K3),
                HostKey::from("Q") => Press(K4),
                HostKey::from("W") => Press(K5),
                HostKey::from("E") => Press(K6),
                HostKey::from("A") => Press(K7),
                HostKey::from("S") => Press(K8),
                HostKey::from("D") => Press(K9),
                HostKey::from("Z") => Press(KA),
                HostKey::from("C") => Press(KB),
                HostKey::from("DIGIT4") => Press(KC),
                HostKey::from("R") => Press(KD),
                HostKey::from("F") => Press(KE),
                HostKey::from("V") => Press(KF),
            },
        }
    }

    /// Returns a configuration with exactly the given bindings.
    pub fn from_bindings(bindings: BTreeMap<HostKey, KeyAction>) -> Self {
        KeyConfiguration { bindings }
    }

    /// Replaces every binding.
    pub fn set_bindings(&mut self, bindings: BTreeMap<HostKey, KeyAction>) {
        self.bindings = bindings;
    }

    pub fn bindings(&self) -> &BTreeMap<HostKey, KeyAction> {
        &self.bindings
    }

    /// Returns whether the given host key is bound.
    pub fn contains(&self, key: &HostKey) -> bool {
        self.bindings.contains_key(key)
    }

    /// Returns the action bound to the given host key, or `Nop` if there is
    /// none.
    pub fn get_or_noop(&self, key: &HostKey) -> KeyAction {
        self.bindings.get(key).cloned().unwrap_or(KeyAction::Nop)
    }

    /// Loads a configuration from the given file.
    ///
    /// Falls back to the standard layout if the file cannot be read or is
    /// not a key configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let loaded = fs::read_to_string(path)
            .context("could not read key configuration")
            .map_err(Error::from)
            .and_then(|text| text.parse::<KeyConfiguration>());

        match loaded {
            Ok(config) => {
                info!("loaded key configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    "{}: {}; using the standard layout",
                    path.display(),
                    e.iter_chain()
                        .map(|c| c.to_string())
                        .collect::<Vec<_>>()
                        .join(": ")
                );
                KeyConfiguration::new()
            }
        }
    }

    /// Writes the configuration to the given file, creating its directory
    /// if needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|_| format!("could not create {}", dir.display()))?;
            }
        }
        fs::write(path, self.to_string())
            .with_context(|_| format!("could not write {}", path.display()))?;
        Ok(())
    }
}

impl Default for KeyConfiguration {
    fn default() -> Self {
        KeyConfiguration::new()
    }
}

impl fmt::Display for KeyConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", HEADER)?;
        for (key, action) in self.bindings.iter() {
            writeln!(f, "{} = {}", key, action)?;
        }
        write!(f, "{}", FOOTER)
    }
}

impl FromStr for KeyConfiguration {
    type Err = Error;

    /// Parses a configuration, skipping entries that cannot be understood.
    ///
    /// The text must start with `config{` and end with `}`; anything else is
    /// rejected as a whole.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lines = s.lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>();
        match (lines.first(), lines.last()) {
            (Some(&HEADER), Some(&FOOTER)) if lines.len() >= 2 => {}
            _ => Err(MalformedConfigurationError(format!(
                "expected '{}' ... '{}'",
                HEADER, FOOTER
            )))?,
        }

        let mut bindings = BTreeMap::new();
        for line in &lines[1..lines.len() - 1] {
            match parse_entry(line) {
                Ok((key, action)) => {
                    bindings.insert(key, action);
                }
                Err(e) => debug!("skipping key binding '{}': {}", line, e),
            }
        }
        Ok(KeyConfiguration { bindings })
    }
}

/// Parses a single `HOST_KEY = VALUE` line.
fn parse_entry(line: &str) -> Result<(HostKey, KeyAction), Error> {
    let ((key, value), rest) = binding()
        .parse(line)
        .map_err(|e| MalformedConfigurationError(format_parse_error(&e)))?;
    if !rest.is_empty() {
        Err(MalformedConfigurationError(format!("unexpected '{}'", rest)))?;
    }
    let action = value.parse::<KeyAction>()?;
    Ok((HostKey::new(key), action))
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;

    use input::{Key, Keypad};

    use super::*;

    #[test]
    fn standard_layout() {
        let config = KeyConfiguration::new();

        // Test cases, in the format (host key, Chip-8 key).
        let cases = [
            ("X", Key::K0),
            ("DIGIT1", Key::K1),
            ("Q", Key::K4),
            ("D", Key::K9),
            ("Z", Key::KA),
            ("DIGIT4", Key::KC),
            ("V", Key::KF),
        ];
        for &(host, key) in cases.iter() {
            let host = HostKey::from(host);
            assert!(config.contains(&host), "case {}", host);
            assert_eq!(config.get_or_noop(&host), KeyAction::Press(key), "case {}", host);
        }
        assert_eq!(config.bindings().len(), 16);
        assert_eq!(config.get_or_noop(&HostKey::from("P")), KeyAction::Nop);
        assert!(!config.contains(&HostKey::from("P")));
    }

    #[test]
    fn trigger() {
        let keypad = Keypad::new();

        KeyAction::Nop.trigger(&keypad);
        assert_eq!(keypad.pressed(), None);
        KeyAction::Press(Key::KE).trigger(&keypad);
        assert_eq!(keypad.pressed(), Some(Key::KE));
    }

    #[test]
    fn text_format() {
        let config = KeyConfiguration::from_bindings(btreemap!{
            HostKey::from("X") => KeyAction::Press(Key::K0),
            HostKey::from("B") => KeyAction::Nop,
        });

        assert_eq!(config.to_string(), "config{\nB = NOP\nX = 0\n}");
        assert_eq!(config.to_string().parse::<KeyConfiguration>().unwrap(), config);
        assert_eq!(
            KeyConfiguration::new()
                .to_string()
                .parse::<KeyConfiguration>()
                .unwrap(),
            KeyConfiguration::new()
        );
    }

    /// Tests that bad entries are skipped without losing the good ones.
    #[test]
    fn skips_bad_entries() {
        let text = "config{\nX = 0\nQ = G\nW 5\n= 7\nE = 6 6\nNUMPAD_1 = a\n}\n";

        let config = text.parse::<KeyConfiguration>().unwrap();
        assert_eq!(
            config.bindings(),
            &btreemap!{
                HostKey::from("X") => KeyAction::Press(Key::K0),
                HostKey::from("NUMPAD_1") => KeyAction::Press(Key::KA),
            }
        );
    }

    #[test]
    fn rejects_missing_frame() {
        for &text in ["", "X = 0", "config{\nX = 0", "X = 0\n}", "}"].iter() {
            let err = text.parse::<KeyConfiguration>().unwrap_err();
            assert!(
                err.downcast_ref::<MalformedConfigurationError>().is_some(),
                "case {:?}",
                text
            );
        }
        assert_eq!(
            "config{\n}".parse::<KeyConfiguration>().unwrap().bindings().len(),
            0
        );
    }

    #[test]
    fn save_and_load() {
        let dir = env::temp_dir().join(format!("chip8vm-keys-{}", ::std::process::id()));
        let path = dir.join("nested").join("controls.dat");
        let config = KeyConfiguration::from_bindings(btreemap!{
            HostKey::from("SPACE") => KeyAction::Press(Key::K5),
        });

        config.save(&path).unwrap();
        assert_eq!(KeyConfiguration::load(&path), config);

        fs::write(&path, "garbage").unwrap();
        assert_eq!(KeyConfiguration::load(&path), KeyConfiguration::new());
        assert_eq!(
            KeyConfiguration::load(dir.join("missing.dat")),
            KeyConfiguration::new()
        );
        fs::remove_dir_all(&dir).unwrap();
    }
}
