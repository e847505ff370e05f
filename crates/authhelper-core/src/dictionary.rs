//! Line-oriented `key=value` dictionaries.
//!
//! Used both for configuration text and for the helper's stdin/stdout
//! protocol. Parsing is per line and never fails as a whole: lines without
//! `=` or with an empty key are dropped and parsing continues.

use std::collections::HashMap;
use std::io::{self, BufRead, Read, Write};

/// How to resolve a key that appears more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateKeys {
    /// The value from the last line wins
    #[default]
    LastWins,
    /// The value from the first line wins
    FirstWins,
}

/// Parser for `key=value` text with an explicit duplicate key policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DictionaryParser {
    duplicate_keys: DuplicateKeys,
}

impl DictionaryParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duplicate_keys(mut self, policy: DuplicateKeys) -> Self {
        self.duplicate_keys = policy;
        self
    }

    /// Parse every line of `text`. Blank lines are skipped.
    pub fn parse(&self, text: &str) -> HashMap<String, String> {
        let mut dict = HashMap::new();
        for line in text.lines() {
            self.parse_line(&mut dict, line);
        }
        dict
    }

    /// Read all bytes from `reader` (invalid UTF-8 is replaced) and parse them.
    pub fn parse_reader(&self, mut reader: impl Read) -> io::Result<HashMap<String, String>> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(self.parse(&String::from_utf8_lossy(&bytes)))
    }

    fn parse_line(&self, dict: &mut HashMap<String, String>, line: &str) {
        let Some((key, value)) = line.split_once('=') else {
            return;
        };

        let key = key.trim();
        if key.is_empty() {
            return;
        }

        let value = value.trim().to_string();
        match self.duplicate_keys {
            DuplicateKeys::LastWins => {
                dict.insert(key.to_string(), value);
            }
            DuplicateKeys::FirstWins => {
                dict.entry(key.to_string()).or_insert(value);
            }
        }
    }
}

/// Parse configuration text with the default (last wins) policy.
pub fn dictionary_from_config(text: &str) -> HashMap<String, String> {
    DictionaryParser::new().parse(text)
}

/// Read everything available from `reader` and parse it as configuration text.
pub fn dictionary_from_file_handle(reader: impl Read) -> io::Result<HashMap<String, String>> {
    DictionaryParser::new().parse_reader(reader)
}

/// Read a protocol dictionary, stopping at the first blank line or at EOF.
///
/// The parent process may keep its end of the pipe open after sending the
/// terminating blank line, so this must not wait for EOF.
pub fn read_dictionary(reader: impl BufRead) -> io::Result<HashMap<String, String>> {
    let parser = DictionaryParser::new();
    let mut dict = HashMap::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            break;
        }
        parser.parse_line(&mut dict, &line);
    }

    Ok(dict)
}

/// Write `key=value` lines sorted by key, followed by a terminating blank line.
pub fn write_dictionary(mut writer: impl Write, dict: &HashMap<String, String>) -> io::Result<()> {
    let mut entries: Vec<_> = dict.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (key, value) in entries {
        writeln!(writer, "{key}={value}")?;
    }
    writeln!(writer)?;
    writer.flush()
}

/// Case-insensitive lookup, for protocol keys such as `clientId`.
pub fn get_ignore_case<'a>(dict: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    dict.get(key)
        .or_else(|| {
            dict.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}
