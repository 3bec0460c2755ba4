//! Front-matter extraction.
//!
//! A chapter may start with a metadata block delimited by two `---` lines.
//! The block is removed from the body and its scalar fields kept as strings.

use serde_yaml::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

const DELIMITER: &str = "---";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrontMatterError {
    #[error("front-matter opened on line 1 is never closed")]
    Unterminated,
}

/// A chapter split into metadata and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted<'a> {
    pub fields: BTreeMap<String, String>,
    pub body: &'a str,
}

enum State {
    Start,
    InFrontMatter { yaml_start: usize },
}

/// Split `input` into front-matter fields and the remaining body.
///
/// Input without a leading delimiter line is returned whole as the body.
pub fn extract(input: &str) -> Result<Extracted<'_>, FrontMatterError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut state = State::Start;
    let mut offset = 0;

    for line in input.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim_end();

        state = match state {
            State::Start if trimmed == DELIMITER => State::InFrontMatter { yaml_start: offset },
            State::Start => {
                return Ok(Extracted {
                    fields: BTreeMap::new(),
                    body: input,
                })
            }
            State::InFrontMatter { yaml_start } if trimmed == DELIMITER => {
                return Ok(Extracted {
                    fields: parse_fields(&input[yaml_start..line_start]),
                    body: &input[offset..],
                });
            }
            in_block => in_block,
        };
    }

    match state {
        State::Start => Ok(Extracted {
            fields: BTreeMap::new(),
            body: input,
        }),
        State::InFrontMatter { .. } => Err(FrontMatterError::Unterminated),
    }
}

/// Parse YAML and keep scalar values as strings.
///
/// A block that is not valid YAML is logged and treated as empty: only an
/// unterminated block is fatal.
fn parse_fields(yaml: &str) -> BTreeMap<String, String> {
    if yaml.trim().is_empty() {
        return BTreeMap::new();
    }

    let value: Value = match serde_yaml::from_str(yaml) {
        Ok(value) => value,
        Err(e) => {
            warn!("Ignoring unparsable front-matter: {}", e);
            return BTreeMap::new();
        }
    };

    let Value::Mapping(map) = value else {
        return BTreeMap::new();
    };

    map.into_iter()
        .filter_map(|(key, value)| {
            let key = key.as_str()?.to_string();
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key, value))
        })
        .collect()
}
