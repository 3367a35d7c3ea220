//! Resource declaration files.
//!
//! One declaration per line, PDDL-flavoured:
//!
//! ```text
//! (:resource fuel 10 0 1)
//! (:resource battery(rover1) 4 0 2)
//! ```
//!
//! Fields are name, maximum, minimum and capacity consumed per use. Blank
//! lines and `;` comments are skipped.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub name: String,
    pub max: i64,
    pub min: i64,
    pub delta: i64,
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource file `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("resource file line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

pub fn parse_resource_file(path: &Path) -> Result<IndexMap<String, ResourceSpec>, ResourceError> {
    let text = std::fs::read_to_string(path).map_err(|source| ResourceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_resources(&text)
}

pub fn parse_resources(text: &str) -> Result<IndexMap<String, ResourceSpec>, ResourceError> {
    let mut specs = IndexMap::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            continue;
        }
        let inner = trimmed
            .strip_prefix("(:resource")
            .filter(|rest| rest.starts_with(char::is_whitespace))
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| ResourceError::Parse {
                line,
                reason: format!("expected `(:resource <name> <max> <min> <delta>)`, got `{trimmed}`"),
            })?;
        let fields: Vec<&str> = inner.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(ResourceError::Parse {
                line,
                reason: format!("expected 4 fields, got {}", fields.len()),
            });
        }
        let number = |field: &str| {
            field.parse::<i64>().map_err(|_| ResourceError::Parse {
                line,
                reason: format!("`{field}` is not an integer"),
            })
        };
        let spec = ResourceSpec {
            name: fields[0].to_string(),
            max: number(fields[1])?,
            min: number(fields[2])?,
            delta: number(fields[3])?,
        };
        specs.insert(spec.name.clone(), spec);
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_declarations_and_skips_comments() {
        let text = "; robot fleet\n\n(:resource fuel 10 0 1)\n(:resource battery(rover1) 4 0 2)\n";
        let specs = parse_resources(text).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(
            specs["fuel"],
            ResourceSpec {
                name: "fuel".into(),
                max: 10,
                min: 0,
                delta: 1
            }
        );
        assert_eq!(specs["battery(rover1)"].delta, 2);
    }

    #[test]
    fn rejects_malformed_lines() {
        let err = parse_resources("(:resource fuel 10 0)").unwrap_err();
        assert!(matches!(err, ResourceError::Parse { line: 1, .. }));
        let err = parse_resources("resource fuel 10 0 1").unwrap_err();
        assert!(matches!(err, ResourceError::Parse { line: 1, .. }));
        let err = parse_resources("(:resource fuel ten 0 1)").unwrap_err();
        assert!(matches!(err, ResourceError::Parse { line: 1, .. }));
    }

    #[test]
    fn keyword_needs_a_token_boundary() {
        let err = parse_resources("(:resourcefuel 10 0 1)").unwrap_err();
        assert!(matches!(err, ResourceError::Parse { line: 1, .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_resource_file(&dir.path().join("absent.res")).unwrap_err();
        assert!(matches!(err, ResourceError::Io { .. }));
    }
}
