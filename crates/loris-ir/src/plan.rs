use std::fmt;
use thiserror::Error;

/// A linear plan over the caller's original action vocabulary.
///
/// The textual rendering is the same action-list format accepted as input:
/// one `(action name)` per line. `parse` and `Display` round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SequentialPlan {
    pub actions: Vec<String>,
}

#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("line {line}: expected `(action name)`, got `{text}`")]
    Malformed { line: usize, text: String },
}

impl SequentialPlan {
    pub fn new(actions: Vec<String>) -> Self {
        Self { actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Parse the textual action-list format. Blank lines and `;` comment
    /// lines are skipped.
    pub fn parse(text: &str) -> Result<Self, PlanParseError> {
        let mut actions = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            let inner = line
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(|| PlanParseError::Malformed {
                    line: idx + 1,
                    text: line.to_string(),
                })?;
            let name = inner.trim();
            if name.is_empty() {
                return Err(PlanParseError::Malformed {
                    line: idx + 1,
                    text: line.to_string(),
                });
            }
            actions.push(name.to_string());
        }
        Ok(Self { actions })
    }
}

impl fmt::Display for SequentialPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for action in &self.actions {
            writeln!(f, "({action})")?;
        }
        Ok(())
    }
}
