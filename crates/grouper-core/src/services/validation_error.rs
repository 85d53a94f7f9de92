use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

/// Field-keyed bad-input error, distinguishable from infrastructure
/// failures by type rather than by message text. Never used for
/// connection or lock failures; those propagate as opaque errors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationError {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Violated rules, keyed by field.
    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    /// `Ok` when no rule was violated, otherwise the accumulated error.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation error:")?;
        let mut first = true;
        for (field, messages) in &self.errors {
            for message in messages {
                if first {
                    write!(f, " {field} {message}")?;
                    first = false;
                } else {
                    write!(f, ", {field} {message}")?;
                }
            }
        }
        Ok(())
    }
}

impl Error for ValidationError {}
