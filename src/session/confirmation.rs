use crate::error::DeepWorkError;

pub const DEFAULT_CONFIRMATION_PHRASE: &str = "I will not stop cool deepwork session";

/// Guards transitions that weaken protection behind a typed phrase.
#[derive(Debug, Clone)]
pub struct ConfirmationGate {
    phrase: String,
}

impl ConfirmationGate {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into().trim().to_string(),
        }
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Surrounding whitespace is ignored; everything else must match exactly.
    pub fn verify(&self, supplied: Option<&str>) -> Result<(), DeepWorkError> {
        match supplied {
            Some(text) if text.trim() == self.phrase => Ok(()),
            _ => Err(DeepWorkError::InvalidConfirmation),
        }
    }
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRMATION_PHRASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_phrase_passes_with_padding() {
        let gate = ConfirmationGate::default();
        assert!(gate
            .verify(Some("  I will not stop cool deepwork session \n"))
            .is_ok());
    }

    #[test]
    fn case_and_missing_text_fail() {
        let gate = ConfirmationGate::default();
        assert!(matches!(
            gate.verify(Some("i will not stop cool deepwork session")),
            Err(DeepWorkError::InvalidConfirmation)
        ));
        assert!(gate.verify(None).is_err());
        assert!(gate.verify(Some("")).is_err());
    }
}
