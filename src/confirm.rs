//! Two-phase confirmation for destructive admin actions.
//!
//! Phase one is a preview call (`confirm=false`) that only counts what would
//! be removed. Phase two needs a [`Confirmation`], which can only be built
//! from the operator typing the literal token, so a mutating call cannot be
//! issued without it.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The literal the operator must type.
pub const CONFIRM_TOKEN: &str = "DELETE";

/// Proof that the operator typed [`CONFIRM_TOKEN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation(());

impl Confirmation {
    /// Exact, case-sensitive match. Surrounding whitespace is not forgiven.
    pub fn parse(typed: &str) -> Result<Self, ValidationError> {
        if typed == CONFIRM_TOKEN {
            Ok(Confirmation(()))
        } else {
            Err(ValidationError::ConfirmationMismatch)
        }
    }
}

/// Which phase a cleanup call is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPhase {
    Preview,
    Confirmed,
}

impl CleanupPhase {
    pub fn for_confirmation(confirmation: Option<Confirmation>) -> Self {
        match confirmation {
            Some(_) => CleanupPhase::Confirmed,
            None => CleanupPhase::Preview,
        }
    }

    /// Value of the `confirm` query parameter.
    pub fn confirm_flag(self) -> bool {
        matches!(self, CleanupPhase::Confirmed)
    }
}
