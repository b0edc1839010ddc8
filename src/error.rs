use thiserror::Error;

/// Errors raised by the simulation core.
///
/// Biological outcomes (extinction, host death) are not errors; they are
/// reported through [`crate::model::Outcome`].
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    /// Treatment policy identifier is not one of `classic`, `adaptive` or `user`.
    #[error("invalid treatment policy: {kind:?}")]
    InvalidPolicy { kind: String },

    /// A terminated sequence was pulled again.
    #[error("simulation sequence is exhausted")]
    SequenceExhausted,

    /// Antibiotic name is not part of the simulation.
    #[error("unknown antibiotic: {name:?}")]
    UnknownAntibiotic { name: String },

    /// Administration was toggled on a policy that is not externally driven.
    #[error("treatment policy is not user controlled")]
    NotUserControlled,
}
