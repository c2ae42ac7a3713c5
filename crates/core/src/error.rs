use thiserror::Error;

/// Rejection reasons for task submissions. The messages are user-facing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Please enter both Priority and Execution Time.")]
    MissingField,

    #[error("Priority and Execution Time must be valid integers.")]
    NotAnInteger,

    #[error("Priority and Execution Time must be positive integers.")]
    NotPositive,

    #[error("Priority and Execution Time must not exceed {max}.", max = u32::MAX)]
    OutOfRange,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
}
