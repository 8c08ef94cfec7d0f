use rinse_api::error::DriverError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("node {0} is not part of the result set")]
    DanglingNode(usize),

    #[error("not a record: got {0}")]
    NotARecord(&'static str),

    #[error("parallel dispatch failed: {0}")]
    Dispatch(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Add context to the error.
    ///
    /// For `Driver` variant, context is added to the inner `DriverError`.
    /// For message-carrying variants, context is prepended to the message.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            EngineError::Driver(e) => EngineError::Driver(e.with_context(ctx)),
            EngineError::Config(msg) => EngineError::Config(format!("{ctx}: {msg}")),
            EngineError::Dispatch(msg) => EngineError::Dispatch(format!("{ctx}: {msg}")),
            other => other,
        }
    }
}
