use thiserror::Error;

/// Top-level error type for Sauti.
#[derive(Debug, Error)]
pub enum SautiError {
    /// Error from the language-model provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from a messaging channel.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Memory/storage error.
    #[error("memory error: {0}")]
    Memory(String),

    /// Error from a tool backend (search, market data, speech, extraction).
    #[error("tool error: {0}")]
    Tool(String),

    /// An external call exceeded its time budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SautiError {
    /// Whether this error means an upstream service was unreachable, failed,
    /// or was too slow. These are recovered locally with fallback text.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Tool(_) | Self::Timeout(_))
    }
}

/// Run a future under a deadline, mapping an elapsed deadline to [`SautiError::Timeout`].
pub async fn with_timeout<T, F>(
    secs: u64,
    what: &str,
    fut: F,
) -> Result<T, SautiError>
where
    F: std::future::Future<Output = Result<T, SautiError>>,
{
    match tokio::time::timeout(std::time::Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(SautiError::Timeout(format!("{what} after {secs}s"))),
    }
}
