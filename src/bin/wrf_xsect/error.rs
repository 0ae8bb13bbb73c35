/// Program error type
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("Use error: {0}")]
    UseError(String),

    /// Some files could not be plotted, but the batch ran to the end.
    #[error("{0} file(s) could not be plotted, see the log messages above")]
    FilesFailed(usize),

    /// Wrapper type used to add information to an inner error.
    #[error("{0}")]
    Context(String),
}

impl CliError {
    pub(crate) fn use_error<S: ToString>(msg: S) -> Self {
        Self::UseError(msg.to_string())
    }

    pub(crate) fn context<S: ToString>(ctx: S) -> Self {
        Self::Context(ctx.to_string())
    }
}
