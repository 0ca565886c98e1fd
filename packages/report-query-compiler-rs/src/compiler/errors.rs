#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("sql generation error: {message}")]
    SqlGeneration {
        message: String,
        context: Option<serde_json::Value>,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompilerError {
    /// The offending request fragment, when the failure carries one.
    pub fn context(&self) -> Option<&serde_json::Value> {
        match self {
            CompilerError::SqlGeneration { context, .. } => context.as_ref(),
            _ => None,
        }
    }
}

pub type CompilerResult<T> = Result<T, CompilerError>;

fn generation_error<C: Serialize + ?Sized>(
    message: impl Into<String>,
    context: &C,
) -> CompilerError {
    CompilerError::SqlGeneration {
        message: message.into(),
        context: serde_json::to_value(context).ok(),
    }
}
