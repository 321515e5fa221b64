use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    /// Captures a failure raised by a caller-supplied mapping function while
    /// processing the element at `index`.
    pub fn user_function(index: usize, message: impl ToString) -> Error {
        Error(
            ErrorKind::UserFunction {
                index,
                message: message.to_string(),
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("mapping function failed on element {index}: {message}")]
    UserFunction { index: usize, message: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_function_error_message() {
        let err = Error::user_function(3, "division by zero");
        assert_eq!(
            err.to_string(),
            "mapping function failed on element 3: division by zero"
        );
        assert!(matches!(
            err.kind(),
            ErrorKind::UserFunction { index: 3, .. }
        ));
    }

    #[test]
    fn test_invalid_arg_display() {
        let err = Error::invalid_arg("max_threads", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid argument max_threads: must be positive"
        );
    }
}
