use thiserror::Error;

/// Failures raised by the dispatch machinery itself rather than by a computation's
/// own `Err` return. Both are stored in `Outcome::failure` like any other failure
/// and can be recovered with `anyhow::Error::downcast_ref`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Computation unwound instead of returning.
    #[error("computation panicked: {message}")]
    Panicked { message: String },

    /// The substrate dropped the job before it ran, so no outcome was ever produced.
    #[error("dispatch was abandoned by its substrate before completing")]
    Abandoned,
}

impl DispatchError {
    /// Builds `Panicked` from a payload returned by `std::panic::catch_unwind`.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        DispatchError::Panicked { message }
    }
}

#[cfg(test)]
mod tests {
    use super::DispatchError;

    #[test]
    fn test_from_panic_payloads() {
        let err = DispatchError::from_panic(Box::new("static"));
        assert_eq!(
            err,
            DispatchError::Panicked {
                message: "static".into()
            }
        );

        let err = DispatchError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.to_string(), "computation panicked: owned");

        let err = DispatchError::from_panic(Box::new(7_u8));
        assert_eq!(
            err.to_string(),
            "computation panicked: non-string panic payload"
        );
    }
}
