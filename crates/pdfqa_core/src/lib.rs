pub mod config;
pub mod error;
pub mod pdf;

#[cfg(test)]
mod tests {
    use super::error::AppError;

    #[test]
    fn app_error_is_structured() {
        let err = AppError::new("INDEX_NOT_FOUND", "no index").with_retryable(false);
        assert_eq!(err.code, "INDEX_NOT_FOUND");
        assert_eq!(err.message, "no index");
        assert!(err.is("INDEX_NOT_FOUND"));
        assert!(!err.retryable);
    }

    #[test]
    fn app_error_display_includes_details() {
        let err = AppError::new("AI_COMPLETION_FAILED", "Completion request failed")
            .with_details("status=500");
        assert_eq!(
            err.to_string(),
            "[AI_COMPLETION_FAILED] Completion request failed (status=500)"
        );
        let bare = AppError::new("INDEX_LOCKED", "Index is locked");
        assert_eq!(bare.to_string(), "[INDEX_LOCKED] Index is locked");
    }
}
