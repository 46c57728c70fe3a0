//! Asynchronous helpers shared across the client's pipeline stages.

use qvm_sanitize_protocol::SanitizeError;

/// Wrapper around [`tokio::task::spawn_blocking`] that propagates panics
/// from the background task, instead of silently losing them the way a bare
/// `.await.unwrap()` would obscure their origin.
///
/// Every blocking filesystem or image-library call in this crate (PNG
/// decode, PDF assembly) goes through this, so the single-threaded
/// cooperative scheduler never stalls on synchronous work.
pub async fn spawn_blocking_propagating_panics<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task panicked")
}

/// Report any command failures as a [`SanitizeError::ConversionFailed`].
pub fn check_for_command_failure(
    command_name: &str,
    status: std::process::ExitStatus,
) -> Result<(), SanitizeError> {
    if status.success() {
        Ok(())
    } else if let Some(exit_code) = status.code() {
        Err(SanitizeError::ConversionFailed(format!(
            "{command_name} failed with exit code {exit_code}"
        )))
    } else {
        Err(SanitizeError::ConversionFailed(format!(
            "{command_name} failed"
        )))
    }
}
