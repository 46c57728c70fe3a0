//! Small helpers for reporting external-process failures.

use qvm_sanitize_protocol::SanitizeError;

pub fn check_for_command_failure(
    command_name: &str,
    status: std::process::ExitStatus,
) -> Result<(), SanitizeError> {
    if status.success() {
        Ok(())
    } else if let Some(code) = status.code() {
        Err(SanitizeError::ConversionFailed(format!(
            "{command_name} exited with code {code}"
        )))
    } else {
        Err(SanitizeError::ConversionFailed(format!(
            "{command_name} was terminated by a signal"
        )))
    }
}
