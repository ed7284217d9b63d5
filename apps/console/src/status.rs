use chrono::Local;
use shared::error::{Failure, FailureKind};

/// Operator-facing wording for a failure. The point is letting the
/// operator tell "my network is down" from "the controller said no" from
/// "this firmware can't do that".
pub fn describe_failure(failure: &Failure) -> String {
    match failure.kind() {
        FailureKind::Network => {
            format!("Controller unreachable ({failure}); check host, port and network")
        }
        FailureKind::Rejected => format!("Controller rejected the command: {failure}"),
        FailureKind::Unsupported => format!(
            "This controller firmware does not support {}",
            failure.endpoint()
        ),
        FailureKind::Protocol => format!("Unexpected controller response: {failure}"),
    }
}

pub fn status_line(message: &str) -> String {
    format!("[{}] {message}", Local::now().format("%H:%M:%S"))
}
