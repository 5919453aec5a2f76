#![allow(dead_code)]

use std::sync::Arc;

use sysmaint::exec::{CommandRequest, Runner, UserSwitch};
use sysmaint_test_utils::RecordingSink;

pub use sysmaint_test_utils::{init_tracing, with_timeout};

/// A runner that records output lines and never switches identity.
pub fn recording_runner() -> (Runner, RecordingSink) {
    let sink = RecordingSink::new();
    let runner = Runner::new(Arc::new(sink.clone())).with_user_switch(UserSwitch::TagOnly);
    (runner, sink)
}

/// `sh -c <script>` as a live (non dry-run) request.
pub fn sh(description: &str, script: &str) -> CommandRequest {
    CommandRequest::new(description, false, "sh", ["-c", script])
}
