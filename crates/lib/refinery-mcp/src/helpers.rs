use refinery_core::control::ControlError;
use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use tracing::{debug, warn};

/// Renders an operation outcome as a tool result.
///
/// Operation failures are reported in-band (`Error: <message>`, error flag
/// set) so the session survives them; only a result that cannot be
/// serialized becomes a protocol error.
pub(crate) fn respond<T: Serialize>(
    tool: &str,
    outcome: Result<T, ControlError>,
) -> Result<CallToolResult, ErrorData> {
    match outcome {
        Ok(value) => {
            let text = serde_json::to_string_pretty(&value).map_err(|err| {
                ErrorData::internal_error(format!("failed to serialize {tool} result: {err}"), None)
            })?;
            debug!(tool, "tool call succeeded");
            Ok(CallToolResult::success(vec![Content::text(text)]))
        }
        Err(err) => {
            warn!(tool, "tool call failed: {err}");
            Ok(CallToolResult::error(vec![Content::text(format!("Error: {err}"))]))
        }
    }
}
