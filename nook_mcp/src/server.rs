//! Line-delimited JSON-RPC over stdio (spec.md §6): one request per line
//! on stdin, one response per line on stdout. A tool that fails never
//! fails the transport — its failure comes back as a normal JSON-RPC
//! success whose result is `{content:[...], isError:true}` (spec.md §7).

use std::sync::Arc;

use nook_rag::RetrievalFacade;
use serde_json::Value;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::tools::ToolRegistry;
use crate::Result;

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;

/// Drive the stdio tool host to completion (stdin EOF). Each line is
/// handled independently; a malformed line yields a JSON-RPC parse
/// error response rather than aborting the loop.
pub async fn serve(facade: Arc<RetrievalFacade>) -> Result<()> {
    let registry = Arc::new(ToolRegistry::with_defaults());
    let stdin = BufReader::new(io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(&line, &facade, &registry).await;
        let mut payload = serde_json::to_string(&response).unwrap_or_else(|e| {
            warn!(error = %e, "failed to serialize JSON-RPC response");
            r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"internal error"}}"#
                .to_string()
        });
        payload.push('\n');
        stdout.write_all(payload.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}

async fn handle_line(
    line: &str,
    facade: &RetrievalFacade,
    registry: &ToolRegistry,
) -> JsonRpcResponse {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return JsonRpcResponse::protocol_error(None, PARSE_ERROR, e.to_string()),
    };

    debug!(method = %request.method, "dispatching tool call");

    let Some(tool) = registry.get(&request.method) else {
        return JsonRpcResponse::protocol_error(
            request.id,
            METHOD_NOT_FOUND,
            format!("unknown method: {}", request.method),
        );
    };

    let args: Value = request.params;
    let result = tool.call(facade, &args).await;
    let result_json = serde_json::to_value(result).unwrap_or(Value::Null);
    JsonRpcResponse::success(request.id, result_json)
}
