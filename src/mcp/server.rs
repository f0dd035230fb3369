use crate::common::errors::AppError;
use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse, PARSE_ERROR};
use std::io::{self, BufRead, Write};
use tracing::{debug, error, warn};

pub struct McpServer;

impl McpServer {
    pub fn run_stdio() -> Result<(), AppError> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        Self::serve(stdin.lock(), &mut stdout.lock())?;
        Ok(())
    }

    /// Serves requests from `input` until it is exhausted. Returns the number
    /// of responses written.
    pub fn serve(input: impl BufRead, output: &mut impl Write) -> Result<usize, AppError> {
        let mut written = 0;
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = Self::handle_line(&line) {
                Self::write_response(output, &response)?;
                written += 1;
            }
        }
        debug!(responses = written, "input closed");
        Ok(written)
    }

    fn handle_line(line: &str) -> Option<JsonRpcResponse> {
        // Protocol is line-oriented: one JSON-RPC request per stdin line.
        let request: Result<JsonRpcRequest, _> = serde_json::from_str(line);
        match request {
            Ok(req) => {
                let notification = req.is_notification();
                let result = Dispatcher::dispatch(&req.method, req.params);

                if notification {
                    if let Err(err) = result {
                        error!("notification handling error: {err}");
                    }
                    return None;
                }

                Some(match result {
                    Ok(result) => JsonRpcResponse::success(req.id, result),
                    Err(err) => {
                        if err.is_caller_error() {
                            warn!(method = %req.method, code = err.code(), "request rejected: {err}");
                        } else {
                            error!(method = %req.method, code = err.code(), "request failed: {err}");
                        }
                        JsonRpcResponse::from_app_error(req.id, &err)
                    }
                })
            }
            Err(err) => Some(JsonRpcResponse::failure(
                None,
                PARSE_ERROR,
                format!("invalid json-rpc request: {err}"),
            )),
        }
    }

    fn write_response(stdout: &mut impl Write, response: &JsonRpcResponse) -> Result<(), AppError> {
        let output =
            serde_json::to_string(response).map_err(|e| AppError::InvalidInput(e.to_string()))?;
        if let Err(e) = writeln!(stdout, "{output}") {
            error!("failed to write response: {e}");
            return Err(AppError::IoError(e.to_string()));
        }
        stdout.flush()?;
        Ok(())
    }
}
