// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::{ApiError, Result, SpecforgeError};

/// Parse numeric Retry-After header (seconds).
pub(crate) fn parse_retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

/// Construct a standardized server error.
pub(crate) fn server_error(status: u16, message: impl Into<String>) -> SpecforgeError {
    SpecforgeError::Api(ApiError::ServerError {
        status,
        message: message.into(),
    })
}

/// Classify an HTTP status with no parseable error body.
pub(crate) fn classify_status(status: u16, body: &str, retry_after: Option<u64>) -> SpecforgeError {
    match status {
        401 | 403 => SpecforgeError::Api(ApiError::AuthenticationFailed),
        429 => SpecforgeError::Api(ApiError::RateLimited(retry_after.unwrap_or(10) as u32)),
        400 | 404 | 422 => {
            SpecforgeError::Api(ApiError::InvalidRequest(body.trim().to_string()))
        }
        s if (500..600).contains(&s) => server_error(status, body.trim()),
        _ => SpecforgeError::Api(ApiError::unknown(format!("HTTP {status}: {body}"))),
    }
}

/// Split a byte stream into SSE events and map each event's data payload
/// through `extract`, which returns the text chunk the event carries (if
/// any). Events are buffered until the `\n\n` terminator arrives, so chunks
/// come out in arrival order exactly once.
pub(crate) fn sse_text_stream<S, B, F>(
    byte_stream: S,
    extract: F,
) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = reqwest::Result<B>>,
    B: AsRef<[u8]>,
    F: Fn(&str) -> Option<String> + Clone,
{
    byte_stream
        .map(|result| result.map_err(|e| SpecforgeError::Api(ApiError::Network(e.to_string()))))
        .scan(String::new(), move |buffer, result| {
            let extract = extract.clone();
            let chunk = match result {
                Ok(bytes) => String::from_utf8_lossy(bytes.as_ref()).to_string(),
                Err(e) => return futures::future::ready(Some(vec![Err(e)])),
            };

            buffer.push_str(&chunk);

            let mut out = Vec::new();
            while let Some(pos) = buffer.find("\n\n") {
                let event = buffer[..pos].to_string();
                *buffer = buffer[pos + 2..].to_string();

                for data in sse_data_lines(&event) {
                    if let Some(text) = extract(&data) {
                        if !text.is_empty() {
                            out.push(Ok(text));
                        }
                    }
                }
            }

            futures::future::ready(Some(out))
        })
        .flat_map(futures::stream::iter)
}

/// Pull the `data:` payloads out of one SSE event block.
pub(crate) fn sse_data_lines(event: &str) -> Vec<String> {
    event
        .lines()
        .filter_map(|line| line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")))
        .map(|s| s.trim_start().to_string())
        .collect()
}
