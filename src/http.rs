//! Request plumbing shared by the session steps and resource operations.

use crate::error::{GoodDataError, Operation, Result, VendorError};
use reqwest::Response;
use serde_json::Value;
use url::Url;

/// First status code treated as a failure.
pub(crate) const ERROR_STATUS: u16 = 300;

/// Resolve an API path (or an absolute URI returned by the platform) against the base URL.
///
/// The result must stay on the base URL's scheme, host and port.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let url = base.join(path)?;
    if url.origin() != base.origin() {
        tracing::warn!(url = %url, base = %base, "Refusing request outside the configured host");
        return Err(GoodDataError::InvalidInput(format!(
            "{} is not on the configured host",
            path
        )));
    }
    Ok(url)
}

/// `(name, value)` pairs from the response's `Set-Cookie` headers.
pub(crate) fn set_cookies(response: &Response) -> Vec<(String, String)> {
    response
        .cookies()
        .map(|c| (c.name().to_string(), c.value().to_string()))
        .collect()
}

/// Read the body and apply the common failure policy:
/// vendor `error` object, then status >= 300, then JSON decoding.
pub(crate) async fn classify(response: Response, operation: Operation) -> Result<Value> {
    let status = response.status().as_u16();
    let text = response.text().await?;
    classify_body(status, &text, operation)
}

pub(crate) fn classify_body(status: u16, text: &str, operation: Operation) -> Result<Value> {
    let parsed = if text.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(text)
    };

    if let Ok(body) = &parsed {
        if let Some(error) = body.get("error") {
            tracing::warn!(operation = ?operation, status, "Platform returned an error object");
            return Err(GoodDataError::Vendor(VendorError::new(error.clone())));
        }
    }

    if status >= ERROR_STATUS {
        tracing::warn!(operation = ?operation, status, "Request failed");
        return Err(GoodDataError::HttpStatus { operation, status });
    }

    Ok(parsed?)
}
