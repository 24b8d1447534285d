// http.rs
//
// Request execution shared by the remote backend and the auth client. Every
// exchange is logged at debug level with credentials masked.

use log::{debug, log_enabled, Level};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

const MAX_LOGGED_BODY: usize = 4000;

pub(crate) struct HttpReply {
    pub status: StatusCode,
    pub body: String,
}

pub(crate) struct HttpFailure {
    pub url: String,
    pub message: String,
}

pub(crate) async fn execute(client: &Client, builder: RequestBuilder) -> Result<HttpReply, HttpFailure> {
    let request = builder.build().map_err(|e| HttpFailure {
        url: e.url().map(|u| u.to_string()).unwrap_or_default(),
        message: e.to_string(),
    })?;
    let url = request.url().to_string();

    if log_enabled!(Level::Debug) {
        let headers: Vec<(String, String)> = request
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("<binary>").to_string()))
            .collect();
        let body = request
            .body()
            .and_then(|b| b.as_bytes())
            .map(|b| String::from_utf8_lossy(b).into_owned());
        log_http_request(request.method().as_str(), &url, &headers, body.as_deref());
    }

    let resp = client.execute(request).await.map_err(|e| HttpFailure {
        url: url.clone(),
        message: e.to_string(),
    })?;
    let status = resp.status();
    let body = resp.text().await.map_err(|e| HttpFailure {
        url: url.clone(),
        message: format!("reading body failed: {e}"),
    })?;
    log_http_response(status.as_u16(), &body);
    Ok(HttpReply { status, body })
}

/// Pulls a human-readable message out of an error body, falling back to the
/// raw text.
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(Value::String(s)) = map.get(key) {
                return s.clone();
            }
        }
    }
    truncate(body.trim(), 200)
}

fn log_http_request(method: &str, url: &str, headers: &[(String, String)], body: Option<&str>) {
    debug!("[HTTP OUT] {} {}", method, url);
    for (k, v) in headers {
        let shown = if k.eq_ignore_ascii_case("authorization") {
            mask_bearer(v)
        } else if k.eq_ignore_ascii_case("apikey") {
            "*****".to_string()
        } else {
            v.clone()
        };
        debug!("  {}: {}", k, shown);
    }
    if let Some(b) = body {
        debug!("  Body: {}", truncate(&redact_password(b), MAX_LOGGED_BODY));
    }
}

fn log_http_response(status: u16, body: &str) {
    debug!("[HTTP IN] Status: {}", status);
    debug!("  Body: {}", truncate(body, MAX_LOGGED_BODY));
}

fn redact_password(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(mut map)) if map.contains_key("password") => {
            map.insert("password".to_string(), Value::String("***".to_string()));
            Value::Object(map).to_string()
        }
        _ => body.to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

fn mask_bearer(v: &str) -> String {
    if let Some(token) = v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")) {
        let head: String = token.chars().take(6).collect();
        let tail: String = token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("Bearer {}…{}", head, tail)
    } else {
        "*****".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_tokens_are_masked() {
        assert_eq!(mask_bearer("Bearer abcdefghijklmnop"), "Bearer abcdef…mnop");
        assert_eq!(mask_bearer("Basic xyz"), "*****");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "ééééé";
        let out = truncate(s, 3);
        assert!(out.starts_with("é"));
        assert!(out.contains("+"));
    }

    #[test]
    fn passwords_never_reach_the_log() {
        let out = redact_password(r#"{"email":"a@b.c","password":"hunter22"}"#);
        assert!(!out.contains("hunter22"));
        assert!(out.contains("a@b.c"));
    }

    #[test]
    fn error_message_prefers_structured_fields() {
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message("plain failure"), "plain failure");
    }
}
