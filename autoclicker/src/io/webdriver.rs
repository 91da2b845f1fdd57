//! [`Surface`] backed by a W3C WebDriver endpoint (e.g. `chromedriver`).
//!
//! Only the handful of endpoints the agents need are wrapped. Elements are
//! looked up again on every call; the driver's error codes are mapped onto
//! [`SurfaceError`] so callers never see wire details.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use reqwest::Method;
use reqwest::blocking::Client;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::error::SurfaceError;
use crate::core::types::ControlState;
use crate::io::surface::Surface;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:9515";

/// W3C web element identifier key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const PROMPT_POLL: Duration = Duration::from_millis(100);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct WebDriverSurface {
    client: Client,
    endpoint: String,
    session_id: String,
}

impl WebDriverSurface {
    /// Open a browser session and navigate to `game_url`.
    #[instrument(skip_all, fields(endpoint = %endpoint, game_url = %game_url))]
    pub fn connect(endpoint: &str, game_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build webdriver client")?;
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let response = client
            .post(format!("{endpoint}/session"))
            .json(&json!({
                "capabilities": { "alwaysMatch": { "browserName": "chrome" } }
            }))
            .send()
            .with_context(|| format!("connect to webdriver at {endpoint}"))?;
        let payload: Value = response.json().context("parse new session response")?;
        let session_id = payload
            .pointer("/value/sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("webdriver refused session: {payload}"))?
            .to_string();
        info!(session_id, "webdriver session opened");

        let surface = Self {
            client,
            endpoint,
            session_id,
        };
        surface
            .call(Method::POST, "/url", Some(json!({ "url": game_url })), game_url)
            .with_context(|| format!("navigate to {game_url}"))?;
        Ok(surface)
    }

    fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        target: &str,
    ) -> Result<Value, SurfaceError> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .map_err(|e| SurfaceError::Disconnected(e.to_string()))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .map_err(|e| SurfaceError::Disconnected(format!("malformed driver response: {e}")))?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);
        if status.is_success() {
            return Ok(value);
        }
        let code = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        debug!(code, message, target, "webdriver command failed");
        Err(map_error(code, message, target))
    }

    fn find(&self, id: &str) -> Result<String, SurfaceError> {
        let value = self.call(
            Method::POST,
            "/element",
            Some(json!({ "using": "css selector", "value": id_selector(id) })),
            id,
        )?;
        element_ref(&value).ok_or_else(|| SurfaceError::read(id, "driver returned no element"))
    }
}

impl Surface for WebDriverSurface {
    fn text(&self, id: &str) -> Result<String, SurfaceError> {
        let element = self.find(id)?;
        let value = self.call(Method::GET, &format!("/element/{element}/text"), None, id)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn control_state(&self, id: &str) -> Result<ControlState, SurfaceError> {
        let element = match self.find(id) {
            Ok(element) => element,
            Err(SurfaceError::ReadFailure { .. }) => return Ok(ControlState::HIDDEN),
            Err(err) => return Err(err),
        };
        let displayed = self
            .call(Method::GET, &format!("/element/{element}/displayed"), None, id)?
            .as_bool()
            .unwrap_or(false);
        let enabled = self
            .call(Method::GET, &format!("/element/{element}/enabled"), None, id)?
            .as_bool()
            .unwrap_or(false);
        Ok(ControlState { displayed, enabled })
    }

    fn click(&self, id: &str) -> Result<(), SurfaceError> {
        let element = self.find(id)?;
        self.call(
            Method::POST,
            &format!("/element/{element}/click"),
            Some(json!({})),
            id,
        )?;
        Ok(())
    }

    fn run_script(&self, script: &str) -> Result<String, SurfaceError> {
        let value = self.call(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [] })),
            script,
        )?;
        match value {
            Value::String(text) => Ok(text),
            Value::Null => Err(SurfaceError::read(script, "script returned nothing")),
            other => Ok(other.to_string()),
        }
    }

    fn wait_for_prompt(&self, timeout: Duration) -> Result<(), SurfaceError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.call(Method::GET, "/alert/text", None, "alert") {
                Ok(_) => return Ok(()),
                Err(SurfaceError::ImportRejected(_)) => {}
                Err(err) => return Err(err),
            }
            if Instant::now() >= deadline {
                return Err(SurfaceError::ImportRejected(format!(
                    "no confirmation prompt within {timeout:?}"
                )));
            }
            thread::sleep(PROMPT_POLL);
        }
    }

    fn answer_prompt(&self, text: &str) -> Result<(), SurfaceError> {
        self.call(
            Method::POST,
            "/alert/text",
            Some(json!({ "text": text })),
            "alert",
        )?;
        self.call(Method::POST, "/alert/accept", Some(json!({})), "alert")?;
        Ok(())
    }
}

impl Drop for WebDriverSurface {
    fn drop(&mut self) {
        let url = format!("{}/session/{}", self.endpoint, self.session_id);
        if let Err(e) = self.client.delete(&url).send() {
            warn!(err = %e, "failed to close webdriver session");
        }
    }
}

/// CSS selector matching an element id verbatim (ids may contain spaces).
fn id_selector(id: &str) -> String {
    let escaped = id.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[id=\"{escaped}\"]")
}

fn element_ref(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn map_error(code: &str, message: &str, target: &str) -> SurfaceError {
    match code {
        "stale element reference" | "element not interactable" | "element click intercepted" => {
            SurfaceError::StaleReference(target.to_string())
        }
        "no such alert" | "unexpected alert open" => SurfaceError::ImportRejected(format!(
            "{code}: {message}"
        )),
        "invalid session id" | "no such window" | "session not created" => {
            SurfaceError::Disconnected(format!("{code}: {message}"))
        }
        _ => SurfaceError::read(target, format!("{code}: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_selector_quotes_ids_with_spaces() {
        assert_eq!(id_selector("buyElder Pledge"), "[id=\"buyElder Pledge\"]");
        assert_eq!(id_selector("a\"b"), "[id=\"a\\\"b\"]");
    }

    #[test]
    fn element_ref_reads_w3c_key() {
        let value = json!({ "element-6066-11e4-a52e-4f735466cecf": "abc-123" });
        assert_eq!(element_ref(&value).as_deref(), Some("abc-123"));
        assert_eq!(element_ref(&json!({})), None);
    }

    #[test]
    fn maps_driver_codes_to_surface_errors() {
        assert_eq!(
            map_error("stale element reference", "", "buyCursor"),
            SurfaceError::StaleReference("buyCursor".to_string())
        );
        assert!(matches!(
            map_error("no such window", "closed", "cookie"),
            SurfaceError::Disconnected(_)
        ));
        assert!(matches!(
            map_error("no such alert", "", "alert"),
            SurfaceError::ImportRejected(_)
        ));
        assert!(matches!(
            map_error("no such element", "", "money"),
            SurfaceError::ReadFailure { .. }
        ));
    }
}
