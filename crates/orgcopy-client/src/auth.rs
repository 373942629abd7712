//! Username/password login through the SOAP partner endpoint.

use reqwest::{Client, Url};
use tracing::{debug, info};

use crate::config::{Credentials, StoreConfig};
use crate::error::Error;

/// An authenticated API session.
#[derive(Clone)]
pub struct Session {
    /// Bearer token for REST calls.
    pub session_id: String,
    /// Base URL of the instance serving the org, e.g. `https://na1.salesforce.com`.
    pub instance_url: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &"***")
            .field("instance_url", &self.instance_url)
            .finish()
    }
}

/// Log in and return a session.
pub async fn login(
    http: &Client,
    config: &StoreConfig,
    credentials: &Credentials,
) -> Result<Session, Error> {
    if !credentials.is_complete() {
        return Err(Error::Auth("username and password are required".to_string()));
    }

    let url = config.login_url();
    debug!(url = %url, username = %credentials.username, "logging in");
    let response = http
        .post(&url)
        .header("Content-Type", "text/xml; charset=UTF-8")
        .header("SOAPAction", "login")
        .body(login_envelope(credentials))
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let reason = extract_tag(&body, "faultstring")
            .or_else(|| extract_tag(&body, "exceptionMessage"))
            .map(unescape_xml)
            .unwrap_or_else(|| format!("login returned HTTP {}", status.as_u16()));
        return Err(Error::Auth(reason));
    }

    let session = parse_login_response(&body)?;
    info!(username = %credentials.username, instance = %session.instance_url, "logged in");
    Ok(session)
}

/// SOAP body of a login call.
pub fn login_envelope(credentials: &Credentials) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">
  <env:Body>
    <n1:login xmlns:n1="urn:partner.soap.sforce.com">
      <n1:username>{}</n1:username>
      <n1:password>{}{}</n1:password>
    </n1:login>
  </env:Body>
</env:Envelope>"#,
        escape_xml(&credentials.username),
        escape_xml(&credentials.password),
        escape_xml(&credentials.security_token),
    )
}

/// Read the session id and instance URL out of a login response.
pub fn parse_login_response(body: &str) -> Result<Session, Error> {
    if let Some(fault) = extract_tag(body, "faultstring") {
        return Err(Error::Auth(unescape_xml(fault)));
    }

    let session_id = extract_tag(body, "sessionId")
        .map(unescape_xml)
        .ok_or_else(|| Error::Auth("login response has no sessionId".to_string()))?;
    let server_url = extract_tag(body, "serverUrl")
        .map(unescape_xml)
        .ok_or_else(|| Error::Auth("login response has no serverUrl".to_string()))?;

    let url = Url::parse(&server_url)
        .map_err(|e| Error::Auth(format!("invalid serverUrl {}: {}", server_url, e)))?;
    Ok(Session {
        session_id,
        instance_url: url.origin().ascii_serialization(),
    })
}

/// Text content of the first element with the given local name.
///
/// Namespace prefixes are ignored. Nested elements are not supported.
pub fn extract_tag<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let mut rest = xml;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let end = after.find('>')?;
        let name = after[..end].split_whitespace().next().unwrap_or_default();
        let local = name.rsplit(':').next().unwrap_or(name);
        let body = &after[end + 1..];
        if !name.starts_with('/') && local == tag {
            let close = body.find("</")?;
            return Some(&body[..close]);
        }
        rest = body;
    }
    None
}

/// Escape text for use inside an XML element.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Undo the predefined XML entities.
pub fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
