use serde::Deserialize;

/// Cookie set by the web client holding the session document.
pub const SESSION_COOKIE: &str = "sb_token";

#[derive(Debug, PartialEq, Eq)]
pub enum TokenExtractionError {
    InvalidScheme,
    EmptyToken,
}

#[derive(Deserialize)]
struct SessionCookie {
    access_token: Option<String>,
}

/// Extracts the token from an Authorization header.
/// Returns None if no header is present.
/// Returns Err if the header uses another scheme or carries an empty token.
pub fn extract_bearer_token(
    auth_header: Option<&str>,
) -> Result<Option<String>, TokenExtractionError> {
    let Some(header) = auth_header else {
        return Ok(None);
    };

    let (scheme, token) = header
        .split_once(' ')
        .ok_or(TokenExtractionError::InvalidScheme)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TokenExtractionError::InvalidScheme);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(TokenExtractionError::EmptyToken);
    }

    Ok(Some(token.to_string()))
}

/// Finds the access token inside the session cookie, if any.
///
/// The cookie value is a percent-encoded JSON document, optionally prefixed
/// with `j:` as written by JSON cookie serializers.
pub fn extract_cookie_token<'a>(cookie_headers: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let raw = cookie_headers
        .into_iter()
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)?;

    let decoded = urlencoding::decode(raw).ok()?;
    let json = decoded.strip_prefix("j:").unwrap_or(&decoded);

    serde_json::from_str::<SessionCookie>(json)
        .ok()?
        .access_token
        .filter(|t| !t.is_empty())
}
