use url::Url;

/// Path of the chat socket on the API host.
pub const CHAT_SOCKET_PATH: &str = "/api/chat/ws";

/// Derive the chat socket URL from the REST base URL: same host and port,
/// `https` upgrades to `wss`, anything else to `ws`.
pub fn chat_socket_url(base: &Url) -> Result<Url, url::ParseError> {
    let mut url = base.join(CHAT_SOCKET_PATH)?;
    let scheme = if base.scheme() == "https" { "wss" } else { "ws" };

    // http(s) -> ws(s) stays within the "special" scheme set, so this can't fail.
    let _ = url.set_scheme(scheme);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
