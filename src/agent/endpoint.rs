// Collector address normalization: "[scheme://]host[:port][/]" -> ws(s)://host/ws?id=...

use url::Url;

/// Normalized collector address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub secure: bool,
    pub authority: String,
}

impl Endpoint {
    /// Strip a known scheme prefix and one trailing slash. Only `https://` and
    /// `wss://` select the encrypted transport.
    pub fn parse(server: &str) -> anyhow::Result<Self> {
        let server = server.trim();
        let (secure, rest) = if let Some(rest) = server.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = server.strip_prefix("wss://") {
            (true, rest)
        } else if let Some(rest) = server.strip_prefix("http://") {
            (false, rest)
        } else if let Some(rest) = server.strip_prefix("ws://") {
            (false, rest)
        } else {
            (false, server)
        };
        let authority = rest.strip_suffix('/').unwrap_or(rest);
        anyhow::ensure!(!authority.is_empty(), "server address is empty");
        Ok(Self {
            secure,
            authority: authority.to_string(),
        })
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    /// Handshake URL carrying the client identity: `<scheme>://<authority>/ws?id=<id>`.
    pub fn handshake_url(&self, client_id: &str) -> anyhow::Result<Url> {
        let mut url = Url::parse(&format!("{}://{}/ws", self.scheme(), self.authority))?;
        url.query_pairs_mut().append_pair("id", client_id);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_defaults_to_plain_ws() {
        let ep = Endpoint::parse("localhost:44123").unwrap();
        assert!(!ep.secure);
        assert_eq!(ep.authority, "localhost:44123");
        assert_eq!(
            ep.handshake_url("AB12345678").unwrap().as_str(),
            "ws://localhost:44123/ws?id=AB12345678"
        );
    }

    #[test]
    fn https_selects_wss_and_strips_one_slash() {
        let ep = Endpoint::parse("https://monitor.example.com/").unwrap();
        assert!(ep.secure);
        assert_eq!(ep.authority, "monitor.example.com");
        assert_eq!(
            ep.handshake_url("x").unwrap().as_str(),
            "wss://monitor.example.com/ws?id=x"
        );
    }

    #[test]
    fn http_prefix_is_stripped() {
        let ep = Endpoint::parse("http://10.0.0.2:8080").unwrap();
        assert!(!ep.secure);
        assert_eq!(ep.authority, "10.0.0.2:8080");
    }

    #[test]
    fn ws_schemes_are_accepted() {
        assert!(Endpoint::parse("wss://h").unwrap().secure);
        assert!(!Endpoint::parse("ws://h").unwrap().secure);
    }

    #[test]
    fn id_is_query_encoded() {
        let ep = Endpoint::parse("h:1").unwrap();
        assert_eq!(
            ep.handshake_url("a b&c").unwrap().as_str(),
            "ws://h:1/ws?id=a+b%26c"
        );
    }

    #[test]
    fn empty_address_is_rejected() {
        assert!(Endpoint::parse("https://").is_err());
        assert!(Endpoint::parse("").is_err());
    }
}
