//! Redemption deep-link parsing.
//!
//! The hosting shell forwards every inbound navigation URL; only links
//! addressed to `redeem_web_purchase` that carry a non-empty
//! `redemption_token` query parameter qualify. Both the custom-scheme form
//! (`app-abc://redeem_web_purchase?redemption_token=...`) and the https
//! form (`https://pay.example.com/redeem_web_purchase?...`) are accepted.

use url::Url;

const REDEMPTION_TARGET: &str = "redeem_web_purchase";
const TOKEN_PARAM: &str = "redemption_token";

/// A validated web purchase redemption link. The token itself is opaque;
/// only the entitlement store can interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionLink {
    token: String,
}

impl RedemptionLink {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Extracts a redemption link from a raw deep-link URL. Returns `None`
    /// for anything that is not a redemption link.
    pub fn from_url(raw: &str) -> Option<Self> {
        let url = Url::parse(raw).ok()?;
        if !is_redemption_target(&url) {
            return None;
        }

        let token = url
            .query_pairs()
            .find(|(name, _)| name == TOKEN_PARAM)
            .map(|(_, value)| value.into_owned())?;
        if token.is_empty() {
            return None;
        }

        Some(Self { token })
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

fn is_redemption_target(url: &Url) -> bool {
    if url.host_str() == Some(REDEMPTION_TARGET) {
        return true;
    }

    url.path_segments()
        .and_then(|mut segments| segments.next())
        .is_some_and(|segment| segment == REDEMPTION_TARGET)
}
