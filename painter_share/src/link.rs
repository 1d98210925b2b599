// THEORY:
// Share links. The installation shows a link (usually as a QR code) that opens
// the viewer page already pointed at this installation's peer id. The id is a
// random UUID minted once per server run.

use crate::error::{ShareError, ShareResult};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(String);

impl PeerId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `base` without its query or fragment, with `?id=<peer>` appended.
pub fn share_url(base: &str, peer: &PeerId) -> String {
    let end = base.find(['?', '#']).unwrap_or(base.len());
    format!("{}?id={}", &base[..end], peer)
}

/// Reads the `id` query parameter back out of a share link.
pub fn peer_id_from_url(url: &str) -> ShareResult<PeerId> {
    let missing = || ShareError::MissingPeerId { url: url.to_owned() };
    let (_, query) = url.split_once('?').ok_or_else(missing)?;
    let query = query.split('#').next().unwrap_or_default();
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, value)| *key == "id" && !value.is_empty())
        .map(|(_, value)| PeerId::from(value))
        .ok_or_else(missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_and_fragment_are_replaced() {
        let peer = PeerId::from("abc");
        assert_eq!(share_url("https://paint.example/view", &peer), "https://paint.example/view?id=abc");
        assert_eq!(
            share_url("https://paint.example/view?id=old&x=1#top", &peer),
            "https://paint.example/view?id=abc"
        );
    }

    #[test]
    fn peer_id_survives_a_share_link() {
        let peer = PeerId::random();
        let url = share_url("http://localhost:3001/view", &peer);
        assert_eq!(peer_id_from_url(&url).unwrap(), peer);
        assert_eq!(
            peer_id_from_url("http://h/view?x=1&id=p2#frag").unwrap().as_str(),
            "p2"
        );
    }

    #[test]
    fn links_without_an_id_are_rejected() {
        assert!(peer_id_from_url("http://h/view").is_err());
        assert!(peer_id_from_url("http://h/view?id=").is_err());
        assert!(peer_id_from_url("http://h/view?other=1").is_err());
    }

    #[test]
    fn random_ids_are_v4_uuids() {
        let id = PeerId::random();
        assert_eq!(Uuid::parse_str(id.as_str()).unwrap().get_version_num(), 4);
        assert_ne!(id, PeerId::random());
    }
}
