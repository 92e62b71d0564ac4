//! Header filtering between client, balancer and pod.

use axum::http::{header, HeaderMap, HeaderName};

/// Headers meaningful only for a single transport hop.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Headers the balancer never passes on to a pod.
const RESTRICTED: [&str; 6] = ["host", "connection", "content-length", "expect", "upgrade", "cookie"];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

pub fn is_restricted(name: &HeaderName) -> bool {
    RESTRICTED.contains(&name.as_str())
}

/// Extra hop-by-hop names announced in the `Connection` header.
fn connection_tokens(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect()
}

fn filter(headers: &HeaderMap, drop: impl Fn(&HeaderName) -> bool) -> HeaderMap {
    let announced = connection_tokens(headers);
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if drop(name) || announced.contains(name) {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }
    filtered
}

/// Headers copied from an inbound request onto the outbound one.
pub fn outbound_request_headers(inbound: &HeaderMap) -> HeaderMap {
    filter(inbound, |name| is_hop_by_hop(name) || is_restricted(name))
}

/// Headers copied from a pod's response back to the client.
pub fn relayed_response_headers(response: &HeaderMap) -> HeaderMap {
    filter(response, is_hop_by_hop)
}
