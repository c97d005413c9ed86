//! Coarse network-origin gate in front of the upload endpoints.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::HeaderMap;
use actix_web::middleware::Next;
use actix_web::{web, Error, ResponseError};

use crate::errors::ServerErr;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Decides whether a caller's address may reach the core endpoints.
pub trait OriginClassifier: Send + Sync {
    fn is_allowed(&self, origin: IpAddr) -> bool;
}

/// Allows loopback, RFC1918 and IPv6 unique-local (fc00::/7) addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivateNetworkClassifier;

impl OriginClassifier for PrivateNetworkClassifier {
    fn is_allowed(&self, origin: IpAddr) -> bool {
        match origin {
            IpAddr::V4(v4) => v4.is_loopback() || v4.is_private(),
            IpAddr::V6(v6) => {
                if let Some(v4) = v6.to_ipv4_mapped() {
                    return self.is_allowed(IpAddr::V4(v4));
                }
                v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00
            }
        }
    }
}

pub struct AccessGate {
    classifier: Arc<dyn OriginClassifier>,
    trust_forwarded_for: bool,
}

impl AccessGate {
    pub fn new(classifier: Arc<dyn OriginClassifier>, trust_forwarded_for: bool) -> Self {
        Self { classifier, trust_forwarded_for }
    }

    /// The forwarded header's first hop when trusted and parseable, else the socket peer.
    pub fn origin(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
        let forwarded = if self.trust_forwarded_for { forwarded_ip(headers) } else { None };
        forwarded.or_else(|| peer.map(|p| p.ip()))
    }

    pub fn allows(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> bool {
        self.origin(headers, peer)
            .map(|ip| self.classifier.is_allowed(ip))
            .unwrap_or(false)
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get(FORWARDED_FOR)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    first
        .parse::<IpAddr>()
        .ok()
        .or_else(|| first.parse::<SocketAddr>().ok().map(|s| s.ip()))
}

/// Middleware: answers 403 with an empty body before the handler runs.
pub async fn access_gate<B: MessageBody + 'static>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let allowed = match req.app_data::<web::Data<AccessGate>>() {
        Some(gate) => gate.allows(req.headers(), req.peer_addr()),
        None => false,
    };
    if !allowed {
        tracing::warn!("denied {} {} from {:?}", req.method(), req.path(), req.peer_addr());
        return Ok(req.into_response(ServerErr::AccessDenied.error_response()));
    }
    next.call(req).await.map(ServiceResponse::map_into_boxed_body)
}
