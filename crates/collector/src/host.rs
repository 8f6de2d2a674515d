//! 로컬 호스트 식별 정보
//!
//! 호스트명과 주소는 최선 노력(best effort)으로 한 번만 조회하여 캐시합니다.
//! 조회에 실패한 필드는 이벤트에서 생략됩니다.

use std::net::ToSocketAddrs;
use std::sync::OnceLock;

use decanter_core::event::{Attributes, keys};
use serde_json::Value;
use tracing::debug;

/// 호스트 주소와 이름
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostIdentity {
    address: Option<String>,
    name: Option<String>,
}

static LOCAL: OnceLock<HostIdentity> = OnceLock::new();

impl HostIdentity {
    /// 주어진 값으로 생성합니다.
    pub fn new(address: Option<String>, name: Option<String>) -> Self {
        Self { address, name }
    }

    /// 로컬 호스트 정보를 반환합니다 (첫 호출 시 조회 후 캐시).
    ///
    /// 첫 호출은 DNS 조회로 블로킹될 수 있습니다. 비동기 문맥에서는
    /// [`HostIdentity::local_async`]를 사용하세요.
    pub fn local() -> &'static HostIdentity {
        LOCAL.get_or_init(Self::resolve)
    }

    /// 블로킹 스레드 풀에서 로컬 호스트 정보를 조회합니다.
    ///
    /// 조회 작업이 실패하면 빈 식별 정보를 반환합니다.
    pub async fn local_async() -> HostIdentity {
        if let Some(cached) = LOCAL.get() {
            return cached.clone();
        }
        match tokio::task::spawn_blocking(|| Self::local().clone()).await {
            Ok(host) => host,
            Err(e) => {
                debug!(error = %e, "host lookup task failed");
                HostIdentity::default()
            }
        }
    }

    fn resolve() -> Self {
        let name = match hostname::get() {
            Ok(name) => name.into_string().ok().filter(|n| !n.is_empty()),
            Err(e) => {
                debug!(error = %e, "failed to read local hostname");
                None
            }
        };

        let address = name.as_deref().and_then(|host| {
            match (host, 0).to_socket_addrs() {
                Ok(mut addrs) => addrs.next().map(|addr| addr.ip().to_string()),
                Err(e) => {
                    debug!(host, error = %e, "failed to resolve local host address");
                    None
                }
            }
        });

        Self { address, name }
    }

    /// 호스트 주소
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// 호스트명
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 알려진 필드만 `hostAddress`, `hostName`으로 속성 맵에 추가합니다.
    pub fn apply(&self, attributes: &mut Attributes) {
        if let Some(address) = &self.address {
            attributes.insert(keys::HOST_ADDRESS.to_owned(), Value::from(address.as_str()));
        }
        if let Some(name) = &self.name {
            attributes.insert(keys::HOST_NAME.to_owned(), Value::from(name.as_str()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_adds_known_fields() {
        let host = HostIdentity::new(Some("10.0.0.5".to_owned()), Some("edge-1".to_owned()));
        let mut attrs = Attributes::new();
        host.apply(&mut attrs);
        assert_eq!(attrs[keys::HOST_ADDRESS], "10.0.0.5");
        assert_eq!(attrs[keys::HOST_NAME], "edge-1");
    }

    #[test]
    fn apply_omits_unknown_fields() {
        let host = HostIdentity::new(None, Some("edge-1".to_owned()));
        let mut attrs = Attributes::new();
        host.apply(&mut attrs);
        assert!(!attrs.contains_key(keys::HOST_ADDRESS));
        assert!(attrs.contains_key(keys::HOST_NAME));

        let mut empty = Attributes::new();
        HostIdentity::default().apply(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn local_is_cached() {
        let first = HostIdentity::local();
        let second = HostIdentity::local();
        assert!(std::ptr::eq(first, second));
    }

    #[tokio::test]
    async fn async_lookup_matches_cache() {
        let resolved = HostIdentity::local_async().await;
        assert_eq!(&resolved, HostIdentity::local());
    }
}
