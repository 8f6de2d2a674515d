//! 로그 소켓 수집기
//!
//! TCP로 들어오는 로그 레코드 스트림을 받아 정규화된 이벤트로 퍼블리시합니다.
//!
//! # 상태 전이
//! ```text
//! Created --open()--> Listening --close()--> Stopping --> Stopped
//!    |                                                       ^
//!    +----------------------close()--------------------------+
//! ```
//!
//! 리스너마다 수락 태스크 하나, 수락된 연결마다 태스크 하나가 실행됩니다.
//! 동시 연결 수는 세마포어로 제한되며 상한을 넘는 연결은 즉시 닫힙니다.
//! 한 연결의 레코드는 수신 순서대로 처리되고, 느린 연결이 다른 연결의 수락을
//! 막지 않습니다.

pub mod codec;
pub mod record;

pub use codec::{FrameReader, Framing};
pub use record::{LocationInfo, LoggingRecord, WireRecord};

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use decanter_core::config::{GeneralConfig, SocketConfig};
use decanter_core::metrics as m;
use decanter_core::publish::EventPublisher;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::CollectorError;
use crate::host::HostIdentity;

/// accept 에러 후 재시도 전 대기 시간
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// 소켓 수집기 설정
#[derive(Debug, Clone)]
pub struct SocketCollectorConfig {
    /// 바인드 주소 (예: "0.0.0.0:4560")
    pub bind_addr: String,
    /// 최대 동시 연결 수
    pub max_connections: usize,
    /// 프레이밍 방식
    pub framing: Framing,
    /// 최대 레코드 크기 (바이트)
    pub max_message_size: usize,
    /// 종료 시 진행 중인 연결을 기다리는 시간
    pub shutdown_grace: Duration,
    /// 이벤트에 붙일 인스턴스 이름
    pub instance_name: Option<String>,
}

impl Default for SocketCollectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4560".to_owned(),
            max_connections: 256,
            framing: Framing::default(),
            max_message_size: 1024 * 1024, // 1MB
            shutdown_grace: Duration::from_secs(2),
            instance_name: None,
        }
    }
}

impl SocketCollectorConfig {
    /// core 설정 섹션에서 생성합니다.
    pub fn from_core(socket: &SocketConfig, general: &GeneralConfig) -> Result<Self, CollectorError> {
        if socket.max_connections == 0 {
            return Err(CollectorError::Config {
                field: "socket.max_connections".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            bind_addr: socket.bind_addr.clone(),
            max_connections: socket.max_connections,
            framing: socket.framing.parse()?,
            max_message_size: socket.max_message_size,
            shutdown_grace: Duration::from_secs(socket.shutdown_grace_secs),
            instance_name: general.instance_name().map(str::to_owned),
        })
    }
}

/// 리스너 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// 생성됨, 아직 바인드하지 않음
    Created,
    /// 연결 수락 중
    Listening,
    /// 종료 진행 중
    Stopping,
    /// 종료됨 (종단 상태)
    Stopped,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Listening => f.write_str("listening"),
            Self::Stopping => f.write_str("stopping"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// 수집 통계
#[derive(Debug, Default)]
struct SocketStats {
    connections_accepted: AtomicU64,
    connections_rejected: AtomicU64,
    records_received: AtomicU64,
    records_dropped: AtomicU64,
    events_published: AtomicU64,
}

/// 수집 통계 스냅샷
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SocketStatsSnapshot {
    pub connections_accepted: u64,
    pub connections_rejected: u64,
    pub records_received: u64,
    pub records_dropped: u64,
    pub events_published: u64,
}

impl SocketStats {
    fn snapshot(&self) -> SocketStatsSnapshot {
        SocketStatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            records_received: self.records_received.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
        }
    }
}

/// 연결 태스크들이 공유하는 처리 컨텍스트
struct ConnectionContext {
    framing: Framing,
    max_message_size: usize,
    publisher: Arc<dyn EventPublisher>,
    host: HostIdentity,
    instance_name: Option<String>,
    stats: Arc<SocketStats>,
}

/// 로그 소켓 수집기
///
/// 명시적인 `open()`/`close()`를 가진 소유 자원입니다.
/// `close()` 없이 drop되면 모든 태스크를 취소하고 중단합니다.
pub struct SocketCollector {
    config: SocketCollectorConfig,
    publisher: Arc<dyn EventPublisher>,
    host: HostIdentity,
    state: ListenerState,
    cancel: CancellationToken,
    acceptor: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    stats: Arc<SocketStats>,
}

impl SocketCollector {
    /// 새 소켓 수집기를 생성합니다. 로컬 호스트 정보를 사용합니다.
    pub fn new(config: SocketCollectorConfig, publisher: Arc<dyn EventPublisher>) -> Self {
        Self::with_host(config, publisher, HostIdentity::local().clone())
    }

    /// 호스트 정보를 지정하여 생성합니다.
    pub fn with_host(
        config: SocketCollectorConfig,
        publisher: Arc<dyn EventPublisher>,
        host: HostIdentity,
    ) -> Self {
        Self {
            config,
            publisher,
            host,
            state: ListenerState::Created,
            cancel: CancellationToken::new(),
            acceptor: None,
            local_addr: None,
            stats: Arc::new(SocketStats::default()),
        }
    }

    /// 소켓에 바인드하고 수락 태스크를 시작합니다.
    ///
    /// 바인드 실패는 즉시 반환되며 상태는 `Created`로 남습니다.
    pub async fn open(&mut self) -> Result<SocketAddr, CollectorError> {
        if self.state != ListenerState::Created {
            return Err(CollectorError::InvalidState {
                operation: "open",
                state: self.state.to_string(),
            });
        }

        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|source| CollectorError::Bind {
                addr: self.config.bind_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let ctx = Arc::new(ConnectionContext {
            framing: self.config.framing,
            max_message_size: self.config.max_message_size,
            publisher: Arc::clone(&self.publisher),
            host: self.host.clone(),
            instance_name: self.config.instance_name.clone(),
            stats: Arc::clone(&self.stats),
        });

        self.acceptor = Some(tokio::spawn(accept_loop(
            listener,
            ctx,
            self.config.max_connections,
            self.cancel.clone(),
        )));
        self.local_addr = Some(local_addr);
        self.state = ListenerState::Listening;

        info!(
            addr = %local_addr,
            framing = %self.config.framing,
            max_connections = self.config.max_connections,
            "log socket collector listening"
        );
        Ok(local_addr)
    }

    /// 수집기를 종료합니다.
    ///
    /// 수락을 멈추고 진행 중인 연결이 유예 시간 안에 끝나기를 기다린 뒤,
    /// 남은 연결은 강제로 취소합니다. 여러 번 호출해도 안전하며 항상
    /// `Stopped` 상태로 끝납니다.
    pub async fn close(&mut self) {
        match self.state {
            ListenerState::Created | ListenerState::Stopped => {
                self.state = ListenerState::Stopped;
                return;
            }
            ListenerState::Listening | ListenerState::Stopping => {}
        }

        self.state = ListenerState::Stopping;
        info!(addr = ?self.local_addr, "stopping log socket collector");
        self.cancel.cancel();

        if let Some(mut acceptor) = self.acceptor.take() {
            match tokio::time::timeout(self.config.shutdown_grace, &mut acceptor).await {
                Ok(Ok(())) => debug!("all connections drained"),
                Ok(Err(e)) => warn!(error = %e, "acceptor task failed"),
                Err(_) => {
                    warn!(
                        grace_ms = self.config.shutdown_grace.as_millis() as u64,
                        "shutdown grace period elapsed, aborting open connections"
                    );
                    // 수락 태스크가 소유한 JoinSet이 drop되며 연결 태스크도 중단됨
                    acceptor.abort();
                    let _ = acceptor.await;
                }
            }
        }

        self.state = ListenerState::Stopped;
        info!(stats = ?self.stats.snapshot(), "log socket collector stopped");
    }

    /// 현재 상태
    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// 실제로 바인드된 주소 (`open()` 이후)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 설정된 바인드 주소
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// 수집 통계
    pub fn stats(&self) -> SocketStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for SocketCollector {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
    }
}

/// 연결 수락 루프
///
/// 취소되면 리스너를 닫고, 진행 중인 연결이 모두 끝날 때까지 기다립니다.
async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<ConnectionContext>,
    max_connections: usize,
    cancel: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(max_connections));
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "connection task failed");
                }
            }
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                        warn!(peer = %peer, max_connections, "max connections reached, rejecting");
                        ctx.stats.connections_rejected.fetch_add(1, Ordering::Relaxed);
                        metrics::counter!(m::SOCKET_CONNECTIONS_REJECTED_TOTAL).increment(1);
                        continue;
                    };

                    ctx.stats.connections_accepted.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(m::SOCKET_CONNECTIONS_ACCEPTED_TOTAL).increment(1);

                    let ctx = Arc::clone(&ctx);
                    connections.spawn(async move {
                        ctx.handle_connection(stream, peer).await;
                        drop(permit);
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    drop(listener);
    if !connections.is_empty() {
        debug!(open = connections.len(), "waiting for open connections to drain");
    }
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "connection task failed");
        }
    }
}

impl ConnectionContext {
    /// 연결 하나를 EOF 또는 에러까지 처리합니다.
    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        debug!(peer = %peer, "connection accepted");
        metrics::gauge!(m::SOCKET_ACTIVE_CONNECTIONS).increment(1.0);

        let mut frames = FrameReader::new(stream, self.framing, self.max_message_size);
        loop {
            match frames.next_frame().await {
                Ok(Some(frame)) => self.process_frame(&frame, peer),
                Ok(None) => {
                    debug!(peer = %peer, "connection closed by peer");
                    break;
                }
                Err(e @ CollectorError::FrameTooLarge { .. }) => {
                    warn!(peer = %peer, error = %e, "oversized record, closing connection");
                    self.record_dropped("oversize");
                    break;
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "read failed, closing connection");
                    self.record_dropped("io");
                    break;
                }
            }
        }

        metrics::gauge!(m::SOCKET_ACTIVE_CONNECTIONS).decrement(1.0);
    }

    fn process_frame(&self, frame: &[u8], peer: SocketAddr) {
        self.stats.records_received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::SOCKET_RECORDS_RECEIVED_TOTAL).increment(1);

        let record = match record::decode(frame) {
            Ok(record) => record,
            Err(e) => {
                warn!(peer = %peer, error = %e, "skipping malformed record");
                self.record_dropped("decode");
                return;
            }
        };

        let event = record.into_event(&self.host, self.instance_name.as_deref());
        trace!(peer = %peer, topic = %event.topic(), "publishing log event");
        match self.publisher.publish(event) {
            Ok(()) => {
                self.stats.events_published.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::EVENTS_PUBLISHED_TOTAL, m::LABEL_SOURCE => m::SOURCE_LOG)
                    .increment(1);
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "failed to publish log event");
                metrics::counter!(m::PUBLISH_FAILURES_TOTAL, m::LABEL_SOURCE => m::SOURCE_LOG)
                    .increment(1);
            }
        }
    }

    fn record_dropped(&self, reason: &'static str) {
        self.stats.records_dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::SOCKET_RECORDS_DROPPED_TOTAL, m::LABEL_REASON => reason).increment(1);
    }
}
