//! 통합 테스트 -- 소켓 수집기 전체 흐름 검증
//!
//! 실제 TCP 연결로 레코드를 보내고 버스에서 정규화된 이벤트를 받습니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use decanter_collector::socket::record;
use decanter_collector::{
    CollectorError, Framing, HostIdentity, ListenerState, LoggingRecord, SocketCollector,
    SocketCollectorConfig,
};
use decanter_core::{Event, EventBus, Subscription, TopicFilter};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn config(framing: Framing) -> SocketCollectorConfig {
    SocketCollectorConfig {
        bind_addr: "127.0.0.1:0".to_owned(),
        framing,
        max_message_size: 4096,
        shutdown_grace: Duration::from_millis(500),
        instance_name: Some("itest".to_owned()),
        ..Default::default()
    }
}

async fn start(framing: Framing) -> (SocketCollector, Subscription, std::net::SocketAddr) {
    start_with(config(framing)).await
}

async fn start_with(
    config: SocketCollectorConfig,
) -> (SocketCollector, Subscription, std::net::SocketAddr) {
    let bus = EventBus::new(256);
    let sub = bus.subscribe(TopicFilter::new("decanter/collect/log/*").unwrap());
    let host = HostIdentity::new(Some("192.0.2.10".to_owned()), Some("itest-host".to_owned()));
    let mut collector = SocketCollector::with_host(config, Arc::new(bus), host);
    let addr = collector.open().await.expect("failed to open collector");
    (collector, sub, addr)
}

async fn wait_for_accepted(collector: &SocketCollector, count: u64) {
    timeout(RECV_TIMEOUT, async {
        while collector.stats().connections_accepted < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection was not accepted");
}

fn frame(framing: Framing, record: &LoggingRecord) -> Vec<u8> {
    framing.encode(&record::encode(record).unwrap()).to_vec()
}

async fn next_event(sub: &mut Subscription) -> Arc<Event> {
    timeout(RECV_TIMEOUT, sub.recv())
        .await
        .expect("timed out waiting for event")
        .expect("bus closed")
}

/// 한 연결의 레코드는 보낸 순서대로 퍼블리시됨
#[tokio::test]
async fn test_records_published_in_order() {
    let (mut collector, mut sub, addr) = start(Framing::NewlineDelimited).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    for (i, logger) in ["com.example.A", "com.example.B", "com.example.C"].iter().enumerate() {
        let record = LoggingRecord::new(*logger, "INFO", 1_700_000_000_000 + i as i64, format!("msg {i}"));
        stream.write_all(&frame(Framing::NewlineDelimited, &record)).await.unwrap();
    }
    stream.flush().await.unwrap();

    let topics = [
        "decanter/collect/log/com/example/A",
        "decanter/collect/log/com/example/B",
        "decanter/collect/log/com/example/C",
    ];
    for (i, expected) in topics.iter().enumerate() {
        let event = next_event(&mut sub).await;
        assert_eq!(event.topic().as_str(), *expected);
        assert_eq!(event.attribute_str("message"), Some(format!("msg {i}").as_str()));
    }

    collector.close().await;
    assert_eq!(collector.stats().events_published, 3);
}

/// 동일한 레코드 세 개는 세 번의 퍼블리시가 됨
#[tokio::test]
async fn test_identical_records_each_published() {
    let (mut collector, mut sub, addr) = start(Framing::NewlineDelimited).await;

    let record = LoggingRecord::new("com.example.Same", "DEBUG", 1_700_000_000_777, "again");
    let payload = frame(Framing::NewlineDelimited, &record);
    let mut stream = TcpStream::connect(addr).await.unwrap();
    for _ in 0..3 {
        stream.write_all(&payload).await.unwrap();
    }

    let mut events = Vec::new();
    for _ in 0..3 {
        events.push(next_event(&mut sub).await);
    }
    for event in &events {
        assert_eq!(event.topic().as_str(), "decanter/collect/log/com/example/Same");
        assert_eq!(event.timestamp(), Some(1_700_000_000_777));
        assert_eq!(event.attributes(), events[0].attributes());
    }

    collector.close().await;
}

/// 레코드 타임스탬프와 호스트 정보가 그대로 전달됨
#[tokio::test]
async fn test_event_attributes() {
    let (mut collector, mut sub, addr) = start(Framing::NewlineDelimited).await;

    let mut record = LoggingRecord::new("org.acme.Billing", "WARN", 1_700_000_000_123, "late invoice");
    record.thread_name = Some("worker-3".to_owned());
    record.mdc.insert("tenant".to_owned(), "acme".to_owned());

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(&frame(Framing::NewlineDelimited, &record)).await.unwrap();

    let event = next_event(&mut sub).await;
    assert_eq!(event.timestamp(), Some(1_700_000_000_123));
    assert_eq!(event.attribute_str("level"), Some("WARN"));
    assert_eq!(event.attribute_str("loggerName"), Some("org.acme.Billing"));
    assert_eq!(event.attribute_str("threadName"), Some("worker-3"));
    assert_eq!(event.attribute_str("renderedMessage"), Some("late invoice"));
    assert_eq!(event.attribute_str("hostAddress"), Some("192.0.2.10"));
    assert_eq!(event.attribute_str("hostName"), Some("itest-host"));
    assert_eq!(event.attribute_str("type"), Some("log"));
    assert_eq!(event.attribute_str("instanceName"), Some("itest"));
    assert_eq!(event.attribute("MDC"), Some(&serde_json::json!({"tenant": "acme"})));

    collector.close().await;
}

/// 잘못된 레코드는 건너뛰고 연결은 유지됨
#[tokio::test]
async fn test_malformed_record_skipped() {
    let (mut collector, mut sub, addr) = start(Framing::NewlineDelimited).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"{not json}\n").await.unwrap();
    stream.write_all(b"{\"kind\":\"heartbeat\"}\n").await.unwrap();
    let record = LoggingRecord::new("after.bad", "INFO", 1, "still alive");
    stream.write_all(&frame(Framing::NewlineDelimited, &record)).await.unwrap();

    let event = next_event(&mut sub).await;
    assert_eq!(event.topic().as_str(), "decanter/collect/log/after/bad");

    collector.close().await;
    let stats = collector.stats();
    assert_eq!(stats.records_received, 3);
    assert_eq!(stats.records_dropped, 2);
    assert_eq!(stats.events_published, 1);
}

/// 길이 접두사 프레이밍
#[tokio::test]
async fn test_length_prefixed_framing() {
    let (mut collector, mut sub, addr) = start(Framing::LengthPrefixed).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut record = LoggingRecord::new("multi.line", "ERROR", 5, "boom");
    record.throwable = Some(vec!["java.lang.IllegalStateException: boom".to_owned(), "\tat Foo.bar(Foo.java:1)".to_owned()]);
    stream.write_all(&frame(Framing::LengthPrefixed, &record)).await.unwrap();

    let event = next_event(&mut sub).await;
    assert_eq!(event.topic().as_str(), "decanter/collect/log/multi/line");
    assert_eq!(
        event.attribute_str("throwable"),
        Some("java.lang.IllegalStateException: boom\n\tat Foo.bar(Foo.java:1)\n")
    );

    collector.close().await;
}

/// 조용히 열려 있는 연결이 다른 연결의 레코드를 막지 않음
#[tokio::test]
async fn test_silent_connection_does_not_block_others() {
    let (mut collector, mut sub, addr) = start(Framing::NewlineDelimited).await;

    let _silent = TcpStream::connect(addr).await.unwrap();
    wait_for_accepted(&collector, 1).await;

    let mut active = TcpStream::connect(addr).await.unwrap();
    let record = LoggingRecord::new("com.example.Active", "WARN", 5, "still flowing");
    active.write_all(&frame(Framing::NewlineDelimited, &record)).await.unwrap();

    let event = next_event(&mut sub).await;
    assert_eq!(event.topic().as_str(), "decanter/collect/log/com/example/Active");
    assert_eq!(event.attribute_str("message"), Some("still flowing"));

    collector.close().await;
    assert_eq!(collector.stats().connections_accepted, 2);
}

/// 최대 연결 수를 넘는 연결은 즉시 닫히고 거부 카운터가 증가함
#[tokio::test]
async fn test_connection_over_limit_rejected() {
    let (mut collector, mut sub, addr) = start_with(SocketCollectorConfig {
        max_connections: 1,
        ..config(Framing::NewlineDelimited)
    })
    .await;

    let mut held = TcpStream::connect(addr).await.unwrap();
    wait_for_accepted(&collector, 1).await;

    let mut rejected = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 16];
    let read = timeout(RECV_TIMEOUT, rejected.read(&mut buf))
        .await
        .expect("rejected connection was left open");
    // EOF 또는 연결 리셋
    assert!(matches!(read, Ok(0) | Err(_)), "unexpected read: {read:?}");
    assert_eq!(collector.stats().connections_rejected, 1);

    // 기존 연결은 계속 동작함
    let record = LoggingRecord::new("held.conn", "INFO", 3, "ok");
    held.write_all(&frame(Framing::NewlineDelimited, &record)).await.unwrap();
    let event = next_event(&mut sub).await;
    assert_eq!(event.topic().as_str(), "decanter/collect/log/held/conn");

    collector.close().await;
    assert_eq!(collector.stats().connections_accepted, 1);
}

/// 최대 크기를 넘는 레코드는 연결을 닫고, 다른 연결은 영향받지 않음
#[tokio::test]
async fn test_oversize_record_closes_connection() {
    let (mut collector, mut sub, addr) = start(Framing::NewlineDelimited).await;

    let mut bad = TcpStream::connect(addr).await.unwrap();
    let mut huge = vec![b'x'; 8192];
    huge.push(b'\n');
    bad.write_all(&huge).await.unwrap();
    let follow_up = LoggingRecord::new("never.seen", "INFO", 1, "dropped");
    // 서버가 이미 닫았을 수 있으므로 쓰기 실패는 무시
    let _ = bad.write_all(&frame(Framing::NewlineDelimited, &follow_up)).await;

    let mut good = TcpStream::connect(addr).await.unwrap();
    let record = LoggingRecord::new("other.conn", "INFO", 2, "fine");
    good.write_all(&frame(Framing::NewlineDelimited, &record)).await.unwrap();

    let event = next_event(&mut sub).await;
    assert_eq!(event.topic().as_str(), "decanter/collect/log/other/conn");

    collector.close().await;
    let stats = collector.stats();
    assert_eq!(stats.events_published, 1);
    assert!(stats.records_dropped >= 1);
}

/// close는 여러 번 호출해도 Stopped로 끝남
#[tokio::test]
async fn test_close_is_idempotent() {
    let (mut collector, _sub, _addr) = start(Framing::NewlineDelimited).await;
    assert_eq!(collector.state(), ListenerState::Listening);

    collector.close().await;
    assert_eq!(collector.state(), ListenerState::Stopped);
    collector.close().await;
    assert_eq!(collector.state(), ListenerState::Stopped);

    let reopen = collector.open().await;
    assert!(matches!(reopen, Err(CollectorError::InvalidState { .. })));
}

/// 열린 연결이 있어도 close는 유예 시간 안에 끝남
#[tokio::test]
async fn test_close_with_idle_connection() {
    let (mut collector, _sub, addr) = start(Framing::NewlineDelimited).await;
    let _idle = TcpStream::connect(addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    timeout(Duration::from_secs(3), collector.close())
        .await
        .expect("close did not finish");
    assert_eq!(collector.state(), ListenerState::Stopped);
}

/// 이미 사용 중인 주소에 바인드하면 open이 실패함
#[tokio::test]
async fn test_bind_failure() {
    let (mut first, _sub, addr) = start(Framing::NewlineDelimited).await;

    let mut second = SocketCollector::with_host(
        SocketCollectorConfig {
            bind_addr: addr.to_string(),
            ..config(Framing::NewlineDelimited)
        },
        Arc::new(EventBus::new(8)),
        HostIdentity::default(),
    );
    let result = second.open().await;
    assert!(matches!(result, Err(CollectorError::Bind { .. })));
    assert_eq!(second.state(), ListenerState::Created);

    first.close().await;
}
