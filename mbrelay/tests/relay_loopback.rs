//! End-to-end relay tests against loopback Modbus devices

use mbrelay::{ProtocolBridge, RelayConfig, RelayStatistics, Scheduler};
use mbrelay_core::RequestAdu;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How the simulated source controller answers
#[derive(Debug, Clone, Copy)]
enum Answer {
    Registers,
    Exception(u8),
}

fn register_response(adu: &RequestAdu) -> Vec<u8> {
    let request = adu.request();
    let byte_count = 2 * request.register_count() as usize;
    let mut frame = Vec::with_capacity(9 + byte_count);
    frame.extend_from_slice(&adu.transaction_id().to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&((3 + byte_count) as u16).to_be_bytes());
    frame.push(request.unit_id());
    frame.push(request.function_code());
    frame.push(byte_count as u8);
    for register in 0..request.register_count() {
        frame.extend_from_slice(&(request.start_register() + register).wrapping_mul(3).to_be_bytes());
    }
    frame
}

fn exception_response(adu: &RequestAdu, code: u8) -> Vec<u8> {
    let mut frame = Vec::with_capacity(9);
    frame.extend_from_slice(&adu.transaction_id().to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x03]);
    frame.push(adu.request().unit_id());
    frame.push(adu.request().function_code() | 0x80);
    frame.push(code);
    frame
}

/// Controller that answers every request on its first connection
async fn spawn_source_device(answer: Answer) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 12];
        while stream.read_exact(&mut request).await.is_ok() {
            let adu = RequestAdu::decode(&request).unwrap();
            let reply = match answer {
                Answer::Registers => register_response(&adu),
                Answer::Exception(code) => exception_response(&adu, code),
            };
            if stream.write_all(&reply).await.is_err() {
                break;
            }
        }
    });
    address
}

/// Controller that reports every relayed frame of `frame_length` bytes
async fn spawn_target_device(frame_length: usize) -> (SocketAddr, mpsc::Receiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        loop {
            let mut frame = vec![0u8; frame_length];
            if stream.read_exact(&mut frame).await.is_err() || tx.send(frame).await.is_err() {
                break;
            }
        }
    });
    (address, rx)
}

fn fast_config(source: SocketAddr, target: SocketAddr) -> RelayConfig {
    RelayConfig::builder()
        .source(source)
        .target(target)
        .tick_interval(Duration::from_millis(20))
        .reconnect_backoff(Duration::from_millis(20))
        .settle_delay(Duration::from_millis(20))
        .poll_interval(Duration::from_millis(50))
        .build()
        .unwrap()
}

fn start_relay(config: &RelayConfig) -> (CancellationToken, JoinHandle<RelayStatistics>) {
    let shutdown = CancellationToken::new();
    let scheduler = Scheduler::new(
        ProtocolBridge::from_config(config),
        config.timing(),
        shutdown.clone(),
    );
    (shutdown, tokio::spawn(scheduler.run()))
}

#[tokio::test]
async fn test_relays_register_response_verbatim() {
    let source = spawn_source_device(Answer::Registers).await;
    let (target, mut relayed) = spawn_target_device(49).await;
    let config = fast_config(source, target);
    let (shutdown, relay) = start_relay(&config);

    let first = tokio::time::timeout(Duration::from_secs(5), relayed.recv())
        .await
        .expect("no response relayed")
        .unwrap();
    let expected = register_response(&RequestAdu::decode(&[
        0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x0a, 0x04, 0x00, 0x00, 0x00, 0x14,
    ])
    .unwrap());
    assert_eq!(first, expected);

    let second = tokio::time::timeout(Duration::from_secs(5), relayed.recv())
        .await
        .expect("no second response relayed")
        .unwrap();
    assert_eq!(&second[..2], &[0x00, 0x02]);

    shutdown.cancel();
    let stats = relay.await.unwrap();
    assert!(stats.responses_forwarded >= 2);
    assert_eq!(stats.protocol_failures, 0);
    assert_eq!(stats.transport_failures, 0);
    assert_eq!(stats.reconnects, 2);
}

#[tokio::test]
async fn test_custom_register_window() {
    let source = spawn_source_device(Answer::Registers).await;
    let (target, mut relayed) = spawn_target_device(13).await;
    let config = RelayConfig::builder()
        .source(source)
        .target(target)
        .unit_id(1)
        .start_register(100)
        .register_count(2)
        .tick_interval(Duration::from_millis(20))
        .settle_delay(Duration::from_millis(20))
        .poll_interval(Duration::from_millis(50))
        .build()
        .unwrap();
    let (shutdown, relay) = start_relay(&config);

    let frame = tokio::time::timeout(Duration::from_secs(5), relayed.recv())
        .await
        .expect("no response relayed")
        .unwrap();
    assert_eq!(frame.len(), 13);
    assert_eq!(frame[6], 1);
    assert_eq!(frame[8], 4);
    assert_eq!(&frame[9..11], &300u16.to_be_bytes());

    shutdown.cancel();
    relay.await.unwrap();
}

#[tokio::test]
async fn test_exception_response_is_consumed() {
    let source = spawn_source_device(Answer::Exception(0x02)).await;
    let (target, mut relayed) = spawn_target_device(9).await;
    let config = fast_config(source, target);
    let (shutdown, relay) = start_relay(&config);

    tokio::time::sleep(Duration::from_millis(400)).await;
    shutdown.cancel();
    let stats = relay.await.unwrap();

    assert!(stats.exceptions_suppressed >= 1);
    assert_eq!(stats.responses_forwarded, 0);
    assert_eq!(stats.protocol_failures, 0);
    assert!(relayed.try_recv().is_err());
}

#[tokio::test]
async fn test_unreachable_source_relays_nothing() {
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let source = closed.local_addr().unwrap();
    drop(closed);
    let (target, mut relayed) = spawn_target_device(49).await;
    let config = fast_config(source, target);
    let (shutdown, relay) = start_relay(&config);

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown.cancel();
    let stats = relay.await.unwrap();

    assert!(stats.cycles >= 1);
    assert_eq!(stats.responses_forwarded, 0);
    assert!(stats.deferred_cycles + stats.transport_failures + stats.protocol_failures >= 1);
    assert!(relayed.try_recv().is_err());
}
