//! Integration tests for the TCP ingress server.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use wavehome_events::{Gesture, Hand, PipelineStats};
use wavehome_ingress::{DetectionBus, IngressServer};

async fn recv_timeout(
    rx: &mut tokio::sync::mpsc::Receiver<wavehome_events::RawDetection>,
) -> wavehome_events::RawDetection {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for detection")
        .expect("channel closed")
}

#[tokio::test]
async fn receives_detections_and_skips_malformed() {
    let mut bus = DetectionBus::new();
    let sender = bus.sender();
    let mut rx = bus.take_receiver().unwrap();
    let stats = Arc::new(PipelineStats::new());
    let cancel = CancellationToken::new();

    let server = IngressServer::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    let server_task = tokio::spawn(server.run(sender, Arc::clone(&stats), cancel.clone()));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            concat!(
                r#"{"gesture": "Open_Palm", "hand": "Right", "confidence": 0.9, "timestamp": 1}"#,
                "\n",
                "this is not json\n",
                r#"{"gesture": "Closed_Fist", "hand": "Left", "confidence": 0.85, "timestamp": 2}"#,
                "\n",
            )
            .as_bytes(),
        )
        .await
        .unwrap();
    stream.flush().await.unwrap();

    let first = recv_timeout(&mut rx).await;
    assert_eq!(first.gesture, Gesture::OpenPalm);
    assert_eq!(first.hand, Hand::Right);

    // The malformed line in between was skipped, not fatal.
    let second = recv_timeout(&mut rx).await;
    assert_eq!(second.gesture, Gesture::ClosedFist);

    assert_eq!(stats.received(), 3);
    assert_eq!(stats.malformed(), 1);

    cancel.cancel();
    let _ = server_task.await;
}

#[tokio::test]
async fn survives_producer_reconnect() {
    let mut bus = DetectionBus::new();
    let sender = bus.sender();
    let mut rx = bus.take_receiver().unwrap();
    let stats = Arc::new(PipelineStats::new());
    let cancel = CancellationToken::new();

    let server = IngressServer::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    let server_task = tokio::spawn(server.run(sender, stats, cancel.clone()));

    {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"{\"gesture\": \"Victory\", \"hand\": \"Left\", \"confidence\": 0.9, \"timestamp\": 1}\n",
            )
            .await
            .unwrap();
        stream.flush().await.unwrap();
    }
    assert_eq!(recv_timeout(&mut rx).await.gesture, Gesture::Victory);

    // Producer restarts; the same channel keeps delivering.
    {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"{\"gesture\": \"Thumb_Up\", \"hand\": \"Right\", \"confidence\": 0.9, \"timestamp\": 2}\n",
            )
            .await
            .unwrap();
        stream.flush().await.unwrap();
    }
    assert_eq!(recv_timeout(&mut rx).await.gesture, Gesture::ThumbUp);

    cancel.cancel();
    let _ = server_task.await;
}
