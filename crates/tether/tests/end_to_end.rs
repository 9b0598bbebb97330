//! End-to-end exchanges between a frontend and a simulated remote runtime.
//!
//! These tests drive the public API only: the remote side is either the
//! in-memory [`RemoteEnd`] or raw newline-delimited JSON over a tokio duplex
//! pipe.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tether::channel::memory::{self, RemoteEnd};
use tether::codec::HTML_NAMESPACE;
use tether::{
    DispatcherExit, DomEvent, DomMutation, FormProgress, Frontend, InboundHandler, NodeId,
    PropertyTag,
};
use tether_config::Config;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<DomEvent>>>);

impl EventLog {
    fn events(&self) -> Vec<DomEvent> {
        self.0.lock().expect("event log").clone()
    }
}

impl InboundHandler for EventLog {
    fn on_dom_event(&mut self, event: DomEvent) {
        self.0.lock().expect("event log").push(event);
    }

    fn on_history_changed(&mut self, _path: String) {}

    fn on_form_progress(&mut self, _progress: FormProgress) {}
}

async fn close(mut remote: RemoteEnd, dispatcher: tether::DispatcherHandle) {
    remote.hang_up();
    let exit = dispatcher.join().await.expect("dispatcher task");
    assert!(matches!(exit, DispatcherExit::Closed), "got {exit:?}");
}

#[tokio::test]
async fn extracted_property_resolves_with_the_response_value() {
    let (channel, source, mut remote) = memory::pair();
    let (frontend, dispatcher) =
        Frontend::start(channel, source, EventLog::default(), &Config::default());

    let pending = frontend
        .extract_property(&NodeId::from_segments(vec![0, 1]), "value")
        .await
        .expect("extract");
    assert_eq!(pending.descriptor().as_str(), "0");
    assert_eq!(
        remote.next_values().await,
        Some(vec![json!(3), json!("0"), json!("0_1"), json!("value")])
    );

    remote.push(r#"[2,"0:0:hello"]"#).expect("push");
    let value = pending.wait().await.expect("success");
    assert_eq!(value.tag(), PropertyTag::String);
    assert_eq!(value.into_raw(), "hello");

    close(remote, dispatcher).await;
}

#[tokio::test]
async fn property_sigil_sets_a_property_in_the_default_namespace() {
    let (channel, source, mut remote) = memory::pair();
    let (frontend, dispatcher) =
        Frontend::start(channel, source, EventLog::default(), &Config::default());
    let checkbox = NodeId::from_segments(vec![2, 0]);

    let mut batch = frontend.start_batch();
    batch.set_attr(checkbox.clone(), HTML_NAMESPACE, "^checked", "true");
    batch.flush().await.expect("flush");

    let frame = remote.next_values().await.expect("frame");
    assert_eq!(
        frame,
        vec![json!(4), json!(3), json!("2_0"), json!(0), json!("checked"), json!("true"), json!(true)]
    );
    assert_eq!(
        DomMutation::decode_batch(&frame).expect("decode"),
        vec![DomMutation::SetAttr {
            id: checkbox,
            namespace: HTML_NAMESPACE.to_owned(),
            name: "checked".to_owned(),
            value: Value::from("true"),
            is_property: true,
        }]
    );

    close(remote, dispatcher).await;
}

#[tokio::test]
async fn dom_event_invokes_the_event_callback() {
    let (channel, source, remote) = memory::pair();
    let log = EventLog::default();
    let (_frontend, dispatcher) = Frontend::start(channel, source, log.clone(), &Config::default());

    remote.push(r#"[0,"5:12:click"]"#).expect("push");
    close(remote, dispatcher).await;

    assert_eq!(
        log.events(),
        vec![DomEvent {
            render_generation: 5,
            target: "12".parse().expect("node id"),
            event_type: "click".to_owned(),
        }]
    );
}

#[tokio::test]
async fn line_framed_connection_round_trips_a_request() {
    let (server_io, client_io) = tokio::io::duplex(4096);
    let (server_read, server_write) = tokio::io::split(server_io);
    let (client_read, mut client_write) = tokio::io::split(client_io);
    let (frontend, dispatcher) = Frontend::start_lines(
        server_read,
        server_write,
        EventLog::default(),
        &Config::default(),
    );

    let pending = frontend
        .extract_property(&NodeId::root(), "title")
        .await
        .expect("extract");
    let mut lines = BufReader::new(client_read).lines();
    assert_eq!(
        lines.next_line().await.expect("read").as_deref(),
        Some(r#"[3,"0","","title"]"#)
    );

    client_write
        .write_all(b"\n[2,\"0:0:Inbox (3)\"]\r\n")
        .await
        .expect("write");
    assert_eq!(pending.wait().await.expect("success").raw(), "Inbox (3)");

    client_write.shutdown().await.expect("shutdown");
    drop(client_write);
    let exit = dispatcher.join().await.expect("dispatcher task");
    assert!(matches!(exit, DispatcherExit::Closed), "got {exit:?}");
}

#[tokio::test]
async fn oversized_frames_terminate_a_line_framed_connection() {
    let (server_io, client_io) = tokio::io::duplex(4096);
    let (server_read, server_write) = tokio::io::split(server_io);
    let (_client_read, mut client_write) = tokio::io::split(client_io);
    let config = Config::default().with_max_frame_bytes(16);
    let (frontend, dispatcher) =
        Frontend::start_lines(server_read, server_write, EventLog::default(), &config);
    let pending = frontend
        .extract_property(&NodeId::root(), "title")
        .await
        .expect("extract");

    client_write
        .write_all(b"[2,\"0:0:this value is far too long\"]\n")
        .await
        .expect("write");

    let exit = dispatcher.join().await.expect("dispatcher task");
    assert!(
        matches!(exit, DispatcherExit::Failed(tether::ChannelError::FrameTooLarge { limit: 16 })),
        "got {exit:?}"
    );
    assert!(matches!(
        pending.wait().await,
        Err(tether::RequestError::Disconnected { .. })
    ));
}
