//! Crate-level integration and BDD tests.

use tether_config::Config;
use tokio::sync::mpsc;

use crate::channel::memory::{self, MemoryChannel, RemoteEnd};
use crate::codec::{HTML_NAMESPACE, NodeId};
use crate::dispatch::{DispatcherHandle, InboundHandler};
use crate::frontend::Frontend;
use crate::inbound::{DomEvent, FormProgress};
use crate::protocol::DomMutation;


/// An inbound callback observed by [`Recorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Recorded {
    Event(DomEvent),
    History(String),
    Progress(FormProgress),
}

/// Handler forwarding every callback to a channel the test can read.
struct Recorder(mpsc::UnboundedSender<Recorded>);

impl InboundHandler for Recorder {
    fn on_dom_event(&mut self, event: DomEvent) {
        drop(self.0.send(Recorded::Event(event)));
    }

    fn on_history_changed(&mut self, path: String) {
        drop(self.0.send(Recorded::History(path)));
    }

    fn on_form_progress(&mut self, progress: FormProgress) {
        drop(self.0.send(Recorded::Progress(progress)));
    }
}

struct Connection {
    frontend: Frontend<MemoryChannel>,
    remote: RemoteEnd,
    dispatcher: DispatcherHandle,
    recorded: mpsc::UnboundedReceiver<Recorded>,
}

/// Starts a frontend over an in-memory channel. Requires a tokio runtime.
fn connect(config: &Config) -> Connection {
    let (channel, source, remote) = memory::pair();
    let (tx, recorded) = mpsc::unbounded_channel();
    let (frontend, dispatcher) = Frontend::start(channel, source, Recorder(tx), config);
    Connection {
        frontend,
        remote,
        dispatcher,
        recorded,
    }
}

#[tokio::test]
async fn upload_progress_is_tagged_with_the_upload_descriptor() {
    let mut conn = connect(&Config::default());
    let form = NodeId::from_segments(vec![0, 4]);

    let descriptor = conn.frontend.upload_form(&form).await.expect("upload");
    assert_eq!(
        conn.remote.next_frame().await.as_deref(),
        Some(r#"[7,"0_4","0"]"#)
    );
    assert_eq!(conn.frontend.table().outstanding(), 0);

    conn.remote
        .push(format!(r#"[1,"{descriptor}:100:400"]"#))
        .expect("push");
    assert_eq!(
        conn.recorded.recv().await,
        Some(Recorded::Progress(FormProgress {
            descriptor,
            loaded: 100,
            total: 400,
        }))
    );
}

#[tokio::test]
async fn every_single_shot_procedure_has_its_own_frame() {
    let mut conn = connect(&Config::default());
    let node = NodeId::from_segments(vec![1]);
    let frontend = &conn.frontend;

    frontend.set_render_generation(9).await.expect("generation");
    frontend.clean_root().await.expect("clean");
    frontend.listen_event("input", false).await.expect("listen");
    frontend.focus(&node).await.expect("focus");
    frontend.change_page_url("/settings").await.expect("url");
    frontend.reload_css().await.expect("css");

    let expected = [
        "[0,9]",
        "[1]",
        r#"[2,"input",false]"#,
        r#"[5,"1"]"#,
        r#"[6,"/settings"]"#,
        "[8]",
    ];
    for frame in expected {
        assert_eq!(conn.remote.next_frame().await.as_deref(), Some(frame));
    }
    assert_eq!(conn.remote.try_next_frame(), None);
}

#[tokio::test]
async fn batches_and_requests_share_one_ordered_channel() {
    let mut conn = connect(&Config::default());
    let input = NodeId::from_segments(vec![0]);

    let mut batch = conn.frontend.start_batch();
    batch
        .create(NodeId::root(), input.clone(), HTML_NAMESPACE, "input")
        .set_attr(input.clone(), HTML_NAMESPACE, "^value", "draft");
    batch.flush().await.expect("flush");
    let pending = conn
        .frontend
        .extract_property(&input, "value")
        .await
        .expect("extract");

    let batch_frame = conn.remote.next_values().await.expect("batch frame");
    assert_eq!(
        DomMutation::decode_batch(&batch_frame).expect("decode"),
        vec![
            DomMutation::Create {
                parent: NodeId::root(),
                id: input.clone(),
                namespace: HTML_NAMESPACE.to_owned(),
                tag: "input".to_owned(),
            },
            DomMutation::set_attr(input, HTML_NAMESPACE, "^value", "draft"),
        ]
    );
    assert_eq!(
        conn.remote.next_frame().await.as_deref(),
        Some(r#"[3,"0","0","value"]"#)
    );

    conn.remote.push(r#"[2,"0:0:draft"]"#).expect("push");
    assert_eq!(pending.wait().await.expect("value").raw(), "draft");
}

#[tokio::test]
async fn failed_sends_leave_no_request_behind() {
    let (channel, source, remote) = memory::pair();
    let (tx, _recorded) = mpsc::unbounded_channel();
    let (frontend, _dispatcher) = Frontend::start(channel, source, Recorder(tx), &Config::default());
    drop(remote);

    let err = frontend
        .extract_property(&NodeId::root(), "title")
        .await
        .expect_err("channel is closed");
    assert!(matches!(err, crate::FrontendError::Channel(_)), "got {err}");
    assert_eq!(frontend.table().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn configured_timeouts_expire_unanswered_requests() {
    let config = Config::default().with_request_timeout(Some(std::time::Duration::from_secs(3)));
    let conn = connect(&config);

    let err = conn
        .frontend
        .property(&NodeId::root(), "scrollTop")
        .await
        .expect_err("nobody answers");
    assert!(
        matches!(
            err,
            crate::FrontendError::Request(crate::RequestError::Expired { .. })
        ),
        "got {err}"
    );
    assert_eq!(conn.frontend.table().outstanding(), 0);
}

#[tokio::test]
async fn requests_after_termination_are_disconnected() {
    let Connection {
        frontend,
        mut remote,
        dispatcher,
        ..
    } = connect(&Config::default());
    remote.hang_up();
    let exit = dispatcher.join().await.expect("dispatcher task");
    assert!(matches!(exit, crate::DispatcherExit::Closed), "got {exit:?}");

    let pending = frontend
        .extract_property(&NodeId::root(), "value")
        .await
        .expect("send still succeeds");
    let err = pending.wait().await.expect_err("nobody can answer");
    assert!(
        matches!(err, crate::RequestError::Disconnected { .. }),
        "got {err}"
    );
    assert_eq!(frontend.table().outstanding(), 0);
}

#[tokio::test]
async fn unrepresentable_timeouts_fall_back_to_no_deadline() {
    let config: Config =
        serde_json::from_str(r#"{"request_timeout_secs":18446744073709551615}"#).expect("config");
    let mut conn = connect(&config);

    let pending = conn
        .frontend
        .extract_property(&NodeId::root(), "value")
        .await
        .expect("extract");
    assert_eq!(pending.deadline(), None);

    conn.remote.push(r#"[2,"0:1:7"]"#).expect("push");
    assert_eq!(pending.wait().await.expect("value").raw(), "7");
}

#[tokio::test]
async fn lines_that_are_not_utf8_do_not_end_the_connection() {
    use tokio::io::AsyncWriteExt;

    let (server_io, client_io) = tokio::io::duplex(4096);
    let (server_read, server_write) = tokio::io::split(server_io);
    let (_client_read, mut client_write) = tokio::io::split(client_io);
    let (tx, mut recorded) = mpsc::unbounded_channel();
    let (_frontend, mut dispatcher) =
        Frontend::start_lines(server_read, server_write, Recorder(tx), &Config::default());

    client_write
        .write_all(b"[3,\"\xff\"]\n[3,\"/after\"]\n")
        .await
        .expect("write");

    assert_eq!(
        recorded.recv().await,
        Some(Recorded::History("/after".to_owned()))
    );
    assert_eq!(dispatcher.state(), crate::DispatcherState::Listening);

    client_write.shutdown().await.expect("shutdown");
    dispatcher.terminated().await;
}
