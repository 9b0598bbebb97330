//! Unit tests for the command encoder and DOM batches.

use std::time::Duration;

use rstest::{fixture, rstest};
use serde_json::{Value, json};

use super::*;
use crate::channel::line::LineChannel;
use crate::channel::memory::{self, MemoryChannel, MemorySource, RemoteEnd};
use crate::codec::HTML_NAMESPACE;

struct Harness {
    encoder: CommandEncoder<MemoryChannel>,
    remote: RemoteEnd,
    _source: MemorySource,
}

#[fixture]
fn harness() -> Harness {
    let (channel, source, remote) = memory::pair();
    Harness {
        encoder: CommandEncoder::new(channel),
        remote,
        _source: source,
    }
}

fn id(segments: &[u32]) -> NodeId {
    NodeId::from_segments(segments.to_vec())
}

#[rstest]
#[case::no_args(Procedure::ReloadCss, vec![], "[8]")]
#[case::generation(Procedure::SetRenderGeneration, vec![json!(3)], "[0,3]")]
#[case::listen(Procedure::ListenEvent, vec![json!("click"), json!(true)], r#"[2,"click",true]"#)]
#[case::focus(Procedure::Focus, vec![json!("0_1")], r#"[5,"0_1"]"#)]
#[tokio::test]
async fn send_prefixes_the_procedure_code(
    harness: Harness,
    #[case] procedure: Procedure,
    #[case] args: Vec<Value>,
    #[case] expected: &str,
) {
    let mut h = harness;
    h.encoder.send(procedure, args).await.expect("send");
    assert_eq!(h.remote.next_frame().await.as_deref(), Some(expected));
    assert_eq!(h.remote.try_next_frame(), None);
}

#[rstest]
#[tokio::test]
async fn batch_is_one_message_in_append_order(harness: Harness) {
    let mut h = harness;
    let mut batch = h.encoder.start_batch();
    batch
        .create(NodeId::root(), id(&[0]), HTML_NAMESPACE, "ul")
        .create(id(&[0]), id(&[0, 0]), HTML_NAMESPACE, "li")
        .create_text(id(&[0, 0]), id(&[0, 0, 0]), "first")
        .set_attr(id(&[0]), HTML_NAMESPACE, "class", "list")
        .set_attr(id(&[0]), HTML_NAMESPACE, "*color", "red")
        .remove_attr(id(&[0]), HTML_NAMESPACE, "^hidden")
        .remove(id(&[0]), id(&[0, 1]));
    assert_eq!(batch.len(), 7);

    assert!(batch.flush().await.expect("flush"));

    let frame = h.remote.next_values().await.expect("one frame");
    assert_eq!(h.remote.try_next_frame(), None, "batch must be one message");
    let decoded = DomMutation::decode_batch(&frame).expect("decode");
    let codes: Vec<u8> = decoded.iter().map(|m| m.code().code()).collect();
    assert_eq!(codes, vec![0, 0, 1, 3, 5, 4, 2]);
    assert_eq!(
        decoded.last(),
        Some(&DomMutation::Remove {
            parent: id(&[0]),
            id: id(&[0, 1]),
        })
    );
}

#[rstest]
#[tokio::test]
async fn empty_flush_sends_nothing(harness: Harness) {
    let mut h = harness;
    let mut batch = h.encoder.start_batch();
    assert!(batch.is_empty());

    assert!(!batch.flush().await.expect("flush"));
    assert_eq!(h.remote.try_next_frame(), None);
}

#[rstest]
#[tokio::test]
async fn flush_clears_the_buffer_for_reuse(harness: Harness) {
    let mut h = harness;
    let mut batch = h.encoder.start_batch();
    batch.remove(NodeId::root(), id(&[3]));
    assert!(batch.flush().await.expect("first flush"));
    assert!(batch.is_empty());

    batch.create_text(NodeId::root(), id(&[3]), "again");
    assert!(batch.flush().await.expect("second flush"));

    assert_eq!(h.remote.next_frame().await.as_deref(), Some(r#"[4,2,"","3"]"#));
    assert_eq!(
        h.remote.next_frame().await.as_deref(),
        Some(r#"[4,1,"","3","again"]"#)
    );
    assert!(!batch.flush().await.expect("third flush"));
}

#[rstest]
#[tokio::test]
async fn single_shot_commands_never_land_inside_a_batch(harness: Harness) {
    let mut h = harness;
    let mut batch = h.encoder.start_batch();
    batch.create(NodeId::root(), id(&[0]), HTML_NAMESPACE, "p");
    h.encoder
        .send(Procedure::Focus, vec![json!("0")])
        .await
        .expect("send");
    batch.create_text(id(&[0]), id(&[0, 0]), "text");
    batch.flush().await.expect("flush");

    assert_eq!(h.remote.next_frame().await.as_deref(), Some(r#"[5,"0"]"#));
    assert_eq!(
        h.remote.next_frame().await.as_deref(),
        Some(r#"[4,0,"","0",0,"p",1,"0","0_0","text"]"#)
    );
}

#[tokio::test]
async fn flush_reports_a_closed_channel_and_still_clears() {
    let (channel, _source, remote) = memory::pair();
    drop(remote);
    let encoder = CommandEncoder::new(channel);
    let mut batch = encoder.start_batch();
    batch.remove(NodeId::root(), id(&[0]));

    let err = batch.flush().await.expect_err("channel is closed");
    assert!(matches!(err, ChannelError::Closed), "got {err}");
    assert!(batch.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelled_flush_keeps_the_batch() {
    let (writer, _unread) = tokio::io::duplex(8);
    let encoder = CommandEncoder::new(LineChannel::new(writer));
    let mut batch = encoder.start_batch();
    for child in 0..4 {
        batch.create_text(NodeId::root(), id(&[child]), "stalled");
    }

    let outcome = tokio::time::timeout(Duration::from_secs(1), batch.flush()).await;
    assert!(outcome.is_err(), "flush should stall on a full pipe");
    assert_eq!(batch.len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_senders_deliver_whole_messages() {
    let (channel, _source, mut remote) = memory::pair();
    let encoder = CommandEncoder::new(channel);

    let tasks: Vec<_> = (0..16_u32)
        .map(|n| {
            let sender = encoder.clone();
            tokio::spawn(async move {
                let mut batch = sender.start_batch();
                for child in 0..8 {
                    batch.create_text(NodeId::root(), NodeId::from_segments(vec![n, child]), "x");
                }
                batch.flush().await
            })
        })
        .collect();
    for task in tasks {
        assert!(task.await.expect("join").expect("flush"));
    }

    for _ in 0..16 {
        let frame = remote.next_values().await.expect("frame");
        let decoded = DomMutation::decode_batch(&frame).expect("decode");
        assert_eq!(decoded.len(), 8);
    }
    assert_eq!(remote.try_next_frame(), None);
}
