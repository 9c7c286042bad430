mod common;

use common::Decoder;
use std::sync::Arc;
use tracecap::archive::Archive;
use tracecap::config::CaptureConfig;
use tracecap::domain::{ResourceId, SessionError};
use tracecap::encoding::{Encodable, Encoder, Entity, Field, FieldKind};
use tracecap::session::CaptureSession;

struct Upload {
    entity: Arc<Entity>,
    slot: u32,
    resource: Option<ResourceId>,
}

impl Encodable for Upload {
    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn encode(&self, encoder: &mut dyn Encoder) {
        encoder.write_u32(self.slot);
        encoder.write_string(self.resource.as_ref().map(ResourceId::as_str));
    }
}

fn upload_fields() -> Vec<Field> {
    vec![
        Field::new("slot", FieldKind::Uint32),
        Field::new("resource", FieldKind::String),
    ]
}

#[test]
fn test_session_writes_stream_and_resources() {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = dir.path().join("captures").join("run1");
    let payload = vec![0xABu8; 5_000];

    let mut session = CaptureSession::create(&base, &CaptureConfig::default()).expect("create");
    let entity = session.schema_mut().register("Upload", upload_fields());

    let first = session.emit_resource(&payload).expect("stored");
    let second = session.emit_resource(&payload).expect("stored again");
    assert_eq!(first, second);
    assert_eq!(session.archive().len(), 1);

    for slot in 0..3 {
        let upload = Upload {
            entity: Arc::clone(&entity),
            slot,
            resource: session.store_resource(format!("shader {slot}").as_bytes()),
        };
        session.encoder().write_object(Some(&upload));
    }
    assert_eq!(session.archive().len(), 4);

    let stream_path = session.stream_path().to_path_buf();
    let summary = session.finish().expect("finish");
    assert_eq!(summary.stream_path, stream_path);
    assert_eq!(summary.objects, 3);
    assert_eq!(summary.resources, 4);

    let stream = std::fs::read(&stream_path).expect("read stream");
    assert_eq!(stream.len() as u64, summary.stream_bytes);

    let mut decoder = Decoder::new(&stream);
    assert_eq!(decoder.string(), first.as_str());
    assert_eq!(decoder.string(), first.as_str());
    for slot in 0..3u64 {
        let (id, entity) = decoder.object().expect("upload object");
        assert_eq!(id, slot + 1);
        assert_eq!(entity.name, "Upload");
        assert_eq!(decoder.uvarint(), slot);
        let resource = decoder.string();
        assert_eq!(resource, ResourceId::from_content(format!("shader {slot}").as_bytes()).as_str());
    }
    assert!(decoder.is_done());

    let archive = Archive::open(dir.path().join("captures").join("run1.resources")).expect("reopen");
    assert_eq!(archive.read_vec(first.as_str()), Some(payload));
}

#[test]
fn test_flush_makes_stream_visible_before_finish() {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = dir.path().join("live");
    let mut session = CaptureSession::create(&base, &CaptureConfig::default()).expect("create");

    session.encoder().write_string(Some("marker"));
    session.flush();
    let stream = std::fs::read(session.stream_path()).expect("read stream");
    assert_eq!(stream, b"\x06marker");

    session.finish().expect("finish");
}

#[test]
fn test_small_ring_still_delivers_everything() {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = dir.path().join("tiny");
    let config = CaptureConfig::from_json(r#"{ "ring_capacity": 3, "archive": { "backing": "plain" } }"#)
        .expect("config");
    let mut session = CaptureSession::create(&base, &config).expect("create");

    for i in 0..1_000u64 {
        session.encoder().write_u64(i * 1_000);
    }
    let summary = session.finish().expect("finish");

    let stream = std::fs::read(&summary.stream_path).expect("read stream");
    let mut decoder = Decoder::new(&stream);
    for i in 0..1_000u64 {
        assert_eq!(decoder.uvarint(), i * 1_000);
    }
    assert!(decoder.is_done());
}

#[test]
fn test_zero_ring_capacity_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = CaptureConfig {
        ring_capacity: 0,
        ..CaptureConfig::default()
    };
    let result = CaptureSession::create(dir.path().join("bad"), &config);
    assert!(matches!(result, Err(SessionError::Config(_))));
    assert!(!dir.path().join("bad.trace").exists());
}
