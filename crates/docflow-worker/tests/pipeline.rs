//! End-to-end tests of the per-delivery state machine with in-memory
//! collaborators.

use async_trait::async_trait;
use docflow_client::{ObjectStore, StorageError};
use docflow_core::{DocumentContent, DocumentId, DocumentMetadata, DocumentResult, WorkerKind};
use docflow_protocol::encode_result;
use docflow_worker::config::PipelineSettings;
use docflow_worker::error::BrokerError;
use docflow_worker::ocr::OcrError;
use docflow_worker::{
    AckPolicy, BinaryContentSource, ContentSource, Delivery, FetchError, MetadataSource,
    OcrBackend, OcrTransformer, Outcome, PageImage, PageRasterizer, Pipeline, PublishError,
    ResultPublisher, TextContentSource, TransformError, Transformer,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Ack(u64),
    Reject { tag: u64, requeue: bool },
    Publish(Value),
}

type EventLog = Arc<Mutex<Vec<Event>>>;

struct FakeDelivery {
    body: Vec<u8>,
    tag: u64,
    events: EventLog,
}

#[async_trait]
impl Delivery for FakeDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    fn delivery_tag(&self) -> u64 {
        self.tag
    }

    async fn ack(&self) -> Result<(), BrokerError> {
        self.events.lock().push(Event::Ack(self.tag));
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), BrokerError> {
        self.events.lock().push(Event::Reject {
            tag: self.tag,
            requeue,
        });
        Ok(())
    }
}

#[derive(Default)]
struct FakeMetadata(HashMap<u64, DocumentMetadata>);

impl FakeMetadata {
    fn with_storage_path(mut self, id: u64, path: &str) -> Self {
        self.0.insert(
            id,
            DocumentMetadata {
                id: Some(id),
                storage_path: Some(path.to_string()),
                ..Default::default()
            },
        );
        self
    }

    fn with_content(mut self, id: u64, content: &str) -> Self {
        self.0.insert(
            id,
            DocumentMetadata {
                id: Some(id),
                content: Some(content.to_string()),
                ..Default::default()
            },
        );
        self
    }
}

#[async_trait]
impl MetadataSource for FakeMetadata {
    async fn fetch_metadata(&self, id: DocumentId) -> Option<DocumentMetadata> {
        self.0.get(&id.value()).cloned()
    }
}

#[derive(Default)]
struct MemoryStore(HashMap<String, Vec<u8>>);

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.0
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

struct SinglePage;

#[async_trait]
impl PageRasterizer for SinglePage {
    async fn rasterize(&self, document: &[u8]) -> Result<Vec<PageImage>, OcrError> {
        Ok(vec![PageImage {
            page_number: 1,
            png: document.to_vec(),
        }])
    }
}

/// Reads `fake-pdf` as "Hello World"; anything else fails.
struct FakeOcr;

#[async_trait]
impl OcrBackend for FakeOcr {
    async fn recognize(&self, page: &PageImage) -> Result<String, OcrError> {
        if page.png == b"fake-pdf" {
            Ok("Hello World".to_string())
        } else {
            Err(OcrError::NoPages)
        }
    }
}

/// Summarizes by upper-casing the text.
struct Shout;

#[async_trait]
impl Transformer for Shout {
    async fn transform(&self, content: &DocumentContent) -> Result<String, TransformError> {
        match content {
            DocumentContent::Text(text) => Ok(text.to_uppercase()),
            other => Err(TransformError::UnsupportedContent {
                expected: "text",
                actual: other.variant_name(),
            }),
        }
    }
}

struct Failing(&'static str);

#[async_trait]
impl Transformer for Failing {
    async fn transform(&self, _content: &DocumentContent) -> Result<String, TransformError> {
        Err(TransformError::Engine(self.0.to_string()))
    }
}

struct Panicking;

#[async_trait]
impl Transformer for Panicking {
    async fn transform(&self, _content: &DocumentContent) -> Result<String, TransformError> {
        panic!("engine crashed")
    }
}

struct Hanging;

#[async_trait]
impl Transformer for Hanging {
    async fn transform(&self, _content: &DocumentContent) -> Result<String, TransformError> {
        tokio::time::sleep(Duration::from_secs(300)).await;
        Ok("too late".to_string())
    }
}

/// Never answers within any stage limit.
struct HangingSource;

#[async_trait]
impl ContentSource for HangingSource {
    async fn fetch(&self, _id: DocumentId) -> Result<DocumentContent, FetchError> {
        tokio::time::sleep(Duration::from_secs(300)).await;
        Ok(DocumentContent::Text("too late".to_string()))
    }
}

struct PanickingSource;

#[async_trait]
impl ContentSource for PanickingSource {
    async fn fetch(&self, _id: DocumentId) -> Result<DocumentContent, FetchError> {
        panic!("metadata client crashed")
    }
}

#[derive(Clone, Copy)]
enum PublishMode {
    Accept,
    Nack,
    Panic,
    Hang,
}

struct RecordingPublisher {
    mode: PublishMode,
    events: EventLog,
}

#[async_trait]
impl ResultPublisher for RecordingPublisher {
    async fn publish(&self, result: &DocumentResult) -> Result<(), PublishError> {
        match self.mode {
            PublishMode::Accept => {
                let body: Value = serde_json::from_slice(&encode_result(result)).unwrap();
                self.events.lock().push(Event::Publish(body));
                Ok(())
            }
            PublishMode::Nack => Err(PublishError::Nacked),
            PublishMode::Panic => panic!("channel poisoned"),
            PublishMode::Hang => {
                tokio::time::sleep(Duration::from_secs(300)).await;
                Ok(())
            }
        }
    }
}

struct Harness {
    pipeline: Pipeline,
    events: EventLog,
}

impl Harness {
    fn new(
        kind: WorkerKind,
        source: Arc<dyn ContentSource>,
        transformer: Arc<dyn Transformer>,
        mode: PublishMode,
        settings: PipelineSettings,
    ) -> Self {
        let events: EventLog = Arc::default();
        let publisher = Arc::new(RecordingPublisher {
            mode,
            events: events.clone(),
        });
        Harness {
            pipeline: Pipeline::new(kind, source, transformer, publisher, settings),
            events,
        }
    }

    async fn deliver(&self, body: &[u8], tag: u64) -> Outcome {
        let delivery = FakeDelivery {
            body: body.to_vec(),
            tag,
            events: self.events.clone(),
        };
        self.pipeline.handle(&delivery).await
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    fn published(&self) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Publish(body) => Some(body),
                _ => None,
            })
            .collect()
    }

    fn acks(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Ack(tag) => Some(tag),
                _ => None,
            })
            .collect()
    }
}

fn settings(ack_policy: AckPolicy) -> PipelineSettings {
    PipelineSettings {
        ack_policy,
        ..PipelineSettings::default()
    }
}

fn ocr_source() -> Arc<dyn ContentSource> {
    let metadata = FakeMetadata::default()
        .with_storage_path(1, "uuid-1")
        .with_storage_path(3, "uuid-missing")
        .with_storage_path(4, "uuid-4");
    let store = MemoryStore(HashMap::from([
        ("uuid-1".to_string(), b"fake-pdf".to_vec()),
        ("uuid-4".to_string(), b"other".to_vec()),
    ]));
    Arc::new(BinaryContentSource::new(Arc::new(metadata), Arc::new(store)))
}

fn ocr_harness(transformer: Arc<dyn Transformer>, mode: PublishMode, policy: AckPolicy) -> Harness {
    Harness::new(WorkerKind::Ocr, ocr_source(), transformer, mode, settings(policy))
}

fn ocr_engine() -> Arc<dyn Transformer> {
    Arc::new(OcrTransformer::new(Arc::new(SinglePage), Arc::new(FakeOcr)))
}

fn summary_harness(
    transformer: Arc<dyn Transformer>,
    mode: PublishMode,
    policy: AckPolicy,
) -> Harness {
    let metadata = FakeMetadata::default()
        .with_content(42, "quarterly report")
        .with_content(5, "");
    Harness::new(
        WorkerKind::Summary,
        Arc::new(TextContentSource::new(Arc::new(metadata))),
        transformer,
        mode,
        settings(policy),
    )
}

#[tokio::test]
async fn test_ocr_document_processed_and_acked() {
    let harness = ocr_harness(ocr_engine(), PublishMode::Accept, AckPolicy::AfterProcessing);

    let outcome = harness.deliver(b"1", 11).await;

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(
        harness.events(),
        vec![
            Event::Publish(json!({
                "documentId": 1,
                "contentText": "Hello World",
                "status": "SUCCESS",
                "errorDetails": ""
            })),
            Event::Ack(11),
        ]
    );
}

#[tokio::test]
async fn test_missing_metadata_publishes_failure() {
    let harness = ocr_harness(ocr_engine(), PublishMode::Accept, AckPolicy::AfterProcessing);

    let outcome = harness.deliver(b"2", 12).await;

    assert_eq!(outcome, Outcome::Failed);
    assert_eq!(
        harness.published(),
        vec![json!({
            "documentId": 2,
            "contentText": "",
            "status": "FAILED",
            "errorDetails": "Could not fetch valid metadata or storagePath for doc ID 2."
        })]
    );
    assert_eq!(harness.acks(), vec![12]);
}

#[tokio::test]
async fn test_download_failure_publishes_failure() {
    let harness = ocr_harness(ocr_engine(), PublishMode::Accept, AckPolicy::AfterProcessing);

    assert_eq!(harness.deliver(b"3", 13).await, Outcome::Failed);

    let published = harness.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0]["contentText"], "");
    assert_eq!(
        published[0]["errorDetails"],
        "Could not download file uuid-missing from MinIO."
    );
    assert_eq!(harness.acks(), vec![13]);
}

#[tokio::test]
async fn test_unreadable_page_degrades_output() {
    let harness = ocr_harness(ocr_engine(), PublishMode::Accept, AckPolicy::AfterProcessing);

    assert_eq!(harness.deliver(b"4", 14).await, Outcome::Completed);
    assert_eq!(
        harness.published()[0]["contentText"],
        docflow_core::OCR_PAGE_FAILED_MARKER
    );
}

#[tokio::test]
async fn test_engine_error_reported_verbatim() {
    let harness = ocr_harness(
        Arc::new(Failing("tesseract: image too small to scale")),
        PublishMode::Accept,
        AckPolicy::AfterProcessing,
    );

    assert_eq!(harness.deliver(b"1", 15).await, Outcome::Failed);

    let published = harness.published();
    assert_eq!(published[0]["status"], "FAILED");
    assert_eq!(published[0]["errorDetails"], "tesseract: image too small to scale");
    assert_eq!(harness.acks(), vec![15]);
}

#[tokio::test]
async fn test_malformed_bodies_discarded_and_acked() {
    let bodies: [&[u8]; 7] = [b"abc", b"", b"0", b"-5", b"1.5", b"{\"id\":1}", &[0xff, 0xfe]];

    for (tag, body) in bodies.iter().enumerate() {
        let harness = ocr_harness(ocr_engine(), PublishMode::Accept, AckPolicy::AfterProcessing);

        assert_eq!(harness.deliver(body, tag as u64).await, Outcome::Discarded);
        assert_eq!(harness.events(), vec![Event::Ack(tag as u64)], "body {:?}", body);
    }
}

#[tokio::test]
async fn test_summary_accepts_json_string_id() {
    let harness = summary_harness(Arc::new(Shout), PublishMode::Accept, AckPolicy::AfterProcessing);

    assert_eq!(harness.deliver(b"\"42\"", 21).await, Outcome::Completed);
    assert_eq!(
        harness.published(),
        vec![json!({
            "documentId": 42,
            "summary": "QUARTERLY REPORT",
            "status": "COMPLETED",
            "errorDetails": ""
        })]
    );
    assert_eq!(harness.acks(), vec![21]);
}

#[tokio::test]
async fn test_summary_empty_content_is_fetch_failure() {
    let harness = summary_harness(
        Arc::new(Failing("should not run")),
        PublishMode::Accept,
        AckPolicy::AfterProcessing,
    );

    for (tag, body) in [(22, &b"5"[..]), (23, &b"6"[..])] {
        assert_eq!(harness.deliver(body, tag).await, Outcome::Failed);
    }

    let published = harness.published();
    assert_eq!(published[0]["errorDetails"], "Could not fetch valid content for doc ID 5.");
    assert_eq!(published[1]["errorDetails"], "Could not fetch valid content for doc ID 6.");
    assert_eq!(published[0]["summary"], "");
    assert_eq!(harness.acks(), vec![22, 23]);
}

#[tokio::test]
async fn test_transform_panic_still_reports_and_acks() {
    let harness = summary_harness(
        Arc::new(Panicking),
        PublishMode::Accept,
        AckPolicy::AfterProcessing,
    );

    assert_eq!(harness.deliver(b"42", 31).await, Outcome::Failed);

    let published = harness.published();
    assert_eq!(published.len(), 1);
    let details = published[0]["errorDetails"].as_str().unwrap();
    assert!(details.contains("task panicked during processing"), "{details}");
    assert!(details.contains("engine crashed"), "{details}");
    assert_eq!(harness.acks(), vec![31]);
}

#[tokio::test]
async fn test_transform_timeout_reports_failure() {
    let harness = Harness::new(
        WorkerKind::Summary,
        Arc::new(TextContentSource::new(Arc::new(
            FakeMetadata::default().with_content(42, "text"),
        ))),
        Arc::new(Hanging),
        PublishMode::Accept,
        PipelineSettings {
            transform_timeout_secs: 1,
            ..PipelineSettings::default()
        },
    );

    assert_eq!(harness.deliver(b"42", 32).await, Outcome::Failed);
    assert_eq!(
        harness.published()[0]["errorDetails"],
        "Transformation timed out after 1s"
    );
    assert_eq!(harness.acks(), vec![32]);
}

#[tokio::test]
async fn test_publish_failure_still_acked_by_default() {
    let harness = summary_harness(Arc::new(Shout), PublishMode::Nack, AckPolicy::AfterProcessing);

    assert_eq!(harness.deliver(b"42", 41).await, Outcome::PublishFailed);
    assert_eq!(harness.events(), vec![Event::Ack(41)]);
}

#[tokio::test]
async fn test_publish_panic_still_acked() {
    let harness = summary_harness(Arc::new(Shout), PublishMode::Panic, AckPolicy::AfterProcessing);

    assert_eq!(harness.deliver(b"42", 42).await, Outcome::PublishFailed);
    assert_eq!(harness.events(), vec![Event::Ack(42)]);
}

#[tokio::test]
async fn test_confirmed_publish_policy_requeues_on_publish_failure() {
    let harness = summary_harness(
        Arc::new(Shout),
        PublishMode::Nack,
        AckPolicy::AfterConfirmedPublish,
    );

    assert_eq!(harness.deliver(b"42", 51).await, Outcome::PublishFailed);
    assert_eq!(
        harness.events(),
        vec![Event::Reject {
            tag: 51,
            requeue: true
        }]
    );
}

#[tokio::test]
async fn test_confirmed_publish_policy_acks_published_results() {
    let harness = summary_harness(
        Arc::new(Failing("quota exceeded")),
        PublishMode::Accept,
        AckPolicy::AfterConfirmedPublish,
    );

    assert_eq!(harness.deliver(b"42", 52).await, Outcome::Failed);
    assert_eq!(harness.deliver(b"not-a-number", 53).await, Outcome::Discarded);
    assert_eq!(harness.acks(), vec![52, 53]);
}

#[tokio::test]
async fn test_on_receive_policy_acks_before_processing() {
    let harness = summary_harness(Arc::new(Panicking), PublishMode::Nack, AckPolicy::OnReceive);

    assert_eq!(harness.deliver(b"42", 61).await, Outcome::PublishFailed);
    assert_eq!(harness.deliver(b"garbage", 62).await, Outcome::Discarded);
    assert_eq!(harness.events(), vec![Event::Ack(61), Event::Ack(62)]);
}

#[tokio::test]
async fn test_on_receive_ack_precedes_publish() {
    let harness = ocr_harness(ocr_engine(), PublishMode::Accept, AckPolicy::OnReceive);

    assert_eq!(harness.deliver(b"1", 63).await, Outcome::Completed);

    let events = harness.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], Event::Ack(63));
    assert!(matches!(events[1], Event::Publish(_)));
}

#[tokio::test]
async fn test_fetch_timeout_reports_failure() {
    let harness = Harness::new(
        WorkerKind::Summary,
        Arc::new(HangingSource),
        Arc::new(Shout),
        PublishMode::Accept,
        PipelineSettings {
            fetch_timeout_secs: 1,
            ..PipelineSettings::default()
        },
    );

    assert_eq!(harness.deliver(b"9", 71).await, Outcome::Failed);

    let published = harness.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0]["documentId"], 9);
    assert_eq!(published[0]["summary"], "");
    assert_eq!(
        published[0]["errorDetails"],
        "Fetching content for doc ID 9 timed out after 1s."
    );
    assert_eq!(harness.acks(), vec![71]);
}

#[tokio::test]
async fn test_fetch_panic_reports_failure() {
    let harness = Harness::new(
        WorkerKind::Ocr,
        Arc::new(PanickingSource),
        ocr_engine(),
        PublishMode::Accept,
        settings(AckPolicy::AfterProcessing),
    );

    assert_eq!(harness.deliver(b"8", 72).await, Outcome::Failed);

    let published = harness.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0]["status"], "FAILED");
    let details = published[0]["errorDetails"].as_str().unwrap();
    assert!(details.contains("doc ID 8"), "{details}");
    assert!(details.contains("task panicked during processing"), "{details}");
    assert!(details.contains("metadata client crashed"), "{details}");
    assert_eq!(harness.acks(), vec![72]);
}

fn hanging_publish_harness(ack_policy: AckPolicy) -> Harness {
    let metadata = FakeMetadata::default().with_content(42, "text");
    Harness::new(
        WorkerKind::Summary,
        Arc::new(TextContentSource::new(Arc::new(metadata))),
        Arc::new(Shout),
        PublishMode::Hang,
        PipelineSettings {
            ack_policy,
            publish_timeout_secs: 1,
            ..PipelineSettings::default()
        },
    )
}

#[tokio::test]
async fn test_publish_timeout_still_acked_by_default() {
    let harness = hanging_publish_harness(AckPolicy::AfterProcessing);

    assert_eq!(harness.deliver(b"42", 73).await, Outcome::PublishFailed);
    assert_eq!(harness.events(), vec![Event::Ack(73)]);
}

#[tokio::test]
async fn test_publish_timeout_requeues_under_confirmed_publish() {
    let harness = hanging_publish_harness(AckPolicy::AfterConfirmedPublish);

    assert_eq!(harness.deliver(b"42", 74).await, Outcome::PublishFailed);
    assert_eq!(
        harness.events(),
        vec![Event::Reject {
            tag: 74,
            requeue: true
        }]
    );
}
