use docflow_core::WorkerKind;

/// Topic exchange shared by task producers and result consumers.
pub const EXCHANGE_NAME: &str = "document-exchange";

/// Queue and routing names a worker kind consumes from and publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueTopology {
    pub exchange: &'static str,
    pub task_queue: &'static str,
    pub task_routing_key: &'static str,
    pub result_queue: &'static str,
    pub result_routing_key: &'static str,
}

impl QueueTopology {
    pub const OCR: QueueTopology = QueueTopology {
        exchange: EXCHANGE_NAME,
        task_queue: "ocr-queue",
        task_routing_key: "document.ocr",
        result_queue: "ocr-result-queue",
        result_routing_key: "document.ocr.result",
    };

    pub const SUMMARY: QueueTopology = QueueTopology {
        exchange: EXCHANGE_NAME,
        task_queue: "genai-queue",
        task_routing_key: "document.genai",
        result_queue: "genai-result-queue",
        result_routing_key: "document.genai.result",
    };

    pub fn for_kind(kind: WorkerKind) -> Self {
        match kind {
            WorkerKind::Ocr => Self::OCR,
            WorkerKind::Summary => Self::SUMMARY,
        }
    }
}
