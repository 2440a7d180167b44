use crate::{ProtocolError, Result, MAX_TASK_BODY_SIZE};
use docflow_core::{CoreError, DocumentId, DocumentResult, ResultStatus, WorkerKind};
use serde_json::{Map, Value};

/// Decodes a task message body into a document identifier.
///
/// Accepted forms: a bare decimal (`42`), a JSON number (`42`) or a JSON
/// string holding a decimal (`"42"`, as sent by the document backend).
/// JSON numbers with an integral value in float notation (`42.0`, `1e2`)
/// are accepted too; a fractional part is rejected. Surrounding whitespace
/// is ignored.
pub fn decode_task(body: &[u8]) -> Result<DocumentId> {
    if body.len() > MAX_TASK_BODY_SIZE {
        return Err(ProtocolError::TaskTooLarge(body.len()));
    }

    let text = std::str::from_utf8(body).map_err(|_| ProtocolError::InvalidUtf8)?;
    let trimmed = text.trim();

    match trimmed.parse::<DocumentId>() {
        Ok(id) => return Ok(id),
        Err(err @ CoreError::NonPositiveId(_)) => return Err(err.into()),
        Err(_) => {}
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(inner)) => Ok(inner.parse::<DocumentId>()?),
        Ok(Value::Number(number)) => {
            if let Some(value) = number.as_u64() {
                Ok(DocumentId::new(value)?)
            } else if let Some(value) = number.as_i64() {
                Ok(DocumentId::try_from(value)?)
            } else {
                integral_id(number.as_f64(), trimmed)
            }
        }
        _ => Err(ProtocolError::MalformedTask(trimmed.to_string())),
    }
}

fn integral_id(value: Option<f64>, body: &str) -> Result<DocumentId> {
    match value {
        Some(value) if value.fract() == 0.0 && value <= 0.0 => {
            Err(CoreError::NonPositiveId(value as i128).into())
        }
        Some(value) if value.fract() == 0.0 && value < u64::MAX as f64 => {
            Ok(DocumentId::new(value as u64)?)
        }
        _ => Err(ProtocolError::MalformedTask(body.to_string())),
    }
}

/// Encodes a task body the way the document backend does: a JSON string.
pub fn encode_task(id: DocumentId) -> Vec<u8> {
    Value::String(id.to_string()).to_string().into_bytes()
}

/// Result message shape expected by a kind's downstream consumer.
///
/// The payload field name and success literal differ between kinds; each
/// shape is the stable contract for its routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultSchema {
    pub payload_field: &'static str,
    pub success_literal: &'static str,
    pub failure_literal: &'static str,
}

impl ResultSchema {
    pub const OCR: ResultSchema = ResultSchema {
        payload_field: "contentText",
        success_literal: "SUCCESS",
        failure_literal: "FAILED",
    };

    pub const SUMMARY: ResultSchema = ResultSchema {
        payload_field: "summary",
        success_literal: "COMPLETED",
        failure_literal: "FAILED",
    };

    pub fn for_kind(kind: WorkerKind) -> Self {
        match kind {
            WorkerKind::Ocr => Self::OCR,
            WorkerKind::Summary => Self::SUMMARY,
        }
    }

    pub fn status_literal(&self, status: ResultStatus) -> &'static str {
        match status {
            ResultStatus::Completed => self.success_literal,
            ResultStatus::Failed => self.failure_literal,
        }
    }

    pub fn parse_status(&self, literal: &str) -> Option<ResultStatus> {
        if literal == self.success_literal {
            Some(ResultStatus::Completed)
        } else if literal == self.failure_literal {
            Some(ResultStatus::Failed)
        } else {
            None
        }
    }
}

/// Serializes a result into its kind's JSON wire shape.
///
/// `errorDetails` is always present and empty for completed results.
pub fn encode_result(result: &DocumentResult) -> Vec<u8> {
    let schema = ResultSchema::for_kind(result.kind());

    let mut message = Map::new();
    message.insert("documentId".into(), Value::from(result.document_id().value()));
    message.insert(schema.payload_field.into(), Value::from(result.payload()));
    message.insert(
        "status".into(),
        Value::from(schema.status_literal(result.status())),
    );
    message.insert(
        "errorDetails".into(),
        Value::from(result.error_details().unwrap_or_default()),
    );

    Value::Object(message).to_string().into_bytes()
}

/// Parses a result message published for `kind`.
pub fn decode_result(kind: WorkerKind, bytes: &[u8]) -> Result<DocumentResult> {
    let schema = ResultSchema::for_kind(kind);
    let value: Value = serde_json::from_slice(bytes)?;
    let object = value
        .as_object()
        .ok_or_else(|| ProtocolError::MalformedResult("expected a JSON object".to_string()))?;

    let document_id = object
        .get("documentId")
        .and_then(Value::as_u64)
        .ok_or_else(|| ProtocolError::MalformedResult("missing documentId".to_string()))?;
    let document_id = DocumentId::new(document_id)?;

    let literal = object
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::MalformedResult("missing status".to_string()))?;
    let status = schema
        .parse_status(literal)
        .ok_or_else(|| ProtocolError::UnknownStatus {
            kind,
            literal: literal.to_string(),
        })?;

    let text_field = |name: &str| {
        object
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Ok(match status {
        ResultStatus::Completed => {
            DocumentResult::completed(document_id, kind, text_field(schema.payload_field))
        }
        ResultStatus::Failed => {
            DocumentResult::failed(document_id, kind, text_field("errorDetails"))
        }
    })
}
