//! JSON lines node output.

use async_trait::async_trait;
use gqlsrc_source::{EntityRecord, NodeDefinition, NodeSink, SinkError};
use serde_json::json;
use std::io::{self, Write};
use tokio::sync::Mutex;
use tracing::debug;

/// Writes one `{"type", "id", "language", "data"}` object per line.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub async fn flush(&self) -> io::Result<()> {
        self.writer.lock().await.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: Write + Send> NodeSink for JsonLinesSink<W> {
    async fn declare(&self, definition: &NodeDefinition) -> Result<(), SinkError> {
        debug!(
            node_type = %definition.node_type_name,
            remote_type = %definition.remote_type_name,
            "declared node type"
        );
        Ok(())
    }

    async fn accept(&self, definition: &NodeDefinition, record: EntityRecord) -> Result<(), SinkError> {
        let line = json!({
            "type": definition.node_type_name,
            "id": record.identity.id,
            "language": record.identity.language,
            "data": record.data,
        });
        let mut writer = self.writer.lock().await;
        serde_json::to_writer(&mut *writer, &line).map_err(|e| SinkError(e.to_string()))?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gqlsrc_source::NodeIdentity;
    use serde_json::Value;

    #[tokio::test]
    async fn test_writes_one_line_per_record() {
        let sink = JsonLinesSink::new(Vec::new());
        let definition = NodeDefinition {
            remote_type_name: "User".into(),
            node_type_name: "DrupalUser".into(),
            identity_fields: Vec::new(),
            query: String::new(),
        };
        sink.declare(&definition).await.unwrap();

        for id in [1, 2] {
            let data = json!({"__typename": "User", "entityId": id, "name": format!("u{id}")});
            let record = EntityRecord {
                identity: NodeIdentity::from_record(&data).unwrap(),
                data,
            };
            sink.accept(&definition, record).await.unwrap();
        }

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["type"], "DrupalUser");
        assert_eq!(lines[1]["id"], "2");
        assert_eq!(lines[1]["language"], Value::Null);
        assert_eq!(lines[1]["data"]["name"], "u2");
    }
}
