//! Node sink seam.
//!
//! The sink receives one [`NodeDefinition`] per sourced type, then the
//! records of that type. Records carry a stable identity so the sink can
//! dedupe and update across runs.

use crate::compiler::CompiledDocument;
use crate::error::SinkError;
use crate::listing::IDENTITY_FIELDS;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

/// Stable identity of a remote entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NodeIdentity {
    #[serde(rename = "type")]
    pub type_name: String,
    /// `entityId`; numeric ids are kept in their decimal form.
    pub id: String,
    pub language: Option<String>,
}

impl NodeIdentity {
    /// Reads `__typename`, `entityId` and `entityLanguage.id` from a record.
    pub fn from_record(record: &Value) -> Option<Self> {
        let type_name = record.get("__typename")?.as_str()?.to_string();
        let id = match record.get("entityId")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let language = record
            .get("entityLanguage")
            .and_then(|l| l.get("id"))
            .and_then(Value::as_str)
            .map(ToString::to_string);
        Some(Self {
            type_name,
            id,
            language,
        })
    }
}

/// A fetched entity and its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub identity: NodeIdentity,
    pub data: Value,
}

/// Local node type declared for a remote type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDefinition {
    pub remote_type_name: String,
    pub node_type_name: String,
    pub identity_fields: Vec<String>,
    /// Printed compiled document.
    pub query: String,
}

impl NodeDefinition {
    pub fn new(document: &CompiledDocument, type_prefix: &str) -> Self {
        Self {
            remote_type_name: document.remote_type_name.clone(),
            node_type_name: format!("{type_prefix}{}", document.remote_type_name),
            identity_fields: IDENTITY_FIELDS.iter().map(ToString::to_string).collect(),
            query: document.query.clone(),
        }
    }
}

/// Receives sourced nodes.
#[async_trait]
pub trait NodeSink: Send + Sync {
    async fn declare(&self, definition: &NodeDefinition) -> Result<(), SinkError>;

    async fn accept(&self, definition: &NodeDefinition, record: EntityRecord) -> Result<(), SinkError>;
}

/// Collects nodes in memory, keeping the last record per identity.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemorySinkState>,
}

#[derive(Debug, Default)]
struct MemorySinkState {
    definitions: Vec<NodeDefinition>,
    records: IndexMap<NodeIdentity, EntityRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn definitions(&self) -> Vec<NodeDefinition> {
        self.state.lock().await.definitions.clone()
    }

    /// Records in first-seen order.
    pub async fn records(&self) -> Vec<EntityRecord> {
        self.state.lock().await.records.values().cloned().collect()
    }

    pub async fn records_of(&self, type_name: &str) -> Vec<EntityRecord> {
        self.state
            .lock()
            .await
            .records
            .values()
            .filter(|r| r.identity.type_name == type_name)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NodeSink for MemorySink {
    async fn declare(&self, definition: &NodeDefinition) -> Result<(), SinkError> {
        self.state.lock().await.definitions.push(definition.clone());
        Ok(())
    }

    async fn accept(&self, _definition: &NodeDefinition, record: EntityRecord) -> Result<(), SinkError> {
        self.state
            .lock()
            .await
            .records
            .insert(record.identity.clone(), record);
        Ok(())
    }
}
