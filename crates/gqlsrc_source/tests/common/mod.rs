//! Shared fixtures: an introspected Drupal-like schema and a scripted
//! in-memory remote that serves listing pages.

#![allow(dead_code)]

use async_trait::async_trait;
use gqlsrc_source::schema::INTROSPECTION_OPERATION;
use gqlsrc_source::{ExecuteRequest, ExecuteResponse, ExecutorError, GraphqlError, RemoteExecutor};
use gqlsrc_syntax::{parse, Selection, Value as AstValue};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

fn named(kind: &str, name: &str) -> Value {
    json!({"kind": kind, "name": name, "ofType": null})
}

fn list_of(inner: Value) -> Value {
    json!({"kind": "LIST", "name": null, "ofType": inner})
}

fn field(name: &str, ty: Value) -> Value {
    json!({"name": name, "args": [], "type": ty})
}

fn paged_field(name: &str) -> Value {
    let arg = |n: &str| json!({"name": n, "type": named("SCALAR", "Int"), "defaultValue": null});
    json!({
        "name": name,
        "args": [arg("limit"), arg("offset"), {"name": "filter", "type": named("INPUT_OBJECT", "EntityQueryFilterInput"), "defaultValue": null}],
        "type": named("OBJECT", "EntityQueryResult"),
    })
}

fn object(name: &str, fields: Vec<Value>, interfaces: &[&str]) -> Value {
    json!({
        "kind": "OBJECT",
        "name": name,
        "fields": fields,
        "interfaces": interfaces.iter().map(|i| named("INTERFACE", i)).collect::<Vec<_>>(),
    })
}

fn entity_fields(extra: Vec<Value>) -> Vec<Value> {
    let mut fields = vec![
        field("entityId", named("SCALAR", "String")),
        field("entityLanguage", named("OBJECT", "Language")),
    ];
    fields.extend(extra);
    fields
}

/// `__schema` of the fixture API.
///
/// - `nodeQuery` lists the `Node` interface (`NodeArticle`, `NodePage`)
/// - `taxonomyTermQuery` lists `TaxonomyTerm`
/// - `userQuery` lists `User`
/// - `routeQuery` and `menu` are unrelated
pub fn schema_json() -> Value {
    let string = || named("SCALAR", "String");
    json!({
        "queryType": {"name": "Query"},
        "types": [
            object("Query", vec![
                paged_field("nodeQuery"),
                paged_field("taxonomyTermQuery"),
                paged_field("userQuery"),
                field("routeQuery", named("OBJECT", "Route")),
                field("menu", string()),
            ], &[]),
            object("EntityQueryResult", vec![
                field("count", named("SCALAR", "Int")),
                field("entities", list_of(named("INTERFACE", "Entity"))),
            ], &[]),
            {
                "kind": "INTERFACE",
                "name": "Entity",
                "fields": [field("entityId", string())],
                "possibleTypes": [
                    named("OBJECT", "NodeArticle"),
                    named("OBJECT", "NodePage"),
                    named("OBJECT", "TaxonomyTerm"),
                    named("OBJECT", "User"),
                ],
            },
            {
                "kind": "INTERFACE",
                "name": "Node",
                "fields": [field("entityId", string()), field("title", string())],
                "possibleTypes": [named("OBJECT", "NodeArticle"), named("OBJECT", "NodePage")],
            },
            object("NodeArticle", entity_fields(vec![
                field("title", string()),
                field("body", named("OBJECT", "TextFormatted")),
                field("fieldTags", list_of(named("OBJECT", "TaxonomyTerm"))),
                field("uid", named("OBJECT", "User")),
            ]), &["Entity", "Node"]),
            object("NodePage", entity_fields(vec![field("title", string())]), &["Entity", "Node"]),
            object("TaxonomyTerm", entity_fields(vec![field("name", string())]), &["Entity"]),
            object("User", entity_fields(vec![field("name", string())]), &["Entity"]),
            object("Language", vec![field("id", string())], &[]),
            object("TextFormatted", vec![field("value", string()), field("processed", string())], &[]),
            object("Route", vec![field("path", string())], &[]),
            {"kind": "INPUT_OBJECT", "name": "EntityQueryFilterInput", "inputFields": [
                {"name": "conditions", "type": list_of(named("SCALAR", "String")), "defaultValue": null}
            ]},
            {"kind": "SCALAR", "name": "String"},
            {"kind": "SCALAR", "name": "Int"},
        ]
    })
}

/// An entity payload as the remote returns it.
pub fn entity(type_name: &str, id: u64, language: &str) -> Value {
    json!({
        "__typename": type_name,
        "entityId": id.to_string(),
        "entityLanguage": {"id": language.to_lowercase()},
        "title": format!("{type_name} {id}"),
    })
}

pub fn entities(type_name: &str, ids: std::ops::Range<u64>, language: &str) -> Vec<Value> {
    ids.map(|id| entity(type_name, id, language)).collect()
}

type Handler = dyn Fn(&ExecuteRequest) -> Result<ExecuteResponse, ExecutorError> + Send + Sync;

/// A remote executor answering from a closure and recording every request.
pub struct MockExecutor {
    handler: Box<Handler>,
    calls: Mutex<Vec<ExecuteRequest>>,
}

impl MockExecutor {
    pub fn new(
        handler: impl Fn(&ExecuteRequest) -> Result<ExecuteResponse, ExecutorError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ExecuteRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn operation_names(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.operation_name).collect()
    }

    /// `offset` variables sent for one operation, in order.
    pub fn offsets(&self, operation: &str) -> Vec<u64> {
        self.calls()
            .iter()
            .filter(|c| c.operation_name == operation)
            .filter_map(|c| c.variables.get("offset").and_then(Value::as_u64))
            .collect()
    }
}

#[async_trait]
impl RemoteExecutor for MockExecutor {
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteResponse, ExecutorError> {
        self.calls.lock().unwrap().push(request.clone());
        tokio::task::yield_now().await;
        (self.handler)(&request)
    }
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Graphql,
    Transport,
}

/// Entities served per (query field, language), with optional failures.
#[derive(Debug, Clone, Default)]
pub struct FakeDrupal {
    listings: HashMap<(String, String), Vec<Value>>,
    failures: HashMap<(String, String), (u64, Failure)>,
}

impl FakeDrupal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, field: &str, language: &str, entities: Vec<Value>) -> Self {
        self.listings
            .insert((field.to_string(), language.to_string()), entities);
        self
    }

    /// Answers with a GraphQL error once `offset` reaches `at`.
    pub fn fail_at(mut self, field: &str, language: &str, at: u64) -> Self {
        self.failures
            .insert((field.to_string(), language.to_string()), (at, Failure::Graphql));
        self
    }

    /// Answers with HTTP 502 once `offset` reaches `at`.
    pub fn fail_transport_at(mut self, field: &str, language: &str, at: u64) -> Self {
        self.failures
            .insert((field.to_string(), language.to_string()), (at, Failure::Transport));
        self
    }

    pub fn executor(self) -> Arc<MockExecutor> {
        Arc::new(MockExecutor::new(move |request| self.respond(request)))
    }

    fn respond(&self, request: &ExecuteRequest) -> Result<ExecuteResponse, ExecutorError> {
        if request.operation_name == INTROSPECTION_OPERATION {
            return Ok(ExecuteResponse::data(json!({ "__schema": schema_json() })));
        }

        let target = listing_target(request)?;
        let limit = request.variables.get("limit").and_then(Value::as_u64).unwrap_or(100);
        let offset = request.variables.get("offset").and_then(Value::as_u64).unwrap_or(0);
        let key = (target.field.clone(), target.language.clone());

        match self.failures.get(&key) {
            Some(&(at, Failure::Graphql)) if offset >= at => {
                return Ok(ExecuteResponse::errors(vec![GraphqlError::new(
                    "Internal server error",
                )]));
            }
            Some(&(at, Failure::Transport)) if offset >= at => {
                return Err(ExecutorError::HttpStatus {
                    status: 502,
                    body: "Bad Gateway".into(),
                });
            }
            _ => {}
        }

        let page: Vec<Value> = self
            .listings
            .get(&key)
            .map(|all| {
                all.iter()
                    .skip(usize::try_from(offset).unwrap())
                    .take(usize::try_from(limit).unwrap())
                    .map(|entity| target.select(entity))
                    .collect()
            })
            .unwrap_or_default();
        let field = &target.field;
        Ok(ExecuteResponse::data(json!({ field: { "entities": page } })))
    }
}

/// What one listing request asks for.
struct ListingTarget {
    field: String,
    language: String,
    /// Type conditions of the fragments spread on `entities`.
    types: Vec<String>,
}

impl ListingTarget {
    /// An entity matching none of the type conditions selects nothing,
    /// so the remote answers with an empty object for it.
    fn select(&self, entity: &Value) -> Value {
        let type_name = entity.get("__typename").and_then(Value::as_str);
        if self.types.is_empty() || type_name.is_some_and(|t| self.types.iter().any(|c| c == t)) {
            entity.clone()
        } else {
            json!({})
        }
    }
}

/// Reads the root field, `entities(language:)` and the spread type
/// conditions of the requested operation back out of the query text.
fn listing_target(request: &ExecuteRequest) -> Result<ListingTarget, ExecutorError> {
    let protocol = |msg: &str| ExecutorError::Protocol(msg.to_string());
    let document = parse(&request.query)
        .into_result()
        .map_err(|_| protocol("query does not parse"))?;
    let operation = document
        .operation(&request.operation_name)
        .ok_or_else(|| protocol("unknown operation"))?;
    let Some(Selection::Field(root)) = operation.selection_set.selections.first() else {
        return Err(protocol("operation has no root field"));
    };
    let entities = root.selection_set.as_ref().and_then(|set| {
        set.selections.iter().find_map(|s| match s {
            Selection::Field(f) if f.name.value == "entities" => Some(f),
            _ => None,
        })
    });
    let language = entities
        .and_then(|f| f.argument("language"))
        .and_then(|arg| match &arg.value {
            AstValue::Enum(name) => Some(name.value.clone()),
            _ => None,
        })
        .ok_or_else(|| protocol("entities has no language"))?;
    let types = entities
        .and_then(|f| f.selection_set.as_ref())
        .map(|set| {
            set.selections
                .iter()
                .filter_map(|s| match s {
                    Selection::FragmentSpread(spread) => document.fragment(&spread.name.value),
                    _ => None,
                })
                .map(|fragment| fragment.type_condition.value.clone())
                .collect()
        })
        .unwrap_or_default();
    Ok(ListingTarget {
        field: root.name.value.clone(),
        language,
        types,
    })
}

/// Counts `WARN` events while installed as the thread's default subscriber.
#[derive(Debug, Clone, Default)]
pub struct WarningCounter(Arc<AtomicUsize>);

impl WarningCounter {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: tracing::Subscriber> Layer<S> for WarningCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}
