// Entity creation operation
// Normalizes a batch of tag mappings and submits them for creation

use std::sync::Arc;

use serde_json::Value;

use crate::error::{AsyncError, ClientError, OpResult, Result};
use crate::models::{local_name, Ref};
use crate::ops::{CompletionSlot, Operation, OperationHandle};
use crate::transport::SessionTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CreateState {
    Init,
    Create,
    Done,
}

#[derive(Debug)]
pub(crate) enum CreateEvent {
    SendCreate,
    ReadDone(Value),
    Exception(AsyncError),
}

#[derive(Debug)]
pub(crate) enum CreateEffect {
    /// Preprocess the batch and submit it
    Submit,
    /// Fire the completion contract with the terminal outcome
    Complete(OpResult<Value>),
}

/// Pure transition function. There is no retry layer here; an exception in
/// any state resolves the operation directly.
pub(crate) fn create_step(
    state: CreateState,
    event: CreateEvent,
) -> Result<(CreateState, CreateEffect)> {
    use CreateEffect::*;
    use CreateEvent::*;
    use CreateState::*;

    match (state, event) {
        (Init, SendCreate) => Ok((Create, Submit)),
        (Create, ReadDone(reply)) => Ok((Done, Complete(Ok(reply)))),
        (Init | Create, Exception(err)) => Ok((Done, Complete(Err(err)))),
        (state, event) => Err(ClientError::Protocol(format!(
            "event {:?} not valid in state {:?}",
            event, state
        ))),
    }
}

/// Rewrite a batch of entities so every id is a structured reference to a
/// bare local name.
///
/// Works on shallow copies; the caller's batch is never mutated, and
/// normalizing twice yields the same output.
pub fn normalize_entities(entities: &[Value]) -> Result<Vec<Value>> {
    entities.iter().map(normalize_entity).collect()
}

fn normalize_entity(entity: &Value) -> Result<Value> {
    let Some(tags) = entity.as_object() else {
        return Err(ClientError::InvalidEntity(format!(
            "{} is not a tag mapping",
            entity
        )));
    };

    let mut tags = tags.clone();
    let id = tags
        .remove("id")
        .ok_or_else(|| ClientError::InvalidEntity("entity has no id tag".to_string()))?;
    let Some(id) = id.as_str() else {
        return Err(ClientError::InvalidEntity(format!(
            "id tag {} is not a reference or string",
            id
        )));
    };

    // A structured reference contributes its name portion; any namespace
    // qualification keeps only the trailing segment.
    let name = match Ref::parse(id) {
        Some(r) => local_name(r.name()).to_string(),
        None => local_name(id).to_string(),
    };
    tags.insert("id".to_string(), Value::String(Ref::new(name).wire()));

    Ok(Value::Object(tags))
}

/// Create a batch of entities on the server.
///
/// Preprocessing happens synchronously when the operation starts; a batch
/// that fails validation never reaches the network. With `single` set, a
/// one-row reply is delivered as the row itself rather than a list.
pub struct CreateEntityOperation {
    driver: Option<CreateDriver>,
}

impl CreateEntityOperation {
    pub fn new(transport: Arc<dyn SessionTransport>, entities: Vec<Value>, single: bool) -> Self {
        CreateEntityOperation {
            driver: Some(CreateDriver {
                transport,
                entities,
                single,
            }),
        }
    }
}

impl Operation for CreateEntityOperation {
    type Output = Value;

    fn go(&mut self) -> OperationHandle<Value> {
        let Some(driver) = self.driver.take() else {
            panic!("CreateEntityOperation::go() called twice");
        };
        let (slot, handle) = CompletionSlot::new();
        tokio::spawn(driver.run(slot));
        handle
    }
}

struct CreateDriver {
    transport: Arc<dyn SessionTransport>,
    entities: Vec<Value>,
    single: bool,
}

impl CreateDriver {
    async fn run(self, mut slot: CompletionSlot<Value>) {
        let mut state = CreateState::Init;
        let mut event = CreateEvent::SendCreate;

        loop {
            let (next, effect) = match create_step(state, event) {
                Ok(transition) => transition,
                Err(err) => {
                    slot.complete(Err(AsyncError::capture(err)));
                    return;
                }
            };
            state = next;

            event = match effect {
                CreateEffect::Submit => match self.submit().await {
                    Ok(reply) => CreateEvent::ReadDone(reply),
                    Err(err) => CreateEvent::Exception(err),
                },
                CreateEffect::Complete(outcome) => {
                    match &outcome {
                        Ok(_) => {
                            tracing::debug!(entities = self.entities.len(), "Entities created")
                        }
                        Err(err) => tracing::error!(error = %err, "Entity creation failed"),
                    }
                    slot.complete(outcome);
                    return;
                }
            };
        }
    }

    async fn submit(&self) -> OpResult<Value> {
        let rows = normalize_entities(&self.entities).map_err(AsyncError::capture)?;
        tracing::debug!(rows = rows.len(), "Submitting entity batch");

        let reply = self.transport.create(rows).await?;
        if self.single {
            collapse_single(reply).map_err(AsyncError::capture)
        } else {
            Ok(reply)
        }
    }
}

fn collapse_single(reply: Value) -> Result<Value> {
    match reply {
        Value::Array(rows) => rows.into_iter().next().ok_or(ClientError::EmptyReply),
        other => Ok(other),
    }
}
