//! Boundary to everything outside the interpreter: files, HTTP, the
//! question-answering oracle, the knowledge graph and model training.
//!
//! The interpreter never computes these results. Each call becomes a
//! [`ServiceRequest`] handed to a [`Gateway`]; the matching future stays
//! pending until the gateway reports a [`Completion`] for it.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ServiceOp {
    ReadFile,
    WriteFile,
    HttpGet,
    HttpPost,
    Ask,
    AskBatch,
    AddEntity,
    AddRelation,
    QueryKnowledgeGraph,
    TrainModel,
    Predict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub op: ServiceOp,
    pub args: Vec<serde_json::Value>,
}

/// Answer to one request. `Err` is a service-level failure and reaches the
/// program as an `Err(String)` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub id: RequestId,
    pub reply: Result<serde_json::Value, String>,
}

pub trait Gateway {
    fn dispatch(&mut self, request: ServiceRequest) -> eyre::Result<()>;

    /// Next available answer, if any. `Err` means the provider itself is
    /// broken.
    fn poll(&mut self) -> eyre::Result<Option<Completion>>;

    /// Requests dispatched and still to be answered. While this is non-zero
    /// an empty `poll` means "not yet", not "never".
    fn outstanding(&self) -> usize;

    /// Called when `poll` came back empty with replies still outstanding.
    /// Providers that can block until a reply is ready should do so here.
    fn wait(&mut self) -> eyre::Result<()> {
        std::thread::yield_now();
        Ok(())
    }
}

/// Answers every request with a service failure.
#[derive(Debug, Default)]
pub struct NullGateway {
    pending: VecDeque<ServiceRequest>,
}

impl Gateway for NullGateway {
    fn dispatch(&mut self, request: ServiceRequest) -> eyre::Result<()> {
        self.pending.push_back(request);
        Ok(())
    }

    fn poll(&mut self) -> eyre::Result<Option<Completion>> {
        Ok(self.pending.pop_front().map(|request| Completion {
            id: request.id,
            reply: Err(format!("no service provider for '{}'", request.op)),
        }))
    }

    fn outstanding(&self) -> usize {
        self.pending.len()
    }
}

type Handler = Box<dyn FnMut(&[serde_json::Value]) -> Result<serde_json::Value, String>>;

/// In-process provider driven by per-operation handlers. Used by tests and
/// embedders that simulate services.
#[derive(Default)]
pub struct ScriptedGateway {
    handlers: HashMap<ServiceOp, Handler>,
    withheld: HashSet<ServiceOp>,
    queue: VecDeque<ServiceRequest>,
    reverse: bool,
    journal: Rc<RefCell<Vec<ServiceRequest>>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        mut self,
        op: ServiceOp,
        handler: impl FnMut(&[serde_json::Value]) -> Result<serde_json::Value, String> + 'static,
    ) -> Self {
        self.handlers.insert(op, Box::new(handler));
        self
    }

    /// Requests for `op` are accepted and dropped, so they never count as
    /// outstanding and never get an answer.
    pub fn withhold(mut self, op: ServiceOp) -> Self {
        self.withheld.insert(op);
        self
    }

    /// Answer the most recent request first.
    pub fn reply_in_reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Shared record of every dispatched request, in dispatch order.
    pub fn journal(&self) -> Rc<RefCell<Vec<ServiceRequest>>> {
        self.journal.clone()
    }
}

impl Gateway for ScriptedGateway {
    fn dispatch(&mut self, request: ServiceRequest) -> eyre::Result<()> {
        self.journal.borrow_mut().push(request.clone());
        if !self.withheld.contains(&request.op) {
            self.queue.push_back(request);
        }
        Ok(())
    }

    fn poll(&mut self) -> eyre::Result<Option<Completion>> {
        let next = if self.reverse {
            self.queue.pop_back()
        } else {
            self.queue.pop_front()
        };
        let Some(request) = next else {
            return Ok(None);
        };
        let reply = match self.handlers.get_mut(&request.op) {
            Some(handler) => handler(&request.args),
            None => Err(format!("no handler for '{}'", request.op)),
        };
        Ok(Some(Completion {
            id: request.id,
            reply,
        }))
    }

    fn outstanding(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn operation_names_are_snake_case() {
        assert_eq!(ServiceOp::QueryKnowledgeGraph.to_string(), "query_knowledge_graph");
        assert_eq!(ServiceOp::from_str("ask_batch").ok(), Some(ServiceOp::AskBatch));
        assert_eq!(ServiceOp::iter().count(), 11);
    }

    #[test]
    fn scripted_gateway_answers_with_its_handler() {
        let mut gateway = ScriptedGateway::new().on(ServiceOp::Ask, |args| {
            Ok(serde_json::json!(format!("answer to {}", args[0])))
        });
        gateway
            .dispatch(ServiceRequest {
                id: RequestId(1),
                op: ServiceOp::Ask,
                args: vec![serde_json::json!("q")],
            })
            .expect("dispatch");
        assert_eq!(gateway.outstanding(), 1);
        let completion = gateway.poll().expect("poll").expect("completion");
        assert_eq!(completion.reply, Ok(serde_json::json!("answer to \"q\"")));
        assert_eq!(gateway.journal().borrow().len(), 1);
    }
}
