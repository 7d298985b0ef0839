//! In-memory service for tests: replays canned replies per op and records
//! every call.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use futures::future::{self, FutureExt};
use serde_json::Value;

use super::{Api, RemoteFuture, RemoteService, TransportError, request_body};

enum Scripted {
    Reply(Value),
    Fail(TransportError),
    Hang,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub api: Api,
    pub op: String,
    pub params: Value,
}

#[derive(Default)]
pub struct ScriptedRemote {
    script: RefCell<HashMap<String, VecDeque<Scripted>>>,
    calls: RefCell<Vec<Call>>,
}

impl ScriptedRemote {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    fn push(&self, op: &str, entry: Scripted) {
        self.script
            .borrow_mut()
            .entry(op.to_string())
            .or_default()
            .push_back(entry);
    }

    pub fn reply(&self, op: &str, value: Value) -> &Self {
        self.push(op, Scripted::Reply(value));
        self
    }

    pub fn fail(&self, op: &str, err: TransportError) -> &Self {
        self.push(op, Scripted::Fail(err));
        self
    }

    /// The call never completes.
    pub fn hang(&self, op: &str) -> &Self {
        self.push(op, Scripted::Hang);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn ops(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.op.clone()).collect()
    }

    pub fn last(&self) -> Option<Call> {
        self.calls.borrow().last().cloned()
    }
}

impl RemoteService for ScriptedRemote {
    /// Records params as they would go on the wire, without `op`.
    fn call(&self, api: Api, op: &str, params: Value) -> RemoteFuture {
        let mut params = request_body(op, params);
        if let Value::Object(map) = &mut params {
            map.remove("op");
        }
        self.calls.borrow_mut().push(Call {
            api,
            op: op.to_string(),
            params,
        });
        let next = self
            .script
            .borrow_mut()
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Scripted::Reply(v)) => future::ready(Ok(v)).boxed_local(),
            Some(Scripted::Fail(e)) => future::ready(Err(e)).boxed_local(),
            Some(Scripted::Hang) => future::pending().boxed_local(),
            None => future::ready(Err(TransportError::Status {
                code: 404,
                body: format!("no scripted reply for {op}"),
            }))
            .boxed_local(),
        }
    }
}
