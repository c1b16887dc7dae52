//! Scripted transport for exercising the drive channel without an engine.
//!
//! The fake plays back a queue of canned responses and records every call,
//! so tests can assert both on outcomes and on the exact wire traffic.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use crate::error::Result;
use crate::rpc::{RpcValue, Transport};

/// Shared view of the calls a [`ScriptedTransport`] has seen:
/// `(method, first parameter as text)` per call.
pub type CallLog = Rc<RefCell<Vec<(String, String)>>>;

/// Transport fake returning queued responses in order.
///
/// When the queue runs dry it answers with an empty string value, so
/// incidental trailing calls do not force every test to script them.
pub struct ScriptedTransport {
    calls: CallLog,
    responses: RefCell<VecDeque<Result<RpcValue>>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<RpcValue>>) -> (Self, CallLog) {
        let calls: CallLog = Rc::default();
        let transport = Self {
            calls: Rc::clone(&calls),
            responses: RefCell::new(responses.into()),
        };
        (transport, calls)
    }
}

impl Transport for ScriptedTransport {
    fn call(&self, method: &str, params: &[RpcValue]) -> Result<RpcValue> {
        let first = params.first().map(RpcValue::as_text).unwrap_or_default();
        self.calls.borrow_mut().push((method.to_string(), first));
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(RpcValue::String(String::new())))
    }
}

/// Response envelope as the engine returns it for `execute`.
pub fn envelope(result: RpcValue) -> RpcValue {
    let mut members = BTreeMap::new();
    members.insert("Duration".to_string(), RpcValue::Double(0.25));
    members.insert("Output".to_string(), RpcValue::String(String::new()));
    members.insert("Result".to_string(), result);
    RpcValue::Struct(members)
}

/// Execution record found in the result section of a parsed-mode response.
pub fn execution_record(status: &str, return_value: &str, error: Option<&str>) -> RpcValue {
    let mut members = BTreeMap::new();
    members.insert("Duration".to_string(), RpcValue::Double(0.1));
    members.insert("Status".to_string(), RpcValue::String(status.to_string()));
    members.insert(
        "ReturnValue".to_string(),
        RpcValue::String(return_value.to_string()),
    );
    if let Some(message) = error {
        members.insert(
            "ErrorMessage".to_string(),
            RpcValue::String(message.to_string()),
        );
    }
    RpcValue::Struct(members)
}
