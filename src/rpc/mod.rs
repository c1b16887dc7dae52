//! Blocking wire layer: the XML-RPC subset the engine speaks.
//!
//! The engine exposes three methods (`execute`, `startsession`, `endsession`)
//! over plain XML-RPC. The subset is small and fixed, so requests and
//! responses are encoded and decoded right here instead of pulling in a
//! general XML stack.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{DriveError, Result};

/// A value on the XML-RPC wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcValue {
    Int(i64),
    Double(f64),
    Bool(bool),
    String(String),
    DateTime(String),
    Array(Vec<RpcValue>),
    Struct(BTreeMap<String, RpcValue>),
}

impl RpcValue {
    /// Struct member lookup; `None` for non-structs and missing keys.
    pub fn get(&self, key: &str) -> Option<&RpcValue> {
        match self {
            RpcValue::Struct(members) => members.get(key),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RpcValue::Int(i) => Some(*i as f64),
            RpcValue::Double(d) => Some(*d),
            RpcValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Text rendering used for logging and for result passthrough.
    pub fn as_text(&self) -> String {
        match self {
            RpcValue::Int(i) => i.to_string(),
            RpcValue::Double(d) => d.to_string(),
            RpcValue::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            RpcValue::String(s) | RpcValue::DateTime(s) => s.clone(),
            RpcValue::Array(items) => {
                let inner: Vec<String> = items.iter().map(RpcValue::as_text).collect();
                format!("[{}]", inner.join(", "))
            }
            RpcValue::Struct(members) => {
                let inner: Vec<String> = members
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.as_text()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
        }
    }
}

/// One blocking remote call. The seam the drive client talks through;
/// tests substitute a scripted implementation.
pub trait Transport {
    fn call(&self, method: &str, params: &[RpcValue]) -> Result<RpcValue>;
}

/// XML-RPC over HTTP with a blocking reqwest client.
pub struct HttpTransport {
    http: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

impl Transport for HttpTransport {
    fn call(&self, method: &str, params: &[RpcValue]) -> Result<RpcValue> {
        let body = encode_request(method, params);
        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    DriveError::Unreachable {
                        endpoint: self.endpoint.clone(),
                    }
                } else {
                    DriveError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DriveError::Envelope(format!(
                "unexpected http status {status} from {}",
                self.endpoint
            )));
        }
        parse_response(&response.text()?)
    }
}

pub fn encode_request(method: &str, params: &[RpcValue]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        encode_value(param, &mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn encode_value(value: &RpcValue, out: &mut String) {
    out.push_str("<value>");
    match value {
        RpcValue::Int(i) => out.push_str(&format!("<int>{i}</int>")),
        RpcValue::Double(d) => out.push_str(&format!("<double>{d}</double>")),
        RpcValue::Bool(b) => out.push_str(&format!("<boolean>{}</boolean>", *b as u8)),
        RpcValue::String(s) => out.push_str(&format!("<string>{}</string>", escape(s))),
        RpcValue::DateTime(s) => {
            out.push_str(&format!("<dateTime.iso8601>{}</dateTime.iso8601>", escape(s)))
        }
        RpcValue::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(item, out);
            }
            out.push_str("</data></array>");
        }
        RpcValue::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name));
                out.push_str("</name>");
                encode_value(member, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Decodes a `methodResponse` body into the single result value, or the
/// engine fault it carries.
pub fn parse_response(body: &str) -> Result<RpcValue> {
    let mut cursor = Cursor { body, pos: 0 };
    cursor.expect_decl_and_tag("methodResponse")?;
    cursor.skip_ws();
    if cursor.at_tag("fault") {
        cursor.open("fault")?;
        let fault = cursor.parse_value()?;
        let code = fault
            .get("faultCode")
            .and_then(RpcValue::as_f64)
            .unwrap_or(0.0) as i32;
        let message = fault
            .get("faultString")
            .map(RpcValue::as_text)
            .unwrap_or_else(|| "unknown engine fault".to_string());
        return Err(DriveError::Fault { code, message });
    }
    cursor.open("params")?;
    cursor.open("param")?;
    let value = cursor.parse_value()?;
    Ok(value)
}

struct Cursor<'a> {
    body: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn err(&self, message: &str) -> DriveError {
        DriveError::Envelope(format!("{message} at byte {}", self.pos))
    }

    fn rest(&self) -> &'a str {
        &self.body[self.pos..]
    }

    fn skip_ws(&mut self) {
        while self.rest().starts_with(|c: char| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn at_tag(&mut self, name: &str) -> bool {
        self.skip_ws();
        self.rest().starts_with(&format!("<{name}>"))
    }

    fn open(&mut self, name: &str) -> Result<()> {
        self.skip_ws();
        let tag = format!("<{name}>");
        if !self.rest().starts_with(&tag) {
            return Err(self.err(&format!("expected <{name}>")));
        }
        self.pos += tag.len();
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.skip_ws();
        let tag = format!("</{name}>");
        if !self.rest().starts_with(&tag) {
            return Err(self.err(&format!("expected </{name}>")));
        }
        self.pos += tag.len();
        Ok(())
    }

    fn expect_decl_and_tag(&mut self, name: &str) -> Result<()> {
        self.skip_ws();
        if self.rest().starts_with("<?xml") {
            match self.rest().find("?>") {
                Some(end) => self.pos += end + 2,
                None => return Err(self.err("unterminated xml declaration")),
            }
        }
        self.open(name)
    }

    /// Raw text up to the closing tag of `name`; consumes the closing tag.
    fn text_until_close(&mut self, name: &str) -> Result<String> {
        let tag = format!("</{name}>");
        match self.rest().find(&tag) {
            Some(idx) => {
                let text = &self.rest()[..idx];
                self.pos += idx + tag.len();
                Ok(unescape(text))
            }
            None => Err(self.err(&format!("expected </{name}>"))),
        }
    }

    fn parse_value(&mut self) -> Result<RpcValue> {
        self.open("value")?;
        // a <value> without a type tag is a string per the protocol
        let typed = if self.rest().starts_with("<string>") {
            self.open("string")?;
            let v = RpcValue::String(self.text_until_close("string")?);
            self.close("value")?;
            return Ok(v);
        } else if self.rest().starts_with("<int>") || self.rest().starts_with("<i4>") {
            let name = if self.rest().starts_with("<i4>") { "i4" } else { "int" };
            self.open(name)?;
            let text = self.text_until_close(name)?;
            let i = text
                .trim()
                .parse::<i64>()
                .map_err(|_| self.err("malformed int"))?;
            RpcValue::Int(i)
        } else if self.rest().starts_with("<double>") {
            self.open("double")?;
            let text = self.text_until_close("double")?;
            let d = text
                .trim()
                .parse::<f64>()
                .map_err(|_| self.err("malformed double"))?;
            RpcValue::Double(d)
        } else if self.rest().starts_with("<boolean>") {
            self.open("boolean")?;
            let text = self.text_until_close("boolean")?;
            RpcValue::Bool(text.trim() == "1")
        } else if self.rest().starts_with("<dateTime.iso8601>") {
            self.open("dateTime.iso8601")?;
            RpcValue::DateTime(self.text_until_close("dateTime.iso8601")?)
        } else if self.rest().starts_with("<array>") {
            self.open("array")?;
            self.open("data")?;
            let mut items = Vec::new();
            loop {
                self.skip_ws();
                if self.rest().starts_with("</data>") {
                    break;
                }
                items.push(self.parse_value()?);
            }
            self.close("data")?;
            self.close("array")?;
            RpcValue::Array(items)
        } else if self.rest().starts_with("<struct>") {
            self.open("struct")?;
            let mut members = BTreeMap::new();
            loop {
                self.skip_ws();
                if self.rest().starts_with("</struct>") {
                    break;
                }
                self.open("member")?;
                self.open("name")?;
                let name = self.text_until_close("name")?;
                let value = self.parse_value()?;
                self.close("member")?;
                members.insert(name, value);
            }
            self.close("struct")?;
            RpcValue::Struct(members)
        } else {
            let v = RpcValue::String(self.text_until_close("value")?);
            return Ok(v);
        };
        self.close("value")?;
        Ok(typed)
    }
}
