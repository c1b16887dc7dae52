//! Session control and command transmission against the engine.

use tracing::{debug, info, warn};

use crate::error::{DriveError, Result};
use crate::rpc::{HttpTransport, RpcValue, Transport};

/// Oldest engine release whose result serialization the codec fully
/// understands (quoted strings inside returned lists).
pub const MIN_ENGINE_VERSION: &str = "20.1.0";

const WARNING_MARKER: &str = "LogWarning";
const BUSY_SESSION: &str = "BUSY: Session in progress";
const NO_ACTIVE_SESSION: &str = "Can't End Session -- No Session is Active";
const EXECUTION_DELAY_WARN_SECS: f64 = 30.0;

/// Blocking client for the engine's drive channel.
///
/// One client drives at most one engine session at a time, matching the
/// engine's own single-session model. All calls block until the transport
/// returns or times out.
pub struct DriveClient {
    transport: Box<dyn Transport>,
    timeout_secs: u64,
    version_checked: bool,
}

impl DriveClient {
    pub fn connect_to(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            transport: Box::new(HttpTransport::new(endpoint, timeout_secs)?),
            timeout_secs,
            version_checked: false,
        })
    }

    /// Client over an arbitrary transport; the seam tests drive through.
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            timeout_secs: 60,
            version_checked: false,
        }
    }

    /// Points the client at another engine endpoint. Pure configuration -
    /// nothing is sent, and any session on the old endpoint is left behind.
    pub fn configure(&mut self, host: &str, port: u16) -> Result<()> {
        let endpoint = format!("{host}:{port}");
        debug!(%endpoint, "switching engine endpoint");
        self.transport = Box::new(HttpTransport::new(&endpoint, self.timeout_secs)?);
        Ok(())
    }

    /// Opens a session for the given suite.
    ///
    /// When the engine still has a session in progress and
    /// `auto_close_conflicting` is set, that session is closed and the open
    /// is retried once. After the first successful open the engine's version
    /// compatibility is checked a single time; an incompatible version only
    /// logs a warning.
    pub fn open_session(&mut self, suite: &str, auto_close_conflicting: bool) -> Result<()> {
        debug!(suite, "opening engine session");
        let params = [RpcValue::String(suite.to_string())];
        match self.transport.call("startsession", &params) {
            Ok(out) => debug!(response = %out.as_text(), "session opened"),
            Err(e) if auto_close_conflicting && e.fault_contains(BUSY_SESSION) => {
                info!("old session busy - closing it automatically");
                self.close_session(suite)?;
                let out = self.transport.call("startsession", &params)?;
                debug!(response = %out.as_text(), "session opened after retry");
            }
            Err(e) => return Err(e),
        }

        if !self.version_checked {
            self.execute(&version_check_command(), false, true)?;
            self.version_checked = true;
        }
        Ok(())
    }

    /// Closes the session for the given suite. Closing when no session is
    /// active logs a warning instead of failing, so teardown paths can call
    /// this unconditionally.
    pub fn close_session(&mut self, suite: &str) -> Result<()> {
        debug!(suite, "closing engine session");
        match self
            .transport
            .call("endsession", &[RpcValue::String(suite.to_string())])
        {
            Ok(out) => {
                debug!(response = %out.as_text(), "session closed");
                Ok(())
            }
            Err(e) if e.fault_contains(NO_ACTIVE_SESSION) => {
                debug!(fault = %e, "close reported no active session");
                warn!("no open engine session to close");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Sends one command string to the engine.
    ///
    /// The response's duration and output are always logged, and output
    /// lines carrying the engine's warning marker are surfaced as warnings.
    ///
    /// With `parse_result` the result section is unwrapped as an execution
    /// record: the delay between channel duration and script duration is
    /// logged (queueing or clock skew shows up here), and a status other
    /// than `Success` raises an execution fault carrying the engine's error
    /// message - unless `raise_on_failure` is off. Without `parse_result`
    /// the raw result section is returned; it may still belong to a
    /// previously run script.
    pub fn execute(
        &mut self,
        command: &str,
        parse_result: bool,
        raise_on_failure: bool,
    ) -> Result<RpcValue> {
        info!(command, "send command to engine");

        let envelope = self
            .transport
            .call("execute", &[RpcValue::String(command.to_string())])?;
        debug!(response = %envelope.as_text(), "raw engine response");

        let channel_duration = envelope.get("Duration").and_then(RpcValue::as_f64);
        if let Some(duration) = channel_duration {
            info!(duration, "execution duration");
        }

        let output = envelope
            .get("Output")
            .map(RpcValue::as_text)
            .unwrap_or_default();
        info!(output = %output, "command output");
        for line in output.lines() {
            if let Some((_, warning)) = line.split_once(WARNING_MARKER) {
                warn!("{}", warning.trim());
            }
        }

        let result_section = envelope
            .get("Result")
            .cloned()
            .unwrap_or_else(|| RpcValue::String(String::new()));
        debug!(result = %result_section.as_text(), "execution result");

        if !parse_result {
            info!(value = %result_section.as_text(), "return value");
            return Ok(result_section);
        }

        debug!("parsing the execution result");
        if !matches!(result_section, RpcValue::Struct(_)) {
            return Err(DriveError::Envelope(format!(
                "parsed mode expects an execution record, got: {}",
                result_section.as_text()
            )));
        }

        let script_duration = result_section.get("Duration").and_then(RpcValue::as_f64);
        if let (Some(outer), Some(inner)) = (
            channel_duration.filter(|d| *d != 0.0),
            script_duration.filter(|d| *d != 0.0),
        ) {
            let delay = outer - inner;
            debug!("drive execution delay: {delay:.2} seconds");
            if delay > EXECUTION_DELAY_WARN_SECS {
                warn!(
                    "drive execution delay too high (>{EXECUTION_DELAY_WARN_SECS} s): {delay:.2} seconds"
                );
                info!(
                    "drive execution delay - difference between channel command duration \
                     and script duration"
                );
            }
        }

        let status = result_section
            .get("Status")
            .map(RpcValue::as_text)
            .ok_or_else(|| DriveError::Envelope("execution record without Status".into()))?;
        let return_value = result_section
            .get("ReturnValue")
            .cloned()
            .unwrap_or_else(|| RpcValue::String(String::new()));

        if status != "Success" && raise_on_failure {
            let message = result_section
                .get("ErrorMessage")
                .map(RpcValue::as_text)
                .unwrap_or(status);
            return Err(DriveError::Execution(message));
        }

        info!(value = %return_value.as_text(), "return value");
        Ok(return_value)
    }
}

fn version_check_command() -> String {
    format!(
        "if EggplantVersion().eggplant < \"{MIN_ENGINE_VERSION}\" then LogWarning \
         !\"Incompatible engine version detected - [[EggplantVersion().eggplant]]. \
         Min. version required - {MIN_ENGINE_VERSION}. See README for more information.\""
    )
}
