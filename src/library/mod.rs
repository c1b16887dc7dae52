//! The keyword library: one addressable namespace over native keywords and
//! suite scripts, with call dispatch and metadata synthesis.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::catalog::{Param, ScriptCatalog};
use crate::config::{Config, DEFAULT_HOST, DEFAULT_PORT};
use crate::drive::DriveClient;
use crate::error::{DriveError, Result};
use crate::rpc::RpcValue;
use crate::value::{format_argument, parse_result, Value};

const SEARCH_RECT_MARKER: &str = "Restricted Search Rectangle ";
const OCR_TEXT_MARKER: &str = "TEXT:";
const NO_CAPTURE_CONNECTION: &str =
    "unable to capture screen: no connection available from which to capture";
const NO_MOVIE_RECORDING: &str = "StopMovie is not allowed -- there is no movie being recorded";

type KeywordFn = fn(&mut KeywordLibrary, &[Value]) -> Result<Value>;

/// Registry entry for a locally implemented keyword.
///
/// Parameters are stored in their rendered signature form (`name`,
/// `name=default`), which is what the host runner consumes.
struct NativeKeyword {
    name: &'static str,
    handler: KeywordFn,
    doc: &'static str,
    params: &'static [&'static str],
    source_file: &'static str,
    source_line: u32,
}

const NATIVE_KEYWORDS: &[NativeKeyword] = &[
    NativeKeyword {
        name: "set_drive_connection",
        handler: KeywordLibrary::kw_set_drive_connection,
        doc: "Points the library at a running engine instance in drive mode.\n\
              Subsequent commands go to the new endpoint; an open session on the \
              old endpoint is left untouched.",
        params: &["host=http://127.0.0.1", "port=5400"],
        source_file: file!(),
        source_line: line!(),
    },
    NativeKeyword {
        name: "connect_sut",
        handler: KeywordLibrary::kw_connect_sut,
        doc: "Opens a VNC or RDP connection with a SUT and makes it the active \
              connection.\n\nThe connection string may be the name of a saved \
              connection or a parameter record, for example:\n\
              {serverID: \"localhost\", portNum: \"10139\", password: \"secret\"}",
        params: &["connection_string"],
        source_file: file!(),
        source_line: line!(),
    },
    NativeKeyword {
        name: "disconnect_sut",
        handler: KeywordLibrary::kw_disconnect_sut,
        doc: "Closes the specified VNC or RDP connection with a SUT.\n\
              The connection string works as for connect_sut.",
        params: &["connection_string"],
        source_file: file!(),
        source_line: line!(),
    },
    NativeKeyword {
        name: "run_command",
        handler: KeywordLibrary::kw_run_command,
        doc: "Sends one raw command to the engine, beyond the available \
              keywords. Quotes have to be escaped.\n\nReturns the result \
              section of the response; note it may still carry the result of \
              a previously run script.\n\nExamples:\n  myScript arg1, arg2\n  \
              click \"someImage\"",
        params: &["command"],
        source_file: file!(),
        source_line: line!(),
    },
    NativeKeyword {
        name: "open_session",
        handler: KeywordLibrary::kw_open_session,
        doc: "Opens a session with the given suite; call before running script \
              keywords. Without an argument the configured suite is used.\n\n\
              A previously open session is closed automatically unless \
              close_previously_open_session is disabled. The first successful \
              open also checks the engine version and logs a warning on \
              incompatibility.",
        params: &["suite=", "close_previously_open_session=True"],
        source_file: file!(),
        source_line: line!(),
    },
    NativeKeyword {
        name: "close_session",
        handler: KeywordLibrary::kw_close_session,
        doc: "Closes the session with the given suite (default: the configured \
              one). Closing when no session is open only logs a warning.",
        params: &["suite="],
        source_file: file!(),
        source_line: line!(),
    },
    NativeKeyword {
        name: "screenshot",
        handler: KeywordLibrary::kw_screenshot,
        doc: "Captures the SUT screen into a file and logs the file path.\n\n\
              By default the full screen is captured; a rectangle restricts \
              the capture area, e.g. (67, 33), imagelocation(\"OtherCorner\"). \
              The file path is relative to the output directory; a default \
              timestamped name is used when omitted.\n\nNormally a missing SUT \
              connection is an error; disable error_if_no_sut_connection to \
              downgrade it to a warning.",
        params: &["rectangle=", "file_path=", "error_if_no_sut_connection=True"],
        source_file: file!(),
        source_line: line!(),
    },
    NativeKeyword {
        name: "start_movie",
        handler: KeywordLibrary::kw_start_movie,
        doc: "Starts video recording into the given file and returns the path \
              (relative to the output directory; timestamped default when \
              omitted).\n\nRecording continues for extra_time seconds after \
              stop_movie.",
        params: &[
            "file_path=",
            "fps=15",
            "compression_rate=1",
            "highlighting=True",
            "extra_time=5",
        ],
        source_file: file!(),
        source_line: line!(),
    },
    NativeKeyword {
        name: "stop_movie",
        handler: KeywordLibrary::kw_stop_movie,
        doc: "Stops the current video recording. Without an active recording \
              nothing is raised unless error_if_no_movie_started is set.",
        params: &["error_if_no_movie_started=False"],
        source_file: file!(),
        source_line: line!(),
    },
];

fn find_native(name: &str) -> Option<&'static NativeKeyword> {
    NATIVE_KEYWORDS.iter().find(|k| k.name == name)
}

/// Exposes engine scripts and the native keyword set to a keyword-driven
/// host runner.
///
/// The host contract is five operations: enumerate names, run one keyword,
/// and fetch a keyword's arguments, documentation and source location.
pub struct KeywordLibrary {
    drive: DriveClient,
    catalog: ScriptCatalog,
    suite: PathBuf,
    output_dir: PathBuf,
    current_movie_path: Option<String>,
}

impl KeywordLibrary {
    pub fn new(config: &Config) -> Result<Self> {
        let drive = DriveClient::connect_to(&config.endpoint(), config.request_timeout_secs)?;
        Ok(Self::with_client(drive, config))
    }

    /// Library over an existing client; tests inject a scripted transport
    /// this way.
    pub fn with_client(drive: DriveClient, config: &Config) -> Self {
        Self {
            drive,
            catalog: ScriptCatalog::new(config.scripts_root()),
            suite: config.suite.clone(),
            output_dir: PathBuf::from("."),
            current_movie_path: None,
        }
    }

    /// Directory screenshots and recordings are stored under; keyword file
    /// paths stay relative to it.
    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.output_dir = dir.into();
    }

    // ---------- host runner contract ------------------------------------

    /// True when the name belongs to the native set rather than a suite script.
    pub fn is_native(&self, name: &str) -> bool {
        find_native(name).is_some()
    }

    /// All addressable keyword names: the native set plus every suite script.
    pub fn keyword_names(&self) -> Result<std::collections::BTreeSet<String>> {
        let mut names: std::collections::BTreeSet<String> =
            NATIVE_KEYWORDS.iter().map(|k| k.name.to_string()).collect();
        names.extend(self.catalog.keyword_names()?);
        debug!(count = names.len(), "collected keywords");
        Ok(names)
    }

    /// Runs the requested keyword with positional arguments.
    ///
    /// Native keywords are dispatched directly and their errors propagate
    /// unchanged. Everything else is treated as a script keyword: dots in
    /// the name become path separators, the command is sent in parsed mode
    /// and the engine's return value is decoded. A failing script triggers
    /// diagnostics (OCR of the failure region, screenshot, recording
    /// attachment) before the error is re-raised as `{name}: {message}`.
    pub fn run_keyword(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        if let Some(native) = find_native(name) {
            return (native.handler)(self, args);
        }

        // dots address scripts in subfolders
        let script = name.replace('.', "/");
        match self.run_with_new_results(&script, args) {
            Ok(value) => Ok(value),
            Err(DriveError::Execution(message)) => {
                let failure_region = self.ocr_debug_info(&message);
                if !failure_region.is_empty() {
                    info!(rectangle = %failure_region, "failure region");
                }
                let screenshot = self.capture_failure_screenshot();
                self.attach_recording(screenshot);
                Err(DriveError::Keyword(format!("{name}: {message}")))
            }
            Err(e @ (DriveError::Fault { .. } | DriveError::Unreachable { .. })) => {
                error!(keyword = name, fault = %e, "engine failure");
                let screenshot = self.capture_failure_screenshot();
                self.attach_recording(screenshot);
                Err(e)
            }
            Err(e) => {
                error!("unknown error occurred: {e}");
                Err(e)
            }
        }
    }

    /// Rendered signature of a keyword, for argument checking and code
    /// completion on the host side.
    pub fn keyword_arguments(&self, name: &str) -> Result<Vec<String>> {
        if let Some(native) = find_native(name) {
            return Ok(native.params.iter().map(|s| s.to_string()).collect());
        }
        debug!(keyword = name, "reading arguments from script file");
        let params = self.catalog.parameters(name)?;
        Ok(params.into_iter().map(render_param).collect())
    }

    /// Keyword documentation: the authored text for native keywords, the
    /// leading comment block for scripts.
    pub fn keyword_documentation(&self, name: &str) -> Result<String> {
        if let Some(native) = find_native(name) {
            return Ok(native.doc.to_string());
        }
        self.catalog.documentation(name)
    }

    /// Where the keyword is defined: `file:line` for native keywords, the
    /// script file path otherwise.
    pub fn keyword_source(&self, name: &str) -> Result<String> {
        if let Some(native) = find_native(name) {
            return Ok(format!("{}:{}", native.source_file, native.source_line));
        }
        Ok(self.catalog.script_path(name).display().to_string())
    }

    // ---------- script dispatch -----------------------------------------

    /// Builds and sends a `RunWithNewResults` command for the script with
    /// the given arguments, and decodes the returned value.
    fn run_with_new_results(&mut self, script: &str, args: &[Value]) -> Result<Value> {
        let mut command = format!("RunWithNewResults \"{script}\",");
        for arg in args {
            debug!(argument = ?arg, "processing argument");
            let formatted = format_argument(arg);
            debug!(%formatted, "formatted argument");
            command = format!("{command} {formatted},");
        }
        let returned = self.drive.execute(&command, true, true)?;
        // the return value arrives as text and needs decoding
        Ok(parse_result(&returned.as_text()))
    }

    /// Reads the on-screen text in the restricted search rectangle named in
    /// a text-search failure, so the log shows what was actually there.
    /// Returns the rectangle, or an empty string when the whole screen was
    /// searched.
    fn ocr_debug_info(&mut self, message: &str) -> String {
        let Some(idx) = message.find(SEARCH_RECT_MARKER) else {
            return String::new();
        };
        let search_rect = message[idx + SEARCH_RECT_MARKER.len()..].trim().to_string();
        if message.contains(OCR_TEXT_MARKER) {
            info!(
                "performing OCR read in the restricted search rectangle {search_rect}; \
                 results appear in the command output"
            );
            if let Err(e) = self
                .drive
                .execute(&format!("log ReadText{search_rect}"), false, true)
            {
                debug!(error = %e, "OCR read failed");
            }
        }
        search_rect
    }

    fn capture_failure_screenshot(&mut self) -> Option<String> {
        match self.take_screenshot("", "", false) {
            Ok(path) => path,
            Err(e) => {
                debug!(error = %e, "diagnostic screenshot failed");
                None
            }
        }
    }

    fn attach_recording(&self, screenshot: Option<String>) {
        if let Some(movie) = &self.current_movie_path {
            info!(video = %movie, preview = screenshot.as_deref(), "recording attached for failure analysis");
        } else if let Some(shot) = screenshot {
            info!(screenshot = %shot, "screenshot attached for failure analysis");
        }
    }

    /// Captures the SUT screen into `file_path` (relative to the output
    /// directory, timestamped default when empty) and returns the relative
    /// path, or `None` when no SUT connection was available and that is
    /// tolerated.
    fn take_screenshot(
        &mut self,
        rectangle: &str,
        file_path: &str,
        error_if_no_sut: bool,
    ) -> Result<Option<String>> {
        let target = if file_path.is_empty() {
            format!(
                "Screenshots/Screenshot__{}.png",
                Local::now().format("%Y-%m-%d__%H_%M_%S__%6f")
            )
        } else {
            file_path.to_string()
        };
        if Path::new(&target).is_absolute() {
            return Err(DriveError::Argument(format!(
                "file_path '{target}' must be relative to the output dir"
            )));
        }
        let full_path = self.output_dir.join(&target);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let rectangle_clause = if rectangle.is_empty() {
            info!("screenshot rectangle: full screen");
            String::new()
        } else {
            info!(rectangle, "screenshot rectangle");
            format!("Rectangle: ({rectangle})")
        };

        let command = format!(
            "CaptureScreen(Name:\"{}\", {})",
            full_path.display(),
            rectangle_clause
        );
        match self.drive.execute(&command, false, true) {
            Ok(_) => Ok(Some(target)),
            Err(e) if is_no_capture_fault(&e) => {
                debug!(error = %e, "capture reported no SUT connection");
                let message = "unable to take screenshot - no SUT connection available";
                if error_if_no_sut {
                    Err(DriveError::Execution(message.to_string()))
                } else {
                    warn!("{message}");
                    Ok(None)
                }
            }
            Err(e) => Err(e),
        }
    }

    // ---------- native keyword handlers ---------------------------------

    fn kw_set_drive_connection(&mut self, args: &[Value]) -> Result<Value> {
        let host = optional_text(args, 0);
        let host = if host.is_empty() {
            DEFAULT_HOST.to_string()
        } else {
            host
        };
        let port = match args.get(1) {
            None => DEFAULT_PORT,
            Some(Value::Str(s)) if s.is_empty() => DEFAULT_PORT,
            Some(value) => value_text(value).parse::<u16>().map_err(|_| {
                DriveError::Argument(format!("port '{}' is not a number", value_text(value)))
            })?,
        };
        self.drive.configure(&host, port)?;
        Ok(Value::Str(String::new()))
    }

    fn kw_connect_sut(&mut self, args: &[Value]) -> Result<Value> {
        let connection = required_text(args, 0, "connection_string")?;
        self.drive
            .execute(&format!("connect {connection}"), false, true)?;
        Ok(Value::Str(String::new()))
    }

    fn kw_disconnect_sut(&mut self, args: &[Value]) -> Result<Value> {
        let connection = required_text(args, 0, "connection_string")?;
        self.drive
            .execute(&format!("disconnect {connection}"), false, true)?;
        Ok(Value::Str(String::new()))
    }

    fn kw_run_command(&mut self, args: &[Value]) -> Result<Value> {
        let command = required_text(args, 0, "command")?;
        let result = self.drive.execute(&command, false, true)?;
        Ok(rpc_to_value(result))
    }

    fn kw_open_session(&mut self, args: &[Value]) -> Result<Value> {
        let suite = self.suite_argument(args, 0);
        let auto_close = bool_arg(args, 1, true);
        debug!(%suite, "open the engine session with the test suite");
        self.drive.open_session(&suite, auto_close)?;
        Ok(Value::Str(String::new()))
    }

    fn kw_close_session(&mut self, args: &[Value]) -> Result<Value> {
        let suite = self.suite_argument(args, 0);
        debug!(%suite, "close the engine session with the test suite");
        self.drive.close_session(&suite)?;
        Ok(Value::Str(String::new()))
    }

    fn kw_screenshot(&mut self, args: &[Value]) -> Result<Value> {
        let rectangle = optional_text(args, 0);
        let file_path = optional_text(args, 1);
        let error_if_no_sut = bool_arg(args, 2, true);
        let shot = self.take_screenshot(&rectangle, &file_path, error_if_no_sut)?;
        if let Some(path) = &shot {
            info!(screenshot = %path, "screenshot saved");
        }
        Ok(Value::Str(shot.unwrap_or_default()))
    }

    fn kw_start_movie(&mut self, args: &[Value]) -> Result<Value> {
        let file_path = optional_text(args, 0);
        let path = if file_path.is_empty() {
            format!("Movies/Movie__{}.mp4", Local::now().format("%Y-%m-%d__%H_%M_%S"))
        } else {
            file_path
        };
        if Path::new(&path).is_absolute() {
            return Err(DriveError::Argument(format!(
                "file_path '{path}' must be relative to the output dir"
            )));
        }
        let full_path = self.output_dir.join(&path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let fps = optional_text_or(args, 1, "15");
        let compression_rate = optional_text_or(args, 2, "1");
        let highlighting = optional_text_or(args, 3, "True");
        let extra_time = optional_text_or(args, 4, "5");
        self.drive.execute(
            &format!(
                "StartMovie \"{}\", framesPerSecond:{fps}, compressionRate:{compression_rate}, \
                 imageHighlighting:{highlighting}, extraTime:{extra_time}",
                full_path.display()
            ),
            false,
            true,
        )?;

        info!(video = %path, "start video recording");
        // remembered so a later failure can attach the recording
        self.current_movie_path = Some(path.clone());
        Ok(Value::Str(path))
    }

    fn kw_stop_movie(&mut self, args: &[Value]) -> Result<Value> {
        let error_if_no_movie_started = bool_arg(args, 0, false);
        info!("stop video recording");
        // the recording path is gone after a stop attempt, whatever happens
        let movie = self.current_movie_path.take();
        match self.drive.execute("StopMovie", false, true) {
            Ok(_) => {
                match movie {
                    Some(path) => info!(video = %path, "recording finished"),
                    None => info!("saving video into log failed - current recording file path empty"),
                }
                Ok(Value::Str(String::new()))
            }
            Err(e) if e.fault_contains(NO_MOVIE_RECORDING) => {
                debug!(fault = %e, "stop requested with no active recording");
                if error_if_no_movie_started {
                    Err(e)
                } else {
                    info!("no movie being recorded");
                    Ok(Value::Str(String::new()))
                }
            }
            Err(e) => Err(e),
        }
    }

    fn suite_argument(&self, args: &[Value], idx: usize) -> String {
        let explicit = optional_text(args, idx);
        if explicit.is_empty() {
            self.suite.display().to_string()
        } else {
            explicit
        }
    }
}

fn render_param(p: Param) -> String {
    match p.default {
        None => p.name,
        Some(default) => format!("{}={}", p.name, value_text(&default)),
    }
}

fn rpc_to_value(rpc: RpcValue) -> Value {
    match rpc {
        RpcValue::Int(i) => Value::Int(i),
        RpcValue::Double(d) => Value::Float(d),
        RpcValue::Bool(b) => Value::Bool(b),
        RpcValue::String(s) | RpcValue::DateTime(s) => Value::Str(s),
        RpcValue::Array(items) => Value::List(items.into_iter().map(rpc_to_value).collect()),
        s @ RpcValue::Struct(_) => Value::Str(s.as_text()),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => format_argument(other),
    }
}

fn optional_text(args: &[Value], idx: usize) -> String {
    args.get(idx).map(value_text).unwrap_or_default()
}

fn optional_text_or(args: &[Value], idx: usize, default: &str) -> String {
    let text = optional_text(args, idx);
    if text.is_empty() {
        default.to_string()
    } else {
        text
    }
}

fn required_text(args: &[Value], idx: usize, name: &str) -> Result<String> {
    match args.get(idx) {
        Some(value) => Ok(value_text(value)),
        None => Err(DriveError::Argument(format!(
            "missing required argument '{name}'"
        ))),
    }
}

fn bool_arg(args: &[Value], idx: usize, default: bool) -> bool {
    match args.get(idx) {
        None => default,
        Some(Value::Bool(b)) => *b,
        Some(Value::Int(i)) => *i != 0,
        Some(Value::Str(s)) if s.is_empty() => default,
        Some(Value::Str(s)) => s.eq_ignore_ascii_case("true"),
        Some(_) => default,
    }
}

fn is_no_capture_fault(e: &DriveError) -> bool {
    matches!(e, DriveError::Fault { message, .. }
        if message.to_lowercase().contains(NO_CAPTURE_CONNECTION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{envelope, execution_record, CallLog, ScriptedTransport};
    use std::io::Write;

    fn scripts_fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("Scripts");
        fs::create_dir_all(scripts.join("Sub")).unwrap();
        let mut a = fs::File::create(scripts.join("a.script")).unwrap();
        writeln!(a, "// does something useful").unwrap();
        writeln!(a, "params first, second:5").unwrap();
        writeln!(a, "put 1").unwrap();
        let mut b = fs::File::create(scripts.join("Sub").join("b.script")).unwrap();
        writeln!(b, "put 2").unwrap();
        dir
    }

    fn library(
        suite_dir: &tempfile::TempDir,
        responses: Vec<crate::error::Result<RpcValue>>,
    ) -> (KeywordLibrary, CallLog, tempfile::TempDir) {
        let (transport, calls) = ScriptedTransport::new(responses);
        let config = Config {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            suite: suite_dir.path().to_path_buf(),
            scripts_dir: "Scripts".to_string(),
            request_timeout_secs: 60,
        };
        let mut lib =
            KeywordLibrary::with_client(DriveClient::with_transport(Box::new(transport)), &config);
        let output = tempfile::tempdir().unwrap();
        lib.set_output_dir(output.path());
        (lib, calls, output)
    }

    #[test]
    fn keyword_names_union_natives_and_scripts() {
        let suite = scripts_fixture();
        let (lib, _calls, _out) = library(&suite, vec![]);
        let names = lib.keyword_names().unwrap();
        assert!(names.contains("open_session"));
        assert!(names.contains("a"));
        assert!(names.contains("Sub.b"));
    }

    #[test]
    fn script_keyword_builds_parsed_command_and_decodes_result() {
        let suite = scripts_fixture();
        let (mut lib, calls, _out) = library(
            &suite,
            vec![Ok(envelope(execution_record("Success", "[1, 2]", None)))],
        );

        let value = lib
            .run_keyword("Sub.b", &[Value::Int(1), Value::Str("x y".into())])
            .unwrap();
        assert_eq!(value, Value::List(vec![Value::Int(1), Value::Int(2)]));

        let recorded = calls.borrow();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "execute");
        assert_eq!(recorded[0].1, "RunWithNewResults \"Sub/b\", 1, \"x y\",");
    }

    #[test]
    fn execution_fault_wraps_name_and_captures_diagnostics_once() {
        let suite = scripts_fixture();
        let message = "No Text Found On Screen: TEXT: OK \
                       Restricted Search Rectangle ((1431,654),(1581,854))";
        let (mut lib, calls, _out) = library(
            &suite,
            vec![
                Ok(envelope(execution_record("Failure", "", Some(message)))),
                Ok(envelope(RpcValue::String(String::new()))), // OCR read
                Ok(envelope(RpcValue::String(String::new()))), // screenshot
            ],
        );

        let err = lib.run_keyword("Sub.b", &[]).unwrap_err();
        match err {
            DriveError::Keyword(wrapped) => {
                assert!(wrapped.starts_with("Sub.b: No Text Found On Screen"));
            }
            other => panic!("expected wrapped keyword failure, got {other:?}"),
        }

        let recorded = calls.borrow();
        let commands: Vec<&str> = recorded.iter().map(|(_, c)| c.as_str()).collect();
        assert!(commands[1].starts_with("log ReadText((1431,654),(1581,854))"));
        let captures = commands
            .iter()
            .filter(|c| c.starts_with("CaptureScreen"))
            .count();
        assert_eq!(captures, 1);
    }

    #[test]
    fn protocol_fault_is_reraised_unchanged_after_diagnostics() {
        let suite = scripts_fixture();
        let (mut lib, calls, _out) = library(
            &suite,
            vec![
                Err(DriveError::Fault {
                    code: 7,
                    message: "script not found".into(),
                }),
                Ok(envelope(RpcValue::String(String::new()))), // screenshot
            ],
        );

        let err = lib.run_keyword("missing", &[]).unwrap_err();
        assert!(err.fault_contains("script not found"));
        let recorded = calls.borrow();
        assert!(recorded[1].1.starts_with("CaptureScreen"));
    }

    #[test]
    fn native_keyword_runs_directly() {
        let suite = scripts_fixture();
        let (mut lib, calls, _out) = library(
            &suite,
            vec![Ok(envelope(RpcValue::String("previous".into())))],
        );
        let value = lib
            .run_keyword("run_command", &[Value::Str("put 1".into())])
            .unwrap();
        assert_eq!(value, Value::Str("previous".into()));
        assert_eq!(calls.borrow()[0].1, "put 1");
    }

    #[test]
    fn native_errors_propagate_unwrapped() {
        let suite = scripts_fixture();
        let (mut lib, _calls, _out) = library(&suite, vec![]);
        let err = lib.run_keyword("connect_sut", &[]).unwrap_err();
        assert!(matches!(err, DriveError::Argument(_)));
    }

    #[test]
    fn arguments_for_natives_and_scripts() {
        let suite = scripts_fixture();
        let (lib, _calls, _out) = library(&suite, vec![]);
        assert_eq!(
            lib.keyword_arguments("open_session").unwrap(),
            vec!["suite=", "close_previously_open_session=True"]
        );
        assert_eq!(
            lib.keyword_arguments("a").unwrap(),
            vec!["first", "second=5"]
        );
    }

    #[test]
    fn documentation_for_natives_and_scripts() {
        let suite = scripts_fixture();
        let (lib, _calls, _out) = library(&suite, vec![]);
        assert!(lib
            .keyword_documentation("close_session")
            .unwrap()
            .contains("Closes the session"));
        assert_eq!(
            lib.keyword_documentation("a").unwrap(),
            " does something useful"
        );
    }

    #[test]
    fn source_locations_for_natives_and_scripts() {
        let suite = scripts_fixture();
        let (lib, _calls, _out) = library(&suite, vec![]);
        let native = lib.keyword_source("run_command").unwrap();
        assert!(native.contains("library"));
        assert!(native.rsplit(':').next().unwrap().parse::<u32>().is_ok());
        let script = lib.keyword_source("Sub.b").unwrap();
        assert!(script.ends_with("b.script"));
    }

    #[test]
    fn recording_path_is_cleared_even_when_stop_fails() {
        let suite = scripts_fixture();
        let (mut lib, _calls, _out) = library(
            &suite,
            vec![
                Ok(envelope(RpcValue::String(String::new()))), // StartMovie
                Err(DriveError::Fault {
                    code: 3,
                    message: "engine on fire".into(),
                }),
            ],
        );

        lib.run_keyword("start_movie", &[]).unwrap();
        assert!(lib.current_movie_path.is_some());
        let err = lib.run_keyword("stop_movie", &[]).unwrap_err();
        assert!(err.fault_contains("engine on fire"));
        assert!(lib.current_movie_path.is_none());
    }

    #[test]
    fn stop_movie_without_recording_is_tolerated_by_default() {
        let suite = scripts_fixture();
        let (mut lib, _calls, _out) = library(
            &suite,
            vec![Err(DriveError::Fault {
                code: 3,
                message: NO_MOVIE_RECORDING.into(),
            })],
        );
        lib.run_keyword("stop_movie", &[]).unwrap();
    }

    #[test]
    fn stop_movie_without_recording_raises_when_requested() {
        let suite = scripts_fixture();
        let (mut lib, _calls, _out) = library(
            &suite,
            vec![Err(DriveError::Fault {
                code: 3,
                message: NO_MOVIE_RECORDING.into(),
            })],
        );
        let err = lib
            .run_keyword("stop_movie", &[Value::Bool(true)])
            .unwrap_err();
        assert!(err.fault_contains("no movie being recorded"));
    }

    #[test]
    fn screenshot_tolerates_missing_sut_when_disabled() {
        let suite = scripts_fixture();
        let (mut lib, _calls, _out) = library(
            &suite,
            vec![Err(DriveError::Fault {
                code: 5,
                message: "Unable to Capture Screen: no connection available from which to capture"
                    .into(),
            })],
        );
        let value = lib
            .run_keyword(
                "screenshot",
                &[
                    Value::Str(String::new()),
                    Value::Str(String::new()),
                    Value::Bool(false),
                ],
            )
            .unwrap();
        assert_eq!(value, Value::Str(String::new()));
    }
}
