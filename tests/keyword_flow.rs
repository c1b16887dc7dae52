//! End-to-end keyword flow against a scripted transport and a real
//! on-disk scripts tree.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use eggdrive::drive::DriveClient;
use eggdrive::error::DriveError;
use eggdrive::rpc::RpcValue;
use eggdrive::testing::{envelope, execution_record, CallLog, ScriptedTransport};
use eggdrive::{Config, KeywordLibrary, Value};

fn suite_fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let scripts = dir.path().join("Scripts");
    fs::create_dir_all(scripts.join("Login")).unwrap();

    let mut enter = fs::File::create(scripts.join("Login").join("enterPin.script")).unwrap();
    writeln!(enter, "// Types the PIN into the login mask.").unwrap();
    writeln!(enter, "params pin, attempts:3").unwrap();
    writeln!(enter, "put 1").unwrap();

    let mut check = fs::File::create(scripts.join("checkText.script")).unwrap();
    writeln!(check, "(* Verifies the given text is on screen. *)").unwrap();
    writeln!(check, "params expected:\"OK\"").unwrap();
    writeln!(check, "put 2").unwrap();

    fs::File::create(scripts.join("_internal.script")).unwrap();
    dir
}

fn library_over(
    suite: &tempfile::TempDir,
    responses: Vec<Result<RpcValue, DriveError>>,
) -> (KeywordLibrary, CallLog) {
    let (transport, calls) = ScriptedTransport::new(responses);
    let config = Config {
        host: "http://127.0.0.1".to_string(),
        port: 5400,
        suite: suite.path().to_path_buf(),
        scripts_dir: "Scripts".to_string(),
        request_timeout_secs: 60,
    };
    (
        KeywordLibrary::with_client(DriveClient::with_transport(Box::new(transport)), &config),
        calls,
    )
}

#[test]
fn discovery_exposes_scripts_and_metadata() {
    let suite = suite_fixture();
    let (library, _calls) = library_over(&suite, vec![]);

    let names = library.keyword_names().unwrap();
    assert!(names.contains("checkText"));
    assert!(names.contains("Login.enterPin"));
    assert!(names.contains("open_session"));
    assert!(!names.contains("_internal"));

    assert_eq!(
        library.keyword_documentation("Login.enterPin").unwrap(),
        " Types the PIN into the login mask."
    );
    assert_eq!(
        library.keyword_arguments("Login.enterPin").unwrap(),
        vec!["pin", "attempts=3"]
    );
    assert_eq!(
        library.keyword_arguments("checkText").unwrap(),
        vec!["expected=OK"]
    );
    let source = library.keyword_source("Login.enterPin").unwrap();
    assert!(source.ends_with("enterPin.script"));
    assert!(source.contains("Login"));
}

#[test]
fn session_keyword_and_result_flow() {
    let suite = suite_fixture();
    let (mut library, calls) = library_over(
        &suite,
        vec![
            // open_session: busy engine, auto-closed and retried
            Err(DriveError::Fault {
                code: 1,
                message: "BUSY: Session in progress".into(),
            }),
            Ok(RpcValue::String("closed".into())),
            Ok(RpcValue::String("opened".into())),
            // one-time version check
            Ok(envelope(RpcValue::String(String::new()))),
            // script keyword run
            Ok(envelope(execution_record("Success", "[1, \"a\", True]", None))),
            // close_session: already gone, tolerated
            Err(DriveError::Fault {
                code: 1,
                message: "Can't End Session -- No Session is Active".into(),
            }),
        ],
    );

    library.run_keyword("open_session", &[]).unwrap();

    let value = library
        .run_keyword(
            "Login.enterPin",
            &[Value::Str("1234".into()), Value::Int(1)],
        )
        .unwrap();
    assert_eq!(
        value,
        Value::List(vec![
            Value::Int(1),
            Value::Str("a".into()),
            Value::Bool(true),
        ])
    );

    library.run_keyword("close_session", &[]).unwrap();

    let recorded = calls.borrow();
    let methods: Vec<&str> = recorded.iter().map(|(m, _)| m.as_str()).collect();
    assert_eq!(
        methods,
        vec![
            "startsession",
            "endsession",
            "startsession",
            "execute",
            "execute",
            "endsession",
        ]
    );
    assert_eq!(
        recorded[4].1,
        "RunWithNewResults \"Login/enterPin\", \"1234\", 1,"
    );
    let suite_path = PathBuf::from(&recorded[0].1);
    assert_eq!(suite_path, suite.path());
}

#[test]
fn failed_script_keyword_reports_wrapped_error() {
    let suite = suite_fixture();
    let (mut library, _calls) = library_over(
        &suite,
        vec![
            Ok(envelope(execution_record(
                "Failure",
                "",
                Some("No Text Found On Screen: NEXT"),
            ))),
            // diagnostic screenshot
            Ok(envelope(RpcValue::String(String::new()))),
        ],
    );
    let out = tempfile::tempdir().unwrap();
    library.set_output_dir(out.path());

    let err = library.run_keyword("checkText", &[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "checkText: No Text Found On Screen: NEXT"
    );
}
