mod cli;

use anyhow::Result;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use eggdrive::value::infer_scalar;
use eggdrive::{Config, KeywordLibrary, Overrides, Value};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = cli::Cli::parse();

    let cfg = Config::resolve(Overrides {
        config_path: args.config,
        host: args.host,
        port: args.port,
        suite: args.suite,
        scripts_dir: args.scripts_dir,
    });

    let mut library = KeywordLibrary::new(&cfg)?;

    match args.command {
        cli::Command::List => {
            for name in library.keyword_names()? {
                if library.is_native(&name) {
                    println!("{}", name.cyan());
                } else {
                    println!("{}", name);
                }
            }
        }
        cli::Command::Doc { keyword } => {
            println!("{}", library.keyword_documentation(&keyword)?);
        }
        cli::Command::Args { keyword } => {
            for argument in library.keyword_arguments(&keyword)? {
                println!("{}", argument);
            }
        }
        cli::Command::Source { keyword } => {
            println!("{}", library.keyword_source(&keyword)?);
        }
        cli::Command::Run { keyword, args } => {
            let values: Vec<Value> = args.iter().map(|a| infer_scalar(a)).collect();
            let result = library.run_keyword(&keyword, &values)?;
            let json: serde_json::Value = result.into();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        cli::Command::Exec { command } => {
            let result = library.run_keyword("run_command", &[Value::Str(command)])?;
            let json: serde_json::Value = result.into();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        cli::Command::Open { no_auto_close } => {
            library.run_keyword(
                "open_session",
                &[Value::Str(String::new()), Value::Bool(!no_auto_close)],
            )?;
            println!("session open");
        }
        cli::Command::Close => {
            library.run_keyword("close_session", &[])?;
            println!("session closed");
        }
    }

    Ok(())
}
