//! CLI command implementations
//!
//! Both commands follow the same sequence:
//!
//! 1. Load the configuration (defaults when no file is given)
//! 2. Apply the configured log level
//! 3. Load the dataset into a `MemoryEngine`
//! 4. Read one request from stdin and write one response to stdout

use std::io::{self, Read, Write};
use std::path::Path;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response, write_text};
use crate::config::FindConfig;
use crate::executor::MemoryEngine;
use crate::find::FindService;
use crate::observability::{log_event, Event, Logger};
use crate::planner::Dialect;
use crate::request::QueryRequest;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command against stdin and stdout
pub fn run_command(cmd: Command) -> CliResult<()> {
    let mut input = io::stdin().lock();
    let mut output = io::stdout().lock();
    match cmd {
        Command::Find { dataset, config } => find(&dataset, config.as_deref(), &mut input, &mut output),
        Command::Explain {
            dataset,
            config,
            dialect,
            text,
        } => explain(&dataset, config.as_deref(), dialect, text, &mut input, &mut output),
    }
}

/// Executes one find request
///
/// Request errors (malformed request, unknown table, failed query) are
/// written as an error response; only setup and I/O failures return `Err`.
pub fn find<R: Read, W: Write>(
    dataset: &Path,
    config: Option<&Path>,
    input: &mut R,
    output: &mut W,
) -> CliResult<()> {
    let service = load_service(dataset, config)?;

    let request = match QueryRequest::from_json(&read_request(input)?) {
        Ok(request) => request,
        Err(e) => return write_error(output, e.code().code(), e.message()),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::runtime_error(e.to_string()))?;

    match runtime.block_on(service.find(&request)) {
        Ok(result) => write_response(output, &result),
        Err(e) => write_error(output, e.code(), &e.to_string()),
    }
}

/// Explains one find request without executing it
pub fn explain<R: Read, W: Write>(
    dataset: &Path,
    config: Option<&Path>,
    dialect: Dialect,
    text: bool,
    input: &mut R,
    output: &mut W,
) -> CliResult<()> {
    let service = load_service(dataset, config)?;

    let request = match QueryRequest::from_json(&read_request(input)?) {
        Ok(request) => request,
        Err(e) => return write_error(output, e.code().code(), e.message()),
    };

    let plan = service.explain(&request, dialect);
    if text {
        write_text(output, &plan.to_string())
    } else {
        write_response(output, &plan)
    }
}

fn load_service(dataset: &Path, config: Option<&Path>) -> CliResult<FindService> {
    let config = match config {
        Some(path) => {
            let config = FindConfig::load(path)?;
            Logger::set_min_severity(config.log_level);
            log_event(Event::ConfigLoaded, &[("path", path.display().to_string().as_str())]);
            config
        }
        None => FindConfig::default(),
    };

    let engine = MemoryEngine::load(dataset)?.shared();
    let tables = engine.catalog().table_names().count().to_string();
    log_event(
        Event::CatalogLoaded,
        &[
            ("path", dataset.display().to_string().as_str()),
            ("tables", tables.as_str()),
        ],
    );

    Ok(FindService::new(engine.clone(), engine).with_config(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CliErrorCode;
    use serde_json::{json, Value};
    use tempfile::NamedTempFile;

    fn dataset() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        let content = json!({
            "tables": [
                {
                    "name": "user",
                    "primaryKey": "id",
                    "columns": [
                        {"name": "id", "type": "integer"},
                        {"name": "age", "type": "integer"}
                    ],
                    "relations": []
                }
            ],
            "rows": {
                "user": [
                    {"id": 1, "age": 22},
                    {"id": 2, "age": 35},
                    {"id": 3, "age": 41}
                ]
            }
        });
        write!(file, "{}", content).unwrap();
        file
    }

    fn run_find(request: &str) -> Value {
        let dataset = dataset();
        let mut output = Vec::new();
        find(dataset.path(), None, &mut request.as_bytes(), &mut output).unwrap();
        serde_json::from_slice(&output).unwrap()
    }

    #[test]
    fn test_find_writes_result() {
        let response = run_find(r#"{"tableName": "user", "filter": {"age": {"_gt": 30}}, "meta": "filterCount"}"#);
        assert_eq!(response["status"], "ok");
        assert_eq!(response["data"]["data"].as_array().unwrap().len(), 2);
        assert_eq!(response["data"]["meta"]["filterCount"], 2);
    }

    #[test]
    fn test_find_writes_request_errors() {
        let response = run_find(r#"{"tableName": "nope"}"#);
        assert_eq!(response["status"], "error");
        assert_eq!(response["code"], "NOT_FOUND_TABLE");

        let response = run_find(r#"{"tableName": "user", "filter": {"age": {"_like": 1}}}"#);
        assert_eq!(response["code"], "QUERY_UNKNOWN_OPERATOR");
    }

    #[test]
    fn test_explain_json_and_text() {
        let dataset = dataset();
        let request = r#"{"tableName": "user", "sort": "-age"}"#;

        let mut output = Vec::new();
        explain(dataset.path(), None, Dialect::Sqlite, false, &mut request.as_bytes(), &mut output).unwrap();
        let response: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(response["data"]["accepted"], true);
        assert_eq!(response["data"]["dialect"], "sqlite");

        let mut output = Vec::new();
        explain(dataset.path(), None, Dialect::Postgres, true, &mut request.as_bytes(), &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("=== EXPLAIN PLAN ==="));
        assert!(text.contains("Status: ACCEPTED"));
    }

    #[test]
    fn test_setup_errors() {
        let mut output = Vec::new();
        let err = find(
            Path::new("/nonexistent/dataset.json"),
            None,
            &mut "{}".as_bytes(),
            &mut output,
        )
        .unwrap_err();
        assert_eq!(err.code(), CliErrorCode::DatasetError);

        let dataset = dataset();
        let mut config = NamedTempFile::new().unwrap();
        write!(config, r#"{{"max_limit": 0}}"#).unwrap();
        let err = find(dataset.path(), Some(config.path()), &mut "{}".as_bytes(), &mut output).unwrap_err();
        assert_eq!(err.code(), CliErrorCode::ConfigError);
    }
}
