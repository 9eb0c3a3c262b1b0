//! JSON I/O handling for CLI
//!
//! - Input: single JSON object via stdin
//! - Output: single JSON object via stdout
//! - UTF-8 only

use std::io::{Read, Write};

use serde::Serialize;
use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read one JSON request; it may span several lines
pub fn read_request<R: Read>(input: &mut R) -> CliResult<Value> {
    let mut content = String::new();
    input.read_to_string(&mut content)?;

    if content.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }

    let value: Value = serde_json::from_str(&content)?;
    Ok(value)
}

/// Write a success response
pub fn write_response<W: Write, T: Serialize>(output: &mut W, data: &T) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    serde_json::to_writer(&mut *output, &response)?;
    writeln!(output)?;
    output.flush()?;

    Ok(())
}

/// Write an error response
pub fn write_error<W: Write>(output: &mut W, code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });

    serde_json::to_writer(&mut *output, &response)?;
    writeln!(output)?;
    output.flush()?;

    Ok(())
}

/// Write plain text
pub fn write_text<W: Write>(output: &mut W, text: &str) -> CliResult<()> {
    output.write_all(text.as_bytes())?;
    output.flush()?;
    Ok(())
}
