//! JSON I/O handling for CLI
//!
//! - Input: single JSON object via stdin
//! - Output: single JSON object via stdout

use std::io::{self, Read, Write};

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// Read a JSON request from stdin
///
/// The request may span several lines.
pub fn read_request() -> CliResult<Value> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;
    parse_request(&input)
}

fn parse_request(input: &str) -> CliResult<Value> {
    if input.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }
    Ok(serde_json::from_str(input)?)
}

fn success(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

fn failure(code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

fn emit(response: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, response)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    emit(&success(data))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    emit(&failure(code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let value = parse_request("{\n  \"op\": \"select\",\n  \"table\": \"todos\"\n}").unwrap();
        assert_eq!(value["op"], "select");
        assert!(parse_request("  \n").is_err());
        assert!(parse_request("{nope").is_err());
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(
            success(json!([1])),
            json!({"status": "ok", "data": [1]})
        );
        assert_eq!(
            failure("TABLEGATE_INVALID_OPERATOR", "bad"),
            json!({"status": "error", "code": "TABLEGATE_INVALID_OPERATOR", "message": "bad"})
        );
    }
}
