//! stdout JSON reporting for one-shot subcommands.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;

use super::errors::CliResult;

pub fn write_response<T: Serialize>(data: &T) -> CliResult<()> {
    let response = serde_json::json!({ "status": "ok", "data": data });
    write_json(&response)
}

fn write_json(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
