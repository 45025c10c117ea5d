//! The `holdtotalkctl` side: a short-lived blocking client, one request
//! per process invocation.

use std::io::{BufRead, BufReader, Write};

use interprocess::local_socket::{GenericNamespaced, Stream, ToNsName};

use super::protocol::{Command, Response};
use crate::error::{PipelineError, Result};

pub fn send_command(socket_name: &str, command: Command) -> Result<Response> {
    let name = socket_name
        .to_ns_name::<GenericNamespaced>()
        .map_err(|e| PipelineError::Stream(e.to_string()))?;

    let mut stream = Stream::connect(name).map_err(|e| PipelineError::Stream(e.to_string()))?;

    let mut payload = serde_json::to_string(&command)?;
    payload.push('\n');
    stream.write_all(payload.as_bytes())?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line)?;

    if line.trim().is_empty() {
        return Err(PipelineError::Stream("daemon closed connection without replying".to_string()));
    }

    let response: Response = serde_json::from_str(line.trim())?;
    Ok(response)
}
