//! Line transport for MCP JSON-RPC over stdio.
//!
//! MCP uses newline-delimited JSON over stdin/stdout. Reading and writing
//! are split so responses can be written from a dedicated task while the
//! reader keeps accepting requests.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::protocol::JsonRpcResponse;

/// Reads one JSON-RPC message per line.
pub struct MessageReader<R> {
    reader: R,
}

impl MessageReader<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Next non-blank line, trimmed. `None` at end of input.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                tracing::debug!("Received: {}", trimmed);
                return Ok(Some(trimmed.to_string()));
            }
        }
    }
}

/// Writes one JSON-RPC response per line, flushing after each.
pub struct MessageWriter<W> {
    writer: W,
}

impl MessageWriter<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let mut json = serde_json::to_string(response).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("Serialization error: {}", e))
        })?;

        tracing::debug!("Sending: {}", json);

        json.push('\n');
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestId;

    #[tokio::test]
    async fn test_read_lines_skips_blanks() {
        let input: &[u8] = b"\n  \n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\r\n\n";
        let mut reader = MessageReader::new(input);

        let line = reader.next_line().await.unwrap().unwrap();
        assert_eq!(line, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        assert!(reader.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_eof() {
        let mut reader = MessageReader::new(&b""[..]);
        assert!(reader.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_last_line_without_newline() {
        let mut reader = MessageReader::new(&b"{\"a\":1}\n{\"b\":2}"[..]);
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some(r#"{"b":2}"#));
        assert!(reader.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_response() {
        let mut writer = MessageWriter::new(Vec::new());

        let first =
            JsonRpcResponse::success(RequestId::Number(1), serde_json::json!({"test": true}));
        let second = JsonRpcResponse::success(RequestId::String("b".into()), serde_json::json!({}));
        writer.write_response(&first).await.unwrap();
        writer.write_response(&second).await.unwrap();

        let output = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"jsonrpc":"2.0","id":1,"result":{"test":true}}"#);
        assert!(lines[1].contains(r#""id":"b""#));
        assert!(output.ends_with('\n'));
    }
}
