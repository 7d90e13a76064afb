use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::codec::{decode_base64, decode_command, encode_base64, encode_plain};
use super::error::ClientError;
use crate::queue::{hash_item, QueueError};

/// Async client for a queued server. Requests are strictly one at a time.
pub struct QueueClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    line: Vec<u8>,
}

impl QueueClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect { addr, source })?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            line: Vec::with_capacity(256),
        })
    }

    pub async fn enqueue(&mut self, item: &[u8]) -> Result<(), ClientError> {
        let (cmd, _) = self.request(&encode_base64("ENQUE", item)).await?;
        expect(&cmd, "OK")
    }

    /// Pop the head of the active queue, `None` when it is empty.
    pub async fn dequeue(&mut self) -> Result<Option<Vec<u8>>, ClientError> {
        match self.request(&encode_plain("DEQUE", None)).await {
            Ok((cmd, payload)) => {
                expect(&cmd, "ITEM")?;
                Ok(Some(payload.unwrap_or_default()))
            }
            Err(ClientError::Server(msg)) if msg == QueueError::Empty.to_string() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether an item with this content is currently queued.
    pub async fn has(&mut self, item: &[u8]) -> Result<bool, ClientError> {
        self.has_hash(&hash_item(item)).await
    }

    pub async fn has_hash(&mut self, hash: &[u8]) -> Result<bool, ClientError> {
        let (cmd, _) = self.request(&encode_base64("HAS", hash)).await?;
        match cmd.as_str() {
            "TRUE" => Ok(true),
            "FALSE" => Ok(false),
            _ => Err(ClientError::UnexpectedResponse(cmd)),
        }
    }

    pub async fn size(&mut self) -> Result<usize, ClientError> {
        let raw = self.send_line(&encode_plain("SIZE", None)).await?;
        parse_size_reply(&raw)
    }

    /// Switch this connection to another named queue.
    pub async fn use_queue(&mut self, name: &str) -> Result<(), ClientError> {
        let (cmd, _) = self
            .request(&encode_plain("USE", Some(name.as_bytes())))
            .await?;
        expect(&cmd, "OK")
    }

    /// Send a frame and decode the reply, turning `ERROR` into an error.
    /// Payloads are assumed to be base64.
    async fn request(&mut self, frame: &[u8]) -> Result<(String, Option<Vec<u8>>), ClientError> {
        let raw = self.send_line(frame).await?;
        let (cmd, rest) = decode_command(&raw);
        if is_error_token(&cmd) {
            return Err(server_error(rest)?);
        }
        let payload = rest.map(decode_base64).transpose()?;
        Ok((cmd, payload))
    }

    async fn send_line(&mut self, frame: &[u8]) -> Result<Vec<u8>, ClientError> {
        self.writer.write_all(frame).await?;

        self.line.clear();
        let n = self.reader.read_until(b'\n', &mut self.line).await?;
        if n == 0 {
            return Err(ClientError::Closed);
        }
        if self.line.last() == Some(&b'\n') {
            self.line.pop();
        }
        Ok(self.line.clone())
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// `ERROR` for command errors, `error` for faults while running a command.
fn is_error_token(cmd: &str) -> bool {
    cmd == "ERROR" || cmd == "error"
}

/// SIZE replies carry plain decimal text rather than base64.
fn parse_size_reply(raw: &[u8]) -> Result<usize, ClientError> {
    let (cmd, rest) = decode_command(raw);
    if is_error_token(&cmd) {
        return Err(server_error(rest)?);
    }
    expect(&cmd, "SIZE")?;
    std::str::from_utf8(rest.unwrap_or_default())
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| ClientError::UnexpectedResponse(String::from_utf8_lossy(raw).into_owned()))
}

fn expect(cmd: &str, wanted: &str) -> Result<(), ClientError> {
    if cmd == wanted {
        Ok(())
    } else {
        Err(ClientError::UnexpectedResponse(cmd.to_string()))
    }
}

fn server_error(rest: Option<&[u8]>) -> Result<ClientError, ClientError> {
    let msg = rest.map(decode_base64).transpose()?.unwrap_or_default();
    Ok(ClientError::Server(String::from_utf8_lossy(&msg).into_owned()))
}
