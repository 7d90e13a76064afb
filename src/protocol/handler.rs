use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use tracing::Level;

use super::codec::{decode_base64, decode_command, encode, PayloadEncoding};
use super::error::CommandError;
use crate::queue::{FifoQueue, QueueRegistry, DEFAULT_QUEUE, HASH_LEN};

/// A reply to one command, before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok,
    Item(Bytes),
    True,
    False,
    Size(usize),
    Error(String),
    /// Unexpected fault while running a command, sent as a lower-case `error` frame.
    Fault(String),
}

impl Response {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Response::Ok => encode("OK", None, PayloadEncoding::Identity),
            Response::True => encode("TRUE", None, PayloadEncoding::Identity),
            Response::False => encode("FALSE", None, PayloadEncoding::Identity),
            Response::Item(item) => encode("ITEM", Some(item.as_ref()), PayloadEncoding::Base64),
            Response::Size(size) => encode(
                "SIZE",
                Some(size.to_string().as_bytes()),
                PayloadEncoding::Identity,
            ),
            Response::Error(msg) => encode("ERROR", Some(msg.as_bytes()), PayloadEncoding::Base64),
            Response::Fault(msg) => encode("error", Some(msg.as_bytes()), PayloadEncoding::Base64),
        }
    }
}

/// Per-connection protocol state: the queue selected by `USE`.
pub struct Session {
    registry: Arc<QueueRegistry>,
    active_name: String,
    active: Arc<FifoQueue>,
}

impl Session {
    pub fn new(registry: Arc<QueueRegistry>) -> Self {
        let active = registry.get_or_create(DEFAULT_QUEUE);
        Self {
            registry,
            active_name: DEFAULT_QUEUE.to_string(),
            active,
        }
    }

    pub fn active_queue(&self) -> &str {
        &self.active_name
    }

    /// Run one protocol line and produce the reply. Never fails: command
    /// errors and panics both become error frames.
    pub fn handle_line(&mut self, line: &[u8]) -> Response {
        let (command, rest) = decode_command(line);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(&command, rest)));
        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                match e.log_level() {
                    Some(level) if level == Level::ERROR => {
                        tracing::error!(queue = %self.active_name, command = %command, "{}", e)
                    }
                    Some(_) => tracing::warn!(queue = %self.active_name, command = %command, "{}", e),
                    None => tracing::debug!(queue = %self.active_name, command = %command, "{}", e),
                }
                Response::Error(e.to_string())
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                tracing::error!(queue = %self.active_name, command = %command, "command panicked: {}", msg);
                Response::Fault(msg)
            }
        }
    }

    fn dispatch(&mut self, command: &str, rest: Option<&[u8]>) -> Result<Response, CommandError> {
        match command {
            "ENQUE" => self.handle_enque(rest),
            "DEQUE" => self.handle_deque(rest),
            "HAS" => self.handle_has(rest),
            "SIZE" => Ok(self.handle_size()),
            "USE" => self.handle_use(rest),
            #[cfg(test)]
            "CRASH" => panic!("injected fault"),
            _ => Err(CommandError::UnknownCommand(command.to_string())),
        }
    }

    /// ENQUE <base64> - Append to the active queue
    fn handle_enque(&self, rest: Option<&[u8]>) -> Result<Response, CommandError> {
        let item = decode_argument("ENQUE", rest)?;
        self.active.enqueue(item)?;
        Ok(Response::Ok)
    }

    /// DEQUE - Pop the head of the active queue
    fn handle_deque(&self, rest: Option<&[u8]>) -> Result<Response, CommandError> {
        if rest.is_some() {
            return Err(CommandError::UnexpectedArgument);
        }
        let item = self.active.dequeue()?;
        Ok(Response::Item(item))
    }

    /// HAS <base64 sha256> - Membership test by content hash
    fn handle_has(&self, rest: Option<&[u8]>) -> Result<Response, CommandError> {
        let hash = decode_argument("HAS", rest)?;
        if hash.len() != HASH_LEN {
            return Err(CommandError::BadHashLength(hash.len()));
        }
        Ok(if self.active.has(&hash) {
            Response::True
        } else {
            Response::False
        })
    }

    /// SIZE - Length of the active queue
    fn handle_size(&self) -> Response {
        Response::Size(self.active.size())
    }

    /// USE <name> - Switch the active queue, creating it if needed
    fn handle_use(&mut self, rest: Option<&[u8]>) -> Result<Response, CommandError> {
        let raw = rest.ok_or(CommandError::MissingArgument("USE"))?;
        let name = std::str::from_utf8(raw)
            .map_err(|_| CommandError::InvalidQueueName(String::from_utf8_lossy(raw).into_owned()))?
            .trim();

        if name.is_empty() {
            return Err(CommandError::MissingArgument("USE"));
        }
        if name.contains(char::is_whitespace) {
            return Err(CommandError::InvalidQueueName(name.to_string()));
        }

        self.active = self.registry.get_or_create(name);
        self.active_name = name.to_string();
        tracing::debug!(queue = name, "switched active queue");
        Ok(Response::Ok)
    }
}

fn decode_argument(command: &'static str, rest: Option<&[u8]>) -> Result<Vec<u8>, CommandError> {
    let rest = rest.ok_or(CommandError::MissingArgument(command))?;
    decode_base64(rest).map_err(|_| {
        CommandError::BadEncoding(String::from_utf8_lossy(rest.trim_ascii()).into_owned())
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{hash_item, QueueError};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    fn session(allow_duplicates: bool) -> Session {
        Session::new(Arc::new(QueueRegistry::new(allow_duplicates)))
    }

    fn enque_line(data: &[u8]) -> Vec<u8> {
        format!("ENQUE {}", BASE64.encode(data)).into_bytes()
    }

    fn has_line(data: &[u8]) -> Vec<u8> {
        format!("HAS {}", BASE64.encode(hash_item(data))).into_bytes()
    }

    #[test]
    fn hello_scenario() {
        let mut s = session(true);

        assert_eq!(s.handle_line(b"ENQUE aGVsbG8=").encode(), b"OK\n");
        assert_eq!(
            s.handle_line(b"HAS LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ=").encode(),
            b"TRUE\n"
        );
        assert_eq!(s.handle_line(b"DEQUE").encode(), b"ITEM aGVsbG8=\n");
        assert_eq!(s.handle_line(b"DEQUE").encode(), b"ERROR cXVldWUgaXMgZW1wdHk=\n");
    }

    #[test]
    fn size_reports_decimal_length() {
        let mut s = session(false);
        for i in 0..5u8 {
            s.handle_line(&enque_line(&[i]));
        }
        s.handle_line(b"DEQUE");
        s.handle_line(b"DEQUE");

        assert_eq!(s.handle_line(b"SIZE").encode(), b"SIZE 3\n");
    }

    #[test]
    fn duplicate_is_dropped_when_not_allowed() {
        let mut s = session(false);
        assert_eq!(s.handle_line(&enque_line(b"x")), Response::Ok);
        assert_eq!(s.handle_line(&enque_line(b"x")), Response::Ok);

        assert_eq!(s.handle_line(b"SIZE"), Response::Size(1));
        assert_eq!(s.handle_line(&has_line(b"x")), Response::True);
    }

    #[test]
    fn duplicates_coexist_when_allowed() {
        let mut s = session(true);
        s.handle_line(&enque_line(b"x"));
        s.handle_line(&enque_line(b"x"));

        assert_eq!(s.handle_line(b"SIZE"), Response::Size(2));
        assert_eq!(s.handle_line(b"DEQUE"), Response::Item(Bytes::from_static(b"x")));
        assert_eq!(s.handle_line(&has_line(b"x")), Response::True);
        assert_eq!(s.handle_line(b"DEQUE"), Response::Item(Bytes::from_static(b"x")));
        assert_eq!(s.handle_line(&has_line(b"x")), Response::False);
    }

    #[test]
    fn protocol_errors_keep_the_session_usable() {
        let mut s = session(true);

        assert_eq!(
            s.handle_line(b"ENQUE"),
            Response::Error(CommandError::MissingArgument("ENQUE").to_string())
        );
        assert_eq!(
            s.handle_line(b"ENQUE %%%"),
            Response::Error("bad line '%%%'".to_string())
        );
        assert_eq!(
            s.handle_line(b"DEQUE abc"),
            Response::Error(CommandError::UnexpectedArgument.to_string())
        );
        assert_eq!(
            s.handle_line(b"HAS aGk="),
            Response::Error("expected a hash of size 32 got 2".to_string())
        );
        assert_eq!(
            s.handle_line(b"FROB"),
            Response::Error("bad command received, 'FROB'".to_string())
        );

        assert_eq!(s.handle_line(b"ENQUE aGk="), Response::Ok);
        assert_eq!(s.handle_line(b"SIZE"), Response::Size(1));
    }

    #[test]
    fn use_switches_and_isolates_queues() {
        let mut s = session(true);
        assert_eq!(s.active_queue(), DEFAULT_QUEUE);

        assert_eq!(s.handle_line(b"USE jobs"), Response::Ok);
        assert_eq!(s.active_queue(), "jobs");
        s.handle_line(&enque_line(b"a"));

        assert_eq!(s.handle_line(b"USE  other "), Response::Ok);
        assert_eq!(s.active_queue(), "other");
        assert_eq!(s.handle_line(b"SIZE"), Response::Size(0));
        assert_eq!(s.handle_line(&has_line(b"a")), Response::False);

        s.handle_line(b"USE jobs");
        assert_eq!(s.handle_line(b"SIZE"), Response::Size(1));
    }

    #[test]
    fn use_rejects_blank_or_spaced_names() {
        let mut s = session(true);
        assert!(matches!(s.handle_line(b"USE"), Response::Error(_)));
        assert!(matches!(s.handle_line(b"USE    "), Response::Error(_)));
        assert!(matches!(s.handle_line(b"USE a b"), Response::Error(_)));
        assert_eq!(s.active_queue(), DEFAULT_QUEUE);
    }

    #[test]
    fn empty_queue_is_not_an_anomaly() {
        let err = CommandError::from(QueueError::Empty);
        assert_eq!(err.to_string(), "queue is empty");
        assert_eq!(err.log_level(), None);
        assert_eq!(
            CommandError::from(QueueError::Integrity).log_level(),
            Some(Level::ERROR)
        );
        assert_eq!(CommandError::UnexpectedArgument.log_level(), Some(Level::WARN));
    }

    #[test]
    fn panic_in_command_becomes_fault_and_session_survives() {
        let mut s = session(false);
        s.handle_line(b"USE jobs");

        let reply = s.handle_line(b"CRASH");
        assert_eq!(reply, Response::Fault("injected fault".to_string()));
        assert_eq!(reply.encode(), b"error aW5qZWN0ZWQgZmF1bHQ=\n");

        assert_eq!(s.active_queue(), "jobs");
        assert_eq!(s.handle_line(&enque_line(b"after")), Response::Ok);
        assert_eq!(s.handle_line(b"DEQUE"), Response::Item(Bytes::from_static(b"after")));
    }

    #[test]
    fn fault_frame_is_lower_case_error() {
        let frame = Response::Fault("boom".to_string()).encode();
        assert_eq!(frame, b"error Ym9vbQ==\n");
    }
}
