//! In-memory transport driven by a test script

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use super::{MessageKind, Transport};
use crate::error::{FeedError, Result};

/// Transport whose inbound messages are pushed by the test
///
/// Reads wait for the next scripted item and only fail once the transport
/// is closed. Writes are recorded as text.
pub(crate) struct ScriptedTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<Result<Vec<u8>>>>,
    writes: StdMutex<Vec<String>>,
    opened: AtomicBool,
    closed: CancellationToken,
}

/// Handle used by the test to feed the transport
#[derive(Clone)]
pub(crate) struct Script {
    tx: mpsc::UnboundedSender<Result<Vec<u8>>>,
}

impl Script {
    pub fn push(&self, raw: &str) -> &Self {
        let _ = self.tx.send(Ok(raw.as_bytes().to_vec()));
        self
    }

    pub fn fail(&self, err: FeedError) -> &Self {
        let _ = self.tx.send(Err(err));
        self
    }
}

impl ScriptedTransport {
    pub fn new() -> (Self, Script) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            inbound: Mutex::new(rx),
            writes: StdMutex::new(Vec::new()),
            opened: AtomicBool::new(false),
            closed: CancellationToken::new(),
        };
        (transport, Script { tx })
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn check_open(&self) -> Result<()> {
        if !self.opened.load(Ordering::Acquire) || self.closed.is_cancelled() {
            return Err(FeedError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, _endpoint: &str) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(FeedError::Closed);
        }
        self.opened.store(true, Ordering::Release);
        Ok(())
    }

    async fn read_message(&self) -> Result<Vec<u8>> {
        self.check_open()?;
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            _ = self.closed.cancelled() => Err(FeedError::Closed),
            item = inbound.recv() => match item {
                Some(item) => item,
                None => {
                    self.closed.cancelled().await;
                    Err(FeedError::Closed)
                }
            },
        }
    }

    async fn write_message(&self, kind: MessageKind, payload: &[u8]) -> Result<()> {
        self.check_open()?;
        assert_eq!(kind, MessageKind::Text);
        self.writes
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(payload).into_owned());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.check_open()?;
        self.closed.cancel();
        Ok(())
    }
}
