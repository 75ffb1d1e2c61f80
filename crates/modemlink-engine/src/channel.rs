//! Cloneable command handle over the IO task.

use async_trait::async_trait;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use modemlink_core::command::{CommandResponse, CommandRunner};
use modemlink_core::error::{Error, Result};

use crate::io::Request;

/// A cloneable handle for executing AT commands on the session's IO task.
///
/// All clones feed the same request queue, so commands from any number of
/// callers are executed one at a time in arrival order.
#[derive(Clone)]
pub struct CommandChannel {
    tx: mpsc::Sender<Request>,
}

impl CommandChannel {
    pub(crate) fn new(tx: mpsc::Sender<Request>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl CommandRunner for CommandChannel {
    async fn execute(&self, line: &str, timeout: Duration) -> Result<CommandResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Execute {
                line: line.to_string(),
                timeout,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;

        // No clock here: the IO task enforces the deadline once it
        // dequeues the request and always replies (or drops the sender on
        // teardown, waking this wait). A request queued behind a slow
        // command must not be reported as timed out while it is still
        // going to reach the wire.
        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::NotConnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_not_connected_when_io_task_gone() {
        let (tx, rx) = mpsc::channel(32);
        drop(rx);

        let channel = CommandChannel::new(tx);
        let result = channel.execute("AT", Duration::from_millis(100)).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }
}
