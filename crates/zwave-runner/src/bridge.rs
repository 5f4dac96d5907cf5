//! Serial Bridge Module
//!
//! Connects a [`Controller`] to a byte stream. The stick is usually reached
//! through a serial-to-TCP forwarder (ser2net, socat), but any
//! `AsyncRead + AsyncWrite` stream works.
//!
//! The loop multiplexes three sources with `tokio::select!`:
//!
//! - bytes read from the stream are fed to [`Controller::receive`]
//! - a periodic tick calls [`Controller::poll`] so timeouts fire while the
//!   stick is silent
//! - a shutdown signal ends the loop
//!
//! After every wakeup the controller's outbound bytes are written and
//! flushed.

use crate::error::RunnerResult;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};
use zwave_controller::Controller;

/// Default interval between [`Controller::poll`] calls.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Why [`SerialBridge::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeExit {
    /// The peer closed the stream.
    Disconnected,
    /// The shutdown signal fired or its sender was dropped.
    Shutdown,
}

/// Owns a controller and pumps bytes between it and a stream.
pub struct SerialBridge {
    controller: Controller,
    tick: Duration,
}

impl SerialBridge {
    pub fn new(controller: Controller, tick: Duration) -> Self {
        SerialBridge { controller, tick }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    /// Give the controller back.
    pub fn into_controller(self) -> Controller {
        self.controller
    }

    /// Open a TCP connection to a serial forwarder.
    pub async fn connect(addr: &str) -> RunnerResult<TcpStream> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", addr);
        Ok(stream)
    }

    /// Run until the stream closes or `shutdown` fires.
    pub async fn run<S>(&mut self, stream: S, mut shutdown: oneshot::Receiver<()>) -> RunnerResult<BridgeExit>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut read_buf = [0u8; 1024];
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = reader.read(&mut read_buf) => {
                    let n = result?;
                    if n == 0 {
                        info!("Stick connection closed");
                        return Ok(BridgeExit::Disconnected);
                    }
                    trace!("RX {}", hex::encode(&read_buf[..n]));
                    self.controller.receive(&read_buf[..n], Instant::now());
                }

                _ = ticker.tick() => {
                    self.controller.poll(Instant::now());
                }

                _ = &mut shutdown => {
                    debug!("Bridge shutting down");
                    return Ok(BridgeExit::Shutdown);
                }
            }

            let outbound = self.controller.take_outbound();
            if !outbound.is_empty() {
                trace!("TX {}", hex::encode(&outbound));
                writer.write_all(&outbound).await?;
                writer.flush().await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zwave_controller::ControllerConfig;

    #[tokio::test]
    async fn test_shutdown_before_any_traffic() {
        let (ours, _theirs) = tokio::io::duplex(64);
        let (tx, rx) = oneshot::channel();
        tx.send(()).expect("receiver should be alive");

        let mut bridge = SerialBridge::new(Controller::new(ControllerConfig::default()), DEFAULT_TICK);
        let exit = bridge.run(ours, rx).await.expect("should exit cleanly");

        assert_eq!(exit, BridgeExit::Shutdown);
    }

    #[tokio::test]
    async fn test_peer_close_ends_run() {
        let (ours, theirs) = tokio::io::duplex(64);
        drop(theirs);
        let (_tx, rx) = oneshot::channel();

        let mut bridge = SerialBridge::new(Controller::new(ControllerConfig::default()), DEFAULT_TICK);
        let exit = bridge.run(ours, rx).await.expect("should exit cleanly");

        assert_eq!(exit, BridgeExit::Disconnected);
    }
}
