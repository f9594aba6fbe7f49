//! PupilClient - streams frames to a [`PupilServer`](crate::PupilServer)

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::codec::{Handshake, PupilReply, REPLY_LEN};
use crate::error::{ProtocolError, Result};

pub struct PupilClient {
    stream: TcpStream,
    handshake: Handshake,
    frames_sent: u64,
}

impl PupilClient {
    /// Connect and send the handshake
    pub async fn connect(addr: impl ToSocketAddrs, handshake: Handshake) -> Result<Self> {
        let mut stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        stream.write_all(&handshake.encode()).await?;
        debug!(?handshake, "Handshake sent");
        Ok(Self {
            stream,
            handshake,
            frames_sent: 0,
        })
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Send one raw frame and wait for its reply
    ///
    /// # Errors
    /// `FrameSize` when `frame` does not match the handshake, `Io` when the
    /// server closed the connection.
    pub async fn send_frame(&mut self, frame: &[u8]) -> Result<PupilReply> {
        let expected = self.handshake.frame_len();
        if frame.len() != expected {
            return Err(ProtocolError::FrameSize {
                expected,
                actual: frame.len(),
            });
        }

        self.stream.write_all(frame).await?;
        let mut raw = [0u8; REPLY_LEN];
        self.stream.read_exact(&mut raw).await?;
        self.frames_sent += 1;
        Ok(PupilReply::decode(&raw))
    }

    /// Close the sending side and wait until the server ends the session
    pub async fn finish(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        let mut rest = Vec::new();
        self.stream.read_to_end(&mut rest).await?;
        debug!(frames = self.frames_sent, "Session finished");
        Ok(())
    }
}
