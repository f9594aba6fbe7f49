//! PupilServer - one tracking session per TCP connection

use std::future::Future;
use std::net::SocketAddr;

use contracts::{Frame, PixelBuffer, TrackerConfig};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, instrument, warn, Instrument};
use tracker::{PupilTracker, SessionSummary};

use crate::codec::{Handshake, PupilReply, HANDSHAKE_LEN};
use crate::error::{ProtocolError, Result};

/// Totals reported when the server stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerReport {
    pub sessions: u64,
    pub failed: u64,
}

/// TCP front end for [`PupilTracker`]
pub struct PupilServer {
    listener: TcpListener,
    config: TrackerConfig,
}

impl PupilServer {
    /// Bind `config.server.bind`
    #[instrument(name = "server_bind", skip(config), fields(bind = %config.server.bind))]
    pub async fn bind(config: TrackerConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.server.bind).await?;
        info!(addr = %listener.local_addr()?, "Listening for connections");
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// Open sessions are told to stop and still write their outputs before
    /// this returns.
    pub async fn run<F>(self, shutdown: F) -> ServerReport
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut sessions = JoinSet::new();
        let mut report = ServerReport::default();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(open_sessions = sessions.len(), "Shutdown requested");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        report.sessions += 1;
                        let id = report.sessions;
                        let config = session_config(&self.config, id);
                        let span = info_span!("session", id, peer = %peer);
                        sessions.spawn(serve_connection(stream, config, stop_rx.clone()).instrument(span));
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    report.failed += u64::from(!session_finished(joined));
                }
            }
        }

        let _ = stop_tx.send(true);
        while let Some(joined) = sessions.join_next().await {
            report.failed += u64::from(!session_finished(joined));
        }
        info!(sessions = report.sessions, failed = report.failed, "Server stopped");
        report
    }
}

fn session_finished(
    joined: std::result::Result<Result<SessionSummary>, tokio::task::JoinError>,
) -> bool {
    match joined {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "Session ended with error");
            false
        }
        Err(e) => {
            warn!(error = %e, "Session task failed");
            false
        }
    }
}

fn session_config(base: &TrackerConfig, id: u64) -> TrackerConfig {
    let mut config = base.clone();
    config.output.base_name = format!("session_{id}");
    if !config.server.write_outputs {
        config.output.csv = false;
        config.output.stream = false;
        config.output.log = false;
    }
    config
}

async fn serve_connection(
    mut stream: TcpStream,
    mut config: TrackerConfig,
    mut stop: watch::Receiver<bool>,
) -> Result<SessionSummary> {
    stream.set_nodelay(true)?;

    let mut raw = [0u8; HANDSHAKE_LEN];
    stream
        .read_exact(&mut raw)
        .await
        .map_err(|e| ProtocolError::handshake(format!("read failed: {e}")))?;
    let handshake = Handshake::decode(&raw, config.server.max_frame_bytes)?;
    info!(
        width = handshake.width,
        height = handshake.height,
        bytes_per_pixel = handshake.bytes_per_pixel,
        fps = handshake.fps,
        "Connection accepted"
    );

    config.output.fps = handshake.fps;
    let landmarks = detectors::landmark_detector_from_config(&config.landmarks)?;
    let (left, right) = detectors::pupil_detector_pair();
    let mut tracker =
        PupilTracker::new(config, landmarks, left, right, handshake.width, handshake.height);
    tracker.init().await?;

    let streamed = stream_frames(&mut stream, &mut tracker, &handshake, &mut stop).await;
    let summary = tracker.stop().await;
    debug!(frames = summary.frames, "Session resources released");

    streamed.map(|()| summary)
}

async fn stream_frames(
    stream: &mut TcpStream,
    tracker: &mut PupilTracker,
    handshake: &Handshake,
    stop: &mut watch::Receiver<bool>,
) -> Result<()> {
    let frame_len = handshake.frame_len();
    let Some(format) = handshake.pixel_format() else {
        return Err(ProtocolError::handshake("unsupported pixel format"));
    };

    let mut index = 0u64;
    loop {
        let read = tokio::select! {
            read = read_frame(stream, frame_len) => read,
            _ = stop.changed() => {
                info!(frames = index, "Server shutting down, ending session");
                return Ok(());
            }
        };

        let data = match read {
            Ok(Some(data)) => data,
            Ok(None) => {
                info!(frames = index, "Connection closed by client");
                return Ok(());
            }
            Err(e @ ProtocolError::Truncated { .. }) => {
                warn!(frame_index = index, error = %e, "Truncated frame, ending session");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let pixels = PixelBuffer::new(handshake.width, handshake.height, format, data)?;
        let tracked = tracker.process(&Frame::new(index, pixels)).await?;

        if let Err(e) = stream.write_all(&PupilReply::from(tracked).encode()).await {
            info!(frame_index = index, error = %e, "Client went away");
            return Ok(());
        }
        debug!(frame_index = index, "Reply sent");
        index += 1;
    }
}

/// Read exactly one frame
///
/// `Ok(None)` on a clean end of stream at a frame boundary.
async fn read_frame<R>(reader: &mut R, len: usize) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(ProtocolError::Truncated {
                    expected: len,
                    received: filled,
                })
            };
        }
        filled += n;
    }
    Ok(Some(buf))
}
