//! # Stream Server
//!
//! TCP 流式追踪协议。
//!
//! 每个连接：
//! 1. 客户端发送握手 (宽、高、每像素字节数、帧率，四个小端 f64)
//! 2. 循环发送原始帧，服务端逐帧回复六个小端 f32
//! 3. 客户端关闭连接后，服务端停止会话并写出结果文件
//!
//! ## 使用示例
//!
//! ```ignore
//! use stream_server::{Handshake, PupilClient};
//!
//! let mut client = PupilClient::connect("127.0.0.1:9876", Handshake::new(640, 480, 3, 30.0)).await?;
//! let reply = client.send_frame(&frame_bytes).await?;
//! client.finish().await?;
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod server;

pub use client::PupilClient;
pub use codec::{Handshake, PupilReply, HANDSHAKE_LEN, MAX_FRAME_BYTES, REPLY_LEN};
pub use error::{ProtocolError, Result};
pub use server::{PupilServer, ServerReport};
