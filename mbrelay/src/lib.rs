//! Modbus TCP relay
//!
//! Keeps two independent Modbus TCP links open, periodically issues a fixed
//! Read Input Registers request on the source link and relays the raw
//! response onto the target link.
//!
//! # Architecture
//!
//! - [`endpoint`]: one link's connection lifecycle (lazy reconnect, stale byte flush, reset)
//! - [`frame_reader`]: bounded, incremental response collection
//! - [`bridge`]: one request/response/forward cycle
//! - [`scheduler`]: fixed-interval cycles with cooperative cancellation
//! - [`config`]: endpoint addresses, request parameters and timing
//! - [`statistics`]: relay counters
//!
//! # TODO
//!
//! ## 链路管理
//! - [x] 非阻塞连接与惰性重连
//! - [x] 连接后丢弃残留数据
//! - [x] 故障时复位链路
//!
//! ## 帧处理
//! - [x] 有界增量读取
//! - [x] 异常响应识别（不转发）
//! - [ ] 校验响应事务ID与单元ID

pub mod bridge;
pub mod config;
pub mod endpoint;
pub mod frame_reader;
pub mod scheduler;
pub mod statistics;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{CycleStatus, ProtocolBridge};
pub use config::{RelayConfig, RelayConfigBuilder, RelayTiming};
pub use endpoint::{Endpoint, EndpointState, LinkRole, LinkStatus};
pub use frame_reader::{FrameOutcome, FrameReader};
pub use scheduler::Scheduler;
pub use statistics::RelayStatistics;
