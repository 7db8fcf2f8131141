//! # Clinicq Core
//!
//! 排队系统的核心模块，提供基础数据结构、错误定义和时间工具。

pub mod error;
pub mod models;
pub mod utils;

pub use error::{QueueError, Result};
pub use models::*;
pub use utils::{Clock, FixedClock, SystemClock};
