//! Handlers 模块

pub mod assets;
pub mod live;
pub mod metrics;

pub use assets::*;
pub use live::*;
pub use metrics::*;
