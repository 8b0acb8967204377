//! 基础设施层 - 技术实现
//!
//! 提供配置加载等与外部环境打交道的实现

pub mod config;
