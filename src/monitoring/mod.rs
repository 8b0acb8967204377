/*!
 * 主机资源监控
 *
 * 周期性采样 CPU 使用率，超过阈值时交给告警分发器
 */
pub mod cpu_sampler;

pub use cpu_sampler::{CpuProbe, CpuSamplerLoop, SamplerPhase, SamplerReport, SysinfoProbe};
