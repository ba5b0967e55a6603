// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/config.rs - 流水线参数配置
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
  batch::{BatchError, BatchRunner},
  distortion::{Device, Distortion, DistortionError, create_distortion},
  frame::Layout,
  jpeg::Subsampling,
  quality::{QualityError, QualitySampler, QualitySpec},
};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("batch_size 必须大于 0")]
  ZeroBatchSize,
  #[error("sequence_length 必须大于 0")]
  ZeroSequenceLength,
  #[error("num_threads 必须大于 0")]
  ZeroThreads,
  #[error("质量配置无效: {0}")]
  Quality(#[from] QualityError),
  #[error("读取配置文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("解析配置文件失败: {0}")]
  Json(#[from] serde_json::Error),
  #[error("创建失真算子失败: {0}")]
  Distortion(#[from] DistortionError),
  #[error("创建批次执行器失败: {0}")]
  Batch(#[from] BatchError),
}

/// 流水线配置，可从 JSON 读取
///
/// ```json
/// { "batch_size": 15, "quality": [1, 99], "device": "accelerator",
///   "layout": "sequence", "sequence_length": 10, "seed": 42 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
  pub batch_size: usize,
  pub quality: QualitySpec,
  pub device: Device,
  pub layout: Layout,
  /// 序列布局下首帧之后追加的帧数
  pub sequence_length: usize,
  pub num_threads: usize,
  pub seed: u64,
  pub subsampling: Subsampling,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      batch_size: 1,
      quality: QualitySpec::default(),
      device: Device::Host,
      layout: Layout::SingleImage,
      sequence_length: 10,
      num_threads: 3,
      seed: 0,
      subsampling: Subsampling::Yuv444,
    }
  }
}

impl PipelineConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.batch_size == 0 {
      return Err(ConfigError::ZeroBatchSize);
    }
    if self.layout == Layout::Sequence && self.sequence_length == 0 {
      return Err(ConfigError::ZeroSequenceLength);
    }
    if self.num_threads == 0 {
      return Err(ConfigError::ZeroThreads);
    }
    self.quality.validate()?;
    Ok(())
  }

  pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
    let config: Self = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    info!("读取配置文件: {}", path.as_ref().display());
    Self::from_json_str(&content)
  }

  /// 每个样本包含的帧数
  pub fn frames_per_sample(&self) -> usize {
    match self.layout {
      Layout::SingleImage => 1,
      Layout::Sequence => self.sequence_length + 1,
    }
  }

  pub fn quality_sampler(&self) -> Result<QualitySampler, ConfigError> {
    Ok(QualitySampler::new(self.quality, self.seed, self.batch_size)?)
  }

  pub fn distortion(&self) -> Result<Box<dyn Distortion>, ConfigError> {
    Ok(create_distortion(self.device, self.subsampling)?)
  }

  pub fn batch_runner(&self) -> Result<BatchRunner<Box<dyn Distortion>>, ConfigError> {
    Ok(BatchRunner::with_threads(
      self.distortion()?,
      self.num_threads,
    )?)
  }
}

/// 命令行中的流水线参数，可以先读取配置文件再逐项覆盖
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PipelineArgs {
  /// JSON 配置文件路径
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 批次大小
  #[arg(long, value_name = "N")]
  pub batch_size: Option<usize>,

  /// 质量：固定值如 `50`，或区间如 `1,99`
  #[arg(long, value_name = "QUALITY")]
  pub quality: Option<QualitySpec>,

  /// 执行设备
  #[arg(long, value_enum)]
  pub device: Option<Device>,

  /// 数据布局
  #[arg(long, value_enum)]
  pub layout: Option<Layout>,

  /// 序列布局下首帧之后追加的帧数
  #[arg(long, value_name = "N")]
  pub sequence_length: Option<usize>,

  /// 线程数
  #[arg(long, value_name = "N")]
  pub num_threads: Option<usize>,

  /// 随机种子
  #[arg(long, value_name = "SEED")]
  pub seed: Option<u64>,

  /// 色度采样方式
  #[arg(long, value_enum)]
  pub subsampling: Option<Subsampling>,
}

impl PipelineArgs {
  pub fn into_config(self) -> Result<PipelineConfig, ConfigError> {
    let mut config = match &self.config {
      Some(path) => PipelineConfig::from_json_file(path)?,
      None => PipelineConfig::default(),
    };

    if let Some(v) = self.batch_size {
      config.batch_size = v;
    }
    if let Some(v) = self.quality {
      config.quality = v;
    }
    if let Some(v) = self.device {
      config.device = v;
    }
    if let Some(v) = self.layout {
      config.layout = v;
    }
    if let Some(v) = self.sequence_length {
      config.sequence_length = v;
    }
    if let Some(v) = self.num_threads {
      config.num_threads = v;
    }
    if let Some(v) = self.seed {
      config.seed = v;
    }
    if let Some(v) = self.subsampling {
      config.subsampling = v;
    }

    config.validate()?;
    Ok(config)
  }
}
