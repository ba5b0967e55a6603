// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/reference.rs - 参考编解码器对照
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

//! 用 `image` crate 的基线 JPEG 编解码器真实地编码再解码一次，
//! 作为失真算子的对照。

use std::sync::Mutex;

use image::{ExtendedColorType, ImageFormat, codecs::jpeg::JpegEncoder};
use thiserror::Error;
use tracing::{error, info};

use crate::{
  frame::{FrameError, RgbHwcImage},
  jpeg::Subsampling,
  output::Render,
  pipeline::PipelineOutput,
  quality::Quality,
};

#[cfg(feature = "save_image_file")]
use crate::output::{DirectoryRecordOutput, DirectoryRecordOutputError};

/// 与参考结果的平均绝对误差上限
pub const DEFAULT_THRESHOLD: f64 = 5.0;

/// 参考编码器使用的色度采样方式，`image` 的 JPEG 编码器不做色度下采样
pub const REFERENCE_SUBSAMPLING: Subsampling = Subsampling::Yuv444;

#[derive(Error, Debug)]
pub enum ReferenceError {
  #[error("参考编解码失败: {0}")]
  Codec(#[from] image::ImageError),
  #[error("参考结果无效: {0}")]
  Frame(#[from] FrameError),
  #[error("参考编码器只支持 4:4:4 色度采样，无法对照 {0:?}")]
  UnsupportedSubsampling(Subsampling),
  #[error("尺寸不一致: {left:?} 与 {right:?}")]
  ShapeMismatch {
    left: (usize, usize, usize),
    right: (usize, usize, usize),
  },
  #[error("样本 {sample} 第 {frame} 帧 (q = {quality}) 与参考结果差异过大: {diff:.3}")]
  TooDifferent {
    sample: usize,
    frame: usize,
    quality: Quality,
    diff: f64,
  },
  #[cfg(feature = "save_image_file")]
  #[error("保存对照图像失败: {0}")]
  Dump(#[from] DirectoryRecordOutputError),
}

/// 用参考编解码器以给定质量编码再解码
pub fn reference_distort(
  image: &RgbHwcImage,
  quality: Quality,
) -> Result<RgbHwcImage, ReferenceError> {
  image.validate()?;
  let mut encoded = Vec::new();
  JpegEncoder::new_with_quality(&mut encoded, quality.value()).encode(
    image.as_hwc(),
    image.width() as u32,
    image.height() as u32,
    ExtendedColorType::Rgb8,
  )?;
  let decoded = image::load_from_memory_with_format(&encoded, ImageFormat::Jpeg)?;
  Ok(RgbHwcImage::from(decoded.into_rgb8()))
}

/// 两张图像逐采样的平均绝对误差
pub fn mean_abs_diff(left: &RgbHwcImage, right: &RgbHwcImage) -> Result<f64, ReferenceError> {
  if left.shape() != right.shape() {
    return Err(ReferenceError::ShapeMismatch {
      left: left.shape(),
      right: right.shape(),
    });
  }
  let total: u64 = left
    .as_hwc()
    .iter()
    .zip(right.as_hwc())
    .map(|(&a, &b)| a.abs_diff(b) as u64)
    .sum();
  Ok(total as f64 / left.as_hwc().len() as f64)
}

/// 对照统计
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComparisonStats {
  pub frames: usize,
  pub failures: usize,
  pub max_diff: f64,
  pub sum_diff: f64,
}

impl ComparisonStats {
  pub fn mean_diff(&self) -> f64 {
    if self.frames == 0 {
      0.0
    } else {
      self.sum_diff / self.frames as f64
    }
  }
}

/// 把每次运行的每一帧与参考结果比较
///
/// 差异超过阈值的帧可以连同参考结果一起保存到目录中，便于排查。
pub struct ReferenceCheck {
  threshold: f64,
  stats: Mutex<ComparisonStats>,
  #[cfg(feature = "save_image_file")]
  dump_broken: Option<DirectoryRecordOutput>,
}

impl Default for ReferenceCheck {
  fn default() -> Self {
    Self::with_threshold(DEFAULT_THRESHOLD)
  }
}

impl ReferenceCheck {
  /// 算子的色度采样方式必须与参考编码器相同
  pub fn new(threshold: f64, subsampling: Subsampling) -> Result<Self, ReferenceError> {
    if subsampling != REFERENCE_SUBSAMPLING {
      return Err(ReferenceError::UnsupportedSubsampling(subsampling));
    }
    Ok(Self::with_threshold(threshold))
  }

  fn with_threshold(threshold: f64) -> Self {
    Self {
      threshold,
      stats: Mutex::new(ComparisonStats::default()),
      #[cfg(feature = "save_image_file")]
      dump_broken: None,
    }
  }

  #[cfg(feature = "save_image_file")]
  pub fn with_dump(mut self, dump: Option<DirectoryRecordOutput>) -> Self {
    self.dump_broken = dump;
    self
  }

  pub fn threshold(&self) -> f64 {
    self.threshold
  }

  pub fn stats(&self) -> ComparisonStats {
    match self.stats.lock() {
      Ok(stats) => *stats,
      Err(poisoned) => *poisoned.into_inner(),
    }
  }

  fn record(&self, diff: f64, failed: bool) {
    let mut stats = match self.stats.lock() {
      Ok(stats) => stats,
      Err(poisoned) => poisoned.into_inner(),
    };
    stats.frames += 1;
    stats.sum_diff += diff;
    stats.max_diff = stats.max_diff.max(diff);
    if failed {
      stats.failures += 1;
    }
  }

  #[cfg(feature = "save_image_file")]
  fn dump(
    &self,
    sample: usize,
    frame: usize,
    quality: Quality,
    reference: &RgbHwcImage,
    output: &RgbHwcImage,
  ) -> Result<(), ReferenceError> {
    if let Some(dump) = &self.dump_broken {
      dump.save_named(
        &format!("reference_q{}_sample{}_{}.png", quality, sample, frame),
        reference,
      )?;
      dump.save_named(
        &format!("output_q{}_sample{}_{}.png", quality, sample, frame),
        output,
      )?;
    }
    Ok(())
  }
}

impl Render<PipelineOutput> for ReferenceCheck {
  type Error = ReferenceError;

  /// 比较所有帧，返回第一个超过阈值的帧
  fn render_result(&self, result: &PipelineOutput) -> Result<(), Self::Error> {
    let mut first_failure = None;
    for (sample, frame, input, output, quality) in result.frames() {
      let reference = reference_distort(input, quality)?;
      let diff = mean_abs_diff(output, &reference)?;
      let failed = diff >= self.threshold;
      self.record(diff, failed);
      if !failed {
        continue;
      }

      error!(
        "样本 {} 第 {} 帧 (q = {}) 平均绝对误差 {:.3} 超过阈值 {}",
        sample, frame, quality, diff, self.threshold
      );
      #[cfg(feature = "save_image_file")]
      self.dump(sample, frame, quality, &reference, output)?;
      if first_failure.is_none() {
        first_failure = Some(ReferenceError::TooDifferent {
          sample,
          frame,
          quality,
          diff,
        });
      }
    }

    let stats = self.stats();
    info!(
      "对照: 共 {} 帧, 平均误差 {:.3}, 最大误差 {:.3}",
      stats.frames,
      stats.mean_diff(),
      stats.max_diff
    );
    match first_failure {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }
}
