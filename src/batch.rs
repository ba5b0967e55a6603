// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/batch.rs - 批次执行
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

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  distortion::{Distortion, DistortionError},
  frame::{RgbHwcImage, Sample},
  quality::Quality,
};

/// 批次中的一个元素：样本与它的质量
pub type BatchElement = (Sample, Quality);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
  /// 任一元素失败时整个批次失败，报告序号最小的失败元素
  #[error("批次第 {index} 个元素处理失败: {source}")]
  Element {
    index: usize,
    #[source]
    source: DistortionError,
  },
  #[error("线程池创建失败: {0}")]
  ThreadPool(String),
  #[error("质量数量与样本数量不一致: 期望 {expected}, 实际 {actual}")]
  QualityCount { expected: usize, actual: usize },
}

/// 在线程池上并行执行一个批次
///
/// 每张图像、每个序列的每一帧都是独立任务；序列的所有帧使用同一个质量。
pub struct BatchRunner<D> {
  op: D,
  pool: rayon::ThreadPool,
}

impl<D: Distortion> BatchRunner<D> {
  /// 线程数由 rayon 决定（通常为 CPU 核数）
  pub fn new(op: D) -> Result<Self, BatchError> {
    Self::with_threads(op, 0)
  }

  /// `num_threads` 为 0 时使用 rayon 的默认值
  pub fn with_threads(op: D, num_threads: usize) -> Result<Self, BatchError> {
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(num_threads)
      .thread_name(|i| format!("zhuomo-batch-{}", i))
      .build()
      .map_err(|e| BatchError::ThreadPool(e.to_string()))?;
    debug!(
      "批次执行器: 设备 {}, 线程数 {}",
      op.device(),
      pool.current_num_threads()
    );
    Ok(Self { op, pool })
  }

  pub fn operator(&self) -> &D {
    &self.op
  }

  pub fn num_threads(&self) -> usize {
    self.pool.current_num_threads()
  }

  /// 按输入顺序返回每个元素的失真结果
  pub fn run_batch(&self, batch: &[BatchElement]) -> Result<Vec<Sample>, BatchError> {
    let jobs: Vec<(usize, &RgbHwcImage, Quality)> = batch
      .iter()
      .enumerate()
      .flat_map(|(index, (sample, quality))| {
        sample
          .frames()
          .iter()
          .map(move |frame| (index, frame, *quality))
      })
      .collect();
    debug!("批次: {} 个元素, {} 个任务", batch.len(), jobs.len());

    let results: Vec<Result<RgbHwcImage, DistortionError>> = self.pool.install(|| {
      jobs
        .par_iter()
        .map(|&(_, frame, quality)| self.op.distort(frame, quality))
        .collect()
    });

    // 任务按元素序号排列，第一个错误即序号最小的失败元素
    let mut outputs = Vec::with_capacity(results.len());
    for ((index, _, _), result) in jobs.iter().zip(results) {
      match result {
        Ok(image) => outputs.push(image),
        Err(source) => {
          warn!("批次第 {} 个元素失败，整个批次作废: {}", index, source);
          return Err(BatchError::Element {
            index: *index,
            source,
          });
        }
      }
    }

    let mut outputs = outputs.into_iter();
    batch
      .iter()
      .enumerate()
      .map(|(index, (sample, _))| {
        let frames = outputs.by_ref().take(sample.num_frames()).collect();
        sample
          .with_frames(frames)
          .map_err(|e| BatchError::Element {
            index,
            source: e.into(),
          })
      })
      .collect()
  }

  /// 样本与质量分开给出时的便捷入口，两者数量必须一致
  pub fn run(&self, samples: &[Sample], qualities: &[Quality]) -> Result<Vec<Sample>, BatchError> {
    if samples.len() != qualities.len() {
      return Err(BatchError::QualityCount {
        expected: samples.len(),
        actual: qualities.len(),
      });
    }
    let batch: Vec<BatchElement> = samples
      .iter()
      .cloned()
      .zip(qualities.iter().copied())
      .collect();
    self.run_batch(&batch)
  }
}
