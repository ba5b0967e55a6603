// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/quality.rs - 质量参数与采样
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

//! 质量参数 [`Quality`]、配置 [`QualitySpec`] 以及两种质量来源：
//! 按批次槽位独立播种的 [`QualitySampler`] 与确定性的 [`QualityList`]。

use std::{fmt, str::FromStr};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 99;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QualityError {
  #[error("质量范围无效: [{low}, {high}]，要求 1 <= low <= high <= 99")]
  InvalidRange { low: i64, high: i64 },
  #[error("无法解析质量参数: {0}")]
  Parse(String),
  #[error("快照槽位数与采样器不一致: 期望 {expected}, 实际 {actual}")]
  SnapshotMismatch { expected: usize, actual: usize },
  #[error("质量列表不能为空")]
  EmptyList,
}

/// JPEG 质量，取值 [1, 99]，越低损失越大
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Quality(u8);

impl Quality {
  pub fn new(value: i64) -> Result<Self, QualityError> {
    if value < MIN_QUALITY as i64 || value > MAX_QUALITY as i64 {
      return Err(QualityError::InvalidRange {
        low: value,
        high: value,
      });
    }
    Ok(Quality(value as u8))
  }

  pub fn value(self) -> u8 {
    self.0
  }
}

impl TryFrom<i64> for Quality {
  type Error = QualityError;

  fn try_from(value: i64) -> Result<Self, Self::Error> {
    Quality::new(value)
  }
}

impl From<Quality> for u8 {
  fn from(quality: Quality) -> Self {
    quality.0
  }
}

impl fmt::Display for Quality {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

fn check_range(low: i64, high: i64) -> Result<(), QualityError> {
  if low > high || low < MIN_QUALITY as i64 || high > MAX_QUALITY as i64 {
    return Err(QualityError::InvalidRange { low, high });
  }
  Ok(())
}

/// 在 `[low, high]` 内均匀采样一个质量值
///
/// 使用 `u32` 区间，保证 32/64 位平台上的随机序列一致。
pub fn sample<R: Rng + ?Sized>(rng: &mut R, low: u8, high: u8) -> Result<Quality, QualityError> {
  check_range(low as i64, high as i64)?;
  let value = rng.gen_range(low as u32..=high as u32);
  Ok(Quality(value as u8))
}

/// 质量配置：固定值，或者闭区间 `[low, high]` 内随机采样
///
/// JSON 中写作 `50` 或 `[1, 99]`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QualitySpec {
  Fixed(Quality),
  Range(u8, u8),
}

impl QualitySpec {
  pub fn range(low: u8, high: u8) -> Result<Self, QualityError> {
    check_range(low as i64, high as i64)?;
    Ok(QualitySpec::Range(low, high))
  }

  pub fn validate(&self) -> Result<(), QualityError> {
    match *self {
      QualitySpec::Fixed(_) => Ok(()),
      QualitySpec::Range(low, high) => check_range(low as i64, high as i64),
    }
  }
}

impl Default for QualitySpec {
  fn default() -> Self {
    QualitySpec::Range(MIN_QUALITY, MAX_QUALITY)
  }
}

impl FromStr for QualitySpec {
  type Err = QualityError;

  /// `"50"` 表示固定质量，`"1,99"` 表示采样区间
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parse = |v: &str| {
      v.trim()
        .parse::<i64>()
        .map_err(|_| QualityError::Parse(s.to_string()))
    };

    match s.split_once(',') {
      Some((low, high)) => {
        let (low, high) = (parse(low)?, parse(high)?);
        check_range(low, high)?;
        Ok(QualitySpec::Range(low as u8, high as u8))
      }
      None => Ok(QualitySpec::Fixed(Quality::new(parse(s)?)?)),
    }
  }
}

impl fmt::Display for QualitySpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QualitySpec::Fixed(q) => write!(f, "{}", q),
      QualitySpec::Range(low, high) => write!(f, "{},{}", low, high),
    }
  }
}

/// 每次运行为一个批次提供质量值
pub trait QualitySource {
  fn next_batch(&mut self, batch_size: usize) -> Result<Vec<Quality>, QualityError>;
}

/// 按批次槽位独立播种的质量采样器
///
/// 每个槽位拥有一条 ChaCha20 流（流编号为槽位序号），因此第 i 个元素的
/// 质量只取决于种子和 i，与同批其他元素无关。固定质量时不进行采样。
#[derive(Debug, Clone)]
pub struct QualitySampler {
  spec: QualitySpec,
  seed: u64,
  streams: Vec<ChaCha20Rng>,
}

/// 采样器状态快照，可保存为 JSON 后恢复
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitySamplerSnapshot {
  pub seed: u64,
  /// 每个槽位的 ChaCha 字位置，`[高 64 位, 低 64 位]`
  pub word_pos: Vec<[u64; 2]>,
}

impl QualitySamplerSnapshot {
  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string(self)
  }

  pub fn from_json(json: &str) -> serde_json::Result<Self> {
    serde_json::from_str(json)
  }
}

fn slot_stream(seed: u64, slot: usize) -> ChaCha20Rng {
  let mut rng = ChaCha20Rng::seed_from_u64(seed);
  rng.set_stream(slot as u64);
  rng
}

impl QualitySampler {
  pub fn new(spec: QualitySpec, seed: u64, batch_size: usize) -> Result<Self, QualityError> {
    spec.validate()?;
    debug!("创建质量采样器: {}, 种子 {}, 槽位 {}", spec, seed, batch_size);
    Ok(Self {
      spec,
      seed,
      streams: (0..batch_size).map(|slot| slot_stream(seed, slot)).collect(),
    })
  }

  pub fn spec(&self) -> QualitySpec {
    self.spec
  }

  pub fn batch_size(&self) -> usize {
    self.streams.len()
  }

  pub fn snapshot(&self) -> QualitySamplerSnapshot {
    let word_pos = self
      .streams
      .iter()
      .map(|rng| {
        let pos = rng.get_word_pos();
        [(pos >> 64) as u64, pos as u64]
      })
      .collect();
    QualitySamplerSnapshot {
      seed: self.seed,
      word_pos,
    }
  }

  pub fn restore(&mut self, snapshot: &QualitySamplerSnapshot) -> Result<(), QualityError> {
    if snapshot.word_pos.len() != self.streams.len() {
      return Err(QualityError::SnapshotMismatch {
        expected: self.streams.len(),
        actual: snapshot.word_pos.len(),
      });
    }

    self.seed = snapshot.seed;
    self.streams = snapshot
      .word_pos
      .iter()
      .enumerate()
      .map(|(slot, &[hi, lo])| {
        let mut rng = slot_stream(snapshot.seed, slot);
        rng.set_word_pos(((hi as u128) << 64) | lo as u128);
        rng
      })
      .collect();
    Ok(())
  }
}

impl QualitySource for QualitySampler {
  fn next_batch(&mut self, batch_size: usize) -> Result<Vec<Quality>, QualityError> {
    match self.spec {
      QualitySpec::Fixed(quality) => Ok(vec![quality; batch_size]),
      QualitySpec::Range(low, high) => {
        while self.streams.len() < batch_size {
          let slot = self.streams.len();
          self.streams.push(slot_stream(self.seed, slot));
        }
        self.streams[..batch_size]
          .iter_mut()
          .map(|rng| sample(rng, low, high))
          .collect()
      }
    }
  }
}

/// 确定性的质量列表，循环取值
#[derive(Debug, Clone)]
pub struct QualityList {
  values: Vec<Quality>,
  cursor: usize,
}

impl QualityList {
  pub fn new(values: Vec<Quality>) -> Result<Self, QualityError> {
    if values.is_empty() {
      return Err(QualityError::EmptyList);
    }
    Ok(Self { values, cursor: 0 })
  }
}

impl QualitySource for QualityList {
  fn next_batch(&mut self, batch_size: usize) -> Result<Vec<Quality>, QualityError> {
    let batch = (0..batch_size)
      .map(|i| self.values[(self.cursor + i) % self.values.len()])
      .collect();
    self.cursor = (self.cursor + batch_size) % self.values.len();
    Ok(batch)
  }
}
