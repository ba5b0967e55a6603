// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/jpeg/sampling.rs - 色度下采样与上采样
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

use serde::{Deserialize, Serialize};

use super::{BLOCK_SIZE, Plane};

/// 色度采样方式
///
/// 默认 4:4:4，与参考编解码器（`image` 的 JPEG 编码器）一致。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Subsampling {
  /// 水平与垂直方向各 2 倍下采样
  #[serde(rename = "4:2:0")]
  #[value(name = "4:2:0")]
  Yuv420,
  /// 不下采样
  #[default]
  #[serde(rename = "4:4:4")]
  #[value(name = "4:4:4")]
  Yuv444,
}

impl Subsampling {
  pub fn factor(self) -> usize {
    match self {
      Subsampling::Yuv420 => 2,
      Subsampling::Yuv444 => 1,
    }
  }

  /// 最小编码单元边长
  pub fn mcu_size(self) -> usize {
    BLOCK_SIZE * self.factor()
  }
}

/// `factor × factor` 盒式平均下采样，平面尺寸必须能被 `factor` 整除
pub fn downsample(plane: &Plane, factor: usize) -> Plane {
  if factor == 1 {
    return plane.clone();
  }

  let width = plane.width() / factor;
  let height = plane.height() / factor;
  let norm = 1.0 / (factor * factor) as f32;
  let mut out = Plane::new(width, height);
  for y in 0..height {
    for x in 0..width {
      let mut sum = 0.0;
      for dy in 0..factor {
        for dx in 0..factor {
          sum += plane.get(x * factor + dx, y * factor + dy);
        }
      }
      out.set(x, y, sum * norm);
    }
  }
  out
}

/// 三角滤波（"fancy"）2 倍上采样中输出坐标对应的近邻与远邻采样位置
#[inline]
pub fn triangle_taps(pos: usize, len: usize) -> (usize, usize) {
  let near = (pos / 2).min(len - 1);
  let far = if pos % 2 == 0 {
    near.saturating_sub(1)
  } else {
    (near + 1).min(len - 1)
  };
  (near, far)
}

/// 色度上采样到 `width × height`
///
/// 2 倍时每个输出采样由最近的 2×2 色度采样按 3/4、1/4 权重插值，边界处复制。
pub fn upsample(plane: &Plane, factor: usize, width: usize, height: usize) -> Plane {
  let mut out = Plane::new(width, height);
  if factor == 1 {
    for y in 0..height {
      for x in 0..width {
        out.set(x, y, plane.get(x, y));
      }
    }
    return out;
  }

  for y in 0..height {
    let (ny, fy) = triangle_taps(y, plane.height());
    for x in 0..width {
      let (nx, fx) = triangle_taps(x, plane.width());
      let near = 0.75 * plane.get(nx, ny) + 0.25 * plane.get(nx, fy);
      let far = 0.75 * plane.get(fx, ny) + 0.25 * plane.get(fx, fy);
      out.set(x, y, 0.75 * near + 0.25 * far);
    }
  }
  out
}
