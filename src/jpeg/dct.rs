// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/jpeg/dct.rs - 8×8 DCT 与重量化
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

use std::sync::OnceLock;

use super::{BLOCK_LEN, BLOCK_SIZE, QuantTable, round_half_up};

static BASIS: OnceLock<[f32; BLOCK_LEN]> = OnceLock::new();

/// 正交 DCT-II 基：`basis[u * 8 + x] = C(u) * cos((2x + 1) uπ / 16)`，
/// 其中 `C(0) = 1/√8`，`C(u > 0) = 1/2`。GPU 实现直接上传这张表。
pub fn dct_basis() -> &'static [f32; BLOCK_LEN] {
  BASIS.get_or_init(|| {
    let mut table = [0.0f32; BLOCK_LEN];
    for u in 0..BLOCK_SIZE {
      let norm = if u == 0 { 1.0 / 8.0f64.sqrt() } else { 0.5 };
      for x in 0..BLOCK_SIZE {
        let angle = (2 * x + 1) as f64 * u as f64 * std::f64::consts::PI / 16.0;
        table[u * BLOCK_SIZE + x] = (norm * angle.cos()) as f32;
      }
    }
    table
  })
}

/// 可分离正变换：先行后列
pub fn forward_dct(samples: &[f32; BLOCK_LEN]) -> [f32; BLOCK_LEN] {
  let basis = dct_basis();

  let mut temp = [0.0f32; BLOCK_LEN];
  for row in 0..BLOCK_SIZE {
    for u in 0..BLOCK_SIZE {
      let mut sum = 0.0;
      for x in 0..BLOCK_SIZE {
        sum += samples[row * BLOCK_SIZE + x] * basis[u * BLOCK_SIZE + x];
      }
      temp[row * BLOCK_SIZE + u] = sum;
    }
  }

  let mut coeffs = [0.0f32; BLOCK_LEN];
  for col in 0..BLOCK_SIZE {
    for v in 0..BLOCK_SIZE {
      let mut sum = 0.0;
      for y in 0..BLOCK_SIZE {
        sum += temp[y * BLOCK_SIZE + col] * basis[v * BLOCK_SIZE + y];
      }
      coeffs[v * BLOCK_SIZE + col] = sum;
    }
  }
  coeffs
}

/// 可分离逆变换：先列后行
pub fn inverse_dct(coeffs: &[f32; BLOCK_LEN]) -> [f32; BLOCK_LEN] {
  let basis = dct_basis();

  let mut temp = [0.0f32; BLOCK_LEN];
  for col in 0..BLOCK_SIZE {
    for y in 0..BLOCK_SIZE {
      let mut sum = 0.0;
      for v in 0..BLOCK_SIZE {
        sum += coeffs[v * BLOCK_SIZE + col] * basis[v * BLOCK_SIZE + y];
      }
      temp[y * BLOCK_SIZE + col] = sum;
    }
  }

  let mut samples = [0.0f32; BLOCK_LEN];
  for row in 0..BLOCK_SIZE {
    for x in 0..BLOCK_SIZE {
      let mut sum = 0.0;
      for u in 0..BLOCK_SIZE {
        sum += temp[row * BLOCK_SIZE + u] * basis[u * BLOCK_SIZE + x];
      }
      samples[row * BLOCK_SIZE + x] = sum;
    }
  }
  samples
}

/// 一个 8×8 块的有损往返：电平平移、DCT、量化、反量化、IDCT、截断
///
/// 输入输出都在 [0, 255] 采样域。
pub fn requantize_block(block: &mut [f32; BLOCK_LEN], table: &QuantTable) {
  let mut shifted = [0.0f32; BLOCK_LEN];
  for (s, &v) in shifted.iter_mut().zip(block.iter()) {
    *s = v - 128.0;
  }

  let mut coeffs = forward_dct(&shifted);
  for (c, &q) in coeffs.iter_mut().zip(table.values.iter()) {
    let q = q as f32;
    *c = round_half_up(*c / q) * q;
  }

  let samples = inverse_dct(&coeffs);
  for (b, &s) in block.iter_mut().zip(samples.iter()) {
    *b = (s + 128.0).clamp(0.0, 255.0);
  }
}
