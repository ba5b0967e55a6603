// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/jpeg/tables.rs - 量化表
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

use crate::quality::Quality;

use super::BLOCK_LEN;

/// ITU-T T.81 Annex K 亮度量化表，自然（行优先）顺序
#[rustfmt::skip]
pub const STD_LUMA_QTABLE: [u16; BLOCK_LEN] = [
  16, 11, 10, 16,  24,  40,  51,  61,
  12, 12, 14, 19,  26,  58,  60,  55,
  14, 13, 16, 24,  40,  57,  69,  56,
  14, 17, 22, 29,  51,  87,  80,  62,
  18, 22, 37, 56,  68, 109, 103,  77,
  24, 35, 55, 64,  81, 104, 113,  92,
  49, 64, 78, 87, 103, 121, 120, 101,
  72, 92, 95, 98, 112, 100, 103,  99,
];

/// ITU-T T.81 Annex K 色度量化表，自然（行优先）顺序
#[rustfmt::skip]
pub const STD_CHROMA_QTABLE: [u16; BLOCK_LEN] = [
  17, 18, 24, 47, 99, 99, 99, 99,
  18, 21, 26, 66, 99, 99, 99, 99,
  24, 26, 56, 99, 99, 99, 99, 99,
  47, 66, 99, 99, 99, 99, 99, 99,
  99, 99, 99, 99, 99, 99, 99, 99,
  99, 99, 99, 99, 99, 99, 99, 99,
  99, 99, 99, 99, 99, 99, 99, 99,
  99, 99, 99, 99, 99, 99, 99, 99,
];

/// IJG 质量缩放百分比
pub fn quality_scale(quality: Quality) -> u32 {
  let q = quality.value() as u32;
  if q < 50 { 5000 / q } else { 200 - q * 2 }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTable {
  /// 按 `row * 8 + col` 索引
  pub values: [u16; BLOCK_LEN],
}

impl QuantTable {
  pub fn new(values: [u16; BLOCK_LEN]) -> Self {
    Self { values }
  }

  /// 按基线 JPEG 的约定缩放并截断到 [1, 255]
  pub fn scaled(base: &[u16; BLOCK_LEN], quality: Quality) -> Self {
    let scale = quality_scale(quality);
    let mut values = [0u16; BLOCK_LEN];
    for (v, &b) in values.iter_mut().zip(base.iter()) {
      *v = ((b as u32 * scale + 50) / 100).clamp(1, 255) as u16;
    }
    Self { values }
  }

  pub fn luma(quality: Quality) -> Self {
    Self::scaled(&STD_LUMA_QTABLE, quality)
  }

  pub fn chroma(quality: Quality) -> Self {
    Self::scaled(&STD_CHROMA_QTABLE, quality)
  }
}

/// 某一质量下的亮度与色度量化表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTables {
  pub luma: QuantTable,
  pub chroma: QuantTable,
}

impl QuantTables {
  pub fn for_quality(quality: Quality) -> Self {
    Self {
      luma: QuantTable::luma(quality),
      chroma: QuantTable::chroma(quality),
    }
  }
}
