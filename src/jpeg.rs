// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/jpeg.rs - JPEG 有损变换的数值内核
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

//! JPEG 编码再解码过程中产生损失的各个步骤：色彩空间转换、色度下采样、
//! 8×8 DCT 与量化、色度上采样。熵编码是无损的，因此这里不需要。
//!
//! 所有取整都使用 [`round_half_up`]，主机与 GPU 实现保持一致。

pub mod color;
pub mod dct;
pub mod sampling;
pub mod tables;

pub use self::sampling::Subsampling;
pub use self::tables::{QuantTable, QuantTables};

pub const BLOCK_SIZE: usize = 8;
pub const BLOCK_LEN: usize = BLOCK_SIZE * BLOCK_SIZE;

#[inline]
pub fn round_half_up(value: f32) -> f32 {
  (value + 0.5).floor()
}

/// 单通道浮点平面，行优先
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
  width: usize,
  height: usize,
  data: Vec<f32>,
}

impl Plane {
  pub fn new(width: usize, height: usize) -> Self {
    Self {
      width,
      height,
      data: vec![0.0; width * height],
    }
  }

  pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Self {
    debug_assert_eq!(data.len(), width * height);
    Self {
      width,
      height,
      data,
    }
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  #[inline]
  pub fn get(&self, x: usize, y: usize) -> f32 {
    self.data[y * self.width + x]
  }

  #[inline]
  pub fn set(&mut self, x: usize, y: usize, value: f32) {
    self.data[y * self.width + x] = value;
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  /// 将平面按 8×8 块做量化再反量化，平面宽高必须是 8 的倍数
  pub fn requantize(&mut self, table: &QuantTable) {
    debug_assert!(self.width % BLOCK_SIZE == 0 && self.height % BLOCK_SIZE == 0);

    let mut block = [0.0f32; BLOCK_LEN];
    for by in (0..self.height).step_by(BLOCK_SIZE) {
      for bx in (0..self.width).step_by(BLOCK_SIZE) {
        for row in 0..BLOCK_SIZE {
          for col in 0..BLOCK_SIZE {
            block[row * BLOCK_SIZE + col] = self.get(bx + col, by + row);
          }
        }

        dct::requantize_block(&mut block, table);

        for row in 0..BLOCK_SIZE {
          for col in 0..BLOCK_SIZE {
            self.set(bx + col, by + row, block[row * BLOCK_SIZE + col]);
          }
        }
      }
    }
  }
}
