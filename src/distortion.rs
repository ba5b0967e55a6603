// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/distortion.rs - JPEG 压缩失真算子
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

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  frame::{FrameError, RgbHwcImage},
  jpeg::Subsampling,
  quality::{Quality, QualityError},
};

mod host;
pub use self::host::HostDistortion;

#[cfg(feature = "wgpu")]
mod wgpu_device;
#[cfg(feature = "wgpu")]
pub use self::wgpu_device::WgpuDistortion;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistortionError {
  #[error("输入图像无效: {0}")]
  InvalidInput(#[from] FrameError),
  #[error("质量参数无效: {0}")]
  InvalidRange(#[from] QualityError),
  #[error("设备结果回传主机失败: {0}")]
  DeviceTransferFailure(String),
  #[error("加速设备不可用: {0}")]
  DeviceUnavailable(String),
}

/// 执行目标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Device {
  /// CPU 数值实现
  #[default]
  Host,
  /// GPU 计算着色器实现
  Accelerator,
}

impl fmt::Display for Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Device::Host => write!(f, "host"),
      Device::Accelerator => write!(f, "accelerator"),
    }
  }
}

/// JPEG 压缩失真：输出与输入形状相同，是 (图像, 质量) 的纯函数
pub trait Distortion: Send + Sync {
  fn device(&self) -> Device;

  fn distort(
    &self,
    image: &RgbHwcImage,
    quality: Quality,
  ) -> Result<RgbHwcImage, DistortionError>;
}

impl<D: Distortion + ?Sized> Distortion for Box<D> {
  fn device(&self) -> Device {
    (**self).device()
  }

  fn distort(
    &self,
    image: &RgbHwcImage,
    quality: Quality,
  ) -> Result<RgbHwcImage, DistortionError> {
    (**self).distort(image, quality)
  }
}

impl<D: Distortion + ?Sized> Distortion for Arc<D> {
  fn device(&self) -> Device {
    (**self).device()
  }

  fn distort(
    &self,
    image: &RgbHwcImage,
    quality: Quality,
  ) -> Result<RgbHwcImage, DistortionError> {
    (**self).distort(image, quality)
  }
}

/// 按执行目标创建算子
pub fn create_distortion(
  device: Device,
  subsampling: Subsampling,
) -> Result<Box<dyn Distortion>, DistortionError> {
  match device {
    Device::Host => Ok(Box::new(HostDistortion::new(subsampling))),
    #[cfg(feature = "wgpu")]
    Device::Accelerator => Ok(Box::new(WgpuDistortion::new(subsampling)?)),
    #[cfg(not(feature = "wgpu"))]
    Device::Accelerator => Err(DistortionError::DeviceUnavailable(
      "编译时未启用 wgpu 特性".to_string(),
    )),
  }
}

/// 一次失真计算所需的各平面尺寸
///
/// 图像先按边缘复制补齐到 MCU 的整数倍，色度平面再按采样因子缩小。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
  pub width: usize,
  pub height: usize,
  pub padded_width: usize,
  pub padded_height: usize,
  pub chroma_width: usize,
  pub chroma_height: usize,
  pub factor: usize,
}

impl Geometry {
  pub fn new(height: usize, width: usize, subsampling: Subsampling) -> Self {
    let mcu = subsampling.mcu_size();
    let factor = subsampling.factor();
    let padded_width = width.div_ceil(mcu) * mcu;
    let padded_height = height.div_ceil(mcu) * mcu;
    Self {
      width,
      height,
      padded_width,
      padded_height,
      chroma_width: padded_width / factor,
      chroma_height: padded_height / factor,
      factor,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn geometry_pads_to_mcu() {
    let g = Geometry::new(13, 21, Subsampling::Yuv420);
    assert_eq!((g.padded_width, g.padded_height), (32, 16));
    assert_eq!((g.chroma_width, g.chroma_height), (16, 8));

    let g = Geometry::new(13, 21, Subsampling::Yuv444);
    assert_eq!((g.padded_width, g.padded_height), (24, 16));
    assert_eq!((g.chroma_width, g.chroma_height), (24, 16));
  }

  #[test]
  fn host_is_always_available() {
    let op = create_distortion(Device::Host, Subsampling::default()).unwrap();
    assert_eq!(op.device(), Device::Host);
  }

  #[cfg(not(feature = "wgpu"))]
  #[test]
  fn accelerator_requires_feature() {
    assert!(matches!(
      create_distortion(Device::Accelerator, Subsampling::default()),
      Err(DistortionError::DeviceUnavailable(_))
    ));
  }
}
