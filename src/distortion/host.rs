// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/distortion/host.rs - CPU 实现
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

use tracing::trace;

use crate::{
  distortion::{Device, Distortion, DistortionError, Geometry},
  frame::{RGB_CHANNELS, RgbHwcImage},
  jpeg::{
    Plane, QuantTables, Subsampling,
    color::{rgb_to_ycbcr, ycbcr_to_rgb},
    sampling::{downsample, upsample},
  },
  quality::Quality,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct HostDistortion {
  subsampling: Subsampling,
}

impl HostDistortion {
  pub fn new(subsampling: Subsampling) -> Self {
    Self { subsampling }
  }

  pub fn subsampling(&self) -> Subsampling {
    self.subsampling
  }
}

/// 补齐到 MCU 的 Y、Cb、Cr 全分辨率平面，越界位置复制边缘像素
fn split_planes(image: &RgbHwcImage, geometry: &Geometry) -> [Plane; 3] {
  let (pw, ph) = (geometry.padded_width, geometry.padded_height);
  let mut planes = [Plane::new(pw, ph), Plane::new(pw, ph), Plane::new(pw, ph)];
  for y in 0..ph {
    let sy = y.min(geometry.height - 1);
    for x in 0..pw {
      let sx = x.min(geometry.width - 1);
      let [r, g, b] = image.pixel(sy, sx);
      let ycc = rgb_to_ycbcr(r as f32, g as f32, b as f32);
      for (plane, value) in planes.iter_mut().zip(ycc) {
        plane.set(x, y, value);
      }
    }
  }
  planes
}

fn merge_planes(
  luma: &Plane,
  cb: &Plane,
  cr: &Plane,
  geometry: &Geometry,
) -> Result<RgbHwcImage, DistortionError> {
  let (width, height) = (geometry.width, geometry.height);
  let mut data = Vec::with_capacity(width * height * RGB_CHANNELS);
  for y in 0..height {
    for x in 0..width {
      data.extend_from_slice(&ycbcr_to_rgb(luma.get(x, y), cb.get(x, y), cr.get(x, y)));
    }
  }
  Ok(RgbHwcImage::from_raw(height, width, RGB_CHANNELS, data)?)
}

impl Distortion for HostDistortion {
  fn device(&self) -> Device {
    Device::Host
  }

  fn distort(
    &self,
    image: &RgbHwcImage,
    quality: Quality,
  ) -> Result<RgbHwcImage, DistortionError> {
    image.validate()?;
    trace!(
      "CPU 失真: {}x{}, 质量 {}",
      image.height(),
      image.width(),
      quality
    );

    let geometry = Geometry::new(image.height(), image.width(), self.subsampling);
    let tables = QuantTables::for_quality(quality);

    let [mut luma, cb, cr] = split_planes(image, &geometry);
    let mut cb = downsample(&cb, geometry.factor);
    let mut cr = downsample(&cr, geometry.factor);

    luma.requantize(&tables.luma);
    cb.requantize(&tables.chroma);
    cr.requantize(&tables.chroma);

    let cb = upsample(&cb, geometry.factor, geometry.width, geometry.height);
    let cr = upsample(&cr, geometry.factor, geometry.width, geometry.height);

    merge_planes(&luma, &cb, &cr, &geometry)
  }
}
