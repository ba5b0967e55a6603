// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/frame.rs - HWC 图像与 FHWC 序列定义
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
use thiserror::Error;

pub const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
  #[error("图像尺寸无效: {height}x{width}")]
  InvalidShape { height: usize, width: usize },
  #[error("通道数无效: 期望 3, 实际 {0}")]
  InvalidChannels(usize),
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("序列不能为空")]
  EmptySequence,
  #[error("第 {index} 帧尺寸 {actual:?} 与首帧尺寸 {expected:?} 不一致")]
  FrameShapeMismatch {
    index: usize,
    expected: (usize, usize),
    actual: (usize, usize),
  },
}

/// 数据布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
  /// 单张图像 (HWC)
  #[value(name = "single-image")]
  SingleImage,
  /// 帧序列 (FHWC)
  #[value(name = "sequence")]
  Sequence,
}

/// RGB 图像，HWC 排列，每个采样 8 位
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbHwcImage {
  height: usize,
  width: usize,
  data: Box<[u8]>,
}

impl RgbHwcImage {
  /// 从原始 HWC 数据构造，检查尺寸、通道数与数据长度
  pub fn from_raw(
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<u8>,
  ) -> Result<Self, FrameError> {
    if height == 0 || width == 0 {
      return Err(FrameError::InvalidShape { height, width });
    }
    if channels != RGB_CHANNELS {
      return Err(FrameError::InvalidChannels(channels));
    }
    let expected = height * width * RGB_CHANNELS;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      height,
      width,
      data: data.into_boxed_slice(),
    })
  }

  /// 全零图像
  pub fn with_shape(height: usize, width: usize) -> Result<Self, FrameError> {
    Self::from_raw(
      height,
      width,
      RGB_CHANNELS,
      vec![0u8; height * width * RGB_CHANNELS],
    )
  }

  /// 按像素坐标 `(y, x)` 生成图像
  pub fn from_fn<F>(height: usize, width: usize, mut f: F) -> Result<Self, FrameError>
  where
    F: FnMut(usize, usize) -> [u8; 3],
  {
    let mut data = Vec::with_capacity(height * width * RGB_CHANNELS);
    for y in 0..height {
      for x in 0..width {
        data.extend_from_slice(&f(y, x));
      }
    }
    Self::from_raw(height, width, RGB_CHANNELS, data)
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// `(height, width, channels)`
  pub fn shape(&self) -> (usize, usize, usize) {
    (self.height, self.width, RGB_CHANNELS)
  }

  pub fn pixel(&self, y: usize, x: usize) -> [u8; 3] {
    let index = (y * self.width + x) * RGB_CHANNELS;
    [self.data[index], self.data[index + 1], self.data[index + 2]]
  }

  pub fn as_hwc(&self) -> &[u8] {
    &self.data
  }

  /// 再次检查形状，外部转换（如空的 `RgbImage`）可能绕过构造检查
  pub fn validate(&self) -> Result<(), FrameError> {
    if self.height == 0 || self.width == 0 {
      return Err(FrameError::InvalidShape {
        height: self.height,
        width: self.width,
      });
    }
    let expected = self.height * self.width * RGB_CHANNELS;
    if self.data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: self.data.len(),
      });
    }
    Ok(())
  }
}

#[cfg(feature = "image")]
impl From<image::RgbImage> for RgbHwcImage {
  fn from(image: image::RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      height: height as usize,
      width: width as usize,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

#[cfg(feature = "image")]
impl RgbHwcImage {
  /// 数据长度由构造函数保证等于 `height * width * 3`
  pub fn to_rgb_image(&self) -> image::RgbImage {
    let mut out = image::RgbImage::new(self.width as u32, self.height as u32);
    out.copy_from_slice(&self.data);
    out
  }
}

/// 帧序列，FHWC 排列，所有帧尺寸一致
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFhwcSequence {
  frames: Vec<RgbHwcImage>,
}

impl RgbFhwcSequence {
  pub fn new(frames: Vec<RgbHwcImage>) -> Result<Self, FrameError> {
    let first = frames.first().ok_or(FrameError::EmptySequence)?;
    let expected = (first.height(), first.width());
    for (index, frame) in frames.iter().enumerate().skip(1) {
      let actual = (frame.height(), frame.width());
      if actual != expected {
        return Err(FrameError::FrameShapeMismatch {
          index,
          expected,
          actual,
        });
      }
    }
    Ok(Self { frames })
  }

  /// 从连续的 FHWC 数据构造
  pub fn from_raw(
    num_frames: usize,
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<u8>,
  ) -> Result<Self, FrameError> {
    if num_frames == 0 {
      return Err(FrameError::EmptySequence);
    }
    let frame_len = height * width * channels;
    let expected = num_frames * frame_len;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    let frames = data
      .chunks(frame_len.max(1))
      .map(|chunk| RgbHwcImage::from_raw(height, width, channels, chunk.to_vec()))
      .collect::<Result<Vec<_>, _>>()?;
    Self::new(frames)
  }

  pub fn num_frames(&self) -> usize {
    self.frames.len()
  }

  /// `(frames, height, width, channels)`
  pub fn shape(&self) -> (usize, usize, usize, usize) {
    let first = &self.frames[0];
    (
      self.frames.len(),
      first.height(),
      first.width(),
      RGB_CHANNELS,
    )
  }

  pub fn frames(&self) -> &[RgbHwcImage] {
    &self.frames
  }

  pub fn into_frames(self) -> Vec<RgbHwcImage> {
    self.frames
  }
}

/// 批次中的单个样本
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sample {
  Image(RgbHwcImage),
  Sequence(RgbFhwcSequence),
}

impl Sample {
  pub fn layout(&self) -> Layout {
    match self {
      Sample::Image(_) => Layout::SingleImage,
      Sample::Sequence(_) => Layout::Sequence,
    }
  }

  pub fn num_frames(&self) -> usize {
    match self {
      Sample::Image(_) => 1,
      Sample::Sequence(sequence) => sequence.num_frames(),
    }
  }

  /// 按顺序遍历样本中的所有帧
  pub fn frames(&self) -> &[RgbHwcImage] {
    match self {
      Sample::Image(image) => std::slice::from_ref(image),
      Sample::Sequence(sequence) => sequence.frames(),
    }
  }

  /// 用新的帧构造同样布局的样本，帧数必须与本样本一致
  pub fn with_frames(&self, frames: Vec<RgbHwcImage>) -> Result<Sample, FrameError> {
    let expected = self.num_frames();
    let mismatch = |actual| FrameError::LengthMismatch { expected, actual };
    match self {
      Sample::Image(_) => {
        let [image] = <[RgbHwcImage; 1]>::try_from(frames).map_err(|f| mismatch(f.len()))?;
        Ok(Sample::Image(image))
      }
      Sample::Sequence(_) => {
        if frames.len() != expected {
          return Err(mismatch(frames.len()));
        }
        RgbFhwcSequence::new(frames).map(Sample::Sequence)
      }
    }
  }
}

impl From<RgbHwcImage> for Sample {
  fn from(image: RgbHwcImage) -> Self {
    Sample::Image(image)
  }
}

impl From<RgbFhwcSequence> for Sample {
  fn from(sequence: RgbFhwcSequence) -> Self {
    Sample::Sequence(sequence)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_empty_dimensions() {
    assert_eq!(
      RgbHwcImage::from_raw(0, 4, 3, vec![]),
      Err(FrameError::InvalidShape {
        height: 0,
        width: 4
      })
    );
  }

  #[test]
  fn rejects_wrong_channel_count() {
    assert_eq!(
      RgbHwcImage::from_raw(2, 2, 4, vec![0; 16]),
      Err(FrameError::InvalidChannels(4))
    );
  }

  #[test]
  fn pixel_reads_hwc_order() {
    let image = RgbHwcImage::from_fn(2, 3, |y, x| [y as u8, x as u8, 7]).unwrap();
    assert_eq!(image.shape(), (2, 3, 3));
    assert_eq!(image.pixel(1, 2), [1, 2, 7]);
    assert_eq!(&image.as_hwc()[..6], &[0, 0, 7, 0, 1, 7]);
  }

  #[test]
  fn sequence_requires_matching_frames() {
    let a = RgbHwcImage::with_shape(4, 4).unwrap();
    let b = RgbHwcImage::with_shape(4, 5).unwrap();
    let err = RgbFhwcSequence::new(vec![a.clone(), a.clone(), b]).unwrap_err();
    assert_eq!(
      err,
      FrameError::FrameShapeMismatch {
        index: 2,
        expected: (4, 4),
        actual: (4, 5)
      }
    );
    assert_eq!(RgbFhwcSequence::new(vec![]), Err(FrameError::EmptySequence));
  }

  #[test]
  fn sequence_from_raw_splits_frames() {
    let data: Vec<u8> = (0..2 * 2 * 2 * 3).map(|v| v as u8).collect();
    let sequence = RgbFhwcSequence::from_raw(2, 2, 2, 3, data).unwrap();
    assert_eq!(sequence.shape(), (2, 2, 2, 3));
    assert_eq!(sequence.frames()[1].pixel(0, 0), [12, 13, 14]);
  }

  #[cfg(feature = "image")]
  #[test]
  fn rgb_image_keeps_pixels() {
    let image = RgbHwcImage::from_fn(3, 5, |y, x| [y as u8, x as u8, 9]).unwrap();
    let converted = image.to_rgb_image();
    assert_eq!(converted.dimensions(), (5, 3));
    assert_eq!(converted.get_pixel(4, 2).0, [2, 4, 9]);
    assert_eq!(RgbHwcImage::from(converted), image);
  }

  #[test]
  fn with_frames_keeps_layout() {
    let a = RgbHwcImage::with_shape(2, 2).unwrap();
    let b = RgbHwcImage::from_fn(2, 2, |_, _| [1, 2, 3]).unwrap();

    let image = Sample::Image(a.clone());
    assert_eq!(image.with_frames(vec![b.clone()]), Ok(Sample::Image(b.clone())));
    assert_eq!(
      image.with_frames(vec![]),
      Err(FrameError::LengthMismatch {
        expected: 1,
        actual: 0
      })
    );

    let sequence = Sample::Sequence(RgbFhwcSequence::new(vec![a.clone(), a]).unwrap());
    let rebuilt = sequence.with_frames(vec![b.clone(), b.clone()]).unwrap();
    assert_eq!(rebuilt.layout(), Layout::Sequence);
    assert_eq!(rebuilt.frames(), &[b.clone(), b.clone()]);
    assert!(matches!(
      sequence.with_frames(vec![b]),
      Err(FrameError::LengthMismatch { expected: 2, actual: 1 })
    ));
  }
}
