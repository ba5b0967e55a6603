// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/input.rs - 图像输入
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

use thiserror::Error;
use url::Url;

#[cfg(feature = "read_image_file")]
use crate::FromUrl;
use crate::frame::{Layout, RgbHwcImage, Sample};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError, ImageFileInputIter};

#[cfg(feature = "read_image_file")]
mod image_list;
#[cfg(feature = "read_image_file")]
pub use self::image_list::{IMAGE_LIST_FILE, ImageListEntry, ImageListInput, ImageListInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "read_image_file")]
  #[error("图像列表输入错误: {0}")]
  ImageListInputError(#[from] ImageListInputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

#[cfg(feature = "read_image_file")]
pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  ImageList(ImageListInput),
}

#[cfg(feature = "read_image_file")]
impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    if url.scheme() == ImageFileInput::SCHEME {
      let input = ImageFileInput::from_url(url)?;
      return Ok(InputWrapper::ReadImageFile(input));
    }
    if url.scheme() == ImageListInput::SCHEME {
      let input = ImageListInput::from_url(url)?;
      return Ok(InputWrapper::ImageList(input));
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

#[cfg(feature = "read_image_file")]
impl InputWrapper {
  pub fn into_images(self) -> InputWrapperIter {
    match self {
      InputWrapper::ReadImageFile(input) => InputWrapperIter::ReadImageFile(input.into_images()),
      InputWrapper::ImageList(input) => InputWrapperIter::ImageList(input),
    }
  }

  /// 按布局把图像流组装成样本流
  pub fn into_samples(self, layout: Layout, sequence_length: usize) -> SampleIter<InputWrapperIter> {
    SampleIter::new(self.into_images(), layout, sequence_length)
  }
}

#[cfg(feature = "read_image_file")]
pub enum InputWrapperIter {
  ReadImageFile(ImageFileInputIter),
  ImageList(ImageListInput),
}

#[cfg(feature = "read_image_file")]
impl Iterator for InputWrapperIter {
  type Item = RgbHwcImage;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapperIter::ReadImageFile(input) => input.next(),
      InputWrapperIter::ImageList(input) => input.next(),
    }
  }
}

/// 把图像流组装成样本
///
/// 单图布局下每张图像是一个样本。序列布局下每个样本由一张首帧加上其后
/// `sequence_length` 张图像组成，尺寸与首帧不同的图像被缩放到首帧尺寸。
pub struct SampleIter<I> {
  images: I,
  layout: Layout,
  sequence_length: usize,
}

impl<I: Iterator<Item = RgbHwcImage>> SampleIter<I> {
  pub fn new(images: I, layout: Layout, sequence_length: usize) -> Self {
    Self {
      images,
      layout,
      sequence_length,
    }
  }
}

#[cfg(feature = "image")]
fn fit_to(image: RgbHwcImage, height: usize, width: usize) -> RgbHwcImage {
  if image.height() == height && image.width() == width {
    return image;
  }
  tracing::debug!(
    "缩放帧 {}x{} -> {}x{}",
    image.height(),
    image.width(),
    height,
    width
  );
  let resized = image::imageops::resize(
    &image.to_rgb_image(),
    width as u32,
    height as u32,
    image::imageops::FilterType::Triangle,
  );
  RgbHwcImage::from(resized)
}

#[cfg(feature = "image")]
impl<I: Iterator<Item = RgbHwcImage>> Iterator for SampleIter<I> {
  type Item = Sample;

  fn next(&mut self) -> Option<Self::Item> {
    let first = self.images.next()?;
    match self.layout {
      Layout::SingleImage => Some(Sample::Image(first)),
      Layout::Sequence => {
        let (height, width) = (first.height(), first.width());
        let mut frames = Vec::with_capacity(self.sequence_length + 1);
        frames.push(first);
        for _ in 0..self.sequence_length {
          frames.push(fit_to(self.images.next()?, height, width));
        }
        crate::frame::RgbFhwcSequence::new(frames)
          .map(Sample::Sequence)
          .map_err(|e| tracing::error!("序列组装失败: {}", e))
          .ok()
      }
    }
  }
}
