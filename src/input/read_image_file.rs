// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbHwcImage, url_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像读取错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("路径解码失败: {0}")]
  PathDecode(#[from] std::string::FromUtf8Error),
}

/// 单个图像文件，`image:///path/to/file.png`
///
/// 查询参数 `repeat` 表示无限重复这张图像，用于凑满批次。
pub struct ImageFileInput {
  image: RgbHwcImage,
  repeat: bool,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch(url.scheme().to_string()));
    }

    let path = url_path(url)?;
    let image = ImageReader::open(&path)?.with_guessed_format()?.decode()?;
    info!("读取图像: {} ({}x{})", path, image.height(), image.width());

    Ok(ImageFileInput {
      image: RgbHwcImage::from(image.into_rgb8()),
      repeat: url.query_pairs().any(|(k, _)| k == "repeat"),
    })
  }
}

impl ImageFileInput {
  pub fn image(&self) -> &RgbHwcImage {
    &self.image
  }

  pub fn into_images(self) -> ImageFileInputIter {
    ImageFileInputIter {
      image: Some(self.image),
      repeat: self.repeat,
    }
  }
}

pub struct ImageFileInputIter {
  image: Option<RgbHwcImage>,
  repeat: bool,
}

impl Iterator for ImageFileInputIter {
  type Item = RgbHwcImage;

  fn next(&mut self) -> Option<Self::Item> {
    if self.repeat {
      self.image.clone()
    } else {
      self.image.take()
    }
  }
}
