// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbHwcImage,
  output::Render,
  pipeline::PipelineOutput,
  url_path,
};

/// 把失真结果写到一个图像文件
///
/// 批次只有一帧时直接写到给定路径；多帧时在文件名后追加 `_{样本}_{帧}`。
pub struct SaveImageFileOutput {
  path: PathBuf,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("路径解码失败: {0}")]
  PathDecode(#[from] std::string::FromUtf8Error),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: PathBuf::from(url_path(uri)?),
    })
  }
}

impl SaveImageFileOutput {
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 第 `sample` 个样本第 `frame` 帧的文件路径
  pub fn frame_path(&self, sample: usize, frame: usize) -> PathBuf {
    let stem = self
      .path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_default();
    let name = match self.path.extension() {
      Some(ext) => format!("{}_{}_{}.{}", stem, sample, frame, ext.to_string_lossy()),
      None => format!("{}_{}_{}", stem, sample, frame),
    };
    self.path.with_file_name(name)
  }

  fn save_image(&self, path: &Path, image: &RgbHwcImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    image
      .to_rgb_image()
      .save(path)
      .map_err(SaveImageFileError::ImageError)?;

    warn!("保存图像到文件: {}", path.display());

    Ok(())
  }
}

impl Render<PipelineOutput> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, result: &PipelineOutput) -> Result<(), Self::Error> {
    let single = result.frames().count() == 1;
    for (i, j, _, output, _) in result.frames() {
      if single {
        self.save_image(&self.path, output)?;
      } else {
        self.save_image(&self.frame_path(i, j), output)?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn frame_paths_keep_extension() {
    let output = SaveImageFileOutput::from_url(&Url::parse("image:///tmp/out/result.png").unwrap())
      .unwrap();
    assert_eq!(output.path(), Path::new("/tmp/out/result.png"));
    assert_eq!(output.frame_path(2, 7), PathBuf::from("/tmp/out/result_2_7.png"));
  }

  #[test]
  fn rejects_other_schemes() {
    assert!(matches!(
      SaveImageFileOutput::from_url(&Url::parse("folder:///tmp/out").unwrap()),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
