// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicU16, Ordering},
};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbHwcImage,
  output::Render,
  pipeline::PipelineOutput,
  url_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("路径解码失败: {0}")]
  PathDecode(#[from] std::string::FromUtf8Error),
}

/// 按日期分目录保存每次运行的结果
///
/// `folder:///data/dump` 写到 `/data/dump/YYYY/MM/DD/`，文件名包含时间、
/// 运行序号、样本与帧序号以及质量。查询参数 `inputs` 表示同时保存输入，
/// `flat` 表示不按日期分目录。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  run_counter: AtomicU16,
  with_inputs: bool,
  flat: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let with_inputs = uri.query_pairs().any(|(k, _)| k == "inputs");
    let flat = uri.query_pairs().any(|(k, _)| k == "flat");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(url_path(uri)?),
      run_counter: AtomicU16::new(0),
      with_inputs,
      flat,
    })
  }
}

impl DirectoryRecordOutput {
  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn run_id(&self) -> u16 {
    self.run_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  /// 当前写入目录，不存在时创建
  pub fn current_directory(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = if self.flat {
      self.directory.clone()
    } else {
      let now = Utc::now();
      self
        .directory
        .join(now.year().to_string())
        .join(format!("{:02}", now.month()))
        .join(format!("{:02}", now.day()))
    };
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }
    Ok(directory)
  }

  /// 以给定文件名保存一帧，返回完整路径
  pub fn save_named(
    &self,
    name: &str,
    image: &RgbHwcImage,
  ) -> Result<PathBuf, DirectoryRecordOutputError> {
    let path = self.current_directory()?.join(name);
    image.to_rgb_image().save(&path)?;
    debug!("保存图像: {}", path.display());
    Ok(path)
  }
}

impl Render<PipelineOutput> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, result: &PipelineOutput) -> Result<(), Self::Error> {
    let prefix = format!("{}-{:04X}", Utc::now().format("%H-%M-%S"), self.run_id());
    for (i, j, input, output, quality) in result.frames() {
      self.save_named(
        &format!("{}_output_q{}_sample{}_{}.png", prefix, quality, i, j),
        output,
      )?;
      if self.with_inputs {
        self.save_named(
          &format!("{}_input_q{}_sample{}_{}.png", prefix, quality, i, j),
          input,
        )?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::Sample, quality::Quality};

  fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("zhuomo-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
  }

  #[test]
  fn parses_query_flags() {
    let output =
      DirectoryRecordOutput::from_url(&url::Url::parse("folder:///tmp/dump?inputs&flat").unwrap())
        .unwrap();
    assert_eq!(output.directory(), Path::new("/tmp/dump"));
    assert!(output.with_inputs);
    assert!(output.flat);
  }

  #[test]
  fn writes_outputs_and_inputs() {
    let dir = temp_dir("record");
    let url = url::Url::from_directory_path(&dir).unwrap();
    let url = url::Url::parse(&format!("folder://{}?inputs&flat", url.path())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    let image = RgbHwcImage::from_fn(4, 6, |_, x| [x as u8 * 40, 0, 0]).unwrap();
    let result = PipelineOutput {
      outputs: vec![Sample::Image(image.clone())],
      inputs: vec![Sample::Image(image)],
      qualities: vec![Quality::new(42).unwrap()],
    };
    output.render_result(&result).unwrap();

    let names: Vec<String> = std::fs::read_dir(&dir)
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
      .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().any(|n| n.ends_with("_output_q42_sample0_0.png")));
    assert!(names.iter().any(|n| n.ends_with("_input_q42_sample0_0.png")));
    let _ = std::fs::remove_dir_all(&dir);
  }
}
