// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/input/image_list.rs - 图像列表目录输入
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

use image::ImageReader;
use rand::{SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbHwcImage, url_path};

/// 目录中的列表文件名
pub const IMAGE_LIST_FILE: &str = "image_list.txt";

#[derive(Error, Debug)]
pub enum ImageListInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("列表第 {line} 行格式错误: {content:?}")]
  Parse { line: usize, content: String },
  #[error("图像列表为空: {0}")]
  Empty(PathBuf),
  #[error("查询参数 {key} 的值无效: {value}")]
  InvalidQuery { key: String, value: String },
  #[error("路径解码失败: {0}")]
  PathDecode(#[from] std::string::FromUtf8Error),
}

/// 列表中的一行：`文件名 标签`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageListEntry {
  pub filename: String,
  pub label: Option<String>,
}

/// 解析 `image_list.txt`，跳过空行
pub fn parse_image_list(content: &str) -> Result<Vec<ImageListEntry>, ImageListInputError> {
  let mut entries = Vec::new();
  for (index, line) in content.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let mut parts = line.split_whitespace();
    let filename = parts.next().unwrap_or_default().to_string();
    let label = parts.next().map(str::to_string);
    if parts.next().is_some() {
      return Err(ImageListInputError::Parse {
        line: index + 1,
        content: line.to_string(),
      });
    }
    entries.push(ImageListEntry { filename, label });
  }
  Ok(entries)
}

/// 图像列表目录，`list:///data/images?shuffle&seed=42`
///
/// 按列表顺序（或按种子打乱后的顺序）循环读取图像，读取失败的文件被跳过。
/// 查询参数 `once` 表示只遍历一遍。一整轮都读不出图像时结束。
pub struct ImageListInput {
  root: PathBuf,
  entries: Vec<ImageListEntry>,
  cursor: usize,
  once: bool,
  misses: usize,
}

impl FromUrlWithScheme for ImageListInput {
  const SCHEME: &'static str = "list";
}

fn query_value<'a>(url: &'a Url, key: &str) -> Option<std::borrow::Cow<'a, str>> {
  url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v)
}

impl FromUrl for ImageListInput {
  type Error = ImageListInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageListInputError::SchemeMismatch(url.scheme().to_string()));
    }

    let seed = match query_value(url, "seed") {
      Some(v) => Some(v.parse::<u64>().map_err(|_| ImageListInputError::InvalidQuery {
        key: "seed".to_string(),
        value: v.to_string(),
      })?),
      None => None,
    };
    let shuffle = query_value(url, "shuffle").is_some() || seed.is_some();
    let once = query_value(url, "once").is_some();

    let mut input = Self::open(url_path(url)?)?;
    input.once = once;
    if shuffle {
      input.shuffle(seed.unwrap_or(0));
    }
    Ok(input)
  }
}

impl ImageListInput {
  pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, ImageListInputError> {
    let root = root.as_ref().to_path_buf();
    let list = root.join(IMAGE_LIST_FILE);
    let entries = parse_image_list(&std::fs::read_to_string(&list)?)?;
    if entries.is_empty() {
      return Err(ImageListInputError::Empty(list));
    }
    info!("图像列表 {}: {} 项", list.display(), entries.len());

    Ok(Self {
      root,
      entries,
      cursor: 0,
      once: false,
      misses: 0,
    })
  }

  /// 按种子打乱列表顺序，并从头开始
  pub fn shuffle(&mut self, seed: u64) {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    self.entries.shuffle(&mut rng);
    self.cursor = 0;
    debug!("图像列表已按种子 {} 打乱", seed);
  }

  pub fn entries(&self) -> &[ImageListEntry] {
    &self.entries
  }

  fn load(&self, entry: &ImageListEntry) -> Option<RgbHwcImage> {
    let path = self.root.join(&entry.filename);
    let decoded = ImageReader::open(&path)
      .map_err(image::ImageError::IoError)
      .and_then(|reader| reader.with_guessed_format().map_err(image::ImageError::IoError))
      .and_then(|reader| reader.decode());
    match decoded {
      Ok(image) => Some(RgbHwcImage::from(image.into_rgb8())),
      Err(e) => {
        warn!("跳过无法读取的图像 {}: {}", path.display(), e);
        None
      }
    }
  }
}

impl Iterator for ImageListInput {
  type Item = RgbHwcImage;

  fn next(&mut self) -> Option<Self::Item> {
    while self.misses < self.entries.len() {
      if self.cursor == self.entries.len() {
        if self.once {
          return None;
        }
        self.cursor = 0;
      }
      let index = self.cursor;
      self.cursor += 1;

      match self.load(&self.entries[index]) {
        Some(image) => {
          self.misses = 0;
          return Some(image);
        }
        None => self.misses += 1,
      }
    }
    warn!("图像列表中没有可读取的图像");
    None
  }
}
