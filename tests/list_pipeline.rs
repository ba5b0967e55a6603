// 该文件是 Zhuomo （琢磨） 项目的一部分。
// tests/list_pipeline.rs - 从图像列表到参考对照的完整流程
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

#![cfg(all(feature = "read_image_file", feature = "reference"))]

use std::path::PathBuf;

use url::Url;
use zhuomo::{
  FromUrl,
  batch::BatchRunner,
  distortion::HostDistortion,
  frame::Layout,
  input::{IMAGE_LIST_FILE, InputWrapper},
  jpeg::Subsampling,
  output::Render,
  pipeline::{DistortionPipeline, RepeatShotTask, Task},
  quality::{Quality, QualitySampler, QualitySpec},
  reference::ReferenceCheck,
};

fn fixture(name: &str) -> PathBuf {
  let dir = std::env::temp_dir().join(format!("zhuomo-it-{}-{}", name, std::process::id()));
  let _ = std::fs::remove_dir_all(&dir);
  std::fs::create_dir_all(&dir).unwrap();

  let mut list = String::new();
  for i in 0..4u32 {
    let size = 32 + 8 * i;
    let image = image::RgbImage::from_fn(size, size, |x, y| {
      image::Rgb([
        (40 + x * 4 + i * 10).min(255) as u8,
        (200 - y * 3) as u8,
        (90 + (x + y) * 2).min(255) as u8,
      ])
    });
    let name = format!("frame{}.png", i);
    image.save(dir.join(&name)).unwrap();
    list.push_str(&format!("{} {}\n", name, i));
  }
  // 不存在的文件会被跳过
  list.push_str("missing.png\n");
  std::fs::write(dir.join(IMAGE_LIST_FILE), list).unwrap();
  dir
}

fn fixed(quality: i64) -> QualitySampler {
  let spec = QualitySpec::Fixed(Quality::new(quality).unwrap());
  QualitySampler::new(spec, 0, 2).unwrap()
}

fn runner() -> BatchRunner<HostDistortion> {
  BatchRunner::with_threads(HostDistortion::new(Subsampling::Yuv444), 2).unwrap()
}

#[test]
fn single_images_pass_reference_check() {
  let dir = fixture("single");
  let url = Url::parse(&format!("list://{}?seed=3", dir.display())).unwrap();
  let input = InputWrapper::from_url(&url)
    .unwrap()
    .into_samples(Layout::SingleImage, 10);

  let pipeline = DistortionPipeline::new(input, fixed(50), runner(), 2);
  let check = ReferenceCheck::new(5.0, Subsampling::Yuv444).unwrap();
  RepeatShotTask::new(3).run_task(pipeline, &check).unwrap();

  let stats = check.stats();
  assert_eq!(stats.frames, 6);
  assert_eq!(stats.failures, 0);
  assert!(stats.mean_diff() < 5.0);

  std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn sequences_cycle_through_the_list() {
  let dir = fixture("sequence");
  let url = Url::parse(&format!("list://{}", dir.display())).unwrap();
  let input = InputWrapper::from_url(&url)
    .unwrap()
    .into_samples(Layout::Sequence, 5);

  let mut pipeline = DistortionPipeline::new(input, fixed(50), runner(), 2);
  let out = pipeline.run().unwrap();
  assert_eq!(out.len(), 2);
  for sample in &out.outputs {
    assert_eq!(sample.layout(), Layout::Sequence);
    assert_eq!(sample.num_frames(), 6);
  }
  // 列表按顺序循环，第一个序列以最小的图像开头
  assert_eq!(out.outputs[0].frames()[0].shape(), (32, 32, 3));

  let check = ReferenceCheck::new(5.0, Subsampling::Yuv444).unwrap();
  check.render_result(&out).unwrap();
  assert_eq!(check.stats().frames, 12);

  std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn strict_threshold_reports_failure() {
  let dir = fixture("strict");
  let url = Url::parse(&format!("list://{}?once", dir.display())).unwrap();
  let input = InputWrapper::from_url(&url)
    .unwrap()
    .into_samples(Layout::SingleImage, 0);

  let mut pipeline = DistortionPipeline::new(input, fixed(5), runner(), 2);
  let out = pipeline.run().unwrap();
  let check = ReferenceCheck::new(0.0, Subsampling::Yuv444).unwrap();
  assert!(check.render_result(&out).is_err());
  assert_eq!(check.stats().failures, 2);

  std::fs::remove_dir_all(dir).unwrap();
}
