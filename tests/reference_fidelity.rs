// 该文件是 Zhuomo （琢磨） 项目的一部分。
// tests/reference_fidelity.rs - 与参考编解码器的一致性
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

#![cfg(feature = "reference")]

use zhuomo::{
  config::PipelineConfig,
  distortion::{Distortion, HostDistortion},
  frame::{RgbHwcImage, Sample},
  jpeg::Subsampling,
  pipeline::{DistortionPipeline, RepeatShotTask, Task},
  quality::Quality,
  reference::{DEFAULT_THRESHOLD, REFERENCE_SUBSAMPLING, ReferenceCheck, mean_abs_diff, reference_distort},
};

fn q(v: i64) -> Quality {
  Quality::new(v).unwrap()
}

/// 平滑的彩色渐变加上轻微的纹理
fn photo_like(height: usize, width: usize) -> RgbHwcImage {
  RgbHwcImage::from_fn(height, width, |y, x| {
    let fx = x as f32 / width as f32;
    let fy = y as f32 / height as f32;
    let ripple = ((x as f32 * 0.4).sin() * (y as f32 * 0.3).cos()) * 12.0;
    [
      (40.0 + 160.0 * fx + ripple).clamp(0.0, 255.0) as u8,
      (60.0 + 120.0 * fy - ripple).clamp(0.0, 255.0) as u8,
      (200.0 - 100.0 * (fx + fy) / 2.0 + ripple * 0.5).clamp(0.0, 255.0) as u8,
    ]
  })
  .unwrap()
}

fn detailed(height: usize, width: usize) -> RgbHwcImage {
  RgbHwcImage::from_fn(height, width, |y, x| {
    let v = ((x * 37 + y * 91) % 256) as u8;
    [v, v.wrapping_mul(3), 255 - v]
  })
  .unwrap()
}

#[test]
fn matches_reference_at_quality_50() {
  let image = photo_like(64, 64);
  let reference = reference_distort(&image, q(50)).unwrap();
  let out = HostDistortion::default().distort(&image, q(50)).unwrap();
  let diff = mean_abs_diff(&out, &reference).unwrap();
  assert!(diff < DEFAULT_THRESHOLD, "mean abs diff {}", diff);
}

#[test]
fn default_subsampling_is_the_reference_one() {
  assert_eq!(Subsampling::default(), REFERENCE_SUBSAMPLING);
  assert_eq!(PipelineConfig::default().subsampling, REFERENCE_SUBSAMPLING);
}

#[test]
fn matches_reference_at_low_qualities() {
  let op = HostDistortion::default();
  for image in [photo_like(64, 64), photo_like(37, 53)] {
    for quality in [1, 2, 5, 10, 20] {
      let reference = reference_distort(&image, q(quality)).unwrap();
      let out = op.distort(&image, q(quality)).unwrap();
      let diff = mean_abs_diff(&out, &reference).unwrap();
      assert!(
        diff < DEFAULT_THRESHOLD,
        "{:?} q = {}: mean abs diff {}",
        image.shape(),
        quality,
        diff
      );
    }
  }
}

#[test]
fn default_config_passes_reference_check() {
  let config = PipelineConfig {
    batch_size: 15,
    seed: 1,
    ..Default::default()
  };
  let images = (0..).map(|i: usize| Sample::Image(photo_like(24 + i % 5 * 8, 40 - i % 3 * 7)));
  let pipeline = DistortionPipeline::new(
    images,
    config.quality_sampler().unwrap(),
    config.batch_runner().unwrap(),
    config.batch_size,
  );
  let check = ReferenceCheck::new(DEFAULT_THRESHOLD, config.subsampling).unwrap();
  RepeatShotTask::new(2).run_task(pipeline, &check).unwrap();

  let stats = check.stats();
  assert_eq!(stats.frames, 30);
  assert_eq!(stats.failures, 0);
}

#[test]
fn matches_reference_across_qualities() {
  let image = photo_like(48, 80);
  let op = HostDistortion::new(Subsampling::Yuv444);
  for quality in [30, 50, 75, 90, 99] {
    let reference = reference_distort(&image, q(quality)).unwrap();
    let out = op.distort(&image, q(quality)).unwrap();
    let diff = mean_abs_diff(&out, &reference).unwrap();
    assert!(diff < 5.0, "q = {}: mean abs diff {}", quality, diff);
  }
}

#[test]
fn error_shrinks_as_quality_rises() {
  let image = detailed(64, 64);
  let op = HostDistortion::default();
  let errors: Vec<f64> = [5, 25, 50, 75, 95]
    .into_iter()
    .map(|quality| mean_abs_diff(&image, &op.distort(&image, q(quality)).unwrap()).unwrap())
    .collect();
  for pair in errors.windows(2) {
    assert!(pair[0] > pair[1], "errors not decreasing: {:?}", errors);
  }
}

#[test]
fn output_is_deterministic() {
  let image = photo_like(37, 53);
  let op = HostDistortion::default();
  let first = op.distort(&image, q(2)).unwrap();
  for _ in 0..3 {
    assert_eq!(op.distort(&image, q(2)).unwrap(), first);
  }
}
