// 该文件是 Zhuomo （琢磨） 项目的一部分。
// tests/cross_device.rs - CPU 与 GPU 实现一致性
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

#![cfg(feature = "wgpu")]

use zhuomo::{
  batch::BatchRunner,
  distortion::{Device, Distortion, DistortionError, HostDistortion, WgpuDistortion},
  frame::{RgbFhwcSequence, RgbHwcImage, Sample},
  jpeg::Subsampling,
  quality::Quality,
};

/// 设置后没有可用适配器视为测试失败
const REQUIRE_GPU: &str = "ZHUOMO_REQUIRE_GPU";

/// 没有可用适配器时打印跳过原因并返回 `None`
fn accelerator(subsampling: Subsampling) -> Option<WgpuDistortion> {
  match WgpuDistortion::new(subsampling) {
    Ok(op) => Some(op),
    Err(DistortionError::DeviceUnavailable(reason)) => {
      if std::env::var_os(REQUIRE_GPU).is_some() {
        panic!("{} 已设置，但没有可用的 GPU 适配器: {}", REQUIRE_GPU, reason);
      }
      eprintln!("跳过 GPU 测试（没有可用适配器）: {}", reason);
      None
    }
    Err(e) => panic!("unexpected error: {}", e),
  }
}

fn image(height: usize, width: usize) -> RgbHwcImage {
  RgbHwcImage::from_fn(height, width, |y, x| {
    let fx = x as f32 / width as f32;
    let fy = y as f32 / height as f32;
    [
      (30.0 + 200.0 * fx) as u8,
      (220.0 - 150.0 * fy) as u8,
      (100.0 + 60.0 * (fx * 6.0).sin()) as u8,
    ]
  })
  .unwrap()
}

fn compare(a: &RgbHwcImage, b: &RgbHwcImage) -> (f64, u8) {
  assert_eq!(a.shape(), b.shape());
  let mut total = 0u64;
  let mut max = 0u8;
  for (&x, &y) in a.as_hwc().iter().zip(b.as_hwc()) {
    let d = x.abs_diff(y);
    total += d as u64;
    max = max.max(d);
  }
  (total as f64 / a.as_hwc().len() as f64, max)
}

#[test]
#[ignore = "需要 GPU 适配器: ZHUOMO_REQUIRE_GPU=1 cargo test --features wgpu -- --ignored"]
fn host_and_accelerator_agree() {
  for subsampling in [Subsampling::Yuv420, Subsampling::Yuv444] {
    let Some(gpu) = accelerator(subsampling) else {
      return;
    };
    assert_eq!(gpu.device(), Device::Accelerator);
    let cpu = HostDistortion::new(subsampling);

    for (h, w) in [(1, 1), (16, 16), (31, 47), (64, 64)] {
      let input = image(h, w);
      for quality in [2, 50, 90] {
        let quality = Quality::new(quality).unwrap();
        let a = cpu.distort(&input, quality).unwrap();
        let b = gpu.distort(&input, quality).unwrap();
        let (mean, max) = compare(&a, &b);
        assert!(
          mean < 0.5,
          "{:?} {}x{} q={}: mean {} max {}",
          subsampling,
          h,
          w,
          quality,
          mean,
          max
        );
      }
    }
  }
}

#[test]
#[ignore = "需要 GPU 适配器: ZHUOMO_REQUIRE_GPU=1 cargo test --features wgpu -- --ignored"]
fn accelerator_batch_runs_sequences() {
  let Some(gpu) = accelerator(Subsampling::default()) else {
    return;
  };
  let sequence = RgbFhwcSequence::new((0..4).map(|_| image(24, 40)).collect()).unwrap();
  let runner = BatchRunner::with_threads(gpu, 2).unwrap();
  let out = runner
    .run_batch(&[
      (Sample::Sequence(sequence), Quality::new(20).unwrap()),
      (Sample::Image(image(10, 10)), Quality::new(80).unwrap()),
    ])
    .unwrap();
  assert_eq!(out[0].num_frames(), 4);
  assert_eq!(out[1].frames()[0].shape(), (10, 10, 3));
}
