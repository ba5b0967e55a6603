// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/jpeg/color.rs - RGB 与 YCbCr 转换
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

//! JFIF 全范围 BT.601 转换，与常见 JPEG 编解码器一致。

use super::round_half_up;

/// RGB → YCbCr，不做取整
#[inline]
pub fn rgb_to_ycbcr(r: f32, g: f32, b: f32) -> [f32; 3] {
  let y = 0.299 * r + 0.587 * g + 0.114 * b;
  let cb = -0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0;
  let cr = 0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0;
  [y, cb, cr]
}

/// YCbCr → RGB，四舍五入并截断到 8 位
#[inline]
pub fn ycbcr_to_rgb(y: f32, cb: f32, cr: f32) -> [u8; 3] {
  let cb = cb - 128.0;
  let cr = cr - 128.0;
  let r = y + 1.402 * cr;
  let g = y - 0.344_136 * cb - 0.714_136 * cr;
  let b = y + 1.772 * cb;
  [to_u8(r), to_u8(g), to_u8(b)]
}

#[inline]
fn to_u8(value: f32) -> u8 {
  round_half_up(value).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gray_has_neutral_chroma() {
    let [y, cb, cr] = rgb_to_ycbcr(90.0, 90.0, 90.0);
    assert!((y - 90.0).abs() < 1e-3);
    assert!((cb - 128.0).abs() < 1e-3);
    assert!((cr - 128.0).abs() < 1e-3);
  }

  #[test]
  fn roundtrip_primaries() {
    for rgb in [[255u8, 0, 0], [0, 255, 0], [0, 0, 255], [12, 200, 99], [255, 255, 255]] {
      let [y, cb, cr] = rgb_to_ycbcr(rgb[0] as f32, rgb[1] as f32, rgb[2] as f32);
      let back = ycbcr_to_rgb(y, cb, cr);
      for c in 0..3 {
        assert!((back[c] as i32 - rgb[c] as i32).abs() <= 1, "{:?} -> {:?}", rgb, back);
      }
    }
  }

  #[test]
  fn out_of_gamut_is_clamped() {
    assert_eq!(ycbcr_to_rgb(250.0, 255.0, 255.0)[0], 255);
    assert_eq!(ycbcr_to_rgb(5.0, 0.0, 0.0)[0], 0);
  }
}
