// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/distortion/wgpu_device.rs - 基于 wgpu 计算着色器的加速实现
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

use std::sync::mpsc;

use bytemuck::{Pod, Zeroable, cast_slice};
use pollster::block_on;
use tracing::{debug, info, trace};
use wgpu::util::DeviceExt;

use crate::{
  distortion::{Device, Distortion, DistortionError, Geometry},
  frame::{RGB_CHANNELS, RgbHwcImage},
  jpeg::{BLOCK_LEN, BLOCK_SIZE, QuantTables, Subsampling, dct::dct_basis},
  quality::Quality,
};

const WORKGROUP_SIZE: u32 = 64;
const MAX_GROUPS_PER_DIM: u32 = 65_535;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ParamsPod {
  width: u32,
  height: u32,
  padded_width: u32,
  padded_height: u32,
  chroma_width: u32,
  chroma_height: u32,
  factor: u32,
  _pad: u32,
}

impl From<&Geometry> for ParamsPod {
  fn from(g: &Geometry) -> Self {
    Self {
      width: g.width as u32,
      height: g.height as u32,
      padded_width: g.padded_width as u32,
      padded_height: g.padded_height as u32,
      chroma_width: g.chroma_width as u32,
      chroma_height: g.chroma_height as u32,
      factor: g.factor as u32,
      _pad: 0,
    }
  }
}

/// GPU 上的 JPEG 压缩失真
///
/// 三个计算通道依次执行：色彩转换与下采样、逐块重量化、上采样与合成。
/// 使用与 [`HostDistortion`](super::HostDistortion) 相同的 DCT 基与量化表。
pub struct WgpuDistortion {
  subsampling: Subsampling,
  device: wgpu::Device,
  queue: wgpu::Queue,
  layout: wgpu::BindGroupLayout,
  color_convert: wgpu::ComputePipeline,
  requantize: wgpu::ComputePipeline,
  compose: wgpu::ComputePipeline,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
  wgpu::BindGroupLayoutEntry {
    binding,
    visibility: wgpu::ShaderStages::COMPUTE,
    ty: wgpu::BindingType::Buffer {
      ty: wgpu::BufferBindingType::Storage { read_only },
      has_dynamic_offset: false,
      min_binding_size: None,
    },
    count: None,
  }
}

impl WgpuDistortion {
  pub fn new(subsampling: Subsampling) -> Result<Self, DistortionError> {
    let instance = wgpu::Instance::default();
    let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
      .ok_or_else(|| DistortionError::DeviceUnavailable("未找到可用的 wgpu 适配器".to_string()))?;
    let adapter_info = adapter.get_info();
    info!(
      "使用 GPU 适配器: {} ({:?})",
      adapter_info.name, adapter_info.backend
    );

    let (device, queue) = block_on(adapter.request_device(
      &wgpu::DeviceDescriptor {
        label: Some("zhuomo.distortion.device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
      },
      None,
    ))
    .map_err(|e| DistortionError::DeviceUnavailable(e.to_string()))?;

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("zhuomo.distortion.layout"),
      entries: &[
        storage_entry(0, true),
        storage_entry(1, false),
        storage_entry(2, false),
        storage_entry(3, true),
        wgpu::BindGroupLayoutEntry {
          binding: 4,
          visibility: wgpu::ShaderStages::COMPUTE,
          ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
          },
          count: None,
        },
      ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
      label: Some("zhuomo.distortion.pipeline_layout"),
      bind_group_layouts: &[&layout],
      push_constant_ranges: &[],
    });

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
      label: Some("zhuomo.distortion.shader"),
      source: wgpu::ShaderSource::Wgsl(include_str!("jpeg_distortion.wgsl").into()),
    });

    let pipeline = |entry_point: &str| {
      device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(entry_point),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point,
        compilation_options: wgpu::PipelineCompilationOptions::default(),
      })
    };
    let color_convert = pipeline("color_convert");
    let requantize = pipeline("requantize");
    let compose = pipeline("compose");

    Ok(Self {
      subsampling,
      device,
      queue,
      layout,
      color_convert,
      requantize,
      compose,
    })
  }

  pub fn subsampling(&self) -> Subsampling {
    self.subsampling
  }
}

/// 工作组数量超过单维上限时折到第二维
fn dispatch_size(invocations: usize) -> (u32, u32) {
  let groups = (invocations as u32).div_ceil(WORKGROUP_SIZE).max(1);
  let x = groups.min(MAX_GROUPS_PER_DIM);
  (x, groups.div_ceil(x))
}

fn pack_pixels(image: &RgbHwcImage) -> Vec<u32> {
  image
    .as_hwc()
    .chunks_exact(RGB_CHANNELS)
    .map(|p| p[0] as u32 | (p[1] as u32) << 8 | (p[2] as u32) << 16)
    .collect()
}

fn pack_tables(tables: &QuantTables) -> Vec<f32> {
  let mut packed = Vec::with_capacity(3 * BLOCK_LEN);
  packed.extend_from_slice(dct_basis());
  packed.extend(tables.luma.values.iter().map(|&v| v as f32));
  packed.extend(tables.chroma.values.iter().map(|&v| v as f32));
  packed
}

impl Distortion for WgpuDistortion {
  fn device(&self) -> Device {
    Device::Accelerator
  }

  fn distort(
    &self,
    image: &RgbHwcImage,
    quality: Quality,
  ) -> Result<RgbHwcImage, DistortionError> {
    image.validate()?;
    trace!(
      "GPU 失真: {}x{}, 质量 {}",
      image.height(),
      image.width(),
      quality
    );

    let geometry = Geometry::new(image.height(), image.width(), self.subsampling);
    let params = ParamsPod::from(&geometry);
    let pixels = pack_pixels(image);
    let tables = pack_tables(&QuantTables::for_quality(quality));

    let luma_len = geometry.padded_width * geometry.padded_height;
    let chroma_len = geometry.chroma_width * geometry.chroma_height;
    let planes_bytes = ((luma_len + 2 * chroma_len) * std::mem::size_of::<f32>()) as u64;
    let output_bytes = (pixels.len() * std::mem::size_of::<u32>()) as u64;

    let pixel_buffer = self
      .device
      .create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("zhuomo.distortion.pixels"),
        contents: cast_slice(&pixels),
        usage: wgpu::BufferUsages::STORAGE,
      });
    let table_buffer = self
      .device
      .create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("zhuomo.distortion.tables"),
        contents: cast_slice(&tables),
        usage: wgpu::BufferUsages::STORAGE,
      });
    let params_buffer = self
      .device
      .create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("zhuomo.distortion.params"),
        contents: bytemuck::bytes_of(&params),
        usage: wgpu::BufferUsages::UNIFORM,
      });
    let plane_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
      label: Some("zhuomo.distortion.planes"),
      size: planes_bytes,
      usage: wgpu::BufferUsages::STORAGE,
      mapped_at_creation: false,
    });
    let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
      label: Some("zhuomo.distortion.output"),
      size: output_bytes,
      usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
      mapped_at_creation: false,
    });
    let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
      label: Some("zhuomo.distortion.staging"),
      size: output_bytes,
      usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
      mapped_at_creation: false,
    });

    let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
      label: Some("zhuomo.distortion.bind_group"),
      layout: &self.layout,
      entries: &[
        wgpu::BindGroupEntry {
          binding: 0,
          resource: pixel_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 1,
          resource: plane_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 2,
          resource: output_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 3,
          resource: table_buffer.as_entire_binding(),
        },
        wgpu::BindGroupEntry {
          binding: 4,
          resource: params_buffer.as_entire_binding(),
        },
      ],
    });

    let luma_blocks = luma_len / (BLOCK_SIZE * BLOCK_SIZE);
    let chroma_blocks = chroma_len / (BLOCK_SIZE * BLOCK_SIZE);
    let passes = [
      (&self.color_convert, chroma_len),
      (&self.requantize, luma_blocks + 2 * chroma_blocks),
      (&self.compose, geometry.width * geometry.height),
    ];

    let mut encoder = self
      .device
      .create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("zhuomo.distortion.encoder"),
      });
    // 每个通道单独提交一个计算 pass，保证前一步的写入对后一步可见
    for (pipeline, invocations) in passes {
      let (x, y) = dispatch_size(invocations);
      let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some("zhuomo.distortion.pass"),
        timestamp_writes: None,
      });
      pass.set_pipeline(pipeline);
      pass.set_bind_group(0, &bind_group, &[]);
      pass.dispatch_workgroups(x, y, 1);
    }
    encoder.copy_buffer_to_buffer(&output_buffer, 0, &staging_buffer, 0, output_bytes);
    self.queue.submit(Some(encoder.finish()));

    let slice = staging_buffer.slice(..);
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
      let _ = sender.send(res);
    });
    self.device.poll(wgpu::Maintain::Wait);
    receiver
      .recv()
      .map_err(|e| DistortionError::DeviceTransferFailure(e.to_string()))?
      .map_err(|e| DistortionError::DeviceTransferFailure(e.to_string()))?;

    let mut data = Vec::with_capacity(pixels.len() * RGB_CHANNELS);
    {
      let mapped = slice.get_mapped_range();
      let packed: &[u32] = cast_slice(&mapped);
      for &p in packed {
        data.extend_from_slice(&[p as u8, (p >> 8) as u8, (p >> 16) as u8]);
      }
    }
    staging_buffer.unmap();
    debug!("GPU 结果已回传: {} 字节", output_bytes);

    Ok(RgbHwcImage::from_raw(
      geometry.height,
      geometry.width,
      RGB_CHANNELS,
      data,
    )?)
  }
}
