// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/bin/distort_oneshot.rs - 单次失真
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use tracing::info;
use zhuomo::{
  FromUrl,
  config::PipelineArgs,
  input::InputWrapper,
  output::OutputWrapper,
  pipeline::{DistortionPipeline, OneShotTask, Task},
};

/// 对输入做一次 JPEG 压缩失真并保存结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源，`image:///path/to/file.png` 或 `list:///path/to/dir`
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，`image:///path/to/out.png` 或 `folder:///path/to/dir`
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[command(flatten)]
  pub pipeline: PipelineArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = args.pipeline.into_config()?;
  info!("流水线配置: {:?}", config);

  let input = InputWrapper::from_url(&args.input)?
    .into_samples(config.layout, config.sequence_length);
  let output = OutputWrapper::from_url(&args.output)?;
  let pipeline = DistortionPipeline::new(
    input,
    config.quality_sampler()?,
    config.batch_runner()?,
    config.batch_size,
  );

  OneShotTask.run_task(pipeline, output)?;

  Ok(())
}
