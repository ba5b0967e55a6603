// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/bin/compare_reference.rs - 与参考编解码器对照
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

use tracing::{info, warn};
use zhuomo::{
  FromUrl,
  config::PipelineArgs,
  input::InputWrapper,
  output::DirectoryRecordOutput,
  pipeline::{ContinuousTask, DistortionPipeline, RepeatShotTask, Task},
  reference::{DEFAULT_THRESHOLD, ReferenceCheck},
};

/// 多次运行失真流水线，把每一帧与参考 JPEG 编解码结果比较
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源，通常是 `list:///path/to/dir?shuffle`
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 平均绝对误差阈值
  #[arg(long, default_value_t = DEFAULT_THRESHOLD, value_name = "DIFF")]
  pub threshold: f64,

  /// 超过阈值的帧与参考结果保存到该目录，`folder:///path/to/dir`
  #[arg(long, value_name = "DUMP")]
  pub dump_broken: Option<Url>,

  /// 运行次数
  #[arg(long, default_value_t = 3, value_name = "COUNT")]
  pub runs: usize,

  /// 持续运行直到收到中断信号（或达到 --runs，当 --runs 不为 0 时）
  #[arg(long)]
  pub continuous: bool,

  #[command(flatten)]
  pub pipeline: PipelineArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  let config = args.pipeline.into_config()?;
  info!("流水线配置: {:?}", config);

  let dump = args
    .dump_broken
    .as_ref()
    .map(DirectoryRecordOutput::from_url)
    .transpose()?;
  let check = ReferenceCheck::new(args.threshold, config.subsampling)?.with_dump(dump);

  let input = InputWrapper::from_url(&args.input)?
    .into_samples(config.layout, config.sequence_length);
  let pipeline = DistortionPipeline::new(
    input,
    config.quality_sampler()?,
    config.batch_runner()?,
    config.batch_size,
  );

  let result = if args.continuous {
    let run_number = (args.runs > 0).then_some(args.runs);
    ContinuousTask::default()
      .with_run_number(run_number)
      .run_task(pipeline, &check)
  } else {
    RepeatShotTask::new(args.runs).run_task(pipeline, &check)
  };

  let stats = check.stats();
  info!(
    "共比较 {} 帧, 超过阈值 {} 帧, 平均误差 {:.3}, 最大误差 {:.3}",
    stats.frames,
    stats.failures,
    stats.mean_diff(),
    stats.max_diff
  );
  if let Err(e) = &result {
    warn!("对照失败: {}", e);
  }
  result
}
