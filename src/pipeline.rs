// 该文件是 Zhuomo （琢磨） 项目的一部分。
// src/pipeline.rs - 失真流水线与运行方式
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

use std::{thread, time::Duration};

use tracing::{debug, info, warn};

use crate::{
  batch::{BatchElement, BatchRunner},
  distortion::Distortion,
  frame::Sample,
  output::Render,
  quality::{Quality, QualitySource},
};

/// 一次运行的结果：失真输出、原始输入以及各元素使用的质量，三者按序对应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
  pub outputs: Vec<Sample>,
  pub inputs: Vec<Sample>,
  pub qualities: Vec<Quality>,
}

impl PipelineOutput {
  pub fn len(&self) -> usize {
    self.outputs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.outputs.is_empty()
  }

  /// 按 `(样本序号, 帧序号, 输入帧, 输出帧, 质量)` 遍历所有帧
  pub fn frames(
    &self,
  ) -> impl Iterator<
    Item = (
      usize,
      usize,
      &crate::frame::RgbHwcImage,
      &crate::frame::RgbHwcImage,
      Quality,
    ),
  > + '_ {
    self
      .inputs
      .iter()
      .zip(&self.outputs)
      .zip(&self.qualities)
      .enumerate()
      .flat_map(|(i, ((input, output), &quality))| {
        input
          .frames()
          .iter()
          .zip(output.frames())
          .enumerate()
          .map(move |(j, (a, b))| (i, j, a, b, quality))
      })
  }
}

/// 从输入取一个批次、从质量来源取对应的质量，再交给批次执行器
pub struct DistortionPipeline<I, Q, D> {
  input: I,
  qualities: Q,
  runner: BatchRunner<D>,
  batch_size: usize,
}

impl<I, Q, D> DistortionPipeline<I, Q, D>
where
  I: Iterator<Item = Sample>,
  Q: QualitySource,
  D: Distortion,
{
  pub fn new(input: I, qualities: Q, runner: BatchRunner<D>, batch_size: usize) -> Self {
    Self {
      input,
      qualities,
      runner,
      batch_size,
    }
  }

  pub fn batch_size(&self) -> usize {
    self.batch_size
  }

  pub fn run(&mut self) -> anyhow::Result<PipelineOutput> {
    let inputs: Vec<Sample> = self.input.by_ref().take(self.batch_size).collect();
    if inputs.len() < self.batch_size {
      anyhow::bail!(
        "输入不足一个批次: 需要 {} 个样本，只取到 {} 个",
        self.batch_size,
        inputs.len()
      );
    }

    let qualities = self.qualities.next_batch(self.batch_size)?;
    debug!("本批次质量: {:?}", qualities);

    let batch: Vec<BatchElement> = inputs.iter().cloned().zip(qualities.iter().copied()).collect();
    let outputs = self.runner.run_batch(&batch)?;

    Ok(PipelineOutput {
      outputs,
      inputs,
      qualities,
    })
  }
}

pub trait Task<P, O>: Sized {
  type Error;
  fn run_task(self, pipeline: P, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<I, Q, D, O, RE> Task<DistortionPipeline<I, Q, D>, O> for OneShotTask
where
  I: Iterator<Item = Sample>,
  Q: QualitySource,
  D: Distortion,
  O: Render<PipelineOutput, Error = RE>,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut pipeline: DistortionPipeline<I, Q, D>, output: O) -> anyhow::Result<()> {
    info!("开始任务...");
    let now = std::time::Instant::now();
    let result = pipeline.run()?;
    let elapsed = now.elapsed();
    info!("失真完成，耗时: {:.2?}", elapsed);
    output.render_result(&result)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 连续运行固定次数，输出平均耗时
pub struct RepeatShotTask {
  times: usize,
}

impl RepeatShotTask {
  pub fn new(times: usize) -> Self {
    Self { times }
  }
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { times: 3 }
  }
}

impl<I, Q, D, O, RE> Task<DistortionPipeline<I, Q, D>, O> for RepeatShotTask
where
  I: Iterator<Item = Sample>,
  Q: QualitySource,
  D: Distortion,
  O: Render<PipelineOutput, Error = RE>,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut pipeline: DistortionPipeline<I, Q, D>, output: O) -> anyhow::Result<()> {
    info!("开始任务，共 {} 次...", self.times);
    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = std::time::Instant::now();
      let result = pipeline.run()?;
      let elapsed = now.elapsed();
      info!("({})失真完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&result)?;
      info!("({})输出完成，耗时: {:.2?}", i, now.elapsed());
      times.push(elapsed);
    }

    if !times.is_empty() {
      warn!(
        "平均失真时间: {:.2?}",
        times.iter().sum::<Duration>() / times.len() as u32
      );
    }

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  run_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_run_number(mut self, run_number: Option<usize>) -> Self {
    self.run_number = run_number;
    self
  }
}

impl<I, Q, D, O, RE> Task<DistortionPipeline<I, Q, D>, O> for ContinuousTask
where
  I: Iterator<Item = Sample>,
  Q: QualitySource,
  D: Distortion,
  O: Render<PipelineOutput, Error = RE>,
  RE: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut pipeline: DistortionPipeline<I, Q, D>, output: O) -> anyhow::Result<()> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;

    let mut run_index = 0usize;
    loop {
      run_index += 1;
      info!("第 {} 次运行", run_index);
      let now = std::time::Instant::now();
      let result = pipeline.run()?;
      let elapsed_a = now.elapsed();
      output.render_result(&result)?;
      let elapsed_b = now.elapsed();
      info!("运行完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);

      if self.run_number.map(|n| run_index >= n).unwrap_or(false) {
        info!("达到指定运行次数 {}, 退出任务循环", run_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, convert::Infallible};

  use super::*;
  use crate::{
    distortion::HostDistortion,
    frame::RgbHwcImage,
    quality::{QualityList, QualitySampler, QualitySpec},
  };

  fn images() -> impl Iterator<Item = Sample> {
    (0u8..).map(|i| {
      Sample::Image(
        RgbHwcImage::from_fn(12, 20, move |y, x| [i.wrapping_mul(9), (x * 10) as u8, (y * 20) as u8])
          .unwrap(),
      )
    })
  }

  fn runner() -> BatchRunner<HostDistortion> {
    BatchRunner::with_threads(HostDistortion::default(), 2).unwrap()
  }

  #[derive(Default)]
  struct Collect {
    runs: RefCell<Vec<PipelineOutput>>,
  }

  impl Render<PipelineOutput> for Collect {
    type Error = Infallible;

    fn render_result(&self, result: &PipelineOutput) -> Result<(), Self::Error> {
      self.runs.borrow_mut().push(result.clone());
      Ok(())
    }
  }

  #[test]
  fn run_returns_aligned_triples() {
    let qualities = QualityList::new(vec![Quality::new(2).unwrap(), Quality::new(50).unwrap()]).unwrap();
    let mut pipeline = DistortionPipeline::new(images(), qualities, runner(), 3);
    let out = pipeline.run().unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out.inputs.len(), 3);
    assert_eq!(
      out.qualities.iter().map(|q| q.value()).collect::<Vec<_>>(),
      vec![2, 50, 2]
    );
    assert_eq!(out.frames().count(), 3);

    let op = HostDistortion::default();
    for (_, _, input, output, quality) in out.frames() {
      assert_eq!(&op.distort(input, quality).unwrap(), output);
    }
  }

  #[test]
  fn seeded_runs_are_reproducible() {
    let run = || {
      let sampler = QualitySampler::new(QualitySpec::default(), 11, 4).unwrap();
      let mut pipeline = DistortionPipeline::new(images(), sampler, runner(), 4);
      (0..2).map(|_| pipeline.run().unwrap()).collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
  }

  #[test]
  fn short_input_is_an_error() {
    let sampler = QualitySampler::new(QualitySpec::default(), 0, 4).unwrap();
    let mut pipeline = DistortionPipeline::new(images().take(3), sampler, runner(), 4);
    assert!(pipeline.run().is_err());
  }

  #[test]
  fn repeat_task_renders_every_run() {
    let sampler = QualitySampler::new(QualitySpec::default(), 5, 2).unwrap();
    let pipeline = DistortionPipeline::new(images(), sampler, runner(), 2);
    let sink = Collect::default();
    RepeatShotTask::new(3).run_task(pipeline, &sink).unwrap();
    assert_eq!(sink.runs.borrow().len(), 3);
  }
}
