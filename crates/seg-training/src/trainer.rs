//! Training loop for segmentation models.
//!
//! `train_step` runs one optimization step; `Trainer` drives the epochs
//! (logging, learning rate decay, held-out evaluation) and `run_training`
//! wires datasets, model, trainer and checkpoint together.

use std::path::PathBuf;

use burn::data::dataset::Dataset;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use seg_core::metrics::{ACCURACY, LOSS};
use seg_core::{
    EpochRecord, Error, MetricsAccumulator, OptimConfig, Result, TrainingConfig, TrainingHistory,
};
use seg_dataset::{
    create_datasets, DatasetStatistics, SegmentationBatch, SegmentationDataset, SegmentationLoader,
};
use tracing::{debug, info};

use crate::accuracy::pixel_accuracy;
use crate::checkpoint::{save_checkpoint, CheckpointMetadata};
use crate::evaluator::{evaluate, EvaluationResult};
use crate::loss::{segmentation_loss, SegmentationLossConfig};
use crate::lr_schedule::{LearningRateScheduler, SchedulerType};
use crate::model::{SegmentationModel, UNetConfig};

/// Scalar results of one training step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutput {
    pub loss: f64,
    /// Pixel accuracy in percent
    pub accuracy: f64,
}

/// Forward, loss, backward and optimizer update on one batch.
///
/// Gradients come fresh from the loss graph of this step, so nothing has
/// to be cleared between steps. Returns the updated model.
pub fn train_step<B, M, O>(
    model: M,
    optimizer: &mut O,
    learning_rate: f64,
    batch: SegmentationBatch<B>,
    loss_config: &SegmentationLossConfig,
) -> (M, StepOutput)
where
    B: AutodiffBackend,
    M: SegmentationModel<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    let logits = model.forward(batch.images);
    let loss = segmentation_loss(logits.clone(), batch.masks.clone(), loss_config);
    let accuracy = pixel_accuracy(logits.detach(), batch.masks);

    let loss_value: f64 = loss.clone().into_scalar().elem();

    let grads = GradientsParams::from_grads(loss.backward(), &model);
    let model = optimizer.step(learning_rate, model, grads);

    (
        model,
        StepOutput {
            loss: loss_value,
            accuracy,
        },
    )
}

/// Epoch driver holding the schedule and the metrics of a run
pub struct Trainer {
    config: TrainingConfig,
    scheduler: LearningRateScheduler,
    metrics: MetricsAccumulator,
    history: TrainingHistory,
}

impl Trainer {
    /// Create a trainer, rejecting invalid configurations
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;

        let scheduler = LearningRateScheduler::new(
            SchedulerType::from(&config.optim.lr_schedule),
            config.optim.learning_rate,
        );

        Ok(Self {
            config,
            scheduler,
            metrics: MetricsAccumulator::new(),
            history: TrainingHistory::new(),
        })
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn scheduler(&self) -> &LearningRateScheduler {
        &self.scheduler
    }

    /// Train `model` for the configured number of epochs and return it.
    ///
    /// `test` may be empty, in which case held-out evaluation is skipped.
    pub fn fit<B, M>(
        &mut self,
        mut model: M,
        train: &SegmentationDataset,
        test: &SegmentationDataset,
        device: &B::Device,
    ) -> Result<M>
    where
        B: AutodiffBackend,
        M: SegmentationModel<B> + AutodiffModule<B>,
        M::InnerModule: SegmentationModel<B::InnerBackend>,
    {
        if train.is_empty() {
            return Err(Error::Training("training dataset is empty".to_string()));
        }

        let optim = self.config.optim.clone();
        let loss_config = SegmentationLossConfig::from(&optim);
        let mut optimizer = adam_config(&optim).init::<B, M>();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        for epoch in 0..optim.num_epochs {
            let learning_rate = self.scheduler.get_lr();

            info!("{}", "=".repeat(30));
            info!("Epoch {}/{}", epoch + 1, optim.num_epochs);
            info!("{}", "=".repeat(30));

            self.metrics.reset();

            let loader = if self.config.data.shuffle {
                SegmentationLoader::<B>::shuffled(train, optim.batch_size, device, &mut rng)
            } else {
                SegmentationLoader::<B>::sequential(train, optim.batch_size, device)
            };
            debug!("{} batches this epoch", loader.num_batches());

            for (step, batch) in loader.enumerate() {
                let (updated, output) =
                    train_step(model, &mut optimizer, learning_rate, batch, &loss_config);
                model = updated;

                self.metrics
                    .record(&[(LOSS, output.loss), (ACCURACY, output.accuracy)]);

                if step % optim.log_every == 0 {
                    let seen = (step + 1) as f64;
                    info!(
                        "loss: {:.4}\taccuracy: {:.4}%",
                        self.metrics.sum(LOSS) / seen,
                        self.metrics.sum(ACCURACY) / seen
                    );
                }
            }

            let evaluation = if test.is_empty() {
                None
            } else {
                let result = evaluate::<B::InnerBackend, _>(
                    &model.valid(),
                    test,
                    optim.batch_size,
                    device,
                    &loss_config,
                )?;
                log_evaluation(&result);
                Some(result)
            };

            self.history.push(EpochRecord {
                epoch: epoch + 1,
                train_loss: self.metrics.mean(LOSS),
                train_accuracy: self.metrics.mean(ACCURACY),
                test_loss: evaluation.as_ref().map(|r| r.loss),
                test_accuracy: evaluation.as_ref().map(|r| r.accuracy),
                learning_rate,
            });

            self.scheduler.step();
            info!("Learning rate {}", self.scheduler.get_lr());
        }

        Ok(model)
    }
}

/// Adam with the configured epsilon
pub fn adam_config(optim: &OptimConfig) -> AdamConfig {
    AdamConfig::new().with_epsilon(optim.adam_epsilon as f32)
}

fn log_evaluation(result: &EvaluationResult) {
    info!(
        "test loss: {:.4}\ttest accuracy: {:.4}%\tmIoU: {:.4}",
        result.loss,
        result.accuracy,
        result.mean_iou()
    );
    for (class, iou) in result.class_iou().iter().enumerate() {
        match iou {
            Some(iou) => debug!("  class {}: IoU {:.4}", class, iou),
            None => debug!("  class {}: absent", class),
        }
    }
}

/// Outcome of a complete training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Weight file written at the end of training
    pub checkpoint: PathBuf,
    pub history: TrainingHistory,
}

/// Build datasets and a fresh U-Net from `config`, train it and write the
/// checkpoint.
pub fn run_training<B: AutodiffBackend>(
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<TrainingReport> {
    let mut trainer = Trainer::new(config.clone())?;

    let (train, test) = create_datasets(&config.data, config.model.num_classes, config.seed)?;
    let stats = DatasetStatistics::from_items(train.items(), config.model.num_classes);
    let fractions: Vec<String> = stats
        .class_fractions()
        .iter()
        .map(|f| format!("{:.3}", f))
        .collect();
    info!(
        "Training pixels per class: {:?}, fractions [{}] ({} samples)",
        stats.class_pixels,
        fractions.join(", "),
        stats.num_samples
    );

    let model = UNetConfig::from(&config.model).init::<B>(device);
    let model = trainer.fit(model, &train, &test, device)?;

    let checkpoint = save_checkpoint(&model, &config.checkpoint_path)?;
    CheckpointMetadata::new(config.model.clone(), trainer.history().clone())
        .save(&config.checkpoint_path)?;
    info!("model saved");

    Ok(TrainingReport {
        checkpoint,
        history: trainer.history().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use seg_core::{ImageDimensions, LrScheduleType};
    use seg_dataset::{SegmentationBatcher, SyntheticShapes};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn tiny_dataset(count: usize, seed: u64) -> SegmentationDataset {
        let dims = ImageDimensions::rgb(16, 16);
        SegmentationDataset::new(SyntheticShapes::new(dims, seed).generate(count, 3).unwrap())
    }

    fn tiny_config() -> TrainingConfig {
        let mut config = TrainingConfig::default();
        config.model.base_filters = 2;
        config.optim.batch_size = 2;
        config.data.image_size = ImageDimensions::rgb(16, 16);
        config
    }

    #[test]
    fn test_train_step_updates_parameters() {
        use burn::data::dataloader::batcher::Batcher;

        let device = Default::default();
        let dataset = tiny_dataset(2, 7);
        let model = UNetConfig::new()
            .with_base_filters(2)
            .init::<TestBackend>(&device);
        let mut optimizer = adam_config(&OptimConfig::default()).init();

        let batch: SegmentationBatch<TestBackend> =
            SegmentationBatcher.batch(dataset.items().to_vec(), &device);
        let input = batch.images.clone();
        let before: Vec<f32> = model.forward(input.clone()).into_data().to_vec().unwrap();

        let (model, output) = train_step(
            model,
            &mut optimizer,
            1e-2,
            batch,
            &SegmentationLossConfig::default(),
        );

        assert!(output.loss.is_finite() && output.loss > 0.0);
        assert!((0.0..=100.0).contains(&output.accuracy));

        let after: Vec<f32> = model.forward(input).into_data().to_vec().unwrap();
        assert!(before.iter().zip(&after).any(|(a, b)| (a - b).abs() > 1e-7));
    }

    #[test]
    fn test_trainer_rejects_invalid_config() {
        let mut config = tiny_config();
        config.optim.batch_size = 0;
        assert!(Trainer::new(config).is_err());
    }

    #[test]
    fn test_fit_records_history_and_decays_rate() {
        let device = Default::default();
        let mut config = tiny_config();
        config.optim.num_epochs = 2;
        config.optim.lr_schedule.step_size = 1;

        let train = tiny_dataset(3, 1);
        let test = tiny_dataset(2, 2);
        let model = UNetConfig::from(&config.model).init::<TestBackend>(&device);

        let mut trainer = Trainer::new(config).unwrap();
        trainer.fit(model, &train, &test, &device).unwrap();

        let epochs = &trainer.history().epochs;
        assert_eq!(epochs.len(), 2);
        assert_eq!(epochs[0].learning_rate, 1e-4);
        assert!((epochs[1].learning_rate - 1e-5).abs() < 1e-12);
        assert!(epochs.iter().all(|e| e.test_accuracy.is_some()));
        assert!(epochs.iter().all(|e| e.train_loss.is_finite()));
        assert_eq!(trainer.scheduler().current_epoch(), 2);
    }

    #[test]
    fn test_fit_without_test_split() {
        let device = Default::default();
        let mut config = tiny_config();
        config.optim.lr_schedule.schedule_type = LrScheduleType::Constant;

        let model = UNetConfig::from(&config.model).init::<TestBackend>(&device);
        let mut trainer = Trainer::new(config).unwrap();
        trainer
            .fit(model, &tiny_dataset(2, 3), &SegmentationDataset::default(), &device)
            .unwrap();

        let record = trainer.history().last().unwrap();
        assert_eq!(record.test_loss, None);
        assert_eq!(record.learning_rate, 1e-4);
        assert_eq!(trainer.scheduler().get_lr(), 1e-4);
    }

    #[test]
    fn test_fit_rejects_empty_training_set() {
        let device = Default::default();
        let config = tiny_config();
        let model = UNetConfig::from(&config.model).init::<TestBackend>(&device);
        let mut trainer = Trainer::new(config).unwrap();

        let empty = SegmentationDataset::default();
        assert!(matches!(
            trainer.fit(model, &empty, &empty, &device),
            Err(Error::Training(_))
        ));
    }
}
