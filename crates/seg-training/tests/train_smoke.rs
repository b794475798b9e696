//! End-to-end training on a tiny synthetic dataset.

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::tensor::{Distribution, Tensor};
use seg_core::{DataSource, ImageDimensions, TrainingConfig};
use seg_training::{load_checkpoint, load_with_metadata, run_training, Trainer, UNetConfig};
use seg_dataset::{SegmentationDataset, SyntheticShapes};
use tempfile::TempDir;

type Inner = NdArray<f32>;
type TestBackend = Autodiff<Inner>;

fn tiny_config(temp_dir: &TempDir) -> TrainingConfig {
    let mut config = TrainingConfig::default();
    config.checkpoint_path = temp_dir.path().join("run").join("checkpoint.pth");
    config.model.base_filters = 2;
    config.optim.batch_size = 2;
    config.data.image_size = ImageDimensions::rgb(16, 16);
    config.data.source = DataSource::Synthetic { num_samples: 6 };
    config.data.test_fraction = 0.34;
    config
}

fn assert_same_outputs(a: Tensor<Inner, 4>, b: Tensor<Inner, 4>) {
    let a: Vec<f32> = a.into_data().to_vec().unwrap();
    let b: Vec<f32> = b.into_data().to_vec().unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert!((x - y).abs() < 1e-6, "{} != {}", x, y);
    }
}

#[test]
fn one_epoch_writes_a_reloadable_checkpoint() {
    let temp_dir = TempDir::new().unwrap();
    let config = tiny_config(&temp_dir);
    let device = Default::default();

    let report = run_training::<TestBackend>(&config, &device).unwrap();

    assert_eq!(report.checkpoint, config.checkpoint_path);
    assert!(report.checkpoint.exists());
    assert_eq!(report.history.epochs.len(), 1);
    let record = &report.history.epochs[0];
    assert!(record.train_loss.is_finite());
    assert!(record.test_accuracy.is_some());

    let (model, metadata) = load_with_metadata::<Inner>(&report.checkpoint, &device).unwrap();
    assert_eq!(metadata.model, config.model);
    assert_eq!(metadata.history, report.history);

    let again =
        load_checkpoint::<Inner>(&UNetConfig::from(&config.model), &report.checkpoint, &device)
            .unwrap();
    let input = Tensor::<Inner, 4>::random([2, 3, 16, 16], Distribution::Default, &device);
    assert_same_outputs(model.forward(input.clone()), again.forward(input));
}

#[test]
fn trained_weights_match_saved_weights() {
    let temp_dir = TempDir::new().unwrap();
    let config = tiny_config(&temp_dir);
    let device = Default::default();

    let dims = config.data.image_size;
    let train = SegmentationDataset::new(SyntheticShapes::new(dims, 5).generate(4, 3).unwrap());

    let model = UNetConfig::from(&config.model).init::<TestBackend>(&device);
    let mut trainer = Trainer::new(config.clone()).unwrap();
    let model = trainer
        .fit(model, &train, &SegmentationDataset::default(), &device)
        .unwrap();

    let path = seg_training::save_checkpoint(&model, &config.checkpoint_path).unwrap();
    let loaded =
        load_checkpoint::<Inner>(&UNetConfig::from(&config.model), &path, &device).unwrap();

    let input = Tensor::<Inner, 4>::random([1, 3, 16, 16], Distribution::Default, &device);
    assert_same_outputs(model.valid().forward(input.clone()), loaded.forward(input));
}

#[test]
fn step_decay_over_sixteen_epochs() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = tiny_config(&temp_dir);
    config.optim.num_epochs = 17;
    config.optim.batch_size = 4;
    config.model.base_filters = 1;
    config.data.image_size = ImageDimensions::rgb(8, 8);

    let device = Default::default();
    let train = SegmentationDataset::new(
        SyntheticShapes::new(config.data.image_size, 9)
            .generate(4, 3)
            .unwrap(),
    );

    let model = UNetConfig::from(&config.model).init::<TestBackend>(&device);
    let mut trainer = Trainer::new(config).unwrap();
    trainer
        .fit(model, &train, &SegmentationDataset::default(), &device)
        .unwrap();

    let rates: Vec<f64> = trainer
        .history()
        .epochs
        .iter()
        .map(|e| e.learning_rate)
        .collect();
    assert!(rates[..8].iter().all(|&lr| lr == 1e-4));
    assert!(rates[8..16].iter().all(|&lr| (lr - 1e-5).abs() < 1e-12));
    assert!((rates[16] - 1e-6).abs() < 1e-13);
}
