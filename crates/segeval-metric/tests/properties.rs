use burn::{
    backend::NdArray,
    tensor::{Int, Tensor, TensorData},
};
use segeval_metric::{
    one_hot::one_hot, DiceScore, DiceScoreConfig, EpochReport, Evaluator, EvaluatorConfig,
    MeanIoU, MeanIoUConfig, MetricKind, PixelAccuracy, PixelAccuracyConfig, RunningMetric,
    SegmentationInput,
};

type TestBackend = NdArray;

const TOLERANCE: f64 = 1e-6;

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < TOLERANCE,
        "expected {expected}, got {actual}"
    );
}

fn labels<const H: usize, const W: usize>(data: [[[i64; W]; H]; 2]) -> Tensor<TestBackend, 3, Int> {
    Tensor::from_data(TensorData::from(data), &Default::default())
}

fn scores(labels: Tensor<TestBackend, 3, Int>, nclasses: usize) -> Tensor<TestBackend, 4> {
    one_hot(labels, nclasses).unwrap().float()
}

fn miou(nclasses: usize) -> MeanIoU {
    MeanIoUConfig::new(nclasses)
        .with_verbose_on_update(false)
        .init()
        .unwrap()
}

fn target() -> Tensor<TestBackend, 3, Int> {
    labels([
        [[0, 0, 1], [1, 2, 2], [2, 2, 0]],
        [[1, 1, 1], [0, 0, 2], [2, 1, 0]],
    ])
}

fn prediction() -> Tensor<TestBackend, 3, Int> {
    labels([
        [[0, 1, 1], [1, 2, 0], [2, 2, 2]],
        [[1, 0, 1], [0, 2, 2], [1, 1, 0]],
    ])
}

fn inverted() -> Tensor<TestBackend, 3, Int> {
    labels([
        [[1, 1, 2], [2, 0, 0], [0, 0, 1]],
        [[2, 2, 2], [1, 1, 0], [0, 2, 1]],
    ])
}

#[test]
fn identical_prediction_scores_one_everywhere() {
    let mut dice = DiceScore::new(3).unwrap();
    let mut iou = miou(3);
    let mut accuracy = PixelAccuracy::new(3).unwrap();

    dice.process(scores(target(), 3), target()).unwrap();
    iou.process(scores(target(), 3), target()).unwrap();
    accuracy.process(scores(target(), 3), target()).unwrap();

    assert_close(dice.value().unwrap(), 1.0);
    assert_close(iou.value().unwrap(), 1.0);
    assert_close(accuracy.value().unwrap(), 1.0);
}

#[test]
fn disjoint_prediction_scores_zero_for_present_classes() {
    let mut dice = DiceScore::new(3).unwrap();
    let mut iou = miou(3);

    dice.process(scores(inverted(), 3), target()).unwrap();
    iou.process(scores(inverted(), 3), target()).unwrap();

    for value in dice.class_values().unwrap() {
        assert_close(value, 0.0);
    }
    assert_close(iou.value().unwrap(), 0.0);
}

#[test]
fn intersection_and_union_bound_the_class_counts() {
    let iou = miou(3);
    let batch = iou.calculate(scores(prediction(), 3), target()).unwrap();

    let count = |labels: Tensor<TestBackend, 3, Int>, class: i64, sample: usize| {
        labels
            .into_data()
            .iter::<i64>()
            .skip(sample * 9)
            .take(9)
            .filter(|label| *label == class)
            .count() as f64
    };

    for class in 0..3 {
        for sample in 0..2 {
            let predicted = count(prediction(), class as i64, sample);
            let actual = count(target(), class as i64, sample);
            let intersection = batch.intersection.get(class, sample).unwrap();
            let union = batch.union.get(class, sample).unwrap();

            assert!(intersection <= predicted.min(actual));
            assert!(union >= predicted.max(actual));
            assert_eq!(
                intersection + (predicted + actual - 2.0 * intersection),
                union
            );
        }
    }
}

#[test]
fn updates_are_additive() {
    let mut sequential = DiceScore::new(3).unwrap();
    sequential.process(scores(prediction(), 3), target()).unwrap();
    sequential.process(scores(inverted(), 3), target()).unwrap();

    let mut combined = DiceScore::new(3).unwrap();
    let output = Tensor::cat(vec![scores(prediction(), 3), scores(inverted(), 3)], 0);
    let target = Tensor::cat(vec![target(), target()], 0);
    combined.process(output, target).unwrap();

    assert_eq!(sequential.sample_size(), 4);
    assert_eq!(combined.sample_size(), 4);
    assert_close(sequential.value().unwrap(), combined.value().unwrap());
}

#[test]
fn reset_reproduces_a_fresh_accumulator() {
    let mut reused = miou(3);
    reused.process(scores(inverted(), 3), target()).unwrap();
    reused.reset();
    reused.process(scores(prediction(), 3), target()).unwrap();

    let mut fresh = miou(3);
    fresh.process(scores(prediction(), 3), target()).unwrap();

    assert_eq!(reused.intersection(), fresh.intersection());
    assert_eq!(reused.union(), fresh.union());
    assert_eq!(reused.value().unwrap(), fresh.value().unwrap());
}

#[test]
fn merged_shards_equal_sequential_updates() {
    let mut sequential = PixelAccuracyConfig::new(3)
        .with_ignore_index(Some(2))
        .init()
        .unwrap();
    sequential.process(scores(prediction(), 3), target()).unwrap();
    sequential.process(scores(inverted(), 3), target()).unwrap();

    let mut left = PixelAccuracyConfig::new(3)
        .with_ignore_index(Some(2))
        .init()
        .unwrap();
    left.process(scores(prediction(), 3), target()).unwrap();
    let mut right = left.clone();
    right.reset();
    right.process(scores(inverted(), 3), target()).unwrap();
    left.merge(right).unwrap();

    assert_eq!(left.sample_size(), sequential.sample_size());
    assert_close(left.value().unwrap(), sequential.value().unwrap());
}

#[test]
fn ignore_label_is_honoured_by_every_metric() {
    // Label 3 marks pixels without ground truth; predictions there are wrong.
    let target = labels([[[0, 3], [1, 1]], [[3, 0], [0, 1]]]);
    let prediction = labels([[[0, 1], [1, 1]], [[1, 0], [0, 1]]]);

    let mut dice = DiceScoreConfig::new(2)
        .with_ignore_index(Some(3))
        .init()
        .unwrap();
    let mut accuracy = PixelAccuracyConfig::new(2)
        .with_ignore_index(Some(3))
        .init()
        .unwrap();

    dice.process(scores(prediction.clone(), 2), target.clone())
        .unwrap();
    accuracy.process(scores(prediction, 2), target).unwrap();

    assert_close(dice.value().unwrap(), 1.0);
    assert_close(accuracy.value().unwrap(), 1.0);
}

#[test]
fn binary_sigmoid_scores_match_their_labels() {
    let device = Default::default();
    let logits = Tensor::<TestBackend, 4>::from_data(
        TensorData::from([
            [[[4.0f32, -4.0], [-4.0, 4.0]]],
            [[[-4.0f32, -4.0], [4.0, 4.0]]],
        ]),
        &device,
    );
    let target = labels([[[1, 0], [0, 1]], [[0, 0], [1, 1]]]);

    let mut dice = DiceScore::new(1).unwrap();
    let mut accuracy = PixelAccuracy::new(1).unwrap();
    dice.process(logits.clone(), target.clone()).unwrap();
    accuracy.process(logits, target).unwrap();

    assert_close(dice.value().unwrap(), 1.0);
    assert_close(accuracy.value().unwrap(), 1.0);
    assert_eq!(dice.report().unwrap().per_class.len(), 2);
}

#[test]
fn epoch_reports_serialize_to_json() {
    let config = EvaluatorConfig::new(3)
        .with_metrics(vec![MetricKind::Dice, MetricKind::PixelAccuracy])
        .with_verbose_on_update(Some(false));
    let mut evaluator = Evaluator::from_config(&config).unwrap();

    let report = evaluator
        .run_epoch([SegmentationInput::new_single(scores(target(), 3), target())])
        .unwrap();

    let json = serde_json::to_string(&report).unwrap();
    let loaded: EpochReport = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded.epoch, report.epoch);
    for (loaded, summary) in loaded.metrics.iter().zip(&report.metrics) {
        assert_eq!(loaded.name, summary.name);
        assert_eq!(loaded.sample_size, summary.sample_size);
        assert_close(loaded.value, summary.value);
    }
    assert_eq!(loaded.get(DiceScore::NAME).unwrap().per_class.len(), 3);
    assert!(loaded.get(PixelAccuracy::NAME).unwrap().per_class.is_empty());
}
