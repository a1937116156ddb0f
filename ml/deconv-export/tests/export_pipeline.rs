//! End-to-end export tests: build, write, reload and compare.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use burn_ndarray::NdArray;
use deconv_export::{
    decode_artifact, diff_tensors, encode_graph, is_artifact_file, ArtifactRunner, ExportError,
    Exporter, GraphOp, OptimizationPolicy, QuantizedTensor, WeightTensor, ARTIFACT_HEADER_SIZE,
};
use deconv_models::{probe, uniform_input, DeconvModel, ExecutionContext};
use deconv_types::{Initializer, LayerConfiguration, Padding, TensorShape};

type TestBackend = NdArray<f32>;

fn probed_model(padding: Padding, input: TensorShape, seed: u64) -> DeconvModel<TestBackend> {
    let config = LayerConfiguration::new(32, (5, 3), (2, 1), padding)
        .with_weight_initializer(Initializer::HeNormal);
    let mut model = DeconvModel::build(config).unwrap();
    let report = probe(
        &mut model,
        input,
        &ExecutionContext::cpu_only().with_seed(seed),
        &Default::default(),
    )
    .unwrap();
    report.ensure_consistent().unwrap();
    model
}

#[test]
fn export_creates_nested_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir
        .path()
        .join("app")
        .join("src")
        .join("main")
        .join("assets")
        .join("model_01.tflite");

    let model = probed_model(Padding::Same, TensorShape::new(1, 9, 6, 45), 1);
    let artifact = Exporter::default().export(&model, &path).unwrap();

    assert!(path.exists());
    assert!(artifact.len() > ARTIFACT_HEADER_SIZE);
    assert!(is_artifact_file(&path));
}

#[test]
fn export_twice_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model_02.tflite");

    let first = probed_model(Padding::Valid, TensorShape::new(1, 9, 6, 45), 1);
    let second = probed_model(Padding::Valid, TensorShape::new(1, 9, 6, 45), 2);
    let exporter = Exporter::default();

    exporter.export(&first, &path).unwrap();
    let artifact = exporter.export(&second, &path).unwrap();

    let on_disk = std::fs::read(&path).unwrap();
    assert_eq!(on_disk, artifact.bytes());
}

#[test]
fn quantized_artifact_is_smaller() {
    let dir = tempfile::tempdir().unwrap();
    let model = probed_model(Padding::Same, TensorShape::new(1, 10, 6, 45), 3);

    let quantized = Exporter::new(OptimizationPolicy::Default)
        .export(&model, dir.path().join("q.tflite"))
        .unwrap();
    let float = Exporter::new(OptimizationPolicy::None)
        .export(&model, dir.path().join("f.tflite"))
        .unwrap();

    assert!(quantized.len() * 2 < float.len());
}

#[test]
fn reloaded_artifact_tracks_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model_04.tflite");
    let input_shape = TensorShape::new(1, 10, 6, 45);
    let model = probed_model(Padding::Valid, input_shape, 4);

    Exporter::default().export(&model, &path).unwrap();
    let runner = ArtifactRunner::<TestBackend>::load(&path, &Default::default()).unwrap();
    assert_eq!(runner.input_shape(), input_shape);
    assert_eq!(runner.output_shape(), TensorShape::new(1, 23, 8, 32));

    let input = uniform_input::<TestBackend>(input_shape, &Default::default());
    let reference = model.forward(input.clone()).unwrap();
    let reloaded = runner.run(input).unwrap();
    assert_eq!(reloaded.dims(), [1, 23, 8, 32]);

    let stats = diff_tensors(reference, reloaded).unwrap();
    assert_eq!(stats.count, 23 * 8 * 32);
    assert!(!stats.has_nans());
    assert!(stats.within(0.5), "{stats}");
}

#[test]
fn float_artifact_reproduces_model_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model_03.tflite");
    let input_shape = TensorShape::new(1, 10, 6, 45);
    let model = probed_model(Padding::Same, input_shape, 5);

    Exporter::new(OptimizationPolicy::None).export(&model, &path).unwrap();
    let runner = ArtifactRunner::<TestBackend>::load(&path, &Default::default()).unwrap();

    let input = uniform_input::<TestBackend>(input_shape, &Default::default());
    let reference = model.forward(input.clone()).unwrap();
    let reloaded = runner.run(input).unwrap();

    let stats = diff_tensors(reference, reloaded).unwrap();
    assert!(stats.within(1e-6), "{stats}");
}

#[test]
fn corrupted_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.tflite");
    let model = probed_model(Padding::Same, TensorShape::new(1, 9, 6, 45), 6);
    let artifact = Exporter::default().export(&model, &path).unwrap();

    let mut bytes = artifact.bytes().to_vec();
    bytes[0] = b'X';
    assert!(matches!(
        decode_artifact(&bytes),
        Err(ExportError::InvalidMagic(_))
    ));

    let mut bytes = artifact.bytes().to_vec();
    bytes[4] = 2;
    assert!(matches!(
        decode_artifact(&bytes),
        Err(ExportError::UnsupportedVersion(2))
    ));

    std::fs::write(&path, b"not a model").unwrap();
    assert!(!is_artifact_file(&path));
    assert!(ArtifactRunner::<TestBackend>::load(&path, &Default::default()).is_err());
}

#[test]
fn inconsistent_int8_filter_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model_01.tflite");
    let model = probed_model(Padding::Same, TensorShape::new(1, 9, 6, 45), 7);

    let mut graph = Exporter::default().convert(&model).unwrap();
    let GraphOp::TransposeConv2d { filter, .. } = &mut graph.ops[0];
    *filter = WeightTensor::Int8(QuantizedTensor {
        shape: vec![45, 32, 5, 3],
        axis: 1,
        scales: vec![],
        values: vec![5],
    });
    std::fs::write(&path, encode_graph(&graph).unwrap()).unwrap();

    let result = ArtifactRunner::<TestBackend>::load(&path, &Default::default());
    assert!(matches!(result, Err(ExportError::Deserialization(_))));
}
