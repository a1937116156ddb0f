//! Binary artifact container for portable graphs.
//!
//! # File Format
//!
//! 1. **Magic bytes**: `QDM1` (4 bytes)
//! 2. **Version**: `u32` little-endian (4 bytes), currently 1
//! 3. **Flags**: `u32` little-endian (4 bytes); bit 0 set when weights are int8
//! 4. **Payload**: bincode-encoded [`PortableGraph`]

use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ExportError, Result};
use crate::graph::PortableGraph;

/// Magic bytes identifying an artifact.
pub const ARTIFACT_MAGIC: [u8; 4] = *b"QDM1";

/// Current artifact format version.
pub const ARTIFACT_VERSION: u32 = 1;

/// Header size in bytes (magic + version + flags).
pub const ARTIFACT_HEADER_SIZE: usize = 12;

/// Header flag: filter weights are int8.
pub const FLAG_QUANTIZED: u32 = 1;

/// Artifact file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactHeader {
    /// Magic bytes (must be `QDM1`).
    pub magic: [u8; 4],
    /// Format version.
    pub version: u32,
    /// Feature flags.
    pub flags: u32,
}

impl ArtifactHeader {
    /// Header for a graph.
    #[must_use]
    pub fn for_graph(graph: &PortableGraph) -> Self {
        Self {
            magic: ARTIFACT_MAGIC,
            version: ARTIFACT_VERSION,
            flags: if graph.is_quantized() { FLAG_QUANTIZED } else { 0 },
        }
    }

    /// Returns `true` if the quantized flag is set.
    #[must_use]
    pub const fn is_quantized(&self) -> bool {
        self.flags & FLAG_QUANTIZED != 0
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        Ok(())
    }

    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;

        let mut word = [0u8; 4];
        reader.read_exact(&mut word)?;
        let version = u32::from_le_bytes(word);

        reader.read_exact(&mut word)?;
        let flags = u32::from_le_bytes(word);

        Ok(Self {
            magic,
            version,
            flags,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.magic != ARTIFACT_MAGIC {
            return Err(ExportError::InvalidMagic(self.magic));
        }
        if self.version != ARTIFACT_VERSION {
            return Err(ExportError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Serialized graph bytes bound to their destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Creates an artifact without touching the filesystem.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    /// Destination path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialized bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if there are no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Writes the bytes as the complete contents of the destination,
    /// creating missing parent directories and replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Io`] naming the path if a directory cannot be
    /// created or the file cannot be written.
    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ExportError::io(format!("{}: {e}", parent.display())))?;
        }
        fs::write(&self.path, &self.bytes)
            .map_err(|e| ExportError::io(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), bytes = self.bytes.len(), "wrote artifact");
        Ok(())
    }
}

/// Encodes a graph into a writer.
///
/// # Errors
///
/// Returns [`ExportError::Serialization`] if writing or encoding fails.
pub fn encode_graph_writer<W: Write>(graph: &PortableGraph, writer: &mut W) -> Result<()> {
    ArtifactHeader::for_graph(graph)
        .write_to(writer)
        .map_err(|e| ExportError::serialization(e.to_string()))?;
    bincode::serialize_into(writer, graph).map_err(|e| ExportError::serialization(e.to_string()))
}

/// Encodes a graph into artifact bytes.
///
/// # Errors
///
/// Returns [`ExportError::Serialization`] if encoding fails.
pub fn encode_graph(graph: &PortableGraph) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    encode_graph_writer(graph, &mut buffer)?;
    Ok(buffer)
}

/// Decodes a graph from a reader.
///
/// # Errors
///
/// - [`ExportError::InvalidMagic`] / [`ExportError::UnsupportedVersion`] for
///   a foreign or newer file
/// - [`ExportError::Deserialization`] for truncated or corrupt payloads,
///   weights that do not fit their layer, or a quantized flag that disagrees
///   with the payload
pub fn decode_artifact_reader<R: Read>(reader: &mut R) -> Result<PortableGraph> {
    let header = ArtifactHeader::read_from(reader)
        .map_err(|e| ExportError::deserialization(format!("failed to read header: {e}")))?;
    header.validate()?;

    let graph: PortableGraph = bincode::deserialize_from(reader)
        .map_err(|e| ExportError::deserialization(e.to_string()))?;

    if header.is_quantized() != graph.is_quantized() {
        return Err(ExportError::deserialization(
            "header quantized flag does not match payload",
        ));
    }
    graph.validate()?;
    Ok(graph)
}

/// Decodes a graph from artifact bytes.
///
/// # Errors
///
/// See [`decode_artifact_reader`].
pub fn decode_artifact(bytes: &[u8]) -> Result<PortableGraph> {
    let mut reader = std::io::Cursor::new(bytes);
    decode_artifact_reader(&mut reader)
}

/// Loads a graph from an artifact file.
///
/// # Errors
///
/// Returns [`ExportError::Io`] if the file cannot be opened, otherwise see
/// [`decode_artifact_reader`].
pub fn load_artifact(path: impl AsRef<Path>) -> Result<PortableGraph> {
    let path = path.as_ref();
    let file =
        File::open(path).map_err(|e| ExportError::io(format!("{}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    decode_artifact_reader(&mut reader)
}

/// Returns `true` if the bytes start with the artifact magic.
#[must_use]
pub fn is_artifact_bytes(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == ARTIFACT_MAGIC
}

/// Returns `true` if the file starts with the artifact magic.
pub fn is_artifact_file(path: impl AsRef<Path>) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut reader = BufReader::new(file);
    let mut magic = [0u8; 4];
    if reader.read_exact(&mut magic).is_err() {
        return false;
    }
    magic == ARTIFACT_MAGIC
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::graph::{GraphOp, OptimizationPolicy, TensorSpec, WeightTensor};
    use crate::quantize::QuantizedTensor;
    use deconv_types::{LayerConfiguration, Padding, TensorShape};

    fn small_graph(quantized: bool) -> PortableGraph {
        let layer = LayerConfiguration::new(2, (2, 1), (2, 1), Padding::Same);
        let values = vec![0.1, -0.2, 0.3, -0.4];
        let shape = vec![1, 2, 2, 1];
        let filter = if quantized {
            WeightTensor::Int8(QuantizedTensor::quantize(&values, &shape, 1).unwrap())
        } else {
            WeightTensor::Float { shape, values }
        };
        let input = TensorShape::new(1, 3, 2, 1);
        PortableGraph {
            input: TensorSpec {
                name: "input".to_string(),
                shape: input,
            },
            output: TensorSpec {
                name: "output".to_string(),
                shape: layer.output_shape_for(input),
            },
            ops: vec![GraphOp::TransposeConv2d {
                layer,
                filter,
                bias: Some(vec![0.0, 0.5]),
            }],
            policy: if quantized {
                OptimizationPolicy::Default
            } else {
                OptimizationPolicy::None
            },
        }
    }

    #[test]
    fn header_roundtrip() {
        let header = ArtifactHeader::for_graph(&small_graph(true));
        assert!(header.is_quantized());

        let mut buffer = Vec::new();
        header.write_to(&mut buffer).unwrap();
        assert_eq!(buffer.len(), ARTIFACT_HEADER_SIZE);

        let mut cursor = std::io::Cursor::new(&buffer);
        let loaded = ArtifactHeader::read_from(&mut cursor).unwrap();
        assert_eq!(header, loaded);
    }

    #[test]
    fn header_validation() {
        let mut header = ArtifactHeader::for_graph(&small_graph(false));
        assert!(!header.is_quantized());
        assert!(header.validate().is_ok());

        header.magic = *b"NOPE";
        assert!(matches!(header.validate(), Err(ExportError::InvalidMagic(_))));

        header.magic = ARTIFACT_MAGIC;
        header.version = 7;
        assert!(matches!(
            header.validate(),
            Err(ExportError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn graph_roundtrip() {
        for quantized in [true, false] {
            let graph = small_graph(quantized);
            let bytes = encode_graph(&graph).unwrap();
            assert!(is_artifact_bytes(&bytes));
            let loaded = decode_artifact(&bytes).unwrap();
            assert_eq!(loaded, graph);
        }
    }

    #[test]
    fn invalid_magic_bytes() {
        let result = decode_artifact(b"NOPE1234567890");
        assert!(matches!(result, Err(ExportError::InvalidMagic(_))));
    }

    #[test]
    fn truncated_data() {
        let bytes = encode_graph(&small_graph(true)).unwrap();
        let result = decode_artifact(&bytes[..ARTIFACT_HEADER_SIZE + 6]);
        assert!(matches!(result, Err(ExportError::Deserialization(_))));

        let result = decode_artifact(&bytes[..3]);
        assert!(matches!(result, Err(ExportError::Deserialization(_))));
    }

    #[test]
    fn flag_mismatch_rejected() {
        let mut bytes = encode_graph(&small_graph(true)).unwrap();
        bytes[8] = 0;
        let result = decode_artifact(&bytes);
        assert!(matches!(result, Err(ExportError::Deserialization(_))));
    }

    fn with_filter(filter: WeightTensor) -> PortableGraph {
        let mut graph = small_graph(filter.is_quantized());
        let GraphOp::TransposeConv2d { filter: slot, .. } = &mut graph.ops[0];
        *slot = filter;
        graph
    }

    #[test]
    fn empty_scales_rejected() {
        let graph = with_filter(WeightTensor::Int8(QuantizedTensor {
            shape: vec![1, 2, 2, 1],
            axis: 1,
            scales: vec![],
            values: vec![5, 5, 5, 5],
        }));
        let bytes = encode_graph(&graph).unwrap();
        assert!(matches!(
            decode_artifact(&bytes),
            Err(ExportError::Deserialization(_))
        ));
    }

    #[test]
    fn short_scales_rejected() {
        let graph = with_filter(WeightTensor::Int8(QuantizedTensor {
            shape: vec![1, 2, 2, 1],
            axis: 1,
            scales: vec![0.01],
            values: vec![5, 5, 5, 5],
        }));
        let bytes = encode_graph(&graph).unwrap();
        assert!(matches!(
            decode_artifact(&bytes),
            Err(ExportError::Deserialization(_))
        ));
    }

    #[test]
    fn short_codes_rejected() {
        let graph = with_filter(WeightTensor::Int8(QuantizedTensor {
            shape: vec![1, 2, 2, 1],
            axis: 1,
            scales: vec![0.01, 0.02],
            values: vec![5],
        }));
        let bytes = encode_graph(&graph).unwrap();
        assert!(matches!(
            decode_artifact(&bytes),
            Err(ExportError::Deserialization(_))
        ));
    }

    #[test]
    fn float_filter_shape_mismatch_rejected() {
        let graph = with_filter(WeightTensor::Float {
            shape: vec![1, 3, 2, 1],
            values: vec![0.0; 6],
        });
        let bytes = encode_graph(&graph).unwrap();
        assert!(matches!(
            decode_artifact(&bytes),
            Err(ExportError::Deserialization(_))
        ));
    }

    #[test]
    fn bias_length_mismatch_rejected() {
        let mut graph = small_graph(false);
        let GraphOp::TransposeConv2d { bias, .. } = &mut graph.ops[0];
        *bias = Some(vec![0.0; 3]);
        let bytes = encode_graph(&graph).unwrap();
        assert!(matches!(
            decode_artifact(&bytes),
            Err(ExportError::Deserialization(_))
        ));
    }

    #[test]
    fn is_artifact_bytes_checks_magic() {
        assert!(is_artifact_bytes(b"QDM1anything"));
        assert!(!is_artifact_bytes(b"QDM"));
        assert!(!is_artifact_bytes(b"TFL3"));
        assert!(!is_artifact_bytes(b""));
    }

    #[test]
    fn write_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("model.tflite");

        let first = ExportArtifact::new(&path, vec![1, 2, 3]);
        assert!(first.write().is_ok());
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);

        let second = ExportArtifact::new(&path, vec![9]);
        assert!(second.write().is_ok());
        assert_eq!(fs::read(&path).unwrap(), vec![9]);
        assert_eq!(second.len(), 1);
        assert_eq!(second.path(), path.as_path());
    }

    #[test]
    fn write_into_file_parent_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();

        let artifact = ExportArtifact::new(blocker.join("model.tflite"), vec![1]);
        assert!(matches!(artifact.write(), Err(ExportError::Io(_))));
    }

    #[test]
    fn load_and_sniff_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.tflite");
        let graph = small_graph(true);
        let bytes = encode_graph(&graph).unwrap();
        ExportArtifact::new(&path, bytes).write().unwrap();

        assert!(is_artifact_file(&path));
        assert!(!is_artifact_file(dir.path().join("missing.tflite")));
        assert_eq!(load_artifact(&path).unwrap(), graph);
        assert!(matches!(
            load_artifact(dir.path().join("missing.tflite")),
            Err(ExportError::Io(_))
        ));
    }
}
