// ============================================================
// Layer 5 — Graph Export
// ============================================================
// Writes a traced IntermediateGraph to disk and reads it back
// for the graph runtime.
//
// File layout:
//   8 bytes   magic "BIGRAPH\0"
//   rest      bincode (serde, standard config) of the graph
//
// The file name is derived from the case's shape, so cases of
// different shapes never share an export file:
//   <export_dir>/bert-intermediate-<batch>-<seq:03>.graph

use anyhow::{bail, Context, Result};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use crate::domain::shape::ShapeCase;
use crate::ml::graph::IntermediateGraph;

const MAGIC: &[u8; 8] = b"BIGRAPH\0";

/// Export location for one shape.
pub fn export_path(dir: &Path, shape: ShapeCase) -> PathBuf {
    dir.join(format!(
        "bert-intermediate-{}-{:03}.graph",
        shape.batch_size, shape.seq_len
    ))
}

/// Serialise `graph` to `path`, overwriting any previous export.
pub fn save(graph: &IntermediateGraph, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create export directory '{}'", parent.display()))?;
    }

    let file = File::create(path)
        .with_context(|| format!("Cannot create graph file '{}'", path.display()))?;
    let mut w = BufWriter::new(file);
    w.write_all(MAGIC)?;
    let bytes = bincode::serde::encode_into_std_write(graph, &mut w, bincode::config::standard())
        .with_context(|| format!("Cannot encode graph to '{}'", path.display()))?;
    w.flush()?;

    tracing::debug!("Exported graph ({} bytes) to '{}'", bytes + MAGIC.len(), path.display());
    Ok(())
}

/// Read and validate a graph written by `save`.
pub fn load(path: &Path) -> Result<IntermediateGraph> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open graph file '{}'", path.display()))?;
    let mut r = BufReader::new(file);

    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)
        .with_context(|| format!("'{}' is too short to be a graph file", path.display()))?;
    if &magic != MAGIC {
        bail!("'{}' is not a graph file (bad magic)", path.display());
    }

    let graph: IntermediateGraph =
        bincode::serde::decode_from_std_read(&mut r, bincode::config::standard())
            .with_context(|| format!("Cannot decode graph '{}'", path.display()))?;
    graph.validate()?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{graph::Op, tensor::NativeTensor};

    fn sample_graph() -> IntermediateGraph {
        let mut g = IntermediateGraph::new(vec![1, 3, 2], "input");
        g.constants.insert(
            "dense.weight".into(),
            NativeTensor::from_vec(vec![2, 3], vec![0.5f32, -0.25, 1.0, 2.0, 0.0, -1.5]).unwrap(),
        );
        g.ops.push(Op::MatMul {
            input:  "input".into(),
            weight: "dense.weight".into(),
            output: "%0".into(),
        });
        g.ops.push(Op::Gelu { input: "%0".into(), output: "%1".into() });
        g.output = "%1".into();
        g
    }

    #[test]
    fn test_save_then_load_preserves_graph() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("g.graph");
        let g    = sample_graph();
        save(&g, &path).unwrap();
        assert_eq!(load(&path).unwrap(), g);
    }

    #[test]
    fn test_export_path_is_keyed_by_shape() {
        let dir = Path::new("out");
        let a = export_path(dir, ShapeCase::new(1, 10));
        let b = export_path(dir, ShapeCase::new(2, 10));
        assert_ne!(a, b);
        assert_eq!(a, Path::new("out/bert-intermediate-1-010.graph"));
    }

    #[test]
    fn test_corrupt_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let bad_magic = dir.path().join("bad_magic.graph");
        fs::write(&bad_magic, b"NOTGRAPHxxxxxxxx").unwrap();
        assert!(load(&bad_magic).unwrap_err().to_string().contains("bad magic"));

        let truncated = dir.path().join("truncated.graph");
        fs::write(&truncated, b"BIG").unwrap();
        assert!(load(&truncated).is_err());

        let garbage = dir.path().join("garbage.graph");
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[0xff; 16]);
        fs::write(&garbage, bytes).unwrap();
        assert!(load(&garbage).is_err());
    }
}
