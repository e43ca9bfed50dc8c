//! Loaders for the two reference graph formats.
//!
//! Both loaders finish by topologically sorting and verifying the CSR
//! container; ingest failures abort before any DP runs.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::AlignError;
use crate::graph::csr::CsrGraph;

/// Load a reference graph, choosing the format by file extension: `.txt`
/// selects the plain-text adjacency format, anything else the binary
/// record stream.
pub fn load_graph(path: &Path) -> Result<CsrGraph, AlignError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("txt") => load_from_txt(path),
        _ => load_from_vg(path),
    }
}

fn open(path: &Path) -> Result<File, AlignError> {
    File::open(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => AlignError::InputNotFound(path.to_path_buf()),
        _ => AlignError::Io(err),
    })
}

/// Plain-text format: line 1 holds the vertex count; line i (1-based) holds
/// zero or more out-neighbor ids (1-based) followed by the vertex label,
/// space-separated.
pub fn load_from_txt(path: &Path) -> Result<CsrGraph, AlignError> {
    let reader = BufReader::new(open(path)?);

    let mut labels: Vec<u8> = Vec::new();
    let mut edges: Vec<(u32, u32)> = Vec::new();
    let mut total_vertices: usize = 0;

    for (row, line) in reader.lines().enumerate() {
        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();

        if row == 0 {
            total_vertices = tokens
                .first()
                .and_then(|t| t.parse().ok())
                .ok_or_else(|| {
                    AlignError::InvalidGraph("missing vertex count header".to_string())
                })?;
            continue;
        }

        if row > total_vertices {
            if tokens.is_empty() {
                continue;
            }
            return Err(AlignError::InvalidGraph(format!(
                "more vertex lines than the declared count {}",
                total_vertices
            )));
        }
        if tokens.is_empty() {
            return Err(AlignError::InvalidGraph(format!(
                "vertex line {} is empty",
                row
            )));
        }

        let vertex = (row - 1) as u32;
        let label_token = tokens[tokens.len() - 1];
        if label_token.len() != 1 {
            return Err(AlignError::UnsupportedGraph(format!(
                "vertex {} has a {}-character sequence; the vector engine requires single characters",
                row,
                label_token.len()
            )));
        }
        labels.push(label_token.as_bytes()[0]);

        for token in &tokens[..tokens.len() - 1] {
            let neighbor: u32 = token.parse().map_err(|_| {
                AlignError::InvalidGraph(format!("bad out-neighbor id {:?} on line {}", token, row))
            })?;
            if neighbor == 0 {
                return Err(AlignError::InvalidGraph(format!(
                    "out-neighbor ids are 1-based; got 0 on line {}",
                    row
                )));
            }
            edges.push((vertex, neighbor - 1));
        }
    }

    if labels.len() != total_vertices {
        return Err(AlignError::InvalidGraph(format!(
            "declared {} vertices but found {}",
            total_vertices,
            labels.len()
        )));
    }

    let graph = CsrGraph::from_parts(labels, &edges)?;
    log::info!(
        "loaded graph: {} vertices, {} edges",
        graph.num_vertices(),
        graph.num_edges()
    );
    Ok(graph)
}

/// Binary record stream: length-prefixed records, each a graph fragment
/// with vertices (1-based id, sequence) and edges (from, to, flags).
/// Little-endian layout per record:
///
/// ```text
/// u32 record_len
///   u32 vertex_count  { u32 id, u32 seq_len, seq bytes } * vertex_count
///   u32 edge_count    { u32 from, u32 to, u8 from_start, u8 to_end, u32 overlap } * edge_count
/// ```
///
/// Bi-directed edge flags and nonzero overlaps are unsupported; so are
/// multi-character vertex sequences.
pub fn load_from_vg(path: &Path) -> Result<CsrGraph, AlignError> {
    let mut reader = BufReader::new(open(path)?);

    let mut labels: Vec<Option<u8>> = Vec::new();
    let mut edges: Vec<(u32, u32)> = Vec::new();

    loop {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(AlignError::Io(err)),
        }
        let record_len = u32::from_le_bytes(len_buf) as usize;
        let mut record = vec![0u8; record_len];
        reader.read_exact(&mut record)?;

        parse_record(&record, &mut labels, &mut edges)?;
    }

    let labels: Vec<u8> = labels
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            label.ok_or_else(|| {
                AlignError::InvalidGraph(format!("vertex {} has no sequence record", i + 1))
            })
        })
        .collect::<Result<_, _>>()?;

    let graph = CsrGraph::from_parts(labels, &edges)?;
    log::info!(
        "loaded graph: {} vertices, {} edges",
        graph.num_vertices(),
        graph.num_edges()
    );
    Ok(graph)
}

struct RecordCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RecordCursor<'a> {
    fn u32(&mut self) -> Result<u32, AlignError> {
        let end = self.pos + 4;
        if end > self.buf.len() {
            return Err(AlignError::InvalidGraph("truncated graph record".to_string()));
        }
        let value = u32::from_le_bytes(self.buf[self.pos..end].try_into().unwrap());
        self.pos = end;
        Ok(value)
    }

    fn u8(&mut self) -> Result<u8, AlignError> {
        let byte = *self.buf.get(self.pos).ok_or_else(|| {
            AlignError::InvalidGraph("truncated graph record".to_string())
        })?;
        self.pos += 1;
        Ok(byte)
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], AlignError> {
        let end = self.pos + len;
        if end > self.buf.len() {
            return Err(AlignError::InvalidGraph("truncated graph record".to_string()));
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

fn parse_record(
    record: &[u8],
    labels: &mut Vec<Option<u8>>,
    edges: &mut Vec<(u32, u32)>,
) -> Result<(), AlignError> {
    let mut cursor = RecordCursor {
        buf: record,
        pos: 0,
    };

    let vertex_count = cursor.u32()?;
    for _ in 0..vertex_count {
        let id = cursor.u32()?;
        let seq_len = cursor.u32()? as usize;
        let seq = cursor.bytes(seq_len)?;

        if id == 0 {
            return Err(AlignError::InvalidGraph(
                "vertex ids are 1-based; got 0".to_string(),
            ));
        }
        if seq.len() != 1 {
            return Err(AlignError::UnsupportedGraph(format!(
                "vertex {} has a {}-character sequence; the vector engine requires single characters",
                id,
                seq.len()
            )));
        }

        let index = (id - 1) as usize;
        if labels.len() <= index {
            labels.resize(index + 1, None);
        }
        labels[index] = Some(seq[0]);
    }

    let edge_count = cursor.u32()?;
    for _ in 0..edge_count {
        let from = cursor.u32()?;
        let to = cursor.u32()?;
        let from_start = cursor.u8()?;
        let to_end = cursor.u8()?;
        let overlap = cursor.u32()?;

        if from_start != 0 || to_end != 0 {
            return Err(AlignError::UnsupportedGraph(
                "bi-directed edges are not supported".to_string(),
            ));
        }
        if overlap != 0 {
            return Err(AlignError::UnsupportedGraph(
                "edge overlaps are not supported".to_string(),
            ));
        }
        if from == 0 || to == 0 {
            return Err(AlignError::InvalidGraph(
                "edge endpoints are 1-based; got 0".to_string(),
            ));
        }
        edges.push((from - 1, to - 1));
    }

    Ok(())
}
