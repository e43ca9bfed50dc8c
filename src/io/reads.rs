//! Reading query sequences from FASTA or FASTQ, plain or gzipped.
//!
//! Gzip is detected by the `.gz` extension and unwrapped with
//! `flate2::read::GzDecoder`; the record format is then sniffed from the
//! first byte of the decompressed stream ('>' for FASTA, '@' for FASTQ), so
//! either format works behind either extension. Sequences are upper-cased
//! and non-ACGT characters collapse onto the sentinel at ingest; downstream
//! they simply never match.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use bio::io::{fasta, fastq};
use flate2::read::GzDecoder;

use crate::error::AlignError;
use crate::utils::sanitize_sequence;

/// One query read: identifier plus sanitized sequence.
#[derive(Debug, Clone)]
pub struct ReadRecord {
    pub name: String,
    pub seq: Vec<u8>,
}

/// Load all reads from `path`.
pub fn load_reads(path: &Path) -> Result<Vec<ReadRecord>, AlignError> {
    let file = File::open(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => AlignError::InputNotFound(path.to_path_buf()),
        _ => AlignError::Io(err),
    })?;

    let raw: Box<dyn Read> = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut reader = BufReader::new(raw);

    let records = match peek_record_marker(&mut reader)? {
        None => Vec::new(),
        Some(b'>') => read_fasta(reader)?,
        Some(b'@') => read_fastq(reader)?,
        Some(other) => {
            return Err(AlignError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "{}: expected a FASTA or FASTQ record, found byte {:#04x}",
                    path.display(),
                    other
                ),
            )))
        }
    };

    log::info!("total count of reads = {}", records.len());
    Ok(records)
}

/// First non-whitespace byte of the stream, without consuming it.
fn peek_record_marker<R: BufRead>(reader: &mut R) -> Result<Option<u8>, AlignError> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(None);
        }
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(pos) => {
                let marker = buf[pos];
                reader.consume(pos);
                return Ok(Some(marker));
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

fn read_fasta<R: Read>(reader: R) -> Result<Vec<ReadRecord>, AlignError> {
    let mut reads = Vec::new();
    for record in fasta::Reader::new(reader).records() {
        let record = record.map_err(|e| {
            AlignError::Io(io::Error::new(io::ErrorKind::InvalidData, e))
        })?;
        reads.push(ReadRecord {
            name: record.id().to_string(),
            seq: sanitize_sequence(record.seq()),
        });
    }
    Ok(reads)
}

fn read_fastq<R: Read>(reader: R) -> Result<Vec<ReadRecord>, AlignError> {
    let mut reads = Vec::new();
    for record in fastq::Reader::new(reader).records() {
        let record = record.map_err(|e| {
            AlignError::Io(io::Error::new(io::ErrorKind::InvalidData, e))
        })?;
        reads.push(ReadRecord {
            name: record.id().to_string(),
            seq: sanitize_sequence(record.seq()),
        });
    }
    Ok(reads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(suffix: &str, contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[test]
    fn test_fasta_reads() {
        let file = write_file(".fa", b">r1\nacgt\n>r2\nTTGA\n");
        let reads = load_reads(file.path()).unwrap();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].name, "r1");
        assert_eq!(reads[0].seq, b"ACGT".to_vec());
        assert_eq!(reads[1].seq, b"TTGA".to_vec());
    }

    #[test]
    fn test_fastq_reads() {
        let file = write_file(".fq", b"@r1\nACGT\n+\nIIII\n");
        let reads = load_reads(file.path()).unwrap();
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].seq, b"ACGT".to_vec());
    }

    #[test]
    fn test_non_alphabet_becomes_sentinel() {
        let file = write_file(".fa", b">r1\nAZGN\n");
        let reads = load_reads(file.path()).unwrap();
        assert_eq!(reads[0].seq, vec![b'A', b'B', b'G', b'B']);
    }

    #[test]
    fn test_gzip_fasta() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b">r1\nACGT\n").unwrap();
        let compressed = encoder.finish().unwrap();
        let file = write_file(".fa.gz", &compressed);
        let reads = load_reads(file.path()).unwrap();
        assert_eq!(reads[0].seq, b"ACGT".to_vec());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_reads(Path::new("/nonexistent/reads.fq")),
            Err(AlignError::InputNotFound(_))
        ));
    }

    #[test]
    fn test_empty_file() {
        let file = write_file(".fa", b"");
        assert!(load_reads(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_rejected() {
        let file = write_file(".fa", b"not a sequence file\n");
        assert!(matches!(
            load_reads(file.path()),
            Err(AlignError::Io(_))
        ));
    }
}
