// Full path from on-disk inputs to alignment results.

use std::io::Write;

use dagalign::{align_to_dag, graph, io, AlignConfig};

#[test]
fn txt_graph_and_fasta_reads_end_to_end() {
    // bubble: 1:A -> {2:C, 3:G} -> 4:T
    let mut graph_file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    graph_file
        .write_all(b"4\n2 3 A\n4 C\n4 G\nT\n")
        .unwrap();

    let mut reads_file = tempfile::Builder::new().suffix(".fa").tempfile().unwrap();
    reads_file
        .write_all(b">through_c\nACT\n>through_g\nAGT\n>junk\nNNNN\n")
        .unwrap();

    let graph = graph::load_graph(graph_file.path()).unwrap();
    let records = io::load_reads(reads_file.path()).unwrap();
    assert_eq!(records.len(), 3);

    let seqs: Vec<Vec<u8>> = records.iter().map(|r| r.seq.clone()).collect();
    let results = align_to_dag(&seqs, &graph, &AlignConfig::default()).unwrap();

    assert_eq!(results[0].score, 3);
    assert_eq!(results[0].cigar, "3=");
    assert_eq!(results[1].score, 3);
    assert_eq!(results[1].cigar, "3=");
    assert_eq!(results[2].score, 0);
    assert_eq!(results[2].cigar, "");
}
