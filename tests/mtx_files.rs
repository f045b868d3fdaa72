use h2h_td::{MtxOptions, TdError, WeightedGraph};
use std::io::Write;
use tempfile::NamedTempFile;

fn mtx_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const STAR: &str = "%%MatrixMarket matrix coordinate integer symmetric\n\
                    % star on 1 with an extra 2 - 3 edge\n\
                    5 5 5\n\
                    1 2 1\n\
                    1 3 1\n\
                    1 4 1\n\
                    1 5 1\n\
                    2 3 1\n";

#[test]
fn star_from_file() {
    let file = mtx_file(STAR);
    let options = MtxOptions::default().weighted(true);
    let graph = WeightedGraph::from_mtx(file.path(), options).unwrap();
    assert_eq!(graph.order(), 5);
    assert_eq!(graph.neighbors(0).unwrap(), vec![1, 2, 3, 4]);

    let td = graph.compute_tree_decomposition().unwrap();
    assert_eq!(td.len(), 5);
    assert_eq!(td.edge_count(), 4);
    assert!(td.root().is_some());
    assert!(td.verify(&graph).is_ok());

    let td = graph.tree_decomposition_from_order(&[4, 0, 3, 2, 1]).unwrap();
    assert_eq!(td.treewidth(), 3);
    assert_eq!(td.bag(0).unwrap().len(), 4);
}

#[test]
fn weighted_labels_from_file() {
    let content = "4 4 4\n1 2 3\n2 3 4\n3 4 5\n4 1 20\n";
    let file = mtx_file(content);
    let options = MtxOptions::default().weighted(true);
    let graph = WeightedGraph::from_mtx(file.path(), options).unwrap();
    assert_eq!(graph.edge_weight(0, 3).unwrap(), Some(20));

    let td = graph.compute_tree_decomposition().unwrap();
    assert_eq!(td.treewidth(), 2);
    assert!(td.verify(&graph).is_ok());
    for label in td.labels() {
        assert_eq!(label.vertices.len(), label.weights.len());
        assert_eq!(label.vertices.last(), Some(&label.vertex));
    }
}

#[test]
fn path_bfs_from_file() {
    let file = mtx_file("4 4 3\n1 2\n2 3\n3 4\n");
    let graph = WeightedGraph::from_mtx(file.path(), MtxOptions::default()).unwrap();
    assert_eq!(graph.bfs_traversal(0).unwrap(), vec![0, 1, 2, 3]);
}

#[test]
fn only_comments_is_an_error() {
    let file = mtx_file("% header missing\n% still missing\n");
    match WeightedGraph::from_mtx(file.path(), MtxOptions::default()) {
        Err(err @ TdError::MissingHeader { .. }) => assert!(!err.is_fatal()),
        other => panic!("unexpected {:?}", other.map(|g| g.order())),
    }
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.mtx");
    match WeightedGraph::from_mtx(&path, MtxOptions::default()) {
        Err(err @ TdError::Io { .. }) => assert!(!err.is_fatal()),
        other => panic!("unexpected {:?}", other.map(|g| g.order())),
    }
}
