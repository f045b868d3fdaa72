use crate::error::{Result, TdError};
use crate::graph::{Weight, WeightedGraph};
use log::debug;
use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MtxOptions {
    /// Read a third column as the edge weight; otherwise every weight is 1.
    pub weighted: bool,
    /// Keep edges one-directional; otherwise the reverse edge is added.
    pub directed: bool,
}

impl MtxOptions {
    impl_setter!(self, weighted, bool);
    impl_setter!(self, directed, bool);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MtxHeader {
    pub rows: usize,
    pub columns: usize,
    /// Advisory only, never checked against the number of data lines.
    pub nonzeros: usize,
}

/// Matrix-market style edge list: `%` comment lines, a `rows cols nnz`
/// header, then one `u v [w]` line per edge with 1-based indices no larger
/// than the header's dimensions.
pub struct MtxReader<T: BufRead> {
    reader: T,
    source: String,
    options: MtxOptions,
}

impl<T: BufRead> MtxReader<T> {
    /// `source` names the input in error messages.
    pub fn new<S: Into<String>>(reader: T, source: S, options: MtxOptions) -> Self {
        Self {
            reader,
            source: source.into(),
            options,
        }
    }
}

fn is_skipped(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('%')
}

pub fn mtx_header(line: &str, line_number: usize) -> Result<MtxHeader> {
    let malformed = || TdError::MalformedHeader {
        line: line_number,
        content: line.to_string(),
    };
    let nums: Vec<usize> = line
        .split_whitespace()
        .map(|s| s.parse::<usize>().map_err(|_| malformed()))
        .collect::<Result<_>>()?;
    if nums.len() < 3 {
        return Err(malformed());
    }
    Ok(MtxHeader {
        rows: nums[0],
        columns: nums[1],
        nonzeros: nums[2],
    })
}

/// Parses `u v [w]` into 0-based endpoints. Extra columns are ignored, so
/// unweighted loads accept files that carry values.
pub fn mtx_entry(line: &str, line_number: usize, weighted: bool) -> Result<(usize, usize, Weight)> {
    let malformed = || TdError::MalformedEdge {
        line: line_number,
        content: line.to_string(),
    };
    let mut fields = line.split_whitespace();
    let mut index = || -> Result<usize> {
        let i: usize = fields
            .next()
            .ok_or_else(malformed)?
            .parse()
            .map_err(|_| malformed())?;
        i.checked_sub(1)
            .ok_or(TdError::ZeroIndex { line: line_number })
    };
    let u = index()?;
    let v = index()?;
    let w: Weight = if weighted {
        fields
            .next()
            .ok_or_else(malformed)?
            .parse()
            .map_err(|_| malformed())?
    } else {
        1
    };
    Ok((u, v, w))
}

impl<T: BufRead> TryFrom<MtxReader<T>> for WeightedGraph {
    type Error = TdError;

    fn try_from(reader: MtxReader<T>) -> Result<Self> {
        let MtxReader {
            reader,
            source,
            options,
        } = reader;
        let io_error = |source_error| TdError::Io {
            path: source.clone(),
            source: source_error,
        };

        let mut lines = reader.lines().enumerate();
        let mut header = None;
        for (idx, line) in &mut lines {
            let line = line.map_err(io_error)?;
            if !is_skipped(&line) {
                header = Some(mtx_header(&line, idx + 1)?);
                break;
            }
        }
        let header = header.ok_or_else(|| TdError::MissingHeader {
            path: source.clone(),
        })?;
        debug!(
            "{}: {} x {} matrix with {} nonzeros",
            source, header.rows, header.columns, header.nonzeros
        );

        let mut graph = WeightedGraph::with_capacity(header.rows, options.directed);
        for (idx, line) in lines {
            let line = line.map_err(io_error)?;
            if is_skipped(&line) {
                continue;
            }
            let (u, v, w) = mtx_entry(&line, idx + 1, options.weighted)?;
            if u >= header.rows || v >= header.columns {
                return Err(TdError::MalformedEdge {
                    line: idx + 1,
                    content: line,
                });
            }
            graph.add_edge(u, v, w)?;
        }
        debug!(
            "{}: read {} vertices and {} adjacency entries",
            source,
            graph.order(),
            graph.edge_count()
        );
        Ok(graph)
    }
}

impl WeightedGraph {
    pub fn from_mtx<P: AsRef<Path>>(path: P, options: MtxOptions) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = File::open(path).map_err(|source| TdError::Io {
            path: name.clone(),
            source,
        })?;
        WeightedGraph::try_from(MtxReader::new(BufReader::new(file), name, options))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::TdError;
    use crate::graph::WeightedGraph;
    use crate::io::{mtx_entry, mtx_header, MtxOptions, MtxReader};
    use std::convert::TryFrom;
    use std::io::Cursor;

    fn read(content: &str, options: MtxOptions) -> Result<WeightedGraph, TdError> {
        WeightedGraph::try_from(MtxReader::new(Cursor::new(content), "test.mtx", options))
    }

    #[test]
    fn header() {
        let header = mtx_header("5 5 6", 2).unwrap();
        assert_eq!((header.rows, header.columns, header.nonzeros), (5, 5, 6));
        assert!(mtx_header("5 5", 1).is_err());
        match mtx_header("five 5 6", 4) {
            Err(TdError::MalformedHeader { line, .. }) => assert_eq!(line, 4),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn entries() {
        assert_eq!(mtx_entry("1 2", 1, false).unwrap(), (0, 1, 1));
        assert_eq!(mtx_entry("3 1 0.5", 1, false).unwrap(), (2, 0, 1));
        assert_eq!(mtx_entry("3 1 9", 1, true).unwrap(), (2, 0, 9));
        assert!(mtx_entry("3 1", 1, true).is_err());
        assert!(mtx_entry("3", 1, false).is_err());
        assert!(mtx_entry("3 x", 1, false).is_err());
        match mtx_entry("0 1", 8, false) {
            Err(TdError::ZeroIndex { line }) => assert_eq!(line, 8),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unweighted_undirected() {
        let content = "%%MatrixMarket matrix coordinate pattern symmetric\n\
                       % a comment\n\
                       4 4 3\n\
                       1 2\n\
                       \n\
                       2 3\n\
                       % trailing comment\n\
                       3 4\n";
        let graph = read(content, MtxOptions::default()).unwrap();
        assert_eq!(graph.order(), 4);
        assert!(graph.edge_exists(0, 1));
        assert!(graph.edge_exists(1, 0));
        assert_eq!(graph.edge_weight(2, 3).unwrap(), Some(1));
        assert_eq!(graph.bfs_traversal(0).unwrap(), vec![0, 1, 2, 3]);
        graph.check_consistency().unwrap();
    }

    #[test]
    fn weighted_directed() {
        let content = "3 3 3\n1 2 5\n2 3 7\n3 3 4\n";
        let options = MtxOptions::default().weighted(true).directed(true);
        let graph = read(content, options).unwrap();
        assert!(graph.is_directed());
        assert_eq!(graph.edge_weight(0, 1).unwrap(), Some(5));
        assert_eq!(graph.edge_weight(1, 0).unwrap(), None);
        assert_eq!(graph.edge_weight(1, 2).unwrap(), Some(7));
        assert_eq!(graph.degree(2).unwrap(), 0);
    }

    #[test]
    fn oversized_header_is_only_a_bound() {
        let content = "18446744073709551615 18446744073709551615 1\n1 2\n";
        let graph = read(content, MtxOptions::default()).unwrap();
        assert_eq!(graph.order(), 2);

        let content = "4000000000 4000000000 1\n4000000000 1\n";
        let graph = read(content, MtxOptions::default()).unwrap();
        assert!(graph.edge_exists(3_999_999_999, 0));
    }

    #[test]
    fn indices_beyond_header() {
        match read("2 2 1\n1 5\n", MtxOptions::default()) {
            Err(TdError::MalformedEdge { line, content }) => {
                assert_eq!(line, 2);
                assert_eq!(content, "1 5");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(read("3 2 1\n3 1\n", MtxOptions::default()).is_ok());
        assert!(read("3 2 1\n1 3\n", MtxOptions::default()).is_err());
    }

    #[test]
    fn only_comments() {
        match read("% nothing\n%\n", MtxOptions::default()) {
            Err(TdError::MissingHeader { path }) => assert_eq!(path, "test.mtx"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(read("", MtxOptions::default()).is_err());
    }

    #[test]
    fn malformed_edge_reports_line() {
        match read("% c\n3 3 2\n1 2\n2 b\n", MtxOptions::default()) {
            Err(TdError::MalformedEdge { line, content }) => {
                assert_eq!(line, 4);
                assert_eq!(content, "2 b");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_file() {
        let err = WeightedGraph::from_mtx("does/not/exist.mtx", MtxOptions::default());
        match err {
            Err(TdError::Io { path, .. }) => assert_eq!(path, "does/not/exist.mtx"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
