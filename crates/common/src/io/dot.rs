use crate::dfg::Dfg;
use petgraph::graph::NodeIndex;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::num::ParseIntError;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadDotError {
    #[error("missing header (expected 'digraph [name] {{')")]
    MissingHeader,
    #[error("invalid line {line} (got {text})")]
    InvalidLine { line: usize, text: String },
    #[error("node {0} declared twice")]
    DuplicateNode(usize),
    #[error("edge references undeclared node {0}")]
    UnknownNode(usize),
    #[error("node ids are not contiguous (expected 0..{expected}, missing {missing})")]
    NonContiguousIds { expected: usize, missing: usize },
    #[error("missing closing '}}'")]
    Unterminated,
    #[error("parse int error")]
    ParseInt(#[from] ParseIntError),
    #[error("io error")]
    IoError(#[from] std::io::Error),
}

/// Reads the subset of the DOT language the partitioner emits.
///
/// The restrictions are
/// + one statement per line, `digraph [name] {` as the first statement
/// + node statements `id [label="..."]` with ids forming the range `0..n`
/// + edge statements `a -> b [label="..."]` between declared nodes
/// + attributes other than `label` are ignored, as are `node`/`edge`/`graph` defaults
pub fn read_dot<P>(path: P) -> Result<Dfg, ReadDotError>
where
    P: AsRef<Path>,
{
    let file = File::open(path)?;
    parse_dot(BufReader::new(file))
}

pub fn parse_dot<R: BufRead>(reader: R) -> Result<Dfg, ReadDotError> {
    let mut lines = reader.lines().enumerate();

    let name = loop {
        let line = lines.next().ok_or(ReadDotError::MissingHeader)?.1?;
        let line = line.trim();
        if is_skipped(line) {
            continue;
        }
        let header = line.strip_prefix("digraph").ok_or(ReadDotError::MissingHeader)?;
        let name = header.trim().strip_suffix('{').ok_or(ReadDotError::MissingHeader)?;
        break name.trim().trim_matches('"').to_string();
    };

    let mut labels: Vec<Option<String>> = vec![];
    let mut edges = vec![];
    let mut closed = false;
    for (line_idx, line) in lines {
        let line = line?;
        let text = line.trim();
        if is_skipped(text) {
            continue;
        }
        if text == "}" {
            closed = true;
            break;
        }
        let invalid = || ReadDotError::InvalidLine { line: line_idx + 1, text: line.clone() };

        let text = text.strip_suffix(';').unwrap_or(text).trim_end();
        let (head, attrs) = match text.find('[') {
            Some(i) => (text[..i].trim(), Some(&text[i..])),
            None => (text, None),
        };
        if is_default_statement(head) {
            continue;
        }
        let label = match attrs {
            Some(attrs) => parse_label(attrs).ok_or_else(invalid)?,
            None => String::new(),
        };

        if let Some((a, b)) = head.split_once("->") {
            let u = parse_id(a)?;
            let v = parse_id(b)?;
            edges.push((u, v, label));
        } else {
            let u = parse_id(head)?;
            if u >= labels.len() {
                labels.resize(u + 1, None);
            }
            if labels[u].is_some() {
                return Err(ReadDotError::DuplicateNode(u));
            }
            labels[u] = Some(label);
        }
    }
    if !closed {
        return Err(ReadDotError::Unterminated);
    }

    let n = labels.len();
    let mut dfg = Dfg::with_capacity(name, n, edges.len());
    for (u, label) in labels.into_iter().enumerate() {
        let label = label.ok_or(ReadDotError::NonContiguousIds { expected: n, missing: u })?;
        dfg.add_node(label);
    }
    for (u, v, label) in edges {
        for w in [u, v] {
            if w >= n {
                return Err(ReadDotError::UnknownNode(w));
            }
        }
        dfg.add_edge(NodeIndex::new(u), NodeIndex::new(v), label);
    }
    Ok(dfg)
}

fn is_skipped(line: &str) -> bool {
    line.is_empty() || line.starts_with("//") || line.starts_with('#')
}

fn is_default_statement(head: &str) -> bool {
    matches!(head, "node" | "edge" | "graph") || head.contains('=')
}

fn parse_id(s: &str) -> Result<usize, ParseIntError> {
    s.trim().trim_matches('"').parse()
}

/// Extracts the `label` value from an attribute list `[k=v, ...]`. Missing label is empty.
fn parse_label(attrs: &str) -> Option<String> {
    let mut rest = attrs.strip_prefix('[')?.strip_suffix(']')?;
    let mut label = String::new();
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == ';');
        if rest.is_empty() {
            return Some(label);
        }
        let (key, after) = rest.split_once('=')?;
        let after = after.trim_start();
        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            let (value, consumed) = unquote(quoted)?;
            (value, &quoted[consumed..])
        } else {
            let end = after.find(|c: char| c.is_whitespace() || c == ',' || c == ';').unwrap_or(after.len());
            (after[..end].to_string(), &after[end..])
        };
        if key.trim() == "label" {
            label = value;
        }
        rest = remaining;
    }
}

/// Returns the unescaped text up to the closing quote and the bytes consumed including the quote.
fn unquote(s: &str) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some((out, i + 1));
        } else {
            out.push(c);
        }
    }
    None
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Error, Debug)]
pub enum WriteDotError {
    #[error("io error")]
    IoError(#[from] std::io::Error),
}

pub fn write_dot<W: Write>(out: &mut W, dfg: &Dfg) -> Result<(), WriteDotError> {
    let name = dfg.name();
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        writeln!(out, "digraph {name} {{")?;
    } else {
        writeln!(out, "digraph \"{}\" {{", escape(name))?;
    }
    for (u, label) in dfg.nodes() {
        writeln!(out, "  {} [label=\"{}\"];", u.index(), escape(label))?;
    }
    for (u, v, label) in dfg.edges() {
        if label.is_empty() {
            writeln!(out, "  {} -> {};", u.index(), v.index())?;
        } else {
            writeln!(out, "  {} -> {} [label=\"{}\"];", u.index(), v.index(), escape(label))?;
        }
    }
    writeln!(out, "}}")?;
    out.flush()?;
    Ok(())
}

pub fn write_dot_file<P>(path: P, dfg: &Dfg) -> Result<(), WriteDotError>
where
    P: AsRef<Path>,
{
    let file = File::create(path)?;
    let mut file = BufWriter::new(file);
    write_dot(&mut file, dfg)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn small_graph() {
        let input = r#"// two loads feeding an add
digraph kernel {
  node [shape=box];
  1 [label="load;0"];
  0 [label="load;0", shape=ellipse];
  2 [label="add"];
  3 [label="store;1"];
  0 -> 2 [label="a"];
  1 -> 2;
  2 -> 3 [label="sum"];
}
"#;
        let dfg = parse_dot(input.as_bytes()).unwrap();
        assert_eq!(dfg.name(), "kernel");
        assert_eq!(dfg.node_count(), 4);
        assert_eq!(dfg.edge_count(), 3);
        assert_eq!(dfg.find_node(0), Some("load;0"));
        assert_eq!(dfg.find_node(3), Some("store;1"));
        let edges: Vec<_> = dfg.edges().map(|(u, v, l)| (u.index(), v.index(), l.to_string())).collect();
        assert_eq!(edges, [(0, 2, "a".to_string()), (1, 2, String::new()), (2, 3, "sum".to_string())]);
    }

    #[test]
    fn write_then_read() {
        let mut dfg = Dfg::new("with space");
        let a = dfg.add_node("load;3");
        let b = dfg.add_node("say \"hi\"");
        dfg.add_edge(a, b, "x");

        let mut out = Vec::new();
        write_dot(&mut out, &dfg).unwrap();
        let text = String::from_utf8(out).unwrap();
        let expected = r#"digraph "with space" {
  0 [label="load;3"];
  1 [label="say \"hi\""];
  0 -> 1 [label="x"];
}
"#;
        assert_eq!(text, expected);

        let back = parse_dot(text.as_bytes()).unwrap();
        assert_eq!(back.name(), "with space");
        assert_eq!(back.find_node(1), Some("say \"hi\""));
    }

    #[test]
    fn errors() {
        let missing = parse_dot("0 [label=\"a\"];\n".as_bytes()).unwrap_err();
        assert!(matches!(missing, ReadDotError::MissingHeader));

        let gap = parse_dot("digraph g {\n0;\n2;\n}\n".as_bytes()).unwrap_err();
        assert!(matches!(gap, ReadDotError::NonContiguousIds { expected: 3, missing: 1 }));

        let unknown = parse_dot("digraph g {\n0;\n0 -> 4;\n}\n".as_bytes()).unwrap_err();
        assert!(matches!(unknown, ReadDotError::UnknownNode(4)));

        let twice = parse_dot("digraph g {\n0;\n0;\n}\n".as_bytes()).unwrap_err();
        assert!(matches!(twice, ReadDotError::DuplicateNode(0)));

        let open = parse_dot("digraph g {\n0;\n".as_bytes()).unwrap_err();
        assert!(matches!(open, ReadDotError::Unterminated));

        let quote = parse_dot("digraph g {\n0 [label=\"oops];\n}\n".as_bytes()).unwrap_err();
        assert!(matches!(quote, ReadDotError::InvalidLine { line: 2, .. }));
    }
}
