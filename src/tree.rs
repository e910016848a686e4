//! Computation-tree dumps.
//!
//! When enabled, the engine reports every recursion node: cache matches,
//! leaves (closed-form reductions), and non-leaf splits with the ids of
//! their children. Output is either a line-per-node text form (optionally
//! with the full graph of each node) or the XML stream consumed by the
//! external visualiser.

use std::io::Write;

use crate::graph::MultiGraph;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TreeFormat {
    Text,
    FullText,
    Xml,
}

pub struct TreeWriter {
    format: TreeFormat,
    out: Box<dyn Write>,
}

impl TreeWriter {
    pub fn new(format: TreeFormat, out: Box<dyn Write>) -> Self {
        TreeWriter { format, out }
    }

    pub fn stdout(format: TreeFormat) -> Self {
        TreeWriter::new(format, Box::new(std::io::stdout()))
    }

    pub fn start(&mut self, _tid: u32) {
        if self.format == TreeFormat::Xml {
            let _ = writeln!(self.out, "<object-stream>");
        }
    }

    pub fn end(&mut self, tid: u32) {
        match self.format {
            TreeFormat::Xml => {
                let _ = writeln!(self.out, "</object-stream>");
            }
            _ => {
                let _ = writeln!(self.out, "=== TREE {} END ===", tid);
            }
        }
    }

    /// A node resolved by a cache hit against `match_id`.
    pub fn matched(&mut self, my_id: u32, match_id: u32, graph: &MultiGraph) {
        match self.format {
            TreeFormat::Xml => {
                let _ = writeln!(self.out, "<graphnode>");
                let _ = writeln!(self.out, "<id>{}</id>", my_id);
                let _ = writeln!(self.out, "<vertices>{}</vertices>", graph.num_vertices());
                let _ = writeln!(self.out, "<edges>{}</edges>", graph.num_edges());
                let _ = writeln!(self.out, "<match>{}</match>", match_id);
                let _ = writeln!(self.out, "</graphnode>");
            }
            _ => {
                let _ = writeln!(self.out, "{}={}", my_id, match_id);
            }
        }
    }

    /// A node solved in closed form.
    pub fn leaf(&mut self, my_id: u32, graph: &MultiGraph) {
        match self.format {
            TreeFormat::Xml => {
                let _ = writeln!(self.out, "<graphnode>");
                let _ = writeln!(self.out, "<id>{}</id>", my_id);
                let _ = writeln!(self.out, "<vertices>{}</vertices>", graph.num_vertices());
                let _ = writeln!(self.out, "<edges>{}</edges>", graph.num_edges());
                self.write_xml_graph(graph);
                let _ = writeln!(self.out, "</graphnode>");
            }
            TreeFormat::FullText => {
                let _ = writeln!(self.out, "{}={}", my_id, graph);
            }
            TreeFormat::Text => {}
        }
    }

    /// A split node with children `start_id .. start_id + count`.
    pub fn nonleaf(&mut self, my_id: u32, start_id: u32, count: u32, graph: &MultiGraph) {
        match self.format {
            TreeFormat::Xml => {
                let (left, right) = if count < 2 {
                    (start_id as i64, -1)
                } else {
                    (start_id as i64, (start_id + 1) as i64)
                };
                let _ = writeln!(self.out, "<graphnode>");
                let _ = writeln!(self.out, "<id>{}</id>", my_id);
                let _ = writeln!(self.out, "<vertices>{}</vertices>", graph.num_vertices());
                let _ = writeln!(self.out, "<edges>{}</edges>", graph.num_edges());
                let _ = writeln!(self.out, "<left>{}</left>", left);
                let _ = writeln!(self.out, "<right>{}</right>", right);
                self.write_xml_graph(graph);
                let _ = writeln!(self.out, "</graphnode>");
            }
            _ => {
                let _ = write!(self.out, "{}=", my_id);
                for i in 0..count {
                    if i != 0 {
                        let _ = write!(self.out, "+");
                    }
                    let _ = write!(self.out, "{}", start_id + i);
                }
                if self.format == TreeFormat::FullText {
                    let _ = write!(self.out, "={}", graph);
                }
                let _ = writeln!(self.out);
            }
        }
    }

    fn write_xml_graph(&mut self, graph: &MultiGraph) {
        let _ = writeln!(self.out, "<graph>");
        let _ = writeln!(self.out, "<struct>");
        for (u, v, k) in graph.edges() {
            let _ = writeln!(self.out, "<edge>");
            let _ = writeln!(self.out, "<sV>{}</sV>", u);
            let _ = writeln!(self.out, "<fV>{}</fV>", v);
            let _ = writeln!(self.out, "<nE>{}</nE>", k);
            let _ = writeln!(self.out, "</edge>");
        }
        let _ = writeln!(self.out, "</struct></graph>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn collect(format: TreeFormat, f: impl FnOnce(&mut TreeWriter)) -> String {
        let sink = Sink::default();
        let mut w = TreeWriter::new(format, Box::new(sink.clone()));
        f(&mut w);
        let bytes = sink.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_text_tree() {
        let g = MultiGraph::parse("0--1,1--2,0--2").unwrap();
        let out = collect(TreeFormat::Text, |w| {
            w.start(0);
            w.nonleaf(1, 2, 2, &g);
            w.matched(2, 1, &g);
            w.leaf(3, &g);
            w.end(0);
        });
        assert_eq!(out, "1=2+3\n2=1\n=== TREE 0 END ===\n");
    }

    #[test]
    fn test_full_text_includes_graph() {
        let g = MultiGraph::parse("0--1,0--1").unwrap();
        let out = collect(TreeFormat::FullText, |w| {
            w.leaf(4, &g);
        });
        assert_eq!(out, "4=0--1,0--1\n");
    }

    #[test]
    fn test_xml_tree() {
        let g = MultiGraph::parse("0--1").unwrap();
        let out = collect(TreeFormat::Xml, |w| {
            w.start(0);
            w.matched(2, 1, &g);
            w.end(0);
        });
        assert!(out.starts_with("<object-stream>\n"));
        assert!(out.contains("<match>1</match>"));
        assert!(out.ends_with("</object-stream>\n"));
    }
}
