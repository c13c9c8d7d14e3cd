//! A minimal recursive walker over EVIO container trees.
//!
//! The walker only knows the framing (bank, segment and tagsegment headers). It hands
//! every node it finds to a [`NodeHandler`] together with the chain of containers
//! above it. What the nodes mean is entirely up to the handler.
use super::constants::MAX_NODE_DEPTH;
use super::error::WalkError;
use super::index::Span;
use super::words::{BankHeader, ContainerKind, ContentType, SegmentHeader, TagSegmentHeader};

/// The parts of a container node that its descendants get to see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ancestor {
    pub tag: u16,
    pub num: u8,
    pub content: ContentType,
    pub kind: ContainerKind,
}

/// The chain of containers above a node, indexed by depth
#[derive(Debug, Clone)]
pub struct AncestorStack {
    frames: [Option<Ancestor>; MAX_NODE_DEPTH],
    depth: usize,
}

impl Default for AncestorStack {
    fn default() -> Self {
        Self {
            frames: [None; MAX_NODE_DEPTH],
            depth: 0,
        }
    }
}

impl AncestorStack {
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The ancestor at a given depth (0 is the root bank)
    pub fn at(&self, depth: usize) -> Option<&Ancestor> {
        if depth < self.depth {
            self.frames[depth].as_ref()
        } else {
            None
        }
    }

    /// The direct parent of the node being visited
    pub fn parent(&self) -> Option<&Ancestor> {
        self.depth.checked_sub(1).and_then(|d| self.at(d))
    }

    fn push(&mut self, ancestor: Ancestor) -> bool {
        if self.depth >= MAX_NODE_DEPTH {
            return false;
        }
        self.frames[self.depth] = Some(ancestor);
        self.depth += 1;
        true
    }

    fn pop(&mut self) {
        if self.depth > 0 {
            self.depth -= 1;
            self.frames[self.depth] = None;
        }
    }
}

/// A node of the container tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    /// Header flavour of this node
    pub kind: ContainerKind,
    pub content: ContentType,
    pub tag: u16,
    /// Only banks carry a num; zero otherwise
    pub num: u8,
    pub padding: u8,
    pub depth: usize,
    /// First word of the node (the length word for banks)
    pub header_index: usize,
    /// Total words of the node, headers included
    pub length: usize,
    pub payload: Span,
}

impl Node {
    fn as_ancestor(&self) -> Ancestor {
        Ancestor {
            tag: self.tag,
            num: self.num,
            content: self.content,
            kind: self.kind,
        }
    }
}

/// What the walker should do with the children of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Descend,
    Skip,
}

pub trait NodeHandler {
    /// Called for every node whose content is more containers
    fn container_node(&mut self, node: &Node, ancestors: &AncestorStack) -> Visit;

    /// Called for every node whose content is data
    fn leaf_node(&mut self, node: &Node, ancestors: &AncestorStack);

    /// Called when an inner container is malformed; the rest of its parent is skipped
    fn walk_error(&mut self, _error: WalkError) {}
}

/// Walk the tree rooted at the bank starting at word 0 of `buffer`.
///
/// Only a malformed root bank is an error. Malformed inner containers are reported
/// to the handler and the walk continues with the next container it can trust.
pub fn walk<H: NodeHandler>(buffer: &[u32], handler: &mut H) -> Result<(), WalkError> {
    if buffer.len() < 2 {
        return Err(WalkError::EmptyBuffer);
    }
    let mut ancestors = AncestorStack::default();
    let root = read_node(buffer, 0, buffer.len(), ContainerKind::Bank, 0)?;
    visit(buffer, &root, handler, &mut ancestors);
    Ok(())
}

fn visit<H: NodeHandler>(
    buffer: &[u32],
    node: &Node,
    handler: &mut H,
    ancestors: &mut AncestorStack,
) {
    let child_kind = match node.content.container_kind() {
        Some(kind) => kind,
        None => {
            handler.leaf_node(node, ancestors);
            return;
        }
    };

    if handler.container_node(node, ancestors) == Visit::Skip {
        return;
    }
    if !ancestors.push(node.as_ancestor()) {
        handler.walk_error(WalkError::TooDeep(node.header_index));
        return;
    }

    let end = node.payload.end();
    let mut at = node.payload.index;
    while at < end {
        match read_node(buffer, at, end, child_kind, node.depth + 1) {
            Ok(child) => {
                visit(buffer, &child, handler, ancestors);
                at += child.length;
            }
            Err(e) => {
                handler.walk_error(e);
                break;
            }
        }
    }

    ancestors.pop();
}

/// Decode the node header at `at`, which must fit before `limit`
fn read_node(
    buffer: &[u32],
    at: usize,
    limit: usize,
    kind: ContainerKind,
    depth: usize,
) -> Result<Node, WalkError> {
    let overrun = |length: usize| WalkError::Overrun {
        index: at,
        length,
        available: limit.saturating_sub(at),
    };

    let node = match kind {
        ContainerKind::Bank => {
            if at + 2 > limit {
                return Err(overrun(2));
            }
            let length = buffer[at] as usize;
            let header = BankHeader(buffer[at + 1]);
            if length == 0 || at + 1 + length > limit {
                return Err(overrun(length + 1));
            }
            Node {
                kind,
                content: header.content_type(),
                tag: header.tag(),
                num: header.num(),
                padding: header.padding(),
                depth,
                header_index: at,
                length: length + 1,
                payload: Span::new(at + 2, length - 1),
            }
        }
        ContainerKind::Segment => {
            let header = SegmentHeader(buffer[at]);
            if at + 1 + header.length() > limit {
                return Err(overrun(header.length() + 1));
            }
            Node {
                kind,
                content: header.content_type(),
                tag: header.tag() as u16,
                num: 0,
                padding: header.padding(),
                depth,
                header_index: at,
                length: header.length() + 1,
                payload: Span::new(at + 1, header.length()),
            }
        }
        ContainerKind::TagSegment => {
            let header = TagSegmentHeader(buffer[at]);
            if at + 1 + header.length() > limit {
                return Err(overrun(header.length() + 1));
            }
            Node {
                kind,
                content: header.content_type(),
                tag: header.tag(),
                num: 0,
                padding: 0,
                depth,
                header_index: at,
                length: header.length() + 1,
                payload: Span::new(at + 1, header.length()),
            }
        }
    };
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::EvioBuilder;

    #[derive(Default)]
    struct Recorder {
        containers: Vec<(usize, u16, Option<u16>)>,
        leaves: Vec<(usize, u16, Option<u16>, Span)>,
        errors: Vec<WalkError>,
    }

    impl NodeHandler for Recorder {
        fn container_node(&mut self, node: &Node, ancestors: &AncestorStack) -> Visit {
            self.containers
                .push((node.depth, node.tag, ancestors.parent().map(|p| p.tag)));
            Visit::Descend
        }

        fn leaf_node(&mut self, node: &Node, ancestors: &AncestorStack) {
            self.leaves.push((
                node.depth,
                node.tag,
                ancestors.parent().map(|p| p.tag),
                node.payload,
            ));
        }

        fn walk_error(&mut self, error: WalkError) {
            self.errors.push(error);
        }
    }

    #[test]
    fn test_walk_nested_banks() {
        let mut b = EvioBuilder::new();
        b.open_bank(0xFF50, ContentType::Bank, 2);
        b.open_bank(1, ContentType::Bank, 2);
        b.open_bank(3, ContentType::UInt32, 0);
        b.words(&[0xA, 0xB]);
        b.close();
        b.close();
        b.close();
        let buffer = b.finish();

        let mut rec = Recorder::default();
        walk(&buffer, &mut rec).unwrap();
        assert_eq!(rec.containers, vec![(0, 0xFF50, None), (1, 1, Some(0xFF50))]);
        assert_eq!(rec.leaves.len(), 1);
        let (depth, tag, parent, span) = rec.leaves[0];
        assert_eq!((depth, tag, parent), (2, 3, Some(1)));
        assert_eq!(span.slice(&buffer), Some(&[0xA, 0xB][..]));
        assert!(rec.errors.is_empty());
    }

    #[test]
    fn test_walk_segments() {
        let mut b = EvioBuilder::new();
        b.open_bank(0xFF50, ContentType::Bank, 1);
        b.open_bank(0xFF21, ContentType::Segment, 1);
        b.open_segment(1, ContentType::UInt32);
        b.words(&[7, 8, 9]);
        b.close();
        b.close();
        b.close();
        let buffer = b.finish();

        let mut rec = Recorder::default();
        walk(&buffer, &mut rec).unwrap();
        assert_eq!(rec.leaves.len(), 1);
        let (depth, tag, parent, span) = rec.leaves[0];
        assert_eq!((depth, tag, parent), (2, 1, Some(0xFF21)));
        assert_eq!(span.length, 3);
    }

    #[test]
    fn test_overrun_only_loses_the_broken_container() {
        let mut b = EvioBuilder::new();
        b.open_bank(0xFF50, ContentType::Bank, 1);
        b.open_bank(1, ContentType::Bank, 1);
        b.open_bank(3, ContentType::UInt32, 0);
        b.words(&[1, 2]);
        b.close();
        b.close();
        b.open_bank(2, ContentType::Bank, 1);
        b.open_bank(4, ContentType::UInt32, 0);
        b.words(&[3]);
        b.close();
        b.close();
        b.close();
        let mut buffer = b.finish();
        // Corrupt the length of the leaf in ROC 1 so it runs past ROC 1
        buffer[4] = 50;

        let mut rec = Recorder::default();
        walk(&buffer, &mut rec).unwrap();
        assert_eq!(rec.errors.len(), 1);
        assert!(matches!(rec.errors[0], WalkError::Overrun { index: 4, .. }));
        // ROC 2 is still found
        assert_eq!(rec.leaves.len(), 1);
        assert_eq!(rec.leaves[0].1, 4);
    }

    #[test]
    fn test_root_errors() {
        let mut rec = Recorder::default();
        assert_eq!(walk(&[5], &mut rec), Err(WalkError::EmptyBuffer));
        assert!(matches!(
            walk(&[10, 0xFF50_1001], &mut rec),
            Err(WalkError::Overrun { index: 0, .. })
        ));
    }

    #[test]
    fn test_ancestor_lookup_by_depth() {
        let mut stack = AncestorStack::default();
        let a = Ancestor {
            tag: 0xFF50,
            num: 1,
            content: ContentType::Bank,
            kind: ContainerKind::Bank,
        };
        let b = Ancestor { tag: 5, ..a };
        assert!(stack.push(a));
        assert!(stack.push(b));
        assert_eq!(stack.at(0).map(|x| x.tag), Some(0xFF50));
        assert_eq!(stack.parent().map(|x| x.tag), Some(5));
        assert_eq!(stack.at(2), None);
        stack.pop();
        assert_eq!(stack.parent().map(|x| x.tag), Some(0xFF50));
    }
}
