//! Random-projection forest search, in the style of Annoy: each tree splits
//! its points recursively with a random hyperplane until a leaf is small
//! enough, and a query walks all trees before an exact re-rank.

use crate::distance::sq_l2;
use crate::error::{AnnError, Result};
use crate::heap::{SearchResult, TopK};
use crate::store::VectorStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roaring::RoaringBitmap;
use std::collections::{BinaryHeap, HashMap, HashSet};

#[derive(Clone, Copy, Debug)]
pub struct AnnoyParams {
    pub num_trees: usize,
    pub leaf_size: usize,
    pub search_k: usize,
    pub seed: u64,
}

impl Default for AnnoyParams {
    fn default() -> Self {
        Self {
            num_trees: 8,
            leaf_size: 16,
            search_k: 200,
            seed: 42,
        }
    }
}

impl AnnoyParams {
    pub fn validate(&self, dims: usize) -> std::result::Result<(), String> {
        if self.num_trees == 0 {
            return Err("num_trees must be >= 1".to_string());
        }
        if self.leaf_size < 2 * dims {
            return Err("leaf_size must be >= 2 * dims".to_string());
        }
        Ok(())
    }
}

enum Node {
    Leaf(Vec<u32>),
    Split {
        normal: Vec<f32>,
        threshold: f32,
        left: Box<Node>,
        right: Box<Node>,
    },
}

struct Tree {
    root: Node,
}

impl Tree {
    fn build(rows: Vec<u32>, store: &VectorStore, leaf_size: usize, rng: &mut StdRng) -> Self {
        Self {
            root: Self::build_node(rows, store, leaf_size, rng),
        }
    }

    fn row_vector(store: &VectorStore, row: u32) -> &[f32] {
        store.get(row as usize).map(|(_, v, _)| v).expect("row exists")
    }

    fn build_node(rows: Vec<u32>, store: &VectorStore, leaf_size: usize, rng: &mut StdRng) -> Node {
        if rows.len() <= leaf_size {
            return Node::Leaf(rows);
        }

        let a = rows[rng.gen_range(0..rows.len())];
        let mut b = rows[rng.gen_range(0..rows.len())];
        for _ in 0..4 {
            if b != a {
                break;
            }
            b = rows[rng.gen_range(0..rows.len())];
        }

        let va = Self::row_vector(store, a);
        let vb = Self::row_vector(store, b);
        let dims = va.len();
        let normal: Vec<f32> = (0..dims).map(|i| va[i] - vb[i]).collect();
        let midpoint: Vec<f32> = (0..dims).map(|i| (va[i] + vb[i]) / 2.0).collect();
        let offset = crate::distance::dot(&normal, &midpoint);

        let mut left_rows = Vec::new();
        let mut right_rows = Vec::new();
        for &row in &rows {
            let side = crate::distance::dot(&normal, Self::row_vector(store, row)) - offset;
            if side <= 0.0 {
                left_rows.push(row);
            } else {
                right_rows.push(row);
            }
        }

        // Degenerate split (all points on one side): fall back to a leaf
        // rather than recursing forever on an unsplittable set.
        if left_rows.is_empty() || right_rows.is_empty() {
            return Node::Leaf(rows);
        }

        Node::Split {
            normal,
            threshold: offset,
            left: Box::new(Self::build_node(left_rows, store, leaf_size, rng)),
            right: Box::new(Self::build_node(right_rows, store, leaf_size, rng)),
        }
    }

    /// Walks down favoring the side the query lands on, pushing the other
    /// side onto `frontier` so the caller can backtrack into it if budget
    /// allows, in priority order by how close the query is to the split.
    fn collect(&self, query: &[f32], search_k: usize, out: &mut HashSet<u32>) {
        let mut frontier: BinaryHeap<OrderedNode> = BinaryHeap::new();
        frontier.push(OrderedNode {
            priority: ordered_float::OrderedFloat(f32::INFINITY),
            node: &self.root,
        });

        while out.len() < search_k {
            let Some(OrderedNode { node, .. }) = frontier.pop() else {
                break;
            };
            match node {
                Node::Leaf(rows) => out.extend(rows.iter().copied()),
                Node::Split {
                    normal,
                    threshold,
                    left,
                    right,
                } => {
                    let side = crate::distance::dot(normal, query) - threshold;
                    let (near, far) = if side <= 0.0 { (left, right) } else { (right, left) };
                    frontier.push(OrderedNode {
                        priority: ordered_float::OrderedFloat(f32::INFINITY),
                        node: near,
                    });
                    frontier.push(OrderedNode {
                        priority: ordered_float::OrderedFloat(-side.abs()),
                        node: far,
                    });
                }
            }
        }
    }
}

struct OrderedNode<'a> {
    priority: ordered_float::OrderedFloat<f32>,
    node: &'a Node,
}

impl PartialEq for OrderedNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl Eq for OrderedNode<'_> {}
impl PartialOrd for OrderedNode<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrderedNode<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority.cmp(&other.priority)
    }
}

pub struct AnnoyIndex {
    store: VectorStore,
    params: AnnoyParams,
    trees: Option<Vec<Tree>>,
    tombstones: RoaringBitmap,
    id_to_rows: HashMap<i32, Vec<u32>>,
}

impl AnnoyIndex {
    pub fn new(dims: usize, max_elements: usize, params: AnnoyParams) -> Result<Self> {
        params.validate(dims).map_err(AnnError::InvalidArgument)?;
        Ok(Self {
            store: VectorStore::new(dims, max_elements),
            params,
            trees: None,
            tombstones: RoaringBitmap::new(),
            id_to_rows: HashMap::new(),
        })
    }

    pub fn dimensions(&self) -> usize {
        self.store.dims()
    }

    pub fn is_built(&self) -> bool {
        self.trees.is_some()
    }

    pub fn add(&mut self, id: i32, vector: &[f32]) -> Result<u32> {
        let row = self.store.add(id, vector)? as u32;
        self.id_to_rows.entry(id).or_default().push(row);
        // A new add invalidates any previously built forest.
        self.trees = None;
        Ok(row)
    }

    pub fn add_batch(&mut self, ids: &[i32], vectors: &[f32]) -> Result<Vec<u32>> {
        let dims = self.dimensions();
        let mut rows = Vec::with_capacity(ids.len());
        for (i, &id) in ids.iter().enumerate() {
            rows.push(self.add(id, &vectors[i * dims..(i + 1) * dims])?);
        }
        Ok(rows)
    }

    pub fn build(&mut self) -> Result<()> {
        let n = self.store.size();
        if n == 0 {
            return Err(AnnError::InsufficientSamples { required: 1, got: 0 });
        }
        let rows: Vec<u32> = (0..n as u32).collect();
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let trees = (0..self.params.num_trees)
            .map(|_| Tree::build(rows.clone(), &self.store, self.params.leaf_size, &mut rng))
            .collect();
        self.trees = Some(trees);
        Ok(())
    }

    pub fn search(&self, query: &[f32], k: usize, search_k: Option<usize>) -> Result<Vec<SearchResult>> {
        let trees = self.trees.as_ref().ok_or(AnnError::NotBuilt)?;
        if k == 0 {
            return Err(AnnError::InvalidArgument("k must be > 0".to_string()));
        }
        if query.len() != self.dimensions() {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimensions(),
                actual: query.len(),
            });
        }

        let budget = search_k.unwrap_or(self.params.search_k);
        let mut candidates = HashSet::new();
        for tree in trees {
            tree.collect(query, budget, &mut candidates);
        }

        let mut top = TopK::new(k);
        for row in candidates {
            if self.tombstones.contains(row) {
                continue;
            }
            let (_, vec, _) = self.store.get(row as usize).expect("row exists");
            top.push(row, sq_l2(query, vec));
        }

        Ok(top
            .into_sorted_vec()
            .into_iter()
            .map(|c| {
                let (id, _, _) = self.store.get(c.row as usize).expect("row exists");
                SearchResult::new(id, c.distance.0)
            })
            .collect())
    }

    pub fn size(&self) -> usize {
        self.store.size() - self.tombstones.len() as usize
    }

    pub fn remove(&mut self, id: i32) -> usize {
        match self.id_to_rows.remove(&id) {
            Some(rows) => {
                for row in &rows {
                    self.tombstones.insert(*row);
                }
                rows.len()
            }
            None => 0,
        }
    }

    pub fn close(&mut self) {
        self.store.clear();
        self.trees = None;
        self.tombstones.clear();
        self.id_to_rows.clear();
    }
}
