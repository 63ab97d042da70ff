//! Neighbor list storage, kept apart from node metadata so graph traversal
//! only pays for the neighbor lists it actually visits.

#[derive(Clone, Debug, Default)]
pub struct NeighborLists {
    /// neighbors[row][level] = neighbor rows at that level.
    neighbors: Vec<Vec<Vec<u32>>>,
    max_levels: usize,
}

impl NeighborLists {
    pub fn new(max_levels: usize) -> Self {
        Self {
            neighbors: Vec::new(),
            max_levels,
        }
    }

    fn ensure_row(&mut self, row: usize) {
        while self.neighbors.len() <= row {
            self.neighbors.push(vec![Vec::new(); self.max_levels]);
        }
    }

    pub fn get_neighbors(&self, row: u32, level: u8) -> &[u32] {
        let row = row as usize;
        let level = level as usize;
        if row >= self.neighbors.len() || level >= self.neighbors[row].len() {
            return &[];
        }
        &self.neighbors[row][level]
    }

    pub fn set_neighbors(&mut self, row: u32, level: u8, list: Vec<u32>) {
        self.ensure_row(row as usize);
        self.neighbors[row as usize][level as usize] = list;
    }

    pub fn add_bidirectional_link(&mut self, a: u32, b: u32, level: u8) {
        self.ensure_row(a.max(b) as usize);
        let level = level as usize;
        if !self.neighbors[a as usize][level].contains(&b) {
            self.neighbors[a as usize][level].push(b);
        }
        if !self.neighbors[b as usize][level].contains(&a) {
            self.neighbors[b as usize][level].push(a);
        }
    }

    pub fn memory_usage(&self) -> usize {
        let mut total = self.neighbors.capacity() * std::mem::size_of::<Vec<Vec<u32>>>();
        for row in &self.neighbors {
            total += row.capacity() * std::mem::size_of::<Vec<u32>>();
            for level in row {
                total += level.len() * std::mem::size_of::<u32>();
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_neighbors_defaults_to_empty() {
        let lists = NeighborLists::new(8);
        assert!(lists.get_neighbors(0, 0).is_empty());
    }

    #[test]
    fn test_bidirectional_link_is_symmetric() {
        let mut lists = NeighborLists::new(8);
        lists.add_bidirectional_link(0, 1, 0);
        assert_eq!(lists.get_neighbors(0, 0), &[1]);
        assert_eq!(lists.get_neighbors(1, 0), &[0]);
    }

    #[test]
    fn test_bidirectional_link_does_not_duplicate() {
        let mut lists = NeighborLists::new(8);
        lists.add_bidirectional_link(0, 1, 0);
        lists.add_bidirectional_link(0, 1, 0);
        assert_eq!(lists.get_neighbors(0, 0), &[1]);
    }
}
