use crate::error::{Error, Result};
use crate::prelude::Id;
use crate::rng::EpiRng;

/// Sparse neighbour lists for the population graph. Undirected edges are
/// stored once per endpoint.
#[derive(Debug, Clone, Default)]
pub struct AdjList {
    directed: bool,
    neighbors: Vec<Vec<Id>>,
}

impl AdjList {
    pub fn new(n: usize, directed: bool) -> Self {
        AdjList {
            directed,
            neighbors: vec![Vec::new(); n],
        }
    }

    /// Build from an explicit edge list over `n` vertices.
    pub fn from_edgelist(n: usize, edges: &[(Id, Id)], directed: bool) -> Result<Self> {
        let mut al = AdjList::new(n, directed);
        for &(u, v) in edges {
            al.add_edge(u, v)?;
        }
        Ok(al)
    }

    pub fn vcount(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn add_edge(&mut self, u: Id, v: Id) -> Result<()> {
        let n = self.vcount();
        if u >= n || v >= n {
            return Err(Error::OutOfRange(format!(
                "edge ({}, {}) references a vertex outside 0..{}",
                u, v, n
            )));
        }
        self.neighbors[u].push(v);
        if !self.directed && u != v {
            self.neighbors[v].push(u);
        }
        Ok(())
    }

    pub fn neighbors(&self, i: Id) -> &[Id] {
        &self.neighbors[i]
    }

    pub fn degree(&self, i: Id) -> usize {
        self.neighbors[i].len()
    }

    /// Every stored arc as (source, target). For undirected graphs each
    /// edge appears once, with source <= target.
    pub fn edges(&self) -> Vec<(Id, Id)> {
        let mut out = Vec::new();
        for (u, nbs) in self.neighbors.iter().enumerate() {
            for &v in nbs {
                if self.directed || u <= v {
                    out.push((u, v));
                }
            }
        }
        out
    }

    /// Watts-Strogatz small world: a ring lattice where each vertex links
    /// to its k nearest neighbours (k/2 on each side, rounded up), then
    /// each arc is rewired to a uniform target with probability p.
    pub fn smallworld(n: usize, k: usize, p: f64, directed: bool, rng: &mut EpiRng) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidArgument("graph size must be positive".into()));
        }
        if k >= n {
            return Err(Error::InvalidArgument(format!(
                "neighbourhood size {} must be below the graph size {}",
                k, n
            )));
        }
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::InvalidArgument(format!(
                "rewiring probability {} outside [0, 1]",
                p
            )));
        }

        let mut al = AdjList::new(n, directed);
        let half = (k + 1) / 2;
        for u in 0..n {
            for j in 1..=half {
                al.add_edge(u, (u + j) % n)?;
            }
        }

        // Rewiring in place keeps the arc count fixed.
        for u in 0..n {
            for slot in 0..al.neighbors[u].len() {
                // Earlier rewires may have shortened this list.
                if slot >= al.neighbors[u].len() {
                    break;
                }
                if rng.runif() >= p {
                    continue;
                }
                let new_v = rng.unif_index(n);
                if new_v == u || al.neighbors[u].contains(&new_v) {
                    continue;
                }
                let old_v = al.neighbors[u][slot];
                al.neighbors[u][slot] = new_v;
                if !directed {
                    if let Some(pos) = al.neighbors[old_v].iter().position(|&x| x == u) {
                        al.neighbors[old_v].remove(pos);
                    }
                    al.neighbors[new_v].push(u);
                }
            }
        }

        Ok(al)
    }

    /// Degree-preserving rewire: repeatedly pick two arcs (a, b), (c, d)
    /// and swap their heads to (a, d), (c, b). Swaps that would create a
    /// self loop or a duplicate edge are skipped.
    pub fn rewire_degseq(&mut self, nrewires: usize, rng: &mut EpiRng) {
        let edges = self.edges();
        if edges.len() < 2 {
            return;
        }

        for _ in 0..nrewires {
            let (a, b) = edges[rng.unif_index(edges.len())];
            let (c, d) = edges[rng.unif_index(edges.len())];
            if a == d || c == b || a == c {
                continue;
            }
            // Either arc may have been moved by an earlier swap.
            if !self.neighbors[a].contains(&b) || !self.neighbors[c].contains(&d) {
                continue;
            }
            if self.neighbors[a].contains(&d) || self.neighbors[c].contains(&b) {
                continue;
            }
            self.swap_head(a, b, d);
            self.swap_head(c, d, b);
            if !self.directed {
                self.swap_head(b, a, c);
                self.swap_head(d, c, a);
            }
        }
    }

    fn swap_head(&mut self, tail: Id, old_head: Id, new_head: Id) {
        if let Some(pos) = self.neighbors[tail].iter().position(|&x| x == old_head) {
            self.neighbors[tail][pos] = new_head;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edgelist_roundtrip() {
        let al = AdjList::from_edgelist(4, &[(0, 1), (1, 2), (2, 3)], false).unwrap();
        assert_eq!(al.vcount(), 4);
        assert_eq!(al.neighbors(1), &[0, 2]);
        assert_eq!(al.edges().len(), 3);
    }

    #[test]
    fn rejects_out_of_range_vertices() {
        assert!(AdjList::from_edgelist(3, &[(0, 5)], false).is_err());
    }

    #[test]
    fn smallworld_has_expected_arc_count() {
        let mut rng = EpiRng::seeded(1);
        let al = AdjList::smallworld(100, 4, 0.1, false, &mut rng).unwrap();
        let total: usize = (0..100).map(|i| al.degree(i)).sum();
        // 2 arcs per vertex per side, counted from both endpoints.
        assert_eq!(total, 100 * 4);
    }

    #[test]
    fn rewire_preserves_degrees() {
        let mut rng = EpiRng::seeded(5);
        let mut al = AdjList::smallworld(200, 4, 0.0, false, &mut rng).unwrap();
        let before: Vec<usize> = (0..200).map(|i| al.degree(i)).collect();
        al.rewire_degseq(500, &mut rng);
        let after: Vec<usize> = (0..200).map(|i| al.degree(i)).collect();
        assert_eq!(before, after);
    }
}
