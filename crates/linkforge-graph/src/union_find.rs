//! Disjoint-set union with union-by-size and path compression, over dense
//! node indices. Union-by-size keeps merge order irrelevant; the canonical
//! representative is chosen separately (lowest original id) once all unions
//! are done.

pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != cur {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Returns true when the two elements were in different sets.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        true
    }

    pub fn same(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unions_are_commutative_and_associative() {
        let mut a = UnionFind::new(4);
        a.union(0, 1);
        a.union(2, 3);
        a.union(1, 2);

        let mut b = UnionFind::new(4);
        b.union(3, 2);
        b.union(1, 0);
        b.union(0, 3);

        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(a.same(i, j), b.same(i, j));
            }
        }
    }

    #[test]
    fn singleton_sets_distinct() {
        let mut uf = UnionFind::new(3);
        assert!(!uf.same(0, 2));
        assert!(uf.union(0, 2));
        assert!(!uf.union(0, 2));
        assert!(uf.same(0, 2));
    }
}
