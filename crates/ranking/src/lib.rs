//! # Ranking — Ordered Leaderboard Index
//!
//! A span-augmented probabilistic skip list over `(score, user_id)` keys,
//! paired with a `user_id → node` side map. This is the in-memory half of a
//! leaderboard shard: the skip list yields ordered top-K walks and O(log n)
//! rank queries, the side map yields O(1) score lookups and existence checks.
//!
//! ## Ordering
//!
//! Entries are kept in *ranking order*: higher `score` first, ties broken by
//! byte-lexicographically smaller `user_id` first. Rank is the 1-based
//! position in that order.
//!
//! ## Spans
//!
//! Every forward pointer carries a `span`: the number of level-0 steps the
//! pointer advances. `rank_of` sums the spans followed on the search path to
//! the target node, which keeps rank queries at O(log n) instead of a level-0
//! scan.
//!
//! ## Sequence numbers
//!
//! Each entry remembers the sequence number of the write that produced it.
//! An upsert carrying a sequence number that is not newer than the stored one
//! is ignored, so concurrent writers applying out of order converge to the
//! same state as an in-order replay.
//!
//! ## Example
//!
//! ```rust
//! use ranking::RankingIndex;
//!
//! let mut index = RankingIndex::new();
//! index.upsert("alice", 90, 1);
//! index.upsert("bob", 120, 2);
//!
//! let top = index.top_k(2);
//! assert_eq!(top[0].user_id, "bob");
//! assert_eq!(index.rank_of("alice"), Some(2));
//! ```

use rand::Rng;
use std::collections::HashMap;

/// Hard cap on node height. With p = 0.5 this comfortably covers multi-million
/// entry shards.
const MAX_LEVEL: usize = 16;

/// Probability of promoting a node one more level.
const P: f64 = 0.5;

/// Sentinel "null" node index.
const NIL: u32 = u32::MAX;

/// Arena index of the header sentinel.
const HEAD: u32 = 0;

/// A single forward pointer: the next node at this level and the number of
/// level-0 steps the pointer advances (distance to the end of the list when
/// `next` is `NIL`).
#[derive(Debug, Clone, Copy)]
struct Link {
    next: u32,
    span: u32,
}

#[derive(Debug)]
struct Node {
    user_id: Box<str>,
    score: i64,
    /// Sequence number of the write that last touched this entry.
    seq: u64,
    /// Forward pointers, one per level, sized at allocation.
    links: Vec<Link>,
}

/// Outcome of an [`RankingIndex::upsert`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The user did not exist; a new entry was created.
    Inserted,
    /// The user existed; its score (or sequence number) was refreshed.
    Updated,
    /// The write was superseded by a newer sequence number already applied.
    Ignored,
}

/// A single row of a top-K walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub user_id: String,
    pub score: i64,
    /// 1-based, dense.
    pub rank: u64,
}

/// Ordered index of `(score, user_id)` with upsert semantics.
///
/// Nodes live in a flat arena (`Vec`) and reference each other by index;
/// freed slots are recycled through a free list. At most one node exists per
/// `user_id`.
#[derive(Debug)]
pub struct RankingIndex {
    arena: Vec<Node>,
    free: Vec<u32>,
    /// Highest level currently in use (0-based watermark).
    level: usize,
    len: usize,
    by_user: HashMap<Box<str>, u32>,
}

/// Ranking-order comparator: does `(a_score, a_user)` precede `(b_score, b_user)`?
///
/// Total order: higher score first, then lexicographically smaller user id.
fn precedes(a_score: i64, a_user: &str, b_score: i64, b_user: &str) -> bool {
    a_score > b_score || (a_score == b_score && a_user < b_user)
}

impl RankingIndex {
    pub fn new() -> Self {
        let head = Node {
            user_id: Box::from(""),
            score: 0,
            seq: 0,
            links: vec![Link { next: NIL, span: 0 }; MAX_LEVEL],
        };
        Self {
            arena: vec![head],
            free: Vec::new(),
            level: 0,
            len: 0,
            by_user: HashMap::new(),
        }
    }

    /// Inserts or updates a user's score.
    ///
    /// Repositioning an existing user is a delete followed by a reinsert, so
    /// level-0 never holds two nodes for the same `user_id`. When the score is
    /// unchanged only the stored sequence number advances; the node is not
    /// repositioned.
    ///
    /// `seq` orders competing writes: an upsert whose `seq` is not newer than
    /// the entry's current one returns [`UpsertOutcome::Ignored`] and leaves
    /// the index untouched.
    pub fn upsert(&mut self, user_id: &str, score: i64, seq: u64) -> UpsertOutcome {
        if let Some(&idx) = self.by_user.get(user_id) {
            let node = &self.arena[idx as usize];
            if seq <= node.seq {
                return UpsertOutcome::Ignored;
            }
            if node.score == score {
                self.arena[idx as usize].seq = seq;
                return UpsertOutcome::Updated;
            }
            let old_score = node.score;
            self.remove_node(user_id, old_score);
            self.insert_node(user_id, score, seq);
            UpsertOutcome::Updated
        } else {
            self.insert_node(user_id, score, seq);
            UpsertOutcome::Inserted
        }
    }

    /// Returns up to `k` entries in ranking order, ranks starting at 1.
    ///
    /// Returns everything when fewer than `k` users exist; `k = 0` yields an
    /// empty vector.
    pub fn top_k(&self, k: usize) -> Vec<RankedEntry> {
        let mut out = Vec::with_capacity(k.min(self.len));
        let mut x = self.arena[HEAD as usize].links[0].next;
        let mut rank = 0u64;
        while x != NIL && out.len() < k {
            let node = &self.arena[x as usize];
            rank += 1;
            out.push(RankedEntry {
                user_id: node.user_id.to_string(),
                score: node.score,
                rank,
            });
            x = node.links[0].next;
        }
        out
    }

    /// 1-based rank of a user, or `None` if absent.
    ///
    /// O(log n) expected: the search path is walked once and the spans of the
    /// followed pointers are summed.
    pub fn rank_of(&self, user_id: &str) -> Option<u64> {
        let &idx = self.by_user.get(user_id)?;
        let score = self.arena[idx as usize].score;

        let mut rank = 0u64;
        let mut x = HEAD;
        for i in (0..=self.level).rev() {
            loop {
                let link = self.arena[x as usize].links[i];
                if link.next == NIL {
                    break;
                }
                let next = &self.arena[link.next as usize];
                let next_user: &str = &next.user_id;
                if precedes(next.score, next_user, score, user_id)
                    || (next.score == score && next_user == user_id)
                {
                    rank += u64::from(link.span);
                    x = link.next;
                } else {
                    break;
                }
            }
            if x == idx {
                return Some(rank);
            }
        }
        // The side map guaranteed presence; the walk must land on the node.
        debug_assert!(false, "side map entry without a reachable node");
        None
    }

    /// Current score of a user, or `None` if absent. O(1) via the side map.
    pub fn score_of(&self, user_id: &str) -> Option<i64> {
        let &idx = self.by_user.get(user_id)?;
        Some(self.arena[idx as usize].score)
    }

    /// Number of distinct users in the index.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ordered iterator over `(user_id, score)`, highest rank first.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            arena: &self.arena,
            next: self.arena[HEAD as usize].links[0].next,
        }
    }

    fn random_level() -> usize {
        let mut level = 0;
        let mut rng = rand::thread_rng();
        while level + 1 < MAX_LEVEL && rng.gen_bool(P) {
            level += 1;
        }
        level
    }

    /// Allocates an arena slot, recycling freed slots first.
    fn alloc(&mut self, user_id: &str, score: i64, seq: u64, level: usize) -> u32 {
        let node = Node {
            user_id: Box::from(user_id),
            score,
            seq,
            links: vec![Link { next: NIL, span: 0 }; level + 1],
        };
        match self.free.pop() {
            Some(idx) => {
                self.arena[idx as usize] = node;
                idx
            }
            None => {
                self.arena.push(node);
                (self.arena.len() - 1) as u32
            }
        }
    }

    fn insert_node(&mut self, user_id: &str, score: i64, seq: u64) {
        // update[i]: node whose level-i pointer gets spliced.
        // rank[i]: level-0 distance from the header to update[i].
        let mut update = [HEAD; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];

        let mut x = HEAD;
        for i in (0..=self.level).rev() {
            rank[i] = if i == self.level { 0 } else { rank[i + 1] };
            loop {
                let link = self.arena[x as usize].links[i];
                if link.next == NIL {
                    break;
                }
                let next = &self.arena[link.next as usize];
                if precedes(next.score, &next.user_id, score, user_id) {
                    rank[i] += link.span as usize;
                    x = link.next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let level = Self::random_level();
        if level > self.level {
            for i in (self.level + 1)..=level {
                rank[i] = 0;
                update[i] = HEAD;
                // A fresh level spans the whole list from the header.
                self.arena[HEAD as usize].links[i].span = self.len as u32;
            }
            self.level = level;
        }

        let idx = self.alloc(user_id, score, seq, level);
        for i in 0..=level {
            let prev = update[i] as usize;
            let prev_link = self.arena[prev].links[i];
            let advanced = (rank[0] - rank[i]) as u32;
            self.arena[idx as usize].links[i] = Link {
                next: prev_link.next,
                span: prev_link.span - advanced,
            };
            self.arena[prev].links[i] = Link {
                next: idx,
                span: advanced + 1,
            };
        }
        // Levels above the new node skip one more level-0 step.
        for i in (level + 1)..=self.level {
            self.arena[update[i] as usize].links[i].span += 1;
        }

        self.by_user.insert(Box::from(user_id), idx);
        self.len += 1;
    }

    fn remove_node(&mut self, user_id: &str, score: i64) {
        let mut update = [HEAD; MAX_LEVEL];

        let mut x = HEAD;
        for i in (0..=self.level).rev() {
            loop {
                let link = self.arena[x as usize].links[i];
                if link.next == NIL {
                    break;
                }
                let next = &self.arena[link.next as usize];
                if precedes(next.score, &next.user_id, score, user_id) {
                    x = link.next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let target = self.arena[x as usize].links[0].next;
        debug_assert_ne!(target, NIL);
        debug_assert_eq!(&*self.arena[target as usize].user_id, user_id);

        for i in 0..=self.level {
            let prev = update[i] as usize;
            let prev_link = self.arena[prev].links[i];
            if prev_link.next == target {
                let target_link = self.arena[target as usize].links[i];
                self.arena[prev].links[i] = Link {
                    next: target_link.next,
                    span: prev_link.span + target_link.span - 1,
                };
            } else {
                // The pointer jumps over the removed node.
                self.arena[prev].links[i].span -= 1;
            }
        }

        while self.level > 0 && self.arena[HEAD as usize].links[self.level].next == NIL {
            self.arena[HEAD as usize].links[self.level].span = 0;
            self.level -= 1;
        }

        self.by_user.remove(user_id);
        self.free.push(target);
        self.len -= 1;
    }
}

impl Default for RankingIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Level-0 walk in ranking order.
pub struct Iter<'a> {
    arena: &'a [Node],
    next: u32,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NIL {
            return None;
        }
        let node = &self.arena[self.next as usize];
        self.next = node.links[0].next;
        Some((&*node.user_id, node.score))
    }
}
