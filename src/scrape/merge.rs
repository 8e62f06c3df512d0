use std::collections::HashSet;

use crate::note::model::CommentRecord;

/// Working memory of one collection run. Lives only for the duration of the
/// request and is consumed into a plain record list on exit.
#[derive(Debug)]
pub struct CollectionState {
    records: Vec<CommentRecord>,
    seen: HashSet<(String, String, String)>,
    target: usize,
    stalls: usize,
}

impl CollectionState {
    pub fn new(target: usize) -> Self {
        Self {
            records: Vec::new(),
            seen: HashSet::new(),
            target,
            stalls: 0,
        }
    }

    /// Fold a snapshot in: drop records whose identity triple is already
    /// recorded, then prepend the survivors in snapshot order. The page
    /// reveals a reverse-chronological feed upward, so newly revealed items
    /// precede everything captured before them. Returns how many top-level
    /// records were added.
    pub fn merge(&mut self, snapshot: Vec<CommentRecord>) -> usize {
        let mut fresh: Vec<CommentRecord> = Vec::new();
        for record in snapshot {
            let identity = record.identity();
            if self.seen.contains(&identity) {
                continue;
            }
            self.seen.insert(identity);
            fresh.push(record);
        }
        let added = fresh.len();
        fresh.append(&mut self.records);
        self.records = fresh;
        added
    }

    /// Collected total: top-level records plus all their replies. Compared
    /// against the target fetched at loop start.
    pub fn total(&self) -> usize {
        self.records.iter().map(|r| 1 + r.replies.len()).sum()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn reached_target(&self) -> bool {
        self.total() >= self.target
    }

    pub fn bump_stalls(&mut self) -> usize {
        self.stalls += 1;
        self.stalls
    }

    pub fn reset_stalls(&mut self) {
        self.stalls = 0;
    }

    pub fn stalls(&self) -> usize {
        self.stalls
    }

    pub fn into_records(self) -> Vec<CommentRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(author: &str, content: &str) -> CommentRecord {
        CommentRecord {
            author: author.to_string(),
            content: content.to_string(),
            like_count: 0,
            timestamp: "2024-05-10".to_string(),
            replies: Vec::new(),
        }
    }

    fn with_replies(author: &str, content: &str, replies: Vec<CommentRecord>) -> CommentRecord {
        CommentRecord {
            replies,
            ..comment(author, content)
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let snapshot = vec![comment("a", "一"), comment("b", "二")];

        let mut once = CollectionState::new(10);
        once.merge(snapshot.clone());

        let mut twice = CollectionState::new(10);
        twice.merge(snapshot.clone());
        let added = twice.merge(snapshot);

        assert_eq!(added, 0);
        assert_eq!(once.into_records(), twice.into_records());
    }

    #[test]
    fn test_count_is_monotonic() {
        let mut state = CollectionState::new(10);
        let snapshots = vec![
            vec![comment("a", "一")],
            vec![comment("a", "一"), comment("b", "二")],
            Vec::new(),
            vec![comment("b", "二")],
        ];
        let mut last = 0;
        for snapshot in snapshots {
            state.merge(snapshot);
            let total = state.total();
            assert!(total >= last);
            last = total;
        }
    }

    #[test]
    fn test_no_duplicate_identities() {
        let mut state = CollectionState::new(10);
        state.merge(vec![comment("a", "一"), comment("a", "一")]);
        state.merge(vec![comment("a", "一")]);
        assert_eq!(state.total(), 1);
    }

    #[test]
    fn test_same_author_content_different_timestamp_is_distinct() {
        let mut earlier = comment("a", "一");
        earlier.timestamp = "2024-05-01".to_string();
        let mut state = CollectionState::new(10);
        state.merge(vec![comment("a", "一"), earlier]);
        assert_eq!(state.total(), 2);
    }

    #[test]
    fn test_new_items_prepended_in_snapshot_order() {
        let mut state = CollectionState::new(10);
        state.merge(vec![comment("a", "一"), comment("b", "二")]);
        state.merge(vec![comment("b", "二"), comment("c", "三"), comment("d", "四")]);

        let authors: Vec<String> = state
            .into_records()
            .into_iter()
            .map(|r| r.author)
            .collect();
        assert_eq!(authors, vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn test_total_counts_replies() {
        let mut state = CollectionState::new(10);
        state.merge(vec![
            with_replies("a", "一", vec![comment("x", "回1"), comment("y", "回2")]),
            comment("b", "二"),
        ]);
        assert_eq!(state.total(), 4);
        assert!(!state.reached_target());
    }
}
