//! Query queue / squasher (component G, §4.7).
//!
//! Groups of at most 50 equivalent in-flight [`CoverQuery`]s share one
//! result. `submit` either absorbs a query into an existing group or
//! starts a new one; the caller that receives [`SubmitOutcome::Lead`] is
//! responsible for actually running the probe chain and calling
//! [`Squasher::complete`] once — every member of the group (including the
//! lead) gets the result via its own `oneshot` channel, invoked in
//! submission order.

use std::sync::Arc;

use tokio::sync::oneshot;

use super::{CoverInfo, CoverQuery};

pub const MAX_GROUP_SIZE: usize = 50;

/// Opaque handle to a squash group, returned to the caller that must
/// drive it to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupId(u64);

pub enum SubmitOutcome {
    /// This query was merged into an in-flight group; no work to do.
    Absorbed,
    /// This query started a new group; the caller must run the probe
    /// chain for `query` and call [`Squasher::complete`] with `id`.
    Lead { id: GroupId, query: CoverQuery },
}

struct SquashGroup {
    id: GroupId,
    head: CoverQuery,
    members: Vec<oneshot::Sender<Arc<CoverInfo>>>,
}

#[derive(Default)]
pub struct Squasher {
    groups: Vec<SquashGroup>,
    next_id: u64,
}

impl Squasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit `query`, enrolling it in an equivalent in-flight group
    /// (FIFO order, capped at [`MAX_GROUP_SIZE`] members) or starting a
    /// new one.
    pub fn submit(
        &mut self,
        query: CoverQuery,
        callback: oneshot::Sender<Arc<CoverInfo>>,
    ) -> SubmitOutcome {
        for group in &mut self.groups {
            if group.members.len() < MAX_GROUP_SIZE && group.head.equivalent(&query) {
                group.members.push(callback);
                return SubmitOutcome::Absorbed;
            }
        }
        let id = GroupId(self.next_id);
        self.next_id += 1;
        self.groups.push(SquashGroup {
            id,
            head: query.clone(),
            members: vec![callback],
        });
        SubmitOutcome::Lead { id, query }
    }

    /// Broadcast `info` to every member of group `id`, in submission
    /// order, then remove the group. A no-op if the group was already
    /// completed (should not happen under correct usage, but keeps this
    /// idempotent rather than panicking).
    pub fn complete(&mut self, id: GroupId, info: Arc<CoverInfo>) {
        if let Some(pos) = self.groups.iter().position(|g| g.id == id) {
            let group = self.groups.remove(pos);
            for tx in group.members {
                let _ = tx.send(info.clone());
            }
        }
    }

    #[cfg(test)]
    pub fn group_member_count(&self, id: GroupId) -> Option<usize> {
        self.groups.iter().find(|g| g.id == id).map(|g| g.members.len())
    }

    #[cfg(test)]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cover::{CoverQueryFlags, CoverSize, TrackRef};

    fn query(uri: &str) -> CoverQuery {
        CoverQuery {
            track: Arc::new(TrackRef {
                uri: uri.to_string(),
                local_path: None,
                artist: None,
                album: None,
                album_artist: None,
                title: None,
                track_number: None,
            }),
            size: CoverSize::Full,
            flags: CoverQueryFlags::NONE,
        }
    }

    #[tokio::test]
    async fn ten_equivalent_queries_squash_into_one_job() {
        let mut squasher = Squasher::new();
        let mut receivers = Vec::new();
        let mut lead = None;

        for _ in 0..10 {
            let (tx, rx) = oneshot::channel();
            receivers.push(rx);
            match squasher.submit(query("file:///same.mp3"), tx) {
                SubmitOutcome::Lead { id, .. } => lead = Some(id),
                SubmitOutcome::Absorbed => {}
            }
        }

        let id = lead.expect("first submission starts a group");
        assert_eq!(squasher.group_member_count(id), Some(10));

        let info = Arc::new(CoverInfo {
            filepath: "file:///same.mp3".into(),
            album: None,
            artist: None,
            title: None,
            payload: None,
            cover_found: true,
            timestamp: 1,
        });
        squasher.complete(id, info.clone());
        assert_eq!(squasher.group_count(), 0);

        for rx in receivers {
            let got = rx.await.unwrap();
            assert!(Arc::ptr_eq(&got, &info));
        }
    }

    #[tokio::test]
    async fn distinct_queries_get_distinct_groups() {
        let mut squasher = Squasher::new();
        let (tx_a, _rx_a) = oneshot::channel();
        let (tx_b, _rx_b) = oneshot::channel();

        let SubmitOutcome::Lead { id: id_a, .. } = squasher.submit(query("a"), tx_a) else {
            panic!("expected new group");
        };
        let SubmitOutcome::Lead { id: id_b, .. } = squasher.submit(query("b"), tx_b) else {
            panic!("expected new group");
        };
        assert_ne!(id_a, id_b);
        assert_eq!(squasher.group_count(), 2);
    }

    #[tokio::test]
    async fn group_caps_at_fifty_members() {
        let mut squasher = Squasher::new();
        let mut lead = None;
        for _ in 0..60 {
            let (tx, _rx) = oneshot::channel();
            match squasher.submit(query("overflow"), tx) {
                SubmitOutcome::Lead { id, .. } => lead = Some(id),
                SubmitOutcome::Absorbed => {}
            }
        }
        let id = lead.unwrap();
        // 1 lead + 49 absorbed = 50; the 51st+ must start a second group.
        assert_eq!(squasher.group_member_count(id), Some(MAX_GROUP_SIZE));
        assert_eq!(squasher.group_count(), 2);
    }
}
