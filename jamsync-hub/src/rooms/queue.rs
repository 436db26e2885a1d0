use std::collections::VecDeque;

use crate::db::QueueItem;

/// A room's ordered queue of tracks.
///
/// Positions are assigned at append time and may gap after a pop, but any
/// read of the ordered list renumbers them to a gapless 0..n-1 sequence so
/// observers never see a hole.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<QueueItem>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends an item, assigning it the next position.
    pub fn push(&mut self, mut item: QueueItem) -> QueueItem {
        item.position = self.items.len() as u32;
        self.items.push_back(item.clone());

        item
    }

    /// Removes and returns the item with the lowest position.
    pub fn pop_front(&mut self) -> Option<QueueItem> {
        self.items.pop_front()
    }

    /// Returns the ordered queue with renumbered positions.
    pub fn items(&self) -> Vec<QueueItem> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let mut item = item.clone();
                item.position = index as u32;
                item
            })
            .collect()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Track;
    use chrono::Utc;

    fn item(id: &str) -> QueueItem {
        QueueItem {
            track: Track {
                id: id.to_string(),
                video_id: format!("video-{id}"),
                title: format!("Track {id}"),
                duration: 180.0,
                added_by: "u1".to_string(),
                thumbnail: None,
                channel: None,
            },
            room_id: "r1".to_string(),
            position: 0,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn appends_assign_ascending_positions() {
        let mut queue = TrackQueue::new();

        let first = queue.push(item("a"));
        let second = queue.push(item("b"));

        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);
    }

    #[test]
    fn pops_in_fifo_order() {
        let mut queue = TrackQueue::new();
        queue.push(item("a"));
        queue.push(item("b"));

        assert_eq!(queue.pop_front().unwrap().track.id, "a");
        assert_eq!(queue.pop_front().unwrap().track.id, "b");
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn reads_are_always_gapless() {
        let mut queue = TrackQueue::new();
        queue.push(item("a"));
        queue.push(item("b"));
        queue.push(item("c"));

        queue.pop_front();
        queue.push(item("d"));

        let positions: Vec<_> = queue.items().iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);

        let order: Vec<_> = queue.items().into_iter().map(|i| i.track.id).collect();
        assert_eq!(order, vec!["b", "c", "d"]);
    }
}
