//! Latest snapshot per instrument, shared read-only with the HTTP surface

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use crate::models::InstrumentSnapshot;

#[derive(Debug, Default)]
pub struct SnapshotBoard {
    snapshots: RwLock<BTreeMap<String, InstrumentSnapshot>>,
}

impl SnapshotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshots of every instrument in `snapshots`
    pub async fn publish(&self, snapshots: Vec<InstrumentSnapshot>) {
        let mut board = self.snapshots.write().await;
        for snapshot in snapshots {
            board.insert(snapshot.symbol.clone(), snapshot);
        }
    }

    pub async fn get(&self, symbol: &str) -> Option<InstrumentSnapshot> {
        self.snapshots.read().await.get(symbol).cloned()
    }

    pub async fn list(&self) -> Vec<InstrumentSnapshot> {
        self.snapshots.read().await.values().cloned().collect()
    }
}
