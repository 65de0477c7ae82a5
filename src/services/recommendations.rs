use super::narrative::{recommend, NarrativeGenerator};
use crate::analytics::RateReport;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecommendationStatus {
    pub loading: bool,
    pub recommendations: Vec<String>,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    loading: bool,
    recommendations: Vec<String>,
    touched: Instant,
}

/// Background narrative jobs keyed by report filter. Only the newest job for
/// a key may write its result.
#[derive(Clone, Default)]
pub struct RecommendationSlots {
    slots: Arc<RwLock<HashMap<String, Slot>>>,
    generations: Arc<AtomicU64>,
}

impl RecommendationSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as loading and returns the generation the job must present.
    pub async fn begin(&self, key: &str) -> u64 {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let mut slots = self.slots.write().await;
        slots.insert(
            key.to_string(),
            Slot {
                generation,
                loading: true,
                recommendations: Vec::new(),
                touched: Instant::now(),
            },
        );
        generation
    }

    /// Stores a result unless a newer job has taken the slot.
    pub async fn finish(&self, key: &str, generation: u64, recommendations: Vec<String>) -> bool {
        let mut slots = self.slots.write().await;
        match slots.get_mut(key) {
            Some(slot) if slot.generation == generation => {
                slot.loading = false;
                slot.recommendations = recommendations;
                slot.touched = Instant::now();
                true
            }
            _ => {
                tracing::debug!(key, generation, "discarding stale recommendations");
                false
            }
        }
    }

    /// Starts a generation job for `report` under `key`.
    pub async fn spawn(
        &self,
        key: String,
        narrator: Arc<dyn NarrativeGenerator>,
        report: RateReport,
    ) -> JoinHandle<()> {
        let generation = self.begin(&key).await;
        let slots = self.clone();
        tokio::spawn(async move {
            let recommendations = recommend(narrator.as_ref(), &report).await;
            slots.finish(&key, generation, recommendations).await;
        })
    }

    pub async fn status(&self, key: &str) -> Option<RecommendationStatus> {
        let slots = self.slots.read().await;
        slots.get(key).map(|slot| RecommendationStatus {
            loading: slot.loading,
            recommendations: slot.recommendations.clone(),
        })
    }

    /// Drops finished slots not touched within `max_age`. Running jobs stay.
    pub async fn evict_finished(&self, max_age: Duration) -> usize {
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|_, slot| slot.loading || slot.touched.elapsed() < max_age);
        before - slots.len()
    }
}
