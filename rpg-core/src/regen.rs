//! Background regeneration of health, stamina and magicka.

use crate::error::GameError;
use crate::persist::{update_character, CharacterStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Apply `elapsed` worth of regeneration to every stored character.
///
/// Characters that are already full are skipped without a write. Returns
/// how many characters were updated.
pub async fn regenerate_all(
    store: &dyn CharacterStore,
    elapsed: Duration,
    max_retries: u32,
) -> Result<usize, GameError> {
    let mut updated = 0;
    for owner in store.list_owners().await? {
        let needs_regen = match store.get_character(&owner).await {
            Ok(Some(character)) => !character.attributes.is_fully_restored(),
            Ok(None) => false,
            Err(err) => {
                warn!(%owner, error = %err, "skipping unreadable character");
                false
            }
        };
        if !needs_regen {
            continue;
        }

        let result = update_character(store, &owner, max_retries, |character| {
            character.attributes.regenerate(elapsed);
            Ok(())
        })
        .await;
        match result {
            Ok(()) => updated += 1,
            // Deleted between listing and updating.
            Err(GameError::CharacterNotFound) => {}
            Err(err) => warn!(%owner, error = %err, "regeneration failed"),
        }
    }
    Ok(updated)
}

/// Run [`regenerate_all`] every `interval` until the task is aborted.
pub fn spawn_regeneration(
    store: Arc<dyn CharacterStore>,
    interval: Duration,
    max_retries: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match regenerate_all(store.as_ref(), interval, max_retries).await {
                Ok(updated) => debug!(updated, "regeneration tick"),
                Err(err) => warn!(error = %err, "regeneration tick failed"),
            }
        }
    })
}
