//! Expired credential cleanup

use kernel::clock::Clock;
use std::sync::Arc;

use crate::domain::entities::CleanupReport;
use crate::domain::repository::RewardsStore;
use crate::error::RewardsResult;

pub struct CleanupExpiredUseCase<S>
where
    S: RewardsStore,
{
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> CleanupExpiredUseCase<S>
where
    S: RewardsStore,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn execute(&self) -> RewardsResult<CleanupReport> {
        let report = self.store.cleanup_expired(self.clock.now()).await?;

        tracing::info!(
            refresh_credentials = report.refresh_credentials,
            launch_codes = report.launch_codes,
            redeem_tokens = report.redeem_tokens,
            "Expired credentials removed"
        );

        Ok(report)
    }
}
