use super::KvRecordStore;
use crate::application_port::{LockService, SessionError};
use crate::domain_model::*;
use crate::domain_port::{Clock, OAuthClient, OAuthError};
use crate::logger::*;
use std::sync::Arc;

pub struct SessionRestorer {
    client: Arc<dyn OAuthClient>,
    lock: Arc<dyn LockService>,
    records: KvRecordStore<SessionRecord>,
    clock: Arc<dyn Clock>,
}

impl SessionRestorer {
    pub fn new(
        client: Arc<dyn OAuthClient>,
        lock: Arc<dyn LockService>,
        records: KvRecordStore<SessionRecord>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            lock,
            records,
            clock,
        }
    }

    /// `Ok(None)` when the identity provider no longer honours the session;
    /// the stale record is removed in that case.
    pub async fn restore(
        &self,
        key: &CookieKey,
        record: SessionRecord,
    ) -> Result<Option<LiveSession>, SessionError> {
        let record = if record.tokens.needs_refresh(self.clock.now()) {
            let lock_key = LockKey::from(&record.subject);
            let refreshed = self
                .lock
                .with_lock(&lock_key, || self.refresh_locked(key, record))
                .await?;
            match refreshed {
                Some(record) => record,
                None => return Ok(None),
            }
        } else {
            record
        };

        match self.client.resume(&record).await {
            Ok(session) => Ok(Some(session)),
            Err(OAuthError::Rejected(reason)) => {
                info!(subject = %record.subject, %reason, "session rejected on resume");
                self.discard(key).await;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn refresh_locked(
        &self,
        key: &CookieKey,
        stale: SessionRecord,
    ) -> Result<Option<SessionRecord>, SessionError> {
        // Another holder may have rotated the tokens while we waited.
        let current = match self.records.load(key).await? {
            Some(current) if current.subject == stale.subject => current,
            Some(_) | None => {
                debug!(subject = %stale.subject, "session record gone before refresh");
                return Ok(None);
            }
        };
        if !current.tokens.needs_refresh(self.clock.now()) {
            debug!(subject = %current.subject, "tokens already refreshed");
            return Ok(Some(current));
        }

        match self.client.refresh(&current).await {
            Ok(rotated) => {
                self.records.save(key, &rotated).await?;
                info!(subject = %rotated.subject, "tokens refreshed");
                Ok(Some(rotated))
            }
            Err(OAuthError::Rejected(reason)) => {
                // Unlocked (degraded) callers can lose the race for a single-use
                // refresh token; the winner's rotated record must survive.
                if let Some(reloaded) = self.records.load(key).await? {
                    if reloaded.tokens != current.tokens {
                        debug!(subject = %reloaded.subject, "tokens rotated by a concurrent refresh");
                        return Ok(Some(reloaded));
                    }
                }
                info!(subject = %current.subject, %reason, "refresh rejected, dropping session");
                self.discard(key).await;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn discard(&self, key: &CookieKey) {
        if let Err(e) = self.records.remove(key).await {
            warn!(error = %e, "failed to drop stale session record");
        }
    }
}
