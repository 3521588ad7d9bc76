use super::{SessionRestorer, SessionStores};
use crate::application_port::{SessionError, SessionService};
use crate::domain_model::*;
use crate::domain_port::{CallbackParams, CookieJar, OAuthClient};
use crate::logger::*;
use std::sync::Arc;
use url::Url;

pub struct RealSessionService {
    client: Arc<dyn OAuthClient>,
    stores: SessionStores,
    restorer: SessionRestorer,
}

impl RealSessionService {
    pub fn new(client: Arc<dyn OAuthClient>, stores: SessionStores, restorer: SessionRestorer) -> Self {
        Self {
            client,
            stores,
            restorer,
        }
    }
}

#[async_trait::async_trait]
impl SessionService for RealSessionService {
    async fn begin_login(
        &self,
        cookies: Arc<dyn CookieJar>,
        handle: &str,
    ) -> Result<Url, SessionError> {
        let request = self.client.authorize(handle).await?;
        // One cookie slot: a second login replaces the first.
        self.stores
            .auth_state(cookies)
            .set(request.state_key, &request.state)
            .await?;
        debug!(%handle, "login started");
        Ok(request.redirect_url)
    }

    async fn complete_login(
        &self,
        cookies: Arc<dyn CookieJar>,
        params: CallbackParams,
    ) -> Result<SubjectId, SessionError> {
        let state_store = self.stores.auth_state(cookies.clone());
        let pending = state_store.get_with_key().await;
        // The pending state is single use whatever happens next.
        state_store.del().await;

        let (state_key, state) = pending?.ok_or(SessionError::InvalidState)?;
        if state_key.as_str() != params.state {
            warn!("callback state does not match the pending login");
            return Err(SessionError::InvalidState);
        }

        let record = self.client.callback(&params, &state).await?;
        let subject = record.subject.clone();
        self.stores
            .session(cookies)
            .set(CookieKey::generate(), &record)
            .await?;
        info!(%subject, "login completed");
        Ok(subject)
    }

    async fn cancel_login(&self, cookies: Arc<dyn CookieJar>) -> Result<(), SessionError> {
        self.stores.auth_state(cookies).del().await;
        Ok(())
    }

    async fn current_session(
        &self,
        cookies: Arc<dyn CookieJar>,
    ) -> Result<Option<LiveSession>, SessionError> {
        let store = self.stores.session(cookies);
        let Some((key, record)) = store.get_with_key().await? else {
            return Ok(None);
        };
        let session = self.restorer.restore(&key, record).await?;
        if session.is_none() {
            // record already dropped by the restorer
            store.del().await;
        }
        Ok(session)
    }

    async fn logout(&self, cookies: Arc<dyn CookieJar>) -> Result<(), SessionError> {
        let store = self.stores.session(cookies);
        match store.get_with_key().await {
            Ok(Some((_, record))) => {
                if let Err(e) = self.client.revoke(&record).await {
                    warn!(subject = %record.subject, error = %e, "token revocation failed");
                }
                info!(subject = %record.subject, "logged out");
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "session lookup failed during logout"),
        }
        store.del().await;
        Ok(())
    }
}
