use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{self, request},
};
use snapfeed_api::{Account, AuthToken, Uuid};
use snapfeed_mock_server::MockServer;

use crate::Error;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<tokio::sync::Mutex<MockServer>>,
}

impl AppState {
    pub fn new(store: MockServer) -> AppState {
        AppState {
            store: Arc::new(tokio::sync::Mutex::new(store)),
        }
    }
}

pub struct PreAuth(pub AuthToken);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for PreAuth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, _state: &S) -> Result<PreAuth, Error> {
        match req.headers.get(http::header::AUTHORIZATION) {
            None => Err(Error::not_authenticated()),
            Some(auth) => {
                let auth = auth.to_str().map_err(|_| Error::not_authenticated())?;
                let mut auth = auth.split(' ');
                if !auth
                    .next()
                    .ok_or(Error::not_authenticated())?
                    .eq_ignore_ascii_case("bearer")
                {
                    return Err(Error::not_authenticated());
                }
                let token = auth.next().ok_or(Error::not_authenticated())?;
                if auth.next().is_some() {
                    return Err(Error::not_authenticated());
                }
                let token = Uuid::try_from(token).map_err(|_| Error::not_authenticated())?;
                Ok(PreAuth(AuthToken(token)))
            }
        }
    }
}

pub struct Auth(pub AuthToken, pub Account);

#[async_trait]
impl FromRequestParts<AppState> for Auth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, state: &AppState) -> Result<Auth, Error> {
        let token = PreAuth::from_request_parts(req, state).await?.0;
        let account = state.store.lock().await.whoami(token)?;
        Ok(Auth(token, account))
    }
}
