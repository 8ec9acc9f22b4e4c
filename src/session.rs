use crate::{
    api::{BoardApi, Credentials, User},
    config::ClientConfig,
    error::{BoardError, Result},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, sync::Mutex};
use tracing::{debug, info, instrument, warn};

/// Tokens issued by a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// Storage for the current session
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &Session) -> Result<()>;

    /// Returns the saved session, if any
    async fn load(&self) -> Result<Option<Session>>;

    async fn clear(&self) -> Result<()>;
}

/// Keeps the session in `<root>/.taskboard/session.json`
pub struct FileSessionStore {
    root_path: PathBuf,
}

impl FileSessionStore {
    const SESSION_DIR: &'static str = ".taskboard";
    const SESSION_FILE: &'static str = "session.json";

    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root_path: root.as_ref().join(Self::SESSION_DIR),
        }
    }

    /// Keeps the session under the configured `session_dir`
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.session_dir)
    }

    fn session_file(&self) -> PathBuf {
        self.root_path.join(Self::SESSION_FILE)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, session: &Session) -> Result<()> {
        if !self.root_path.exists() {
            fs::create_dir_all(&self.root_path).await?;
        }

        let json = serde_json::to_string_pretty(session)?;
        fs::write(self.session_file(), json).await?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Session>> {
        let file_path = self.session_file();
        if !file_path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&file_path).await?;
        match serde_json::from_str(&contents) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                // A corrupt file is treated as logged out
                warn!(path = %file_path.display(), error = %e, "ignoring unreadable session");
                Ok(None)
            }
        }
    }

    async fn clear(&self) -> Result<()> {
        let file_path = self.session_file();
        if file_path.exists() {
            fs::remove_file(file_path).await?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &Session) -> Result<()> {
        *self.session.lock().await = Some(session.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Session>> {
        Ok(self.session.lock().await.clone())
    }

    async fn clear(&self) -> Result<()> {
        *self.session.lock().await = None;
        Ok(())
    }
}

/// Login state shared between the API client and the session store
pub struct Authenticator {
    api: Arc<dyn BoardApi>,
    sessions: Arc<dyn SessionStore>,
}

impl Authenticator {
    pub fn new(api: Arc<dyn BoardApi>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { api, sessions }
    }

    /// Logs in, saves the session and installs the access token
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let tokens = self.api.login(&Credentials::new(username, password)).await?;
        let session = Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user: tokens.user,
        };

        self.sessions.save(&session).await?;
        self.api
            .set_access_token(Some(session.access_token.clone()))
            .await;
        info!("logged in");
        Ok(session)
    }

    /// Creates the account and logs straight in
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<Session> {
        self.api
            .register(&Credentials::new(username, password))
            .await?;
        self.login(username, password).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.api.set_access_token(None).await;
        self.sessions.clear().await?;
        info!("logged out");
        Ok(())
    }

    /// Reinstalls a saved session's token, if there is one
    pub async fn restore(&self) -> Result<Option<Session>> {
        let session = self.sessions.load().await?;
        if let Some(session) = &session {
            self.api
                .set_access_token(Some(session.access_token.clone()))
                .await;
            debug!("session restored");
        }
        Ok(session)
    }

    /// Exchanges the saved refresh token for a new access token.
    ///
    /// Only runs when called; expired tokens are not renewed automatically.
    pub async fn refresh(&self) -> Result<Session> {
        let mut session = self
            .sessions
            .load()
            .await?
            .ok_or(BoardError::NotAuthenticated)?;
        let refresh_token = session
            .refresh_token
            .clone()
            .ok_or(BoardError::NotAuthenticated)?;

        session.access_token = self.api.refresh_token(&refresh_token).await?;
        self.sessions.save(&session).await?;
        self.api
            .set_access_token(Some(session.access_token.clone()))
            .await;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpBoardApi;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            user: Some(User {
                id: 1,
                username: "ann".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_file_session_save_load_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path());

        assert_eq!(store.load().await.unwrap(), None);

        store.save(&session()).await.unwrap();
        assert!(store.session_file().exists());
        assert_eq!(store.load().await.unwrap(), Some(session()));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_session_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = ClientConfig {
            session_dir: temp_dir.path().join("profile"),
            ..Default::default()
        };

        let store = FileSessionStore::from_config(&config);
        store.save(&session()).await.unwrap();

        let expected = temp_dir
            .path()
            .join("profile")
            .join(".taskboard")
            .join("session.json");
        assert!(expected.exists());
        assert_eq!(
            FileSessionStore::new(temp_dir.path().join("profile"))
                .load()
                .await
                .unwrap(),
            Some(session())
        );
    }

    #[tokio::test]
    async fn test_file_session_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path());
        tokio::fs::create_dir_all(temp_dir.path().join(".taskboard"))
            .await
            .unwrap();
        tokio::fs::write(store.session_file(), "{not json").await.unwrap();

        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_installs_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access",
                "refresh_token": "refresh",
                "user": {"id": 1, "username": "ann"}
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/boards"))
            .and(header("Authorization", "Bearer access"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "title": "Home"}])),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let api = Arc::new(HttpBoardApi::new(mock_server.uri()).unwrap());
        let sessions = Arc::new(MemorySessionStore::default());
        let auth = Authenticator::new(api.clone(), sessions.clone());

        let logged_in = auth.login("ann", "pw").await.unwrap();
        assert_eq!(logged_in, session());
        assert_eq!(sessions.load().await.unwrap(), Some(session()));

        let boards = api.list_boards().await.unwrap();
        assert_eq!(boards[0].title, "Home");

        auth.logout().await.unwrap();
        assert_eq!(sessions.load().await.unwrap(), None);
        assert!(matches!(
            api.list_boards().await.unwrap_err(),
            BoardError::NotAuthenticated
        ));
    }

    #[tokio::test]
    async fn test_failed_login_saves_nothing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "no"})))
            .mount(&mock_server)
            .await;

        let api = Arc::new(HttpBoardApi::new(mock_server.uri()).unwrap());
        let sessions = Arc::new(MemorySessionStore::default());
        let auth = Authenticator::new(api, sessions.clone());

        assert!(auth.login("ann", "bad").await.is_err());
        assert_eq!(sessions.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_and_refresh() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .and(header("Authorization", "Bearer refresh"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": "access-2"})),
            )
            .mount(&mock_server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let sessions = Arc::new(FileSessionStore::new(temp_dir.path()));
        sessions.save(&session()).await.unwrap();

        let api = Arc::new(HttpBoardApi::new(mock_server.uri()).unwrap());
        let auth = Authenticator::new(api, sessions.clone());

        assert_eq!(auth.restore().await.unwrap(), Some(session()));

        let renewed = auth.refresh().await.unwrap();
        assert_eq!(renewed.access_token, "access-2");
        assert_eq!(
            sessions.load().await.unwrap().unwrap().access_token,
            "access-2"
        );
    }

    #[tokio::test]
    async fn test_refresh_without_session() {
        let api = Arc::new(HttpBoardApi::new("http://127.0.0.1:9").unwrap());
        let auth = Authenticator::new(api, Arc::new(MemorySessionStore::default()));

        assert!(matches!(
            auth.refresh().await.unwrap_err(),
            BoardError::NotAuthenticated
        ));
    }
}
