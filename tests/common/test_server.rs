use std::path::Path;
use std::sync::Arc;

use filehost::server::{AppState, create_router};
use filehost::service::FileHost;
use filehost::storage::FsObjectStore;
use filehost::store::{SqliteStore, Store};
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub store: Arc<SqliteStore>,
    server_task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let data_dir = temp_dir.path();

        let store = Arc::new(SqliteStore::new(data_dir.join("filehost.db")).expect("open database"));
        store.initialize().expect("initialize database");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let base_url = format!("http://127.0.0.1:{port}");

        let host = FileHost::new(store.clone(), Arc::new(FsObjectStore::new(data_dir)))
            .with_public_base_url(Some(base_url.clone()));
        let app = create_router(Arc::new(AppState { host }));

        let server_task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self::wait_for_ready(&base_url).await;

        Self {
            temp_dir,
            base_url,
            store,
            server_task,
        }
    }

    async fn wait_for_ready(base_url: &str) {
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{base_url}/health"))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready");
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server_task.abort();
    }
}
