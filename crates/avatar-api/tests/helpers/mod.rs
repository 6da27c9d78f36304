//! Test helpers: build the router over a temporary uploads directory.
//!
//! Run from workspace root: `cargo test -p avatar-api`.

pub mod fixtures;

use avatar_api::setup;
use avatar_core::AvatarConfig;
use axum_test::TestServer;
use tempfile::TempDir;

pub const BASE_URL: &str = "http://localhost:4000/uploads";

/// Test application: server plus the directory backing it.
pub struct TestApp {
    pub server: TestServer,
    pub config: AvatarConfig,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Files currently in a user's avatar folder, sorted.
    pub fn avatar_files(&self, user: u64) -> Vec<String> {
        let dir = self.config.avatars_dir().join(user.to_string());
        let mut names: Vec<String> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

pub async fn setup_test_app_with(customize: impl FnOnce(&mut AvatarConfig)) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let mut config = AvatarConfig::new(temp_dir.path().join("uploads"), BASE_URL);
    config.staging_dir = temp_dir.path().join("staging");
    customize(&mut config);

    let (_state, router) = setup::initialize_app(config.clone()).await.unwrap();
    let server = TestServer::new(router).unwrap();

    TestApp {
        server,
        config,
        _temp_dir: temp_dir,
    }
}

/// Path component of a generated avatar URL, for requesting it from the test server.
pub fn url_path(url: &str) -> String {
    url.strip_prefix("http://localhost:4000").unwrap().to_string()
}
