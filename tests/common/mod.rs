#![allow(dead_code)]

use anyhow::Result;
use assert_cmd::Command;
use ctxmenu::config::{Backend, Config};
use ctxmenu::model::Scenario;
use ctxmenu::session::SessionOptions;
use ctxmenu::store::Scope;
use ctxmenu::store::file::FileStore;
use ctxmenu::store::memory::MemoryStore;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const CLSID_ZIP: &str = "{23170F69-40C1-278A-1000-000100020000}";
pub const CLSID_SHARE: &str = "{E2BF9676-5F8F-435C-97EB-11607A5BEDF7}";

/// Writes a verb under `Software\Classes\<base>\shell\<name>` of `scope`.
pub fn seed_command(store: &MemoryStore, scope: Scope, base: &str, name: &str, command: &str) {
    let key = format!(r"Software\Classes\{base}\shell\{name}");
    store.create_key(scope, &key);
    store.seed_value(scope, &format!(r"{key}\command"), "", command);
}

/// Writes a handler under `Software\Classes\<base>\shellex\ContextMenuHandlers`
/// plus its class registration.
pub fn seed_handler(store: &MemoryStore, scope: Scope, base: &str, name: &str, clsid: &str, dll: &str) {
    store.seed_value(
        scope,
        &format!(r"Software\Classes\{base}\shellex\ContextMenuHandlers\{name}"),
        "",
        clsid,
    );
    store.seed_value(Scope::SystemScope, &format!(r"Software\Classes\CLSID\{clsid}"), "", name);
    store.seed_value(
        Scope::SystemScope,
        &format!(r"Software\Classes\CLSID\{clsid}\InprocServer32"),
        "",
        dll,
    );
}

/// A small but realistic layout spanning every scenario and both scopes.
pub fn populate(store: &MemoryStore) {
    let code = r#""C:\Program Files\Microsoft VS Code\Code.exe" "%V""#;
    seed_command(store, Scope::SystemScope, "*", "Code", code);
    seed_command(store, Scope::SystemScope, "Directory", "Code", code);
    seed_command(store, Scope::SystemScope, r"Directory\Background", "Code", code);
    seed_command(
        store,
        Scope::SystemScope,
        "Directory",
        "git_gui",
        r#""C:\Program Files\Git\cmd\git-gui.exe" "--working-dir" "%v.""#,
    );
    seed_command(
        store,
        Scope::UserScope,
        "Directory",
        "notes",
        r#""C:\Users\me\AppData\Local\Notes\notes.exe" "%1""#,
    );
    seed_command(
        store,
        Scope::SystemScope,
        "DesktopBackground",
        "Display",
        r"C:\Windows\System32\control.exe desk.cpl",
    );
    seed_handler(
        store,
        Scope::SystemScope,
        "*",
        "7-Zip",
        CLSID_ZIP,
        r"C:\Program Files\7-Zip\7-zip.dll",
    );
    seed_handler(
        store,
        Scope::SystemScope,
        "AllFilesystemObjects",
        "ModernSharing",
        CLSID_SHARE,
        r"C:\Windows\System32\ntshrui.dll",
    );
}

/// A populated in-memory store.
pub fn sample_store() -> MemoryStore {
    let store = MemoryStore::new();
    populate(&store);
    store
}

/// Session options rooted at `dir`, scanning every scenario.
pub fn session_options(dir: &Path) -> SessionOptions {
    SessionOptions {
        data_dir: dir.to_path_buf(),
        scenarios: Scenario::ALL.to_vec(),
        retention: 10,
        auto_cleanup: true,
    }
}

/// Isolated environment for driving the `ctxm` binary.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
}

impl TestEnv {
    /// Creates a config pointing at a file store inside a temp directory.
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let data_dir = temp_dir.path().join("data");
        let config_path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.core.data_dir.clone_from(&data_dir);
        config.core.backend = Backend::File;
        config.save(&config_path)?;

        Ok(Self {
            temp_dir,
            data_dir,
            config_path,
        })
    }

    /// Creates an environment whose store holds the sample layout.
    pub fn populated() -> Result<Self> {
        let env = Self::new()?;
        env.seed(populate)?;
        Ok(env)
    }

    /// Path of the file store image.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(ctxmenu::STORE_FILE)
    }

    /// Opens the file store.
    pub fn store(&self) -> Result<FileStore> {
        FileStore::open(&self.store_path())
    }

    /// Applies `seed` to the file store and saves it.
    pub fn seed(&self, seed: impl FnOnce(&MemoryStore)) -> Result<()> {
        let store = self.store()?;
        seed(store.memory());
        store.save()
    }

    /// The `ctxm` binary with this environment's paths.
    pub fn cmd(&self) -> Result<Command> {
        let mut cmd = Command::cargo_bin("ctxm")?;
        cmd.env(ctxmenu::CONFIG_PATH_ENV, &self.config_path)
            .env(ctxmenu::DATA_DIR_ENV, &self.data_dir)
            .env_remove("CTXMENU_LOG")
            .env("NO_COLOR", "1");
        Ok(cmd)
    }
}
