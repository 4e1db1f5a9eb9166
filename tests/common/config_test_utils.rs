use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "FERRYDROP_SERVER__PORT",
    "FERRYDROP_SERVER__PORT_ATTEMPTS",
    "FERRYDROP_SEND__LIMIT",
    "FERRYDROP_SEND__GRACE_DELAY_SECS",
    "FERRYDROP_CLIPBOARD__POLL_INTERVAL_MS",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

struct EnvRestore {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (name, value) in self.saved.drain(..) {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

/// Run `f` with a config file holding `config_toml` and no `FERRYDROP_`
/// variables set. Environment changes made by `f` are undone afterwards.
pub fn with_config_file<T>(config_toml: &str, f: impl FnOnce(PathBuf) -> T) -> T {
    let _guard = env_lock().lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, config_toml).expect("write config");

    let _restore = EnvRestore {
        saved: ENV_VARS
            .iter()
            .map(|name| (*name, std::env::var_os(name)))
            .collect(),
    };
    for name in ENV_VARS {
        std::env::remove_var(name);
    }

    f(path)
}
