//! Crate `livesync_paths`: rutas, locks y ficheros base de livesync

mod errors;
mod fs_utils;
mod paths;

pub use errors::Error;
pub use fs_utils::{ensure_dir, ensure_file};
pub use paths::LivesyncPaths;

pub use directories::UserDirs;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// RAII-guard que setea y luego restaura (o elimina) una variable de entorno.
    struct EnvVarGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn new(key: &str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            // set_var es unsafe en edition 2024
            unsafe { std::env::set_var(key, value) };
            EnvVarGuard {
                key: key.to_owned(),
                original,
            }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(val) => unsafe { std::env::set_var(&self.key, val) },
                None => unsafe { std::env::remove_var(&self.key) },
            }
        }
    }

    #[test]
    fn new_honours_base_dir_override_and_creates_structure() {
        let tmp = tempdir().unwrap();
        let _env = EnvVarGuard::new("LIVESYNC_BASE_DIR", tmp.path().to_str().unwrap());

        let paths = LivesyncPaths::new().unwrap();

        assert_eq!(paths.base_dir, tmp.path());
        assert_eq!(paths.catalog_db, tmp.path().join("file_manager.db"));
        // settings.toml lo escribe la configuración la primera vez que se carga
        assert!(!paths.settings_file.exists());
        assert!(paths.log_file.exists());
        assert!(!paths.lock_file.exists());
    }

    #[test]
    fn with_base_does_not_touch_disk() {
        let tmp = tempdir().unwrap();
        let base = tmp.path().join("nested");

        let paths = LivesyncPaths::with_base(&base);

        assert!(!base.exists());
        assert_eq!(paths.settings_file, base.join("settings.toml"));
        assert_eq!(paths.log_file, base.join("livesync.log"));
    }

    #[test]
    fn validate_structure_recreates_missing_base() {
        let tmp = tempdir().unwrap();
        let paths = LivesyncPaths::with_base(tmp.path().join("state"));

        paths.validate_structure().unwrap();
        assert!(paths.base_dir.exists());
    }

    #[test]
    fn second_lock_is_rejected_while_first_is_held() {
        let tmp = tempdir().unwrap();
        let paths = LivesyncPaths::with_base(tmp.path());

        let first = paths.lock().unwrap();
        assert!(paths.lock_file.exists());

        match paths.lock() {
            Err(Error::AlreadyLocked(_)) => {}
            other => panic!("Esperaba AlreadyLocked, obtuve {:?}", other.map(|_| ())),
        }

        drop(first);
        assert!(paths.lock().is_ok());
    }
}
