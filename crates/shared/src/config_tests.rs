use crate::config::AppConfig;

#[test]
fn test_load_defaults_without_sources() {
    temp_env::with_vars_unset(
        [
            "DOSSIER__SERVER__PORT",
            "DOSSIER__DATABASE__URL",
            "DOSSIER__STORAGE__DEFAULT_ROOT",
        ],
        || {
            let config = AppConfig::load().expect("defaults should load");
            assert_eq!(config.server.port, 3000);
            assert!(config.server.public_url.is_none());
            assert!(config.database.is_none());
            assert_eq!(config.storage.default_root, "uploads");
            assert_eq!(config.storage.max_file_size, 10 * 1024 * 1024);
            assert_eq!(config.drive.token_url, "https://oauth2.googleapis.com/token");
        },
    );
}

#[test]
fn test_load_from_environment() {
    temp_env::with_vars(
        [
            ("DOSSIER__SERVER__PORT", Some("8088")),
            ("DOSSIER__SERVER__PUBLIC_URL", Some("https://crm.example.com")),
            ("DOSSIER__STORAGE__DEFAULT_ROOT", Some("/var/lib/dossier")),
            ("DOSSIER__DATABASE__URL", Some("postgres://localhost/dossier")),
        ],
        || {
            let config = AppConfig::load().expect("env config should load");
            assert_eq!(config.server.port, 8088);
            assert_eq!(
                config.server.public_url.as_deref(),
                Some("https://crm.example.com")
            );
            assert_eq!(config.storage.default_root, "/var/lib/dossier");
            let database = config.database.expect("database section present");
            assert_eq!(database.url, "postgres://localhost/dossier");
            assert_eq!(database.max_connections, 10);
        },
    );
}
