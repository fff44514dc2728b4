use super::*;

#[test]
fn defaults_are_valid() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:8000");
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert_eq!(settings.database.http_max_connections.get(), 8);
    assert_eq!(settings.database.jobs_max_connections.get(), 4);
    assert_eq!(settings.api.base_url.as_str(), "http://localhost:8000/");
    assert_eq!(settings.api.web_base_url.as_str(), "http://localhost:5000/");
    assert_eq!(settings.api.doi_resolver.as_str(), "https://dx.doi.org/");
    assert_eq!(settings.render.static_path, "/static/mfr");
    assert_eq!(settings.render.max_duration, Duration::from_secs(120));
    assert!(!settings.render.use_queue);
    assert_eq!(settings.render.cache_dir, PathBuf::from("mfrcache"));
    assert_eq!(settings.render.command, None);
    assert_eq!(settings.render.worker_concurrency.get(), 2);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.render.use_queue = Some(false);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        render_use_queue: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(settings.render.use_queue);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn base_urls_gain_a_trailing_slash() {
    let mut raw = RawSettings::default();
    raw.api.base_url = Some("https://api.example.org/v".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.api.base_url.as_str(), "https://api.example.org/v/");
}

#[test]
fn invalid_values_name_their_key() {
    let mut raw = RawSettings::default();
    raw.render.max_duration_seconds = Some(0);
    match Settings::from_raw(raw) {
        Err(LoadError::Invalid { key, .. }) => assert_eq!(key, "render.max_duration_seconds"),
        other => panic!("unexpected result: {other:?}"),
    }

    let mut raw = RawSettings::default();
    raw.api.doi_resolver = Some("not a url".to_string());
    match Settings::from_raw(raw) {
        Err(LoadError::Invalid { key, .. }) => assert_eq!(key, "api.doi_resolver"),
        other => panic!("unexpected result: {other:?}"),
    }

    let mut raw = RawSettings::default();
    raw.render.worker_concurrency = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn empty_render_command_means_none() {
    let mut raw = RawSettings::default();
    raw.render.command = Some(PathBuf::new());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.render.command, None);
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["quire"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_migrate_spam_arguments() {
    let args = CliArgs::parse_from([
        "quire",
        "migrate-spam",
        "--database-url",
        "postgres://example",
        "--dry-run",
    ]);

    match args.command.expect("migrate-spam command") {
        Command::MigrateSpam(migrate) => {
            assert_eq!(
                migrate.database.database_url.as_deref(),
                Some("postgres://example")
            );
            assert!(migrate.dry_run);
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_api_key_issue_arguments() {
    let args = CliArgs::parse_from([
        "quire",
        "api-keys",
        "issue",
        "--user",
        "u1",
        "--name",
        "ci",
        "--scope",
        "preprint_write",
        "--expires-in-days",
        "30",
    ]);

    match args.command.expect("api-keys command") {
        Command::ApiKeys(keys) => match keys.command {
            ApiKeysCommand::Issue(issue) => {
                assert_eq!(issue.user_id, "u1");
                assert_eq!(issue.name, "ci");
                assert_eq!(issue.scopes, vec!["preprint_write".to_string()]);
                assert_eq!(issue.expires_in_days, Some(30));
            }
            ApiKeysCommand::Revoke(_) => panic!("wrong subcommand parsed"),
        },
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_render_arguments() {
    let args = CliArgs::parse_from([
        "quire",
        "render",
        "/data/table.csv",
        "--cache-dir",
        "/tmp/cache",
        "--download-path",
        "/download/table.csv",
        "--render-command",
        "/usr/local/bin/mfr",
    ]);

    match args.command.expect("render command") {
        Command::Render(render) => {
            assert_eq!(render.file, PathBuf::from("/data/table.csv"));
            assert_eq!(render.cache_dir, Some(PathBuf::from("/tmp/cache")));
            assert_eq!(render.cache_file_name, None);
            assert_eq!(render.download_path, "/download/table.csv");
            assert_eq!(
                render.render.command,
                Some(PathBuf::from("/usr/local/bin/mfr"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}
