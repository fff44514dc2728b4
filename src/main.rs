use std::{process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use quire::{
    application::{
        api_keys::{ApiKeyService, IssueApiKeyCommand},
        error::AppError,
        migrations::SpamMigration,
        preprints::{PreprintLinks, PreprintSerializer, PreprintService},
        render::{
            ImmediateExecutor, QueuedExecutor, RenderExecutor, RenderFileJob, RenderRunner,
            RenderWorkerContext, RendererRegistry, process_render_file_job,
        },
        repos::{ApiKeysRepo, CommentsRepo, FilesRepo, JobsRepo, NodesRepo, SubjectsRepo},
    },
    config,
    domain::{api_keys::ApiScope, types::JobType},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};
use time::OffsetDateTime;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
        config::Command::MigrateSpam(args) => run_migrate_spam(settings, args).await,
        config::Command::ApiKeys(args) => run_api_keys(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (http_repositories, job_repositories) = init_repositories(&settings).await?;
    let runner = build_render_runner(&settings.render);

    let render: Arc<dyn RenderExecutor> = if settings.render.use_queue {
        let jobs_repo: Arc<dyn JobsRepo> = http_repositories.clone();
        Arc::new(QueuedExecutor::new(jobs_repo))
    } else {
        Arc::new(ImmediateExecutor::new(runner.clone()))
    };

    let monitor_handle = settings.render.use_queue.then(|| {
        spawn_job_monitor(
            job_repositories,
            RenderWorkerContext {
                runner: runner.clone(),
            },
            &settings.render,
        )
    });

    let api_state = build_api_state(&http_repositories, render, &settings);
    let result = serve_http(&settings, api_state, http_repositories).await;

    if let Some(handle) = monitor_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_render(
    settings: config::Settings,
    args: config::RenderFileArgs,
) -> Result<(), AppError> {
    let cache_file_name = match args.cache_file_name {
        Some(name) => name,
        None => args
            .file
            .file_name()
            .map(|name| format!("{}.html", name.to_string_lossy()))
            .ok_or_else(|| AppError::usage("render input must name a file"))?,
    };

    let job = RenderFileJob {
        file_name: args.file.to_string_lossy().into_owned(),
        file_content: None,
        cache_dir: args.cache_dir.unwrap_or(settings.render.cache_dir.clone()),
        cache_file_name,
        download_path: args.download_path,
    };
    let cache_path = job.cache_path();

    build_render_runner(&settings.render).run(job).await?;

    info!(
        target = "quire::render",
        path = %cache_path.display(),
        "Rendered file into cache"
    );
    Ok(())
}

async fn run_migrate_spam(
    settings: config::Settings,
    args: config::MigrateSpamArgs,
) -> Result<(), AppError> {
    let (repositories, _) = init_repositories(&settings).await?;
    let comments: Arc<dyn CommentsRepo> = repositories;

    let report = SpamMigration::new(comments).run(args.dry_run).await?;
    info!(
        target = "quire::migrate_spam",
        dry_run = args.dry_run,
        status_targets = report.status_targets,
        status_migrated = report.status_migrated,
        latest_targets = report.latest_targets,
        latest_migrated = report.latest_migrated,
        "Comment spam migration completed"
    );
    Ok(())
}

async fn run_api_keys(settings: config::Settings, args: config::ApiKeysArgs) -> Result<(), AppError> {
    let (repositories, _) = init_repositories(&settings).await?;
    let api_keys_repo: Arc<dyn ApiKeysRepo> = repositories;
    let service = ApiKeyService::new(api_keys_repo);

    match args.command {
        config::ApiKeysCommand::Issue(issue) => {
            let scopes = parse_scopes(&issue.scopes)?;
            let expires_at = issue.expires_in_days.map(|days| {
                OffsetDateTime::now_utc() + time::Duration::days(i64::from(days))
            });

            let issued = service
                .issue(IssueApiKeyCommand {
                    name: issue.name,
                    user_id: issue.user_id,
                    scopes,
                    expires_at,
                })
                .await?;

            info!(
                target = "quire::api_keys",
                key_id = %issued.record.id,
                user_id = %issued.record.user_id,
                prefix = %issued.record.prefix,
                "API key issued"
            );
            println!("{}", issued.token);
        }
        config::ApiKeysCommand::Revoke(revoke) => {
            service.revoke(revoke.id).await?;
            info!(target = "quire::api_keys", key_id = %revoke.id, "API key revoked");
        }
    }
    Ok(())
}

/// No `--scope` flags grants every scope.
fn parse_scopes(raw: &[String]) -> Result<Vec<ApiScope>, AppError> {
    if raw.is_empty() {
        return Ok(ApiScope::all().to_vec());
    }
    raw.iter()
        .map(|value| {
            value
                .parse::<ApiScope>()
                .map_err(|_| AppError::usage(format!("unknown api scope `{value}`")))
        })
        .collect()
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<(Arc<PostgresRepositories>, Arc<PostgresRepositories>), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let http = PostgresRepositories::connect(
        database_url,
        settings.database.http_max_connections.get(),
    )
    .await
    .map_err(InfraError::Database)?;
    http.migrate().await.map_err(InfraError::Database)?;

    let jobs = PostgresRepositories::connect(
        database_url,
        settings.database.jobs_max_connections.get(),
    )
    .await
    .map_err(InfraError::Database)?;

    Ok((Arc::new(http), Arc::new(jobs)))
}

fn build_render_runner(render: &config::RenderSettings) -> RenderRunner {
    let registry = RendererRegistry::new(render.command.clone());
    RenderRunner::new(
        Arc::new(registry),
        render.static_path.clone(),
        render.max_duration,
    )
}

fn build_api_state(
    repositories: &Arc<PostgresRepositories>,
    render: Arc<dyn RenderExecutor>,
    settings: &config::Settings,
) -> ApiState {
    let nodes_repo: Arc<dyn NodesRepo> = repositories.clone();
    let files_repo: Arc<dyn FilesRepo> = repositories.clone();
    let subjects_repo: Arc<dyn SubjectsRepo> = repositories.clone();
    let api_keys_repo: Arc<dyn ApiKeysRepo> = repositories.clone();

    let links = PreprintLinks::new(
        settings.api.base_url.as_str(),
        settings.api.web_base_url.as_str(),
        settings.api.doi_resolver.as_str(),
    );

    ApiState {
        api_keys: Arc::new(ApiKeyService::new(api_keys_repo)),
        preprints: Arc::new(PreprintService::new(
            nodes_repo,
            files_repo.clone(),
            subjects_repo,
        )),
        serializer: Arc::new(PreprintSerializer::new(links)),
        files: files_repo,
        render,
        render_cache_dir: settings.render.cache_dir.clone(),
    }
}

fn spawn_job_monitor(
    repositories: Arc<PostgresRepositories>,
    context: RenderWorkerContext,
    render: &config::RenderSettings,
) -> tokio::task::JoinHandle<()> {
    let render_storage = PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(JobType::RenderFile.as_str()),
    );

    let render_worker = WorkerBuilder::new("render-file-worker")
        .concurrency(render.worker_concurrency.get() as usize)
        .data(context)
        .backend(render_storage)
        .build_fn(process_render_file_job);

    let monitor = Monitor::new().register(render_worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(
    settings: &config::Settings,
    api_state: ApiState,
    repositories: Arc<PostgresRepositories>,
) -> Result<(), AppError> {
    let router = http::build_router(api_state, repositories);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|source| InfraError::Bind {
            addr: settings.server.addr,
            source,
        })?;
    info!(
        target = "quire::serve",
        addr = %settings.server.addr,
        render_queue = settings.render.use_queue,
        "Listening"
    );

    let shutdown = Arc::new(Notify::new());
    let waiter = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move { waiter.notified().await })
            .await
    });

    tokio::select! {
        joined = &mut server => return server_result(joined),
        _ = shutdown_signal() => {}
    }

    info!(
        target = "quire::serve",
        grace_secs = settings.server.graceful_shutdown.as_secs(),
        "Shutting down"
    );
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => server_result(joined),
        Err(_) => {
            warn!(
                target = "quire::serve",
                "Graceful shutdown timed out; dropping open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::Server(err.to_string())),
        Err(err) => Err(AppError::Server(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
