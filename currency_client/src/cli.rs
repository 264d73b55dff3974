use crate::{
    api::ApiClient,
    config::ClientConfig,
    error::ClientError,
    files::SelectedFile,
    history::HistoryView,
    presentation::{render_result, ResultCategory},
    session::{UploadMode, UploadSession},
};
use std::path::PathBuf;

pub const USAGE: &str = "usage: currency_client <command>

commands:
  predict <image>              classify a single image
  predict-many <image>...      classify several images in one request
  history [page] [per_page]    list past uploads (page starts at 1)
  stats                        show aggregate prediction stats
  health                       query the backend health endpoint";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Predict(PathBuf),
    PredictMany(Vec<PathBuf>),
    History { page: u32, per_page: Option<u32> },
    Stats,
    Health,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{0}\n\n{usage}", usage = USAGE)]
pub struct UsageError(String);

impl Command {
    pub fn parse<I>(args: I) -> Result<Self, UsageError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let Some(command) = args.next() else {
            return Err(UsageError("missing command".into()));
        };
        let rest: Vec<String> = args.collect();

        match command.as_str() {
            "predict" => match rest.as_slice() {
                [path] => Ok(Command::Predict(PathBuf::from(path))),
                _ => Err(UsageError("predict takes exactly one image".into())),
            },
            "predict-many" if !rest.is_empty() => {
                Ok(Command::PredictMany(rest.into_iter().map(PathBuf::from).collect()))
            }
            "predict-many" => Err(UsageError("predict-many needs at least one image".into())),
            "history" => {
                let page = parse_number(rest.first(), "page")?.unwrap_or(1).max(1);
                let per_page = parse_number(rest.get(1), "per_page")?;
                Ok(Command::History { page, per_page })
            }
            "stats" => Ok(Command::Stats),
            "health" => Ok(Command::Health),
            other => Err(UsageError(format!("unknown command '{}'", other))),
        }
    }
}

fn parse_number(value: Option<&String>, name: &str) -> Result<Option<u32>, UsageError> {
    value
        .map(|v| {
            v.parse::<u32>()
                .map_err(|_| UsageError(format!("{} must be a positive number", name)))
        })
        .transpose()
}

async fn load_files(paths: &[PathBuf]) -> Result<Vec<SelectedFile>, ClientError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(SelectedFile::from_path(path).await?);
    }
    Ok(files)
}

async fn upload(
    client: &ApiClient,
    config: &ClientConfig,
    mode: UploadMode,
    paths: &[PathBuf],
) -> Result<String, ClientError> {
    let mut session = UploadSession::new(config.upload.clone());
    session.set_mode(mode);

    let report = session.select_files(load_files(paths).await?);
    if report.rejected > 0 {
        tracing::warn!("Skipped {} file(s) that are not images", report.rejected);
    }
    if let Some(message) = session.error() {
        return Ok(message.to_string());
    }

    if session.submit(client).await.is_err() {
        return Ok(session.error().unwrap_or_default().to_string());
    }

    let mut lines = vec![session.success().unwrap_or_default().to_string()];
    lines.extend(session.results().iter().map(|r| render_result(Some(r))));
    Ok(lines.join("\n"))
}

async fn history(
    client: &ApiClient,
    config: &ClientConfig,
    page: u32,
    per_page: Option<u32>,
) -> Result<String, ClientError> {
    let mut view = HistoryView::new(&config.pagination);
    view.position(page.saturating_sub(1), per_page)?;
    view.load(client).await?;
    Ok(view.render_table())
}

async fn stats(client: &ApiClient, config: &ClientConfig) -> Result<String, ClientError> {
    let mut view = HistoryView::new(&config.pagination);
    view.load(client).await?;

    let Some(stats) = view.stats() else {
        return Ok(String::new());
    };

    let mut lines = vec![
        format!("model status:      {}", stats.model_status),
        format!("total uploads:     {}", stats.total_uploads),
        format!("uploads today:     {}", stats.uploads_today),
        format!("avg processing:    {:.3}s", stats.average_processing_time),
    ];
    for (label, count) in &stats.predictions_distribution {
        let category = ResultCategory::from_label(Some(label));
        lines.push(format!("{} {:<16} {}", category.icon(), category.text(), count));
    }
    Ok(lines.join("\n"))
}

/// Executes one command and returns what should be printed.
pub async fn run(command: Command, config: &ClientConfig) -> Result<String, ClientError> {
    let client = ApiClient::new(&config.api)?;

    match command {
        Command::Predict(path) => upload(&client, config, UploadMode::Single, &[path]).await,
        Command::PredictMany(paths) => {
            upload(&client, config, UploadMode::Multiple, &paths).await
        }
        Command::History { page, per_page } => history(&client, config, page, per_page).await,
        Command::Stats => stats(&client, config).await,
        Command::Health => {
            let body = client.health().await?;
            Ok(serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string()))
        }
    }
}
