mod action;
mod adjust;
mod base;
mod calibration;
mod config;
mod errors;
mod features;
mod server;
mod service;
mod state;

use crate::base::remote::RemoteBaseModel;
use crate::base::synthetic::SyntheticBaseModel;
use crate::base::BaseModel;
use crate::calibration::engine::{run_calibration, CalibrationConfig};
use crate::config::{AppConfig, BaseModelKind};
use crate::errors::PredictorResult;
use crate::service::PredictionService;
use crate::state::AppState;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "csn_predictor", about = "Action-conditioned latency/energy predictor with conformal tail bounds")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve predictions over HTTP
    Serve,
    /// Run one offline calibration pass and write the conformal table
    Calibrate {
        /// Output path (defaults to CONFORMAL_TABLE_PATH)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Feature draws, each evaluated under every calibration action
        #[arg(long, default_value_t = 8000)]
        samples: usize,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Target coverage level
        #[arg(long, default_value_t = 0.95)]
        alpha: f64,
        /// Fraction of residuals held out to measure coverage
        #[arg(long, default_value_t = 0.0)]
        holdout: f64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    let model = match build_base_model(&cfg) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!("base model init error: {e}");
            std::process::exit(1);
        }
    };

    let outcome = match cli.command {
        Command::Serve => serve(cfg, model).await,
        Command::Calibrate { out, samples, seed, alpha, holdout } => {
            let calib = CalibrationConfig {
                samples,
                seed,
                alpha,
                holdout,
                ..Default::default()
            };
            let out = out.unwrap_or_else(|| cfg.conformal_table_path.clone());
            calibrate(model.as_ref(), &calib, out).await
        }
    };

    if let Err(e) = outcome {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn build_base_model(cfg: &AppConfig) -> PredictorResult<Arc<dyn BaseModel>> {
    Ok(match cfg.base_model {
        BaseModelKind::Synthetic => Arc::new(SyntheticBaseModel::new()),
        BaseModelKind::Remote => Arc::new(RemoteBaseModel::new(&cfg.base_model_url, cfg.base_model_timeout)?),
    })
}

async fn serve(cfg: AppConfig, model: Arc<dyn BaseModel>) -> PredictorResult<()> {
    let service = PredictionService::new(
        model,
        cfg.bound_strategy,
        cfg.default_qhat_ms,
        cfg.base_model_timeout,
        &cfg.conformal_table_path,
    );

    tracing::info!(
        strategy = %service.strategy(),
        model = service.model_name(),
        table_version = service.snapshot().version,
        "csn_predictor starting"
    );

    let app = server::router(Arc::new(AppState::new(service)));

    let addr = format!("0.0.0.0:{}", cfg.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("server listening on {addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn calibrate(model: &dyn BaseModel, calib: &CalibrationConfig, out: PathBuf) -> PredictorResult<()> {
    let report = run_calibration(model, calib).await?;
    report.table.save(&out)?;

    tracing::info!(path = %out.display(), buckets = report.buckets.len(), "conformal table written");
    for b in &report.buckets {
        match b.holdout_coverage {
            Some(cov) => tracing::info!(
                bucket = %b.bucket,
                qhat = b.qhat,
                coverage = cov,
                target = calib.alpha,
                "holdout coverage"
            ),
            None => tracing::info!(bucket = %b.bucket, qhat = b.qhat, "calibrated"),
        }
    }
    Ok(())
}
