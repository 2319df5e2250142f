//! modelport - Main entry point

use clap::Parser;
use modelport::cli::{
    cmd_export_graph, cmd_predict_graph, cmd_predict_tabular, cmd_predict_text, cmd_train_tabular,
    cmd_train_text, Cli, Commands,
};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modelport=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::TrainTabular { data, output } => {
            cmd_train_tabular(&data, &output)?;
        }
        Commands::PredictTabular {
            model,
            age,
            sex,
            pclass,
        } => {
            cmd_predict_tabular(&model, age, &sex, pclass)?;
        }
        Commands::TrainText { data, output } => {
            cmd_train_text(&data, &output)?;
        }
        Commands::PredictText { model, text } => {
            cmd_predict_text(&model, &text)?;
        }
        Commands::ExportGraph { model, output } => {
            cmd_export_graph(&model, &output)?;
        }
        Commands::PredictGraph { graph, text } => {
            cmd_predict_graph(&graph, &text)?;
        }
    }

    Ok(())
}
