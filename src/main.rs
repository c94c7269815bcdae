use std::collections::BTreeMap;
use std::sync::Arc;

use clap::Parser;

use paramfinder::cli::Cli;
use paramfinder::error::CoreError;
use paramfinder::orchestrator::{self, TargetStatus};
use paramfinder::passive::{self, PassiveSource};
use paramfinder::{config, export, logging, transport, wordlist};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.quiet);

    tokio::select! {
        result = run(cli) => {
            if let Err(err) = result {
                eprintln!("error: {err}");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("interrupted");
        }
    }
}

async fn run(cli: Cli) -> Result<(), CoreError> {
    let quiet = cli.quiet;
    let wordlist_alias = cli.wordlist.clone();
    let raw_wordlist = wordlist::load(&wordlist_alias)?;
    let resolved = config::resolve(cli, raw_wordlist.len())?;

    let mut words = match resolved.casing {
        Some(casing) => wordlist::recase(&raw_wordlist, casing),
        None => raw_wordlist,
    };

    if let Some(host) = passive::resolve_host(resolved.passive.as_deref(), resolved.targets.first().map(String::as_str)) {
        let source = passive::WaybackSource::new();
        let discovered = source.fetch_params(&host).await;
        if !discovered.is_empty() {
            tracing::info!(count = discovered.len(), %host, "augmented wordlist from passive sources");
        }
        words.extend(discovered);
    }

    let overrides = wordlist::load_specials();
    let transport: Arc<dyn transport::Transport> = Arc::new(transport::ReqwestTransport::new(
        resolved.run_config.timeout,
        resolved.run_config.rate_limit,
    )?);

    let mut exports: BTreeMap<String, export::TargetExport> = BTreeMap::new();

    for target in &resolved.targets {
        let mut req = resolved.request_template.clone();
        req.url = target.clone();
        let req = Arc::new(req);

        let result = orchestrator::run_target(
            Arc::clone(&transport),
            Arc::clone(&req),
            resolved.run_config.clone(),
            &words,
            &overrides,
        )
        .await;

        match result.status {
            TargetStatus::Found => {
                if !quiet {
                    println!("{target}");
                    for param in &result.params {
                        println!("  [{}] {} (score {})", param.risk, param.name, param.score);
                    }
                }
                exports.insert(
                    target.clone(),
                    export::TargetExport {
                        method: req.method,
                        headers: req.headers.clone(),
                        params: result.params.iter().map(export::ExportedParam::from).collect(),
                    },
                );
            }
            TargetStatus::Empty => {
                if !quiet {
                    println!("{target}: no parameters found");
                }
            }
            TargetStatus::Skipped => {
                tracing::warn!(%target, "target skipped");
            }
        }
    }

    if let Some(path) = &resolved.json_file {
        export::json_export(path, &exports)?;
    }
    if let Some(path) = &resolved.text_file {
        export::text_export(path, &exports)?;
    }
    if let Some(path) = &resolved.html_file {
        export::html_export(path, &exports)?;
    }
    if let Some(proxy) = &resolved.burp_proxy {
        export::burp_export(proxy, &exports).await?;
    }

    Ok(())
}
