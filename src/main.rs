#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::{Context, Result};
use architus_search_dsl::{new_client, Configuration, Query, SearchRequest};
use slog::Logger;
use sloggers::Config;
use std::sync::Arc;

/// Loads the config and runs one batch of query string searches against a single index
#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let usage = "\nUsage: \
        \narchitus-search-dsl [config-path] [index] [query]...";
    let config_path = args
        .next()
        .context(format!("no config path given{}", usage))?;
    let index = args.next().context(format!("no index given{}", usage))?;
    let queries = args.collect::<Vec<_>>();

    let config = Configuration::try_load(&config_path)?;

    // Set up the logger from the config
    let logger = config
        .logging
        .build_logger()
        .context("could not build logger from config values")?;

    slog::info!(logger, "configuration loaded"; "path" => config_path);
    slog::debug!(logger, "configuration dump"; "config" => ?config);

    match run(&config, &index, queries, logger.clone()).await {
        Ok(_) => slog::info!(logger, "searches finished";),
        Err(err) => {
            slog::error!(logger, "an error ocurred while searching"; "error" => ?err);
        }
    }
    Ok(())
}

async fn run(
    config: &Configuration,
    index: &str,
    queries: Vec<String>,
    logger: Logger,
) -> Result<()> {
    let client = new_client(config, logger.clone())?;

    let mut batch = client.multi_search();
    for query in &queries {
        batch.add(Arc::new(
            SearchRequest::new([index]).query(Query::string(query.as_str())),
        ));
    }

    let results = batch
        .results()
        .await
        .context("multi-search against Elasticsearch failed")?;
    for (query, result) in queries.iter().zip(results) {
        let ids = result
            .iter()
            .filter_map(|document| document.id())
            .collect::<Vec<_>>();
        slog::info!(
            logger,
            "search results";
            "query" => query,
            "total" => result.total(),
            "hits" => result.len(),
            "ids" => ids.join(","),
            "error" => result.error().map(ToString::to_string),
        );
    }

    Ok(())
}
