//! Run orchestration: authenticate, paginate, normalize, write.
//!
//! Pages are fetched one at a time. Each page's rules are normalized on the
//! blocking pool as an independent unit of work that returns its own rules
//! and counters, so units share no state. Finished units are collected by
//! page index and concatenated in page order once pagination ends, which
//! keeps the output order stable across runs.
//!
//! A rule that fails to parse is logged, counted and skipped. A rule without
//! usable actions aborts the run unless [`NormalizeOptions::lenient_actions`]
//! is set. Any other failure aborts the run; units still in flight are
//! cancelled when the join set is dropped.

use std::path::{Path, PathBuf};

use edr_client::{ClientError, EdrClient, PageToken, RawRuleEntry, RuleSource, RulesPage};
use edr_normalize::{NormalizeError, NormalizedRule, normalize};
use tokio::task::{JoinError, JoinSet};

use crate::config::AppConfig;
use crate::metrics::RuleMetrics;
use crate::output::{OutputError, write_rules_db};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("unrecoverable rule on page {page}")]
    Normalize {
        page: usize,
        #[source]
        source: NormalizeError,
    },

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("normalization task failed: {0}")]
    Task(String),
}

/// How per-rule failures are treated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    /// Count rules without actions as parse failures instead of aborting.
    pub lenient_actions: bool,
}

/// Result of one unit of work.
#[derive(Debug, Default)]
pub struct PageOutcome {
    pub rules: Vec<NormalizedRule>,
    pub metrics: RuleMetrics,
}

/// Everything gathered from the provider, in page order.
#[derive(Debug, Default)]
pub struct CollectedRules {
    pub rules: Vec<NormalizedRule>,
    pub metrics: RuleMetrics,
    pub pages: usize,
}

/// Summary of a finished run.
#[derive(Debug)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub pages: usize,
    pub metrics: RuleMetrics,
}

/// Runs the whole export against the live API.
///
/// The HTTP session is closed before returning, whether or not the run
/// succeeded.
pub async fn run(config: &AppConfig) -> Result<RunSummary, PipelineError> {
    tracing::info!("Processing ...");

    let client = EdrClient::new(config.host.clone(), config.token_host.clone())?;
    let result = authenticate_and_export(&client, config).await;
    client.close();

    result
}

async fn authenticate_and_export(
    client: &EdrClient,
    config: &AppConfig,
) -> Result<RunSummary, PipelineError> {
    let token = client.authenticate(&config.credentials()).await?;
    let session = client.with_token(token);

    export_rules(
        &session,
        &config.output_path(),
        config.normalize_options(),
    )
    .await
}

/// Collects every rule from `source`, writes the database to `output_path`,
/// and logs the final counts.
pub async fn export_rules<S: RuleSource>(
    source: &S,
    output_path: &Path,
    options: NormalizeOptions,
) -> Result<RunSummary, PipelineError> {
    let collected = collect_rules(source, options).await?;

    write_rules_db(output_path, &collected.rules)?;
    collected.metrics.log_metrics();

    Ok(RunSummary {
        output_path: output_path.to_path_buf(),
        pages: collected.pages,
        metrics: collected.metrics,
    })
}

/// Pages through `source` and normalizes every rule.
pub async fn collect_rules<S: RuleSource>(
    source: &S,
    options: NormalizeOptions,
) -> Result<CollectedRules, PipelineError> {
    let mut units: JoinSet<(usize, Result<PageOutcome, PipelineError>)> = JoinSet::new();
    let mut outcomes: Vec<Option<PageOutcome>> = Vec::new();
    let mut page_token = PageToken::first();

    loop {
        let page = source.fetch_page(&page_token).await?;
        let is_last = page.is_last();
        let RulesPage {
            next_page_token,
            rules,
        } = page;

        let index = outcomes.len();
        outcomes.push(None);
        tracing::debug!(page = index, rules = rules.len(), "Scheduling page");
        units.spawn_blocking(move || (index, normalize_page(index, &rules, options)));

        while let Some(joined) = units.try_join_next() {
            store_outcome(joined, &mut outcomes)?;
        }

        if is_last {
            tracing::info!("End of rules");
            break;
        }
        page_token = next_page_token;
    }

    while let Some(joined) = units.join_next().await {
        store_outcome(joined, &mut outcomes)?;
    }

    let mut collected = CollectedRules {
        pages: outcomes.len(),
        ..CollectedRules::default()
    };
    for outcome in outcomes.into_iter().flatten() {
        collected.metrics.merge(outcome.metrics);
        collected.rules.extend(outcome.rules);
    }

    Ok(collected)
}

fn store_outcome(
    joined: Result<(usize, Result<PageOutcome, PipelineError>), JoinError>,
    outcomes: &mut [Option<PageOutcome>],
) -> Result<(), PipelineError> {
    let (index, outcome) = joined.map_err(|e| PipelineError::Task(e.to_string()))?;
    let outcome = outcome?;
    if let Some(slot) = outcomes.get_mut(index) {
        *slot = Some(outcome);
    }
    Ok(())
}

/// Normalizes one page of rules, in order.
pub fn normalize_page(
    page: usize,
    entries: &[RawRuleEntry],
    options: NormalizeOptions,
) -> Result<PageOutcome, PipelineError> {
    let mut outcome = PageOutcome::default();

    for entry in entries {
        outcome.metrics.inc_all();

        match normalize(&entry.xml_definition) {
            Ok(rule) => outcome.rules.push(rule),
            Err(error) if error.is_parse_failure() || options.lenient_actions => {
                tracing::error!("Unable to parse rule: {:?}", entry);
                tracing::debug!(error = %error, "Rule parse failure");
                outcome.metrics.inc_parsing_fail();
            }
            Err(error) => {
                tracing::error!(page, rule_id = ?entry.id(), "Rule has no usable actions");
                return Err(PipelineError::Normalize {
                    page,
                    source: error,
                });
            }
        }
    }

    Ok(outcome)
}
