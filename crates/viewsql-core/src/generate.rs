//! SQL statement generation.
//!
//! A validated document is lowered once into a dialect-independent plan
//! (every column, iteration source and filter translated to IR, failures
//! collected per locator). The plan is then rendered for the generic
//! dialect and each named dialect.

use crate::error::{FailureSite, GenerateError, TranslationFailure};
use crate::model::{JoinSpec, ViewDocument};
use crate::path::ir::{Extraction, Nav, Predicate};
use crate::path::PathTranslator;
use crate::render::{Dialect, FragmentRenderer};
use crate::validate::ValidatedView;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use viewsql_config::CompilerConfig;

/// Generated statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSql {
    pub generic: String,
    /// One statement per named dialect
    pub per_dialect: BTreeMap<Dialect, String>,
}

/// Lowered form of a document, shared by every dialect.
struct Plan<'a> {
    resource: &'a str,
    blocks: Vec<BlockPlan<'a>>,
    filters: Vec<Predicate>,
}

struct BlockPlan<'a> {
    /// Collection path and whether empty collections keep their row
    iteration: Option<(Vec<Nav>, bool)>,
    columns: Vec<(&'a str, Extraction)>,
    join: Option<&'a JoinSpec>,
}

/// Generates SQL from validated view definitions.
#[derive(Debug, Clone, Default)]
pub struct SqlGenerator {
    config: CompilerConfig,
}

impl SqlGenerator {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Generate the generic statement and one per named dialect
    pub fn generate(&self, view: &ValidatedView<'_>) -> Result<GeneratedSql, GenerateError> {
        let plan = self.plan(view.document())?;

        let generic = self.render(&plan, Dialect::Generic);
        let per_dialect = Dialect::NAMED
            .into_iter()
            .map(|dialect| (dialect, self.render(&plan, dialect)))
            .collect();

        debug!(
            resource = plan.resource,
            blocks = plan.blocks.len(),
            filters = plan.filters.len(),
            "Generated SQL for all dialects"
        );

        Ok(GeneratedSql {
            generic,
            per_dialect,
        })
    }

    /// Generate the statement for a single dialect
    pub fn generate_dialect(
        &self,
        view: &ValidatedView<'_>,
        dialect: Dialect,
    ) -> Result<String, GenerateError> {
        let plan = self.plan(view.document())?;
        Ok(self.render(&plan, dialect))
    }

    fn plan<'a>(&self, doc: &'a ViewDocument) -> Result<Plan<'a>, GenerateError> {
        let translator = PathTranslator::new(&self.config.paths, &doc.constants);
        let mut failures = Vec::new();

        let mut blocks = Vec::with_capacity(doc.select.len());
        for (index, block) in doc.select.iter().enumerate() {
            let iteration = block.iteration().and_then(|iteration| {
                match translator.lower_iteration(iteration.path()) {
                    Ok(path) => Some((path, iteration.keeps_empty())),
                    Err(error) => {
                        let key = if iteration.keeps_empty() {
                            "forEachOrNull"
                        } else {
                            "forEach"
                        };
                        failures.push(TranslationFailure {
                            site: FailureSite::Iteration {
                                locator: format!("select[{}].{}", index, key),
                            },
                            error,
                        });
                        None
                    }
                }
            });

            let mut columns = Vec::with_capacity(block.columns.len());
            for (column_index, column) in block.columns.iter().enumerate() {
                match translator.lower_column(&column.path) {
                    Ok(extraction) => columns.push((column.name.as_str(), extraction)),
                    Err(error) => failures.push(TranslationFailure {
                        site: FailureSite::Column {
                            locator: format!("select[{}].column[{}]", index, column_index),
                            name: column.name.clone(),
                        },
                        error,
                    }),
                }
            }

            blocks.push(BlockPlan {
                iteration,
                columns,
                join: block.join.as_ref(),
            });
        }

        let mut filters = Vec::new();
        for (index, filter) in doc.filters.iter().enumerate() {
            match translator.lower_filter(&filter.expression) {
                Ok(predicates) => filters.extend(predicates),
                Err(error) => failures.push(TranslationFailure {
                    site: FailureSite::Filter {
                        locator: format!("where[{}]", index),
                    },
                    error,
                }),
            }
        }

        if !failures.is_empty() {
            for failure in &failures {
                warn!("Path translation failed at {}", failure);
            }
            return Err(GenerateError::Translation(failures));
        }

        Ok(Plan {
            resource: &doc.resource,
            blocks,
            filters,
        })
    }

    fn render(&self, plan: &Plan<'_>, dialect: Dialect) -> String {
        let mut renderer = FragmentRenderer::new(dialect, &self.config.storage);
        let mut projections = Vec::new();
        let mut iterations = Vec::new();
        let mut joins = Vec::new();

        for block in &plan.blocks {
            let element = block.iteration.as_ref().map(|(path, keep_empty)| {
                let (join, element) = renderer.iteration(path, *keep_empty);
                iterations.push(join);
                element
            });

            for (name, extraction) in &block.columns {
                let fragment = match &element {
                    Some(element) => renderer.extraction_from(element, extraction),
                    None => renderer.extraction(extraction),
                };
                projections.push(format!("{} AS {}", fragment, renderer.identifier(name)));
            }

            if let Some(join) = block.join {
                joins.push(format!(
                    "{} JOIN {} ON {}",
                    join.join_type.keyword().unwrap_or("INNER"),
                    renderer.identifier(&join.table),
                    join.condition
                ));
            }
        }

        let mut sql = format!(
            "SELECT {} FROM {}",
            projections.join(", "),
            renderer.identifier(plan.resource)
        );
        for clause in iterations.iter().chain(&joins) {
            sql.push(' ');
            sql.push_str(clause);
        }

        if !plan.filters.is_empty() {
            let predicates: Vec<String> = plan
                .filters
                .iter()
                .map(|predicate| renderer.predicate(predicate))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }

        sql
    }
}
