//! Operations whose statements depend on what is already in the database.

use anyhow::{Context, Result};
use async_trait::async_trait;
use itertools::Itertools;
use std::collections::BTreeMap;

use super::CustomOperation;
use crate::db::SqlValue;
use crate::runner::StepContext;

const NORMAL_SAMPLE_TAG: &str = "normal_sample[";

/// Copies each project's outsourcing company onto its variants, one
/// parameterised update per company and analysis.
pub struct OutsourcingBackfill;

#[async_trait]
impl CustomOperation for OutsourcingBackfill {
    fn describe(&self) -> &str {
        "copy project outsourcing onto every analysis"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let cursor = ctx
            .query("SELECT `id`, `outsourcing` FROM `projects` WHERE `outsourcing` IS NOT NULL AND `outsourcing` != ''")
            .await
            .context("Failed to read project outsourcing")?;

        let mut companies: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        for row in cursor {
            let (Some(id), Some(outsourcing)) = (row.at_i64(0)?, row.at(1)) else {
                continue;
            };
            companies.entry(outsourcing.to_string()).or_default().push(id);
        }

        let tenants = ctx.tenants().await?.names().to_vec();
        for tenant in &tenants {
            ctx.execute(&format!("UPDATE `{}` SET `outsourcing` = NULL", tenant))
                .await?;
            for (company, projects) in &companies {
                let statement = format!(
                    "UPDATE `{}` SET `outsourcing` = ? WHERE `project_id` IN ({})",
                    tenant,
                    projects.iter().map(|_| "?").join(", ")
                );
                let params: Vec<SqlValue> = std::iter::once(SqlValue::from(company.as_str()))
                    .chain(projects.iter().map(|id| SqlValue::Int(*id)))
                    .collect();
                ctx.execute_with(&statement, &params).await?;
            }
        }
        Ok(())
    }
}

/// Creates the `levenshtein` stored function unless the server already has it.
pub struct LevenshteinFunction;

const CREATE_LEVENSHTEIN: &str = "CREATE FUNCTION `levenshtein`(s1 VARCHAR(255), s2 VARCHAR(255)) \
RETURNS INT DETERMINISTIC \
BEGIN \
DECLARE s1_len, s2_len, i, j, c, c_temp, cost INT; \
DECLARE s1_char CHAR; \
DECLARE cv0, cv1 VARBINARY(256); \
SET s1_len = CHAR_LENGTH(s1), s2_len = CHAR_LENGTH(s2), cv1 = 0x00, j = 1, i = 1, c = 0; \
IF s1 = s2 THEN RETURN 0; \
ELSEIF s1_len = 0 THEN RETURN s2_len; \
ELSEIF s2_len = 0 THEN RETURN s1_len; \
ELSE \
WHILE j <= s2_len DO SET cv1 = CONCAT(cv1, UNHEX(HEX(j))), j = j + 1; END WHILE; \
WHILE i <= s1_len DO \
SET s1_char = SUBSTRING(s1, i, 1), c = i, cv0 = UNHEX(HEX(i)), j = 1; \
WHILE j <= s2_len DO \
SET c = c + 1; \
IF s1_char = SUBSTRING(s2, j, 1) THEN SET cost = 0; ELSE SET cost = 1; END IF; \
SET c_temp = CONV(HEX(SUBSTRING(cv1, j, 1)), 16, 10) + cost; \
IF c > c_temp THEN SET c = c_temp; END IF; \
SET c_temp = CONV(HEX(SUBSTRING(cv1, j+1, 1)), 16, 10) + 1; \
IF c > c_temp THEN SET c = c_temp; END IF; \
SET cv0 = CONCAT(cv0, UNHEX(HEX(c))), j = j + 1; \
END WHILE; \
SET cv1 = cv0, i = i + 1; \
END WHILE; \
END IF; \
RETURN c; \
END";

#[async_trait]
impl CustomOperation for LevenshteinFunction {
    fn describe(&self) -> &str {
        "create the levenshtein function when absent"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let existing = ctx
            .query("SHOW FUNCTION STATUS WHERE Name = 'levenshtein'")
            .await
            .context("Failed to look up the levenshtein function")?;
        if existing.total() > 0 {
            tracing::debug!("levenshtein function already present");
            return Ok(());
        }
        ctx.banner("Create Levenshtein function");
        ctx.execute(CREATE_LEVENSHTEIN).await?;
        Ok(())
    }
}

/// Moves the NORMAL sample of tumor/normal pairs from free-text project
/// comments (`normal_sample[<run path>]`) into `projects.normal_id`.
pub struct NormalSampleBackfill;

#[async_trait]
impl CustomOperation for NormalSampleBackfill {
    fn describe(&self) -> &str {
        "resolve normal sample ids from project comments"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let cursor = ctx
            .query("SELECT `project_id`, `comments` FROM `projects` WHERE INSTR(`comments`, 'normal_sample')")
            .await
            .context("Failed to read project comments")?;

        let mut tagged: BTreeMap<i64, String> = BTreeMap::new();
        for row in cursor {
            if let (Some(id), Some(comments)) = (row.at_i64(0)?, row.at(1)) {
                tagged.insert(id, comments.to_string());
            }
        }

        for (id, comments) in &tagged {
            let normal = match normal_sample_path(comments) {
                Some(path) => {
                    let matches = ctx
                        .query_with(
                            "SELECT `project_id` FROM `projects` WHERE `run_path` = ?",
                            &[SqlValue::from(path)],
                        )
                        .await?;
                    let mut best = None;
                    for row in matches {
                        best = best.max(row.at_i64(0)?);
                    }
                    best
                }
                None => None,
            };

            match normal {
                Some(normal_id) => {
                    ctx.execute_with(
                        "UPDATE `projects` SET `normal_id` = ? WHERE `project_id` = ?",
                        &[SqlValue::Int(normal_id), SqlValue::Int(*id)],
                    )
                    .await?;
                }
                None => ctx.warn(&format!(
                    "project id {} with comment {} : normal id not found !",
                    id, comments
                )),
            }
        }
        Ok(())
    }
}

/// Run path between `normal_sample[` and the last `]` of a comment
fn normal_sample_path(comments: &str) -> Option<&str> {
    let start = comments.find(NORMAL_SAMPLE_TAG)? + NORMAL_SAMPLE_TAG.len();
    let end = comments.rfind(']')?;
    (end >= start).then(|| &comments[start..end])
}
