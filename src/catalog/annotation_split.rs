//! Release 17 reshaping of each wide analysis table into four annotation
//! tables: per-sample calls, per-variant static annotations, per-gene
//! annotations and user (custom) annotations.

use anyhow::{Context, Result};
use async_trait::async_trait;
use itertools::Itertools;

use super::CustomOperation;
use crate::db::{LoadMode, Row, SqlValue};
use crate::runner::StepContext;
use crate::tenants::TenantName;

/// Rows read per round trip while scanning a source table
const PAGE_SIZE: u64 = 10_000;

const SAMPLE_COLUMNS: &[&str] = &[
    "project_id",
    "chr",
    "pos",
    "reference",
    "alternative",
    "gene_symbol",
    "zygosity",
    "read_depth",
    "genotype_quality",
    "filters",
    "check_insilico",
    "check_validated_change",
    "check_somatic_change",
    "check_segregation",
];

const STATIC_COLUMNS: &[&str] = &[
    "chr",
    "pos",
    "reference",
    "alternative",
    "gene_symbol",
    "dbsnp_id",
    "exac_ac",
    "exac_af",
    "cadd_phred",
    "vest_score",
    "dann_score",
    "eigen_score",
    "consensus_MAC",
    "consensus_MAF",
];

const GENE_COLUMNS: &[&str] = &["gene_symbol"];

const CUSTOM_COLUMNS: &[&str] = &[
    "project_id",
    "chr",
    "pos",
    "reference",
    "alternative",
    "gene_symbol",
    "outsourcing",
];

/// Old per-analysis tables that the split tables replace
const OBSOLETE_SUFFIXES: &[&str] = &[
    "",
    "_private_annotations",
    "_backup_private_annotations",
    "_public_annotations",
    "_backup_public_annotations",
    "_change_stats",
    "_gene_stats",
    "_general_stats",
];

/// Destination tables for one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitTables {
    pub sample: String,
    pub static_annotations: String,
    pub gene: String,
    pub custom: String,
}

impl SplitTables {
    pub fn for_tenant(tenant: &TenantName) -> Self {
        Self {
            sample: format!("{}_sample_annotations", tenant),
            static_annotations: format!("{}_static_annotations", tenant),
            gene: format!("{}_gene_annotations", tenant),
            custom: format!("{}_custom_annotations", tenant),
        }
    }

    fn create_statements(&self) -> Vec<String> {
        vec![
            format!("DROP TABLE IF EXISTS `{}`", self.sample),
            format!(
                "CREATE TABLE `{}` (\
                 `variant_sample_id` INT UNSIGNED NOT NULL AUTO_INCREMENT, \
                 `project_id` INT UNSIGNED NOT NULL, \
                 `chr` VARCHAR(2) NOT NULL, \
                 `pos` INT NOT NULL, \
                 `reference` VARCHAR(1000) NOT NULL, \
                 `alternative` VARCHAR(1000) NOT NULL, \
                 `gene_symbol` VARCHAR(255) DEFAULT NULL, \
                 `zygosity` ENUM('Homozygous','Heterozygous') DEFAULT NULL, \
                 `read_depth` INT DEFAULT NULL, \
                 `genotype_quality` DOUBLE DEFAULT NULL, \
                 `filters` VARCHAR(255) DEFAULT NULL, \
                 `check_insilico` ENUM('NOT_CHECKED','OK','NOT_OK') NOT NULL DEFAULT 'NOT_CHECKED', \
                 `check_validated_change` ENUM('NOT_CHECKED','VALIDATED','SUSPECT','INVALIDATED') NOT NULL DEFAULT 'NOT_CHECKED', \
                 `check_somatic_change` ENUM('NOT_CHECKED','SOMATIC','GERMLINE','DUBIOUS') NOT NULL DEFAULT 'NOT_CHECKED', \
                 `check_segregation` ENUM('NOT_CHECKED','SINGLE','COSEG','CARRIERS','NO_COSEG','NO_COSEG_OTHER') NOT NULL DEFAULT 'NOT_CHECKED', \
                 `insert_date_sample` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP, \
                 PRIMARY KEY (`variant_sample_id`), \
                 KEY `project_id` (`project_id`), \
                 KEY `variant` (`chr`,`pos`)\
                 ) ENGINE=InnoDB DEFAULT CHARSET=utf8",
                self.sample
            ),
            format!("DROP TABLE IF EXISTS `{}`", self.static_annotations),
            format!(
                "CREATE TABLE `{}` (\
                 `variant_static_id` INT UNSIGNED NOT NULL AUTO_INCREMENT, \
                 `chr` VARCHAR(2) NOT NULL, \
                 `pos` INT NOT NULL, \
                 `reference` VARCHAR(1000) NOT NULL, \
                 `alternative` VARCHAR(1000) NOT NULL, \
                 `gene_symbol` VARCHAR(255) DEFAULT NULL, \
                 `dbsnp_id` VARCHAR(255) DEFAULT NULL, \
                 `exac_ac` INT DEFAULT NULL, \
                 `exac_af` DOUBLE DEFAULT NULL, \
                 `cadd_phred` DOUBLE DEFAULT NULL, \
                 `vest_score` DOUBLE DEFAULT NULL, \
                 `dann_score` DOUBLE DEFAULT NULL, \
                 `eigen_score` DOUBLE DEFAULT NULL, \
                 `consensus_MAC` INT DEFAULT NULL, \
                 `consensus_MAF` DOUBLE DEFAULT NULL, \
                 `insert_date_static` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP, \
                 PRIMARY KEY (`variant_static_id`), \
                 UNIQUE KEY `variant` (`chr`,`pos`,`reference`(255),`alternative`(255))\
                 ) ENGINE=InnoDB DEFAULT CHARSET=utf8",
                self.static_annotations
            ),
            format!("DROP TABLE IF EXISTS `{}`", self.gene),
            format!(
                "CREATE TABLE `{}` (\
                 `gene_id` INT UNSIGNED NOT NULL AUTO_INCREMENT, \
                 `gene_symbol` VARCHAR(255) NOT NULL, \
                 `comments_gene` LONGTEXT, \
                 `insert_date_gene` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP, \
                 PRIMARY KEY (`gene_id`), \
                 UNIQUE KEY `gene_symbol` (`gene_symbol`)\
                 ) ENGINE=InnoDB DEFAULT CHARSET=utf8",
                self.gene
            ),
            format!("DROP TABLE IF EXISTS `{}`", self.custom),
            format!(
                "CREATE TABLE `{}` (\
                 `variant_custom_id` INT UNSIGNED NOT NULL AUTO_INCREMENT, \
                 `project_id` INT UNSIGNED NOT NULL, \
                 `chr` VARCHAR(2) NOT NULL, \
                 `pos` INT NOT NULL, \
                 `reference` VARCHAR(1000) NOT NULL, \
                 `alternative` VARCHAR(1000) NOT NULL, \
                 `gene_symbol` VARCHAR(255) DEFAULT NULL, \
                 `outsourcing` VARCHAR(50) DEFAULT NULL, \
                 `insert_date_custom` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP, \
                 PRIMARY KEY (`variant_custom_id`), \
                 UNIQUE KEY `variant` (`project_id`,`chr`,`pos`,`reference`(255),`alternative`(255),`gene_symbol`)\
                 ) ENGINE=InnoDB DEFAULT CHARSET=utf8",
                self.custom
            ),
        ]
    }
}

/// Identity of a variant across samples: `chr-pos-reference-alternative`
pub fn variant_key(row: &Row) -> String {
    format!(
        "{}-{}-{}-{}",
        row.get("chr").unwrap_or_default(),
        row.get("pos").unwrap_or_default(),
        row.get("reference").unwrap_or_default(),
        row.get("alternative").unwrap_or_default()
    )
}

/// Gene symbol when the variant falls in a gene
pub fn affected_gene(row: &Row) -> Option<&str> {
    row.get("gene_symbol")
        .map(str::trim)
        .filter(|symbol| !symbol.is_empty())
}

fn values(row: &Row, columns: &[&str]) -> Vec<SqlValue> {
    columns
        .iter()
        .map(|column| SqlValue::from(row.get(column).map(str::to_string)))
        .collect()
}

/// Every source column read by the split, plus the scan key
fn source_columns() -> Vec<&'static str> {
    std::iter::once("id")
        .chain(SAMPLE_COLUMNS.iter().copied())
        .chain(STATIC_COLUMNS.iter().copied())
        .chain(GENE_COLUMNS.iter().copied())
        .chain(CUSTOM_COLUMNS.iter().copied())
        .unique()
        .collect()
}

pub struct AnnotationSplit;

#[async_trait]
impl CustomOperation for AnnotationSplit {
    fn describe(&self) -> &str {
        "split analysis tables into sample/static/gene/custom annotations"
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let tenants = ctx.tenants().await?.names().to_vec();

        for tenant in &tenants {
            let tables = SplitTables::for_tenant(tenant);
            ctx.banner(&format!("Create new main annotation tables for '{}'", tenant));
            for statement in tables.create_statements() {
                ctx.execute(&statement).await?;
            }

            ctx.banner(&format!("Transfer data from old analysis '{}' to split tables", tenant));
            transfer(ctx, tenant, &tables)
                .await
                .with_context(|| format!("Splitting analysis {}", tenant))?;
        }

        ctx.banner("Delete old tables that are not used anymore");
        for tenant in &tenants {
            for suffix in OBSOLETE_SUFFIXES {
                ctx.execute(&format!("DROP TABLE IF EXISTS `{}{}`", tenant, suffix))
                    .await?;
            }
        }
        Ok(())
    }
}

async fn transfer(ctx: &mut StepContext<'_>, tenant: &TenantName, tables: &SplitTables) -> Result<()> {
    let total = ctx
        .query(&format!("SELECT COUNT(*) FROM `{}`", tenant))
        .await?
        .first()
        .map(|row| row.at_i64(0))
        .transpose()?
        .flatten()
        .unwrap_or(0)
        .max(0) as u64;

    let select = format!(
        "SELECT {} FROM `{}` WHERE `id` > ? ORDER BY `id` LIMIT ?",
        source_columns().iter().map(|c| format!("`{}`", c)).join(", "),
        tenant
    );

    let mut staged = ctx.bulk_transfer();
    let mut progress = ctx.progress("variants", total);
    let mut last_id = 0i64;

    loop {
        let page = ctx
            .query_with(&select, &[SqlValue::Int(last_id), SqlValue::UInt(PAGE_SIZE)])
            .await?;
        if page.total() == 0 {
            break;
        }

        for row in page {
            if let Some(id) = row.get_i64("id")? {
                last_id = last_id.max(id);
            }
            if let Some(line) = progress.record() {
                ctx.say(&line);
            }

            staged.stage_row(&tables.sample, SAMPLE_COLUMNS, &values(&row, SAMPLE_COLUMNS))?;
            staged.stage_row(&tables.custom, CUSTOM_COLUMNS, &values(&row, CUSTOM_COLUMNS))?;
            staged.stage_unique(
                &tables.static_annotations,
                STATIC_COLUMNS,
                &variant_key(&row),
                &values(&row, STATIC_COLUMNS),
            )?;
            if let Some(gene) = affected_gene(&row) {
                staged.stage_unique(&tables.gene, GENE_COLUMNS, gene, &[SqlValue::from(gene)])?;
            }
        }
    }
    ctx.say(&progress.report());

    for (table, mode) in [
        (&tables.sample, LoadMode::IgnoreDuplicates),
        (&tables.static_annotations, LoadMode::IgnoreDuplicates),
        (&tables.gene, LoadMode::IgnoreDuplicates),
        (&tables.custom, LoadMode::ReplaceDuplicates),
    ] {
        ctx.say(&progress.milestone(&format!("Importing into {}", table)));
        ctx.flush(&mut staged, table, mode).await?;
    }
    Ok(())
}
